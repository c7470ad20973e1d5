//! bwtally - network bandwidth sampler library.
//!
//! This library provides the core functionality shared between:
//! - `bwtallyd` - background daemon that samples interface counters
//! - `bwtally` - status viewer for the saved state

pub mod collector;
pub mod fmt;
pub mod gap;
pub mod history;
pub mod monitor;
pub mod rates;
pub mod storage;
pub mod util;
