//! Mock implementations for testing.
//!
//! This module provides `MockFs` for exercising the `/proc/net/dev` source
//! without Linux, and `ScriptedSource` for driving the monitor with a fixed
//! sequence of counter readings.

mod filesystem;
mod scripted;

pub use filesystem::MockFs;
pub use scripted::ScriptedSource;
