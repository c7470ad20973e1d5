//! Counter sources for interface byte counters.
//!
//! A counter source answers one question: how many bytes have the monitored
//! interfaces sent and received so far. Everything above it (rates, totals,
//! history) is derived from consecutive answers.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │               CounterSource              │ (trait)
//! │   ┌──────────────────┐  ┌─────────────┐  │
//! │   │   NetDevSource   │  │ Scripted-   │  │
//! │   │ /proc/net/dev    │  │ Source      │  │
//! │   └────────┬─────────┘  │ (Testing)   │  │
//! │            │            └─────────────┘  │
//! │     ┌──────▼──────┐                      │
//! │     │  FileSystem │ (trait)              │
//! │     └──────┬──────┘                      │
//! └────────────┼─────────────────────────────┘
//!       ┌──────┴───────┐
//!  ┌────▼────┐    ┌────▼────┐
//!  │ RealFs  │    │ MockFs  │
//!  └─────────┘    └─────────┘
//! ```
//!
//! # Usage
//!
//! ```
//! use bwtally::collector::{CounterSource, InterfaceFilter, MockFs, NetDevSource};
//!
//! let mut fs = MockFs::new();
//! fs.add_file(
//!     "/proc/net/dev",
//!     "Inter-|   Receive |  Transmit\n face |bytes packets|bytes packets\n  eth0: 2000 0 0 0 0 0 0 0 1000 0 0 0 0 0 0 0\n",
//! );
//! let mut source = NetDevSource::new(fs, "/proc", InterfaceFilter::NonLoopback);
//! let counters = source.read().unwrap();
//! assert_eq!(counters.upload, 1000);
//! assert_eq!(counters.download, 2000);
//! ```

pub mod mock;
mod netdev;
pub mod traits;

pub use mock::{MockFs, ScriptedSource};
pub use netdev::{InterfaceFilter, NetDevSource, NetDevStats, parse_net_dev};
pub use traits::{FileSystem, RealFs};

/// Raw cumulative byte counters summed over the monitored interfaces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    /// Bytes transmitted.
    pub upload: u64,
    /// Bytes received.
    pub download: u64,
}

impl Counters {
    pub fn new(upload: u64, download: u64) -> Self {
        Self { upload, download }
    }
}

/// Error type for a counter read that could not complete.
#[derive(Debug)]
pub enum CollectError {
    /// I/O error reading the counter file.
    Io(std::io::Error),
    /// No interface matched the configured filter.
    NoInterfaces,
}

impl std::fmt::Display for CollectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectError::Io(e) => write!(f, "I/O error: {}", e),
            CollectError::NoInterfaces => write!(f, "no matching network interfaces found"),
        }
    }
}

impl std::error::Error for CollectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CollectError::Io(e) => Some(e),
            CollectError::NoInterfaces => None,
        }
    }
}

impl From<std::io::Error> for CollectError {
    fn from(e: std::io::Error) -> Self {
        CollectError::Io(e)
    }
}

/// A fallible query for the current cumulative counters.
///
/// Implementations may block on an OS call. A failed read means "no sample
/// this tick"; callers never treat it as fatal.
pub trait CounterSource: Send {
    fn read(&mut self) -> Result<Counters, CollectError>;
}

impl<S: CounterSource + ?Sized> CounterSource for Box<S> {
    fn read(&mut self) -> Result<Counters, CollectError> {
        (**self).read()
    }
}
