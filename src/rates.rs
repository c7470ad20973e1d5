//! Rate computation for interface byte counters.
//!
//! This module is side-effect free: it turns two counter readings and the
//! time between them into deltas and rates, or rejects the pair. Applying
//! deltas to running totals is the monitor's job.

use crate::collector::Counters;

// ---------------------------------------------------------------------------
// Delta helpers
// ---------------------------------------------------------------------------

/// Compute u64 delta, returning `None` on counter regression (interface reset).
pub fn du64(curr: u64, prev: u64) -> Option<u64> {
    curr.checked_sub(prev)
}

// ---------------------------------------------------------------------------
// Rate computation
// ---------------------------------------------------------------------------

/// An accepted pair of readings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateSample {
    pub upload_delta: u64,
    pub download_delta: u64,
    /// Bytes per second.
    pub upload_rate: f64,
    /// Bytes per second.
    pub download_rate: f64,
}

/// Why a pair of readings was not turned into a rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// No previous reading to compare against (a zero counter).
    NoBaseline,
    /// A counter went backwards: the interface was reset or re-enumerated.
    CounterRegression,
    /// Elapsed time was zero, negative or not finite.
    NonPositiveElapsed,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::NoBaseline => write!(f, "no baseline sample"),
            Rejection::CounterRegression => write!(f, "counter went backwards"),
            Rejection::NonPositiveElapsed => write!(f, "elapsed time is not positive"),
        }
    }
}

impl std::error::Error for Rejection {}

/// Compute throughput between two readings.
///
/// Accepts only when both previous counters are non-zero and neither current
/// counter is smaller than its previous value. A regression is rejected, not
/// clamped: callers resynchronize their baseline and skip the tick.
pub fn compute_rate(
    previous: Counters,
    current: Counters,
    elapsed_secs: f64,
) -> Result<RateSample, Rejection> {
    if previous.upload == 0 || previous.download == 0 {
        return Err(Rejection::NoBaseline);
    }
    if !(elapsed_secs.is_finite() && elapsed_secs > 0.0) {
        return Err(Rejection::NonPositiveElapsed);
    }

    let (Some(upload_delta), Some(download_delta)) = (
        du64(current.upload, previous.upload),
        du64(current.download, previous.download),
    ) else {
        return Err(Rejection::CounterRegression);
    };

    Ok(RateSample {
        upload_delta,
        download_delta,
        upload_rate: upload_delta as f64 / elapsed_secs,
        download_rate: download_delta as f64 / elapsed_secs,
    })
}
