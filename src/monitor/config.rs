//! Timing and retention parameters for the monitor.

use chrono::Duration;

use crate::gap::{DEFAULT_BRIDGE_OFFSET_SECS, DEFAULT_GAP_THRESHOLD_SECS, GapPolicy};
use crate::history::{DEFAULT_HISTORY_CAP, DEFAULT_HISTORY_INTERVAL_SECS};
use crate::storage::manager::DEFAULT_SAVE_INTERVAL_SECS;

/// Default service loop period.
pub const DEFAULT_TICK_INTERVAL: std::time::Duration = std::time::Duration::from_secs(1);

/// Default spacing between counter reads.
pub const DEFAULT_SAMPLE_INTERVAL_SECS: i64 = 4;

/// Configuration error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub message: String,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid monitor configuration: {}", self.message)
    }
}

impl std::error::Error for ConfigError {}

/// Monitor configuration.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Period of the service loop; session time advances per tick.
    pub tick_interval: std::time::Duration,
    /// Minimum spacing between counter reads. Rounded up to whole ticks.
    pub sample_interval: Duration,
    /// Minimum spacing between sampled history points.
    pub history_interval: Duration,
    /// Maximum retained history points.
    pub history_cap: usize,
    /// Gap detection and bridging.
    pub gap: GapPolicy,
    /// Minimum spacing between debounced saves.
    pub save_interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            sample_interval: Duration::seconds(DEFAULT_SAMPLE_INTERVAL_SECS),
            history_interval: Duration::seconds(DEFAULT_HISTORY_INTERVAL_SECS),
            history_cap: DEFAULT_HISTORY_CAP,
            gap: GapPolicy {
                threshold: Duration::seconds(DEFAULT_GAP_THRESHOLD_SECS),
                bridge_offset: Duration::seconds(DEFAULT_BRIDGE_OFFSET_SECS),
            },
            save_interval: Duration::seconds(DEFAULT_SAVE_INTERVAL_SECS),
        }
    }
}

impl MonitorConfig {
    /// Checks the relations the monitor relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let err = |message: &str| {
            Err(ConfigError {
                message: message.to_string(),
            })
        };

        if self.tick_interval.is_zero() {
            return err("tick interval must be positive");
        }
        if self.sample_interval <= Duration::zero() {
            return err("sample interval must be positive");
        }
        let tick = Duration::from_std(self.tick_interval).unwrap_or(Duration::MAX);
        if self.sample_interval < tick {
            return err("sample interval must not be shorter than the tick interval");
        }
        if self.gap.threshold <= tick {
            return err("gap threshold must be longer than the tick interval");
        }
        if self.history_interval <= Duration::zero() {
            return err("history interval must be positive");
        }
        if self.history_cap == 0 {
            return err("history cap must be at least 1");
        }
        if self.save_interval < Duration::zero() {
            return err("save interval must not be negative");
        }
        Ok(())
    }
}
