//! The persisted and observable monitor state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::collector::Counters;
use crate::history::{HistoryBuffer, HistoryPoint};

/// Current on-disk schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// A record whose history ids leave no room for new points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdsExhausted;

impl std::fmt::Display for IdsExhausted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "history point ids exhausted")
    }
}

impl std::error::Error for IdsExhausted {}

fn pre_versioned() -> u32 {
    0
}

/// Everything the monitor knows, saved as one record.
///
/// Every field has a default so records written before a field existed
/// still load; a missing `version` marks a pre-versioned record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SampleState {
    #[serde(default = "pre_versioned")]
    pub version: u32,

    /// Bytes per second, last accepted sample.
    pub upload_rate: f64,
    /// Bytes per second, last accepted sample.
    pub download_rate: f64,

    /// Cumulative bytes since the last reset.
    pub total_uploaded: u64,
    /// Cumulative bytes since the last reset.
    pub total_downloaded: u64,

    /// Raw counters from the last reading, accepted or not.
    pub last_known_upload_counter: u64,
    pub last_known_download_counter: u64,

    pub is_monitoring: bool,
    /// Seconds spent monitoring since the last reset.
    pub session_duration_secs: f64,
    /// Last successful sample, or the moment monitoring stopped.
    pub last_active: Option<DateTime<Utc>>,

    /// Id for the next history point.
    pub next_point_id: u64,
    pub history: HistoryBuffer,
}

impl Default for SampleState {
    fn default() -> Self {
        Self {
            version: SCHEMA_VERSION,
            upload_rate: 0.0,
            download_rate: 0.0,
            total_uploaded: 0,
            total_downloaded: 0,
            last_known_upload_counter: 0,
            last_known_download_counter: 0,
            is_monitoring: false,
            session_duration_secs: 0.0,
            last_active: None,
            next_point_id: 0,
            history: HistoryBuffer::new(),
        }
    }
}

impl SampleState {
    /// A zeroed state, as after a reset.
    pub fn fresh() -> Self {
        Self::default()
    }

    pub fn last_known_counters(&self) -> Counters {
        Counters::new(
            self.last_known_upload_counter,
            self.last_known_download_counter,
        )
    }

    pub fn set_last_known_counters(&mut self, counters: Counters) {
        self.last_known_upload_counter = counters.upload;
        self.last_known_download_counter = counters.download;
    }

    pub fn totals(&self) -> (u64, u64) {
        (self.total_uploaded, self.total_downloaded)
    }

    /// Builds a history point at the current totals with a fresh id.
    /// Returns `None` once the id space is used up; `u64::MAX` is never
    /// handed out.
    pub fn new_history_point(&mut self, timestamp: DateTime<Utc>) -> Option<HistoryPoint> {
        let id = self.next_point_id;
        self.next_point_id = id.checked_add(1)?;
        Some(HistoryPoint::new(
            id,
            timestamp,
            self.total_uploaded,
            self.total_downloaded,
        ))
    }

    /// Brings a loaded record up to the current schema: fixes history order,
    /// makes sure new ids cannot collide with stored ones and stamps the
    /// version. Returns the number of history points dropped.
    pub fn upgrade(&mut self) -> Result<usize, IdsExhausted> {
        let dropped = self.history.repair();
        if let Some(max_id) = self.history.max_id() {
            let floor = max_id.checked_add(1).ok_or(IdsExhausted)?;
            self.next_point_id = self.next_point_id.max(floor);
        }
        self.version = SCHEMA_VERSION;
        Ok(dropped)
    }
}
