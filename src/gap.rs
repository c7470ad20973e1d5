//! Bridging history across periods when the monitor was not running.
//!
//! After a suspend or a process restart there are no samples for the gap.
//! Two flat points at the last known totals keep the cumulative chart
//! continuous without implying traffic during the gap.

use chrono::{DateTime, Duration, Utc};

use crate::history::HistoryPoint;

/// Gaps at or below this are scheduling jitter, not downtime.
pub const DEFAULT_GAP_THRESHOLD_SECS: i64 = 120;

/// Offset of the first bridging point after the last active time.
pub const DEFAULT_BRIDGE_OFFSET_SECS: i64 = 60;

/// Gap detection parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GapPolicy {
    pub threshold: Duration,
    pub bridge_offset: Duration,
}

impl Default for GapPolicy {
    fn default() -> Self {
        Self {
            threshold: Duration::seconds(DEFAULT_GAP_THRESHOLD_SECS),
            bridge_offset: Duration::seconds(DEFAULT_BRIDGE_OFFSET_SECS),
        }
    }
}

impl GapPolicy {
    /// Whether the time between `last_active` and `now` counts as a gap.
    pub fn is_gap(&self, last_active: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now - last_active > self.threshold
    }

    /// Produces the bridging points for a resume at `now`.
    ///
    /// Returns nothing when there is no previous history point to bridge
    /// from or when the gap does not exceed the threshold. Otherwise returns
    /// exactly two points flat at `totals` (upload, download): one at
    /// `last_active + bridge_offset`, one at `now`. Ids are drawn from
    /// `next_id`; nothing is produced once fewer than two ids remain.
    pub fn reconcile(
        &self,
        last_active: DateTime<Utc>,
        now: DateTime<Utc>,
        last_point: Option<&HistoryPoint>,
        totals: (u64, u64),
        next_id: &mut u64,
    ) -> Vec<HistoryPoint> {
        if last_point.is_none() || !self.is_gap(last_active, now) {
            return Vec::new();
        }
        let first_id = *next_id;
        let Some(after) = first_id.checked_add(2) else {
            return Vec::new();
        };
        *next_id = after;

        let (upload, download) = totals;
        vec![
            HistoryPoint::new(first_id, last_active + self.bridge_offset, upload, download),
            HistoryPoint::new(first_id + 1, now, upload, download),
        ]
    }
}
