//! Downsampled history of cumulative totals.
//!
//! Sampling runs every few seconds but the history keeps at most one point
//! per [`DEFAULT_HISTORY_INTERVAL_SECS`], so memory is bounded by the
//! retention cap regardless of the sampling cadence.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Minimum spacing between two sampled history points.
pub const DEFAULT_HISTORY_INTERVAL_SECS: i64 = 60;

/// Maximum retained points (24h at one point per minute).
pub const DEFAULT_HISTORY_CAP: usize = 1440;

/// A timestamped snapshot of cumulative totals. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryPoint {
    id: u64,
    timestamp: DateTime<Utc>,
    cumulative_upload: u64,
    cumulative_download: u64,
}

impl HistoryPoint {
    pub fn new(
        id: u64,
        timestamp: DateTime<Utc>,
        cumulative_upload: u64,
        cumulative_download: u64,
    ) -> Self {
        Self {
            id,
            timestamp,
            cumulative_upload,
            cumulative_download,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn cumulative_upload(&self) -> u64 {
        self.cumulative_upload
    }

    pub fn cumulative_download(&self) -> u64 {
        self.cumulative_download
    }
}

/// Append-only, timestamp-ordered sequence of [`HistoryPoint`]s.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HistoryBuffer {
    points: Vec<HistoryPoint>,
}

impl HistoryBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn last(&self) -> Option<&HistoryPoint> {
        self.points.last()
    }

    pub fn first(&self) -> Option<&HistoryPoint> {
        self.points.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, HistoryPoint> {
        self.points.iter()
    }

    pub fn as_slice(&self) -> &[HistoryPoint] {
        &self.points
    }

    /// Whether a sampled point taken at `timestamp` would be recorded.
    pub fn is_due(&self, timestamp: DateTime<Utc>, min_interval: Duration) -> bool {
        match self.points.last() {
            None => true,
            Some(last) => timestamp - last.timestamp >= min_interval,
        }
    }

    /// Appends a sampled point if the buffer is empty or `min_interval` has
    /// passed since the last point. Returns whether the point was appended.
    pub fn offer(&mut self, point: HistoryPoint, min_interval: Duration) -> bool {
        if !self.is_due(point.timestamp, min_interval) {
            return false;
        }
        self.append(point)
    }

    /// Appends a point unconditionally, except that a point older than the
    /// current last point is dropped. Returns whether the point was appended.
    pub fn append(&mut self, point: HistoryPoint) -> bool {
        if let Some(last) = self.points.last()
            && point.timestamp < last.timestamp
        {
            warn!(
                point = %point.timestamp,
                last = %last.timestamp,
                "history: dropping out-of-order point"
            );
            return false;
        }
        self.points.push(point);
        true
    }

    /// Removes the oldest `len - cap` points in one pass. Returns the number
    /// of points evicted.
    pub fn evict_overflow(&mut self, cap: usize) -> usize {
        let excess = self.points.len().saturating_sub(cap);
        if excess > 0 {
            self.points.drain(..excess);
            debug!(evicted = excess, remaining = self.points.len(), "history: evicted");
        }
        excess
    }

    /// Drops points that break timestamp order, keeping the earliest run.
    /// Used on records loaded from disk. Returns the number of points dropped.
    pub fn repair(&mut self) -> usize {
        let before = self.points.len();
        let mut last: Option<DateTime<Utc>> = None;
        self.points.retain(|p| {
            if last.is_some_and(|l| p.timestamp < l) {
                return false;
            }
            last = Some(p.timestamp);
            true
        });
        before - self.points.len()
    }

    /// Highest point id present.
    pub fn max_id(&self) -> Option<u64> {
        self.points.iter().map(|p| p.id).max()
    }
}

impl<'a> IntoIterator for &'a HistoryBuffer {
    type Item = &'a HistoryPoint;
    type IntoIter = std::slice::Iter<'a, HistoryPoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn point(id: u64, secs: i64) -> HistoryPoint {
        HistoryPoint::new(id, at(secs), id * 10, id * 20)
    }

    fn minute() -> Duration {
        Duration::seconds(DEFAULT_HISTORY_INTERVAL_SECS)
    }

    #[test]
    fn test_offer_into_empty_buffer() {
        let mut buf = HistoryBuffer::new();
        assert!(buf.offer(point(0, 0), minute()));
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn test_offer_respects_min_interval() {
        let mut buf = HistoryBuffer::new();
        assert!(buf.offer(point(0, 0), minute()));
        assert!(!buf.offer(point(1, 4), minute()));
        assert!(!buf.offer(point(2, 59), minute()));
        assert!(buf.offer(point(3, 60), minute()));
        assert_eq!(buf.len(), 2);
        assert_eq!(buf.last().unwrap().id(), 3);
    }

    #[test]
    fn test_append_drops_out_of_order_point() {
        let mut buf = HistoryBuffer::new();
        assert!(buf.append(point(0, 100)));
        assert!(!buf.append(point(1, 50)));
        assert!(buf.append(point(2, 100)));
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn test_evict_overflow_removes_oldest_first() {
        let mut buf = HistoryBuffer::new();
        for i in 0..10 {
            buf.append(point(i, i as i64 * 60));
        }
        assert_eq!(buf.evict_overflow(4), 6);
        let ids: Vec<u64> = buf.iter().map(|p| p.id()).collect();
        assert_eq!(ids, vec![6, 7, 8, 9]);

        assert_eq!(buf.evict_overflow(4), 0);
        assert_eq!(buf.len(), 4);
    }

    #[test]
    fn test_never_exceeds_cap_under_sustained_appends() {
        let cap = 5;
        let mut buf = HistoryBuffer::new();
        for i in 0..100u64 {
            buf.offer(point(i, i as i64 * 30), minute());
            buf.evict_overflow(cap);
            assert!(buf.len() <= cap);
        }
        let stamps: Vec<_> = buf.iter().map(|p| p.timestamp()).collect();
        assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(buf.last().unwrap().id(), 98);
    }

    #[test]
    fn test_repair_drops_out_of_order_points() {
        let mut buf = HistoryBuffer {
            points: vec![point(0, 0), point(1, 120), point(2, 60), point(3, 180)],
        };
        assert_eq!(buf.repair(), 1);
        let ids: Vec<u64> = buf.iter().map(|p| p.id()).collect();
        assert_eq!(ids, vec![0, 1, 3]);
        assert_eq!(buf.max_id(), Some(3));
    }
}
