//! Counter source replaying a queue of readings.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::collector::{CollectError, CounterSource, Counters};

/// Replays queued readings in order; an exhausted queue reads as
/// `CollectError::NoInterfaces`.
///
/// Clones share the queue so a test can push readings after handing the
/// source to a monitor.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    readings: Arc<Mutex<VecDeque<Option<Counters>>>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a source pre-loaded with successful readings.
    pub fn with_readings(readings: impl IntoIterator<Item = (u64, u64)>) -> Self {
        let source = Self::new();
        for (upload, download) in readings {
            source.push(upload, download);
        }
        source
    }

    /// Queues a successful reading.
    pub fn push(&self, upload: u64, download: u64) {
        self.queue().push_back(Some(Counters::new(upload, download)));
    }

    /// Queues a failed reading.
    pub fn push_failure(&self) {
        self.queue().push_back(None);
    }

    pub fn remaining(&self) -> usize {
        self.queue().len()
    }

    fn queue(&self) -> std::sync::MutexGuard<'_, VecDeque<Option<Counters>>> {
        self.readings.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl CounterSource for ScriptedSource {
    fn read(&mut self) -> Result<Counters, CollectError> {
        self.queue()
            .pop_front()
            .flatten()
            .ok_or(CollectError::NoInterfaces)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_source_replays_in_order() {
        let mut source = ScriptedSource::with_readings([(1, 2), (3, 4)]);
        source.push_failure();

        assert_eq!(source.read().unwrap(), Counters::new(1, 2));
        assert_eq!(source.read().unwrap(), Counters::new(3, 4));
        assert!(source.read().is_err());
        assert!(source.read().is_err());
        assert_eq!(source.remaining(), 0);
    }
}
