use chrono::{DateTime, Duration, Utc};
use tracing::{debug, error};

use super::state::SampleState;
use super::store::{StateStore, StorageError};

/// Minimum spacing between two debounced writes.
pub const DEFAULT_SAVE_INTERVAL_SECS: i64 = 60;

/// Write-frequency policy: a dirty flag plus the time of the last attempt.
#[derive(Debug, Clone)]
pub struct Debounce {
    interval: Duration,
    dirty: bool,
    last_attempt: Option<DateTime<Utc>>,
}

impl Debounce {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            dirty: false,
            last_attempt: None,
        }
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Dirty and at least `interval` since the last write attempt.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.dirty
            && self
                .last_attempt
                .is_none_or(|last| now - last >= self.interval)
    }

    /// Records a write attempt. Only a successful write clears the flag.
    pub fn record_attempt(&mut self, now: DateTime<Utc>, succeeded: bool) {
        self.last_attempt = Some(now);
        if succeeded {
            self.dirty = false;
        }
    }
}

impl Default for Debounce {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_SAVE_INTERVAL_SECS))
    }
}

/// Store plus debounce policy.
pub struct PersistenceManager {
    store: StateStore,
    debounce: Debounce,
    saves: u64,
}

impl PersistenceManager {
    pub fn new(store: StateStore, save_interval: Duration) -> Self {
        Self {
            store,
            debounce: Debounce::new(save_interval),
            saves: 0,
        }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn load(&self) -> Result<SampleState, StorageError> {
        self.store.load()
    }

    pub fn mark_dirty(&mut self) {
        self.debounce.mark_dirty();
    }

    pub fn is_dirty(&self) -> bool {
        self.debounce.is_dirty()
    }

    /// Number of successful writes.
    pub fn saves(&self) -> u64 {
        self.saves
    }

    /// Writes only if the state is dirty and the debounce window has passed.
    /// Returns whether a write was attempted.
    pub fn maybe_flush(&mut self, state: &SampleState, now: DateTime<Utc>) -> bool {
        if !self.debounce.is_due(now) {
            return false;
        }
        self.write(state, now);
        true
    }

    /// Writes unconditionally, for reset, suspend and shutdown.
    pub fn flush(&mut self, state: &SampleState, now: DateTime<Utc>) -> Result<(), StorageError> {
        self.debounce.mark_dirty();
        let result = self.store.save(state);
        self.record(now, &result);
        result
    }

    fn write(&mut self, state: &SampleState, now: DateTime<Utc>) {
        let result = self.store.save(state);
        self.record(now, &result);
    }

    fn record(&mut self, now: DateTime<Utc>, result: &Result<(), StorageError>) {
        match result {
            Ok(()) => {
                self.saves += 1;
                debug!(saves = self.saves, "persistence: state written");
            }
            Err(e) => {
                error!(
                    path = %self.store.path().display(),
                    error = %e,
                    "persistence: failed to save state"
                );
            }
        }
        self.debounce.record_attempt(now, result.is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_debounce_clean_is_never_due() {
        let d = Debounce::default();
        assert!(!d.is_due(at(0)));
    }

    #[test]
    fn test_debounce_first_write_is_immediate() {
        let mut d = Debounce::default();
        d.mark_dirty();
        assert!(d.is_due(at(0)));
    }

    #[test]
    fn test_debounce_window() {
        let mut d = Debounce::default();
        d.mark_dirty();
        d.record_attempt(at(0), true);
        assert!(!d.is_dirty());

        d.mark_dirty();
        assert!(!d.is_due(at(10)));
        assert!(!d.is_due(at(59)));
        assert!(d.is_due(at(60)));
    }

    #[test]
    fn test_debounce_failed_attempt_keeps_dirty() {
        let mut d = Debounce::default();
        d.mark_dirty();
        d.record_attempt(at(0), false);
        assert!(d.is_dirty());
        assert!(!d.is_due(at(30)));
        assert!(d.is_due(at(60)));
    }

    #[test]
    fn test_maybe_flush_bounds_write_frequency() {
        let dir = tempdir().unwrap();
        let store = StateStore::open(dir.path().join("state.json")).unwrap();
        let mut pm = PersistenceManager::new(store, Duration::seconds(60));
        let state = SampleState::fresh();

        for secs in (0..120).step_by(4) {
            pm.mark_dirty();
            pm.maybe_flush(&state, at(secs));
        }
        // t=0 and t=60
        assert_eq!(pm.saves(), 2);
        assert!(pm.is_dirty());
    }

    #[test]
    fn test_forced_flush_ignores_window() {
        let dir = tempdir().unwrap();
        let store = StateStore::open(dir.path().join("state.json")).unwrap();
        let mut pm = PersistenceManager::new(store, Duration::seconds(60));
        let mut state = SampleState::fresh();

        pm.mark_dirty();
        assert!(pm.maybe_flush(&state, at(0)));

        state.total_uploaded = 42;
        pm.flush(&state, at(1)).unwrap();
        assert_eq!(pm.saves(), 2);
        assert!(!pm.is_dirty());
        assert_eq!(pm.load().unwrap().total_uploaded, 42);
    }

    #[test]
    fn test_failed_save_stays_dirty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        let store = StateStore::open(&path).unwrap();
        // A directory where the temporary file should go makes the save fail.
        std::fs::create_dir_all(dir.path().join("state.tmp")).unwrap();
        let mut pm = PersistenceManager::new(store, Duration::seconds(60));

        pm.mark_dirty();
        assert!(pm.maybe_flush(&SampleState::fresh(), at(0)));
        assert!(pm.is_dirty());
        assert_eq!(pm.saves(), 0);
        assert!(pm.flush(&SampleState::fresh(), at(1)).is_err());
        assert!(pm.is_dirty());
    }
}
