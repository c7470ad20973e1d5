//! Single-file JSON store for [`SampleState`].

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::state::{IdsExhausted, SCHEMA_VERSION, SampleState};

/// Error type for state persistence.
#[derive(Debug)]
pub enum StorageError {
    /// No saved state at the given path.
    NotFound(PathBuf),
    /// I/O error reading or writing the state file.
    Io(io::Error),
    /// The file exists but is not a valid state record.
    Malformed(serde_json::Error),
    /// The record was written by a newer schema.
    UnsupportedVersion(u32),
    /// The record's history ids leave no room for new points.
    IdsExhausted,
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::NotFound(path) => write!(f, "no saved state at {}", path.display()),
            StorageError::Io(e) => write!(f, "I/O error: {}", e),
            StorageError::Malformed(e) => write!(f, "malformed state file: {}", e),
            StorageError::UnsupportedVersion(v) => write!(
                f,
                "state file version {} is newer than supported version {}",
                v, SCHEMA_VERSION
            ),
            StorageError::IdsExhausted => write!(f, "state file history ids are exhausted"),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::Io(e) => Some(e),
            StorageError::Malformed(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for StorageError {
    fn from(e: io::Error) -> Self {
        StorageError::Io(e)
    }
}

impl From<IdsExhausted> for StorageError {
    fn from(_: IdsExhausted) -> Self {
        StorageError::IdsExhausted
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Malformed(e)
    }
}

/// Reads and atomically replaces the state file.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    /// Opens a store at `path`, creating the parent directory and removing a
    /// leftover temporary file from an interrupted save.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let store = Self { path };
        let tmp_path = store.tmp_path();
        if tmp_path.exists() {
            debug!(path = %tmp_path.display(), "removing stale temporary state file");
            if let Err(e) = fs::remove_file(&tmp_path) {
                warn!(path = %tmp_path.display(), error = %e, "failed to remove stale temporary file");
            }
        }
        Ok(store)
    }

    /// A read-only view of `path`; touches nothing on disk.
    pub fn read_only(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        self.path.with_extension("tmp")
    }

    /// Writes the full state. The file is written atomically via a `.tmp`
    /// intermediate file, so readers see either the old or the new record.
    pub fn save(&self, state: &SampleState) -> Result<(), StorageError> {
        let encoded = serde_json::to_vec_pretty(state)?;

        let tmp_path = self.tmp_path();
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(&encoded)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&tmp_path, &self.path)?;
        debug!(
            path = %self.path.display(),
            bytes = encoded.len(),
            points = state.history.len(),
            "state saved"
        );
        Ok(())
    }

    /// Loads the saved state, upgrading older records to the current schema.
    pub fn load(&self) -> Result<SampleState, StorageError> {
        let data = match fs::read(&self.path) {
            Ok(d) => d,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(self.path.clone()));
            }
            Err(e) => return Err(e.into()),
        };

        let mut state: SampleState = serde_json::from_slice(&data)?;
        if state.version > SCHEMA_VERSION {
            return Err(StorageError::UnsupportedVersion(state.version));
        }

        let from_version = state.version;
        let dropped = state.upgrade()?;
        if dropped > 0 {
            warn!(dropped, "state: dropped out-of-order history points");
        }
        if from_version != SCHEMA_VERSION {
            debug!(from_version, to_version = SCHEMA_VERSION, "state: upgraded record");
        }
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::HistoryPoint;
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    fn sample_state() -> SampleState {
        let t0 = Utc.timestamp_opt(1_700_000_000, 123_000_000).unwrap();
        let mut state = SampleState {
            upload_rate: 1.5,
            download_rate: 3.25,
            total_uploaded: 1500,
            total_downloaded: 2500,
            last_known_upload_counter: 99_000,
            last_known_download_counter: 77_000,
            is_monitoring: true,
            session_duration_secs: 65.5,
            last_active: Some(t0),
            ..SampleState::default()
        };
        for i in 0..3 {
            let p = state
                .new_history_point(t0 + chrono::Duration::seconds(60 * i))
                .unwrap();
            state.history.append(p);
        }
        state
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempdir().unwrap();
        let store = StateStore::open(dir.path().join("state.json")).unwrap();
        let state = sample_state();

        store.save(&state).unwrap();
        let loaded = store.load().unwrap();

        assert_eq!(loaded, state);
        let ids: Vec<u64> = loaded.history.iter().map(HistoryPoint::id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn test_save_replaces_previous_record() {
        let dir = tempdir().unwrap();
        let store = StateStore::open(dir.path().join("state.json")).unwrap();

        store.save(&sample_state()).unwrap();
        store.save(&SampleState::fresh()).unwrap();

        assert_eq!(store.load().unwrap(), SampleState::fresh());
        assert!(!dir.path().join("state.tmp").exists());
    }

    #[test]
    fn test_load_missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let store = StateStore::open(dir.path().join("state.json")).unwrap();
        assert!(matches!(store.load(), Err(StorageError::NotFound(_))));
    }

    #[test]
    fn test_load_malformed_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, b"{ not json").unwrap();

        let store = StateStore::open(&path).unwrap();
        assert!(matches!(store.load(), Err(StorageError::Malformed(_))));
    }

    #[test]
    fn test_load_newer_version_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, br#"{"version": 99}"#).unwrap();

        let store = StateStore::open(&path).unwrap();
        assert!(matches!(
            store.load(),
            Err(StorageError::UnsupportedVersion(99))
        ));
    }

    #[test]
    fn test_load_rejects_exhausted_history_ids() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        let t = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let mut state = SampleState::fresh();
        state.history.append(HistoryPoint::new(u64::MAX, t, 1, 2));
        std::fs::write(&path, serde_json::to_vec(&state).unwrap()).unwrap();

        let store = StateStore::open(&path).unwrap();
        let err = store.load().unwrap_err();
        assert!(matches!(err, StorageError::IdsExhausted));
        assert!(err.to_string().contains("exhausted"));
    }

    #[test]
    fn test_open_creates_parent_and_cleans_tmp() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a/b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("state.tmp"), b"partial").unwrap();

        let store = StateStore::open(nested.join("state.json")).unwrap();
        assert!(!nested.join("state.tmp").exists());
        assert_eq!(store.path(), nested.join("state.json").as_path());

        let fresh_dir = dir.path().join("c/d");
        StateStore::open(fresh_dir.join("state.json")).unwrap();
        assert!(fresh_dir.is_dir());
    }

    #[test]
    fn test_read_only_leaves_disk_untouched() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("state.tmp"), b"in flight").unwrap();

        let store = StateStore::read_only(dir.path().join("state.json"));
        assert!(dir.path().join("state.tmp").exists());
        assert!(matches!(store.load(), Err(StorageError::NotFound(_))));

        let missing = StateStore::read_only(dir.path().join("x/state.json"));
        assert!(missing.load().is_err());
        assert!(!dir.path().join("x").exists());
    }
}
