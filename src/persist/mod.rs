//! Append-only persistence for the state hub
//!
//! - `EventStore`: rotating JSONL writer for hub events
//! - `SnapshotWriter`: periodic full-state snapshots on a background thread
//! - `replay_into_hub` / `PersistenceManager`: startup recovery wiring
//! - bundle export/import: offline transfer with a hashed manifest
//!
//! ```text
//! Write path:
//! ┌────────────┐   ┌──────────────┐   ┌──────────────────────┐
//! │ StateHub   │──►│ EventSink    │──►│ events-<ts>.jsonl    │
//! │ mutation   │   │ (EventStore) │   │ (size-based rotation)│
//! └────────────┘   └──────────────┘   └──────────────────────┘
//!        │               every N seconds
//!        └────────────► snapshots.jsonl (SnapshotWriter)
//!
//! Read path (startup):
//! last snapshot ──► hub.restore ──► replay events newer than snapshot
//! ```

mod bundle;
mod replay;
mod snapshot;
mod store;

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub use bundle::{export_bundle, import_bundle, BundleManifest, ImportOutcome, StreamManifest};
pub use bundle::ImportStatus;
pub use replay::{init_persistence, replay_into_hub, PersistenceManager};
pub use snapshot::SnapshotWriter;
pub use store::EventStore;

/// Result type for persistence operations
pub type PersistResult<T> = Result<T, PersistError>;

/// Errors that can occur in persistence operations
#[derive(Debug)]
pub enum PersistError {
    Io(io::Error),
    Json(serde_json::Error),
}

impl std::fmt::Display for PersistError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PersistError::Io(e) => write!(f, "IO error: {}", e),
            PersistError::Json(e) => write!(f, "JSON error: {}", e),
        }
    }
}

impl std::error::Error for PersistError {}

impl From<io::Error> for PersistError {
    fn from(e: io::Error) -> Self {
        PersistError::Io(e)
    }
}

impl From<serde_json::Error> for PersistError {
    fn from(e: serde_json::Error) -> Self {
        PersistError::Json(e)
    }
}

impl From<PersistError> for crate::hub::SinkError {
    fn from(e: PersistError) -> Self {
        match e {
            PersistError::Io(e) => crate::hub::SinkError::Io(e),
            PersistError::Json(e) => crate::hub::SinkError::Json(e),
        }
    }
}

/// Configuration for the persistence layer
#[derive(Debug, Clone)]
pub struct PersistConfig {
    /// Root of the on-disk store
    pub data_dir: PathBuf,
    /// Event file rotation threshold in bytes
    pub rotate_bytes: u64,
    /// Keep rotated event files as archives (delete them otherwise)
    pub keep_archives: bool,
    /// Interval between snapshot ticks
    pub snapshot_interval: Duration,
}

impl Default for PersistConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("state_store"),
            rotate_bytes: 100 * 1024 * 1024,
            keep_archives: true,
            snapshot_interval: Duration::from_secs(5),
        }
    }
}

impl PersistConfig {
    /// Config rooted at a custom data directory
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    pub fn with_rotate_bytes(mut self, rotate_bytes: u64) -> Self {
        self.rotate_bytes = rotate_bytes;
        self
    }

    pub fn with_keep_archives(mut self, keep_archives: bool) -> Self {
        self.keep_archives = keep_archives;
        self
    }

    pub fn with_snapshot_interval(mut self, interval: Duration) -> Self {
        self.snapshot_interval = interval;
        self
    }

    /// Directory holding rotated event files
    pub fn events_dir(&self) -> PathBuf {
        self.data_dir.join("events")
    }

    /// Directory holding snapshot files
    pub fn snapshots_dir(&self) -> PathBuf {
        self.data_dir.join("snapshots")
    }

    /// The growing snapshots file the writer appends to
    pub fn snapshots_path(&self) -> PathBuf {
        self.snapshots_dir().join("snapshots.jsonl")
    }

    /// Directory holding the hash-chained ledger mirror
    pub fn ledger_dir(&self) -> PathBuf {
        self.data_dir.join("ledger")
    }

    /// Create the event and snapshot directories
    pub fn ensure_dirs(&self) -> io::Result<()> {
        std::fs::create_dir_all(self.events_dir())?;
        std::fs::create_dir_all(self.snapshots_dir())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_paths() {
        let config = PersistConfig::new("/tmp/store");
        assert_eq!(config.events_dir(), PathBuf::from("/tmp/store/events"));
        assert_eq!(
            config.snapshots_path(),
            PathBuf::from("/tmp/store/snapshots/snapshots.jsonl")
        );
        assert_eq!(config.ledger_dir(), PathBuf::from("/tmp/store/ledger"));
    }

    #[test]
    fn test_config_defaults() {
        let config = PersistConfig::default();
        assert_eq!(config.rotate_bytes, 100 * 1024 * 1024);
        assert!(config.keep_archives);
        assert_eq!(config.snapshot_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_builder_overrides() {
        let config = PersistConfig::new("x")
            .with_rotate_bytes(512)
            .with_keep_archives(false)
            .with_snapshot_interval(Duration::from_millis(50));
        assert_eq!(config.rotate_bytes, 512);
        assert!(!config.keep_archives);
        assert_eq!(config.snapshot_interval, Duration::from_millis(50));
    }
}
