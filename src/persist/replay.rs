//! Startup replay and persistence wiring
//!
//! Recovery path: load the last snapshot seen in file order, restore it into
//! the hub, then replay every event newer than the snapshot timestamp with
//! listeners suppressed. Degradation never crashes the owning process; it
//! is reported through the hub's advisory integrity side-channel.

use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use super::{EventStore, PersistConfig, PersistResult, SnapshotWriter};
use crate::hub::StateHub;
use crate::types::{HubEvent, IntegritySignals, IntegrityStatus, IntegrityUpdate, SnapshotRecord};

/// All `.jsonl` files in a directory, sorted by filename
///
/// Filenames carry creation-order timestamps, so this is chronological
/// order. Imported bundle files live in the same directories and are picked
/// up here too.
fn list_jsonl_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("jsonl"))
        .collect();
    files.sort();
    files
}

/// Last valid snapshot record across all snapshot files, in file order
///
/// Also reports whether any snapshot data was unreadable or malformed, so
/// replay can flag the recovery as partial.
pub(crate) fn latest_snapshot(config: &PersistConfig) -> (Option<SnapshotRecord>, bool) {
    let mut latest = None;
    let mut degraded = false;
    for path in list_jsonl_files(&config.snapshots_dir()) {
        let Ok(file) = File::open(&path) else {
            warn!(path = %path.display(), "unreadable snapshot file; skipping");
            degraded = true;
            continue;
        };
        for line in BufReader::new(file).lines() {
            let Ok(line) = line else {
                degraded = true;
                break;
            };
            if line.trim().is_empty() {
                continue;
            }
            match SnapshotRecord::from_json_line(&line) {
                Ok(record) => latest = Some(record),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping malformed snapshot line");
                    degraded = true;
                }
            }
        }
    }
    (latest, degraded)
}

/// All snapshot records across all snapshot files, in file order
pub(crate) fn read_snapshots(config: &PersistConfig) -> Vec<SnapshotRecord> {
    let mut records = Vec::new();
    for path in list_jsonl_files(&config.snapshots_dir()) {
        let Ok(file) = File::open(&path) else { continue };
        for line in BufReader::new(file).lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            if let Ok(record) = SnapshotRecord::from_json_line(&line) {
                records.push(record);
            }
        }
    }
    records
}

/// All events across all event files, in file order
///
/// Returns the events plus whether any file failed outright (malformed
/// single lines are skipped with a warning and do not count).
pub(crate) fn read_events(config: &PersistConfig) -> (Vec<HubEvent>, bool) {
    let mut events = Vec::new();
    let mut degraded = false;

    for path in list_jsonl_files(&config.events_dir()) {
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unreadable event file");
                degraded = true;
                continue;
            }
        };
        for line in BufReader::new(file).lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "event file truncated mid-read");
                    degraded = true;
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match HubEvent::from_json_line(&line) {
                Ok(event) => events.push(event),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping malformed event line");
                }
            }
        }
    }
    (events, degraded)
}

/// Rebuild hub state from disk: last snapshot, then newer events
///
/// Listeners are suppressed during replay so persisted events are not
/// re-persisted. The resulting signals are recorded into the hub's
/// integrity side-channel and returned.
pub fn replay_into_hub(config: &PersistConfig, hub: &StateHub) -> IntegritySignals {
    let started = Instant::now();
    let mut status = IntegrityStatus::Ok;
    let mut last_snapshot_ts = None;
    let mut last_event_ts = None;

    let (snapshot, snapshots_degraded) = latest_snapshot(config);
    if snapshots_degraded {
        status = IntegrityStatus::Partial;
    }
    if let Some(record) = snapshot {
        last_snapshot_ts = Some(record.timestamp);
        hub.restore(record.state);
    }

    let (events, degraded) = read_events(config);
    if degraded {
        status = IntegrityStatus::NeedsAttention;
    }

    let mut replayed = 0usize;
    for event in events {
        // Events at or before the snapshot are already captured by it.
        if let (Some(snapshot_ts), Some(ts)) = (last_snapshot_ts, event.timestamp) {
            if ts <= snapshot_ts {
                continue;
            }
        }
        let recorded = hub.record_event(event, false);
        if let Some(ts) = recorded.timestamp {
            last_event_ts = Some(last_event_ts.map_or(ts, |prev: f64| prev.max(ts)));
        }
        replayed += 1;
    }

    let duration_ms = started.elapsed().as_millis() as u64;
    let signals = IntegritySignals {
        last_snapshot_ts,
        last_event_ts,
        replay_duration_ms: Some(duration_ms),
        integrity_status: status,
    };

    let mut update = IntegrityUpdate::default()
        .replay_duration_ms(duration_ms)
        .integrity_status(status);
    if let Some(ts) = last_snapshot_ts {
        update = update.last_snapshot_ts(ts);
    }
    if let Some(ts) = last_event_ts {
        update = update.last_event_ts(ts);
    }
    hub.set_integrity(update);

    info!(
        snapshot = last_snapshot_ts.is_some(),
        replayed, duration_ms, %status, "replay finished"
    );
    signals
}

/// Wires replay, the event store sink, and the snapshot writer to a hub
pub struct PersistenceManager {
    hub: Arc<StateHub>,
    config: PersistConfig,
    event_store: Arc<EventStore>,
    snapshot_writer: Option<SnapshotWriter>,
}

impl PersistenceManager {
    /// Build the manager and its event store; nothing runs until `start`
    pub fn new(hub: Arc<StateHub>, config: PersistConfig) -> PersistResult<Self> {
        config.ensure_dirs()?;
        let event_store = Arc::new(EventStore::open(config.clone())?);
        Ok(Self {
            hub,
            config,
            event_store,
            snapshot_writer: None,
        })
    }

    /// Replay existing data, register the event sink, start snapshots
    pub fn start(&mut self) -> IntegritySignals {
        let signals = replay_into_hub(&self.config, &self.hub);
        self.hub.add_listener(self.event_store.clone());
        self.snapshot_writer = Some(SnapshotWriter::start(
            self.hub.clone(),
            self.config.clone(),
        ));
        signals
    }

    /// Halt the snapshot writer; the event sink stays registered for the
    /// life of the hub
    pub fn stop(&mut self) {
        if let Some(mut writer) = self.snapshot_writer.take() {
            writer.stop();
        }
    }

    pub fn hub(&self) -> &Arc<StateHub> {
        &self.hub
    }

    pub fn config(&self) -> &PersistConfig {
        &self.config
    }

    pub fn event_store(&self) -> &Arc<EventStore> {
        &self.event_store
    }
}

/// Construct and start a persistence manager in one call
pub fn init_persistence(
    hub: Arc<StateHub>,
    config: PersistConfig,
) -> PersistResult<PersistenceManager> {
    let mut manager = PersistenceManager::new(hub, config)?;
    manager.start();
    Ok(manager)
}
