//! Periodic full-state snapshot writer
//!
//! A dedicated thread appends `{timestamp, state}` lines to the snapshots
//! file on a fixed interval. Durability here is best-effort by design: a
//! failed tick is logged and the loop continues. Snapshots bound replay
//! cost; they are derived data, never authoritative.

use std::fs::OpenOptions;
use std::io::Write;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::warn;

use super::{PersistConfig, PersistResult};
use crate::hub::StateHub;
use crate::types::{IntegrityUpdate, SnapshotRecord};
use crate::utils::time::now_ts;

/// Background thread that snapshots the hub on a fixed interval
///
/// Each successful tick also records `last_snapshot_ts` into the hub's
/// integrity side-channel.
pub struct SnapshotWriter {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl SnapshotWriter {
    /// Spawn the snapshot thread
    pub fn start(hub: Arc<StateHub>, config: PersistConfig) -> Self {
        let (stop_tx, stop_rx) = mpsc::channel();
        let interval = config.snapshot_interval;
        let path = config.snapshots_path();

        let handle = thread::Builder::new()
            .name("snapshot-writer".to_string())
            .spawn(move || loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        if let Err(e) = Self::write_tick(&hub, &path) {
                            warn!(path = %path.display(), error = %e, "snapshot tick failed; continuing");
                        }
                    }
                    // Stop requested or the writer handle was dropped.
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })
            .ok();

        if handle.is_none() {
            warn!("failed to spawn snapshot writer thread");
        }

        Self {
            stop_tx,
            handle,
        }
    }

    fn write_tick(hub: &StateHub, path: &std::path::Path) -> PersistResult<()> {
        let record = SnapshotRecord {
            timestamp: now_ts(),
            state: hub.snapshot(),
        };
        let line = record.to_json_line()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", line)?;
        file.flush()?;

        hub.set_integrity(IntegrityUpdate::default().last_snapshot_ts(record.timestamp));
        Ok(())
    }

    /// Signal the thread to stop and wait for it to exit
    pub fn stop(&mut self) {
        let _ = self.stop_tx.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for SnapshotWriter {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::BufRead;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_snapshots_accumulate_and_record_integrity() {
        let temp_dir = TempDir::new().unwrap();
        let config =
            PersistConfig::new(temp_dir.path()).with_snapshot_interval(Duration::from_millis(20));
        let hub = Arc::new(StateHub::new());
        hub.set_divergence(true);

        let mut writer = SnapshotWriter::start(hub.clone(), config.clone());
        thread::sleep(Duration::from_millis(120));
        writer.stop();

        let content = fs::read_to_string(config.snapshots_path()).unwrap();
        let lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();
        assert!(lines.len() >= 2, "expected multiple snapshot ticks");

        let record = SnapshotRecord::from_json_line(lines[0]).unwrap();
        assert!(record.state.divergence);

        let signals = hub.get_integrity();
        assert!(signals.last_snapshot_ts.is_some());
    }

    #[test]
    fn test_stop_halts_ticks() {
        let temp_dir = TempDir::new().unwrap();
        let config =
            PersistConfig::new(temp_dir.path()).with_snapshot_interval(Duration::from_millis(10));
        let hub = Arc::new(StateHub::new());

        let mut writer = SnapshotWriter::start(hub, config.clone());
        thread::sleep(Duration::from_millis(50));
        writer.stop();

        let count_after_stop = fs::File::open(config.snapshots_path())
            .map(|f| std::io::BufReader::new(f).lines().count())
            .unwrap_or(0);
        thread::sleep(Duration::from_millis(50));
        let count_later = fs::File::open(config.snapshots_path())
            .map(|f| std::io::BufReader::new(f).lines().count())
            .unwrap_or(0);

        assert_eq!(count_after_stop, count_later);
    }
}
