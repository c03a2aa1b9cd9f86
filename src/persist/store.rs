//! Rotating append-only event log
//!
//! One JSON object per line. After each write the file size is checked
//! against the rotation threshold; a full file is closed and a fresh
//! timestamped file opened. Rotation never loses or reorders written events;
//! full history is the concatenation of all event files in filename order.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::{PersistConfig, PersistResult};
use crate::hub::{EventSink, SinkError};
use crate::types::HubEvent;
use crate::utils::time::utc_compact;

struct Writer {
    file: File,
    path: PathBuf,
    written: u64,
}

/// File-backed append-only writer for hub events
///
/// Registered on the hub as an `EventSink`; the hub calls `append`
/// synchronously from within `record_event`, so file write order matches
/// append order.
pub struct EventStore {
    config: PersistConfig,
    inner: Mutex<Writer>,
}

impl EventStore {
    /// Open the store, creating directories and the first event file
    pub fn open(config: PersistConfig) -> PersistResult<Self> {
        config.ensure_dirs()?;
        let path = Self::new_file_path(&config);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            config,
            inner: Mutex::new(Writer {
                file,
                path,
                written: 0,
            }),
        })
    }

    /// Path of the file currently being written
    pub fn current_path(&self) -> PathBuf {
        self.inner.lock().path.clone()
    }

    /// Append one event as a JSON line, rotating afterwards if the file
    /// has reached the configured threshold
    pub fn append(&self, event: &HubEvent) -> PersistResult<()> {
        let line = event.to_json_line()?;

        let mut writer = self.inner.lock();
        writeln!(writer.file, "{}", line)?;
        writer.file.flush()?;
        writer.written += line.len() as u64 + 1;

        if writer.written >= self.config.rotate_bytes {
            self.rotate(&mut writer)?;
        }
        Ok(())
    }

    /// Close the full file and open a fresh one
    fn rotate(&self, writer: &mut Writer) -> PersistResult<()> {
        let rotated = writer.path.clone();

        let path = Self::new_file_path(&self.config);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        debug!(from = %rotated.display(), to = %path.display(), "rotated event log");

        writer.file = file;
        writer.path = path;
        writer.written = 0;

        if !self.config.keep_archives {
            if let Err(e) = fs::remove_file(&rotated) {
                warn!(path = %rotated.display(), error = %e, "failed to remove rotated event file");
            }
        }
        Ok(())
    }

    /// Fresh event file path; the millisecond stamp sorts chronologically,
    /// with a numeric suffix on the rare same-millisecond collision
    fn new_file_path(config: &PersistConfig) -> PathBuf {
        let dir = config.events_dir();
        let stamp = utc_compact();
        let mut candidate = dir.join(format!("events-{}.jsonl", stamp));
        let mut counter = 1u32;
        while candidate.exists() {
            candidate = dir.join(format!("events-{}-{}.jsonl", stamp, counter));
            counter += 1;
        }
        candidate
    }
}

impl EventSink for EventStore {
    fn on_event(&self, event: &HubEvent) -> Result<(), SinkError> {
        self.append(event).map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader};
    use tempfile::TempDir;

    fn read_all_events(dir: &std::path::Path) -> Vec<HubEvent> {
        let mut files: Vec<PathBuf> = fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .collect();
        files.sort();

        let mut events = Vec::new();
        for path in files {
            let reader = BufReader::new(File::open(path).unwrap());
            for line in reader.lines() {
                let line = line.unwrap();
                if !line.trim().is_empty() {
                    events.push(HubEvent::from_json_line(&line).unwrap());
                }
            }
        }
        events
    }

    #[test]
    fn test_append_writes_json_lines() {
        let temp_dir = TempDir::new().unwrap();
        let config = PersistConfig::new(temp_dir.path());
        let store = EventStore::open(config.clone()).unwrap();

        for i in 0..3 {
            store
                .append(&HubEvent::action("DALS", format!("op-{}", i)).with_timestamp(i as f64))
                .unwrap();
        }

        let events = read_all_events(&config.events_dir());
        assert_eq!(events.len(), 3);
        assert_eq!(events[2].action.as_deref(), Some("op-2"));
    }

    #[test]
    fn test_rotation_preserves_order() {
        let temp_dir = TempDir::new().unwrap();
        // Tiny threshold so each write triggers rotation checks quickly.
        let config = PersistConfig::new(temp_dir.path()).with_rotate_bytes(120);
        let store = EventStore::open(config.clone()).unwrap();

        for i in 0..10 {
            store
                .append(&HubEvent::action("GOAT", format!("op-{:02}", i)).with_timestamp(i as f64))
                .unwrap();
        }

        let file_count = fs::read_dir(config.events_dir()).unwrap().count();
        assert!(file_count > 1, "expected rotation to produce multiple files");

        // Concatenation in filename order reproduces the append sequence.
        let events = read_all_events(&config.events_dir());
        assert_eq!(events.len(), 10);
        for (i, event) in events.iter().enumerate() {
            assert_eq!(event.action.as_deref(), Some(format!("op-{:02}", i).as_str()));
        }
    }

    #[test]
    fn test_rotation_discards_archives_when_configured() {
        let temp_dir = TempDir::new().unwrap();
        let config = PersistConfig::new(temp_dir.path())
            .with_rotate_bytes(60)
            .with_keep_archives(false);
        let store = EventStore::open(config.clone()).unwrap();

        for i in 0..6 {
            store
                .append(&HubEvent::action("DALS", format!("op-{}", i)))
                .unwrap();
        }

        // Only the active file survives.
        let file_count = fs::read_dir(config.events_dir()).unwrap().count();
        assert_eq!(file_count, 1);
    }

    #[test]
    fn test_sink_adapter() {
        let temp_dir = TempDir::new().unwrap();
        let config = PersistConfig::new(temp_dir.path());
        let store = EventStore::open(config.clone()).unwrap();

        store.on_event(&HubEvent::action("CertSig", "attest")).unwrap();

        let events = read_all_events(&config.events_dir());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].target.as_deref(), Some("CertSig"));
    }
}
