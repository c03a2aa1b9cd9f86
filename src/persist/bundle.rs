//! Offline bundle export and import
//!
//! A bundle is a directory with `events.jsonl`, `snapshots.jsonl`, and a
//! `manifest.json` carrying SHA-256 hashes, record counts, and time ranges.
//! Import validates the manifest before touching the live store; a mismatch
//! is reported in the outcome, never raised, and nothing is imported.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use super::{replay, PersistConfig, PersistResult};
use crate::hub::StateHub;
use crate::types::IntegritySignals;
use crate::utils::atomic::atomic_write;
use crate::utils::hash::sha256_file;
use crate::utils::time::{iso_now, utc_compact};

/// Manifest section for one concatenated stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamManifest {
    /// SHA-256 hex digest of the concatenated file
    pub hash: String,
    /// Filename within the bundle
    pub path: String,
    pub count: usize,
    pub start_ts: Option<f64>,
    pub end_ts: Option<f64>,
}

/// Bundle manifest: hashes, counts, and time ranges for both streams
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleManifest {
    /// RFC 3339 export time
    pub generated_at: String,
    pub events: StreamManifest,
    pub snapshots: StreamManifest,
}

/// Result of a bundle import
#[derive(Debug, Clone, Serialize)]
pub struct ImportOutcome {
    pub status: ImportStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replay: Option<IntegritySignals>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub events_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshots_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStatus {
    Ok,
    NeedsAttention,
}

fn time_range(timestamps: impl Iterator<Item = Option<f64>>) -> (Option<f64>, Option<f64>) {
    let mut start = None;
    let mut end = None;
    for ts in timestamps.flatten() {
        start = Some(start.map_or(ts, |s: f64| s.min(ts)));
        end = Some(end.map_or(ts, |e: f64| e.max(ts)));
    }
    (start, end)
}

/// Package the full event/snapshot history into `dest` with a manifest
pub fn export_bundle(config: &PersistConfig, dest: &Path) -> PersistResult<BundleManifest> {
    fs::create_dir_all(dest)?;

    let events_out = dest.join("events.jsonl");
    let snapshots_out = dest.join("snapshots.jsonl");

    // Concatenate events in replay order.
    let (events, _) = replay::read_events(config);
    {
        let mut file = File::create(&events_out)?;
        for event in &events {
            writeln!(file, "{}", event.to_json_line()?)?;
        }
        file.sync_all()?;
    }

    // Concatenate snapshot records in file order.
    let snapshots = replay::read_snapshots(config);
    {
        let mut file = File::create(&snapshots_out)?;
        for record in &snapshots {
            writeln!(file, "{}", record.to_json_line()?)?;
        }
        file.sync_all()?;
    }

    let (ev_start, ev_end) = time_range(events.iter().map(|e| e.timestamp));
    let (snap_start, snap_end) = time_range(snapshots.iter().map(|s| Some(s.timestamp)));

    let manifest = BundleManifest {
        generated_at: iso_now(),
        events: StreamManifest {
            hash: sha256_file(&events_out)?,
            path: "events.jsonl".to_string(),
            count: events.len(),
            start_ts: ev_start,
            end_ts: ev_end,
        },
        snapshots: StreamManifest {
            hash: sha256_file(&snapshots_out)?,
            path: "snapshots.jsonl".to_string(),
            count: snapshots.len(),
            start_ts: snap_start,
            end_ts: snap_end,
        },
    };

    atomic_write(
        dest.join("manifest.json"),
        &serde_json::to_string_pretty(&manifest)?,
    )?;

    info!(
        dest = %dest.display(),
        events = manifest.events.count,
        snapshots = manifest.snapshots.count,
        "exported bundle"
    );
    Ok(manifest)
}

/// Fresh, never-overwriting destination name in `dir`
fn imported_path(dir: &Path, prefix: &str) -> PathBuf {
    let stamp = utc_compact();
    let mut candidate = dir.join(format!("{}-{}.jsonl", prefix, stamp));
    let mut counter = 1u32;
    while candidate.exists() {
        candidate = dir.join(format!("{}-{}-{}.jsonl", prefix, stamp, counter));
        counter += 1;
    }
    candidate
}

/// Restore a bundle into the live store and rebuild the hub from disk
///
/// If a manifest is present its hashes are validated first; a mismatch
/// returns `needs_attention` without importing anything. On success both
/// files are copied under fresh names in the live directories (append-only,
/// never overwriting) and a full replay rebuilds the hub.
pub fn import_bundle(
    config: &PersistConfig,
    hub: &StateHub,
    source: &Path,
) -> PersistResult<ImportOutcome> {
    let events_path = source.join("events.jsonl");
    let snapshots_path = source.join("snapshots.jsonl");
    let manifest_path = source.join("manifest.json");

    if manifest_path.exists() {
        let manifest: BundleManifest = serde_json::from_str(&fs::read_to_string(&manifest_path)?)?;

        if let Some(detail) = check_stream(&manifest.events, &events_path, "events")? {
            return Ok(needs_attention(detail));
        }
        if let Some(detail) = check_stream(&manifest.snapshots, &snapshots_path, "snapshots")? {
            return Ok(needs_attention(detail));
        }
    }

    config.ensure_dirs()?;
    let mut events_file = None;
    let mut snapshots_file = None;

    if events_path.exists() {
        let dest = imported_path(&config.events_dir(), "imported-events");
        fs::copy(&events_path, &dest)?;
        events_file = Some(dest);
    }
    if snapshots_path.exists() {
        let dest = imported_path(&config.snapshots_dir(), "imported-snapshots");
        fs::copy(&snapshots_path, &dest)?;
        snapshots_file = Some(dest);
    }

    let signals = replay::replay_into_hub(config, hub);

    info!(source = %source.display(), "imported bundle");
    Ok(ImportOutcome {
        status: ImportStatus::Ok,
        detail: None,
        replay: Some(signals),
        events_file,
        snapshots_file,
    })
}

fn check_stream(
    manifest: &StreamManifest,
    path: &Path,
    name: &str,
) -> PersistResult<Option<String>> {
    if manifest.hash.is_empty() {
        return Ok(None);
    }
    if !path.exists() {
        return Ok(Some(format!("{} file missing from bundle", name)));
    }
    let actual = sha256_file(path)?;
    if actual != manifest.hash {
        return Ok(Some(format!("{} hash mismatch", name)));
    }
    Ok(None)
}

fn needs_attention(detail: String) -> ImportOutcome {
    ImportOutcome {
        status: ImportStatus::NeedsAttention,
        detail: Some(detail),
        replay: None,
        events_file: None,
        snapshots_file: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{HubEvent, SnapshotRecord};
    use std::io::Write;
    use tempfile::TempDir;

    fn seed_store(config: &PersistConfig) {
        config.ensure_dirs().unwrap();

        let mut events = File::create(config.events_dir().join("events-0001.jsonl")).unwrap();
        for i in 0..3 {
            let event = HubEvent::action("DALS", format!("op-{}", i)).with_timestamp(10.0 + i as f64);
            writeln!(events, "{}", event.to_json_line().unwrap()).unwrap();
        }

        let mut snaps = File::create(config.snapshots_path()).unwrap();
        let record = SnapshotRecord {
            timestamp: 5.0,
            state: crate::types::HubState::default(),
        };
        writeln!(snaps, "{}", record.to_json_line().unwrap()).unwrap();
    }

    #[test]
    fn test_export_manifest_counts_and_ranges() {
        let temp_dir = TempDir::new().unwrap();
        let config = PersistConfig::new(temp_dir.path().join("store"));
        seed_store(&config);

        let dest = temp_dir.path().join("bundle");
        let manifest = export_bundle(&config, &dest).unwrap();

        assert_eq!(manifest.events.count, 3);
        assert_eq!(manifest.events.start_ts, Some(10.0));
        assert_eq!(manifest.events.end_ts, Some(12.0));
        assert_eq!(manifest.snapshots.count, 1);
        assert_eq!(manifest.events.hash, sha256_file(dest.join("events.jsonl")).unwrap());
        assert!(dest.join("manifest.json").exists());
    }

    #[test]
    fn test_import_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let source_config = PersistConfig::new(temp_dir.path().join("source"));
        seed_store(&source_config);

        let bundle = temp_dir.path().join("bundle");
        export_bundle(&source_config, &bundle).unwrap();

        let dest_config = PersistConfig::new(temp_dir.path().join("dest"));
        let hub = StateHub::new();
        let outcome = import_bundle(&dest_config, &hub, &bundle).unwrap();

        assert_eq!(outcome.status, ImportStatus::Ok);
        assert!(outcome.events_file.unwrap().exists());
        assert!(outcome.snapshots_file.unwrap().exists());

        // The hub was rebuilt from the imported history.
        let state = hub.snapshot();
        assert_eq!(state.events.len(), 3);
        assert_eq!(state.systems.get("DALS").unwrap().last_event, Some(12.0));
    }

    #[test]
    fn test_import_rejects_tampered_events() {
        let temp_dir = TempDir::new().unwrap();
        let source_config = PersistConfig::new(temp_dir.path().join("source"));
        seed_store(&source_config);

        let bundle = temp_dir.path().join("bundle");
        export_bundle(&source_config, &bundle).unwrap();

        // Tamper with the exported events after the manifest was written.
        let mut file = fs::OpenOptions::new()
            .append(true)
            .open(bundle.join("events.jsonl"))
            .unwrap();
        writeln!(file, "{}", HubEvent::action("DALS", "forged").to_json_line().unwrap()).unwrap();

        let dest_config = PersistConfig::new(temp_dir.path().join("dest"));
        let hub = StateHub::new();
        let outcome = import_bundle(&dest_config, &hub, &bundle).unwrap();

        assert_eq!(outcome.status, ImportStatus::NeedsAttention);
        assert!(outcome.detail.unwrap().contains("events hash mismatch"));
        // Nothing was imported.
        assert!(hub.snapshot().events.is_empty());
        assert!(!dest_config.events_dir().exists() || fs::read_dir(dest_config.events_dir()).unwrap().count() == 0);
    }

    #[test]
    fn test_import_without_manifest_still_works() {
        let temp_dir = TempDir::new().unwrap();
        let bundle = temp_dir.path().join("bundle");
        fs::create_dir_all(&bundle).unwrap();
        let mut file = File::create(bundle.join("events.jsonl")).unwrap();
        writeln!(
            file,
            "{}",
            HubEvent::action("GOAT", "solo").with_timestamp(1.0).to_json_line().unwrap()
        )
        .unwrap();

        let config = PersistConfig::new(temp_dir.path().join("dest"));
        let hub = StateHub::new();
        let outcome = import_bundle(&config, &hub, &bundle).unwrap();

        assert_eq!(outcome.status, ImportStatus::Ok);
        assert_eq!(hub.snapshot().events.len(), 1);
    }

    #[test]
    fn test_imported_files_participate_in_later_replay() {
        let temp_dir = TempDir::new().unwrap();
        let source_config = PersistConfig::new(temp_dir.path().join("source"));
        seed_store(&source_config);
        let bundle = temp_dir.path().join("bundle");
        export_bundle(&source_config, &bundle).unwrap();

        let dest_config = PersistConfig::new(temp_dir.path().join("dest"));
        import_bundle(&dest_config, &StateHub::new(), &bundle).unwrap();

        // A fresh replay, independent of the import call, sees the history.
        let hub = StateHub::new();
        replay::replay_into_hub(&dest_config, &hub);
        assert_eq!(hub.snapshot().events.len(), 3);
    }
}
