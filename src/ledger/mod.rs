//! Hash-chained append-only ledger
//!
//! The `HashChainLedger` records high-value assertions with tamper evidence:
//! each entry embeds the SHA-256 hash of its predecessor, so any retroactive
//! edit is detectable by `verify_chain`. Entries live in memory plus a JSONL
//! mirror on disk, loaded and re-verified at open time.
//!
//! The ledger is deliberately synchronous: disk writes happen under the
//! chain lock, which bounds throughput by write latency. It only carries
//! asserted operations, not the hub's full operational event stream, so the
//! volume stays low.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use tracing::warn;

use crate::types::{LedgerEntry, OperationType, PeerSystem};
use crate::utils::time::utc_compact;

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Errors that can occur in ledger operations
///
/// Only `Integrity` is ever surfaced from `append`; I/O problems on the
/// mirror are logged and degrade to in-memory-only operation.
#[derive(Debug)]
pub enum LedgerError {
    Io(io::Error),
    Json(serde_json::Error),
    Integrity(String),
}

impl std::fmt::Display for LedgerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerError::Io(e) => write!(f, "IO error: {}", e),
            LedgerError::Json(e) => write!(f, "JSON error: {}", e),
            LedgerError::Integrity(msg) => write!(f, "Integrity violation: {}", msg),
        }
    }
}

impl std::error::Error for LedgerError {}

impl From<io::Error> for LedgerError {
    fn from(e: io::Error) -> Self {
        LedgerError::Io(e)
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(e: serde_json::Error) -> Self {
        LedgerError::Json(e)
    }
}

/// Aggregate counts over the chain, for status surfaces
#[derive(Debug, Clone, Default, Serialize)]
pub struct OperationalSummary {
    pub total_entries: usize,
    pub last_sequence: u64,
    pub operation_counts: BTreeMap<String, u64>,
    pub peer_interactions: BTreeMap<String, u64>,
}

#[derive(Default)]
struct ChainInner {
    entries: Vec<LedgerEntry>,
    last_sequence: u64,
    last_hash: String,
}

/// Append-only sequence of cryptographically linked entries
///
/// One lock guards the sequence counter, the tail hash, the in-memory list,
/// and the mirror write, so an append is atomic end to end.
pub struct HashChainLedger {
    path: PathBuf,
    writer_id: String,
    inner: Mutex<ChainInner>,
}

impl HashChainLedger {
    /// Open (or create) the ledger stored at `<dir>/<ledger_id>.ledger.jsonl`
    ///
    /// An existing mirror is loaded and re-verified in sequence order. An
    /// unreadable mirror is quarantined under a `.corrupt-<stamp>` name and
    /// the chain starts empty; the owning process stays bootable, and the
    /// damaged history is preserved for inspection.
    pub fn open<P: AsRef<Path>>(
        dir: P,
        ledger_id: &str,
        writer_id: impl Into<String>,
    ) -> LedgerResult<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}.ledger.jsonl", ledger_id));

        let inner = Self::load_from_disk(&path);

        Ok(Self {
            path,
            writer_id: writer_id.into(),
            inner: Mutex::new(inner),
        })
    }

    /// Identity recorded on every entry this handle appends
    pub fn writer_id(&self) -> &str {
        &self.writer_id
    }

    /// Path of the on-disk mirror
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of entries in the chain
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Highest assigned sequence number (0 when empty)
    pub fn last_sequence(&self) -> u64 {
        self.inner.lock().last_sequence
    }

    /// Hash of the chain tail (empty string when empty)
    pub fn tail_hash(&self) -> String {
        self.inner.lock().last_hash.clone()
    }

    /// Append a new entry to the chain
    ///
    /// Assigns the next sequence number, links to the current tail, computes
    /// and verifies the hash, then commits: in-memory list, tail hash, and
    /// one JSON line on the mirror. A verification failure leaves the chain
    /// completely untouched. A mirror write failure is logged, not raised.
    pub fn append(
        &self,
        operation_type: OperationType,
        content: Map<String, Value>,
        metadata: Map<String, Value>,
        sibling_target: Option<PeerSystem>,
        assertion_level: impl Into<String>,
    ) -> LedgerResult<LedgerEntry> {
        let mut inner = self.inner.lock();

        let entry = LedgerEntry::new(
            inner.last_sequence + 1,
            operation_type,
            content,
            metadata,
            inner.last_hash.clone(),
            self.writer_id.clone(),
            sibling_target,
            assertion_level.into(),
        );
        self.commit(&mut inner, entry)
    }

    /// Verify and commit a fully built entry against the current tail
    ///
    /// The entry must carry the next sequence number and the tail's hash as
    /// its `previous_hash`; anything else is an integrity violation and the
    /// chain is left untouched.
    pub fn append_entry(&self, entry: LedgerEntry) -> LedgerResult<LedgerEntry> {
        let mut inner = self.inner.lock();
        self.commit(&mut inner, entry)
    }

    fn commit(&self, inner: &mut ChainInner, mut entry: LedgerEntry) -> LedgerResult<LedgerEntry> {
        if entry.sequence_number != inner.last_sequence + 1 {
            return Err(LedgerError::Integrity(format!(
                "entry {} is out of sequence (tail is {})",
                entry.sequence_number, inner.last_sequence
            )));
        }

        if entry.entry_hash.is_empty() {
            entry.entry_hash = entry.compute_hash();
        }
        let expected_previous = inner.last_hash.clone();
        if !entry.verify(&expected_previous) {
            return Err(LedgerError::Integrity(format!(
                "entry {} failed chain verification",
                entry.sequence_number
            )));
        }

        inner.last_sequence = entry.sequence_number;
        inner.last_hash = entry.entry_hash.clone();
        inner.entries.push(entry.clone());

        self.write_entry(&entry);
        Ok(entry)
    }

    /// Record a monitoring detection against a peer
    pub fn record_monitoring(
        &self,
        peer: PeerSystem,
        detection_type: &str,
        detected_metric: &str,
        metric_value: Value,
        metadata: Option<Map<String, Value>>,
    ) -> LedgerResult<LedgerEntry> {
        let content = object(json!({
            "detection_type": detection_type,
            "detected_metric": detected_metric,
            "metric_value": metric_value,
        }));
        self.append(
            OperationType::MonitoringDetected,
            content,
            metadata.unwrap_or_default(),
            Some(peer),
            "observation",
        )
    }

    /// Record an authority command routed to a peer
    pub fn record_authority_command(
        &self,
        peer: PeerSystem,
        command: &str,
        justification: &str,
        params: Option<Value>,
        assertion_level: &str,
    ) -> LedgerResult<LedgerEntry> {
        let content = object(json!({
            "action_taken": command,
            "justification": justification,
            "params": params.unwrap_or_else(|| json!({})),
        }));
        let metadata = object(json!({
            "note": "authority routed, not adjudicated",
        }));
        self.append(
            OperationType::AuthorityAsserted,
            content,
            metadata,
            Some(peer),
            assertion_level,
        )
    }

    /// Record a derived capability
    pub fn record_capability_evolution(
        &self,
        capability_name: &str,
        significance: f64,
        derivation_context: Value,
        metadata: Option<Map<String, Value>>,
    ) -> LedgerResult<LedgerEntry> {
        let content = object(json!({
            "capability_name": capability_name,
            "significance": significance,
            "derivation_context": derivation_context,
        }));
        self.append(
            OperationType::CapabilityEvolved,
            content,
            metadata.unwrap_or_default(),
            None,
            "observation",
        )
    }

    /// Walk the whole chain with a running expected hash
    ///
    /// Returns `(true, 0)` when every link holds, or `(false, n)` with the
    /// first failing sequence number. Non-raising; meant for audits.
    pub fn verify_chain(&self) -> (bool, u64) {
        let mut inner = self.inner.lock();
        inner.entries.sort_by_key(|e| e.sequence_number);

        let mut expected = String::new();
        for entry in inner.entries.iter_mut() {
            if !entry.verify(&expected) {
                return (false, entry.sequence_number);
            }
            expected = entry.entry_hash.clone();
        }
        (true, 0)
    }

    /// Read-only copy of all entries, sorted by sequence
    pub fn export_snapshot(&self) -> Vec<LedgerEntry> {
        let inner = self.inner.lock();
        let mut entries = inner.entries.clone();
        entries.sort_by_key(|e| e.sequence_number);
        entries
    }

    /// Aggregate counts per operation type and per peer
    pub fn operational_summary(&self) -> OperationalSummary {
        let inner = self.inner.lock();
        let mut summary = OperationalSummary {
            total_entries: inner.entries.len(),
            last_sequence: inner.last_sequence,
            ..OperationalSummary::default()
        };
        for entry in &inner.entries {
            *summary
                .operation_counts
                .entry(entry.operation_type.as_str().to_string())
                .or_insert(0) += 1;
            if let Some(peer) = entry.sibling_target {
                *summary
                    .peer_interactions
                    .entry(peer.as_str().to_string())
                    .or_insert(0) += 1;
            }
        }
        summary
    }

    fn load_from_disk(path: &Path) -> ChainInner {
        if !path.exists() {
            return ChainInner::default();
        }

        match Self::read_mirror(path) {
            Ok(inner) => inner,
            Err(e) => {
                Self::quarantine(path, &e);
                ChainInner::default()
            }
        }
    }

    /// Parse and re-verify the mirror in file order
    ///
    /// Broken links are tolerated (the entry is kept, marked unverified, so
    /// `verify_chain` can report them); unparseable data is a hard failure
    /// that triggers quarantine.
    fn read_mirror(path: &Path) -> LedgerResult<ChainInner> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut inner = ChainInner::default();

        for line_result in reader.lines() {
            let line = line_result?;
            if line.trim().is_empty() {
                continue;
            }

            let mut entry = LedgerEntry::from_json_line(&line)?;
            let expected = inner.last_hash.clone();
            entry.verify(&expected);

            inner.last_sequence = inner.last_sequence.max(entry.sequence_number);
            inner.last_hash = entry.entry_hash.clone();
            inner.entries.push(entry);
        }

        Ok(inner)
    }

    fn quarantine(path: &Path, cause: &LedgerError) {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "ledger".to_string());
        let quarantined = path.with_file_name(format!("{}.corrupt-{}", file_name, utc_compact()));

        match fs::rename(path, &quarantined) {
            Ok(()) => warn!(
                path = %path.display(),
                quarantined = %quarantined.display(),
                %cause,
                "ledger mirror unreadable; quarantined and starting empty"
            ),
            Err(rename_err) => warn!(
                path = %path.display(),
                %cause,
                error = %rename_err,
                "ledger mirror unreadable and quarantine rename failed; starting empty"
            ),
        }
    }

    /// Mirror one entry to disk; failures are logged, never raised
    fn write_entry(&self, entry: &LedgerEntry) {
        let result = entry
            .to_json_line()
            .map_err(LedgerError::from)
            .and_then(|line| {
                let mut file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&self.path)?;
                writeln!(file, "{}", line)?;
                file.flush()?;
                Ok(())
            });

        if let Err(e) = result {
            warn!(
                path = %self.path.display(),
                sequence = entry.sequence_number,
                error = %e,
                "failed to mirror ledger entry to disk"
            );
        }
    }
}

fn object(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}
