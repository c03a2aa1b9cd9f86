//! Ledger entry types for the hash-chained audit log
//!
//! A `LedgerEntry` is one immutable record in the chain. Each entry embeds
//! the SHA-256 hash of its predecessor, so any retroactive edit breaks the
//! chain and is detectable by a full verification walk.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Closed set of operations worth tamper evidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    /// An actor asserted authority over a peer (routed, not adjudicated)
    AuthorityAsserted,
    /// A monitoring probe detected a notable metric on a peer
    MonitoringDetected,
    /// A resource was allocated to a component
    ResourceAllocated,
    /// A policy decision was applied
    PolicyEnforced,
    /// A conflict between peers was resolved
    PeerConflictResolved,
    /// The system recovered from an error
    ErrorRecovered,
    /// State was synchronized with a peer
    PeerSynchronization,
    /// A self-reflection cycle completed
    SystemSelfReflection,
    /// A new capability was derived
    CapabilityEvolved,
}

impl OperationType {
    /// All variants in declaration order
    pub const ALL: [OperationType; 9] = [
        OperationType::AuthorityAsserted,
        OperationType::MonitoringDetected,
        OperationType::ResourceAllocated,
        OperationType::PolicyEnforced,
        OperationType::PeerConflictResolved,
        OperationType::ErrorRecovered,
        OperationType::PeerSynchronization,
        OperationType::SystemSelfReflection,
        OperationType::CapabilityEvolved,
    ];

    /// Stable string form (matches the serde representation)
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::AuthorityAsserted => "authority_asserted",
            OperationType::MonitoringDetected => "monitoring_detected",
            OperationType::ResourceAllocated => "resource_allocated",
            OperationType::PolicyEnforced => "policy_enforced",
            OperationType::PeerConflictResolved => "peer_conflict_resolved",
            OperationType::ErrorRecovered => "error_recovered",
            OperationType::PeerSynchronization => "peer_synchronization",
            OperationType::SystemSelfReflection => "system_self_reflection",
            OperationType::CapabilityEvolved => "capability_evolved",
        }
    }
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// External sibling peers an entry may reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerSystem {
    KayGee,
    CaliXOne,
    UcmCoreEcm,
    CaleonGenesis,
}

impl PeerSystem {
    /// Stable string form (matches the serde representation)
    pub fn as_str(&self) -> &'static str {
        match self {
            PeerSystem::KayGee => "kay_gee",
            PeerSystem::CaliXOne => "cali_x_one",
            PeerSystem::UcmCoreEcm => "ucm_core_ecm",
            PeerSystem::CaleonGenesis => "caleon_genesis",
        }
    }
}

impl std::fmt::Display for PeerSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

fn default_writer_id() -> String {
    "peer_orchestrator".to_string()
}

fn default_assertion_level() -> String {
    "observation".to_string()
}

fn default_true() -> bool {
    true
}

/// One immutable record in the hash chain
///
/// `sequence_number` is the authoritative ordering; `timestamp` is
/// informational only. `entry_hash` covers every field except itself and
/// `integrity_verified`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Globally unique identifier, assigned at creation
    pub entry_id: Uuid,

    /// Strictly increasing, starting at 1, assigned at append time
    pub sequence_number: u64,

    /// RFC 3339 creation time (non-authoritative for ordering)
    pub timestamp: String,

    /// What kind of operation this entry records
    pub operation_type: OperationType,

    /// Free-form payload (key order irrelevant to hashing)
    #[serde(default)]
    pub content: Map<String, Value>,

    /// Free-form annotations (key order irrelevant to hashing)
    #[serde(default)]
    pub metadata: Map<String, Value>,

    /// `entry_hash` of the prior entry, empty string for the first entry
    #[serde(default)]
    pub previous_hash: String,

    /// Identity of the logical actor appending the entry
    #[serde(default = "default_writer_id")]
    pub writer_id: String,

    /// Optional reference to an external peer
    #[serde(default)]
    pub sibling_target: Option<PeerSystem>,

    /// Declared force of the entry, e.g. "observation" or "command"
    #[serde(default = "default_assertion_level")]
    pub assertion_level: String,

    /// Result of the last `verify` run; untrusted until verified
    #[serde(default = "default_true")]
    pub integrity_verified: bool,

    /// SHA-256 hex digest of the canonical entry payload
    #[serde(default)]
    pub entry_hash: String,
}

impl LedgerEntry {
    /// Create a fresh entry with a new id and current timestamp
    ///
    /// The hash fields are left empty; `compute_hash`/`verify` fill them in.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sequence_number: u64,
        operation_type: OperationType,
        content: Map<String, Value>,
        metadata: Map<String, Value>,
        previous_hash: String,
        writer_id: String,
        sibling_target: Option<PeerSystem>,
        assertion_level: String,
    ) -> Self {
        Self {
            entry_id: Uuid::new_v4(),
            sequence_number,
            timestamp: Utc::now().to_rfc3339(),
            operation_type,
            content,
            metadata,
            previous_hash,
            writer_id,
            sibling_target,
            assertion_level,
            integrity_verified: true,
            entry_hash: String::new(),
        }
    }

    /// Compute the SHA-256 hex digest over the canonical entry payload
    ///
    /// The payload is a JSON object with sorted keys covering every field
    /// except `entry_hash` and `integrity_verified`. `serde_json` maps are
    /// key-sorted, so the digest is independent of insertion order.
    pub fn compute_hash(&self) -> String {
        let payload = json!({
            "entry_id": self.entry_id,
            "sequence_number": self.sequence_number,
            "timestamp": self.timestamp,
            "operation_type": self.operation_type,
            "content": self.content,
            "metadata": self.metadata,
            "previous_hash": self.previous_hash,
            "writer_id": self.writer_id,
            "sibling_target": self.sibling_target,
            "assertion_level": self.assertion_level,
        });
        let canonical = payload.to_string();

        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Verify this entry against the expected predecessor hash
    ///
    /// Returns false (and marks the entry unverified) if the link is broken
    /// or the stored hash does not match the recomputed one. On success the
    /// stored hash is filled in if it was empty.
    pub fn verify(&mut self, expected_previous_hash: &str) -> bool {
        if self.previous_hash != expected_previous_hash {
            self.integrity_verified = false;
            return false;
        }

        let computed = self.compute_hash();
        if !self.entry_hash.is_empty() && self.entry_hash != computed {
            self.integrity_verified = false;
            return false;
        }

        self.entry_hash = computed;
        self.integrity_verified = true;
        true
    }

    /// Serialize to a JSON string (for JSONL)
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from a JSON string
    pub fn from_json_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}
