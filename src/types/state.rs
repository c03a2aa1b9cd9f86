//! Hub state and integrity signal types
//!
//! `HubState` is the full in-memory projection held by the state hub: core
//! health, system link state, the controls surface, the append-only event
//! sequence, and derived indices. It is plain data; `Clone` gives the deep
//! copy used for snapshots and `restore`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::event::HubEvent;

/// Systems the hub tracks from construction
pub const KNOWN_SYSTEMS: [&str; 4] = ["DALS", "GOAT", "TrueMark", "CertSig"];

/// Initial routing mode for every known system
pub const DEFAULT_ROUTING_MODE: &str = "via_dals";

/// Health record for one component, wholesale-replaced on update
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoreHealth {
    /// Observed availability, e.g. "online" or "degraded"
    pub availability: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_assertion: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<String>,
}

impl CoreHealth {
    /// Health record carrying only an availability string
    pub fn available(availability: impl Into<String>) -> Self {
        Self {
            availability: availability.into(),
            ..Self::default()
        }
    }
}

/// Link state for one external system, partial-merged on update
///
/// `connected` and `last_event` are always serialized (the seeded value is
/// explicit nulls); everything else appears once set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemLink {
    pub connected: Option<bool>,

    /// Timestamp of the last event targeting this system
    pub last_event: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queues: Option<Value>,

    /// Additional link fields, merged in by `update_system`
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Partial update for a system link; `None` fields are left untouched
#[derive(Debug, Clone, Default)]
pub struct SystemUpdate {
    pub connected: Option<bool>,
    pub mode: Option<String>,
    pub queues: Option<Value>,
    pub extra: Option<Map<String, Value>>,
}

impl SystemUpdate {
    pub fn connected(mut self, connected: bool) -> Self {
        self.connected = Some(connected);
        self
    }

    pub fn mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = Some(mode.into());
        self
    }

    pub fn queues(mut self, queues: Value) -> Self {
        self.queues = Some(queues);
        self
    }

    pub fn extra(mut self, extra: Map<String, Value>) -> Self {
        self.extra = Some(extra);
        self
    }
}

/// Routing and admission controls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Controls {
    /// Whether the hub is accepting control packets
    pub accepting: bool,

    /// Per-system routing mode
    pub routing_mode: BTreeMap<String, String>,
}

impl Default for Controls {
    fn default() -> Self {
        let routing_mode = KNOWN_SYSTEMS
            .iter()
            .map(|name| ((*name).to_string(), DEFAULT_ROUTING_MODE.to_string()))
            .collect();
        Self {
            accepting: true,
            routing_mode,
        }
    }
}

/// Full hub state: the authoritative in-memory projection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubState {
    /// Wall-clock time of the last mutation (Unix seconds)
    pub timestamp: Option<f64>,

    /// Component name -> health record
    pub cores: BTreeMap<String, CoreHealth>,

    /// System name -> link state, pre-seeded with the known systems
    pub systems: BTreeMap<String, SystemLink>,

    pub controls: Controls,

    /// Append-only attributed event sequence (durability is the event
    /// store's job, so this stays unbounded in memory)
    pub events: Vec<HubEvent>,

    /// Independently settable divergence flag
    pub divergence: bool,

    /// Target name -> timestamp of the last event aimed at it
    pub last_event_by_target: BTreeMap<String, f64>,

    /// Most recent issuer signal, if any event carried one
    pub iss_now: Option<Value>,

    /// Issuer signal of the last event that carried one
    pub last_event_iss: Option<Value>,
}

impl Default for HubState {
    fn default() -> Self {
        let systems = KNOWN_SYSTEMS
            .iter()
            .map(|name| ((*name).to_string(), SystemLink::default()))
            .collect();
        Self {
            timestamp: None,
            cores: BTreeMap::new(),
            systems,
            controls: Controls::default(),
            events: Vec::new(),
            divergence: false,
            last_event_by_target: BTreeMap::new(),
            iss_now: None,
            last_event_iss: None,
        }
    }
}

/// Advisory replay/persistence health, never read by decision logic
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrityStatus {
    #[default]
    Unknown,
    Ok,
    Partial,
    NeedsAttention,
}

impl IntegrityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntegrityStatus::Unknown => "unknown",
            IntegrityStatus::Ok => "ok",
            IntegrityStatus::Partial => "partial",
            IntegrityStatus::NeedsAttention => "needs_attention",
        }
    }
}

impl std::fmt::Display for IntegrityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Observability side-channel kept separate from the main hub state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntegritySignals {
    pub last_snapshot_ts: Option<f64>,
    pub last_event_ts: Option<f64>,
    pub replay_duration_ms: Option<u64>,
    pub integrity_status: IntegrityStatus,
}

/// Partial update for the integrity side-channel
#[derive(Debug, Clone, Default)]
pub struct IntegrityUpdate {
    pub last_snapshot_ts: Option<f64>,
    pub last_event_ts: Option<f64>,
    pub replay_duration_ms: Option<u64>,
    pub integrity_status: Option<IntegrityStatus>,
}

impl IntegrityUpdate {
    pub fn last_snapshot_ts(mut self, ts: f64) -> Self {
        self.last_snapshot_ts = Some(ts);
        self
    }

    pub fn last_event_ts(mut self, ts: f64) -> Self {
        self.last_event_ts = Some(ts);
        self
    }

    pub fn replay_duration_ms(mut self, ms: u64) -> Self {
        self.replay_duration_ms = Some(ms);
        self
    }

    pub fn integrity_status(mut self, status: IntegrityStatus) -> Self {
        self.integrity_status = Some(status);
        self
    }
}

impl IntegritySignals {
    /// Apply the set fields of an update, leaving the rest untouched
    pub fn merge(&mut self, update: IntegrityUpdate) {
        if let Some(ts) = update.last_snapshot_ts {
            self.last_snapshot_ts = Some(ts);
        }
        if let Some(ts) = update.last_event_ts {
            self.last_event_ts = Some(ts);
        }
        if let Some(ms) = update.replay_duration_ms {
            self.replay_duration_ms = Some(ms);
        }
        if let Some(status) = update.integrity_status {
            self.integrity_status = status;
        }
    }
}

/// One line in the snapshots file: a timestamped full-state capture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    /// Unix seconds the snapshot was taken
    pub timestamp: f64,

    /// Full hub state at that moment
    pub state: HubState,
}

impl SnapshotRecord {
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}
