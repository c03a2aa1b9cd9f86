//! In-memory authoritative state hub
//!
//! The `StateHub` holds the canonical in-process projection of system state:
//! component health, system links, the controls surface, and the attributed
//! event sequence. State mutates only through the explicit methods here,
//! each atomic under one lock. Durability is delegated to registered event
//! sinks and the snapshot writer; the hub itself never touches disk.
//!
//! Listener dispatch happens after the state lock is released, so sink I/O
//! never blocks concurrent hub mutations. A sink failure is logged and
//! skipped; it can neither corrupt hub state nor starve later sinks.

use std::io;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use crate::types::{
    CoreHealth, HubEvent, HubState, IntegritySignals, IntegrityUpdate, SystemUpdate,
};
use crate::utils::time::now_ts;

/// Errors an event sink may report back to the hub
#[derive(Debug)]
pub enum SinkError {
    Io(io::Error),
    Json(serde_json::Error),
    Failed(String),
}

impl std::fmt::Display for SinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkError::Io(e) => write!(f, "IO error: {}", e),
            SinkError::Json(e) => write!(f, "JSON error: {}", e),
            SinkError::Failed(msg) => write!(f, "sink failed: {}", msg),
        }
    }
}

impl std::error::Error for SinkError {}

impl From<io::Error> for SinkError {
    fn from(e: io::Error) -> Self {
        SinkError::Io(e)
    }
}

impl From<serde_json::Error> for SinkError {
    fn from(e: serde_json::Error) -> Self {
        SinkError::Json(e)
    }
}

/// Receiver for events recorded through the hub
///
/// Sinks are invoked in registration order, outside the hub's state lock,
/// synchronously within the recording call. A returned error is logged and
/// the remaining sinks still run.
pub trait EventSink: Send + Sync {
    fn on_event(&self, event: &HubEvent) -> Result<(), SinkError>;
}

impl<F> EventSink for F
where
    F: Fn(&HubEvent) -> Result<(), SinkError> + Send + Sync,
{
    fn on_event(&self, event: &HubEvent) -> Result<(), SinkError> {
        self(event)
    }
}

/// Canonical in-process state hub
///
/// Constructed once by the composition root and passed around as
/// `Arc<StateHub>`; there is no global instance.
pub struct StateHub {
    state: Mutex<HubState>,
    integrity: Mutex<IntegritySignals>,
    listeners: Mutex<Vec<Arc<dyn EventSink>>>,
}

impl StateHub {
    /// Hub with empty containers and the known systems pre-seeded
    pub fn new() -> Self {
        Self {
            state: Mutex::new(HubState::default()),
            integrity: Mutex::new(IntegritySignals::default()),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Wholesale-replace the health record for one component
    pub fn update_core(&self, name: &str, health: CoreHealth) {
        let mut state = self.state.lock();
        state.cores.insert(name.to_string(), health);
        state.timestamp = Some(now_ts());
    }

    /// Partial-merge link fields into one system entry, creating it if absent
    pub fn update_system(&self, name: &str, update: SystemUpdate) {
        let mut state = self.state.lock();
        let link = state.systems.entry(name.to_string()).or_default();

        if let Some(connected) = update.connected {
            link.connected = Some(connected);
        }
        if let Some(mode) = update.mode {
            link.mode = Some(mode);
        }
        if let Some(queues) = update.queues {
            link.queues = Some(queues);
        }
        if let Some(extra) = update.extra {
            for (key, value) in extra {
                link.extra.insert(key, value);
            }
        }
        state.timestamp = Some(now_ts());
    }

    /// Partial-merge the controls surface
    pub fn set_controls(
        &self,
        accepting: Option<bool>,
        routing_mode: Option<std::collections::BTreeMap<String, String>>,
    ) {
        let mut state = self.state.lock();
        if let Some(accepting) = accepting {
            state.controls.accepting = accepting;
        }
        if let Some(routing_mode) = routing_mode {
            state.controls.routing_mode.extend(routing_mode);
        }
        state.timestamp = Some(now_ts());
    }

    /// Record one attributed event. This is the only write path for the
    /// event sequence and its derived indices.
    ///
    /// Normalizes the timestamp (append time when absent), updates
    /// `last_event_by_target`, the targeted system's `last_event`, and the
    /// issuer indices, appends the event, and bumps the hub timestamp. All
    /// of that happens under the lock; sink notification runs after it is
    /// released. Returns the normalized event.
    pub fn record_event(&self, event: HubEvent, notify_listeners: bool) -> HubEvent {
        let normalized = {
            let mut state = self.state.lock();

            let mut event = event;
            let ts = event.timestamp.unwrap_or_else(now_ts);
            event.timestamp = Some(ts);

            if let Some(target) = event.target.clone() {
                state.last_event_by_target.insert(target.clone(), ts);
                if let Some(link) = state.systems.get_mut(&target) {
                    link.last_event = Some(ts);
                }
            }

            if let Some(iss) = event.iss.clone() {
                state.iss_now = Some(iss.clone());
                state.last_event_iss = Some(iss);
            }

            state.events.push(event.clone());
            state.timestamp = Some(ts);
            event
        };

        if notify_listeners {
            let sinks = self.listeners.lock().clone();
            for (index, sink) in sinks.iter().enumerate() {
                if let Err(e) = sink.on_event(&normalized) {
                    warn!(sink = index, error = %e, "event sink failed; skipping");
                }
            }
        }

        normalized
    }

    /// Set the divergence flag
    pub fn set_divergence(&self, diverged: bool) {
        let mut state = self.state.lock();
        state.divergence = diverged;
        state.timestamp = Some(now_ts());
    }

    /// Deep copy of the full state, safe to hand to external readers
    pub fn snapshot(&self) -> HubState {
        self.state.lock().clone()
    }

    /// Wholesale-replace the state (startup replay or explicit rollback)
    pub fn restore(&self, snapshot: HubState) {
        *self.state.lock() = snapshot;
    }

    /// Register an event sink for the life of the hub
    pub fn add_listener(&self, sink: Arc<dyn EventSink>) {
        self.listeners.lock().push(sink);
    }

    /// Merge-update the advisory integrity side-channel
    pub fn set_integrity(&self, update: IntegrityUpdate) {
        self.integrity.lock().merge(update);
    }

    /// Read the advisory integrity side-channel
    pub fn get_integrity(&self) -> IntegritySignals {
        self.integrity.lock().clone()
    }
}

impl Default for StateHub {
    fn default() -> Self {
        Self::new()
    }
}
