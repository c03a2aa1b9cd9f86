//! Core data structures
//!
//! - `entry`: hash-chained ledger entries
//! - `event`: operational hub events
//! - `state`: hub state, controls, and integrity signals

mod entry;
mod event;
mod state;

pub use entry::{LedgerEntry, OperationType, PeerSystem};
pub use event::HubEvent;
pub use state::{
    Controls, CoreHealth, HubState, IntegritySignals, IntegrityStatus, IntegrityUpdate,
    SnapshotRecord, SystemLink, SystemUpdate, DEFAULT_ROUTING_MODE, KNOWN_SYSTEMS,
};
