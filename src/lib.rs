//! Ledger Hub
//!
//! A durable, tamper-evident event ledger: an in-memory state hub with
//! append-only JSONL persistence and a SHA-256 hash-chained operation
//! ledger.
//!
//! # Features
//!
//! - **Hash-Chained Ledger**: Every operation entry links to its
//!   predecessor's hash; tampering is detectable per entry
//! - **Event Sourcing**: Rotating append-only event log plus periodic
//!   full-state snapshots; startup replays snapshot + newer events
//! - **Thread-Safe**: Mutex-guarded state with listeners notified outside
//!   the lock
//! - **Bundle Transfer**: Export/import the full history with a hashed
//!   manifest
//!
//! # Modules
//!
//! - `types`: Core data structures (LedgerEntry, HubEvent, HubState)
//! - `ledger`: The hash-chained operation ledger
//! - `hub`: The in-memory authoritative state hub
//! - `persist`: Event store, snapshots, replay, and bundles
//! - `utils`: Timestamps, hashing, atomic writes
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ledger_hub::hub::StateHub;
//! use ledger_hub::persist::{init_persistence, PersistConfig};
//! use ledger_hub::types::HubEvent;
//!
//! fn main() {
//!     let hub = Arc::new(StateHub::new());
//!     let config = PersistConfig::new("state_store");
//!     let _manager = init_persistence(hub.clone(), config).unwrap();
//!
//!     hub.record_event(HubEvent::action("DALS", "route_check"), true);
//! }
//! ```

pub mod hub;
pub mod ledger;
pub mod persist;
pub mod types;
pub mod utils;

// Re-export commonly used items at crate root
pub use hub::{EventSink, SinkError, StateHub};
pub use ledger::{HashChainLedger, LedgerError, LedgerResult, OperationalSummary};
pub use persist::{
    export_bundle, import_bundle, init_persistence, BundleManifest, EventStore, ImportOutcome,
    PersistConfig, PersistError, PersistResult, PersistenceManager, SnapshotWriter,
};
pub use types::{
    HubEvent, HubState, IntegritySignals, IntegrityStatus, LedgerEntry, OperationType, PeerSystem,
    SnapshotRecord,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
