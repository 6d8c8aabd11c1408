//! Data models for tabsync.
//!
//! - [`SyncState`]: orchestrator phase, run counters, and the last outcome
//! - [`SyncOutcome`]: how a sync run ended
//! - [`SyncConfig`]: settings loaded from `tabsync.yaml`
//!
//! Config structs derive `Serialize`/`Deserialize` for YAML persistence.
//! `SyncState` is only mutated through [`StateManager`](crate::state::StateManager).

pub mod config;
pub mod sync_state;

pub use config::{ConfigError, SyncConfig, SyncSettings};
pub use sync_state::{SyncOutcome, SyncPhase, SyncState};
