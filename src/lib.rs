// tabsync - keeps an editor tab-coloring rule in sync with git status
//
// This is the library crate containing the sync engine and its data structures.
// The binary crate (main.rs) provides the command-line host.

pub mod config;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;
pub mod state;
pub mod sync;

// Re-export commonly used types for convenience
pub use config::ConfigManager;
pub use metrics::Metrics;
pub use models::{SyncConfig, SyncOutcome, SyncPhase, SyncState};
pub use state::{StateManager, SyncChange};
pub use sync::{SyncOrchestrator, SyncPipeline};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
