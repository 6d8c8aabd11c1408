use crate::services::merge::MergeOutcome;
use std::fmt;

/// Orchestrator phase.
///
/// At most one run is in flight: a trigger arriving while `Running` is
/// dropped, not queued. Enforced by
/// [`StateManager::try_begin_sync`](crate::state::StateManager::try_begin_sync).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SyncPhase {
    #[default]
    Idle,
    Running,
}

/// How a sync run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The pipeline completed; the merge reported this outcome
    Merged(MergeOutcome),
    /// The run was aborted (rules file I/O failure or internal error)
    Failed(String),
}

impl SyncOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, SyncOutcome::Failed(_))
    }
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncOutcome::Merged(outcome) => write!(f, "{}", outcome),
            SyncOutcome::Failed(message) => write!(f, "failed: {}", message),
        }
    }
}

/// Single source of truth for orchestrator state.
///
/// Wrapped in `Arc<RwLock<SyncState>>` by [`crate::state::StateManager`];
/// mutate it only through the manager so change events are emitted.
#[derive(Clone, Debug, Default)]
pub struct SyncState {
    pub phase: SyncPhase,

    /// Id of the active run, or of the last run once idle
    pub current_run: Option<u64>,

    // Totals across the orchestrator's lifetime
    pub runs_started: u64,
    pub runs_finished: u64,
    pub triggers_dropped: u64,

    // Last completed run
    pub last_outcome: Option<SyncOutcome>,
    pub last_fragment_count: usize,
}

impl SyncState {
    pub fn is_running(&self) -> bool {
        self.phase == SyncPhase::Running
    }

    /// Get run statistics.
    ///
    /// Returns a tuple of (started, finished, dropped).
    pub fn run_stats(&self) -> (u64, u64, u64) {
        (self.runs_started, self.runs_finished, self.triggers_dropped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::merge::SkipReason;

    #[test]
    fn test_default_state_is_idle() {
        let state = SyncState::default();
        assert_eq!(state.phase, SyncPhase::Idle);
        assert!(!state.is_running());
        assert_eq!(state.run_stats(), (0, 0, 0));
        assert!(state.last_outcome.is_none());
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(SyncOutcome::Merged(MergeOutcome::Replaced).to_string(), "replaced");
        assert_eq!(
            SyncOutcome::Merged(MergeOutcome::Skipped(SkipReason::FileAbsent)).to_string(),
            "skipped (file absent)"
        );
        assert_eq!(SyncOutcome::Failed("boom".to_string()).to_string(), "failed: boom");
        assert!(SyncOutcome::Failed(String::new()).is_failure());
    }
}
