// State management module
//
// This module provides the StateManager which wraps SyncState with thread-safe access
// using Arc<RwLock<T>> and emits change events for hosts waiting on sync runs.

use crate::models::{SyncOutcome, SyncPhase, SyncState};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::broadcast;

/// Change events emitted when state is modified
///
/// Hosts subscribe to these instead of polling the run flag.
#[derive(Clone, Debug, PartialEq)]
pub enum SyncChange {
    /// A sync run has started
    SyncStarted { run_id: u64 },

    /// A sync run has finished, successfully or not
    SyncFinished { run_id: u64, outcome: SyncOutcome },

    /// A trigger arrived while a run was active and was dropped
    TriggerDropped { active_run: Option<u64> },
}

/// Thread-safe state manager with event emission
///
/// This is the central state component that:
/// - Provides thread-safe access to [`SyncState`] via `Arc<RwLock<T>>`
/// - Detects state changes and emits [`SyncChange`] events
/// - Owns the Idle → Running transition that keeps sync runs from overlapping
/// - Supports subscribing to changes via tokio broadcast channels
pub struct StateManager {
    /// The sync state protected by RwLock for thread-safe access
    state: Arc<RwLock<SyncState>>,

    /// Broadcast channel for emitting state change events
    state_tx: broadcast::Sender<SyncChange>,
}

impl StateManager {
    /// Create a new StateManager in the idle phase
    ///
    /// # Returns
    /// A new StateManager with a broadcast channel buffer of 100 events
    pub fn new() -> Self {
        let (state_tx, _) = broadcast::channel(100);
        Self {
            state: Arc::new(RwLock::new(SyncState::default())),
            state_tx,
        }
    }

    /// Get a cloned snapshot of the current state
    pub fn snapshot(&self) -> SyncState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Execute a function with read access to the state
    ///
    /// # Example
    /// ```ignore
    /// let running = state_manager.read(|state| state.is_running());
    /// ```
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&SyncState) -> R,
    {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }

    /// Update the state and emit change events
    ///
    /// The write lock is held for the whole update, so a check-and-set inside
    /// `update_fn` is atomic with respect to other callers.
    ///
    /// # Returns
    /// A vector of SyncChange events that were emitted
    pub fn update<F>(&self, update_fn: F) -> Vec<SyncChange>
    where
        F: FnOnce(&mut SyncState),
    {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let old_state = state.clone();

        update_fn(&mut state);

        let changes = Self::detect_changes(&old_state, &state);

        for change in &changes {
            // Ignore send errors - it's OK if no one is listening
            let _ = self.state_tx.send(change.clone());
        }

        changes
    }

    /// Subscribe to state change events
    pub fn subscribe(&self) -> broadcast::Receiver<SyncChange> {
        self.state_tx.subscribe()
    }

    fn detect_changes(old: &SyncState, new: &SyncState) -> Vec<SyncChange> {
        let mut changes = Vec::new();

        if old.triggers_dropped != new.triggers_dropped {
            changes.push(SyncChange::TriggerDropped {
                active_run: new.current_run,
            });
        }

        if old.phase != new.phase {
            match (new.phase, new.current_run) {
                (SyncPhase::Running, Some(run_id)) => {
                    changes.push(SyncChange::SyncStarted { run_id });
                }
                (SyncPhase::Idle, Some(run_id)) => {
                    if let Some(outcome) = &new.last_outcome {
                        changes.push(SyncChange::SyncFinished {
                            run_id,
                            outcome: outcome.clone(),
                        });
                    }
                }
                _ => {}
            }
        }

        changes
    }

    /// Move from Idle to Running.
    ///
    /// # Returns
    /// The new run id, or `None` if a run is already active (the trigger is
    /// counted as dropped)
    pub fn try_begin_sync(&self) -> Option<u64> {
        let mut run_id = None;

        self.update(|state| {
            if state.is_running() {
                state.triggers_dropped += 1;
                return;
            }

            state.runs_started += 1;
            state.phase = SyncPhase::Running;
            state.current_run = Some(state.runs_started);
            run_id = state.current_run;
        });

        run_id
    }

    /// Record the end of run `run_id` and return to Idle
    pub fn finish_sync(
        &self,
        run_id: u64,
        outcome: SyncOutcome,
        fragment_count: usize,
    ) -> Vec<SyncChange> {
        self.update(|state| {
            if state.current_run != Some(run_id) {
                tracing::warn!(
                    "Finishing run {} but state tracks {:?}",
                    run_id,
                    state.current_run
                );
            }

            state.phase = SyncPhase::Idle;
            state.current_run = Some(run_id);
            state.runs_finished += 1;
            state.last_outcome = Some(outcome);
            state.last_fragment_count = fragment_count;
        })
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

// Make StateManager cloneable for sharing across tasks
impl Clone for StateManager {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            state_tx: self.state_tx.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::merge::MergeOutcome;

    #[test]
    fn test_new_state_manager() {
        let manager = StateManager::new();
        let state = manager.snapshot();

        assert!(!state.is_running());
        assert_eq!(state.runs_started, 0);
    }

    #[test]
    fn test_begin_sync_transitions_to_running() {
        let manager = StateManager::new();
        let mut rx = manager.subscribe();

        assert_eq!(manager.try_begin_sync(), Some(1));

        assert!(manager.read(|s| s.is_running()));
        assert_eq!(rx.try_recv().unwrap(), SyncChange::SyncStarted { run_id: 1 });
    }

    #[test]
    fn test_second_begin_is_dropped() {
        let manager = StateManager::new();
        manager.try_begin_sync();
        let mut rx = manager.subscribe();

        assert_eq!(manager.try_begin_sync(), None);
        assert_eq!(manager.try_begin_sync(), None);

        let state = manager.snapshot();
        assert_eq!(state.run_stats(), (1, 0, 2));
        assert_eq!(
            rx.try_recv().unwrap(),
            SyncChange::TriggerDropped { active_run: Some(1) }
        );
    }

    #[test]
    fn test_finish_returns_to_idle() {
        let manager = StateManager::new();
        let run_id = manager.try_begin_sync().unwrap();

        let changes = manager.finish_sync(run_id, SyncOutcome::Merged(MergeOutcome::Inserted), 3);

        assert_eq!(
            changes,
            vec![SyncChange::SyncFinished {
                run_id,
                outcome: SyncOutcome::Merged(MergeOutcome::Inserted),
            }]
        );

        let state = manager.snapshot();
        assert!(!state.is_running());
        assert_eq!(state.last_fragment_count, 3);
        assert_eq!(state.run_stats(), (1, 1, 0));

        // A new run can start
        assert_eq!(manager.try_begin_sync(), Some(2));
    }

    #[test]
    fn test_failed_run_also_returns_to_idle() {
        let manager = StateManager::new();
        let run_id = manager.try_begin_sync().unwrap();

        manager.finish_sync(run_id, SyncOutcome::Failed("io".to_string()), 0);

        let state = manager.snapshot();
        assert!(!state.is_running());
        assert!(state.last_outcome.unwrap().is_failure());
    }

    #[test]
    fn test_clone_shares_state() {
        let manager1 = StateManager::new();
        let manager2 = manager1.clone();

        manager1.try_begin_sync();

        assert!(manager2.read(|s| s.is_running()));
        assert_eq!(manager2.try_begin_sync(), None);
    }

    #[test]
    fn test_multiple_subscribers() {
        let manager = StateManager::new();
        let mut rx1 = manager.subscribe();
        let mut rx2 = manager.subscribe();

        manager.try_begin_sync();

        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
    }
}
