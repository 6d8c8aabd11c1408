//! Sync orchestration - the guarded pipeline behind `trigger_sync()`.
//!
//! A [`SyncOrchestrator`] is constructed once by the host and handed to
//! whatever fires on save or on command. Each accepted trigger runs the
//! pipeline on a detached tokio task:
//!
//! 1. [`StatusCollector`]: modified-files query, then untracked-files query
//! 2. [`BlockSynthesizer`]: fragments → marker-wrapped rule block
//! 3. [`RulesMerger`]: block → rules file (never created if absent)
//!
//! Only one run is in flight at a time. A trigger that arrives while a run is
//! active is dropped, not queued. Errors never reach the caller; they are
//! logged and recorded as [`SyncOutcome::Failed`], and the orchestrator returns
//! to idle either way.

use crate::metrics::Metrics;
use crate::models::{ConfigError, SyncConfig, SyncOutcome};
use crate::services::{
    BlockSynthesizer, CommandRunner, ExtensionNormalizer, FragmentNormalizer, FragmentSet,
    MergeError, MergeOutcome, RegexBlock, RulesMerger, StatusCollector, StatusQueries, Workspace,
};
use crate::state::{StateManager, SyncChange};
use camino::{Utf8Path, Utf8PathBuf};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::broadcast;

/// Errors building a pipeline from configuration
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid block marker pattern: {0}")]
    Marker(#[from] regex::Error),
}

/// Result of one pipeline execution
#[derive(Debug)]
pub struct RunReport {
    pub fragment_count: usize,
    pub result: Result<MergeOutcome, MergeError>,
}

impl RunReport {
    pub fn outcome(&self) -> SyncOutcome {
        match &self.result {
            Ok(merge) => SyncOutcome::Merged(*merge),
            Err(e) => SyncOutcome::Failed(e.to_string()),
        }
    }
}

/// The resolved stages of one sync run
pub struct SyncPipeline {
    queries: StatusQueries,
    normalizer: Box<dyn FragmentNormalizer>,
    synthesizer: BlockSynthesizer,
    merger: RulesMerger,
    rules_path: Utf8PathBuf,
}

impl SyncPipeline {
    pub fn new(
        queries: StatusQueries,
        normalizer: Box<dyn FragmentNormalizer>,
        synthesizer: BlockSynthesizer,
        merger: RulesMerger,
        rules_path: impl Into<Utf8PathBuf>,
    ) -> Self {
        Self {
            queries,
            normalizer,
            synthesizer,
            merger,
            rules_path: rules_path.into(),
        }
    }

    /// Build the pipeline described by `config` for `workspace`
    pub fn from_config(config: &SyncConfig, workspace: &Workspace) -> Result<Self, SyncError> {
        config.validate()?;
        let settings = &config.sync_settings;

        Ok(Self::new(
            StatusQueries {
                modified: settings.modified_command.clone(),
                untracked: settings.untracked_command.clone(),
            },
            Box::new(ExtensionNormalizer::new(&settings.extension)),
            BlockSynthesizer::new(
                settings.marker.clone(),
                &settings.extension,
                settings.escape_fragments,
            ),
            RulesMerger::new(&settings.marker)?,
            workspace.rules_path(&settings.meta_dir, &settings.rules_file),
        ))
    }

    pub fn rules_path(&self) -> &Utf8Path {
        &self.rules_path
    }

    pub fn queries(&self) -> &StatusQueries {
        &self.queries
    }

    /// Collect the current fragments from the working tree
    pub async fn collect<R: CommandRunner>(&self, runner: &R) -> FragmentSet {
        StatusCollector::new(runner, self.normalizer.as_ref())
            .collect(&self.queries)
            .await
    }

    /// Collect and synthesize without touching the rules file
    pub async fn preview<R: CommandRunner>(&self, runner: &R) -> RegexBlock {
        let fragments = self.collect(runner).await;
        self.synthesizer.synthesize(&fragments)
    }

    /// Run collection, synthesis, and merge in order
    pub async fn run<R: CommandRunner>(&self, runner: &R) -> RunReport {
        let fragments = self.collect(runner).await;
        let block = self.synthesizer.synthesize(&fragments);

        RunReport {
            fragment_count: fragments.len(),
            result: self.merger.merge(&self.rules_path, &block),
        }
    }
}

struct SyncContext<R> {
    runner: R,
    pipeline: SyncPipeline,
    state: StateManager,
    metrics: Arc<Metrics>,
}

/// Guarded entry point for sync runs
pub struct SyncOrchestrator<R: CommandRunner> {
    context: Arc<SyncContext<R>>,
    runtime: Handle,
}

impl<R: CommandRunner> SyncOrchestrator<R> {
    /// Create an orchestrator that spawns its runs on `runtime`
    pub fn new(
        runner: R,
        pipeline: SyncPipeline,
        state: StateManager,
        metrics: Arc<Metrics>,
        runtime: Handle,
    ) -> Self {
        tracing::info!(
            "Sync orchestrator ready, rules file: {}",
            pipeline.rules_path()
        );

        Self {
            context: Arc::new(SyncContext {
                runner,
                pipeline,
                state,
                metrics,
            }),
            runtime,
        }
    }

    pub fn state(&self) -> &StateManager {
        &self.context.state
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.context.metrics
    }

    pub fn runner(&self) -> &R {
        &self.context.runner
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncChange> {
        self.context.state.subscribe()
    }

    /// Start a sync run in the background.
    ///
    /// Returns immediately. If a run is already active the trigger is dropped.
    pub fn trigger_sync(&self) {
        self.start_run();
    }

    fn start_run(&self) -> Option<u64> {
        let Some(run_id) = self.context.state.try_begin_sync() else {
            self.context.metrics.record_trigger_dropped();
            tracing::debug!("Sync already running, trigger dropped");
            return None;
        };

        self.context.metrics.record_sync_started();
        tracing::info!("Sync run {} started", run_id);

        let context = Arc::clone(&self.context);
        self.runtime.spawn(async move {
            let start = Instant::now();

            // Run the pipeline on its own task so a panic still ends the run
            let pipeline_context = Arc::clone(&context);
            let joined = tokio::spawn(async move {
                pipeline_context
                    .pipeline
                    .run(&pipeline_context.runner)
                    .await
            })
            .await;

            let (outcome, fragment_count) = match joined {
                Ok(report) => {
                    if let Err(e) = &report.result {
                        tracing::error!("Sync run {} aborted: {}", run_id, e);
                    }
                    (report.outcome(), report.fragment_count)
                }
                Err(e) => {
                    tracing::error!("Sync run {} task failed: {}", run_id, e);
                    (SyncOutcome::Failed(format!("sync task failed: {}", e)), 0)
                }
            };

            let duration = start.elapsed();
            tracing::info!(
                "Sync run {} finished in {:.2}s: {}",
                run_id,
                duration.as_secs_f32(),
                outcome
            );

            context
                .metrics
                .record_sync_finished(&outcome, fragment_count, duration);
            context.state.finish_sync(run_id, outcome, fragment_count);
        });

        Some(run_id)
    }

    /// Trigger a run and wait until a run finishes.
    ///
    /// If a run was already active, this waits for that run instead.
    ///
    /// # Returns
    /// The outcome of the finished run, or `None` if the event channel closed
    pub async fn sync_now(&self) -> Option<SyncOutcome> {
        let mut rx = self.subscribe();
        let started = self.start_run();

        loop {
            match rx.recv().await {
                Ok(SyncChange::SyncFinished { run_id, outcome })
                    if started.is_none_or(|id| id == run_id) =>
                {
                    return Some(outcome);
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Missed {} sync events while waiting", skipped);
                    if !self.context.state.read(|s| s.is_running()) {
                        return self.context.state.read(|s| s.last_outcome.clone());
                    }
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Wait until no run is active
    pub async fn wait_idle(&self) -> Option<SyncOutcome> {
        let mut rx = self.subscribe();

        while self.context.state.read(|s| s.is_running()) {
            match rx.recv().await {
                Ok(SyncChange::SyncFinished { .. }) => break,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }

        self.context.state.read(|s| s.last_outcome.clone())
    }
}
