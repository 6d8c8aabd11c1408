//! tabsync - command-line host for the sync engine.
//!
//! Stands in for the editor integration: it builds one [`SyncOrchestrator`]
//! at startup and calls `trigger_sync()` when asked to.
//!
//! # Commands
//!
//! - `sync <WORKSPACE_FILE>`: run once and report the outcome
//! - `watch <WORKSPACE_FILE>`: trigger on every stdin line (one per saved file);
//!   triggers arriving during a run are dropped
//! - `preview <WORKSPACE_FILE>`: print the block that would be merged
//! - `rules-path <WORKSPACE_FILE>`: print the derived rules file path
//! - `init-config <WORKSPACE_FILE>`: write a default `tabsync.yaml`
//!
//! # Threading
//!
//! - **Main thread**: parses arguments, reads stdin in `watch` mode (blocking)
//! - **Tokio workers**: run the status queries and the merge on detached tasks

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, Subcommand};
use std::io::BufRead;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tabsync::services::workspace::DEFAULT_META_DIR;
use tabsync::services::{ShellRunner, Workspace};
use tabsync::{
    APP_NAME, ConfigManager, Metrics, StateManager, SyncConfig, SyncOrchestrator, SyncOutcome,
    SyncPipeline, VERSION,
};

#[derive(Parser, Debug)]
#[command(name = "tabsync", version, about = "Sync an editor tab-coloring rule with git status")]
struct Cli {
    /// Directory containing tabsync.yaml [default: <workspace-dir>/.meta]
    #[arg(long, global = true)]
    config_dir: Option<Utf8PathBuf>,

    /// Directory for log files [default: <config-dir>/logs]
    #[arg(long, global = true)]
    log_dir: Option<Utf8PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Do not log to the console
    #[arg(long, short, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one sync and wait for it to finish
    Sync { workspace_file: Utf8PathBuf },

    /// Trigger a sync for every line read from stdin
    Watch { workspace_file: Utf8PathBuf },

    /// Print the rule block for the current working tree without merging
    Preview { workspace_file: Utf8PathBuf },

    /// Print the rules file path derived from the workspace file
    RulesPath { workspace_file: Utf8PathBuf },

    /// Write a default tabsync.yaml
    InitConfig { workspace_file: Utf8PathBuf },
}

impl Command {
    fn workspace_file(&self) -> &Utf8Path {
        match self {
            Command::Sync { workspace_file }
            | Command::Watch { workspace_file }
            | Command::Preview { workspace_file }
            | Command::RulesPath { workspace_file }
            | Command::InitConfig { workspace_file } => workspace_file,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let workspace = Workspace::from_file(cli.command.workspace_file())?;
    let config_dir = cli
        .config_dir
        .clone()
        .unwrap_or_else(|| workspace.default_config_dir(DEFAULT_META_DIR));
    let config_manager = ConfigManager::new(&config_dir);

    if let Command::InitConfig { .. } = cli.command {
        config_manager.save_sync_config(&SyncConfig::default())?;
        println!("{}", config_manager.config_path());
        return Ok(ExitCode::SUCCESS);
    }

    let config = config_manager.load_sync_config()?;
    let debug_mode = cli.debug || config.sync_settings.debug_mode;

    let log_dir = cli
        .log_dir
        .clone()
        .unwrap_or_else(|| config_manager.config_dir().join("logs"));
    let _log_guard =
        tabsync::logging::setup_logging_with_console(&log_dir, APP_NAME, debug_mode, !cli.quiet)?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);
    tracing::info!(
        "Workspace {} at {}, config {}",
        workspace.name(),
        workspace.root(),
        config_manager.config_path()
    );

    let pipeline = SyncPipeline::from_config(&config, &workspace)
        .context("Failed to build sync pipeline")?;

    if let Command::RulesPath { .. } = cli.command {
        println!("{}", pipeline.rules_path());
        return Ok(ExitCode::SUCCESS);
    }

    let queries = pipeline.queries();
    tracing::debug!("Queries: `{}` then `{}`", queries.modified, queries.untracked);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(2)
        .thread_name("tabsync-worker")
        .build()?;

    let runner = ShellRunner::in_dir(workspace.root()).with_timeout(Duration::from_secs(
        config.sync_settings.command_timeout.into(),
    ));
    let metrics = Arc::new(Metrics::new());

    let code = match cli.command {
        Command::Preview { .. } => {
            let block = runtime.block_on(pipeline.preview(&runner));
            println!("{}", block);
            ExitCode::SUCCESS
        }
        Command::Sync { .. } => {
            let orchestrator = SyncOrchestrator::new(
                runner,
                pipeline,
                StateManager::new(),
                Arc::clone(&metrics),
                runtime.handle().clone(),
            );
            let outcome = runtime.block_on(orchestrator.sync_now());
            report(outcome)
        }
        Command::Watch { .. } => {
            let orchestrator = SyncOrchestrator::new(
                runner,
                pipeline,
                StateManager::new(),
                Arc::clone(&metrics),
                runtime.handle().clone(),
            );
            watch_stdin(&orchestrator)?;
            let outcome = runtime.block_on(orchestrator.wait_idle());
            report(outcome)
        }
        Command::RulesPath { .. } | Command::InitConfig { .. } => ExitCode::SUCCESS,
    };

    metrics.log_summary();
    runtime.shutdown_timeout(Duration::from_secs(5));
    tracing::info!("Shutdown complete");

    Ok(code)
}

/// Trigger a sync for every stdin line until EOF
fn watch_stdin(orchestrator: &SyncOrchestrator<ShellRunner>) -> Result<()> {
    tracing::info!("Watching stdin for save notifications");
    orchestrator.trigger_sync();

    for line in std::io::stdin().lock().lines() {
        let line = line.context("Failed to read stdin")?;
        tracing::debug!("Save notification: {}", line.trim());
        orchestrator.trigger_sync();
    }

    tracing::info!("stdin closed, waiting for the active run");
    Ok(())
}

fn report(outcome: Option<SyncOutcome>) -> ExitCode {
    match outcome {
        Some(SyncOutcome::Failed(message)) => {
            eprintln!("sync failed: {}", message);
            ExitCode::FAILURE
        }
        Some(outcome) => {
            println!("{}", outcome);
            ExitCode::SUCCESS
        }
        None => {
            println!("no sync ran");
            ExitCode::SUCCESS
        }
    }
}
