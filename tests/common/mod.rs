//! Shared fixtures for integration tests
#![allow(dead_code)]

use camino::Utf8PathBuf;
use std::collections::HashMap;
use std::fs;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tabsync::services::status::{MODIFIED_FILES_COMMAND, UNTRACKED_FILES_COMMAND};
use tabsync::services::{CommandRunner, LineHandler, ProcessError, Workspace};
use tempfile::TempDir;
use tokio::sync::Semaphore;

/// Stands in for git: replays canned output per command.
///
/// Commands without canned output fail to spawn. With a gate, every run waits
/// for one permit before producing output.
#[derive(Default)]
pub struct ScriptedRunner {
    outputs: HashMap<String, Vec<String>>,
    calls: Mutex<Vec<String>>,
    gate: Option<Arc<Semaphore>>,
    panic_on: Option<String>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Canned output for the default modified and untracked queries
    pub fn git(modified: &[&str], untracked: &[&str]) -> Self {
        Self::new()
            .with_output(MODIFIED_FILES_COMMAND, modified)
            .with_output(UNTRACKED_FILES_COMMAND, untracked)
    }

    pub fn with_output(mut self, command: &str, lines: &[&str]) -> Self {
        self.outputs.insert(
            command.to_string(),
            lines.iter().map(|line| line.to_string()).collect(),
        );
        self
    }

    pub fn with_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn panicking_on(mut self, command: &str) -> Self {
        self.panic_on = Some(command.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run<'a>(
        &'a self,
        command: &'a str,
        on_line: &'a mut LineHandler<'a>,
    ) -> impl Future<Output = Result<i32, ProcessError>> + Send + 'a {
        async move {
            self.calls.lock().unwrap().push(command.to_string());

            if let Some(gate) = &self.gate {
                gate.acquire().await.expect("gate closed").forget();
            }

            if self.panic_on.as_deref() == Some(command) {
                panic!("scripted panic in `{}`", command);
            }

            let Some(lines) = self.outputs.get(command) else {
                return Err(ProcessError::Spawn {
                    command: command.to_string(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "command not found"),
                });
            };

            for line in lines {
                on_line(Some(line.as_str()));
            }
            on_line(None);
            Ok(0)
        }
    }
}

/// A temporary workspace `Game.sln` with its (optional) rules file
pub struct TestWorkspace {
    pub temp_dir: TempDir,
    pub workspace: Workspace,
    pub rules_path: Utf8PathBuf,
}

impl TestWorkspace {
    /// Workspace without a rules file
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        let workspace_file = root.join("Game.sln");
        fs::write(&workspace_file, "").unwrap();

        let workspace = Workspace::from_file(&workspace_file).unwrap();
        let rules_path = workspace.rules_path(".meta", "rules.txt");

        Self {
            temp_dir,
            workspace,
            rules_path,
        }
    }

    /// Workspace whose rules file holds `content`
    pub fn with_rules(content: &str) -> Self {
        let ws = Self::new();
        fs::create_dir_all(ws.rules_path.parent().unwrap()).unwrap();
        fs::write(&ws.rules_path, content).unwrap();
        ws
    }

    pub fn read_rules(&self) -> String {
        fs::read_to_string(&self.rules_path).unwrap()
    }
}
