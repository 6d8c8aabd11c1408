use crate::services::normalizer::FragmentNormalizer;
use crate::services::process::CommandRunner;
use crate::services::synthesis::FragmentSet;
use tokio::sync::oneshot;

/// Default query listing modified tracked files
pub const MODIFIED_FILES_COMMAND: &str = "git diff --name-only";

/// Default query listing untracked, non-ignored files
pub const UNTRACKED_FILES_COMMAND: &str = "git ls-files --others --exclude-standard";

/// The two working-tree queries run by the collector, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusQueries {
    pub modified: String,
    pub untracked: String,
}

impl Default for StatusQueries {
    fn default() -> Self {
        Self {
            modified: MODIFIED_FILES_COMMAND.to_string(),
            untracked: UNTRACKED_FILES_COMMAND.to_string(),
        }
    }
}

/// Collects normalized fragments for every modified and untracked file.
///
/// The two queries run strictly one after the other: the untracked query is
/// not started until the modified query's output has ended and the process
/// has exited.
pub struct StatusCollector<'a, R: CommandRunner> {
    runner: &'a R,
    normalizer: &'a dyn FragmentNormalizer,
}

impl<'a, R: CommandRunner> StatusCollector<'a, R> {
    pub fn new(runner: &'a R, normalizer: &'a dyn FragmentNormalizer) -> Self {
        Self { runner, normalizer }
    }

    /// Run both queries and return the fragments, modified files first
    pub async fn collect(&self, queries: &StatusQueries) -> FragmentSet {
        let mut fragments = FragmentSet::new();

        let modified = self.collect_query(&queries.modified, &mut fragments).await;
        let untracked = self.collect_query(&queries.untracked, &mut fragments).await;

        tracing::info!(
            "Collected {} fragments ({} modified, {} untracked)",
            fragments.len(),
            modified,
            untracked
        );

        fragments
    }

    /// Run one query, appending its fragments. Returns how many were added.
    ///
    /// A command that cannot be spawned contributes nothing.
    async fn collect_query(&self, command: &str, fragments: &mut FragmentSet) -> usize {
        let (done_tx, done_rx) = oneshot::channel::<()>();
        let mut done_tx = Some(done_tx);
        let mut received = Vec::new();

        {
            let normalizer = self.normalizer;
            let mut on_line = |line: Option<&str>| match line {
                // Lines after the end sentinel belong to no run
                Some(_) if done_tx.is_none() => {}
                Some(path) => {
                    let path = path.trim_end();
                    if !path.is_empty() {
                        received.push(normalizer.normalize(path));
                    }
                }
                None => {
                    if let Some(tx) = done_tx.take() {
                        let _ = tx.send(());
                    }
                }
            };

            if let Err(e) = self.runner.run(command, &mut on_line).await {
                tracing::warn!("{}; continuing with the output already read", e);
            }
        }

        // A runner that failed before streaming never sends the sentinel
        drop(done_tx);
        if done_rx.await.is_err() {
            tracing::debug!("`{}` ended without an end-of-stream signal", command);
        }

        let added = received.len();
        tracing::debug!("`{}` produced {} fragments: {:?}", command, added, received);
        fragments.extend(received);
        added
    }
}
