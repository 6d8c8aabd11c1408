use camino::{Utf8Path, Utf8PathBuf};
use std::borrow::Cow;
use std::future::Future;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::time::{Instant, timeout_at};

/// Default limit on how long one command may run
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// Callback receiving output lines.
///
/// Called with `Some(line)` for every stdout line in arrival order, then with
/// `None` exactly once when stdout reaches end-of-stream.
pub type LineHandler<'a> = dyn FnMut(Option<&str>) + Send + 'a;

/// Errors that can occur while running an external command
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Output stream of `{command}` was not captured")]
    StreamNotCaptured { command: String },

    #[error("Failed to wait for `{command}`: {source}")]
    Wait {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },
}

/// Runs one external command and streams its output lines.
///
/// Implementations block the calling task until the command has exited.
pub trait CommandRunner: Send + Sync + 'static {
    /// Run `command`, feeding stdout lines to `on_line`.
    ///
    /// # Returns
    /// The process exit code (`-1` when terminated by a signal)
    fn run<'a>(
        &'a self,
        command: &'a str,
        on_line: &'a mut LineHandler<'a>,
    ) -> impl Future<Output = Result<i32, ProcessError>> + Send + 'a;
}

/// Runs commands through the system shell (`sh -c` or `cmd /C`).
///
/// Stdout and stderr are captured, stdin is not connected. Stderr lines are
/// logged and never fail the run. Output that is not valid UTF-8 is decoded
/// lossily. A command still running after the timeout is killed.
#[derive(Debug, Clone)]
pub struct ShellRunner {
    working_dir: Option<Utf8PathBuf>,
    timeout: Duration,
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self {
            working_dir: None,
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }
}

impl ShellRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run commands from `dir` (normally the working-tree root)
    pub fn in_dir(dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            working_dir: Some(dir.into()),
            ..Self::default()
        }
    }

    /// Limit how long a single command may take
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn working_dir(&self) -> Option<&Utf8Path> {
        self.working_dir.as_deref()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn shell_command(&self, command: &str) -> Command {
        let mut cmd = if cfg!(target_os = "windows") {
            let mut c = Command::new("cmd");
            c.args(["/C", command]);
            c
        } else {
            let mut c = Command::new("sh");
            c.args(["-c", command]);
            c
        };

        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    fn timed_out(&self, command: &str) -> ProcessError {
        tracing::warn!("`{}` timed out after {:?}", command, self.timeout);
        ProcessError::Timeout {
            command: command.to_string(),
            timeout: self.timeout,
        }
    }
}

/// Strip the line terminator and decode, replacing invalid UTF-8
fn decode_line(buf: &[u8]) -> Cow<'_, str> {
    let line = buf.strip_suffix(b"\n").unwrap_or(buf);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    String::from_utf8_lossy(line)
}

/// Feed every line of `stream` to `on_line` until end-of-stream.
///
/// Consumes the stream so the pipe is closed on return, even after a read
/// error.
async fn for_each_line<S: AsyncRead + Unpin>(
    stream: S,
    command: &str,
    mut on_line: impl FnMut(&str),
) {
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => on_line(decode_line(&buf).as_ref()),
            Err(e) => {
                tracing::warn!("Failed to read output of `{}`: {}", command, e);
                break;
            }
        }
    }
}

async fn kill(child: &mut Child, command: &str) {
    if let Err(e) = child.kill().await {
        tracing::warn!("Failed to kill `{}`: {}", command, e);
    }
}

impl CommandRunner for ShellRunner {
    fn run<'a>(
        &'a self,
        command: &'a str,
        on_line: &'a mut LineHandler<'a>,
    ) -> impl Future<Output = Result<i32, ProcessError>> + Send + 'a {
        async move {
            tracing::debug!("Executing: {}", command);
            let start = Instant::now();
            let deadline = start + self.timeout;

            let mut child = self
                .shell_command(command)
                .spawn()
                .map_err(|source| ProcessError::Spawn {
                    command: command.to_string(),
                    source,
                })?;

            let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
                return Err(ProcessError::StreamNotCaptured {
                    command: command.to_string(),
                });
            };

            let stderr_command = command.to_string();
            let stderr_task = tokio::spawn(async move {
                for_each_line(stderr, &stderr_command, |line| {
                    tracing::warn!("`{}` stderr: {}", stderr_command, line)
                })
                .await;
            });

            let streamed = timeout_at(
                deadline,
                for_each_line(stdout, command, |line| on_line(Some(line))),
            )
            .await;
            on_line(None);

            if streamed.is_err() {
                kill(&mut child, command).await;
                return Err(self.timed_out(command));
            }

            let status = match timeout_at(deadline, child.wait()).await {
                Ok(status) => status.map_err(|source| ProcessError::Wait {
                    command: command.to_string(),
                    source,
                })?,
                Err(_) => {
                    kill(&mut child, command).await;
                    return Err(self.timed_out(command));
                }
            };

            match timeout_at(deadline, stderr_task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!("Stderr reader for `{}` failed: {}", command, e),
                Err(_) => tracing::warn!("Stderr of `{}` still open after exit", command),
            }

            let exit_code = status.code().unwrap_or(-1);
            tracing::debug!(
                "`{}` completed in {:.2}s with exit code {}",
                command,
                start.elapsed().as_secs_f32(),
                exit_code
            );

            Ok(exit_code)
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn collect(runner: &ShellRunner, command: &str) -> (Vec<Option<String>>, Result<i32, ProcessError>) {
        let mut events = Vec::new();
        let result = tokio_test::block_on(async {
            let mut on_line = |line: Option<&str>| events.push(line.map(str::to_string));
            runner.run(command, &mut on_line).await
        });
        (events, result)
    }

    #[test]
    fn test_lines_then_single_end_sentinel() {
        let (events, result) = collect(&ShellRunner::new(), "printf 'a.cs\\nb.cs\\n'");

        assert_eq!(result.unwrap(), 0);
        assert_eq!(
            events,
            vec![Some("a.cs".to_string()), Some("b.cs".to_string()), None]
        );
    }

    #[test]
    fn test_stderr_is_not_forwarded() {
        let (events, result) = collect(&ShellRunner::new(), "echo oops 1>&2; echo out");

        assert_eq!(result.unwrap(), 0);
        assert_eq!(events, vec![Some("out".to_string()), None]);
    }

    #[test]
    fn test_exit_code_reported() {
        let (events, result) = collect(&ShellRunner::new(), "exit 3");

        assert_eq!(result.unwrap(), 3);
        assert_eq!(events, vec![None]);
    }

    #[test]
    fn test_working_dir_is_used() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("marker.txt"), "").unwrap();
        let dir = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();

        let runner = ShellRunner::in_dir(&dir);
        let (events, _) = collect(&runner, "ls");

        assert!(events.contains(&Some("marker.txt".to_string())));
        assert_eq!(runner.working_dir(), Some(dir.as_path()));
    }

    #[test]
    fn test_invalid_utf8_line_does_not_end_stream() {
        let (events, result) = collect(
            &ShellRunner::new(),
            "printf 'a.cs\\n\\377bad.cs\\nb.cs\\nc.cs\\n'",
        );

        assert_eq!(result.unwrap(), 0);
        assert_eq!(
            events,
            vec![
                Some("a.cs".to_string()),
                Some("\u{FFFD}bad.cs".to_string()),
                Some("b.cs".to_string()),
                Some("c.cs".to_string()),
                None
            ]
        );
    }

    #[test]
    fn test_large_output_after_invalid_utf8_completes() {
        let runner = ShellRunner::new().with_timeout(Duration::from_secs(30));
        let (events, result) = collect(&runner, "printf '\\377x.cs\\n'; seq 1 20000");

        assert_eq!(result.unwrap(), 0);
        assert_eq!(events.len(), 20002);
        assert_eq!(events[20000], Some("20000".to_string()));
        assert_eq!(events.last(), Some(&None));
    }

    #[test]
    fn test_timeout_kills_command() {
        let runner = ShellRunner::new().with_timeout(Duration::from_millis(200));
        let (events, result) = collect(&runner, "echo first; sleep 5");

        assert!(matches!(result, Err(ProcessError::Timeout { .. })));
        assert_eq!(events, vec![Some("first".to_string()), None]);
    }

    #[test]
    fn test_decode_line_strips_terminators() {
        assert_eq!(decode_line(b"a.cs\r\n"), "a.cs");
        assert_eq!(decode_line(b"a.cs\n"), "a.cs");
        assert_eq!(decode_line(b"a.cs"), "a.cs");
        assert_eq!(decode_line(b"\xffa.cs\n"), "\u{FFFD}a.cs");
    }

    #[test]
    fn test_spawn_failure_in_missing_dir() {
        let runner = ShellRunner::in_dir("/nonexistent/tabsync/dir");
        let (events, result) = collect(&runner, "echo hi");

        assert!(matches!(result, Err(ProcessError::Spawn { .. })));
        assert!(events.is_empty());
    }
}
