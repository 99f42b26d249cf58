use crate::cancel::CancelToken;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Exit code reported when the program could not be launched.
pub const EXIT_FAILED_TO_START: i32 = 127;
/// Exit code reported when the deadline expired and the child was killed.
pub const EXIT_TIMED_OUT: i32 = 124;
/// Exit code reported when the run was cancelled and the child was killed.
pub const EXIT_CANCELLED: i32 = 130;
/// Exit code reported when the child was terminated by a signal.
pub const EXIT_SIGNALLED: i32 = -1;

/// A program plus its argument vector.
///
/// Arguments are handed to the OS as-is; nothing goes through a shell, so a
/// target path is always exactly one argument no matter what it contains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: OsString,
    pub args: Vec<OsString>,
    pub current_dir: Option<PathBuf>,
}

impl Invocation {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Human-readable command line, for logs only.
    pub fn display(&self) -> String {
        std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(|part| part.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// How a child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// The process ran to completion, whatever its exit code.
    Exited,
    FailedToStart,
    TimedOut,
    Cancelled,
}

impl ExecutionStatus {
    pub fn label(&self) -> &str {
        match self {
            ExecutionStatus::Exited => "exited",
            ExecutionStatus::FailedToStart => "failed to start",
            ExecutionStatus::TimedOut => "timed out",
            ExecutionStatus::Cancelled => "cancelled",
        }
    }
}

/// Captured output of one process execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub status: ExecutionStatus,
    pub duration: Duration,
}

impl ExecutionResult {
    fn failed_to_start(invocation: &Invocation, error: std::io::Error, started: Instant) -> Self {
        Self {
            stdout: String::new(),
            stderr: format!(
                "Failed to start '{}': {}",
                invocation.program.to_string_lossy(),
                error
            ),
            exit_code: EXIT_FAILED_TO_START,
            status: ExecutionStatus::FailedToStart,
            duration: started.elapsed(),
        }
    }

    /// Result for a scanner that was never started because the run was cancelled.
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: reason.into(),
            exit_code: EXIT_CANCELLED,
            status: ExecutionStatus::Cancelled,
            duration: Duration::ZERO,
        }
    }

    /// True when the process ran to completion (any exit code).
    pub fn completed(&self) -> bool {
        self.status == ExecutionStatus::Exited
    }

    pub fn success(&self) -> bool {
        self.completed() && self.exit_code == 0
    }

    /// stdout followed by stderr, as written to console logs.
    pub fn combined_output(&self) -> String {
        let mut combined = String::with_capacity(self.stdout.len() + self.stderr.len());
        combined.push_str(&self.stdout);
        combined.push_str(&self.stderr);
        combined
    }
}

/// Spawns external programs and captures their output.
///
/// `execute` never fails: a non-zero exit, a missing binary, an expired
/// deadline and a cancellation all come back as an `ExecutionResult`.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    timeout: Option<Duration>,
}

impl ProcessRunner {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub async fn execute(&self, invocation: &Invocation, cancel: &CancelToken) -> ExecutionResult {
        let started = Instant::now();
        let command_line = invocation.display();

        if cancel.is_cancelled() {
            tracing::info!(command = %command_line, "cancelled before start");
            return ExecutionResult::skipped(format!("Cancelled before starting '{command_line}'"));
        }

        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &invocation.current_dir {
            command.current_dir(dir);
        }

        tracing::debug!(command = %command_line, "spawning process");
        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(error) => {
                tracing::warn!(command = %command_line, %error, "process failed to start");
                return ExecutionResult::failed_to_start(invocation, error, started);
            }
        };

        // Streams are drained as they arrive so a killed child keeps what it printed.
        let stdout = CapturedStream::default();
        let stderr = CapturedStream::default();
        let mut stdout_pump = stdout.pump(child.stdout.take());
        let mut stderr_pump = stderr.pump(child.stderr.take());

        let finished = async {
            let status = child.wait().await?;
            let _ = (&mut stdout_pump).await;
            let _ = (&mut stderr_pump).await;
            Ok::<_, std::io::Error>(status)
        };

        let outcome = tokio::select! {
            status = finished => Some(status),
            _ = deadline(self.timeout) => None,
            _ = cancel.cancelled() => None,
        };

        let result = match outcome {
            Some(Ok(status)) => ExecutionResult {
                stdout: stdout.take().await,
                stderr: stderr.take().await,
                exit_code: status.code().unwrap_or(EXIT_SIGNALLED),
                status: ExecutionStatus::Exited,
                duration: started.elapsed(),
            },
            Some(Err(error)) => {
                stdout_pump.abort();
                stderr_pump.abort();
                ExecutionResult::failed_to_start(invocation, error, started)
            }
            None => {
                if let Err(error) = child.start_kill() {
                    tracing::debug!(command = %command_line, %error, "failed to kill process");
                }
                // A grandchild may still hold the pipes open.
                stdout_pump.abort();
                stderr_pump.abort();

                let (status, note, exit_code) = if cancel.is_cancelled() {
                    (
                        ExecutionStatus::Cancelled,
                        format!("'{command_line}' was cancelled and killed"),
                        EXIT_CANCELLED,
                    )
                } else {
                    (
                        ExecutionStatus::TimedOut,
                        format!(
                            "'{}' did not finish within {}s and was killed",
                            command_line,
                            self.timeout.map(|t| t.as_secs_f64()).unwrap_or_default()
                        ),
                        EXIT_TIMED_OUT,
                    )
                };

                let mut captured_stderr = stderr.take().await;
                if !captured_stderr.is_empty() && !captured_stderr.ends_with('\n') {
                    captured_stderr.push('\n');
                }
                captured_stderr.push_str(&note);

                ExecutionResult {
                    stdout: stdout.take().await,
                    stderr: captured_stderr,
                    exit_code,
                    status,
                    duration: started.elapsed(),
                }
            }
        };

        match result.status {
            ExecutionStatus::Exited => tracing::info!(
                command = %command_line,
                exit_code = result.exit_code,
                elapsed_ms = result.duration.as_millis() as u64,
                "process exited"
            ),
            _ => tracing::warn!(
                command = %command_line,
                status = result.status.label(),
                exit_code = result.exit_code,
                "process did not complete"
            ),
        }

        result
    }
}

/// Bytes read so far from one of the child's output pipes.
#[derive(Debug, Clone, Default)]
struct CapturedStream(Arc<Mutex<Vec<u8>>>);

impl CapturedStream {
    /// Copy `pipe` into this buffer on a background task until it closes.
    fn pump<R>(&self, pipe: Option<R>) -> JoinHandle<()>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let sink = Arc::clone(&self.0);
        tokio::spawn(async move {
            let Some(mut pipe) = pipe else { return };
            let mut chunk = [0u8; 8192];
            loop {
                match pipe.read(&mut chunk).await {
                    Ok(0) | Err(_) => break,
                    Ok(read) => sink.lock().await.extend_from_slice(&chunk[..read]),
                }
            }
        })
    }

    async fn take(&self) -> String {
        let bytes = std::mem::take(&mut *self.0.lock().await);
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

async fn deadline(timeout: Option<Duration>) {
    match timeout {
        Some(duration) => tokio::time::sleep(duration).await,
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invocation_keeps_arguments_discrete() {
        let invocation = Invocation::new("bandit")
            .arg("-r")
            .arg("repo; rm -rf /")
            .args(["-f", "json"]);

        assert_eq!(invocation.args.len(), 4);
        assert_eq!(invocation.args[1], OsString::from("repo; rm -rf /"));
        assert_eq!(invocation.display(), "bandit -r repo; rm -rf / -f json");
    }

    #[tokio::test]
    async fn test_missing_binary_is_captured() {
        let runner = ProcessRunner::default();
        let result = runner
            .execute(
                &Invocation::new("/this/does/not/exist"),
                &CancelToken::new(),
            )
            .await;

        assert_eq!(result.status, ExecutionStatus::FailedToStart);
        assert_eq!(result.exit_code, EXIT_FAILED_TO_START);
        assert!(result.stderr.contains("/this/does/not/exist"));
        assert!(!result.completed());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit_is_not_an_error() {
        let runner = ProcessRunner::default();
        let invocation = Invocation::new("sh").args(["-c", "echo out; echo err >&2; exit 3"]);
        let result = runner.execute(&invocation, &CancelToken::new()).await;

        assert_eq!(result.status, ExecutionStatus::Exited);
        assert_eq!(result.exit_code, 3);
        assert_eq!(result.stdout, "out\n");
        assert_eq!(result.stderr, "err\n");
        assert_eq!(result.combined_output(), "out\nerr\n");
        assert!(result.completed());
        assert!(!result.success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_kills_process() {
        let runner = ProcessRunner::new(Some(Duration::from_millis(200)));
        let invocation = Invocation::new("sh").args(["-c", "sleep 10"]);
        let result = runner.execute(&invocation, &CancelToken::new()).await;

        assert_eq!(result.status, ExecutionStatus::TimedOut);
        assert_eq!(result.exit_code, EXIT_TIMED_OUT);
        assert!(result.duration < Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_keeps_partial_output() {
        let runner = ProcessRunner::new(Some(Duration::from_millis(500)));
        let invocation =
            Invocation::new("sh").args(["-c", "echo scanning; echo 'loading plugins' >&2; sleep 10"]);
        let result = runner.execute(&invocation, &CancelToken::new()).await;

        assert_eq!(result.status, ExecutionStatus::TimedOut);
        assert_eq!(result.stdout, "scanning\n");
        assert!(result.stderr.starts_with("loading plugins\n"));
        assert!(result.stderr.contains("did not finish within"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancel_kills_running_process() {
        let runner = ProcessRunner::default();
        let cancel = CancelToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let invocation = Invocation::new("sh").args(["-c", "sleep 10"]);
        let result = runner.execute(&invocation, &cancel).await;

        assert_eq!(result.status, ExecutionStatus::Cancelled);
        assert_eq!(result.exit_code, EXIT_CANCELLED);
    }

    #[tokio::test]
    async fn test_cancelled_token_skips_spawn() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let result = ProcessRunner::default()
            .execute(&Invocation::new("/this/does/not/exist"), &cancel)
            .await;

        assert_eq!(result.status, ExecutionStatus::Cancelled);
    }
}
