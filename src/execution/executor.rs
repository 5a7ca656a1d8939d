//! Command executors - spawn a step's command and wait for it

use crate::core::Invocation;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::process::{ExitStatus, Stdio};
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Exit code reported when the program cannot be spawned
pub const EXIT_SPAWN_FAILED: i32 = 127;

/// Exit code reported when a step exceeds its timeout
pub const EXIT_TIMED_OUT: i32 = 124;

/// Number of output lines kept per step
pub const DEFAULT_TAIL_LINES: usize = 20;

/// How long output is still read after the command has exited
const OUTPUT_DRAIN_GRACE: Duration = Duration::from_millis(250);

/// Errors that prevent a command from producing an exit status
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("timed out after {} seconds", .0.as_secs())]
    Timeout(Duration),

    #[error("I/O error while running command: {0}")]
    Io(#[from] std::io::Error),
}

impl ExecutorError {
    /// Exit code the runner reports for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            ExecutorError::Spawn { .. } => EXIT_SPAWN_FAILED,
            ExecutorError::Timeout(_) => EXIT_TIMED_OUT,
            ExecutorError::Io(_) => 1,
        }
    }
}

/// Which stream an output line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Receives command output as it is produced
pub trait OutputSink: Send + Sync {
    /// Called once per line, without the trailing newline
    fn on_line(&self, step: &str, stream: OutputStream, line: &str);
}

/// Exit status and trailing output of a finished command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub exit_code: i32,
    pub output_tail: Vec<String>,
}

impl CommandOutcome {
    pub fn success() -> Self {
        Self {
            exit_code: 0,
            output_tail: Vec::new(),
        }
    }

    pub fn with_code(exit_code: i32) -> Self {
        Self {
            exit_code,
            output_tail: Vec::new(),
        }
    }
}

/// Trait for command execution - allows for different implementations
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run the command and wait for it to exit
    async fn execute(
        &self,
        invocation: &Invocation,
        sink: Option<&dyn OutputSink>,
    ) -> Result<CommandOutcome, ExecutorError>;
}

/// Executor that spawns real processes
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    tail_lines: usize,
}

impl Default for ProcessExecutor {
    fn default() -> Self {
        Self {
            tail_lines: DEFAULT_TAIL_LINES,
        }
    }
}

impl ProcessExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tail_lines(mut self, tail_lines: usize) -> Self {
        self.tail_lines = tail_lines;
        self
    }
}

#[async_trait]
impl CommandExecutor for ProcessExecutor {
    async fn execute(
        &self,
        invocation: &Invocation,
        sink: Option<&dyn OutputSink>,
    ) -> Result<CommandOutcome, ExecutorError> {
        let (program, args) = invocation.command.argv();
        debug!(step = %invocation.step_name, %program, ?args, "Spawning command");

        let mut command = Command::new(program);
        command
            .args(&args)
            .envs(&invocation.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &invocation.working_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|source| ExecutorError::Spawn {
            program: program.to_string(),
            source,
        })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let tail = OutputTail::new(self.tail_lines);
        let step = invocation.step_name.as_str();

        let status = {
            let mut readers = std::pin::pin!(async {
                let (out, err) = tokio::join!(
                    forward_lines(stdout, OutputStream::Stdout, step, sink, &tail),
                    forward_lines(stderr, OutputStream::Stderr, step, sink, &tail),
                );
                out.and(err)
            });
            let mut readers_done = false;

            // The exit status comes from the child alone; background processes
            // may keep the pipes open long after it exits
            let wait = async {
                loop {
                    tokio::select! {
                        status = child.wait() => return status,
                        read = &mut readers, if !readers_done => {
                            readers_done = true;
                            if let Err(e) = read {
                                warn!(step = %step, "Failed to read command output: {}", e);
                            }
                        }
                    }
                }
            };

            let waited = match invocation.timeout {
                Some(limit) => timeout(limit, wait).await,
                None => Ok(wait.await),
            };

            let status = match waited {
                Ok(status) => status?,
                Err(_) => {
                    warn!(step = %step, "Command timed out, killing it");
                    if let Err(e) = child.kill().await {
                        warn!(step = %step, "Failed to kill timed out command: {}", e);
                    }
                    return Err(ExecutorError::Timeout(invocation.timeout.unwrap_or_default()));
                }
            };

            if !readers_done {
                match timeout(OUTPUT_DRAIN_GRACE, &mut readers).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => warn!(step = %step, "Failed to read command output: {}", e),
                    Err(_) => debug!(step = %step, "Output pipes still held by background processes, detaching"),
                }
            }

            status
        };

        let exit_code = exit_code_of(status);
        debug!(step = %step, exit_code, "Command exited");

        Ok(CommandOutcome {
            exit_code,
            output_tail: tail.into_lines(),
        })
    }
}

/// Executor that prints what would run and always succeeds
#[derive(Debug, Clone, Default)]
pub struct DryRunExecutor;

#[async_trait]
impl CommandExecutor for DryRunExecutor {
    async fn execute(
        &self,
        invocation: &Invocation,
        sink: Option<&dyn OutputSink>,
    ) -> Result<CommandOutcome, ExecutorError> {
        let mut line = format!("would run: {}", invocation.command);
        if let Some(dir) = &invocation.working_dir {
            line.push_str(&format!(" (in {})", dir.display()));
        }
        if let Some(sink) = sink {
            sink.on_line(&invocation.step_name, OutputStream::Stdout, &line);
        }

        Ok(CommandOutcome {
            exit_code: 0,
            output_tail: vec![line],
        })
    }
}

/// Bounded buffer of the most recent output lines
struct OutputTail {
    limit: usize,
    lines: Mutex<VecDeque<String>>,
}

impl OutputTail {
    fn new(limit: usize) -> Self {
        Self {
            limit,
            lines: Mutex::new(VecDeque::with_capacity(limit)),
        }
    }

    fn push(&self, line: String) {
        if self.limit == 0 {
            return;
        }
        if let Ok(mut lines) = self.lines.lock() {
            if lines.len() == self.limit {
                lines.pop_front();
            }
            lines.push_back(line);
        }
    }

    fn into_lines(self) -> Vec<String> {
        self.lines
            .into_inner()
            .map(Vec::from)
            .unwrap_or_default()
    }
}

async fn forward_lines<R: AsyncRead + Unpin>(
    reader: Option<R>,
    stream: OutputStream,
    step: &str,
    sink: Option<&dyn OutputSink>,
    tail: &OutputTail,
) -> std::io::Result<()> {
    let Some(reader) = reader else {
        return Ok(());
    };

    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            return Ok(());
        }
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(['\n', '\r']);
        if let Some(sink) = sink {
            sink.on_line(step, stream, line);
        }
        tail.push(line.to_string());
    }
}

fn exit_code_of(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    1
}
