// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process supervisor: spawn, stream, signal, time out, and abort children
//!
//! Streaming is line-oriented: raw chunks are buffered to line boundaries,
//! carriage-return rewrites are folded to their final form, and runs of
//! blank lines collapse, before any callback fires. Callbacks for one child
//! are invoked from a single task, so observed order equals stream order.

use crate::abort::AbortSignal;
use crate::env::KILL_GRACE;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

/// How the child's stdio is wired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdioMode {
    /// TTY pass-through; no stream callbacks fire.
    Inherit,
    /// Captured pipes with line callbacks.
    Pipe,
}

/// Everything needed to run one child process.
#[derive(Debug, Clone)]
pub struct SpawnSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Environment overlay applied on top of the inherited environment.
    pub env: Vec<(String, String)>,
    pub cwd: Option<PathBuf>,
    /// Written to the child's stdin, which is then closed.
    pub stdin: Option<String>,
    pub stdio: StdioMode,
    pub timeout: Duration,
    /// Shown when the binary is missing, supplied by adapter metadata.
    pub install_hint: Option<String>,
}

impl SpawnSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            cwd: None,
            stdin: None,
            stdio: StdioMode::Pipe,
            timeout: crate::env::run_timeout(),
            install_hint: None,
        }
    }
}

/// Captured result of a finished child.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Errors from the supervisor.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("'{program}' was not found on PATH. {hint}")]
    BinaryNotFound { program: String, hint: String },

    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("i/o error while streaming: {0}")]
    Io(#[from] std::io::Error),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("aborted")]
    Aborted,
}

/// Buffers raw chunks to normalized lines.
///
/// Rules: `\r\n` and bare trailing `\r` are newlines; `\r` followed by more
/// content on the same line rewrites it (only the final form is kept); runs
/// of three or more newlines collapse to two.
#[derive(Debug, Default)]
pub struct LineNormalizer {
    buf: Vec<u8>,
    pending_cr: bool,
    blank_run: usize,
}

impl LineNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk; returns the lines completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in chunk {
            if self.pending_cr {
                self.pending_cr = false;
                match byte {
                    b'\n' => {
                        self.take_line(&mut lines);
                        continue;
                    }
                    _ => {
                        // Rewrite: discard everything before the CR.
                        self.buf.clear();
                    }
                }
            }
            match byte {
                b'\n' => self.take_line(&mut lines),
                b'\r' => self.pending_cr = true,
                _ => self.buf.push(byte),
            }
        }
        lines
    }

    /// Flush whatever is buffered as a final line.
    pub fn finish(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        self.pending_cr = false;
        if !self.buf.is_empty() {
            self.take_line(&mut lines);
        }
        lines
    }

    fn take_line(&mut self, lines: &mut Vec<String>) {
        let line = String::from_utf8_lossy(&self.buf).into_owned();
        self.buf.clear();
        if line.is_empty() {
            self.blank_run += 1;
            // A third consecutive newline (second blank line) is dropped.
            if self.blank_run >= 2 {
                return;
            }
        } else {
            self.blank_run = 0;
        }
        lines.push(line);
    }
}

#[derive(Clone, Copy)]
enum StreamSource {
    Stdout,
    Stderr,
}

/// Run a child to completion, streaming normalized lines to the callbacks.
///
/// Applies `spec.timeout` (soft termination first, hard kill after a grace
/// window) and honors `abort` the same way. In [`StdioMode::Inherit`] the
/// callbacks never fire and the captured output is empty.
pub async fn run<FO, FE>(
    spec: SpawnSpec,
    mut on_stdout: FO,
    mut on_stderr: FE,
    abort: &AbortSignal,
) -> Result<ProcessOutput, SupervisorError>
where
    FO: FnMut(&str),
    FE: FnMut(&str),
{
    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args);
    for (key, value) in &spec.env {
        cmd.env(key, value);
    }
    if let Some(cwd) = &spec.cwd {
        cmd.current_dir(cwd);
    }
    match spec.stdio {
        StdioMode::Inherit => {
            cmd.stdin(Stdio::inherit())
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit());
        }
        StdioMode::Pipe => {
            let stdin = if spec.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            };
            cmd.stdin(stdin).stdout(Stdio::piped()).stderr(Stdio::piped());
        }
    }
    #[cfg(unix)]
    cmd.process_group(0);
    cmd.kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            SupervisorError::BinaryNotFound {
                program: spec.program.clone(),
                hint: spec.install_hint.clone().unwrap_or_default(),
            }
        } else {
            SupervisorError::Spawn {
                program: spec.program.clone(),
                source: e,
            }
        }
    })?;

    // Write stdin and close it so the child sees EOF.
    if let Some(input) = &spec.stdin {
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(input.as_bytes()).await?;
            stdin.shutdown().await?;
        }
    }

    if spec.stdio == StdioMode::Inherit {
        return wait_inherit(child, &spec, abort).await;
    }

    let (line_tx, mut line_rx) = mpsc::channel::<(StreamSource, String)>(256);
    if let Some(stdout) = child.stdout.take() {
        spawn_reader(stdout, StreamSource::Stdout, line_tx.clone());
    }
    if let Some(stderr) = child.stderr.take() {
        spawn_reader(stderr, StreamSource::Stderr, line_tx);
    }

    let mut stdout = String::new();
    let mut stderr = String::new();
    let deadline = tokio::time::sleep(spec.timeout);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            received = line_rx.recv() => match received {
                Some((StreamSource::Stdout, line)) => {
                    on_stdout(&line);
                    stdout.push_str(&line);
                    stdout.push('\n');
                }
                Some((StreamSource::Stderr, line)) => {
                    on_stderr(&line);
                    stderr.push_str(&line);
                    stderr.push('\n');
                }
                // Both pipes closed: the child has exited (or closed its
                // streams); reap it.
                None => {
                    let status = child.wait().await?;
                    return Ok(ProcessOutput {
                        exit_code: status.code().unwrap_or(-1),
                        stdout,
                        stderr,
                    });
                }
            },
            () = abort.cancelled() => {
                terminate(&mut child).await;
                return Err(SupervisorError::Aborted);
            }
            () = &mut deadline => {
                terminate(&mut child).await;
                return Err(SupervisorError::Timeout(spec.timeout));
            }
        }
    }
}

async fn wait_inherit(
    mut child: Child,
    spec: &SpawnSpec,
    abort: &AbortSignal,
) -> Result<ProcessOutput, SupervisorError> {
    let deadline = tokio::time::sleep(spec.timeout);
    tokio::pin!(deadline);
    tokio::select! {
        status = child.wait() => {
            let status = status?;
            Ok(ProcessOutput {
                exit_code: status.code().unwrap_or(-1),
                stdout: String::new(),
                stderr: String::new(),
            })
        }
        () = abort.cancelled() => {
            terminate(&mut child).await;
            Err(SupervisorError::Aborted)
        }
        () = &mut deadline => {
            terminate(&mut child).await;
            Err(SupervisorError::Timeout(spec.timeout))
        }
    }
}

fn spawn_reader<R>(reader: R, source: StreamSource, tx: mpsc::Sender<(StreamSource, String)>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = reader;
        let mut normalizer = LineNormalizer::new();
        let mut chunk = [0u8; 8192];
        loop {
            match reader.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    for line in normalizer.push(&chunk[..n]) {
                        if tx.send((source, line)).await.is_err() {
                            return;
                        }
                    }
                }
            }
        }
        for line in normalizer.finish() {
            let _ = tx.send((source, line)).await;
        }
    });
}

/// Soft-terminate the child's process group, then hard-kill after a grace
/// window. Uses native process-group signalling rather than relying on
/// child cooperation.
async fn terminate(child: &mut Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;
        // Negative pid addresses the whole process group.
        let group = Pid::from_raw(-(pid as i32));
        if kill(group, Signal::SIGTERM).is_ok() {
            let graceful = tokio::time::timeout(KILL_GRACE, child.wait()).await;
            if graceful.is_ok() {
                return;
            }
            tracing::debug!(pid, "child ignored SIGTERM, killing");
        }
    }
    let _ = child.kill().await;
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
