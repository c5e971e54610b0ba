// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Child-process execution behind a swappable runner trait.
//!
//! A [`RunSpec`] describes one invocation; [`ProcessRunner::run`] starts
//! it and hands back a [`RunHandle`] carrying the scheduler-visible id
//! (the PID), a kill handle, and a future for the exit outcome. Stdout
//! and stderr are captured unless redirected to files, so callers get
//! scheduler output without touching pipes themselves.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};

use mq_core::QueueId;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

/// Errors from process execution.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("process exited before reporting an outcome")]
    OutcomeLost,

    #[error("{description} timed out after {}s", timeout.as_secs())]
    Timeout {
        description: String,
        timeout: Duration,
    },
}

/// One process invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: HashMap<String, String>,
    /// Redirect stdin from this file (launch syntax `Redirect`).
    pub stdin_file: Option<PathBuf>,
    /// Redirect stdout to this file instead of capturing it.
    pub stdout_file: Option<PathBuf>,
}

impl RunSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// The invocation as a single display string, for logs and fakes.
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// How a process ended.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// None when the process was killed by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    /// True when the exit was caused by our own kill request.
    pub killed: bool,
}

impl ProcessOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0) && !self.killed
    }
}

/// Requests termination of a running process.
///
/// Cloneable so a queue can keep one in its running-job table while the
/// watcher task owns the exit future.
#[derive(Debug, Clone)]
pub struct KillHandle {
    tx: mpsc::Sender<()>,
}

impl KillHandle {
    pub fn new(tx: mpsc::Sender<()>) -> Self {
        Self { tx }
    }

    /// Ask the process to terminate. Idempotent; the eventual
    /// [`ProcessOutcome`] reports `killed = true`.
    pub fn kill(&self) {
        let _ = self.tx.try_send(());
    }
}

/// A started process: its scheduler-visible id, a kill handle, and the
/// exit outcome.
pub struct RunHandle {
    pub queue_id: QueueId,
    pub kill: KillHandle,
    exited: oneshot::Receiver<ProcessOutcome>,
}

impl RunHandle {
    pub fn new(queue_id: QueueId, kill: KillHandle, exited: oneshot::Receiver<ProcessOutcome>) -> Self {
        Self {
            queue_id,
            kill,
            exited,
        }
    }

    /// Wait for the process to exit.
    pub async fn wait(self) -> Result<ProcessOutcome, ProcessError> {
        self.exited.await.map_err(|_| ProcessError::OutcomeLost)
    }
}

/// Launches child processes.
#[async_trait]
pub trait ProcessRunner: Send + Sync + 'static {
    /// Start the process described by `spec`. Returning `Ok` means the
    /// child has been spawned.
    async fn run(&self, spec: RunSpec) -> Result<RunHandle, ProcessError>;
}

/// Production runner on `tokio::process`.
#[derive(Debug, Clone, Default)]
pub struct TokioRunner;

impl TokioRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessRunner for TokioRunner {
    async fn run(&self, spec: RunSpec) -> Result<RunHandle, ProcessError> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args);
        cmd.kill_on_drop(true);
        if let Some(cwd) = &spec.cwd {
            cmd.current_dir(cwd);
        }
        for (key, value) in &spec.env {
            cmd.env(key, value);
        }

        cmd.stdin(match &spec.stdin_file {
            Some(path) => Stdio::from(std::fs::File::open(path)?),
            None => Stdio::null(),
        });
        cmd.stdout(match &spec.stdout_file {
            Some(path) => Stdio::from(std::fs::File::create(path)?),
            None => Stdio::piped(),
        });
        cmd.stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|source| ProcessError::Spawn {
            program: spec.program.clone(),
            source,
        })?;

        let queue_id = QueueId::new(u64::from(child.id().unwrap_or(0)));

        // Drain pipes concurrently so a chatty child cannot block on a
        // full pipe while we wait for it.
        let stdout_task = child.stdout.take().map(|mut out| {
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let _ = out.read_to_end(&mut buf).await;
                String::from_utf8_lossy(&buf).into_owned()
            })
        });
        let stderr_task = child.stderr.take().map(|mut err| {
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let _ = err.read_to_end(&mut buf).await;
                String::from_utf8_lossy(&buf).into_owned()
            })
        });

        let (kill_tx, mut kill_rx) = mpsc::channel(1);
        let (exit_tx, exit_rx) = oneshot::channel();

        tokio::spawn(async move {
            let mut killed = false;
            let status = tokio::select! {
                status = child.wait() => status,
                _ = kill_rx.recv() => {
                    killed = true;
                    let _ = child.start_kill();
                    child.wait().await
                }
            };

            let stdout = match stdout_task {
                Some(task) => task.await.unwrap_or_default(),
                None => String::new(),
            };
            let stderr = match stderr_task {
                Some(task) => task.await.unwrap_or_default(),
                None => String::new(),
            };

            let outcome = ProcessOutcome {
                exit_code: status.ok().and_then(|s| s.code()),
                stdout,
                stderr,
                killed,
            };
            let _ = exit_tx.send(outcome);
        });

        Ok(RunHandle::new(queue_id, KillHandle::new(kill_tx), exit_rx))
    }
}

/// Run a spec to completion with a timeout.
///
/// The child is killed if the timeout elapses and the error names the
/// operation so queue logs stay readable.
pub async fn run_with_timeout(
    runner: &dyn ProcessRunner,
    spec: RunSpec,
    timeout: Duration,
    description: &str,
) -> Result<ProcessOutcome, ProcessError> {
    let handle = runner.run(spec).await?;
    let kill = handle.kill.clone();
    match tokio::time::timeout(timeout, handle.wait()).await {
        Ok(outcome) => outcome,
        Err(_elapsed) => {
            kill.kill();
            Err(ProcessError::Timeout {
                description: description.to_string(),
                timeout,
            })
        }
    }
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
