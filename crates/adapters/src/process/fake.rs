// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake process runner for deterministic testing.
#![cfg_attr(coverage_nightly, coverage(off))]

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

use mq_core::QueueId;

use super::{KillHandle, ProcessError, ProcessOutcome, ProcessRunner, RunHandle, RunSpec};

enum Scripted {
    /// Resolve immediately with this outcome.
    Outcome(ProcessOutcome),
    /// Stay running until the test completes it (or kills it).
    Hold(oneshot::Receiver<ProcessOutcome>),
    /// Fail the spawn itself.
    SpawnError(String),
}

struct FakeState {
    specs: Vec<RunSpec>,
    scripted: VecDeque<Scripted>,
    next_queue_id: u64,
}

/// Records every [`RunSpec`] and replays scripted outcomes.
///
/// Unscripted runs succeed immediately with empty output. `push_hold()`
/// returns a [`FakeProcess`] the test uses to finish the process later,
/// which is how long-running jobs are modelled.
#[derive(Clone)]
pub struct FakeRunner {
    inner: Arc<Mutex<FakeState>>,
}

/// Test-side control for one held fake process.
pub struct FakeProcess {
    tx: oneshot::Sender<ProcessOutcome>,
}

impl FakeProcess {
    /// Finish the process with the given outcome.
    pub fn complete(self, outcome: ProcessOutcome) {
        let _ = self.tx.send(outcome);
    }

    /// Finish the process successfully with the given stdout.
    pub fn succeed(self, stdout: &str) {
        self.complete(ProcessOutcome {
            exit_code: Some(0),
            stdout: stdout.to_string(),
            ..ProcessOutcome::default()
        });
    }

    /// Finish the process with a non-zero exit code.
    pub fn fail(self, exit_code: i32, stderr: &str) {
        self.complete(ProcessOutcome {
            exit_code: Some(exit_code),
            stderr: stderr.to_string(),
            ..ProcessOutcome::default()
        });
    }
}

impl Default for FakeRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeRunner {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeState {
                specs: Vec::new(),
                scripted: VecDeque::new(),
                next_queue_id: 1000,
            })),
        }
    }

    /// Script the next run to resolve immediately with `outcome`.
    pub fn push_outcome(&self, outcome: ProcessOutcome) {
        self.inner.lock().scripted.push_back(Scripted::Outcome(outcome));
    }

    /// Script the next run to succeed immediately with `stdout`.
    pub fn push_success(&self, stdout: &str) {
        self.push_outcome(ProcessOutcome {
            exit_code: Some(0),
            stdout: stdout.to_string(),
            ..ProcessOutcome::default()
        });
    }

    /// Script the next run to fail immediately with `exit_code`.
    pub fn push_failure(&self, exit_code: i32, stderr: &str) {
        self.push_outcome(ProcessOutcome {
            exit_code: Some(exit_code),
            stderr: stderr.to_string(),
            ..ProcessOutcome::default()
        });
    }

    /// Script the next run to stay running until completed via the
    /// returned control (or killed through its [`KillHandle`]).
    pub fn push_hold(&self) -> FakeProcess {
        let (tx, rx) = oneshot::channel();
        self.inner.lock().scripted.push_back(Scripted::Hold(rx));
        FakeProcess { tx }
    }

    /// Script the next run to fail at spawn time.
    pub fn push_spawn_error(&self, message: &str) {
        self.inner
            .lock()
            .scripted
            .push_back(Scripted::SpawnError(message.to_string()));
    }

    /// All recorded run specs, in call order.
    pub fn calls(&self) -> Vec<RunSpec> {
        self.inner.lock().specs.clone()
    }

    /// Recorded invocations as display strings, for sequence assertions.
    pub fn call_lines(&self) -> Vec<String> {
        self.inner
            .lock()
            .specs
            .iter()
            .map(RunSpec::command_line)
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.inner.lock().specs.len()
    }
}

#[async_trait]
impl ProcessRunner for FakeRunner {
    async fn run(&self, spec: RunSpec) -> Result<RunHandle, ProcessError> {
        let (scripted, queue_id) = {
            let mut inner = self.inner.lock();
            inner.specs.push(spec.clone());
            let scripted = inner
                .scripted
                .pop_front()
                .unwrap_or(Scripted::Outcome(ProcessOutcome {
                    exit_code: Some(0),
                    ..ProcessOutcome::default()
                }));
            let queue_id = QueueId::new(inner.next_queue_id);
            inner.next_queue_id += 1;
            (scripted, queue_id)
        };

        let (kill_tx, mut kill_rx) = mpsc::channel(1);
        let (exit_tx, exit_rx) = oneshot::channel();

        match scripted {
            Scripted::SpawnError(message) => {
                return Err(ProcessError::Spawn {
                    program: spec.program,
                    source: std::io::Error::other(message),
                });
            }
            Scripted::Outcome(outcome) => {
                let _ = exit_tx.send(outcome);
            }
            Scripted::Hold(ctrl_rx) => {
                tokio::spawn(async move {
                    let outcome = tokio::select! {
                        result = ctrl_rx => result.unwrap_or_default(),
                        _ = kill_rx.recv() => ProcessOutcome {
                            exit_code: None,
                            killed: true,
                            ..ProcessOutcome::default()
                        },
                    };
                    let _ = exit_tx.send(outcome);
                });
            }
        }

        Ok(RunHandle::new(queue_id, KillHandle::new(kill_tx), exit_rx))
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
