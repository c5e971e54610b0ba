// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The local queue: jobs as child processes under a parallelism cap.
//!
//! Submitted jobs are staged and parked in a FIFO. A periodic tick
//! starts pending jobs while the running count stays below the cap; each
//! started process gets a watcher task that drives the job to `Finished`,
//! `Canceled`, or `Error` when the process exits.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use mq_adapters::{KillHandle, ProcessRunner, RunSpec};
use mq_core::program::LaunchSyntax;
use mq_core::{JobData, JobState, MoleQueueId, Program, QueueConfig, QueueKind};
use mq_storage::JobManager;

use crate::broker_log::BrokerLog;
use crate::queue::{
    launch_script, stage_input_files, write_script, Queue, QueueError, TimerKind,
    LOCAL_DRIVER_SCRIPT,
};

/// Upper bound on the auto-detected parallelism cap.
const AUTO_CORES_CAP: usize = 8;

struct LocalState {
    pending: VecDeque<MoleQueueId>,
    running: HashMap<MoleQueueId, KillHandle>,
}

struct LocalInner {
    name: String,
    config: Mutex<QueueConfig>,
    jobs: Arc<Mutex<JobManager>>,
    runner: Arc<dyn ProcessRunner>,
    log: BrokerLog,
    state: Mutex<LocalState>,
}

/// Runs jobs as local child processes, at most N in parallel, FIFO
/// otherwise.
#[derive(Clone)]
pub struct QueueLocal {
    inner: Arc<LocalInner>,
}

impl QueueLocal {
    pub fn new(
        name: impl Into<String>,
        mut config: QueueConfig,
        jobs: Arc<Mutex<JobManager>>,
        runner: Arc<dyn ProcessRunner>,
        log: BrokerLog,
    ) -> Self {
        config.kind = QueueKind::Local;
        Self {
            inner: Arc::new(LocalInner {
                name: name.into(),
                config: Mutex::new(config),
                jobs,
                runner,
                log,
                state: Mutex::new(LocalState {
                    pending: VecDeque::new(),
                    running: HashMap::new(),
                }),
            }),
        }
    }

    /// The effective parallelism cap: the configured core count, or all
    /// logical cores capped at 8 when unconfigured.
    pub fn max_parallel(&self) -> usize {
        let cores = self.inner.config.lock().cores;
        if cores > 0 {
            cores as usize
        } else {
            std::thread::available_parallelism()
                .map(usize::from)
                .unwrap_or(1)
                .min(AUTO_CORES_CAP)
        }
    }

    /// Jobs currently waiting in the FIFO, in order.
    pub fn pending_jobs(&self) -> Vec<MoleQueueId> {
        self.inner.state.lock().pending.iter().copied().collect()
    }

    pub fn running_count(&self) -> usize {
        self.inner.state.lock().running.len()
    }

    fn lookup_job(&self, id: MoleQueueId) -> Result<JobData, QueueError> {
        self.inner
            .jobs
            .lock()
            .lookup_job(id)
            .cloned()
            .ok_or(QueueError::UnknownJob(id))
    }

    fn fail_job(&self, id: MoleQueueId, message: String) {
        self.inner.log.error(message, Some(id));
        self.inner.jobs.lock().set_job_state(id, JobState::Error);
    }

    /// Start pending jobs while below the parallelism cap.
    async fn start_pending(&self) {
        loop {
            let next = {
                let mut state = self.inner.state.lock();
                if state.running.len() >= self.max_parallel() {
                    return;
                }
                state.pending.pop_front()
            };
            let Some(id) = next else { return };
            self.start_job(id).await;
        }
    }

    async fn start_job(&self, id: MoleQueueId) {
        let job = match self.lookup_job(id) {
            Ok(job) => job,
            Err(_) => return, // removed while queued: forget it
        };
        let program = match self.lookup_program(&job.program) {
            Some(program) => program,
            None => {
                self.fail_job(id, format!("unknown program '{}'", job.program));
                return;
            }
        };

        let spec = build_run_spec(&job, &program);
        let handle = match self.inner.runner.run(spec).await {
            Ok(handle) => handle,
            Err(e) => {
                self.fail_job(id, format!("failed to start process: {e}"));
                return;
            }
        };

        {
            let mut jobs = self.inner.jobs.lock();
            jobs.set_job_queue_id(id, handle.queue_id);
            jobs.set_job_state(id, JobState::RunningLocal);
        }
        self.inner
            .state
            .lock()
            .running
            .insert(id, handle.kill.clone());

        let this = self.clone();
        tokio::spawn(async move {
            let outcome = handle.wait().await;
            this.inner.state.lock().running.remove(&id);

            let mut jobs = this.inner.jobs.lock();
            match outcome {
                Ok(outcome) if outcome.killed => {
                    jobs.set_job_state(id, JobState::Canceled);
                }
                Ok(outcome) if outcome.success() => {
                    jobs.set_job_state(id, JobState::Finished);
                }
                Ok(outcome) => {
                    this.inner.log.error(
                        format!(
                            "process exited with {:?}: {}",
                            outcome.exit_code,
                            outcome.stderr.trim()
                        ),
                        Some(id),
                    );
                    jobs.set_job_state(id, JobState::Error);
                }
                Err(e) => {
                    this.inner
                        .log
                        .error(format!("lost track of process: {e}"), Some(id));
                    jobs.set_job_state(id, JobState::Error);
                }
            }
        });
    }
}

/// Assemble the process invocation for a job, wiring stdin/stdout per
/// the program's launch syntax.
fn build_run_spec(job: &JobData, program: &Program) -> RunSpec {
    let workdir = job.local_working_directory_path();
    let input_name = program.effective_input_filename(job);
    let base_name = match input_name.rfind('.') {
        Some(dot) if dot > 0 => input_name[..dot].to_string(),
        _ => input_name.clone(),
    };
    let output_name = program
        .output_filename
        .replace("$$inputFileBaseName$$", &base_name);

    let mut spec = if program.launch_syntax == LaunchSyntax::Custom {
        RunSpec::new(format!("./{LOCAL_DRIVER_SCRIPT}"))
    } else {
        RunSpec::new(program.executable_invocation())
            .args(program.arguments.split_whitespace().map(str::to_string))
    };

    match program.launch_syntax {
        LaunchSyntax::Plain | LaunchSyntax::Custom => {}
        LaunchSyntax::InputArg => {
            spec = spec.arg(&input_name);
        }
        LaunchSyntax::InputArgNoExt => {
            spec = spec.arg(&base_name);
        }
        LaunchSyntax::Redirect => {
            spec.stdin_file = Some(workdir.join(&input_name));
            spec.stdout_file = Some(workdir.join(&output_name));
        }
        LaunchSyntax::InputArgOutputRedirect => {
            spec = spec.arg(&input_name);
            spec.stdout_file = Some(workdir.join(&output_name));
        }
    }

    spec.cwd(workdir)
}

#[async_trait]
impl Queue for QueueLocal {
    fn name(&self) -> &str {
        &self.inner.name
    }

    fn kind(&self) -> QueueKind {
        QueueKind::Local
    }

    fn config(&self) -> QueueConfig {
        self.inner.config.lock().clone()
    }

    fn program_names(&self) -> Vec<String> {
        self.inner.config.lock().programs.keys().cloned().collect()
    }

    fn lookup_program(&self, name: &str) -> Option<Program> {
        self.inner.config.lock().programs.get(name).cloned()
    }

    async fn submit(&self, id: MoleQueueId) -> Result<(), QueueError> {
        let job = self.lookup_job(id)?;
        let program = self
            .lookup_program(&job.program)
            .ok_or_else(|| QueueError::UnknownProgram(job.program.clone()))?;

        self.inner.jobs.lock().set_job_state(id, JobState::Accepted);

        match stage_input_files(&job, &program) {
            Ok(dir) => {
                if program.launch_syntax == LaunchSyntax::Custom {
                    let script = launch_script(&job, &program, &self.config());
                    if let Err(e) = write_script(&dir, LOCAL_DRIVER_SCRIPT, &script) {
                        self.fail_job(id, format!("cannot write driver script: {e}"));
                        return Ok(());
                    }
                }
            }
            Err(e) => {
                self.fail_job(id, format!("cannot stage input files: {e}"));
                return Ok(());
            }
        }

        self.inner.state.lock().pending.push_back(id);
        self.inner
            .jobs
            .lock()
            .set_job_state(id, JobState::LocalQueued);
        Ok(())
    }

    async fn kill(&self, id: MoleQueueId) -> Result<(), QueueError> {
        let job = self.lookup_job(id)?;
        if job.job_state.is_terminal() {
            return Err(QueueError::InvalidJobState(job.job_state));
        }

        let killed_from_fifo = {
            let mut state = self.inner.state.lock();
            if let Some(pos) = state.pending.iter().position(|pending| *pending == id) {
                state.pending.remove(pos);
                true
            } else if let Some(kill) = state.running.get(&id) {
                kill.kill();
                return Ok(());
            } else {
                false
            }
        };

        if killed_from_fifo {
            self.inner.jobs.lock().set_job_state(id, JobState::Canceled);
            return Ok(());
        }
        Err(QueueError::InvalidJobState(job.job_state))
    }

    async fn handle_timer(&self, kind: TimerKind) {
        if kind == TimerKind::LocalTick {
            self.start_pending().await;
        }
    }
}

#[cfg(test)]
#[path = "local_tests.rs"]
mod tests;
