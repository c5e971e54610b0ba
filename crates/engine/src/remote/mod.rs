// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The remote queue: stage → submit → poll → retrieve → clean over SSH.
//!
//! Every stage is one short-lived ssh/scp process. Transient failures
//! requeue the job for another submission attempt up to a per-job cap;
//! disappearing from the scheduler's queue listing is the only path to
//! `Finished`. At most one status poll is in flight per queue.

mod pbs;
mod sge;

pub use pbs::PbsAdapter;
pub use sge::SgeAdapter;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::warn;

use mq_adapters::{ProcessOutcome, ProcessRunner, SshClient, SshConfig};
use mq_core::{
    IdType, JobData, JobState, MoleQueueId, Program, QueueConfig, QueueId, QueueKind,
};
use mq_storage::JobManager;

use crate::broker_log::BrokerLog;
use crate::queue::{
    copy_dir_recursive, launch_script, stage_input_files, write_script, Queue, QueueError,
    TimerKind,
};

/// Submission attempts per job before it is marked `Error`.
pub const MAX_JOB_FAILURES: u32 = 3;

/// Parses the output of one scheduler family's commands.
pub trait SchedulerAdapter: Send + Sync {
    fn kind(&self) -> QueueKind;

    fn default_launch_template(&self) -> &'static str;

    fn default_launch_script_name(&self) -> &'static str;

    /// Extract the scheduler's job id from submission-command output.
    fn parse_queue_id(&self, submission_output: &str) -> Option<IdType>;

    /// Parse one row of queue-status output into (queue id, state).
    /// Header and malformed rows return `None`.
    fn parse_queue_line(&self, line: &str) -> Option<(IdType, JobState)>;

    /// The full status command for the given tracked jobs.
    fn queue_request_command(&self, base: &str, user: &str, ids: &[QueueId]) -> String;

    /// Non-zero exit codes the status command may legally return,
    /// in addition to zero.
    fn allowed_request_exit_codes(&self) -> &[i32];
}

/// Leading decimal digits of `s`, if it starts with at least one.
pub(crate) fn leading_digits(s: &str) -> Option<IdType> {
    let digits: String = s.chars().take_while(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

struct RemoteState {
    pending_submission: Vec<MoleQueueId>,
    failures: HashMap<MoleQueueId, u32>,
    /// Scheduler id → MoleQueue id for every job we expect in listings.
    tracked: HashMap<QueueId, MoleQueueId>,
    is_checking_queue: bool,
}

struct RemoteInner {
    name: String,
    config: QueueConfig,
    jobs: Arc<Mutex<JobManager>>,
    ssh: SshClient,
    adapter: Box<dyn SchedulerAdapter>,
    log: BrokerLog,
    state: Mutex<RemoteState>,
}

/// Marshals jobs through a remote batch scheduler over SSH.
#[derive(Clone)]
pub struct QueueRemoteSsh {
    inner: Arc<RemoteInner>,
}

impl QueueRemoteSsh {
    pub fn new(
        name: impl Into<String>,
        mut config: QueueConfig,
        jobs: Arc<Mutex<JobManager>>,
        runner: Arc<dyn ProcessRunner>,
        log: BrokerLog,
    ) -> Self {
        let adapter: Box<dyn SchedulerAdapter> = match config.kind {
            QueueKind::Sge => Box::new(SgeAdapter),
            _ => Box::new(PbsAdapter),
        };
        config.kind = adapter.kind();

        let generic = QueueConfig::default();
        if config.launch_template == generic.launch_template {
            config.launch_template = adapter.default_launch_template().to_string();
        }
        if config.launch_script_name == generic.launch_script_name {
            config.launch_script_name = adapter.default_launch_script_name().to_string();
        }

        let ssh = SshClient::new(
            runner,
            SshConfig {
                host_name: config.host_name.clone(),
                user_name: config.user_name.clone(),
                ssh_port: config.ssh_port,
                identity_file: config.identity_file.clone(),
                ssh_executable: config.ssh_executable.clone(),
                scp_executable: config.scp_executable.clone(),
            },
        );

        Self {
            inner: Arc::new(RemoteInner {
                name: name.into(),
                config,
                jobs,
                ssh,
                adapter,
                log,
                state: Mutex::new(RemoteState {
                    pending_submission: Vec::new(),
                    failures: HashMap::new(),
                    tracked: HashMap::new(),
                    is_checking_queue: false,
                }),
            }),
        }
    }

    /// Jobs waiting for a submission attempt.
    pub fn pending_submissions(&self) -> Vec<MoleQueueId> {
        self.inner.state.lock().pending_submission.clone()
    }

    /// Jobs currently expected in scheduler listings.
    pub fn tracked_jobs(&self) -> usize {
        self.inner.state.lock().tracked.len()
    }

    fn remote_job_dir(&self, id: MoleQueueId) -> String {
        format!(
            "{}/{}",
            self.inner.config.working_directory_base,
            id.value()
        )
    }

    fn lookup_job(&self, id: MoleQueueId) -> Option<JobData> {
        self.inner.jobs.lock().lookup_job(id).cloned()
    }

    fn fail_job(&self, id: MoleQueueId, message: String) {
        self.inner.log.error(message, Some(id));
        self.inner.jobs.lock().set_job_state(id, JobState::Error);
    }

    /// Record a failed submission stage. Requeues the job while it has
    /// attempts left, otherwise marks it `Error`.
    fn retry_or_fail(&self, id: MoleQueueId, message: String) {
        let attempts = {
            let mut state = self.inner.state.lock();
            let attempts = state.failures.entry(id).or_insert(0);
            *attempts += 1;
            let current = *attempts;
            if current < MAX_JOB_FAILURES {
                state.pending_submission.push(id);
            }
            current
        };

        if attempts < MAX_JOB_FAILURES {
            self.inner.log.warning(
                format!("{message}; retrying ({attempts}/{MAX_JOB_FAILURES})"),
                Some(id),
            );
        } else {
            self.fail_job(id, format!("{message}; giving up after {attempts} attempts"));
        }
    }

    async fn submit_pending_jobs(&self) {
        let pending: Vec<MoleQueueId> = {
            let mut state = self.inner.state.lock();
            std::mem::take(&mut state.pending_submission)
        };
        for id in pending {
            let this = self.clone();
            tokio::spawn(async move {
                this.begin_job_submission(id).await;
            });
        }
    }

    /// The full submission pipeline for one job: write the launch script,
    /// create the remote base directory, copy inputs, submit, parse the
    /// scheduler id.
    async fn begin_job_submission(&self, id: MoleQueueId) {
        let Some(job) = self.lookup_job(id) else {
            return; // removed while pending: forget it
        };
        let Some(program) = self.lookup_program(&job.program) else {
            self.fail_job(id, format!("unknown program '{}'", job.program));
            return;
        };

        // Stage files once; a requeued job reuses its staged directory.
        if !job.local_working_directory_path().exists() {
            let script = launch_script(&job, &program, &self.inner.config);
            let staged = stage_input_files(&job, &program).and_then(|dir| {
                write_script(&dir, &self.inner.config.launch_script_name, &script)
            });
            if let Err(e) = staged {
                self.fail_job(id, format!("cannot stage input files: {e}"));
                return;
            }
        }

        // mkdir -p <workingDirectoryBase>; the job folder itself is
        // created by scp.
        let mkdir = format!("mkdir -p {}", self.inner.config.working_directory_base);
        match self.inner.ssh.execute(&mkdir).await {
            Ok(outcome) if outcome.success() => {}
            Ok(outcome) => {
                self.retry_or_fail(id, describe_failure("cannot create remote directory", &outcome));
                return;
            }
            Err(e) => {
                self.retry_or_fail(id, format!("cannot reach remote host: {e}"));
                return;
            }
        }

        let remote_dir = self.remote_job_dir(id);
        match self
            .inner
            .ssh
            .copy_dir_to(&job.local_working_directory_path(), &remote_dir)
            .await
        {
            Ok(outcome) if outcome.success() => {}
            Ok(outcome) => {
                self.retry_or_fail(
                    id,
                    describe_failure("cannot copy input files to remote host", &outcome),
                );
                return;
            }
            Err(e) => {
                self.retry_or_fail(id, format!("cannot reach remote host: {e}"));
                return;
            }
        }

        let submit = format!(
            "cd {} && {} {}",
            remote_dir, self.inner.config.submission_command, self.inner.config.launch_script_name
        );
        let outcome = match self.inner.ssh.execute(&submit).await {
            Ok(outcome) if outcome.success() => outcome,
            Ok(outcome) => {
                self.retry_or_fail(
                    id,
                    describe_failure("cannot submit job to remote scheduler", &outcome),
                );
                return;
            }
            Err(e) => {
                self.retry_or_fail(id, format!("cannot reach remote host: {e}"));
                return;
            }
        };

        let Some(queue_id) = self.inner.adapter.parse_queue_id(&outcome.stdout) else {
            self.fail_job(
                id,
                format!(
                    "cannot parse scheduler id from submission output: {}",
                    outcome.stdout.trim()
                ),
            );
            return;
        };
        let queue_id = QueueId::new(queue_id);

        let submitted = {
            let mut jobs = self.inner.jobs.lock();
            let submitted = jobs.set_job_state(id, JobState::Submitted);
            if submitted {
                jobs.set_job_queue_id(id, queue_id);
            }
            submitted
        };
        if !submitted {
            // Canceled or removed while the pipeline was in flight; the
            // remote copy is orphaned and left for the kill path or the
            // operator.
            self.inner.log.warning(
                format!("job was withdrawn during submission; scheduler id {queue_id}"),
                Some(id),
            );
            return;
        }

        let mut state = self.inner.state.lock();
        state.failures.remove(&id);
        state.tracked.insert(queue_id, id);
    }

    /// Poll the remote scheduler and update every tracked job. Jobs gone
    /// from the listing move on to finalization.
    async fn request_queue_update(&self) {
        let tracked_ids: Vec<QueueId> = {
            let mut state = self.inner.state.lock();
            if state.is_checking_queue || state.tracked.is_empty() {
                return;
            }
            state.is_checking_queue = true;
            state.tracked.keys().copied().collect()
        };

        let command = self.inner.adapter.queue_request_command(
            &self.inner.config.request_queue_command,
            &self.inner.config.user_name,
            &tracked_ids,
        );

        let outcome = match self.inner.ssh.execute(&command).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.inner
                    .log
                    .warning(format!("queue status request failed: {e}"), None);
                self.inner.state.lock().is_checking_queue = false;
                return;
            }
        };

        let allowed = outcome.exit_code.is_some_and(|code| {
            code == 0 || self.inner.adapter.allowed_request_exit_codes().contains(&code)
        });
        if !allowed {
            self.inner.log.warning(
                describe_failure("queue status request returned an error", &outcome),
                None,
            );
            self.inner.state.lock().is_checking_queue = false;
            return;
        }

        let mut seen: Vec<QueueId> = Vec::new();
        for line in outcome.stdout.lines() {
            let Some((raw_id, observed)) = self.inner.adapter.parse_queue_line(line) else {
                continue;
            };
            let queue_id = QueueId::new(raw_id);
            let mole_queue_id = {
                let state = self.inner.state.lock();
                state.tracked.get(&queue_id).copied()
            };
            if let Some(id) = mole_queue_id {
                seen.push(queue_id);
                self.advance_job(id, observed);
            }
        }

        let vanished: Vec<QueueId> = tracked_ids
            .into_iter()
            .filter(|queue_id| !seen.contains(queue_id))
            .collect();
        for queue_id in vanished {
            let this = self.clone();
            tokio::spawn(async move {
                this.begin_finalize_job(queue_id).await;
            });
        }

        self.inner.state.lock().is_checking_queue = false;
    }

    /// Walk a job along the remote pipeline to `target`, one drawn edge
    /// at a time, so observers see every intermediate transition.
    fn advance_job(&self, id: MoleQueueId, target: JobState) {
        const PATH: [JobState; 4] = [
            JobState::Submitted,
            JobState::RemoteQueued,
            JobState::RunningRemote,
            JobState::Finished,
        ];
        let Some(target_rank) = PATH.iter().position(|state| *state == target) else {
            return;
        };

        let mut jobs = self.inner.jobs.lock();
        loop {
            let Some(job) = jobs.lookup_job(id) else { return };
            let Some(rank) = PATH.iter().position(|state| *state == job.job_state) else {
                return; // canceled or errored out of band
            };
            if rank >= target_rank {
                return;
            }
            if !jobs.set_job_state(id, PATH[rank + 1]) {
                return;
            }
        }
    }

    /// Retrieve output, mirror it to the custom destination, clean up,
    /// and mark the job finished.
    async fn begin_finalize_job(&self, queue_id: QueueId) {
        let id = {
            let mut state = self.inner.state.lock();
            match state.tracked.remove(&queue_id) {
                Some(id) => id,
                None => return,
            }
        };
        let Some(job) = self.lookup_job(id) else {
            return;
        };

        let skip_retrieval = !job.retrieve_output
            || (job.clean_local_working_directory && job.output_directory.is_empty());
        if !skip_retrieval {
            let local_parent = job
                .local_working_directory_path()
                .parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| job.local_working_directory_path());
            match self
                .inner
                .ssh
                .copy_dir_from(&self.remote_job_dir(id), &local_parent)
                .await
            {
                Ok(outcome) if outcome.success() => {}
                Ok(outcome) => {
                    self.fail_job(
                        id,
                        describe_failure("error copying job output from remote host", &outcome),
                    );
                    return;
                }
                Err(e) => {
                    self.fail_job(id, format!("error copying job output: {e}"));
                    return;
                }
            }
        }

        if !job.output_directory.is_empty()
            && job.output_directory != job.local_working_directory
        {
            if let Err(e) = copy_dir_recursive(
                &job.local_working_directory_path(),
                std::path::Path::new(&job.output_directory),
            ) {
                self.fail_job(
                    id,
                    format!(
                        "cannot copy '{}' -> '{}': {e}",
                        job.local_working_directory, job.output_directory
                    ),
                );
                return;
            }
        }

        if job.clean_local_working_directory {
            if let Err(e) = std::fs::remove_dir_all(job.local_working_directory_path()) {
                self.inner.log.warning(
                    format!("cannot remove local working directory: {e}"),
                    Some(id),
                );
            }
        }

        if job.clean_remote_files {
            let remote_dir = self.remote_job_dir(id);
            if remote_dir.trim() == "/" {
                self.inner.log.error(
                    "refusing to clean remote directory '/'".to_string(),
                    Some(id),
                );
            } else {
                match self.inner.ssh.execute(&format!("rm -rf {remote_dir}")).await {
                    Ok(outcome) if outcome.success() => {}
                    Ok(outcome) => {
                        self.fail_job(
                            id,
                            describe_failure("error cleaning remote directory", &outcome),
                        );
                        return;
                    }
                    Err(e) => {
                        self.fail_job(id, format!("error cleaning remote directory: {e}"));
                        return;
                    }
                }
            }
        }

        self.advance_job(id, JobState::Finished);
    }
}

fn describe_failure(what: &str, outcome: &ProcessOutcome) -> String {
    let detail = if outcome.stderr.trim().is_empty() {
        outcome.stdout.trim()
    } else {
        outcome.stderr.trim()
    };
    format!("{what} (exit code {:?}) {detail}", outcome.exit_code)
}

#[async_trait]
impl Queue for QueueRemoteSsh {
    fn name(&self) -> &str {
        &self.inner.name
    }

    fn kind(&self) -> QueueKind {
        self.inner.config.kind
    }

    fn config(&self) -> QueueConfig {
        self.inner.config.clone()
    }

    fn program_names(&self) -> Vec<String> {
        self.inner.config.programs.keys().cloned().collect()
    }

    fn lookup_program(&self, name: &str) -> Option<Program> {
        self.inner.config.programs.get(name).cloned()
    }

    async fn submit(&self, id: MoleQueueId) -> Result<(), QueueError> {
        let job = self.lookup_job(id).ok_or(QueueError::UnknownJob(id))?;
        if !self.has_program(&job.program) {
            return Err(QueueError::UnknownProgram(job.program));
        }

        self.inner.jobs.lock().set_job_state(id, JobState::Accepted);
        self.inner.state.lock().pending_submission.push(id);
        Ok(())
    }

    async fn kill(&self, id: MoleQueueId) -> Result<(), QueueError> {
        let job = self.lookup_job(id).ok_or(QueueError::UnknownJob(id))?;
        if job.job_state.is_terminal() {
            return Err(QueueError::InvalidJobState(job.job_state));
        }

        // Still waiting for submission: cancel locally.
        {
            let mut state = self.inner.state.lock();
            if let Some(pos) = state
                .pending_submission
                .iter()
                .position(|pending| *pending == id)
            {
                state.pending_submission.remove(pos);
                drop(state);
                self.inner.jobs.lock().set_job_state(id, JobState::Canceled);
                return Ok(());
            }
        }

        if !job.queue_id.is_valid() {
            // Mid-submission; the terminal state blocks later transitions.
            self.inner.jobs.lock().set_job_state(id, JobState::Canceled);
            return Ok(());
        }

        let command = format!(
            "{} {}",
            self.inner.config.kill_command,
            job.queue_id.value()
        );
        match self.inner.ssh.execute(&command).await {
            Ok(outcome) if outcome.success() => {
                self.inner.state.lock().tracked.remove(&job.queue_id);
                self.inner.jobs.lock().set_job_state(id, JobState::Canceled);
                Ok(())
            }
            Ok(outcome) => {
                warn!(
                    mole_queue_id = %id,
                    queue_id = %job.queue_id,
                    "{}",
                    describe_failure("error cancelling job", &outcome)
                );
                Ok(())
            }
            Err(e) => {
                warn!(mole_queue_id = %id, "error cancelling job: {e}");
                Ok(())
            }
        }
    }

    async fn handle_timer(&self, kind: TimerKind) {
        match kind {
            TimerKind::SubmitTick => self.submit_pending_jobs().await,
            TimerKind::PollTick => self.request_queue_update().await,
            TimerKind::LocalTick => {}
        }
    }
}

#[cfg(test)]
#[path = "remote_tests.rs"]
mod tests;
