// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The queue abstraction and shared staging helpers.
//!
//! A queue owns its programs, stages a job's input files into the job's
//! local working directory, and drives the job to a terminal state.
//! Concrete strategies are [`crate::QueueLocal`] and
//! [`crate::QueueRemoteSsh`].

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

use mq_core::program::render_launch_script;
use mq_core::{JobData, JobState, MoleQueueId, Program, QueueConfig, QueueKind};

/// Driver script name for local jobs with `Custom` launch syntax.
pub const LOCAL_DRIVER_SCRIPT: &str = "MoleQueueLauncher.sh";

/// Errors from queue operations.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("unknown program '{0}'")]
    UnknownProgram(String),

    #[error("unknown job {0}")]
    UnknownJob(MoleQueueId),

    #[error("job is in state {0}, which does not allow this operation")]
    InvalidJobState(JobState),

    #[error("working directory '{0}' already exists and is not empty")]
    WorkingDirectoryNotEmpty(PathBuf),

    #[error("job has no local working directory")]
    NoWorkingDirectory,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("file staging failed: {0}")]
    Staging(#[from] mq_core::filespec::FileSpecError),
}

/// Periodic work dispatched to a queue by the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Local queue: start pending jobs while below the parallelism cap.
    LocalTick,
    /// Remote queue: begin submission for jobs waiting in the pending list.
    SubmitTick,
    /// Remote queue: poll the scheduler for status updates.
    PollTick,
}

/// A job execution strategy.
#[async_trait]
pub trait Queue: Send + Sync {
    fn name(&self) -> &str;

    fn kind(&self) -> QueueKind;

    /// Configuration snapshot for persistence.
    fn config(&self) -> QueueConfig;

    /// Program names in configuration order.
    fn program_names(&self) -> Vec<String>;

    fn lookup_program(&self, name: &str) -> Option<Program>;

    fn has_program(&self, name: &str) -> bool {
        self.lookup_program(name).is_some()
    }

    /// Accept a job for execution. The job must already carry its local
    /// working directory. Validation failures are returned; later
    /// per-job failures surface as `Error` state transitions.
    async fn submit(&self, id: MoleQueueId) -> Result<(), QueueError>;

    /// Request termination of a job owned by this queue. The returned
    /// future resolves when the kill request itself has completed; the
    /// `Canceled` transition may follow asynchronously.
    async fn kill(&self, id: MoleQueueId) -> Result<(), QueueError>;

    /// Handle a periodic tick.
    async fn handle_timer(&self, kind: TimerKind);
}

/// The keyword set every queue defines for launch templates.
///
/// `remoteWorkingDir` is present only for remote queues.
pub fn queue_keywords(
    job: &JobData,
    program: &Program,
    config: &QueueConfig,
) -> HashMap<String, String> {
    let input_name = program.effective_input_filename(job);
    let base_name = match input_name.rfind('.') {
        Some(dot) if dot > 0 => input_name[..dot].to_string(),
        _ => input_name.clone(),
    };
    let output_name = program
        .output_filename
        .replace("$$inputFileBaseName$$", &base_name);

    let mut keywords = HashMap::new();
    keywords.insert(
        "moleQueueId".to_string(),
        job.mole_queue_id.value().to_string(),
    );
    keywords.insert(
        "numberOfCores".to_string(),
        job.number_of_cores.to_string(),
    );
    keywords.insert(
        "maxWallTime".to_string(),
        job.wall_time_or(config.default_max_wall_time).to_string(),
    );
    keywords.insert("inputFileName".to_string(), input_name);
    keywords.insert("inputFileBaseName".to_string(), base_name);
    keywords.insert("outputFileName".to_string(), output_name);
    if config.kind.is_remote() {
        keywords.insert(
            "remoteWorkingDir".to_string(),
            format!(
                "{}/{}",
                config.working_directory_base,
                job.mole_queue_id.value()
            ),
        );
    }
    keywords
}

/// Render the launch script for a job on this queue.
pub fn launch_script(job: &JobData, program: &Program, config: &QueueConfig) -> String {
    let keywords = queue_keywords(job, program, config);
    render_launch_script(&config.launch_template, program, job, &keywords)
}

/// Create the job's working directory and write its input files.
///
/// The directory may already exist if empty; an existing non-empty
/// directory fails the job rather than clobbering another job's files.
pub fn stage_input_files(job: &JobData, program: &Program) -> Result<PathBuf, QueueError> {
    if job.local_working_directory.is_empty() {
        return Err(QueueError::NoWorkingDirectory);
    }
    let dir = job.local_working_directory_path();

    if dir.exists() {
        if fs::read_dir(&dir)?.next().is_some() {
            return Err(QueueError::WorkingDirectoryNotEmpty(dir));
        }
    } else {
        fs::create_dir_all(&dir)?;
    }

    if job.input_file.is_valid() {
        let name = program.effective_input_filename(job);
        job.input_file.write_file(&dir, Some(&name))?;
    }
    for extra in &job.additional_input_files {
        extra.write_file(&dir, None)?;
    }

    Ok(dir)
}

/// Write an executable shell script into the job's working directory.
pub fn write_script(dir: &Path, name: &str, contents: &str) -> Result<PathBuf, QueueError> {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    fs::write(&path, contents)?;
    let mut perms = fs::metadata(&path)?.permissions();
    perms.set_mode(perms.mode() | 0o755);
    fs::set_permissions(&path, perms)?;
    Ok(path)
}

/// Recursively copy a directory tree.
pub fn copy_dir_recursive(from: &Path, to: &Path) -> Result<(), QueueError> {
    fs::create_dir_all(to)?;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_recursive(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
