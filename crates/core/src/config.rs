// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persisted queue configuration.
//!
//! These shapes are what the settings file stores under the `"Queues"`
//! key and what queue-export files contain. The engine instantiates live
//! queues from them; storage reads and writes them.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::program::Program;

/// Queue strategy selector, persisted as the user-visible type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueueKind {
    #[serde(rename = "Local")]
    Local,
    #[serde(rename = "PBS/Torque")]
    Pbs,
    #[serde(rename = "Sun Grid Engine")]
    Sge,
}

impl QueueKind {
    pub fn as_str(self) -> &'static str {
        match self {
            QueueKind::Local => "Local",
            QueueKind::Pbs => "PBS/Torque",
            QueueKind::Sge => "Sun Grid Engine",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Local" => Some(QueueKind::Local),
            "PBS/Torque" => Some(QueueKind::Pbs),
            "Sun Grid Engine" => Some(QueueKind::Sge),
            _ => None,
        }
    }

    pub fn is_remote(self) -> bool {
        !matches!(self, QueueKind::Local)
    }
}

impl std::fmt::Display for QueueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_ssh_port() -> u16 {
    22
}

fn default_ssh_executable() -> String {
    "ssh".to_string()
}

fn default_scp_executable() -> String {
    "scp".to_string()
}

fn default_submission_command() -> String {
    "qsub".to_string()
}

fn default_kill_command() -> String {
    "qdel".to_string()
}

fn default_request_queue_command() -> String {
    "qstat".to_string()
}

fn default_launch_script_name() -> String {
    "job.pbs".to_string()
}

fn default_queue_update_interval() -> u64 {
    3
}

fn default_max_wall_time() -> i32 {
    1440
}

/// Full configuration for one queue, local or remote.
///
/// Local queues use only `kind`, `cores`, `launch_template`, and
/// `programs`; the SSH fields are meaningful for the remote kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    #[serde(rename = "type")]
    pub kind: QueueKind,

    #[serde(rename = "submissionCommand", default = "default_submission_command")]
    pub submission_command: String,
    #[serde(rename = "killCommand", default = "default_kill_command")]
    pub kill_command: String,
    #[serde(
        rename = "requestQueueCommand",
        default = "default_request_queue_command"
    )]
    pub request_queue_command: String,
    #[serde(rename = "workingDirectoryBase")]
    pub working_directory_base: String,
    #[serde(rename = "hostName")]
    pub host_name: String,
    #[serde(rename = "userName")]
    pub user_name: String,
    #[serde(rename = "sshPort", default = "default_ssh_port")]
    pub ssh_port: u16,
    #[serde(rename = "identityFile")]
    pub identity_file: String,
    #[serde(rename = "sshExecutable", default = "default_ssh_executable")]
    pub ssh_executable: String,
    #[serde(rename = "scpExecutable", default = "default_scp_executable")]
    pub scp_executable: String,
    #[serde(rename = "launchTemplate")]
    pub launch_template: String,
    #[serde(rename = "launchScriptName", default = "default_launch_script_name")]
    pub launch_script_name: String,
    /// Minutes between remote queue-status polls.
    #[serde(
        rename = "queueUpdateInterval",
        default = "default_queue_update_interval"
    )]
    pub queue_update_interval: u64,
    /// Minutes granted to jobs that do not request a wall time.
    #[serde(rename = "defaultMaxWallTime", default = "default_max_wall_time")]
    pub default_max_wall_time: i32,
    /// Parallelism cap for the local queue. Zero means "auto": all
    /// logical cores, capped at 8.
    pub cores: u32,

    #[serde(rename = "Programs")]
    pub programs: IndexMap<String, Program>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            kind: QueueKind::Local,
            submission_command: default_submission_command(),
            kill_command: default_kill_command(),
            request_queue_command: default_request_queue_command(),
            working_directory_base: String::new(),
            host_name: String::new(),
            user_name: String::new(),
            ssh_port: default_ssh_port(),
            identity_file: String::new(),
            ssh_executable: default_ssh_executable(),
            scp_executable: default_scp_executable(),
            launch_template: "$$programExecution$$\n".to_string(),
            launch_script_name: default_launch_script_name(),
            queue_update_interval: default_queue_update_interval(),
            default_max_wall_time: default_max_wall_time(),
            cores: 0,
            programs: IndexMap::new(),
        }
    }
}

impl QueueConfig {
    pub fn new(kind: QueueKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    /// A copy suitable for exported configuration: sensitive fields are
    /// blanked so shared queue definitions carry no credentials.
    pub fn export_sanitized(&self) -> Self {
        let mut config = self.clone();
        config.user_name = String::new();
        config.identity_file = String::new();
        config.ssh_executable = default_ssh_executable();
        config.scp_executable = default_scp_executable();
        config
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
