// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SSH/SCP invocations over the process-runner seam.
//!
//! Each call is one short-lived `ssh` or `scp` child process; the broker
//! never keeps a persistent connection. Commands run to completion and
//! return the captured outcome, so queue pipelines see exit codes and
//! scheduler output directly.

use std::path::Path;
use std::sync::Arc;

use crate::process::{ProcessError, ProcessOutcome, ProcessRunner, RunSpec};

/// Connection parameters for one remote host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshConfig {
    pub host_name: String,
    pub user_name: String,
    pub ssh_port: u16,
    /// Path to an identity file, empty for the ssh default.
    pub identity_file: String,
    pub ssh_executable: String,
    pub scp_executable: String,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            host_name: String::new(),
            user_name: String::new(),
            ssh_port: 22,
            identity_file: String::new(),
            ssh_executable: "ssh".to_string(),
            scp_executable: "scp".to_string(),
        }
    }
}

impl SshConfig {
    /// `user@host`, or just `host` when no user is configured.
    fn remote_host(&self) -> String {
        if self.user_name.is_empty() {
            self.host_name.clone()
        } else {
            format!("{}@{}", self.user_name, self.host_name)
        }
    }

    /// `user@host:path` form for scp endpoints.
    fn remote_path(&self, path: &str) -> String {
        format!("{}:{}", self.remote_host(), path)
    }
}

/// Executes remote commands and directory copies for one host.
#[derive(Clone)]
pub struct SshClient {
    runner: Arc<dyn ProcessRunner>,
    config: SshConfig,
}

impl SshClient {
    pub fn new(runner: Arc<dyn ProcessRunner>, config: SshConfig) -> Self {
        Self { runner, config }
    }

    pub fn config(&self) -> &SshConfig {
        &self.config
    }

    /// Run `command` on the remote host and wait for it to finish.
    pub async fn execute(&self, command: &str) -> Result<ProcessOutcome, ProcessError> {
        let mut spec = RunSpec::new(&self.config.ssh_executable).arg("-q");
        if !self.config.identity_file.is_empty() {
            spec = spec.arg("-i").arg(&self.config.identity_file);
        }
        if self.config.ssh_port != 22 {
            spec = spec.arg("-p").arg(self.config.ssh_port.to_string());
        }
        spec = spec.arg(self.config.remote_host()).arg(command);

        self.runner.run(spec).await?.wait().await
    }

    /// Recursively copy a local directory to the remote host.
    pub async fn copy_dir_to(
        &self,
        local: &Path,
        remote: &str,
    ) -> Result<ProcessOutcome, ProcessError> {
        let spec = self
            .scp_spec()
            .arg(local.to_string_lossy().into_owned())
            .arg(self.config.remote_path(remote));
        self.runner.run(spec).await?.wait().await
    }

    /// Recursively copy a remote directory into a local directory.
    pub async fn copy_dir_from(
        &self,
        remote: &str,
        local: &Path,
    ) -> Result<ProcessOutcome, ProcessError> {
        let spec = self
            .scp_spec()
            .arg(self.config.remote_path(remote))
            .arg(local.to_string_lossy().into_owned());
        self.runner.run(spec).await?.wait().await
    }

    fn scp_spec(&self) -> RunSpec {
        let mut spec = RunSpec::new(&self.config.scp_executable)
            .arg("-q")
            .arg("-r");
        if !self.config.identity_file.is_empty() {
            spec = spec.arg("-i").arg(&self.config.identity_file);
        }
        if self.config.ssh_port != 22 {
            spec = spec.arg("-P").arg(self.config.ssh_port.to_string());
        }
        spec
    }
}

#[cfg(test)]
#[path = "ssh_tests.rs"]
mod tests;
