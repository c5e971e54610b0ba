// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sun Grid Engine scheduler adapter.

use mq_core::{IdType, JobState, QueueId, QueueKind};
use tracing::warn;

use super::{leading_digits, SchedulerAdapter};

/// Adapter for Sun Grid Engine schedulers.
#[derive(Debug, Default, Clone, Copy)]
pub struct SgeAdapter;

const LAUNCH_TEMPLATE: &str = "#!/bin/sh\n\
#\n\
# Use BASH as job shell:\n\
#$ -S /bin/bash\n\
#$ -pe smp $$numberOfCores$$\n\
\n\
cd $$remoteWorkingDir$$\n\
$$programExecution$$\n";

impl SchedulerAdapter for SgeAdapter {
    fn kind(&self) -> QueueKind {
        QueueKind::Sge
    }

    fn default_launch_template(&self) -> &'static str {
        LAUNCH_TEMPLATE
    }

    fn default_launch_script_name(&self) -> &'static str {
        "job.sge"
    }

    /// Matches `your job <jobID> ('batchFileName') has been submitted`.
    fn parse_queue_id(&self, submission_output: &str) -> Option<IdType> {
        let trimmed = submission_output.trim_start();
        let rest = trimmed
            .strip_prefix("your job ")
            .or_else(|| trimmed.strip_prefix("Your job "))?;
        leading_digits(rest)
    }

    /// One `qstat` row: `jobId prior name user state submit/start ...`.
    fn parse_queue_line(&self, line: &str) -> Option<(IdType, JobState)> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < 5 {
            return None;
        }
        if !tokens[0].bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let queue_id = leading_digits(tokens[0])?;

        match tokens[4].to_lowercase().as_str() {
            // Deleting/errored jobs stay "running" until they leave the list.
            "r" | "d" | "e" => Some((queue_id, JobState::RunningRemote)),
            "qw" | "q" | "w" | "s" | "h" | "t" => Some((queue_id, JobState::RemoteQueued)),
            other => {
                warn!(state = other, line, "unrecognized sge queue state");
                None
            }
        }
    }

    /// Polling by job id does not work on SGE; poll by user instead.
    fn queue_request_command(&self, base: &str, user: &str, _ids: &[QueueId]) -> String {
        format!("{base} -u {user}")
    }

    fn allowed_request_exit_codes(&self) -> &[i32] {
        &[]
    }
}

#[cfg(test)]
#[path = "sge_tests.rs"]
mod tests;
