// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! PBS/Torque scheduler adapter.

use mq_core::{IdType, JobState, QueueId, QueueKind};
use tracing::warn;

use super::{leading_digits, SchedulerAdapter};

/// Adapter for PBS and Torque schedulers.
#[derive(Debug, Default, Clone, Copy)]
pub struct PbsAdapter;

// qstat exits 153 when the job has completed; 35 is the ezHPC variant.
const ALLOWED_EXIT_CODES: &[i32] = &[153, 35];

const LAUNCH_TEMPLATE: &str = "#!/bin/sh\n\
#\n\
#These commands set up the Grid Environment for your job:\n\
##PBS -N JobDescription\n\
##PBS -l procs=$$numberOfCores$$\n\
##PBS -l walltime=$$maxWallTime$$\n\
#PBS -q target_queue\n\
\n\
cd $$remoteWorkingDir$$\n\
$$programExecution$$\n";

impl SchedulerAdapter for PbsAdapter {
    fn kind(&self) -> QueueKind {
        QueueKind::Pbs
    }

    fn default_launch_template(&self) -> &'static str {
        LAUNCH_TEMPLATE
    }

    fn default_launch_script_name(&self) -> &'static str {
        "job.pbs"
    }

    /// The leading integer of the submission output, before the first
    /// `.` of the `<jobid>.<hostname>` form.
    fn parse_queue_id(&self, submission_output: &str) -> Option<IdType> {
        leading_digits(submission_output.trim_start())
    }

    /// One `qstat` row: `jobId name user time state queue`.
    fn parse_queue_line(&self, line: &str) -> Option<(IdType, JobState)> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < 5 {
            return None;
        }
        let queue_id = leading_digits(tokens[0])?;

        match tokens[4].to_lowercase().as_str() {
            "r" | "e" | "c" => Some((queue_id, JobState::RunningRemote)),
            "q" | "h" | "t" | "w" | "s" => Some((queue_id, JobState::RemoteQueued)),
            other => {
                warn!(state = other, line, "unrecognized pbs queue state");
                None
            }
        }
    }

    /// PBS polls with the list of known queue ids.
    fn queue_request_command(&self, base: &str, _user: &str, ids: &[QueueId]) -> String {
        let id_list: Vec<String> = ids.iter().map(|id| id.value().to_string()).collect();
        format!("{} {}", base, id_list.join(" "))
    }

    fn allowed_request_exit_codes(&self) -> &[i32] {
        ALLOWED_EXIT_CODES
    }
}

#[cfg(test)]
#[path = "pbs_tests.rs"]
mod tests;
