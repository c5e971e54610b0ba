// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job state machine.
//!
//! States advance only along the edges encoded in [`transition_allowed`];
//! the job manager consults it on every mutation and drops anything else.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobState {
    /// State could not be determined (e.g. unrecognized string on the wire).
    Unknown,
    /// Fresh job, not yet accepted by the broker.
    None,
    /// Accepted by the broker; input files are being staged.
    Accepted,
    /// Waiting in the local process pool's FIFO.
    LocalQueued,
    /// Handed to a remote scheduler.
    Submitted,
    /// Pending execution on the remote scheduler.
    RemoteQueued,
    /// Running as a local child process.
    RunningLocal,
    /// Running on the remote host.
    RunningRemote,
    /// Completed successfully.
    Finished,
    /// Terminated at a user's request.
    Canceled,
    /// Terminated by a failure.
    Error,
}

impl JobState {
    /// Terminal states admit no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Finished | JobState::Canceled | JobState::Error
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Unknown => "Unknown",
            JobState::None => "None",
            JobState::Accepted => "Accepted",
            JobState::LocalQueued => "LocalQueued",
            JobState::Submitted => "Submitted",
            JobState::RemoteQueued => "RemoteQueued",
            JobState::RunningLocal => "RunningLocal",
            JobState::RunningRemote => "RunningRemote",
            JobState::Finished => "Finished",
            JobState::Canceled => "Canceled",
            JobState::Error => "Error",
        }
    }

    /// Parse the wire string form. Unrecognized input maps to `Unknown`.
    pub fn parse(s: &str) -> Self {
        match s {
            "None" => JobState::None,
            "Accepted" => JobState::Accepted,
            "LocalQueued" => JobState::LocalQueued,
            "Submitted" => JobState::Submitted,
            "RemoteQueued" => JobState::RemoteQueued,
            "RunningLocal" => JobState::RunningLocal,
            "RunningRemote" => JobState::RunningRemote,
            "Finished" => JobState::Finished,
            "Canceled" => JobState::Canceled,
            "Error" => JobState::Error,
            _ => JobState::Unknown,
        }
    }
}

impl Default for JobState {
    fn default() -> Self {
        JobState::None
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a transition between two states is legal.
///
/// The terminal states `Canceled` and `Error` are reachable from any
/// non-terminal state; everything else follows the submission pipeline.
pub fn transition_allowed(from: JobState, to: JobState) -> bool {
    use JobState::*;

    if from == to {
        return false;
    }
    if from.is_terminal() {
        return false;
    }
    // Terminal escape hatches from any live state.
    if matches!(to, Canceled | Error) {
        return true;
    }

    matches!(
        (from, to),
        (None, Accepted)
            | (Accepted, LocalQueued)
            | (Accepted, Submitted)
            | (LocalQueued, RunningLocal)
            | (Submitted, RemoteQueued)
            | (RemoteQueued, RunningRemote)
            | (RunningLocal, Finished)
            | (RunningRemote, Finished)
    )
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
