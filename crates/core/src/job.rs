// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job metadata.
//!
//! `JobData` is the full record for one job, owned exclusively by the job
//! manager. Everything else refers to jobs by [`MoleQueueId`] and resolves
//! through the manager at each use. The serde form is the flat wire hash
//! exchanged over RPC and written to the per-job sidecar file.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::filespec::FileSpecification;
use crate::id::{MoleQueueId, QueueId};
use crate::state::JobState;

fn default_true() -> bool {
    true
}

fn default_cores() -> i32 {
    1
}

fn default_wall_time() -> i32 {
    -1
}

/// All metadata for one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JobData {
    /// Name of the target queue.
    pub queue: String,
    /// Name of the program within that queue.
    pub program: String,
    pub job_state: JobState,
    /// Human-readable title, shown in GUIs.
    pub description: String,
    pub input_file: FileSpecification,
    /// Staged alongside the primary input, in order.
    pub additional_input_files: Vec<FileSpecification>,
    /// If non-empty and different from the local working directory,
    /// outputs are mirrored here on completion.
    pub output_directory: String,
    /// Where the broker stages files locally. Assigned by the server
    /// before queue submission and immutable afterwards.
    pub local_working_directory: String,
    pub clean_remote_files: bool,
    #[serde(default = "default_true")]
    pub retrieve_output: bool,
    pub clean_local_working_directory: bool,
    /// Presentation hint; propagated but not interpreted by the broker.
    pub hide_from_gui: bool,
    /// Presentation hint; propagated but not interpreted by the broker.
    pub popup_on_state_change: bool,
    #[serde(default = "default_cores")]
    pub number_of_cores: i32,
    /// Requested wall time in minutes; zero or negative means "use the
    /// queue default".
    #[serde(default = "default_wall_time")]
    pub max_wall_time: i32,
    pub mole_queue_id: MoleQueueId,
    pub queue_id: QueueId,
    /// Free substitution variables for launch templates.
    pub keywords: HashMap<String, String>,
}

impl Default for JobData {
    fn default() -> Self {
        Self {
            queue: String::new(),
            program: String::new(),
            job_state: JobState::None,
            description: String::new(),
            input_file: FileSpecification::Invalid,
            additional_input_files: Vec::new(),
            output_directory: String::new(),
            local_working_directory: String::new(),
            clean_remote_files: false,
            retrieve_output: true,
            clean_local_working_directory: false,
            hide_from_gui: false,
            popup_on_state_change: false,
            number_of_cores: 1,
            max_wall_time: -1,
            mole_queue_id: MoleQueueId::INVALID,
            queue_id: QueueId::INVALID,
            keywords: HashMap::new(),
        }
    }
}

impl JobData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a wire hash. Unknown fields are ignored; a
    /// `moleQueueId` in the hash is discarded (the manager assigns it).
    pub fn from_wire(value: &Value) -> Self {
        let mut job: JobData =
            serde_json::from_value(value.clone()).unwrap_or_default();
        job.mole_queue_id = MoleQueueId::INVALID;
        job
    }

    /// The flat wire hash of this job.
    pub fn to_wire(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn local_working_directory_path(&self) -> PathBuf {
        PathBuf::from(&self.local_working_directory)
    }

    /// Effective wall-time request given a queue default.
    pub fn wall_time_or(&self, queue_default: i32) -> i32 {
        if self.max_wall_time > 0 {
            self.max_wall_time
        } else {
            queue_default
        }
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
