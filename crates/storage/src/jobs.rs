// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The job manager: authoritative owner of all job metadata.
//!
//! Ids are assigned densely starting at 1 and never reused within a
//! process lifetime. State changes go through [`JobManager::set_job_state`],
//! which consults the transition table and silently drops anything the
//! state machine forbids (with a warning in the trace log). Every accepted
//! mutation updates the job's sidecar file and fans a [`JobSignal`] out to
//! subscribers in mutation order.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use mq_core::state::transition_allowed;
use mq_core::{IdType, JobData, JobSignal, JobState, MoleQueueId, QueueId};

/// Sidecar filename written into each job's local working directory.
pub const JOB_INFO_FILENAME: &str = "mqjobinfo.json";

/// Owns every [`JobData`] and hands out ids.
pub struct JobManager {
    jobs: HashMap<MoleQueueId, JobData>,
    /// Insertion order, for stable persistence and listings.
    order: Vec<MoleQueueId>,
    next_id: IdType,
    subscribers: Vec<mpsc::UnboundedSender<JobSignal>>,
}

impl Default for JobManager {
    fn default() -> Self {
        Self::new()
    }
}

impl JobManager {
    pub fn new() -> Self {
        Self {
            jobs: HashMap::new(),
            order: Vec::new(),
            next_id: 1,
            subscribers: Vec::new(),
        }
    }

    /// Register a signal subscriber. Dropped receivers are pruned on the
    /// next emit.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<JobSignal> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    fn emit(&mut self, signal: JobSignal) {
        self.subscribers.retain(|tx| tx.send(signal.clone()).is_ok());
    }

    /// Create an empty job and insert it.
    pub fn new_job(&mut self) -> MoleQueueId {
        self.insert(JobData::new())
    }

    /// Create a job initialized from a wire hash. Any `moleQueueId` in the
    /// hash is ignored and overwritten.
    pub fn new_job_from_wire(&mut self, hash: &Value) -> MoleQueueId {
        self.insert(JobData::from_wire(hash))
    }

    fn insert(&mut self, mut job: JobData) -> MoleQueueId {
        let id = MoleQueueId::new(self.next_id);
        self.next_id += 1;
        job.mole_queue_id = id;

        self.emit(JobSignal::AboutToBeAdded { id });
        self.jobs.insert(id, job);
        self.order.push(id);
        self.emit(JobSignal::Added { id });
        id
    }

    /// Remove a job. Removing a job in an active state is an implicit
    /// cancel-and-forget.
    pub fn remove_job(&mut self, id: MoleQueueId) -> bool {
        if !self.jobs.contains_key(&id) {
            return false;
        }
        self.emit(JobSignal::AboutToBeRemoved { id });
        self.jobs.remove(&id);
        self.order.retain(|existing| *existing != id);
        self.emit(JobSignal::Removed { id });
        true
    }

    pub fn remove_jobs(&mut self, ids: &[MoleQueueId]) {
        for id in ids {
            self.remove_job(*id);
        }
    }

    /// Resolve a job by id. Callers mutate only through manager methods.
    pub fn lookup_job(&self, id: MoleQueueId) -> Option<&JobData> {
        self.jobs.get(&id)
    }

    /// Linear scan for jobs in a given state.
    pub fn jobs_with_state(&self, state: JobState) -> Vec<MoleQueueId> {
        self.order
            .iter()
            .filter(|id| {
                self.jobs
                    .get(id)
                    .is_some_and(|job| job.job_state == state)
            })
            .copied()
            .collect()
    }

    /// Validated state transition. Returns true when the transition was
    /// applied; forbidden transitions are dropped with a warning.
    pub fn set_job_state(&mut self, id: MoleQueueId, new_state: JobState) -> bool {
        let Some(job) = self.jobs.get_mut(&id) else {
            warn!(mole_queue_id = %id, "state change for unknown job");
            return false;
        };
        let old_state = job.job_state;
        if old_state == new_state {
            return false;
        }
        if !transition_allowed(old_state, new_state) {
            warn!(
                mole_queue_id = %id,
                from = %old_state,
                to = %new_state,
                "rejecting forbidden job state transition"
            );
            return false;
        }

        job.job_state = new_state;
        let snapshot = job.clone();
        self.write_sidecar(&snapshot);
        self.emit(JobSignal::StateChanged {
            id,
            old: old_state,
            new: new_state,
        });
        self.emit(JobSignal::Updated { id });
        true
    }

    /// Record the scheduler-assigned id for a job.
    pub fn set_job_queue_id(&mut self, id: MoleQueueId, queue_id: QueueId) -> bool {
        let Some(job) = self.jobs.get_mut(&id) else {
            return false;
        };
        if job.queue_id == queue_id {
            return false;
        }
        job.queue_id = queue_id;
        let snapshot = job.clone();
        self.write_sidecar(&snapshot);
        self.emit(JobSignal::QueueIdChanged { id, queue_id });
        self.emit(JobSignal::Updated { id });
        true
    }

    /// Assign the local working directory. Once set non-empty it is
    /// immutable for the rest of the job's life.
    pub fn set_local_working_directory(&mut self, id: MoleQueueId, dir: &str) -> bool {
        let Some(job) = self.jobs.get_mut(&id) else {
            return false;
        };
        if !job.local_working_directory.is_empty() {
            warn!(
                mole_queue_id = %id,
                "refusing to reassign local working directory"
            );
            return false;
        }
        job.local_working_directory = dir.to_string();
        let snapshot = job.clone();
        self.write_sidecar(&snapshot);
        self.emit(JobSignal::Updated { id });
        true
    }

    /// Jobs in insertion order, for persistence.
    pub fn snapshot(&self) -> Vec<JobData> {
        self.order
            .iter()
            .filter_map(|id| self.jobs.get(id).cloned())
            .collect()
    }

    /// Restore a persisted job set, keeping stored ids and advancing the
    /// id counter past them.
    pub fn restore(&mut self, jobs: Vec<JobData>) {
        for job in jobs {
            let id = job.mole_queue_id;
            if !id.is_valid() || self.jobs.contains_key(&id) {
                warn!(mole_queue_id = %id, "skipping unrestorable job");
                continue;
            }
            self.emit(JobSignal::AboutToBeAdded { id });
            self.next_id = self.next_id.max(id.value() + 1);
            self.jobs.insert(id, job);
            self.order.push(id);
            self.emit(JobSignal::Added { id });
        }
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Update the sidecar file if the job's working directory exists.
    /// Failures are logged and never block in-memory progress.
    fn write_sidecar(&self, job: &JobData) {
        if job.local_working_directory.is_empty() {
            return;
        }
        let dir = Path::new(&job.local_working_directory);
        if !dir.is_dir() {
            return;
        }
        let path = dir.join(JOB_INFO_FILENAME);
        let pretty = match serde_json::to_string_pretty(&job.to_wire()) {
            Ok(pretty) => pretty,
            Err(e) => {
                warn!(mole_queue_id = %job.mole_queue_id, error = %e, "cannot serialize sidecar");
                return;
            }
        };
        if let Err(e) = fs::write(&path, pretty) {
            warn!(
                mole_queue_id = %job.mole_queue_id,
                path = %path.display(),
                error = %e,
                "failed to write job sidecar"
            );
        } else {
            debug!(mole_queue_id = %job.mole_queue_id, "sidecar updated");
        }
    }
}

#[cfg(test)]
#[path = "jobs_tests.rs"]
mod tests;
