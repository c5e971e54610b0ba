// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON-RPC 2.0 for the broker protocol.
//!
//! The codec distinguishes the four packet forms (request, notification,
//! result response, error response), validates them against the JSON-RPC
//! spec, and offers typed parsing for the broker's methods. Outbound
//! request ids come from a process-wide counter seeded from a random
//! value; replies are matched to requests through a pending table, and
//! replies whose id is unknown are ignored silently.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use serde_json::{json, Map, Value};

use mq_core::{JobState, MoleQueueId};

#[path = "rpc_message.rs"]
pub mod message;
#[path = "rpc_wire.rs"]
pub mod wire;

pub use message::{Packet, RpcError, Strictness};
pub use wire::{read_packet, write_packet, ProtocolError, PROTOCOL_VERSION};

// Broker error codes (§ external interface).
pub const ERROR_INVALID_QUEUE: i64 = 1;
pub const ERROR_INVALID_PROGRAM: i64 = 2;
pub const ERROR_INVALID_MOLE_QUEUE_ID: i64 = 3;
pub const ERROR_INVALID_JOB_STATE: i64 = 4;

/// Logical method of an outstanding request, kept in the pending table
/// so a reply can be routed without re-parsing its request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodTag {
    ListQueues,
    SubmitJob,
    CancelJob,
    LookupJob,
}

impl MethodTag {
    pub fn as_str(self) -> &'static str {
        match self {
            MethodTag::ListQueues => "listQueues",
            MethodTag::SubmitJob => "submitJob",
            MethodTag::CancelJob => "cancelJob",
            MethodTag::LookupJob => "lookupJob",
        }
    }

    pub fn parse(method: &str) -> Option<Self> {
        match method {
            "listQueues" => Some(MethodTag::ListQueues),
            "submitJob" => Some(MethodTag::SubmitJob),
            "cancelJob" => Some(MethodTag::CancelJob),
            "lookupJob" => Some(MethodTag::LookupJob),
            _ => None,
        }
    }
}

/// Method name of the broker's only server→client notification.
pub const JOB_STATE_CHANGED: &str = "jobStateChanged";

/// A parsed client→server request.
#[derive(Debug, Clone, PartialEq)]
pub enum MethodCall {
    ListQueues,
    /// The raw job hash; the server builds the JobData.
    SubmitJob(Value),
    CancelJob { mole_queue_id: MoleQueueId },
    LookupJob { mole_queue_id: MoleQueueId },
}

/// Parse a request's method and params into a typed call.
pub fn parse_method_call(method: &str, params: Option<&Value>) -> Result<MethodCall, RpcError> {
    let tag = MethodTag::parse(method).ok_or_else(RpcError::method_not_found)?;

    match tag {
        MethodTag::ListQueues => Ok(MethodCall::ListQueues),
        MethodTag::SubmitJob => {
            let params = params.ok_or_else(|| {
                RpcError::invalid_params("submitJob requires a job object")
            })?;
            if !params.is_object() {
                return Err(RpcError::invalid_params("submitJob params must be an object"));
            }
            Ok(MethodCall::SubmitJob(params.clone()))
        }
        MethodTag::CancelJob => Ok(MethodCall::CancelJob {
            mole_queue_id: extract_mole_queue_id(params)?,
        }),
        MethodTag::LookupJob => Ok(MethodCall::LookupJob {
            mole_queue_id: extract_mole_queue_id(params)?,
        }),
    }
}

fn extract_mole_queue_id(params: Option<&Value>) -> Result<MoleQueueId, RpcError> {
    let id = params
        .and_then(|p| p.get("moleQueueId"))
        .and_then(Value::as_u64)
        .ok_or_else(|| RpcError::invalid_params("params require a numeric moleQueueId"))?;
    Ok(MoleQueueId::new(id))
}

/// `listQueues` result: queue name → ordered program names.
pub fn queue_list_result(list: &IndexMap<String, Vec<String>>) -> Value {
    let mut object = Map::new();
    for (queue, programs) in list {
        object.insert(queue.clone(), json!(programs));
    }
    Value::Object(object)
}

/// `submitJob` success result.
pub fn submission_result(id: MoleQueueId, working_directory: &str) -> Value {
    json!({
        "moleQueueId": id.value(),
        "workingDirectory": working_directory,
    })
}

/// `cancelJob` success result: the canceled job's id.
pub fn cancellation_result(id: MoleQueueId) -> Value {
    json!(id.value())
}

/// `jobStateChanged` notification packet.
pub fn job_state_notification(id: MoleQueueId, old: JobState, new: JobState) -> Value {
    message::notification(
        JOB_STATE_CHANGED,
        Some(json!({
            "moleQueueId": id.value(),
            "oldState": old.as_str(),
            "newState": new.as_str(),
        })),
    )
}

/// Source of outbound correlation ids.
///
/// A 64-bit counter seeded from a random value; wrap-around is harmless
/// because the pending table bounds collisions in practice.
#[derive(Debug)]
pub struct MessageIdSource {
    next: AtomicU64,
}

impl Default for MessageIdSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageIdSource {
    pub fn new() -> Self {
        let (seed, _) = uuid::Uuid::new_v4().as_u64_pair();
        Self {
            next: AtomicU64::new(seed),
        }
    }

    pub fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

/// Table of outstanding requests awaiting replies.
#[derive(Debug, Default)]
pub struct PendingRequests {
    pending: HashMap<u64, MethodTag>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: u64, tag: MethodTag) {
        self.pending.insert(id, tag);
    }

    /// Consume the entry for a reply id. A reply whose id is unknown is
    /// not for this peer; callers ignore it silently when this returns
    /// `None`.
    pub fn take(&mut self, id: &Value) -> Option<MethodTag> {
        let id = id.as_u64()?;
        self.pending.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
#[path = "rpc_tests.rs"]
mod tests;
