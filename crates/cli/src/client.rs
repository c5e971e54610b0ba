// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The broker client: typed JSON-RPC calls over the framed socket.
//!
//! Requests carry correlation ids from the shared id source and are
//! matched to replies through a pending table; `jobStateChanged`
//! notifications arriving between replies are buffered so callers can
//! consume them as a stream.

use std::collections::VecDeque;
use std::path::Path;

use indexmap::IndexMap;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::net::UnixStream;

use mq_core::{JobData, JobState, MoleQueueId};
use mq_daemon::rpc::{
    self, message, MessageIdSource, MethodTag, Packet, PendingRequests, ProtocolError, Strictness,
};

/// Errors from client calls.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("cannot connect to broker at {path}: {source}")]
    Connect {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("broker refused the request: {message} ({code})")]
    Rpc {
        code: i64,
        message: String,
        data: Option<Value>,
    },

    #[error("malformed reply: {0}")]
    MalformedReply(String),
}

impl From<message::RpcError> for ClientError {
    fn from(error: message::RpcError) -> Self {
        ClientError::Rpc {
            code: error.code,
            message: error.message,
            data: error.data,
        }
    }
}

/// A successful `submitJob` reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionReceipt {
    pub mole_queue_id: MoleQueueId,
    pub working_directory: String,
}

/// One `jobStateChanged` notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChange {
    pub mole_queue_id: MoleQueueId,
    pub old_state: JobState,
    pub new_state: JobState,
}

/// A connected broker client.
pub struct Client {
    stream: UnixStream,
    ids: MessageIdSource,
    pending: PendingRequests,
    notifications: VecDeque<StateChange>,
}

impl Client {
    /// Connect to the broker socket.
    pub async fn connect(socket_path: &Path) -> Result<Self, ClientError> {
        let stream = UnixStream::connect(socket_path)
            .await
            .map_err(|source| ClientError::Connect {
                path: socket_path.display().to_string(),
                source,
            })?;
        Ok(Self {
            stream,
            ids: MessageIdSource::new(),
            pending: PendingRequests::new(),
            notifications: VecDeque::new(),
        })
    }

    /// `listQueues`: queue name → ordered program names.
    pub async fn list_queues(&mut self) -> Result<IndexMap<String, Vec<String>>, ClientError> {
        let result = self.call(MethodTag::ListQueues, None).await?;
        let object = result
            .as_object()
            .ok_or_else(|| ClientError::MalformedReply("queue list is not an object".into()))?;

        let mut list = IndexMap::new();
        for (queue, programs) in object {
            let programs = programs
                .as_array()
                .ok_or_else(|| {
                    ClientError::MalformedReply(format!("programs of '{queue}' are not a list"))
                })?
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect();
            list.insert(queue.clone(), programs);
        }
        Ok(list)
    }

    /// `submitJob`: returns the assigned id and working directory.
    pub async fn submit_job(&mut self, job: &JobData) -> Result<SubmissionReceipt, ClientError> {
        let result = self.call(MethodTag::SubmitJob, Some(job.to_wire())).await?;

        let mole_queue_id = result
            .get("moleQueueId")
            .and_then(Value::as_u64)
            .ok_or_else(|| ClientError::MalformedReply("missing moleQueueId".into()))?;
        let working_directory = result
            .get("workingDirectory")
            .and_then(Value::as_str)
            .ok_or_else(|| ClientError::MalformedReply("missing workingDirectory".into()))?
            .to_string();

        Ok(SubmissionReceipt {
            mole_queue_id: MoleQueueId::new(mole_queue_id),
            working_directory,
        })
    }

    /// `cancelJob`: resolves when the broker has issued the kill.
    pub async fn cancel_job(&mut self, id: MoleQueueId) -> Result<MoleQueueId, ClientError> {
        let result = self
            .call(
                MethodTag::CancelJob,
                Some(json!({ "moleQueueId": id.value() })),
            )
            .await?;
        let canceled = result
            .as_u64()
            .ok_or_else(|| ClientError::MalformedReply("cancel reply is not an id".into()))?;
        Ok(MoleQueueId::new(canceled))
    }

    /// `lookupJob`: the job's current wire hash.
    pub async fn lookup_job(&mut self, id: MoleQueueId) -> Result<JobData, ClientError> {
        let result = self
            .call(
                MethodTag::LookupJob,
                Some(json!({ "moleQueueId": id.value() })),
            )
            .await?;
        let mut job = JobData::from_wire(&result);
        // from_wire discards the id field; restore it from the hash.
        if let Some(raw) = result.get("moleQueueId").and_then(Value::as_u64) {
            job.mole_queue_id = MoleQueueId::new(raw);
        }
        Ok(job)
    }

    /// The next `jobStateChanged` notification, in arrival order.
    pub async fn next_state_change(&mut self) -> Result<StateChange, ClientError> {
        loop {
            if let Some(change) = self.notifications.pop_front() {
                return Ok(change);
            }
            let packet = self.read_one().await?;
            self.absorb(packet);
        }
    }

    /// Issue one request and wait for its correlated reply.
    async fn call(
        &mut self,
        tag: MethodTag,
        params: Option<Value>,
    ) -> Result<Value, ClientError> {
        let id = self.ids.next_id();
        self.pending.register(id, tag);
        rpc::wire::write_json(
            &mut self.stream,
            &message::request(id, tag.as_str(), params),
        )
        .await?;

        loop {
            let packet = self.read_one().await?;
            match packet {
                Packet::Result { id: reply_id, result } => {
                    match self.pending.take(&reply_id) {
                        Some(_) => return Ok(result),
                        None => continue, // not ours: ignore silently
                    }
                }
                Packet::Error { id: reply_id, error } => match self.pending.take(&reply_id) {
                    Some(_) => return Err(error.into()),
                    None => continue,
                },
                other => self.absorb(other),
            }
        }
    }

    async fn read_one(&mut self) -> Result<Packet, ClientError> {
        loop {
            let bytes = rpc::read_packet(&mut self.stream).await?;
            let mut packets = message::decode(&bytes, Strictness::Loose)
                .map_err(ClientError::from)?;
            // The broker never batches toward clients.
            let first = packets.drain(..).next();
            if let Some(first) = first {
                return Ok(first?);
            }
        }
    }

    /// Buffer a notification; anything else from the broker that is not
    /// a reply is dropped.
    fn absorb(&mut self, packet: Packet) {
        if let Packet::Notification { method, params } = packet {
            if method != rpc::JOB_STATE_CHANGED {
                return;
            }
            let Some(params) = params else { return };
            let (Some(id), Some(old), Some(new)) = (
                params.get("moleQueueId").and_then(Value::as_u64),
                params.get("oldState").and_then(Value::as_str),
                params.get("newState").and_then(Value::as_str),
            ) else {
                return;
            };
            self.notifications.push_back(StateChange {
                mole_queue_id: MoleQueueId::new(id),
                old_state: JobState::parse(old),
                new_state: JobState::parse(new),
            });
        }
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
