// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The broker server: sessions, request dispatch, notification fan-out.
//!
//! One task per connected client reads framed JSON-RPC packets and
//! dispatches them against the shared job manager and queue manager. A
//! notifier task subscribed to job-manager signals pushes one
//! `jobStateChanged` notification per transition to every session that
//! owns the job. The `submitJob` reply is always enqueued before the
//! queue sees the job, so clients observe the reply before any state
//! notification.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde_json::Value;
use tokio::net::{unix::OwnedWriteHalf, UnixListener, UnixStream};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use mq_adapters::ProcessRunner;
use mq_core::{JobData, JobSignal, MoleQueueId};
use mq_engine::{BrokerLog, Queue, QueueCtx, QueueError, QueueManager};
use mq_storage::JobManager;

use crate::connection::ServerConnection;
use crate::rpc::{
    self, cancellation_result, job_state_notification, message, parse_method_call, queue_list_result,
    submission_result, MethodCall, Packet, RpcError, Strictness,
};

/// Interval between queue-manager timer checks.
const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// The broker core: shared state plus the listener loop.
pub struct Server {
    pub jobs: Arc<Mutex<JobManager>>,
    pub queues: Arc<tokio::sync::Mutex<QueueManager>>,
    pub log: BrokerLog,
    /// Per-job working directories are created under here, named by id.
    pub local_dir_base: PathBuf,
    sessions: Mutex<HashMap<u64, Arc<Mutex<ServerConnection>>>>,
    next_session_id: AtomicU64,
}

/// The server plus the signal stream its notifier consumes.
pub struct Broker {
    pub server: Arc<Server>,
    pub signals: mpsc::UnboundedReceiver<JobSignal>,
}

impl Server {
    /// Build the server around fresh managers.
    pub fn new(
        local_dir_base: PathBuf,
        runner: Arc<dyn ProcessRunner>,
        log: BrokerLog,
    ) -> Broker {
        let mut job_manager = JobManager::new();
        let signals = job_manager.subscribe();
        let jobs = Arc::new(Mutex::new(job_manager));

        let queues = QueueManager::new(QueueCtx {
            jobs: Arc::clone(&jobs),
            runner,
            log: log.clone(),
        });

        Broker {
            server: Arc::new(Server {
                jobs,
                queues: Arc::new(tokio::sync::Mutex::new(queues)),
                log,
                local_dir_base,
                sessions: Mutex::new(HashMap::new()),
                next_session_id: AtomicU64::new(1),
            }),
            signals,
        }
    }

    /// Spawn the notifier task that fans job state changes out to the
    /// sessions owning each job.
    pub fn spawn_notifier(
        self: &Arc<Self>,
        mut signals: mpsc::UnboundedReceiver<JobSignal>,
    ) {
        let server = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(signal) = signals.recv().await {
                let JobSignal::StateChanged { id, old, new } = signal else {
                    continue;
                };
                server.log.notification(
                    format!("Job {id} changed state from '{old}' to '{new}'"),
                    Some(id),
                );

                // The accepting transition always precedes the submit
                // reply; clients learn the job exists from the reply
                // itself, so only later transitions are notified.
                if old == mq_core::JobState::None {
                    continue;
                }

                let interested: Vec<Arc<Mutex<ServerConnection>>> = {
                    let sessions = server.sessions.lock();
                    sessions
                        .values()
                        .filter(|session| session.lock().owns_job(id))
                        .cloned()
                        .collect()
                };
                for session in interested {
                    session.lock().send(job_state_notification(id, old, new));
                }
            }
        });
    }

    /// Spawn the periodic queue tick.
    pub fn spawn_ticker(self: &Arc<Self>) {
        let server = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(TICK_INTERVAL);
            loop {
                interval.tick().await;
                server.queues.lock().await.tick(Instant::now()).await;
            }
        });
    }

    /// Accept clients until the listener is closed.
    pub async fn run(self: Arc<Self>, listener: UnixListener) {
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let server = Arc::clone(&self);
                    tokio::spawn(async move {
                        server.handle_client(stream).await;
                    });
                }
                Err(e) => {
                    error!("Accept error: {}", e);
                }
            }
        }
    }

    async fn handle_client(self: Arc<Self>, stream: UnixStream) {
        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        let (mut reader, writer) = stream.into_split();

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        spawn_writer(session_id, writer, outbound_rx);

        let session = Arc::new(Mutex::new(ServerConnection::new(session_id, outbound_tx)));
        self.sessions.lock().insert(session_id, Arc::clone(&session));
        debug!(session = session_id, "client connected");

        // Signals are wired at construction, so processing can begin at
        // once; anything that raced in beforehand is released in order.
        let held = session.lock().start_processing();
        for packet in held {
            self.dispatch(&session, packet).await;
        }

        loop {
            let bytes = match rpc::read_packet(&mut reader).await {
                Ok(bytes) => bytes,
                Err(rpc::ProtocolError::ConnectionClosed) => {
                    debug!(session = session_id, "client disconnected");
                    break;
                }
                Err(rpc::ProtocolError::VersionMismatch { got }) => {
                    warn!(session = session_id, got, "protocol version mismatch");
                    break;
                }
                Err(e) => {
                    warn!(session = session_id, "connection error: {e}");
                    break;
                }
            };

            match message::decode(&bytes, Strictness::Loose) {
                Ok(packets) => {
                    for decoded in packets {
                        match decoded {
                            Ok(packet) => {
                                let released = session.lock().hold_or_pass(packet);
                                if let Some(packet) = released {
                                    self.dispatch(&session, packet).await;
                                }
                            }
                            Err(e) => {
                                session.lock().send(message::error_response(None, &e));
                            }
                        }
                    }
                }
                Err(e) => {
                    session.lock().send(message::error_response(None, &e));
                }
            }
        }

        self.sessions.lock().remove(&session_id);
    }

    async fn dispatch(self: &Arc<Self>, session: &Arc<Mutex<ServerConnection>>, packet: Packet) {
        match packet {
            Packet::Request { id, method, params } => {
                info!(method = %method, "received request");
                match parse_method_call(&method, params.as_ref()) {
                    Ok(call) => self.handle_call(session, &id, call).await,
                    Err(e) => session.lock().send(message::error_response(Some(&id), &e)),
                }
            }
            Packet::Notification { method, .. } => {
                debug!(method = %method, "ignoring client notification");
            }
            // The server issues no requests, so no reply can be ours;
            // replies with unknown ids are dropped silently.
            Packet::Result { .. } | Packet::Error { .. } => {}
        }
    }

    async fn handle_call(
        self: &Arc<Self>,
        session: &Arc<Mutex<ServerConnection>>,
        request_id: &Value,
        call: MethodCall,
    ) {
        match call {
            MethodCall::ListQueues => {
                let list = self.queues.lock().await.to_queue_list();
                session
                    .lock()
                    .send(message::result_response(request_id, queue_list_result(&list)));
            }
            MethodCall::SubmitJob(hash) => {
                self.handle_submit(session, request_id, &hash).await;
            }
            MethodCall::CancelJob { mole_queue_id } => {
                self.handle_cancel(session, request_id, mole_queue_id).await;
            }
            MethodCall::LookupJob { mole_queue_id } => {
                let job = self.jobs.lock().lookup_job(mole_queue_id).map(JobData::to_wire);
                let response = match job {
                    Some(hash) => message::result_response(request_id, hash),
                    None => message::error_response(
                        Some(request_id),
                        &RpcError::new(rpc::ERROR_INVALID_MOLE_QUEUE_ID, "Unknown MoleQueue ID")
                            .with_data(Value::from(mole_queue_id.value())),
                    ),
                };
                session.lock().send(response);
            }
        }
    }

    async fn handle_submit(
        self: &Arc<Self>,
        session: &Arc<Mutex<ServerConnection>>,
        request_id: &Value,
        hash: &Value,
    ) {
        let job = JobData::from_wire(hash);

        let queue = self.queues.lock().await.lookup_queue(&job.queue);
        let Some(queue) = queue else {
            session.lock().send(message::error_response(
                Some(request_id),
                &RpcError::new(rpc::ERROR_INVALID_QUEUE, "Unknown queue"),
            ));
            return;
        };
        if !queue.has_program(&job.program) {
            session.lock().send(message::error_response(
                Some(request_id),
                &RpcError::new(rpc::ERROR_INVALID_PROGRAM, "Unknown program"),
            ));
            return;
        }

        let (id, working_directory) = {
            let mut jobs = self.jobs.lock();
            let id = jobs.new_job_from_wire(hash);
            let dir = self.local_dir_base.join(id.value().to_string());
            let dir = dir.to_string_lossy().into_owned();
            jobs.set_local_working_directory(id, &dir);
            (id, dir)
        };

        // Ownership first, then the reply, then the queue: the reply is
        // enqueued ahead of any state-change notification for this job.
        {
            let mut session = session.lock();
            session.add_owned_job(id);
            session.send(message::result_response(
                request_id,
                submission_result(id, &working_directory),
            ));
        }

        let server = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = queue.submit(id).await {
                server
                    .log
                    .error(format!("submission failed: {e}"), Some(id));
                server.jobs.lock().set_job_state(id, mq_core::JobState::Error);
            }
        });
    }

    async fn handle_cancel(
        self: &Arc<Self>,
        session: &Arc<Mutex<ServerConnection>>,
        request_id: &Value,
        id: MoleQueueId,
    ) {
        let id_data = Value::from(id.value());

        let job = self.jobs.lock().lookup_job(id).cloned();
        let Some(job) = job else {
            session.lock().send(message::error_response(
                Some(request_id),
                &RpcError::new(rpc::ERROR_INVALID_MOLE_QUEUE_ID, "Unknown MoleQueue ID")
                    .with_data(id_data),
            ));
            return;
        };

        let queue = self.queues.lock().await.lookup_queue(&job.queue);
        let Some(queue) = queue else {
            session.lock().send(message::error_response(
                Some(request_id),
                &RpcError::new(rpc::ERROR_INVALID_QUEUE, "Unknown queue").with_data(id_data),
            ));
            return;
        };

        // The reply waits for the kill request itself to complete; the
        // Canceled transition may follow asynchronously.
        let response = match queue.kill(id).await {
            Ok(()) => message::result_response(request_id, cancellation_result(id)),
            Err(QueueError::InvalidJobState(state)) => message::error_response(
                Some(request_id),
                &RpcError::new(
                    rpc::ERROR_INVALID_JOB_STATE,
                    format!("Job is in state {state}"),
                )
                .with_data(id_data),
            ),
            Err(QueueError::UnknownJob(_)) => message::error_response(
                Some(request_id),
                &RpcError::new(rpc::ERROR_INVALID_MOLE_QUEUE_ID, "Unknown MoleQueue ID")
                    .with_data(id_data),
            ),
            Err(e) => message::error_response(
                Some(request_id),
                &RpcError::internal_error(e.to_string()),
            ),
        };
        session.lock().send(response);
    }
}

fn spawn_writer(
    session_id: u64,
    mut writer: OwnedWriteHalf,
    mut outbound: mpsc::UnboundedReceiver<Value>,
) {
    tokio::spawn(async move {
        while let Some(packet) = outbound.recv().await {
            if let Err(e) = rpc::wire::write_json(&mut writer, &packet).await {
                debug!(session = session_id, "writer closing: {e}");
                break;
            }
        }
    });
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
