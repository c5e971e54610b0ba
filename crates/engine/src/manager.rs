// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The queue manager: owns queues, creates them by type name, and drives
//! their periodic ticks.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::warn;

use mq_adapters::ProcessRunner;
use mq_core::{QueueConfig, QueueKind};
use mq_storage::JobManager;

use crate::broker_log::BrokerLog;
use crate::local::QueueLocal;
use crate::queue::{Queue, TimerKind};
use crate::remote::QueueRemoteSsh;
use crate::scheduler::Scheduler;

/// Local FIFO consumption interval.
const LOCAL_TICK: Duration = Duration::from_secs(5);

/// Remote pending-submission interval.
const SUBMIT_TICK: Duration = Duration::from_secs(5);

/// Errors from queue-manager operations.
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("a queue named '{0}' already exists")]
    DuplicateQueueName(String),
}

/// Queue registry changes, for interested observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueSignal {
    Added { name: String },
    Removed { name: String },
}

/// Shared dependencies handed to every queue.
#[derive(Clone)]
pub struct QueueCtx {
    pub jobs: Arc<Mutex<JobManager>>,
    pub runner: Arc<dyn ProcessRunner>,
    pub log: BrokerLog,
}

/// Owns all queues and the timer service that ticks them.
pub struct QueueManager {
    ctx: QueueCtx,
    queues: IndexMap<String, Arc<dyn Queue>>,
    scheduler: Scheduler,
    timer_periods: HashMap<String, Duration>,
    subscribers: Vec<mpsc::UnboundedSender<QueueSignal>>,
}

impl QueueManager {
    pub fn new(ctx: QueueCtx) -> Self {
        Self {
            ctx,
            queues: IndexMap::new(),
            scheduler: Scheduler::new(),
            timer_periods: HashMap::new(),
            subscribers: Vec::new(),
        }
    }

    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<QueueSignal> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    fn emit(&mut self, signal: QueueSignal) {
        self.subscribers.retain(|tx| tx.send(signal.clone()).is_ok());
    }

    /// Create a queue of the given kind with default configuration.
    pub fn add_queue(
        &mut self,
        name: &str,
        kind: QueueKind,
        now: Instant,
    ) -> Result<(), ManagerError> {
        self.add_queue_with_config(name, QueueConfig::new(kind), now)
    }

    /// Create a queue from a full configuration. Names are unique.
    pub fn add_queue_with_config(
        &mut self,
        name: &str,
        config: QueueConfig,
        now: Instant,
    ) -> Result<(), ManagerError> {
        if self.queues.contains_key(name) {
            return Err(ManagerError::DuplicateQueueName(name.to_string()));
        }

        let queue: Arc<dyn Queue> = match config.kind {
            QueueKind::Local => Arc::new(QueueLocal::new(
                name,
                config,
                Arc::clone(&self.ctx.jobs),
                Arc::clone(&self.ctx.runner),
                self.ctx.log.clone(),
            )),
            QueueKind::Pbs | QueueKind::Sge => Arc::new(QueueRemoteSsh::new(
                name,
                config,
                Arc::clone(&self.ctx.jobs),
                Arc::clone(&self.ctx.runner),
                self.ctx.log.clone(),
            )),
        };

        self.arm_timers(name, &queue, now);
        self.queues.insert(name.to_string(), queue);
        self.emit(QueueSignal::Added {
            name: name.to_string(),
        });
        Ok(())
    }

    fn arm_timers(&mut self, name: &str, queue: &Arc<dyn Queue>, now: Instant) {
        match queue.kind() {
            QueueKind::Local => {
                self.arm(format!("local:{name}"), LOCAL_TICK, now);
            }
            QueueKind::Pbs | QueueKind::Sge => {
                let poll = Duration::from_secs(queue.config().queue_update_interval * 60);
                self.arm(format!("submit:{name}"), SUBMIT_TICK, now);
                self.arm(format!("poll:{name}"), poll, now);
            }
        }
    }

    fn arm(&mut self, id: String, period: Duration, now: Instant) {
        self.scheduler.set_timer(id.clone(), period, now);
        self.timer_periods.insert(id, period);
    }

    pub fn remove_queue(&mut self, name: &str) -> bool {
        if self.queues.shift_remove(name).is_none() {
            return false;
        }
        for prefix in ["local:", "submit:", "poll:"] {
            let id = format!("{prefix}{name}");
            self.scheduler.cancel_timer(&id);
            self.timer_periods.remove(&id);
        }
        self.emit(QueueSignal::Removed {
            name: name.to_string(),
        });
        true
    }

    pub fn lookup_queue(&self, name: &str) -> Option<Arc<dyn Queue>> {
        self.queues.get(name).cloned()
    }

    pub fn queue_names(&self) -> Vec<String> {
        self.queues.keys().cloned().collect()
    }

    /// Snapshot of (queue → ordered program names), the `listQueues`
    /// reply shape.
    pub fn to_queue_list(&self) -> IndexMap<String, Vec<String>> {
        self.queues
            .iter()
            .map(|(name, queue)| (name.clone(), queue.program_names()))
            .collect()
    }

    /// Queue configurations for persistence, in registry order.
    pub fn snapshot(&self) -> IndexMap<String, QueueConfig> {
        self.queues
            .iter()
            .map(|(name, queue)| (name.clone(), queue.config()))
            .collect()
    }

    /// Recreate queues from persisted configuration.
    pub fn restore(&mut self, configs: IndexMap<String, QueueConfig>, now: Instant) {
        for (name, config) in configs {
            if let Err(e) = self.add_queue_with_config(&name, config, now) {
                warn!(queue = %name, error = %e, "skipping unrestorable queue");
            }
        }
    }

    /// Run every timer that has fired and re-arm it.
    pub async fn tick(&mut self, now: Instant) {
        for timer_id in self.scheduler.fired_timers(now) {
            let Some((prefix, name)) = timer_id.split_once(':') else {
                continue;
            };
            let kind = match prefix {
                "local" => TimerKind::LocalTick,
                "submit" => TimerKind::SubmitTick,
                "poll" => TimerKind::PollTick,
                _ => continue,
            };
            let Some(queue) = self.lookup_queue(name) else {
                continue;
            };
            queue.handle_timer(kind).await;

            if let Some(period) = self.timer_periods.get(&timer_id) {
                self.scheduler.set_timer(timer_id.clone(), *period, now);
            }
        }
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
