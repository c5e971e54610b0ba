// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! mq-engine: queue strategies and their plumbing.
//!
//! A [`Queue`] accepts jobs from the server and drives them to a terminal
//! state, either as local child processes bounded by a parallelism cap or
//! through a remote batch scheduler over SSH. The [`QueueManager`] owns
//! the queues, creates them by type name, and runs their periodic ticks
//! off a deterministic timer service so tests can advance time manually.

pub mod broker_log;
pub mod local;
pub mod manager;
pub mod queue;
pub mod remote;
pub mod scheduler;

pub use broker_log::BrokerLog;
pub use local::QueueLocal;
pub use manager::{ManagerError, QueueCtx, QueueManager, QueueSignal};
pub use queue::{Queue, QueueError, TimerKind};
pub use remote::QueueRemoteSsh;
pub use scheduler::Scheduler;
