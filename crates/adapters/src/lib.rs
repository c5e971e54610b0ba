// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! mq-adapters: process-execution seams for the broker.
//!
//! Every child process the broker launches — local jobs and each
//! short-lived ssh/scp invocation — goes through the [`ProcessRunner`]
//! trait. The production implementation shells out via tokio; the fake
//! records invocations and replays canned outcomes so queue pipelines can
//! be tested without real processes.

pub mod process;
pub mod ssh;

pub use process::{
    run_with_timeout, KillHandle, ProcessError, ProcessOutcome, ProcessRunner, RunHandle, RunSpec,
    TokioRunner,
};
pub use ssh::{SshClient, SshConfig};

#[cfg(any(test, feature = "test-support"))]
pub use process::fake::{FakeProcess, FakeRunner};
