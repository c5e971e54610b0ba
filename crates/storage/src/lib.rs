// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! mq-storage: the job manager and broker persistence.
//!
//! The [`JobManager`] is the single owner of all job metadata; everything
//! else holds MoleQueue ids and resolves through it. Persistence is a
//! plain JSON state file plus a per-job sidecar written on every
//! mutation.

pub mod jobs;
pub mod settings;

pub use jobs::JobManager;
pub use settings::{Settings, SettingsError};
