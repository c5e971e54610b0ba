// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon startup and shutdown.
//!
//! Startup acquires the broker lock, binds the socket, and restores
//! persisted queues and jobs; shutdown persists everything back and
//! releases the endpoint. A failed bind or lock is broker-fatal.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use fs2::FileExt;
use thiserror::Error;
use tokio::net::UnixListener;
use tokio::sync::mpsc;
use tracing::info;

use mq_adapters::TokioRunner;
use mq_core::JobSignal;
use mq_engine::BrokerLog;
use mq_storage::{Settings, SettingsError};

use crate::env;
use crate::server::Server;

/// The IPC endpoint name.
pub const SOCKET_NAME: &str = "MoleQueue";

/// Endpoint name under test mode.
pub const TESTING_SOCKET_NAME: &str = "MoleQueue-testing";

/// Errors fatal to daemon startup.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("no usable state directory")]
    NoStateDir,

    #[error("another broker owns the state directory: {0}")]
    LockFailed(std::io::Error),

    #[error("cannot bind local socket: {0}")]
    BindFailed(std::io::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Settings(#[from] SettingsError),
}

/// Resolved daemon paths.
#[derive(Debug, Clone)]
pub struct Config {
    pub state_dir: PathBuf,
    pub socket_path: PathBuf,
    pub lock_path: PathBuf,
    pub state_path: PathBuf,
    pub log_path: PathBuf,
    /// Per-job working directories live under here.
    pub jobs_dir: PathBuf,
}

impl Config {
    /// Resolve paths from the environment.
    pub fn load() -> Result<Self, LifecycleError> {
        let state_dir = match env::state_dir() {
            Some(dir) => dir,
            None => dirs::data_local_dir()
                .ok_or(LifecycleError::NoStateDir)?
                .join("molequeue"),
        };
        Ok(Self::for_state_dir(state_dir))
    }

    /// Resolve paths for an explicit state directory.
    pub fn for_state_dir(state_dir: PathBuf) -> Self {
        let socket_name = if env::test_mode() {
            TESTING_SOCKET_NAME
        } else {
            SOCKET_NAME
        };
        let socket_path = env::socket_path().unwrap_or_else(|| state_dir.join(socket_name));

        Self {
            socket_path,
            lock_path: state_dir.join("mqd.lock"),
            state_path: state_dir.join("state.json"),
            log_path: state_dir.join("mqd.log"),
            jobs_dir: state_dir.join("jobs"),
            state_dir,
        }
    }
}

/// Everything `main` needs after a successful startup.
pub struct StartupResult {
    pub server: Arc<Server>,
    pub signals: mpsc::UnboundedReceiver<JobSignal>,
    pub listener: UnixListener,
    /// Held for the daemon's lifetime; dropping releases the lock.
    pub lock_file: fs::File,
}

/// Bind the endpoint, restore persisted state, and build the server.
pub async fn startup(config: &Config) -> Result<StartupResult, LifecycleError> {
    fs::create_dir_all(&config.state_dir)?;
    fs::create_dir_all(&config.jobs_dir)?;

    let lock_file = fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(&config.lock_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(LifecycleError::LockFailed)?;
    fs::write(&config.lock_path, format!("{}\n", std::process::id()))?;

    // The lock guarantees no live broker owns this socket; anything
    // left on disk is stale.
    if config.socket_path.exists() {
        fs::remove_file(&config.socket_path)?;
    }
    let listener = UnixListener::bind(&config.socket_path).map_err(LifecycleError::BindFailed)?;

    let broker = Server::new(
        config.jobs_dir.clone(),
        Arc::new(TokioRunner::new()),
        BrokerLog::new(),
    );

    let settings = Settings::load(&config.state_path)?;
    let restored_queues = settings.queues.len();
    let restored_jobs = settings.jobs.len();
    broker.server.jobs.lock().restore(settings.jobs);
    broker
        .server
        .queues
        .lock()
        .await
        .restore(settings.queues, Instant::now());
    if restored_queues > 0 || restored_jobs > 0 {
        info!(
            queues = restored_queues,
            jobs = restored_jobs,
            "restored persisted state"
        );
    }

    Ok(StartupResult {
        server: broker.server,
        signals: broker.signals,
        listener,
        lock_file,
    })
}

/// Persist state and release the endpoint.
pub async fn shutdown(server: &Arc<Server>, config: &Config) -> Result<(), LifecycleError> {
    let settings = Settings {
        queues: server.queues.lock().await.snapshot(),
        jobs: server.jobs.lock().snapshot(),
    };
    settings.save(&config.state_path)?;

    if config.socket_path.exists() {
        fs::remove_file(&config.socket_path)?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
