// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Broker state persistence.
//!
//! The whole broker persists as one JSON file: queue configurations under
//! `"Queues"` (each with its nested `Programs` group) and the job set
//! under `"Jobs"` as wire hashes. Writes go through a temp file and an
//! atomic rename so a crash mid-write never corrupts the previous state.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use mq_core::{JobData, QueueConfig};

/// Errors from settings persistence.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// The persisted broker state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(rename = "Queues", default)]
    pub queues: IndexMap<String, QueueConfig>,
    #[serde(rename = "Jobs", default)]
    pub jobs: Vec<JobData>,
}

impl Settings {
    /// Load state from `path`. A missing file is an empty state.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Write state to `path` atomically.
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let pretty = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, pretty)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

/// Write a single queue's configuration for sharing. Sensitive fields
/// are omitted from exported configuration.
pub fn export_queue(path: &Path, config: &QueueConfig) -> Result<(), SettingsError> {
    let sanitized = config.export_sanitized();
    let pretty = serde_json::to_string_pretty(&sanitized)?;
    fs::write(path, pretty)?;
    Ok(())
}

/// Read a queue configuration exported by [`export_queue`].
pub fn import_queue(path: &Path) -> Result<QueueConfig, SettingsError> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;
