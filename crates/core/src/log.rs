// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Broker log entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::MoleQueueId;

/// Severity of a broker log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Notification,
    Warning,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Notification => write!(f, "notification"),
            LogLevel::Warning => write!(f, "warning"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// One entry in the broker's bounded in-memory log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    /// Set when the entry concerns a specific job.
    pub mole_queue_id: Option<MoleQueueId>,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>, id: Option<MoleQueueId>) -> Self {
        Self {
            level,
            timestamp: Utc::now(),
            message: message.into(),
            mole_queue_id: id,
        }
    }
}
