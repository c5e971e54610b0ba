// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded in-memory broker log.
//!
//! Every entry carries a level, a timestamp, a message, and optionally
//! the MoleQueue id it concerns. Entries are mirrored to `tracing` and
//! kept in a ring buffer with a configurable cap so GUIs can show and
//! filter recent activity without unbounded growth.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use mq_core::{LogEntry, LogLevel, MoleQueueId};

/// Default maximum number of retained entries.
pub const DEFAULT_MAX_ENTRIES: usize = 1000;

struct LogState {
    entries: VecDeque<LogEntry>,
    max_entries: usize,
}

/// Shared, bounded broker log.
#[derive(Clone)]
pub struct BrokerLog {
    inner: Arc<Mutex<LogState>>,
}

impl Default for BrokerLog {
    fn default() -> Self {
        Self::new()
    }
}

impl BrokerLog {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_ENTRIES)
    }

    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(LogState {
                entries: VecDeque::new(),
                max_entries,
            })),
        }
    }

    pub fn debug(&self, message: impl Into<String>, id: Option<MoleQueueId>) {
        self.push(LogLevel::Debug, message.into(), id);
    }

    pub fn notification(&self, message: impl Into<String>, id: Option<MoleQueueId>) {
        self.push(LogLevel::Notification, message.into(), id);
    }

    pub fn warning(&self, message: impl Into<String>, id: Option<MoleQueueId>) {
        self.push(LogLevel::Warning, message.into(), id);
    }

    pub fn error(&self, message: impl Into<String>, id: Option<MoleQueueId>) {
        self.push(LogLevel::Error, message.into(), id);
    }

    fn push(&self, level: LogLevel, message: String, id: Option<MoleQueueId>) {
        match (level, id) {
            (LogLevel::Debug, _) => tracing::debug!(mole_queue_id = ?id, "{message}"),
            (LogLevel::Notification, _) => tracing::info!(mole_queue_id = ?id, "{message}"),
            (LogLevel::Warning, _) => tracing::warn!(mole_queue_id = ?id, "{message}"),
            (LogLevel::Error, _) => tracing::error!(mole_queue_id = ?id, "{message}"),
        }

        let mut state = self.inner.lock();
        if state.entries.len() == state.max_entries {
            state.entries.pop_front();
        }
        state.entries.push_back(LogEntry::new(level, message, id));
    }

    /// All retained entries, oldest first.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.inner.lock().entries.iter().cloned().collect()
    }

    /// Entries concerning one job, oldest first.
    pub fn entries_for_job(&self, id: MoleQueueId) -> Vec<LogEntry> {
        self.inner
            .lock()
            .entries
            .iter()
            .filter(|entry| entry.mole_queue_id == Some(id))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }
}

#[cfg(test)]
#[path = "broker_log_tests.rs"]
mod tests;
