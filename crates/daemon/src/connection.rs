// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-client session state.
//!
//! A `ServerConnection` tracks which jobs a client submitted (so state
//! notifications reach exactly the sessions that care) and holds
//! incoming requests until the server has wired its signal handlers and
//! calls `start_processing()`.

use std::collections::HashSet;

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;

use mq_core::MoleQueueId;

use crate::rpc::message::Packet;

/// One connected client's session.
pub struct ServerConnection {
    session_id: u64,
    outbound: mpsc::UnboundedSender<Value>,
    owned: HashSet<MoleQueueId>,
    started: bool,
    held: Vec<Packet>,
}

impl ServerConnection {
    pub fn new(session_id: u64, outbound: mpsc::UnboundedSender<Value>) -> Self {
        Self {
            session_id,
            outbound,
            owned: HashSet::new(),
            started: false,
            held: Vec::new(),
        }
    }

    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    /// Queue a packet for the writer task. Packets enqueued here are
    /// delivered in call order, which is what gives replies-before-
    /// notifications their ordering guarantee.
    pub fn send(&self, packet: Value) {
        if self.outbound.send(packet).is_err() {
            debug!(session = self.session_id, "dropping packet for closed session");
        }
    }

    /// Record that this session submitted the given job.
    pub fn add_owned_job(&mut self, id: MoleQueueId) {
        self.owned.insert(id);
    }

    pub fn owns_job(&self, id: MoleQueueId) -> bool {
        self.owned.contains(&id)
    }

    /// Hold a packet until processing starts. Returns the packet when
    /// the session is already live.
    pub fn hold_or_pass(&mut self, packet: Packet) -> Option<Packet> {
        if self.started {
            return Some(packet);
        }
        self.held.push(packet);
        None
    }

    /// Begin processing: releases every held packet, in arrival order.
    pub fn start_processing(&mut self) -> Vec<Packet> {
        self.started = true;
        std::mem::take(&mut self.held)
    }

    pub fn is_processing(&self) -> bool {
        self.started
    }
}

#[cfg(test)]
#[path = "connection_tests.rs"]
mod tests;
