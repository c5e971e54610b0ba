//! Behavioral specifications for the MoleQueue broker.
//!
//! These tests are end-to-end: a broker runs in-process with a fake
//! process runner, and the tests speak framed JSON-RPC to it over a real
//! local socket, exactly as a client process would.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

#[path = "specs/prelude.rs"]
mod prelude;

// broker/
#[path = "specs/broker/cancel_pending.rs"]
mod broker_cancel_pending;
#[path = "specs/broker/invalid_cancel.rs"]
mod broker_invalid_cancel;
#[path = "specs/broker/list_queues.rs"]
mod broker_list_queues;
#[path = "specs/broker/remote_pipeline.rs"]
mod broker_remote_pipeline;
#[path = "specs/broker/submit_local.rs"]
mod broker_submit_local;
