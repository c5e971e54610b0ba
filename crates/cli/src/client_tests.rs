// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::sync::Arc;
use std::time::Instant;

use mq_adapters::FakeRunner;
use mq_core::program::LaunchSyntax;
use mq_core::{Program, QueueConfig, QueueKind};
use mq_daemon::Server;
use mq_engine::BrokerLog;
use tokio::net::UnixListener;

struct Harness {
    runner: FakeRunner,
    socket_path: std::path::PathBuf,
    server: Arc<Server>,
    _tmp: tempfile::TempDir,
}

async fn harness() -> Harness {
    let tmp = tempfile::tempdir().unwrap();
    let socket_path = tmp.path().join("MoleQueue-testing");

    let runner = FakeRunner::new();
    let broker = Server::new(
        tmp.path().join("jobs"),
        Arc::new(runner.clone()),
        BrokerLog::new(),
    );
    let server = broker.server;
    server.spawn_notifier(broker.signals);

    {
        let mut local = QueueConfig::new(QueueKind::Local);
        local.cores = 1;
        let mut sleep = Program::new("sleep", "sleep");
        sleep.arguments = "2".to_string();
        sleep.launch_syntax = LaunchSyntax::Plain;
        local.programs.insert(sleep.name.clone(), sleep);

        let mut queues = server.queues.lock().await;
        queues
            .add_queue_with_config("local", local, Instant::now())
            .unwrap();
    }

    let listener = UnixListener::bind(&socket_path).unwrap();
    tokio::spawn(Arc::clone(&server).run(listener));

    Harness {
        runner,
        socket_path,
        server,
        _tmp: tmp,
    }
}

#[tokio::test]
async fn list_queues_round_trips() {
    let harness = harness().await;
    let mut client = Client::connect(&harness.socket_path).await.unwrap();

    let list = client.list_queues().await.unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list["local"], vec!["sleep"]);
}

#[tokio::test]
async fn submit_then_watch_state_changes() {
    let harness = harness().await;
    let control = harness.runner.push_hold();
    let mut client = Client::connect(&harness.socket_path).await.unwrap();

    let mut job = JobData::new();
    job.queue = "local".to_string();
    job.program = "sleep".to_string();
    let receipt = client.submit_job(&job).await.unwrap();
    assert!(receipt.mole_queue_id.is_valid());
    assert!(receipt
        .working_directory
        .ends_with(&receipt.mole_queue_id.value().to_string()));

    // First notification arrives once the job is parked in the FIFO.
    let change = client.next_state_change().await.unwrap();
    assert_eq!(change.mole_queue_id, receipt.mole_queue_id);
    assert_eq!(change.old_state, JobState::Accepted);
    assert_eq!(change.new_state, JobState::LocalQueued);

    // Drive the queue, then finish the process.
    {
        let mut queues = harness.server.queues.lock().await;
        queues
            .tick(Instant::now() + std::time::Duration::from_secs(6))
            .await;
    }
    let change = client.next_state_change().await.unwrap();
    assert_eq!(change.new_state, JobState::RunningLocal);

    control.succeed("");
    let change = client.next_state_change().await.unwrap();
    assert_eq!(change.new_state, JobState::Finished);
    assert!(change.new_state.is_terminal());
}

#[tokio::test]
async fn lookup_reflects_current_state() {
    let harness = harness().await;
    let _control = harness.runner.push_hold();
    let mut client = Client::connect(&harness.socket_path).await.unwrap();

    let mut job = JobData::new();
    job.queue = "local".to_string();
    job.program = "sleep".to_string();
    job.description = "round trip".to_string();
    let receipt = client.submit_job(&job).await.unwrap();

    // Wait for the queue transition so the state is settled.
    let _ = client.next_state_change().await.unwrap();

    let fetched = client.lookup_job(receipt.mole_queue_id).await.unwrap();
    assert_eq!(fetched.mole_queue_id, receipt.mole_queue_id);
    assert_eq!(fetched.description, "round trip");
    assert_eq!(fetched.job_state, JobState::LocalQueued);
}

#[tokio::test]
async fn broker_errors_surface_with_code_and_data() {
    let harness = harness().await;
    let mut client = Client::connect(&harness.socket_path).await.unwrap();

    match client.cancel_job(MoleQueueId::new(9999999)).await {
        Err(ClientError::Rpc { code, data, .. }) => {
            assert_eq!(code, 3);
            assert_eq!(data, Some(serde_json::json!(9999999)));
        }
        other => panic!("expected rpc error, got {other:?}"),
    }
}

#[tokio::test]
async fn connect_to_missing_socket_fails_cleanly() {
    let tmp = tempfile::tempdir().unwrap();
    match Client::connect(&tmp.path().join("absent")).await {
        Err(ClientError::Connect { .. }) => {}
        other => panic!("expected connect error, got {:?}", other.is_ok()),
    }
}
