// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use mq_adapters::FakeRunner;
use mq_core::program::LaunchSyntax;
use mq_core::{JobState, Program, QueueConfig, QueueKind};
use serde_json::json;
use tokio::net::UnixStream;

struct Harness {
    server: Arc<Server>,
    runner: FakeRunner,
    socket_path: PathBuf,
    _tmp: tempfile::TempDir,
}

async fn harness() -> Harness {
    let tmp = tempfile::tempdir().unwrap();
    let socket_path = tmp.path().join("MoleQueue-testing");

    let runner = FakeRunner::new();
    let broker = Server::new(
        tmp.path().join("jobs"),
        Arc::new(runner.clone()),
        mq_engine::BrokerLog::new(),
    );
    let server = broker.server;
    server.spawn_notifier(broker.signals);

    let listener = UnixListener::bind(&socket_path).unwrap();
    tokio::spawn(Arc::clone(&server).run(listener));

    Harness {
        server,
        runner,
        socket_path,
        _tmp: tmp,
    }
}

async fn add_queues(harness: &Harness) {
    let mut cluster = QueueConfig::new(QueueKind::Sge);
    cluster.host_name = "hpc.example.edu".to_string();
    cluster.user_name = "user01".to_string();
    cluster.working_directory_base = "/scratch/user01".to_string();
    for name in ["Quantum Tater", "Crystal Math", "Nebulous Nucleus"] {
        cluster
            .programs
            .insert(name.to_string(), Program::new(name, "bin"));
    }

    let mut local = QueueConfig::new(QueueKind::Local);
    local.cores = 1;
    for name in ["SpectroCrunch", "FastFocker", "SpeedSlater"] {
        local
            .programs
            .insert(name.to_string(), Program::new(name, "bin"));
    }
    let mut sleep = Program::new("sleep", "sleep");
    sleep.arguments = "2".to_string();
    sleep.launch_syntax = LaunchSyntax::Plain;
    local.programs.insert(sleep.name.clone(), sleep);

    let mut queues = harness.server.queues.lock().await;
    let now = Instant::now();
    queues.add_queue_with_config("cluster", cluster, now).unwrap();
    queues.add_queue_with_config("local", local, now).unwrap();
}

async fn wait_for_state(server: &Arc<Server>, id: u64, state: JobState) {
    let id = mq_core::MoleQueueId::new(id);
    for _ in 0..400 {
        if server.jobs.lock().lookup_job(id).map(|j| j.job_state) == Some(state) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let actual = server.jobs.lock().lookup_job(id).map(|j| j.job_state);
    panic!("job {id} never reached {state}; currently {actual:?}");
}

struct TestClient {
    stream: UnixStream,
    buffered: std::collections::VecDeque<Value>,
}

impl TestClient {
    async fn connect(harness: &Harness) -> Self {
        let stream = UnixStream::connect(&harness.socket_path).await.unwrap();
        Self {
            stream,
            buffered: std::collections::VecDeque::new(),
        }
    }

    async fn send(&mut self, packet: Value) {
        rpc::wire::write_json(&mut self.stream, &packet).await.unwrap();
    }

    async fn recv(&mut self) -> Value {
        if let Some(packet) = self.buffered.pop_front() {
            return packet;
        }
        let bytes = rpc::read_packet(&mut self.stream).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    /// Wait for the reply to `id`, buffering interleaved notifications.
    async fn request(&mut self, id: u64, method: &str, params: Option<Value>) -> Value {
        self.send(message::request(id, method, params)).await;
        loop {
            let packet = self.recv().await;
            if packet.get("method").is_some() {
                self.buffered.push_back(packet);
                continue;
            }
            assert_eq!(packet["id"].as_u64(), Some(id), "unexpected reply: {packet}");
            return packet;
        }
    }
}

#[tokio::test]
async fn list_queues_reports_queues_and_programs_in_order() {
    let harness = harness().await;
    add_queues(&harness).await;
    let mut client = TestClient::connect(&harness).await;

    let reply = client.request(1, "listQueues", None).await;

    assert_eq!(reply["id"], 1);
    let result = reply["result"].as_object().unwrap();
    let queue_names: Vec<&str> = result.keys().map(String::as_str).collect();
    assert_eq!(queue_names, ["cluster", "local"]);
    assert_eq!(
        reply["result"]["cluster"],
        json!(["Quantum Tater", "Crystal Math", "Nebulous Nucleus"])
    );
    assert_eq!(
        reply["result"]["local"],
        json!(["SpectroCrunch", "FastFocker", "SpeedSlater", "sleep"])
    );
}

#[tokio::test]
async fn cancel_of_unknown_id_returns_typed_error_and_touches_nothing() {
    let harness = harness().await;
    add_queues(&harness).await;
    let mut client = TestClient::connect(&harness).await;

    let reply = client
        .request(7, "cancelJob", Some(json!({ "moleQueueId": 9999999 })))
        .await;

    assert_eq!(reply["id"], 7);
    assert_eq!(reply["error"]["code"], 3);
    assert_eq!(reply["error"]["data"], 9999999);
    assert!(harness.server.jobs.lock().is_empty());
}

#[tokio::test]
async fn submit_to_unknown_queue_is_rejected_without_creating_a_job() {
    let harness = harness().await;
    add_queues(&harness).await;
    let mut client = TestClient::connect(&harness).await;

    let reply = client
        .request(2, "submitJob", Some(json!({ "queue": "slurm", "program": "x" })))
        .await;

    assert_eq!(reply["error"]["code"], 1);
    assert!(harness.server.jobs.lock().is_empty());
}

#[tokio::test]
async fn submit_to_unknown_program_is_rejected_without_creating_a_job() {
    let harness = harness().await;
    add_queues(&harness).await;
    let mut client = TestClient::connect(&harness).await;

    let reply = client
        .request(3, "submitJob", Some(json!({ "queue": "local", "program": "ghost" })))
        .await;

    assert_eq!(reply["error"]["code"], 2);
    assert!(harness.server.jobs.lock().is_empty());
}

#[tokio::test]
async fn local_job_reply_then_exactly_three_notifications() {
    let harness = harness().await;
    add_queues(&harness).await;
    let control = harness.runner.push_hold();
    let mut client = TestClient::connect(&harness).await;

    let reply = client
        .request(
            10,
            "submitJob",
            Some(json!({ "queue": "local", "program": "sleep", "description": "sleep test" })),
        )
        .await;

    // The reply arrives before any notification and names the id and
    // working directory.
    let id = reply["result"]["moleQueueId"].as_u64().unwrap();
    assert!(id > 0);
    let workdir = reply["result"]["workingDirectory"].as_str().unwrap();
    assert!(workdir.ends_with(&id.to_string()));

    // Drive the FIFO once the job is queued, then finish the process.
    wait_for_state(&harness.server, id, JobState::LocalQueued).await;
    {
        let mut queues = harness.server.queues.lock().await;
        queues.tick(Instant::now() + Duration::from_secs(6)).await;
    }
    control.succeed("");

    let mut transitions = Vec::new();
    for _ in 0..3 {
        let packet = client.recv().await;
        assert_eq!(packet["method"], "jobStateChanged");
        assert_eq!(packet["params"]["moleQueueId"].as_u64().unwrap(), id);
        transitions.push((
            packet["params"]["oldState"].as_str().unwrap().to_string(),
            packet["params"]["newState"].as_str().unwrap().to_string(),
        ));
    }

    assert_eq!(
        transitions,
        vec![
            ("Accepted".to_string(), "LocalQueued".to_string()),
            ("LocalQueued".to_string(), "RunningLocal".to_string()),
            ("RunningLocal".to_string(), "Finished".to_string()),
        ]
    );
}

#[tokio::test]
async fn notifications_go_only_to_the_owning_session() {
    let harness = harness().await;
    add_queues(&harness).await;
    let _control = harness.runner.push_hold();

    let mut owner = TestClient::connect(&harness).await;
    let mut bystander = TestClient::connect(&harness).await;

    let reply = owner
        .request(1, "submitJob", Some(json!({ "queue": "local", "program": "sleep" })))
        .await;
    let id = reply["result"]["moleQueueId"].as_u64().unwrap();

    wait_for_state(&harness.server, id, JobState::LocalQueued).await;
    {
        let mut queues = harness.server.queues.lock().await;
        queues.tick(Instant::now() + Duration::from_secs(6)).await;
    }

    // The owner sees the queue transition.
    let packet = owner.recv().await;
    assert_eq!(packet["method"], "jobStateChanged");
    assert_eq!(packet["params"]["moleQueueId"].as_u64().unwrap(), id);

    // The bystander's next traffic is its own reply, not a notification.
    let reply = bystander.request(2, "listQueues", None).await;
    assert!(reply.get("result").is_some());
}

#[tokio::test]
async fn lookup_returns_the_wire_hash() {
    let harness = harness().await;
    add_queues(&harness).await;
    let _control = harness.runner.push_hold();
    let mut client = TestClient::connect(&harness).await;

    let reply = client
        .request(
            4,
            "submitJob",
            Some(json!({
                "queue": "local",
                "program": "sleep",
                "description": "keep this",
            })),
        )
        .await;
    let id = reply["result"]["moleQueueId"].as_u64().unwrap();

    let looked_up = client
        .request(5, "lookupJob", Some(json!({ "moleQueueId": id })))
        .await;
    assert_eq!(looked_up["result"]["description"], "keep this");
    assert_eq!(looked_up["result"]["moleQueueId"].as_u64().unwrap(), id);
    assert_eq!(looked_up["result"]["queue"], "local");

    let missing = client
        .request(6, "lookupJob", Some(json!({ "moleQueueId": 424242 })))
        .await;
    assert_eq!(missing["error"]["code"], 3);
    assert_eq!(missing["error"]["data"], 424242);
}

#[tokio::test]
async fn cancel_pending_local_job_without_running_it() {
    let harness = harness().await;
    add_queues(&harness).await;
    let _control_a = harness.runner.push_hold();
    let mut client = TestClient::connect(&harness).await;

    // Two jobs on a one-core queue; start A, leave B queued. A reaches
    // the FIFO before B is submitted, so the start order is fixed.
    let a = client
        .request(1, "submitJob", Some(json!({ "queue": "local", "program": "sleep" })))
        .await["result"]["moleQueueId"]
        .as_u64()
        .unwrap();
    wait_for_state(&harness.server, a, JobState::LocalQueued).await;

    let b = client
        .request(2, "submitJob", Some(json!({ "queue": "local", "program": "sleep" })))
        .await["result"]["moleQueueId"]
        .as_u64()
        .unwrap();
    wait_for_state(&harness.server, b, JobState::LocalQueued).await;
    {
        let mut queues = harness.server.queues.lock().await;
        queues.tick(Instant::now() + Duration::from_secs(6)).await;
    }
    wait_for_state(&harness.server, a, JobState::RunningLocal).await;

    let reply = client
        .request(3, "cancelJob", Some(json!({ "moleQueueId": b })))
        .await;
    assert_eq!(reply["result"].as_u64().unwrap(), b);

    let job_b = harness
        .server
        .jobs
        .lock()
        .lookup_job(mq_core::MoleQueueId::new(b))
        .cloned()
        .unwrap();
    assert_eq!(job_b.job_state, JobState::Canceled);

    let job_a = harness
        .server
        .jobs
        .lock()
        .lookup_job(mq_core::MoleQueueId::new(a))
        .cloned()
        .unwrap();
    assert_eq!(job_a.job_state, JobState::RunningLocal);
}

#[tokio::test]
async fn malformed_json_gets_a_parse_error() {
    let harness = harness().await;
    let mut client = TestClient::connect(&harness).await;

    rpc::wire::write_packet(&mut client.stream, b"{ not json")
        .await
        .unwrap();

    let reply = client.recv().await;
    assert_eq!(reply["error"]["code"], -32700);
    assert_eq!(reply["id"], Value::Null);
}

#[tokio::test]
async fn unknown_method_gets_method_not_found() {
    let harness = harness().await;
    let mut client = TestClient::connect(&harness).await;

    let reply = client.request(9, "rebootUniverse", None).await;
    assert_eq!(reply["error"]["code"], -32601);
    assert_eq!(reply["id"], 9);
}

#[tokio::test]
async fn batch_requests_are_processed_element_wise() {
    let harness = harness().await;
    add_queues(&harness).await;
    let mut client = TestClient::connect(&harness).await;

    client
        .send(json!([
            { "jsonrpc": "2.0", "id": 1, "method": "listQueues" },
            { "jsonrpc": "2.0", "id": 2, "method": "lookupJob", "params": { "moleQueueId": 5 } },
        ]))
        .await;

    let first = client.recv().await;
    let second = client.recv().await;
    assert_eq!(first["id"], 1);
    assert!(first.get("result").is_some());
    assert_eq!(second["id"], 2);
    assert_eq!(second["error"]["code"], 3);
}
