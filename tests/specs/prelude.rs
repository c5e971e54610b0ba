//! Shared harness for broker specs.
//!
//! Starts an in-process broker on a testing socket with a fake process
//! runner, and provides a minimal framed JSON-RPC peer.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::net::{UnixListener, UnixStream};

use mq_adapters::FakeRunner;
use mq_core::program::LaunchSyntax;
use mq_core::{JobState, MoleQueueId, Program, QueueConfig, QueueKind};
use mq_daemon::rpc::{self, message};
use mq_daemon::Server;
use mq_engine::BrokerLog;

pub struct TestBroker {
    pub server: Arc<Server>,
    pub runner: FakeRunner,
    pub socket_path: PathBuf,
    _tmp: tempfile::TempDir,
}

impl TestBroker {
    /// Start a broker with the given queue configurations.
    pub async fn start(queues: Vec<(&str, QueueConfig)>) -> Self {
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
            let mut manager = server.queues.lock().await;
            let now = Instant::now();
            for (name, config) in queues {
                manager.add_queue_with_config(name, config, now).unwrap();
            }
        }

        let listener = UnixListener::bind(&socket_path).unwrap();
        tokio::spawn(Arc::clone(&server).run(listener));

        Self {
            server,
            runner,
            socket_path,
            _tmp: tmp,
        }
    }

    pub async fn connect(&self) -> TestPeer {
        TestPeer::new(UnixStream::connect(&self.socket_path).await.unwrap())
    }

    /// Advance the queue timers as if `seconds` had elapsed.
    pub async fn advance(&self, seconds: u64) {
        let mut queues = self.server.queues.lock().await;
        queues
            .tick(Instant::now() + Duration::from_secs(seconds))
            .await;
    }

    /// Poll until a job reaches `state` or the deadline passes.
    pub async fn wait_for_state(&self, id: u64, state: JobState) {
        let id = MoleQueueId::new(id);
        for _ in 0..400 {
            if self.server.jobs.lock().lookup_job(id).map(|j| j.job_state) == Some(state) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let actual = self.server.jobs.lock().lookup_job(id).map(|j| j.job_state);
        panic!("job {id} never reached {state}; currently {actual:?}");
    }
}

/// A raw JSON-RPC peer over the framed socket.
///
/// Notifications that arrive while waiting for a reply are buffered in
/// arrival order, the way a real client correlates traffic.
pub struct TestPeer {
    pub stream: UnixStream,
    buffered: std::collections::VecDeque<Value>,
}

impl TestPeer {
    pub fn new(stream: UnixStream) -> Self {
        Self {
            stream,
            buffered: std::collections::VecDeque::new(),
        }
    }

    pub async fn send(&mut self, packet: Value) {
        rpc::wire::write_json(&mut self.stream, &packet).await.unwrap();
    }

    pub async fn recv(&mut self) -> Value {
        if let Some(packet) = self.buffered.pop_front() {
            return packet;
        }
        let bytes = rpc::read_packet(&mut self.stream).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    /// Issue a request and wait for its correlated reply, buffering any
    /// notifications that arrive first.
    pub async fn request(&mut self, id: u64, method: &str, params: Option<Value>) -> Value {
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

    /// Receive the next `jobStateChanged` notification as
    /// `(moleQueueId, oldState, newState)`.
    pub async fn next_notification(&mut self) -> (u64, String, String) {
        let packet = self.recv().await;
        assert_eq!(packet["method"], "jobStateChanged", "unexpected packet: {packet}");
        (
            packet["params"]["moleQueueId"].as_u64().unwrap(),
            packet["params"]["oldState"].as_str().unwrap().to_string(),
            packet["params"]["newState"].as_str().unwrap().to_string(),
        )
    }
}

/// A local queue with the classic three spectroscopy programs plus a
/// plain `sleep`.
pub fn local_queue(cores: u32) -> QueueConfig {
    let mut config = QueueConfig::new(QueueKind::Local);
    config.cores = cores;
    for name in ["SpectroCrunch", "FastFocker", "SpeedSlater"] {
        config
            .programs
            .insert(name.to_string(), Program::new(name, "bin"));
    }
    config
}

/// A local queue carrying only a `sleep <secs>` program.
pub fn sleep_queue(cores: u32, seconds: u32) -> QueueConfig {
    let mut config = QueueConfig::new(QueueKind::Local);
    config.cores = cores;
    let mut sleep = Program::new("sleep", "sleep");
    sleep.arguments = seconds.to_string();
    sleep.launch_syntax = LaunchSyntax::Plain;
    config.programs.insert(sleep.name.clone(), sleep);
    config
}

/// An SGE queue with the classic three quantum programs.
pub fn sge_queue() -> QueueConfig {
    let mut config = QueueConfig::new(QueueKind::Sge);
    config.host_name = "hpc.example.edu".to_string();
    config.user_name = "user01".to_string();
    config.working_directory_base = "/scratch/user01".to_string();
    for name in ["Quantum Tater", "Crystal Math", "Nebulous Nucleus"] {
        config
            .programs
            .insert(name.to_string(), Program::new(name, "bin"));
    }
    config
}

/// A PBS queue with a single input-arg program.
pub fn pbs_queue() -> QueueConfig {
    let mut config = QueueConfig::new(QueueKind::Pbs);
    config.host_name = "hpc.example.edu".to_string();
    config.user_name = "user01".to_string();
    config.working_directory_base = "/scratch/user01".to_string();
    let mut psi4 = Program::new("psi4", "psi4");
    psi4.launch_syntax = LaunchSyntax::InputArg;
    config.programs.insert(psi4.name.clone(), psi4);
    config
}
