//! listQueues reports every queue and its programs, in order.

use serde_json::json;

use crate::prelude::*;

#[tokio::test]
async fn two_queues_with_their_programs() {
    let broker = TestBroker::start(vec![
        ("cluster", sge_queue()),
        ("local", local_queue(2)),
    ])
    .await;
    let mut peer = broker.connect().await;

    let reply = peer.request(1, "listQueues", None).await;

    assert_eq!(reply["id"], 1);
    let result = reply["result"].as_object().unwrap();
    assert_eq!(result.len(), 2);

    let names: Vec<&str> = result.keys().map(String::as_str).collect();
    assert_eq!(names, ["cluster", "local"]);
    assert_eq!(
        reply["result"]["cluster"],
        json!(["Quantum Tater", "Crystal Math", "Nebulous Nucleus"])
    );
    assert_eq!(
        reply["result"]["local"],
        json!(["SpectroCrunch", "FastFocker", "SpeedSlater"])
    );
}

#[tokio::test]
async fn empty_broker_reports_no_queues() {
    let broker = TestBroker::start(vec![]).await;
    let mut peer = broker.connect().await;

    let reply = peer.request(1, "listQueues", None).await;
    assert_eq!(reply["result"], json!({}));
}
