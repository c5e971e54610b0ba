//! A local sleep job runs to completion with exactly three state-change
//! notifications after the submission reply.

use serde_json::json;

use crate::prelude::*;

#[tokio::test]
async fn sleep_job_lifecycle() {
    let broker = TestBroker::start(vec![("local", sleep_queue(2, 2))]).await;
    let control = broker.runner.push_hold();
    let mut peer = broker.connect().await;

    let reply = peer
        .request(
            1,
            "submitJob",
            Some(json!({ "queue": "local", "program": "sleep" })),
        )
        .await;

    // The reply precedes every notification and carries the assigned id
    // and working directory.
    let id = reply["result"]["moleQueueId"].as_u64().unwrap();
    let workdir = reply["result"]["workingDirectory"].as_str().unwrap();
    assert!(workdir.ends_with(&id.to_string()));

    broker.wait_for_state(id, mq_core::JobState::LocalQueued).await;
    broker.advance(6).await;
    control.succeed("");

    assert_eq!(
        peer.next_notification().await,
        (id, "Accepted".to_string(), "LocalQueued".to_string())
    );
    assert_eq!(
        peer.next_notification().await,
        (id, "LocalQueued".to_string(), "RunningLocal".to_string())
    );
    assert_eq!(
        peer.next_notification().await,
        (id, "RunningLocal".to_string(), "Finished".to_string())
    );

    // Exactly one process ran: the sleep itself.
    assert_eq!(broker.runner.call_lines(), vec!["sleep 2"]);
}
