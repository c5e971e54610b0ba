//! Cancelling a pending local job removes it from the FIFO; it never
//! runs.

use serde_json::json;

use crate::prelude::*;
use mq_core::JobState;

#[tokio::test]
async fn second_job_cancels_cleanly_while_queued() {
    let broker = TestBroker::start(vec![("local", sleep_queue(1, 60))]).await;
    let _control_a = broker.runner.push_hold();
    let mut peer = broker.connect().await;

    let a = peer
        .request(1, "submitJob", Some(json!({ "queue": "local", "program": "sleep" })))
        .await["result"]["moleQueueId"]
        .as_u64()
        .unwrap();
    broker.wait_for_state(a, JobState::LocalQueued).await;

    let b = peer
        .request(2, "submitJob", Some(json!({ "queue": "local", "program": "sleep" })))
        .await["result"]["moleQueueId"]
        .as_u64()
        .unwrap();
    broker.wait_for_state(b, JobState::LocalQueued).await;

    // One core: A starts, B stays queued.
    broker.advance(6).await;
    broker.wait_for_state(a, JobState::RunningLocal).await;

    let reply = peer
        .request(3, "cancelJob", Some(json!({ "moleQueueId": b })))
        .await;
    assert_eq!(reply["result"].as_u64().unwrap(), b);
    broker.wait_for_state(b, JobState::Canceled).await;

    // A is untouched; B went LocalQueued -> Canceled without running.
    broker.wait_for_state(a, JobState::RunningLocal).await;
    assert_eq!(broker.runner.call_lines(), vec!["sleep 60"]);

    // B's notification stream shows the direct cancellation.
    assert_eq!(
        peer.next_notification().await,
        (a, "Accepted".to_string(), "LocalQueued".to_string())
    );
    assert_eq!(
        peer.next_notification().await,
        (b, "Accepted".to_string(), "LocalQueued".to_string())
    );
    assert_eq!(
        peer.next_notification().await,
        (a, "LocalQueued".to_string(), "RunningLocal".to_string())
    );
    assert_eq!(
        peer.next_notification().await,
        (b, "LocalQueued".to_string(), "Canceled".to_string())
    );
}
