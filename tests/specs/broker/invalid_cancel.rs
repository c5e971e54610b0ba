//! Cancelling an id that was never issued is a typed error and touches
//! nothing.

use serde_json::json;

use crate::prelude::*;

#[tokio::test]
async fn unknown_mole_queue_id() {
    let broker = TestBroker::start(vec![("local", sleep_queue(1, 2))]).await;
    let mut peer = broker.connect().await;

    let reply = peer
        .request(1, "cancelJob", Some(json!({ "moleQueueId": 9999999 })))
        .await;

    assert_eq!(reply["id"], 1);
    assert_eq!(reply["error"]["code"], 3);
    assert_eq!(reply["error"]["data"], 9999999);

    // No job was created or mutated.
    assert!(broker.server.jobs.lock().is_empty());
    assert_eq!(broker.runner.call_count(), 0);
}
