//! A remote PBS job walks the stage → submit → poll → retrieve → clean
//! pipeline, observed end-to-end through the RPC interface.

use serde_json::json;

use crate::prelude::*;
use mq_core::JobState;

#[tokio::test]
async fn pbs_happy_path_over_rpc() {
    let broker = TestBroker::start(vec![("torque", pbs_queue())]).await;
    let mut peer = broker.connect().await;

    let reply = peer
        .request(
            1,
            "submitJob",
            Some(json!({
                "queue": "torque",
                "program": "psi4",
                "inputFile": { "filename": "water.inp", "contents": "O 0 0 0\n" },
                "cleanRemoteFiles": true,
            })),
        )
        .await;
    let id = reply["result"]["moleQueueId"].as_u64().unwrap();
    broker.wait_for_state(id, JobState::Accepted).await;

    // Submission pipeline: mkdir, scp up, qsub.
    broker.runner.push_success("");
    broker.runner.push_success("");
    broker.runner.push_success("4807.head.example.edu");
    broker.advance(6).await;
    broker.wait_for_state(id, JobState::Submitted).await;

    // First poll shows the job running; second poll shows it gone, which
    // retrieves output and cleans the remote directory.
    broker
        .runner
        .push_success("4807.head  scatter  user01  12:56:34 R batch");
    broker.advance(200).await;
    broker.wait_for_state(id, JobState::RunningRemote).await;

    broker.runner.push_success(""); // empty listing
    broker.runner.push_success(""); // scp back
    broker.runner.push_success(""); // rm -rf
    broker.advance(400).await;
    broker.wait_for_state(id, JobState::Finished).await;

    // The client saw every drawn edge after the reply, in order.
    assert_eq!(
        peer.next_notification().await,
        (id, "Accepted".to_string(), "Submitted".to_string())
    );
    assert_eq!(
        peer.next_notification().await,
        (id, "Submitted".to_string(), "RemoteQueued".to_string())
    );
    assert_eq!(
        peer.next_notification().await,
        (id, "RemoteQueued".to_string(), "RunningRemote".to_string())
    );
    assert_eq!(
        peer.next_notification().await,
        (id, "RunningRemote".to_string(), "Finished".to_string())
    );

    // The scheduler id is queryable afterwards.
    let shown = peer
        .request(2, "lookupJob", Some(json!({ "moleQueueId": id })))
        .await;
    assert_eq!(shown["result"]["queueId"].as_u64().unwrap(), 4807);
    assert_eq!(shown["result"]["jobState"], "Finished");
}
