// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use mq_core::MoleQueueId;

use crate::client::Client;

/// Cancel a job by id.
pub async fn run(client: &mut Client, id: u64) -> anyhow::Result<()> {
    let canceled = client.cancel_job(MoleQueueId::new(id)).await?;
    println!("Cancellation requested for job {canceled}");
    Ok(())
}
