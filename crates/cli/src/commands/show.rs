// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use mq_core::MoleQueueId;

use crate::client::Client;

/// Show a job's metadata and state.
pub async fn run(client: &mut Client, id: u64) -> anyhow::Result<()> {
    let job = client.lookup_job(MoleQueueId::new(id)).await?;

    println!("Job {}", job.mole_queue_id);
    if !job.description.is_empty() {
        println!("  description: {}", job.description);
    }
    println!("  state:       {}", job.job_state);
    println!("  queue:       {}", job.queue);
    println!("  program:     {}", job.program);
    if job.queue_id.is_valid() {
        println!("  queue id:    {}", job.queue_id);
    }
    if !job.local_working_directory.is_empty() {
        println!("  working dir: {}", job.local_working_directory);
    }
    if !job.output_directory.is_empty() {
        println!("  output dir:  {}", job.output_directory);
    }
    println!("  cores:       {}", job.number_of_cores);
    Ok(())
}
