// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::client::Client;

/// List queues and their programs.
pub async fn run(client: &mut Client) -> anyhow::Result<()> {
    let list = client.list_queues().await?;

    if list.is_empty() {
        println!("No queues configured.");
        return Ok(());
    }

    for (queue, programs) in &list {
        println!("{queue}");
        for program in programs {
            println!("  {program}");
        }
    }
    Ok(())
}
