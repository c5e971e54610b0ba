// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::Args;

use mq_core::{FileSpecification, JobData};

use crate::client::Client;

#[derive(Args)]
pub struct SubmitArgs {
    /// Target queue name
    pub queue: String,

    /// Program name within the queue
    pub program: String,

    /// Primary input file (staged into the job's working directory)
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Additional input files, staged alongside the primary input
    #[arg(long = "with")]
    pub additional: Vec<PathBuf>,

    /// Human-readable job description
    #[arg(long, default_value = "")]
    pub description: String,

    /// Requested processor cores
    #[arg(long, default_value_t = 1)]
    pub cores: i32,

    /// Requested wall time in minutes (queue default if omitted)
    #[arg(long)]
    pub walltime: Option<i32>,

    /// Mirror outputs into this directory on completion
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Remove the remote staging directory when the job finishes
    #[arg(long)]
    pub clean_remote: bool,

    /// Stay connected and print each state change until the job ends
    #[arg(long)]
    pub watch: bool,
}

/// Submit a job, optionally following its state changes.
pub async fn run(client: &mut Client, args: SubmitArgs) -> anyhow::Result<()> {
    let mut job = JobData::new();
    job.queue = args.queue;
    job.program = args.program;
    job.description = args.description;
    job.number_of_cores = args.cores;
    if let Some(walltime) = args.walltime {
        job.max_wall_time = walltime;
    }
    if let Some(input) = args.input {
        job.input_file = FileSpecification::from_path(input);
    }
    job.additional_input_files = args
        .additional
        .into_iter()
        .map(FileSpecification::from_path)
        .collect();
    if let Some(dir) = args.output_dir {
        job.output_directory = dir.display().to_string();
    }
    job.clean_remote_files = args.clean_remote;

    let receipt = client.submit_job(&job).await?;
    println!("Submitted job {}", receipt.mole_queue_id);
    println!("  working directory: {}", receipt.working_directory);

    if !args.watch {
        return Ok(());
    }

    loop {
        let change = client.next_state_change().await?;
        if change.mole_queue_id != receipt.mole_queue_id {
            continue;
        }
        println!("  {} -> {}", change.old_state, change.new_state);
        if change.new_state.is_terminal() {
            return Ok(());
        }
    }
}
