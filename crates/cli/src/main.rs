// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! MoleQueue client (mq)
//!
//! Thin CLI over the broker's JSON-RPC interface: list queues, submit
//! jobs, cancel them, and inspect their state.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod client;
mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::client::Client;

#[derive(Parser)]
#[command(name = "mq", version, about = "Submit and track MoleQueue jobs")]
struct Cli {
    /// Broker socket path (defaults to the daemon's endpoint)
    #[arg(long, global = true)]
    socket: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List queues and the programs they offer
    Queues,

    /// Submit a job
    Submit(commands::submit::SubmitArgs),

    /// Cancel a job by MoleQueue id
    Cancel {
        /// MoleQueue id of the job
        id: u64,
    },

    /// Show a job's metadata and state
    Show {
        /// MoleQueue id of the job
        id: u64,
    },
}

fn socket_path(cli: &Cli) -> anyhow::Result<PathBuf> {
    if let Some(path) = &cli.socket {
        return Ok(path.clone());
    }
    Ok(mq_daemon::Config::load()?.socket_path)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let socket = socket_path(&cli)?;
    let mut client = Client::connect(&socket).await?;

    match cli.command {
        Command::Queues => commands::queues::run(&mut client).await,
        Command::Submit(args) => commands::submit::run(&mut client, args).await,
        Command::Cancel { id } => commands::cancel::run(&mut client, id).await,
        Command::Show { id } => commands::show::run(&mut client, id).await,
    }
}
