// Copyright (c) 2026 Moor Contributors. MIT License.
// See LICENSE for details.

//! # moor-node
//!
//! Entry point for the Moor ledger node: parses the CLI, initializes
//! logging, opens the chain database, and serves the HTTP API with the
//! WebSocket event feed.

mod api;
mod cli;
mod logging;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use moor_protocol::{LedgerDb, LedgerEvents, MinerState};

use crate::api::AppState;
use crate::cli::{Commands, MoorNodeCli, RunArgs};

fn main() -> anyhow::Result<()> {
    let cli = MoorNodeCli::parse();
    match cli.command {
        Commands::Run(args) => run(args),
        Commands::Version => {
            println!("moor-node {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn run(args: RunArgs) -> anyhow::Result<()> {
    logging::init_logging(&args.log_level, args.log_json);

    std::fs::create_dir_all(&args.data_dir)
        .with_context(|| format!("creating data directory {}", args.data_dir.display()))?;

    let events = LedgerEvents::new();
    let db = Arc::new(
        LedgerDb::open(args.data_dir.join("db"), events).context("opening chain database")?,
    );
    info!(data_dir = %args.data_dir.display(), "chain database open");

    let state = AppState {
        db,
        miner: MinerState::new(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    let runtime = tokio::runtime::Runtime::new().context("starting tokio runtime")?;
    runtime.block_on(async move {
        let listener = tokio::net::TcpListener::bind(&args.api_addr)
            .await
            .with_context(|| format!("binding API address {}", args.api_addr))?;
        info!(addr = %args.api_addr, "API listening");

        axum::serve(listener, api::create_router(state))
            .await
            .context("API server")
    })
}
