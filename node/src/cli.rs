//! # CLI Interface
//!
//! Command-line argument structure for `moor-node`, via `clap` derive.
//! Every configurable value has an environment-variable twin for
//! container-friendly deployment.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Moor ledger node.
///
/// A full node for the Moor repository ledger: persists the chain, serves
/// the HTTP query API, and streams ledger events over WebSocket.
#[derive(Parser, Debug)]
#[command(
    name = "moor-node",
    about = "Moor repository-ledger node",
    version,
    propagate_version = true
)]
pub struct MoorNodeCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the node binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the node.
    Run(RunArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Node data directory; the chain database lives under it.
    /// Created on first run if it does not exist.
    #[arg(long, short = 'd', env = "MOOR_DATA_DIR", default_value = ".moor")]
    pub data_dir: PathBuf,

    /// Bind address for the HTTP API and WebSocket feed.
    #[arg(long, env = "MOOR_API_ADDR", default_value = "127.0.0.1:9747")]
    pub api_addr: String,

    /// Log verbosity when RUST_LOG is not set: trace, debug, info, warn, error.
    #[arg(long, env = "MOOR_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines instead of human-readable output.
    #[arg(long, env = "MOOR_LOG_JSON")]
    pub log_json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        // Ensures the derive macros produce a valid CLI definition.
        MoorNodeCli::command().debug_assert();
    }

    #[test]
    fn run_defaults() {
        let cli = MoorNodeCli::parse_from(["moor-node", "run"]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.api_addr, "127.0.0.1:9747");
        assert_eq!(args.log_level, "info");
        assert!(!args.log_json);
    }

    #[test]
    fn run_flags_override_defaults() {
        let cli = MoorNodeCli::parse_from([
            "moor-node",
            "run",
            "--data-dir",
            "/tmp/moor",
            "--api-addr",
            "0.0.0.0:80",
            "--log-json",
        ]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.data_dir, PathBuf::from("/tmp/moor"));
        assert_eq!(args.api_addr, "0.0.0.0:80");
        assert!(args.log_json);
    }

    #[test]
    fn version_subcommand_parses() {
        let cli = MoorNodeCli::parse_from(["moor-node", "version"]);
        assert!(matches!(cli.command, Commands::Version));
    }
}
