//! # CLI Interface
//!
//! Command-line argument structure for `swan-node`, built with `clap`
//! derive. Four subcommands: `run`, `init`, `status`, and `version`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::logging::LogFormat;

/// SWAN exchange node.
///
/// Runs one domain's transaction processor: signs its node into incoming
/// transaction trees, fans out to its suppliers, and serves the audit
/// endpoints.
#[derive(Parser, Debug)]
#[command(
    name = "swan-node",
    about = "SWAN exchange node",
    version,
    propagate_version = true
)]
pub struct SwanNodeCli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the node.
    Run(RunArgs),
    /// Generate a signing key and a starter configuration for a domain.
    Init(InitArgs),
    /// Query the status endpoint of a running node.
    Status(StatusArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to the node configuration file (TOML).
    #[arg(long, short = 'c', env = "SWAN_CONFIG")]
    pub config: PathBuf,

    /// Port for the exchange API.
    #[arg(long, short = 'p', env = "SWAN_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "SWAN_METRICS_PORT", default_value_t = 9090)]
    pub metrics_port: u16,

    /// Log output format.
    #[arg(long, env = "SWAN_LOG_FORMAT", value_enum, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Arguments for the `init` subcommand.
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Domain the node will sign for, e.g. `ssp.example`.
    pub host: String,

    /// Directory to write `<host>.key` and `<host>.toml` into.
    #[arg(long, short = 'o', default_value = ".")]
    pub out_dir: PathBuf,

    /// Overwrite existing files.
    #[arg(long)]
    pub force: bool,
}

/// Arguments for the `status` subcommand.
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Base URL of the running node.
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    pub url: String,
}
