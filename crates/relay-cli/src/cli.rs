use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use relay_engine::OraclePolicy;
use relay_server::config::DEFAULT_NETWORK_PASSPHRASE;

#[derive(Parser)]
#[command(
    name = "relayd",
    about = "Ledger relay: serves replayed ledgers to remote consumers",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log level (trace, debug, info, warn, error). Overrides the config file.
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the relay until interrupted
    Serve(ConfigArgs),
    /// Load, validate and print the resolved configuration
    CheckConfig(ConfigArgs),
    /// Write a synthetic history archive for local testing
    InitArchive(InitArchiveArgs),
}

/// Configuration file plus per-field overrides.
#[derive(Args, Clone, Debug, Default)]
pub struct ConfigArgs {
    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to listen on
    #[arg(long)]
    pub listen: Option<SocketAddr>,

    #[arg(long)]
    pub network_passphrase: Option<String>,

    /// Comma-separated list of history archive directories
    #[arg(long = "history-archives", value_delimiter = ',')]
    pub history_archives: Vec<PathBuf>,

    #[arg(long)]
    pub checkpoint_frequency: Option<u32>,

    /// Ledger hash database, e.g. sqlite:///var/lib/relay/hashes.db
    #[arg(long = "db-url", env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// What to do when the hash database cannot be read
    #[arg(long)]
    pub oracle_policy: Option<OraclePolicy>,

    /// Per-request deadline in milliseconds, 0 to disable
    #[arg(long)]
    pub request_timeout_ms: Option<u64>,
}

#[derive(Args)]
pub struct InitArchiveArgs {
    /// Directory to create the archive in
    pub path: PathBuf,

    /// Number of ledgers to write
    #[arg(long, default_value = "128")]
    pub ledgers: u32,

    /// Sequence of the first ledger
    #[arg(long, default_value = "1")]
    pub first: u32,

    #[arg(long, default_value = DEFAULT_NETWORK_PASSPHRASE)]
    pub network_passphrase: String,
}
