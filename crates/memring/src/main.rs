//! `memring`: client for a replicated memcached ring.
//!
//! Keys are spread over the configured memcached servers by consistent
//! hashing, each copied to the owner's two ring successors, and migrated
//! when servers are added or removed.
//!
//! # Usage
//!
//! ```text
//! memring shell                               # interactive get/set/add/remove
//! memring -c memring.toml shell               # with a config file
//! memring --node localhost:11211 --node localhost:11212 status
//! memring --memory selftest --seed 42         # churn self-test, no servers needed
//! ```

mod config;
mod selftest;
mod shell;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use memring_directory::Directory;
use memring_store::{MemcacheConnector, MemoryConnector, StoreConnector};
use memring_types::NodeAddr;
use tokio::io::BufReader;
use tracing::info;

use config::{BackendKind, CliConfig};
use selftest::SelftestOptions;

// -----------------------------------------------------------------------
// CLI definition
// -----------------------------------------------------------------------

#[derive(Parser)]
#[command(
    name = "memring",
    version,
    about = "Replicated consistent-hashing client for memcached"
)]
struct Cli {
    /// Path to TOML config file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Use in-process backends instead of memcached servers.
    #[arg(short, long, global = true)]
    memory: bool,

    /// Initial node (`host:port`). Can be specified multiple times; replaces
    /// `[cluster] nodes` from the config file.
    #[arg(short, long, global = true, env = "MEMRING_NODES", value_delimiter = ',')]
    node: Vec<NodeAddr>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive shell: get, set, add, remove, status, quit.
    Shell,

    /// Load fake data, then check reads survive a node leaving and joining.
    Selftest {
        /// Number of keys to load.
        #[arg(short, long, default_value = "100")]
        keys: usize,

        /// Number of keys to read back at each step.
        #[arg(short, long, default_value = "50")]
        sample: usize,

        /// Node to remove.
        #[arg(long, default_value = "localhost:11211")]
        remove: NodeAddr,

        /// Node to add.
        #[arg(long, default_value = "localhost:11215")]
        add: NodeAddr,

        /// Seed for data generation and sampling.
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Show ring members, positions, replicas and tracked keys.
    Status,
}

// -----------------------------------------------------------------------
// Entrypoint
// -----------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let mut config = CliConfig::load(cli.config.as_deref()).context("failed to load config")?;

    // CLI args override config file values.
    if cli.memory {
        config.backend.kind = BackendKind::Memory;
    }
    if !cli.node.is_empty() {
        config.cluster.nodes = cli.node;
    }

    setup_tracing(&config.log.level);

    let directory = connect(&config).await?;

    match cli.command {
        Commands::Shell => cmd_shell(&directory).await,
        Commands::Selftest {
            keys,
            sample,
            remove,
            add,
            seed,
        } => {
            let opts = SelftestOptions {
                keys,
                sample,
                remove,
                add,
                seed,
            };
            cmd_selftest(&directory, &opts).await
        }
        Commands::Status => {
            println!("{}", shell::render_status(&directory).await);
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Initialize the `tracing` subscriber with the given level filter.
///
/// Respects `RUST_LOG` env var if set, otherwise uses the config value.
/// Logs go to stderr so they never interleave with shell output.
fn setup_tracing(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Build the directory and join the configured nodes.
async fn connect(config: &CliConfig) -> Result<Directory> {
    let connector: Arc<dyn StoreConnector> = match config.backend.kind {
        BackendKind::Memcached => Arc::new(MemcacheConnector::new(config.io_timeout())),
        BackendKind::Memory => Arc::new(MemoryConnector::new()),
    };

    info!(
        backend = ?config.backend.kind,
        nodes = config.cluster.nodes.len(),
        vnodes = config.ring.vnodes_per_node,
        "initializing cluster"
    );
    Directory::connect(
        config.directory_config(),
        connector,
        config.cluster.nodes.iter().cloned(),
    )
    .await
    .context("failed to initialize cluster")
}

// -----------------------------------------------------------------------
// memring shell
// -----------------------------------------------------------------------

async fn cmd_shell(directory: &Directory) -> Result<ExitCode> {
    let stdin = BufReader::new(tokio::io::stdin());
    shell::run(directory, stdin, tokio::io::stdout()).await?;
    Ok(ExitCode::SUCCESS)
}

// -----------------------------------------------------------------------
// memring selftest
// -----------------------------------------------------------------------

async fn cmd_selftest(directory: &Directory, opts: &SelftestOptions) -> Result<ExitCode> {
    let report = selftest::run(directory, opts).await?;

    if report.after_remove.is_none() {
        println!("Node not found");
    }
    if let Some(e) = &report.add_error {
        println!("Connection error: {e}");
    }

    if report.passed() {
        println!("Test Passed");
        Ok(ExitCode::SUCCESS)
    } else {
        println!("Outputs Don't Match");
        Ok(ExitCode::FAILURE)
    }
}
