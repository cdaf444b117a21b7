//! exrpc-export: offline EVM state export
//!
//! ## Usage
//!
//! ```bash
//! # Write code/, storage/ and txlogs/ under ./evm-export
//! exrpc-export export --snapshot state.json --out ./evm-export
//!
//! # Read an export back and print it as a snapshot
//! exrpc-export import --dir ./evm-export --snapshot restored.json
//!
//! # Take the worker count from the backend config
//! exrpc-export --config backend.yaml export --snapshot state.json --out ./evm-export
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use exrpc_backend::load_config;
use exrpc_genesis_export::{
    export_state, import_state, ExportLayout, StateSnapshot, WorkerPool,
};
use tracing_subscriber::{fmt, EnvFilter};

type CliResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[derive(Parser)]
#[command(name = "exrpc-export")]
#[command(about = "Export EVM state to per-account files and import it back")]
#[command(version)]
struct Cli {
    /// Backend config file; only the `export` section is used
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Writer pool size, overrides the config file
    #[arg(long, global = true)]
    workers: Option<usize>,

    /// Log level used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a JSON snapshot out as an export directory
    Export(ExportArgs),
    /// Read an export directory back
    Import(ImportArgs),
}

#[derive(Args)]
struct ExportArgs {
    /// JSON state snapshot to export
    #[arg(long)]
    snapshot: PathBuf,

    /// Export directory; its previous contents are removed
    #[arg(long)]
    out: PathBuf,
}

#[derive(Args)]
struct ImportArgs {
    /// Export directory to read
    #[arg(long)]
    dir: PathBuf,

    /// Write the imported state to this JSON file
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    if let Err(err) = run(cli).await {
        tracing::error!(error = %err, "exrpc-export failed");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    match cli.command {
        Commands::Export(args) => {
            let workers = resolve_workers(cli.config.as_ref(), cli.workers)?;
            let snapshot = StateSnapshot::load(&args.snapshot)?;
            let layout = ExportLayout::new(args.out);
            let mut pool = WorkerPool::new(workers);

            let summary = export_state(Arc::new(snapshot), &layout, &mut pool).await?;
            println!(
                "exported {} accounts: {} code files, {} storage files, {} tx log files",
                summary.accounts, summary.code_files, summary.storage_files, summary.tx_log_files
            );
        }
        Commands::Import(args) => {
            let layout = ExportLayout::new(args.dir);
            let snapshot = import_state(&layout)?;
            match args.snapshot {
                Some(path) => {
                    snapshot.save(&path)?;
                    println!(
                        "imported {} accounts and {} tx logs into {}",
                        snapshot.accounts.len(),
                        snapshot.tx_logs.len(),
                        path.display()
                    );
                }
                None => println!(
                    "imported {} accounts and {} tx logs",
                    snapshot.accounts.len(),
                    snapshot.tx_logs.len()
                ),
            }
        }
    }
    Ok(())
}

/// CLI flag, then config file, then the pool default.
fn resolve_workers(config: Option<&PathBuf>, flag: Option<usize>) -> CliResult<usize> {
    if let Some(workers) = flag {
        return Ok(workers);
    }
    let from_config = match config {
        Some(path) => load_config(path)?.export.workers,
        None => None,
    };
    Ok(from_config.unwrap_or_else(WorkerPool::default_size))
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    fmt().with_env_filter(filter).init();
}
