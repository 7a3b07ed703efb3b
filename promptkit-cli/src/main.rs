//! `promptkit`: developer CLI for PromptKit packs and local storage.

mod commands;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use eyre::WrapErr;
use promptkit_core::storage::{JsonFileStore, SafeStorage};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;

use commands::{kv::KvCommand, pack::PackCommand, prompts::PromptsCommand};

/// Move prompt collections between devices and inspect local storage.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Storage file used by `kv` and `prompts` commands.
    #[arg(long, global = true, env = "PROMPTKIT_STORE", value_name = "FILE")]
    store: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace). `RUST_LOG` overrides.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Export, import and inspect `.pmtpk` pack files.
    #[command(subcommand)]
    Pack(PackCommand),

    /// Raw key-value maintenance on the storage file.
    #[command(subcommand)]
    Kv(KvCommand),

    /// Manage the stored prompt collection.
    #[command(subcommand)]
    Prompts(PromptsCommand),
}

fn init_tracing(verbose: u8) -> eyre::Result<()> {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr));
    tracing::subscriber::set_global_default(subscriber)
        .wrap_err("failed to install tracing subscriber")?;
    tracing_log::LogTracer::init().wrap_err("failed to bridge log records")?;
    Ok(())
}

fn default_store_path() -> eyre::Result<PathBuf> {
    let base = dirs::data_dir().ok_or_else(|| eyre::eyre!("no data directory; pass --store"))?;
    Ok(base.join("promptkit").join("storage.json"))
}

fn open_storage(store: Option<PathBuf>) -> eyre::Result<SafeStorage> {
    let path = match store {
        Some(path) => path,
        None => default_store_path()?,
    };
    tracing::debug!("using store {}", path.display());
    Ok(SafeStorage::new(Arc::new(JsonFileStore::new(path))))
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    match cli.command {
        Command::Pack(command) => commands::pack::run(command, || open_storage(cli.store)).await,
        Command::Kv(command) => commands::kv::run(command, &open_storage(cli.store)?).await,
        Command::Prompts(command) => {
            commands::prompts::run(command, &open_storage(cli.store)?).await
        }
    }
}
