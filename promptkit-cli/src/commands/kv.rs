//! `promptkit kv`: raw maintenance of the storage file.

use std::path::PathBuf;

use clap::Subcommand;
use eyre::WrapErr;
use promptkit_core::{SafeStorage, WriteOptions};
use serde_json::{Map, Value};

use super::{print_json, write_failure};

#[derive(Subcommand)]
pub enum KvCommand {
    /// Print the value stored under a key.
    Get {
        key: String,
    },

    /// Store a JSON value under a key (verified, with backup for arrays).
    Set {
        key: String,
        /// JSON text, e.g. '["a","b"]' or '"dark"'.
        value: String,
    },

    /// Print storage usage.
    Stats,

    /// Print every entry (backup slots excluded) as one JSON object.
    Export {
        /// Write to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Load entries from a JSON object produced by `kv export`.
    Import {
        file: PathBuf,
    },
}

pub async fn run(command: KvCommand, storage: &SafeStorage) -> eyre::Result<()> {
    match command {
        KvCommand::Get { key } => {
            let value = storage
                .read_value(&key)
                .await
                .ok_or_else(|| eyre::eyre!("no value stored under {key:?}"))?;
            print_json(&value)?;
        }
        KvCommand::Set { key, value } => {
            let value: Value =
                serde_json::from_str(&value).wrap_err("value must be valid JSON")?;
            let report = storage
                .write_with(&key, &value, WriteOptions::default())
                .await
                .map_err(write_failure)?;
            println!(
                "stored {key:?} after {} attempt(s){}",
                report.attempts,
                if report.backup_taken { ", previous value backed up" } else { "" }
            );
        }
        KvCommand::Stats => {
            let stats = storage.stats().await?;
            println!("used:    {} bytes", stats.bytes_used);
            println!("quota:   {} bytes", stats.bytes_total);
            println!("percent: {:.1}%", stats.percent_used);
            if storage.is_storage_low().await {
                println!("warning: storage is running low");
            }
        }
        KvCommand::Export { output } => {
            let entries = storage.export_all().await?;
            match output {
                Some(path) => {
                    let json = serde_json::to_vec_pretty(&entries)?;
                    std::fs::write(&path, json)
                        .wrap_err_with(|| format!("writing {}", path.display()))?;
                    eprintln!("exported {} keys to {}", entries.len(), path.display());
                }
                None => print_json(&entries)?,
            }
        }
        KvCommand::Import { file } => {
            let raw =
                std::fs::read(&file).wrap_err_with(|| format!("reading {}", file.display()))?;
            let entries: Map<String, Value> = serde_json::from_slice(&raw)
                .wrap_err_with(|| format!("{} is not a JSON object", file.display()))?;
            let count = storage.import_all(entries).await.map_err(write_failure)?;
            println!("imported {count} keys");
        }
    }
    Ok(())
}
