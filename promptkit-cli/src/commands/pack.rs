//! `promptkit pack`: export, import and inspect `.pmtpk` files.

use std::path::{Path, PathBuf};

use clap::Subcommand;
use eyre::WrapErr;
use promptkit_core::pack::{
    classify, export_pack, import_pack, PackHeader, PackKind, PackPayload, PackPrompt,
    PasswordPolicy, DEFAULT_SOURCE,
};
use promptkit_core::SafeStorage;
use serde::Deserialize;

use super::print_json;
use super::prompts::{append, PromptRecord};

#[derive(Subcommand)]
pub enum PackCommand {
    /// Build a pack from a JSON list of prompts.
    Export {
        /// JSON file holding an array of strings or prompt objects.
        input: PathBuf,
        /// Pack file to write.
        #[arg(short, long)]
        output: PathBuf,
        /// Assistant the prompts were collected from.
        #[arg(long, default_value = DEFAULT_SOURCE)]
        source: String,
        /// Pack title.
        #[arg(long)]
        title: Option<String>,
        /// Encrypt with this password (1-14 letters or digits).
        #[arg(long, env = "PROMPTKIT_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Decode a pack and print its payload.
    Import {
        /// Pack file to read.
        file: PathBuf,
        /// Password for encrypted packs.
        #[arg(long, env = "PROMPTKIT_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        /// Also append the prompts to the stored collection.
        #[arg(long)]
        save: bool,
    },

    /// Print container kind, version and hash without decoding.
    Inspect {
        /// Pack file to read.
        file: PathBuf,
    },
}

/// Accepted shapes of an export input entry.
#[derive(Deserialize)]
#[serde(untagged)]
enum PromptInput {
    Text(String),
    Prompt(PackPrompt),
}

impl From<PromptInput> for PackPrompt {
    fn from(input: PromptInput) -> Self {
        match input {
            PromptInput::Text(text) => Self::new(text),
            PromptInput::Prompt(prompt) => prompt,
        }
    }
}

fn read_prompts(input: &Path) -> eyre::Result<Vec<PackPrompt>> {
    let raw = std::fs::read(input).wrap_err_with(|| format!("reading {}", input.display()))?;
    let entries: Vec<PromptInput> = serde_json::from_slice(&raw)
        .wrap_err_with(|| format!("{} is not a JSON array of prompts", input.display()))?;
    Ok(entries.into_iter().map(PackPrompt::from).collect())
}

fn check_password(password: Option<&str>) -> eyre::Result<()> {
    if let Some(password) = password {
        PasswordPolicy::default()
            .check(password)
            .map_err(|message| eyre::eyre!(message))?;
    }
    Ok(())
}

fn export(
    input: &Path,
    output: &Path,
    source: String,
    title: Option<String>,
    password: Option<&str>,
) -> eyre::Result<()> {
    check_password(password)?;
    let payload = PackPayload::new(source, title, read_prompts(input)?);
    payload.validate().map_err(|message| eyre::eyre!(message))?;

    let bytes = export_pack(&payload, password).wrap_err("serializing payload")?;
    std::fs::write(output, &bytes).wrap_err_with(|| format!("writing {}", output.display()))?;
    println!(
        "wrote {} prompts to {} ({} bytes, {})",
        payload.prompts.len(),
        output.display(),
        bytes.len(),
        classify(&bytes)
    );
    Ok(())
}

fn inspect(file: &Path) -> eyre::Result<()> {
    let bytes = std::fs::read(file).wrap_err_with(|| format!("reading {}", file.display()))?;
    if classify(&bytes) == PackKind::Unknown {
        println!("kind:    unknown (not a pack container; may be legacy JSON)");
        println!("size:    {} bytes", bytes.len());
        return Ok(());
    }

    let header = PackHeader::parse(&bytes)?;
    println!("kind:    {}", header.kind);
    println!("version: {}", header.version);
    println!("hash:    {}", header.hash_hex());
    if let Some(salt) = header.salt {
        println!("salt:    {}", hex::encode(salt));
    }
    if let Some(nonce) = header.nonce {
        println!("nonce:   {}", hex::encode(nonce));
    }
    println!("size:    {} bytes", bytes.len());
    Ok(())
}

pub async fn run<F>(command: PackCommand, open_storage: F) -> eyre::Result<()>
where
    F: FnOnce() -> eyre::Result<SafeStorage>,
{
    match command {
        PackCommand::Export {
            input,
            output,
            source,
            title,
            password,
        } => export(&input, &output, source, title, password.as_deref()),
        PackCommand::Import {
            file,
            password,
            save,
        } => {
            let bytes =
                std::fs::read(&file).wrap_err_with(|| format!("reading {}", file.display()))?;
            let payload = import_pack(&bytes, || password)?;
            if save {
                let records = payload
                    .prompts
                    .iter()
                    .cloned()
                    .map(|prompt| PromptRecord::from_pack(prompt, &payload.source))
                    .collect();
                let total = append(&open_storage()?, records).await?;
                eprintln!("saved {} prompts ({total} total)", payload.prompts.len());
            }
            print_json(&payload)
        }
        PackCommand::Inspect { file } => inspect(&file),
    }
}
