//! `promptkit prompts`: the stored prompt collection.

use clap::Subcommand;
use promptkit_core::pack::{PackPrompt, DEFAULT_SOURCE};
use promptkit_core::SafeStorage;
use serde::{Deserialize, Serialize};

use super::{print_json, write_failure};

/// Storage key of the prompt collection.
pub const PROMPTS_KEY: &str = "prompts";

#[derive(Subcommand)]
pub enum PromptsCommand {
    /// Append a prompt to the collection.
    Add {
        /// Prompt text.
        text: String,
        /// Assistant the prompt belongs to.
        #[arg(long, default_value = DEFAULT_SOURCE)]
        source: String,
        /// Page the prompt was captured on.
        #[arg(long)]
        url: Option<String>,
    },

    /// Print the collection as JSON.
    List,
}

/// A prompt as kept in storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptRecord {
    pub id: String,
    pub text: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub created_at: i64,
}

impl PromptRecord {
    pub fn new(text: String, source: String, url: Option<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            text,
            source,
            url,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn from_pack(prompt: PackPrompt, source: &str) -> Self {
        let mut record = Self::new(prompt.text, source.to_string(), prompt.url);
        if let Some(created_at) = prompt.created_at {
            record.created_at = created_at;
        }
        record
    }
}

impl From<PromptRecord> for PackPrompt {
    fn from(record: PromptRecord) -> Self {
        Self {
            text: record.text,
            url: record.url,
            created_at: Some(record.created_at),
        }
    }
}

/// Appends `records` to the collection in one atomic update.
///
/// Returns the collection size afterwards.
pub async fn append(storage: &SafeStorage, records: Vec<PromptRecord>) -> eyre::Result<usize> {
    let prompts = storage
        .atomic_update(PROMPTS_KEY, |current: Option<Vec<PromptRecord>>| async move {
            let mut prompts = current.unwrap_or_default();
            prompts.extend(records);
            prompts
        })
        .await
        .map_err(write_failure)?;
    Ok(prompts.len())
}

pub async fn run(command: PromptsCommand, storage: &SafeStorage) -> eyre::Result<()> {
    match command {
        PromptsCommand::Add { text, source, url } => {
            if text.trim().is_empty() {
                eyre::bail!("prompt text is empty");
            }
            let total = append(storage, vec![PromptRecord::new(text, source, url)]).await?;
            println!("stored prompt ({total} total)");
        }
        PromptsCommand::List => {
            let prompts: Vec<PromptRecord> = storage.read(PROMPTS_KEY).await.unwrap_or_default();
            print_json(&prompts)?;
        }
    }
    Ok(())
}
