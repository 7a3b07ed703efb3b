//! Schema-versioned JSON payload framed inside pack containers.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::format::SCHEMA_VERSION;

/// Source used when a payload does not name one.
pub const DEFAULT_SOURCE: &str = "chatgpt";

/// A single exported prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackPrompt {
    /// Prompt text.
    pub text: String,
    /// Page the prompt was captured on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Creation time in milliseconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
}

impl PackPrompt {
    /// Creates a prompt with only its text set.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            url: None,
            created_at: None,
        }
    }
}

/// The logical content of a pack.
///
/// ```json
/// {"schemaVersion":"1.0","source":"claude","title":"Work",
///  "exportedAt":"…","prompts":[{"text":"…"}]}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackPayload {
    /// Payload schema version; older exports used the key `version`.
    #[serde(alias = "version", default = "default_schema_version")]
    pub schema_version: String,
    /// Assistant the prompts were collected from.
    #[serde(default = "default_source")]
    pub source: String,
    /// Display title of the pack.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Export timestamp.
    #[serde(deserialize_with = "deserialize_exported_at", default = "Utc::now")]
    pub exported_at: DateTime<Utc>,
    /// Exported prompts.
    pub prompts: Vec<PackPrompt>,
}

impl PackPayload {
    /// Creates a payload stamped with the current schema version and time.
    pub fn new(source: impl Into<String>, title: Option<String>, prompts: Vec<PackPrompt>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            source: source.into(),
            title,
            exported_at: Utc::now(),
            prompts,
        }
    }

    /// Checks the payload shape after parsing.
    ///
    /// # Errors
    ///
    /// Returns a description of the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(index) = self.prompts.iter().position(|p| p.text.trim().is_empty()) {
            return Err(format!("prompt {index} has empty text"));
        }
        if self.source.trim().is_empty() {
            return Err("source is empty".to_string());
        }
        Ok(())
    }
}

fn default_schema_version() -> String {
    SCHEMA_VERSION.to_string()
}

fn default_source() -> String {
    DEFAULT_SOURCE.to_string()
}

/// Accepts RFC 3339 strings and legacy millisecond timestamps.
fn deserialize_exported_at<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Timestamp {
        Text(DateTime<Utc>),
        Millis(i64),
    }

    match Timestamp::deserialize(deserializer)? {
        Timestamp::Text(at) => Ok(at),
        Timestamp::Millis(millis) => Utc
            .timestamp_millis_opt(millis)
            .single()
            .ok_or_else(|| serde::de::Error::custom(format!("timestamp {millis} out of range"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_serializes_camel_case() {
        let payload = PackPayload::new(
            "claude",
            Some("Work".to_string()),
            vec![PackPrompt::new("Summarize this")],
        );
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["schemaVersion"], SCHEMA_VERSION);
        assert_eq!(json["source"], "claude");
        assert_eq!(json["title"], "Work");
        assert!(json["exportedAt"].is_string());
        assert_eq!(json["prompts"][0]["text"], "Summarize this");
        assert!(json["prompts"][0].get("url").is_none());
    }

    #[test]
    fn test_legacy_payload_shape() {
        let json = r#"{
            "version": "1.0",
            "exportedAt": 1700000000000,
            "prompts": [{"text": "hi", "url": "https://chat.openai.com", "createdAt": 1}]
        }"#;
        let payload: PackPayload = serde_json::from_str(json).unwrap();
        assert_eq!(payload.schema_version, "1.0");
        assert_eq!(payload.source, DEFAULT_SOURCE);
        assert_eq!(payload.exported_at.timestamp_millis(), 1_700_000_000_000);
        assert_eq!(payload.prompts[0].created_at, Some(1));
        payload.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_empty_text() {
        let payload = PackPayload::new(
            "gemini",
            None,
            vec![PackPrompt::new("ok"), PackPrompt::new("   ")],
        );
        assert_eq!(payload.validate(), Err("prompt 1 has empty text".to_string()));
    }

    #[test]
    fn test_missing_prompts_is_rejected() {
        let result: Result<PackPayload, _> = serde_json::from_str(r#"{"source":"claude"}"#);
        assert!(result.is_err());
    }
}
