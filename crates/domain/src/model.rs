//! Domain models and value objects

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::OnceLock;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::lenient;

/// A comment normalized from any of the source payload shapes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalComment {
    /// Platform-assigned comment ID
    pub comment_id: String,
    /// Author ID, used as the dedupe key. Equals `comment_id` when the
    /// source omitted the author, which makes dedupe a no-op for the record.
    pub author_id: String,
    /// Author display name
    pub author_name: String,
    /// Author avatar URL
    pub avatar_url: String,
    /// Comment body
    pub text: String,
    /// Author reputation tier
    pub level: u32,
    /// Source-reported creation time (seconds since epoch)
    pub created_at: i64,
    /// Like count
    pub likes: u64,
}

/// Rules applied by the filter pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Keep comments containing any of these (empty = keep all)
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Inclusive minimum author level (0 = no threshold)
    #[serde(default)]
    pub min_level: u32,
    /// Keep only the first comment of each author
    #[serde(default = "default_true")]
    pub dedupe_by_author: bool,
}

fn default_true() -> bool {
    true
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            keywords: vec![],
            min_level: 0,
            dedupe_by_author: true,
        }
    }
}

impl FilterConfig {
    /// Split operator keyword input on commas (ASCII or full-width) and whitespace
    pub fn parse_keywords(input: &str) -> Vec<String> {
        static SEPARATORS: OnceLock<Regex> = OnceLock::new();
        let separators =
            SEPARATORS.get_or_init(|| Regex::new(r"[,，\s]+").expect("valid separator pattern"));

        separators
            .split(input)
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(String::from)
            .collect()
    }
}

/// A committed draw result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Winner {
    /// The winning comment
    #[serde(flatten)]
    pub comment: CanonicalComment,
    /// When the winner was selected
    #[serde(with = "time::serde::rfc3339")]
    pub won_at: OffsetDateTime,
}

/// Severity of a progress log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Info => "info",
            LogLevel::Success => "success",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
        }
    }
}

/// One line of the operator-visible progress stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub level: LogLevel,
    pub message: String,
}

/// Response envelope shared by the lookup and page endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    pub code: i64,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

/// Payload of the identifier lookup
///
/// Decoding never fails: error responses carry unrelated `data` objects,
/// and the caller decides what a missing ID means.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoView {
    /// Internal object ID the comment endpoint is keyed by
    pub object_id: Option<u64>,
}

impl VideoView {
    const ID_KEYS: [&'static str; 3] = ["aid", "objectId", "object_id"];
}

impl<'de> Deserialize<'de> for VideoView {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        let object_id = Self::ID_KEYS
            .iter()
            .find_map(|key| value.get(key))
            .and_then(lenient::count)
            .filter(|id| *id > 0);
        Ok(Self { object_id })
    }
}

/// Payload of one comment page
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReplyPage {
    /// Raw comment objects; normalized later
    #[serde(default)]
    pub replies: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub page: Option<PageCounter>,
    #[serde(default)]
    pub cursor: Option<ReplyCursor>,
}

/// Total-count metadata returned with a page
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageCounter {
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub size: u64,
}

/// Cursor metadata returned with a page
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ReplyCursor {
    #[serde(default)]
    pub is_end: bool,
}
