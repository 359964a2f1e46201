use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::document::{ContextMap, LogLevel};

/// Unified read-side record served to the operator dashboard.
///
/// The shape is identical whether the record came from the remote index
/// or was reconstructed from a local log line.
#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    /// Remote document id, or a content hash of the raw local line.
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub level_label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_label: Option<String>,
    pub message: String,
    pub context: ContextMap,
    /// Whether the originating write reached the remote sink. Only known
    /// for records recovered from local lines.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_ok: Option<bool>,
}

impl LogRecord {
    /// Fill the fixed-locale display labels from the raw values.
    pub fn with_labels(mut self) -> Self {
        self.level_label = self.level.label().to_string();
        self.domain_label = self.domain.as_deref().map(humanize);
        self.action_label = self.action.as_deref().map(humanize);
        self
    }
}

/// `user_management` -> `User management`. Fixed locale, the dashboard
/// this feeds is single-language.
pub fn humanize(raw: &str) -> String {
    let spaced = raw.replace(['_', '-'], " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
