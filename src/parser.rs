use chrono::{DateTime, Utc};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::document::{ContextMap, LogLevel};
use crate::local::{FALLBACK_PREFIX, REMOTE_PREFIX};
use crate::record::LogRecord;

/// Parse one local log line back into the unified record shape.
///
/// Expected shape: `[<timestamp>] <env>.<LEVEL>: <message> <json>`.
/// Anything that doesn't match returns `None` and the caller skips the
/// line. The JSON suffix starts at the earliest `{` from which the rest
/// of the line parses as one object; the attached document nests objects
/// (`"context":{...}`), so splitting at the last `{` would land inside
/// it. A line with no parseable suffix yields an empty context rather
/// than a skip, since the line itself is still a valid event.
pub fn parse_line(raw: &str) -> Option<LogRecord> {
    let rest = raw.strip_prefix('[')?;
    let close = rest.find(']')?;
    let timestamp = DateTime::parse_from_rfc3339(&rest[..close])
        .ok()?
        .with_timezone(&Utc);

    let rest = rest[close + 1..].trim_start();
    let colon = rest.find(':')?;
    let (env_level, body) = rest.split_at(colon);
    let (_env, level_word) = env_level.rsplit_once('.')?;
    let level: LogLevel = level_word.to_lowercase().parse().ok()?;
    let body = body[1..].trim();

    let (message, document) = split_json_suffix(body);

    let (message, remote_ok) = if let Some(stripped) = message.strip_prefix(REMOTE_PREFIX) {
        (stripped.trim_start(), Some(true))
    } else if let Some(stripped) = message.strip_prefix(FALLBACK_PREFIX) {
        (stripped.trim_start(), Some(false))
    } else {
        (message, None)
    };

    let domain = field_string(&document, "domain");
    let action = field_string(&document, "action");
    let context = match document.get("context") {
        Some(Value::Object(ctx)) => ctx.clone(),
        // Foreign line without our document shape: expose the whole
        // suffix as context so nothing useful is dropped.
        _ => document,
    };

    Some(
        LogRecord {
            id: line_id(raw),
            timestamp,
            level,
            level_label: String::new(),
            domain,
            domain_label: None,
            action,
            action_label: None,
            message: message.to_string(),
            context,
            remote_ok,
        }
        .with_labels(),
    )
}

/// Split the message body from its trailing JSON object. Candidate
/// split points are tried left to right; `serde_json::from_str` rejects
/// trailing garbage, so a `{` inside the message text only wins when the
/// remainder really is the whole suffix.
fn split_json_suffix(body: &str) -> (&str, ContextMap) {
    for (idx, _) in body.match_indices('{') {
        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&body[idx..]) {
            return (body[..idx].trim_end(), map);
        }
    }
    (body, ContextMap::new())
}

/// Stable content hash of the raw line, used as the record id. Stable
/// across re-reads of the same file, not globally unique across files.
fn line_id(raw: &str) -> String {
    let digest = Sha256::digest(raw.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

fn field_string(map: &ContextMap, key: &str) -> Option<String> {
    map.get(key)
        .and_then(Value::as_str)
        .map(|s| s.to_string())
}
