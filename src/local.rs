use chrono::Utc;
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use crate::config::Config;
use crate::document::LogLevel;

/// Message prefix tagging a line whose remote write succeeded.
pub const REMOTE_PREFIX: &str = "[REMOTE]";
/// Message prefix tagging a line that only exists locally.
pub const FALLBACK_PREFIX: &str = "[REMOTE-FALLBACK]";

/// Appends one human-readable line per event to a date-named log file.
///
/// Line shape: `[<rfc3339>] <env>.<LEVEL>: <message> <json>` where the
/// JSON suffix carries the full document. Appends are single `write_all`
/// calls of one line, which is atomic enough for concurrent writers on
/// the platforms this runs on; no extra locking here.
#[derive(Clone)]
pub struct LocalSink {
    config: Arc<Config>,
}

impl LocalSink {
    pub fn new(config: Arc<Config>) -> Self {
        LocalSink { config }
    }

    /// Path of today's log file, e.g. `storage/logs/marketplace-2026-08-30.log`.
    pub fn current_path(&self) -> PathBuf {
        self.config.local_dir.join(format!(
            "{}-{}.log",
            self.config.file_prefix,
            Utc::now().format("%Y-%m-%d")
        ))
    }

    /// Append one event line.
    ///
    /// `remote_ok` controls the message prefix: `Some(true)` tags the
    /// line `[REMOTE]`, `Some(false)` tags it `[REMOTE-FALLBACK]`, and
    /// `None` writes the message bare (used by the emergency path).
    pub fn append(
        &self,
        level: LogLevel,
        message: &str,
        context: &Value,
        remote_ok: Option<bool>,
    ) -> io::Result<()> {
        fs::create_dir_all(&self.config.local_dir)?;

        let prefixed = match remote_ok {
            Some(true) => format!("{REMOTE_PREFIX} {message}"),
            Some(false) => format!("{FALLBACK_PREFIX} {message}"),
            None => message.to_string(),
        };
        let line = format!(
            "[{}] {}.{}: {} {}\n",
            Utc::now().to_rfc3339(),
            self.config.env,
            level.as_str().to_uppercase(),
            prefixed,
            context,
        );

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.current_path())?;
        file.write_all(line.as_bytes())
    }

    /// Log files in the sink directory, newest first by modification
    /// time. Only files carrying the configured prefix and a `.log`
    /// extension are considered.
    pub fn files_newest_first(&self) -> io::Result<Vec<PathBuf>> {
        let mut files: Vec<(PathBuf, SystemTime)> = Vec::new();
        let entries = match fs::read_dir(&self.config.local_dir) {
            Ok(entries) => entries,
            // A missing directory just means nothing was written yet.
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err),
        };

        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            let is_log = path.extension().is_some_and(|ext| ext == "log")
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(&self.config.file_prefix));
            if !is_log {
                continue;
            }
            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            files.push((path, modified));
        }

        files.sort_by(|a, b| b.1.cmp(&a.1));
        Ok(files.into_iter().map(|(path, _)| path).collect())
    }
}
