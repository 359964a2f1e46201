use serde_json::{json, Value};
use std::error::Error;
use std::sync::Arc;

use crate::config::Config;
use crate::document::{ContextMap, DocumentBuilder, LogLevel, RequestContext};
use crate::local::LocalSink;
use crate::store::RemoteStore;

/// Decide whether a call is persisted at all.
///
/// Pure function of (config, level, raw context). Precedence:
/// 1. explicit `force: false` suppresses; it is checked before the
///    global override, so a per-call opt-out defeats `log_all` (legacy
///    behavior, kept deliberately; see DESIGN.md),
/// 2. `log_all` or explicit `force: true` persists,
/// 3. an HTTP status >= 400 always persists,
/// 4. a 2xx status persists only when `log_successes` is on,
/// 5. otherwise warning-and-above severities persist.
pub fn should_log(config: &Config, level: LogLevel, context: &ContextMap) -> bool {
    let force = context.get("force").and_then(Value::as_bool);
    if force == Some(false) {
        return false;
    }
    if config.log_all || force == Some(true) {
        return true;
    }

    if let Some(status) = context
        .get("http")
        .and_then(|h| h.get("status"))
        .and_then(Value::as_u64)
    {
        if status >= 400 {
            return true;
        }
        if (200..300).contains(&status) {
            return config.log_successes;
        }
    }

    level.always_logged()
}

/// Write-path orchestrator: gates, builds, then fans out to the remote
/// store and the local sink.
///
/// Every public method is fire-and-forget: nothing here ever returns an
/// error or panics past the call boundary, so logging can never fail the
/// caller's primary request.
#[derive(Clone)]
pub struct LogWriter {
    config: Arc<Config>,
    remote: Arc<dyn RemoteStore>,
    local: LocalSink,
}

impl LogWriter {
    pub fn new(config: Arc<Config>, remote: Arc<dyn RemoteStore>) -> Self {
        let local = LocalSink::new(Arc::clone(&config));
        LogWriter {
            config,
            remote,
            local,
        }
    }

    pub async fn error(&self, message: &str, context: ContextMap) {
        self.log(LogLevel::Error, message, context).await;
    }

    pub async fn warning(&self, message: &str, context: ContextMap) {
        self.log(LogLevel::Warning, message, context).await;
    }

    pub async fn info(&self, message: &str, context: ContextMap) {
        self.log(LogLevel::Info, message, context).await;
    }

    /// Record one event without ambient request data.
    pub async fn log(&self, level: LogLevel, message: &str, context: ContextMap) {
        self.log_with_request(level, message, context, None).await;
    }

    /// Record one event, attaching http/user sub-records built from the
    /// inbound request.
    pub async fn log_with_request(
        &self,
        level: LogLevel,
        message: &str,
        context: ContextMap,
        request: Option<&RequestContext>,
    ) {
        if !should_log(&self.config, level, &context) {
            return;
        }
        if let Err(err) = self.write(level, message, context, request).await {
            self.emergency(level, message, err.as_ref());
        }
    }

    async fn write(
        &self,
        level: LogLevel,
        message: &str,
        context: ContextMap,
        request: Option<&RequestContext>,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let document = DocumentBuilder::new(&self.config).build(level, message, context, request);

        // Remote strictly before local, so the local line records the
        // actual remote outcome in its prefix.
        let remote_ok = if self.config.remote_enabled {
            self.remote.send(&document).await
        } else {
            false
        };

        if self.config.local_enabled {
            let attached = serde_json::to_value(&document)?;
            self.local
                .append(document.level, &document.message, &attached, Some(remote_ok))?;
        }
        Ok(())
    }

    /// Last-ditch write when the normal path failed. If even this append
    /// fails, the error is swallowed after a diagnostic trace event.
    fn emergency(&self, level: LogLevel, message: &str, err: &(dyn Error + Send + Sync)) {
        let context = json!({
            "original_level": level.as_str(),
            "original_message": message,
            "error": err.to_string(),
            "fallback_used": true,
        });
        if let Err(inner) = self.local.append(
            LogLevel::Emergency,
            "logging pipeline failure",
            &context,
            None,
        ) {
            tracing::error!(error = %inner, original = %err, "emergency log write failed");
        }
    }
}
