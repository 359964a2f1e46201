use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::Config;
use crate::redact::redact_map;

/// Free-form caller context. Callers are arbitrary and heterogeneous, so
/// this stays a dynamic string-keyed JSON map at the boundary.
pub type ContextMap = Map<String, Value>;

/// Reserved context keys consumed by the document builder; they never
/// appear inside the stored `context` field.
const RESERVED_KEYS: &[&str] = &["domain", "action", "exception", "http", "user", "force"];

/// Maximum stack frames kept on an exception sub-record.
const MAX_TRACE_FRAMES: usize = 10;

/// Severity of a log document.
///
/// Ordering matters only for the write-policy gate, not for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
    Alert,
    Emergency,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
            LogLevel::Critical => "critical",
            LogLevel::Alert => "alert",
            LogLevel::Emergency => "emergency",
        }
    }

    /// Fixed-locale display label served to the operator dashboard.
    pub fn label(&self) -> &'static str {
        match self {
            LogLevel::Debug => "Debug",
            LogLevel::Info => "Info",
            LogLevel::Warning => "Warning",
            LogLevel::Error => "Error",
            LogLevel::Critical => "Critical",
            LogLevel::Alert => "Alert",
            LogLevel::Emergency => "Emergency",
        }
    }

    /// True for the severities that are persisted even when no status
    /// code or override says otherwise.
    pub fn always_logged(&self) -> bool {
        matches!(
            self,
            LogLevel::Warning
                | LogLevel::Error
                | LogLevel::Critical
                | LogLevel::Alert
                | LogLevel::Emergency
        )
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = UnknownLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warning" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            "critical" => Ok(LogLevel::Critical),
            "alert" => Ok(LogLevel::Alert),
            "emergency" => Ok(LogLevel::Emergency),
            _ => Err(UnknownLevel(s.to_string())),
        }
    }
}

#[derive(thiserror::Error, Debug)]
#[error("unknown log level: {0}")]
pub struct UnknownLevel(pub String);

/// HTTP sub-record describing the request that produced the document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HttpInfo {
    pub method: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    pub request_id: String,
}

/// Identified user, present only when the ambient request carried an
/// identifying header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// One captured stack frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TraceFrame {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
}

/// Exception sub-record attached when the caller supplied an error in
/// context under the `exception` key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExceptionInfo {
    pub class: String,
    #[serde(default)]
    pub code: Value,
    #[serde(default)]
    pub file: String,
    #[serde(default)]
    pub trace: Vec<TraceFrame>,
}

impl ExceptionInfo {
    /// Build an exception record from a Rust error value, walking its
    /// source chain into trace frames.
    pub fn from_error<E: std::error::Error + ?Sized>(err: &E) -> Self {
        let mut trace = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            if trace.len() >= MAX_TRACE_FRAMES {
                break;
            }
            trace.push(TraceFrame {
                file: None,
                line: None,
                function: Some(cause.to_string()),
                class: None,
            });
            source = cause.source();
        }
        ExceptionInfo {
            class: std::any::type_name::<E>().to_string(),
            code: Value::Null,
            file: err.to_string(),
            trace,
        }
    }

    /// Place this record into a context map under the reserved key.
    pub fn into_context_value(self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Canonical log record: written once, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogDocument {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub app: String,
    pub env: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http: Option<HttpInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception: Option<ExceptionInfo>,
    pub context: ContextMap,
}

/// Ambient inbound-request data, threaded in explicitly by the caller
/// instead of read from any global.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub method: String,
    pub path: String,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    /// Inbound correlation header, if the upstream set one.
    pub request_id: Option<String>,
    /// Numeric user id header, when the request was authenticated.
    pub user_id: Option<i64>,
    pub user_role: Option<String>,
}

static REQUEST_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Fresh per-document token used when no inbound request id exists.
/// Two documents for the same underlying request get different tokens
/// unless the upstream header was set; that matches the write contract.
fn generate_request_id() -> String {
    let seq = REQUEST_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    let now = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let digest = Sha256::digest(format!("{now}:{seq}").as_bytes());
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    hex[..32].to_string()
}

/// PHP-style falsiness used to drop empty context entries.
fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Number(n) => n.as_f64() == Some(0.0),
    }
}

/// Assembles normalized [`LogDocument`]s from raw log calls.
pub struct DocumentBuilder<'a> {
    config: &'a Config,
}

impl<'a> DocumentBuilder<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Build one document from a log call plus optional ambient request.
    ///
    /// Reserved keys (`domain`, `action`, `exception`, `http`, `user`,
    /// `force`) are pulled out of `context`; the remainder is cleaned of
    /// falsy entries and passed through redaction.
    pub fn build(
        &self,
        level: LogLevel,
        message: &str,
        mut context: ContextMap,
        request: Option<&RequestContext>,
    ) -> LogDocument {
        let domain = take_string(&mut context, "domain");
        let action = take_string(&mut context, "action");

        let exception = context
            .remove("exception")
            .and_then(|raw| serde_json::from_value::<ExceptionInfo>(raw).ok())
            .map(|mut exc| {
                exc.trace.truncate(MAX_TRACE_FRAMES);
                exc
            });

        let status = context
            .get("http")
            .and_then(|h| h.get("status"))
            .and_then(Value::as_u64)
            .map(|s| s as u16);

        for key in RESERVED_KEYS {
            context.remove(*key);
        }
        context.retain(|_, v| !is_falsy(v));
        let context = redact_map(&context, &self.config.redact_keys);

        let http = request.map(|req| HttpInfo {
            method: req.method.clone(),
            path: req.path.clone(),
            status,
            ip: req.ip.clone(),
            user_agent: req.user_agent.clone(),
            request_id: req
                .request_id
                .clone()
                .unwrap_or_else(generate_request_id),
        });

        let user = request.and_then(|req| {
            req.user_id.map(|id| UserInfo {
                id,
                role: req.user_role.clone(),
            })
        });

        LogDocument {
            timestamp: Utc::now(),
            level,
            app: self.config.app.clone(),
            env: self.config.env.clone(),
            message: message.to_string(),
            domain,
            action,
            http,
            user,
            exception,
            context,
        }
    }
}

fn take_string(context: &mut ContextMap, key: &str) -> Option<String> {
    context
        .remove(key)
        .and_then(|v| v.as_str().map(|s| s.to_string()))
}
