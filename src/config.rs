use std::path::PathBuf;
use std::time::Duration;

/// Context keys whose values are masked by redaction when the key
/// (lower-cased) contains any of these as a substring.
pub const DEFAULT_REDACT_KEYS: &[&str] = &[
    "password",
    "token",
    "authorization",
    "cookie",
    "secret",
    "key",
    "api_key",
    "access_token",
    "refresh_token",
    "jwt",
    "bearer",
    "x-api-key",
];

/// Base URL of the remote document index, e.g. `http://127.0.0.1:9200`.
pub const MARKETLOG_REMOTE_HOST_ENV: &str = "MARKETLOG_REMOTE_HOST";

/// Index name prefix; the dated partition suffix is appended per write.
pub const MARKETLOG_INDEX_PREFIX_ENV: &str = "MARKETLOG_INDEX_PREFIX";

/// Set to "false"/"0" to disable the remote sink entirely.
pub const MARKETLOG_REMOTE_ENABLED_ENV: &str = "MARKETLOG_REMOTE_ENABLED";

/// Directory that receives the date-named local log files.
pub const MARKETLOG_LOCAL_DIR_ENV: &str = "MARKETLOG_LOCAL_DIR";

/// Logical application name stamped on every document.
pub const MARKETLOG_APP_ENV: &str = "MARKETLOG_APP";

/// Deployment environment name ("production", "staging", ...).
pub const MARKETLOG_ENV_ENV: &str = "MARKETLOG_ENV";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Pipeline configuration, constructed once at process start and shared
/// by reference with the writer, the remote store and the query service.
///
/// There are no ambient lookups inside the core: every policy decision
/// reads this struct.
#[derive(Clone, Debug)]
pub struct Config {
    /// Logical application name stamped on every document.
    pub app: String,
    /// Deployment environment, also embedded in each local log line.
    pub env: String,

    /// Gates all remote attempts; `false` means local-only operation.
    pub remote_enabled: bool,
    /// Base URL of the remote document index.
    pub remote_host: String,
    /// Index name prefix; a `-YYYY.MM.DD` partition suffix is appended.
    pub index_prefix: String,
    /// Timeout for remote writes and searches.
    pub remote_timeout: Duration,
    /// Shorter timeout for the opportunistic health probe on the read path.
    pub probe_timeout: Duration,

    /// Gates whether the local file append happens at all.
    pub local_enabled: bool,
    /// Directory holding the date-named local log files.
    pub local_dir: PathBuf,
    /// File name prefix, e.g. `marketplace` -> `marketplace-2026-08-30.log`.
    pub file_prefix: String,

    /// Forces logging regardless of level/status gating.
    pub log_all: bool,
    /// Enables logging of 2xx responses (errors are always logged).
    pub log_successes: bool,

    /// Substrings that trigger value masking in caller context.
    pub redact_keys: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app: "marketplace".to_string(),
            env: "production".to_string(),
            remote_enabled: true,
            remote_host: "http://localhost:9200".to_string(),
            index_prefix: "marketplace-logs".to_string(),
            remote_timeout: Duration::from_secs(3),
            probe_timeout: Duration::from_secs(1),
            local_enabled: true,
            local_dir: PathBuf::from("storage/logs"),
            file_prefix: "marketplace".to_string(),
            log_all: false,
            log_successes: false,
            redact_keys: DEFAULT_REDACT_KEYS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Config {
    /// Build a configuration from environment variables, using the
    /// defaults above for anything unset.
    pub fn from_env() -> Self {
        let defaults = Config::default();
        Config {
            app: env_or(MARKETLOG_APP_ENV, &defaults.app),
            env: env_or(MARKETLOG_ENV_ENV, &defaults.env),
            remote_enabled: !matches!(
                env_or(MARKETLOG_REMOTE_ENABLED_ENV, "true").as_str(),
                "false" | "0" | "no"
            ),
            remote_host: env_or(MARKETLOG_REMOTE_HOST_ENV, &defaults.remote_host),
            index_prefix: env_or(MARKETLOG_INDEX_PREFIX_ENV, &defaults.index_prefix),
            local_dir: PathBuf::from(env_or(
                MARKETLOG_LOCAL_DIR_ENV,
                &defaults.local_dir.to_string_lossy(),
            )),
            ..defaults
        }
    }
}
