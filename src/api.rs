use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use crate::config::Config;
use crate::document::{ContextMap, LogLevel};
use crate::query::{FilterCatalog, LogQueryService, QueryError};
use crate::record::LogRecord;
use crate::store::{LogQuery, RemoteStore, DEFAULT_QUERY_LIMIT};
use crate::writer::LogWriter;

/// Shared state behind the dashboard routes.
#[derive(Clone)]
pub struct ApiState {
    pub query: LogQueryService,
    pub catalog: FilterCatalog,
    pub writer: LogWriter,
}

impl ApiState {
    pub fn new(config: Arc<Config>, remote: Arc<dyn RemoteStore>) -> Self {
        ApiState {
            query: LogQueryService::new(Arc::clone(&config), Arc::clone(&remote)),
            catalog: FilterCatalog::new(Arc::clone(&config), Arc::clone(&remote)),
            writer: LogWriter::new(config, remote),
        }
    }
}

/// Operator dashboard read surface: the log feed, the filter catalog and
/// a smoke-test write endpoint.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/logs", get(get_logs))
        .route("/filters", get(get_filters))
        .route("/test", get(write_test_entry))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct LogsParams {
    level: Option<String>,
    domain: Option<String>,
    action: Option<String>,
    search: Option<String>,
    since: Option<DateTime<Utc>>,
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    DEFAULT_QUERY_LIMIT
}

#[derive(Debug, Serialize)]
struct LogsResponse {
    logs: Vec<LogRecord>,
    count: usize,
    fallback_mode: bool,
}

#[derive(Debug, Serialize)]
struct FiltersResponse {
    levels: Vec<String>,
    domains: Vec<String>,
    actions: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TestParams {
    level: Option<String>,
}

#[derive(Debug, Serialize)]
struct TestResponse {
    logged: bool,
    level: String,
    message: String,
}

/// Read-path failures become a structured 500; this is the one place an
/// error in the pipeline is user-visible, and only to operators.
enum ApiError {
    BadRequest(String),
    Internal(String),
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m),
        };
        (status, Json(json!({"error": message}))).into_response()
    }
}

/// "all" and the empty string both mean "no filter" on every dimension.
fn dimension(raw: Option<String>) -> Option<String> {
    raw.filter(|v| !v.is_empty() && v != "all")
}

async fn get_logs(
    State(state): State<ApiState>,
    Query(params): Query<LogsParams>,
) -> Result<Json<LogsResponse>, ApiError> {
    let level = match dimension(params.level) {
        Some(raw) => Some(
            raw.parse::<LogLevel>()
                .map_err(|e| ApiError::BadRequest(e.to_string()))?,
        ),
        None => None,
    };

    let query = LogQuery {
        level,
        domain: dimension(params.domain),
        action: dimension(params.action),
        search: params.search.filter(|s| !s.is_empty()),
        since: params.since,
        limit: params.limit.clamp(1, 1000),
    };

    let outcome = state.query.query(&query).await?;
    Ok(Json(LogsResponse {
        count: outcome.records.len(),
        logs: outcome.records,
        fallback_mode: outcome.fallback_mode,
    }))
}

async fn get_filters(State(state): State<ApiState>) -> Result<Json<FiltersResponse>, ApiError> {
    let set = state.catalog.available_filters().await?;
    Ok(Json(FiltersResponse {
        levels: set.levels,
        domains: set.domains,
        actions: set.actions,
    }))
}

/// Write one synthetic entry so operators can verify the pipeline end to
/// end. Unknown level strings fall back to `info`.
async fn write_test_entry(
    State(state): State<ApiState>,
    Query(params): Query<TestParams>,
) -> Json<TestResponse> {
    let level = params
        .level
        .as_deref()
        .and_then(|raw| raw.parse::<LogLevel>().ok())
        .unwrap_or(LogLevel::Info);
    let message = format!("Test log entry at {level} level");

    let mut context = ContextMap::new();
    context.insert("domain".into(), json!("system"));
    context.insert("action".into(), json!("log_test"));
    context.insert("force".into(), json!(true));
    state.writer.log(level, &message, context).await;

    Json(TestResponse {
        logged: true,
        level: level.as_str().to_string(),
        message,
    })
}
