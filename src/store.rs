use crate::document::{LogDocument, LogLevel};
use crate::record::LogRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::error::Error;

/// Default result cap for log feed queries.
pub const DEFAULT_QUERY_LIMIT: usize = 100;

/// Filter parameters for the log feed, shared by the remote search and
/// the local file scan so both paths apply identical semantics.
#[derive(Debug, Clone, Default)]
pub struct LogQuery {
    /// Exact level match; `None` means "all".
    pub level: Option<LogLevel>,
    /// Exact domain match; `None` means "all".
    pub domain: Option<String>,
    /// Exact action match; `None` means "all".
    pub action: Option<String>,
    /// Free-text needle matched against message and context.
    pub search: Option<String>,
    /// Lower timestamp bound, inclusive.
    pub since: Option<DateTime<Utc>>,
    /// Maximum number of records returned.
    pub limit: usize,
}

impl LogQuery {
    pub fn with_limit(limit: usize) -> Self {
        LogQuery {
            limit,
            ..LogQuery::default()
        }
    }
}

/// Distinct level/domain/action values observed in the stored logs.
#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    pub levels: Vec<String>,
    pub domains: Vec<String>,
    pub actions: Vec<String>,
}

/// Remote, date-partitioned document index used as the primary log store.
///
/// Implementations transport documents to a concrete backend over the
/// network. The write side is deliberately infallible at the type level:
/// `send` reports success as a boolean because a remote failure must only
/// ever demote the write to the local sink, never surface to the caller.
/// The read side returns errors so the query service can decide to fall
/// back to local files.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Probe the backend's health endpoint.
    ///
    /// Returns `true` only when the probe succeeds and the backend
    /// reports an acceptable status. Timeouts, transport errors and
    /// non-success responses all yield `false`; this never errors.
    async fn is_healthy(&self) -> bool;

    /// Write one document to the current dated partition.
    ///
    /// Returns `true` iff the backend acknowledged the write. Disabled
    /// configuration, an unhealthy backend and any transport error all
    /// yield `false` without propagating.
    async fn send(&self, document: &LogDocument) -> bool;

    /// Structured search over the stored documents, newest first,
    /// bounded by `query.limit`.
    async fn search(&self, query: &LogQuery)
        -> Result<Vec<LogRecord>, Box<dyn Error + Send + Sync>>;

    /// One aggregation round-trip collecting the distinct filter values.
    async fn aggregate_filters(&self) -> Result<FilterSet, Box<dyn Error + Send + Sync>>;
}
