use crate::document::LogDocument;
use crate::record::LogRecord;
use crate::store::{FilterSet, LogQuery, RemoteStore};
use async_trait::async_trait;
use std::error::Error;

/// A remote store that is never healthy and never accepts a write.
///
/// Useful for local-only deployments (every write falls through to the
/// local sink, every query runs in fallback mode) and for unit tests
/// that don't want network I/O.
#[derive(Clone, Default)]
pub struct NoopStore;

#[async_trait]
impl RemoteStore for NoopStore {
    async fn is_healthy(&self) -> bool {
        false
    }

    async fn send(&self, _document: &LogDocument) -> bool {
        false
    }

    async fn search(
        &self,
        _query: &LogQuery,
    ) -> Result<Vec<LogRecord>, Box<dyn Error + Send + Sync>> {
        Err("noop store has no documents".into())
    }

    async fn aggregate_filters(&self) -> Result<FilterSet, Box<dyn Error + Send + Sync>> {
        Err("noop store has no documents".into())
    }
}
