use std::collections::BTreeSet;
use std::fs;
use std::sync::Arc;

use crate::config::Config;
use crate::local::LocalSink;
use crate::parser::parse_line;
use crate::record::LogRecord;
use crate::store::{FilterSet, LogQuery, RemoteStore};

/// Most recent local files inspected by the fallback filter scan.
const FILTER_SCAN_FILES: usize = 3;
/// Most recent lines inspected per file by the fallback filter scan.
const FILTER_SCAN_LINES: usize = 1000;

/// Read-path error. Only the total failure of both the remote and the
/// local path surfaces; everything transient is handled by fallback.
#[derive(thiserror::Error, Debug)]
pub enum QueryError {
    #[error("failed to read local log files: {0}")]
    LocalRead(#[from] std::io::Error),
}

/// Query result plus the flag telling operators which store served it.
#[derive(Debug)]
pub struct QueryOutcome {
    pub records: Vec<LogRecord>,
    /// True when the remote store was unreachable and local files were
    /// scanned instead; results may be incomplete.
    pub fallback_mode: bool,
}

/// Serves the filtered log feed, preferring the remote store and falling
/// back to scanning local files with identical filter semantics.
#[derive(Clone)]
pub struct LogQueryService {
    remote: Arc<dyn RemoteStore>,
    local: LocalSink,
}

impl LogQueryService {
    pub fn new(config: Arc<Config>, remote: Arc<dyn RemoteStore>) -> Self {
        LogQueryService {
            remote,
            local: LocalSink::new(config),
        }
    }

    /// Fetch the newest records matching `query`, newest first.
    pub async fn query(&self, query: &LogQuery) -> Result<QueryOutcome, QueryError> {
        if self.remote.is_healthy().await {
            match self.remote.search(query).await {
                Ok(records) => {
                    return Ok(QueryOutcome {
                        records,
                        fallback_mode: false,
                    })
                }
                Err(err) => {
                    tracing::warn!(error = %err, "remote log search failed, scanning local files");
                }
            }
        }

        let records = self.scan_local(query)?;
        Ok(QueryOutcome {
            records,
            fallback_mode: true,
        })
    }

    /// Scan local files newest-first, lines in reverse, stopping once
    /// `limit` matches are collected. Reverse line order only
    /// approximates timestamp order across file boundaries, so the
    /// collected set is re-sorted before returning.
    fn scan_local(&self, query: &LogQuery) -> Result<Vec<LogRecord>, QueryError> {
        let mut records = Vec::new();

        'files: for path in self.local.files_newest_first()? {
            let content = match fs::read_to_string(&path) {
                Ok(content) => content,
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "skipping unreadable log file");
                    continue;
                }
            };

            for line in content.lines().rev() {
                if line.trim().is_empty() {
                    continue;
                }
                let Some(record) = parse_line(line) else {
                    continue;
                };
                if !matches_query(query, &record) {
                    continue;
                }
                records.push(record);
                if records.len() >= query.limit {
                    break 'files;
                }
            }
        }

        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(records)
    }
}

/// The five filter predicates, shared semantics with the remote search.
fn matches_query(query: &LogQuery, record: &LogRecord) -> bool {
    if let Some(level) = query.level {
        if record.level != level {
            return false;
        }
    }
    if let Some(domain) = &query.domain {
        if record.domain.as_deref() != Some(domain.as_str()) {
            return false;
        }
    }
    if let Some(action) = &query.action {
        if record.action.as_deref() != Some(action.as_str()) {
            return false;
        }
    }
    if let Some(since) = query.since {
        if record.timestamp < since {
            return false;
        }
    }
    if let Some(search) = query.search.as_deref().filter(|s| !s.is_empty()) {
        let needle = search.to_lowercase();
        let in_message = record.message.to_lowercase().contains(&needle);
        let in_context = serde_json::to_string(&record.context)
            .map(|s| s.to_lowercase().contains(&needle))
            .unwrap_or(false);
        if !in_message && !in_context {
            return false;
        }
    }
    true
}

/// Computes the distinct levels/domains/actions available as dashboard
/// filters, preferring one remote aggregation round-trip.
///
/// In fallback mode this is explicitly an approximation: only the most
/// recent [`FILTER_SCAN_FILES`] files and the last [`FILTER_SCAN_LINES`]
/// lines of each are inspected.
#[derive(Clone)]
pub struct FilterCatalog {
    remote: Arc<dyn RemoteStore>,
    local: LocalSink,
}

impl FilterCatalog {
    pub fn new(config: Arc<Config>, remote: Arc<dyn RemoteStore>) -> Self {
        FilterCatalog {
            remote,
            local: LocalSink::new(config),
        }
    }

    pub async fn available_filters(&self) -> Result<FilterSet, QueryError> {
        if self.remote.is_healthy().await {
            match self.remote.aggregate_filters().await {
                Ok(mut set) => {
                    set.levels.sort();
                    set.domains.sort();
                    set.actions.sort();
                    return Ok(set);
                }
                Err(err) => {
                    tracing::warn!(error = %err, "filter aggregation failed, scanning local files");
                }
            }
        }
        self.scan_local()
    }

    fn scan_local(&self) -> Result<FilterSet, QueryError> {
        let mut levels = BTreeSet::new();
        let mut domains = BTreeSet::new();
        let mut actions = BTreeSet::new();

        for path in self
            .local
            .files_newest_first()?
            .into_iter()
            .take(FILTER_SCAN_FILES)
        {
            let Ok(content) = fs::read_to_string(&path) else {
                continue;
            };
            for line in content.lines().rev().take(FILTER_SCAN_LINES) {
                let Some(record) = parse_line(line) else {
                    continue;
                };
                levels.insert(record.level.as_str().to_string());
                if let Some(domain) = record.domain {
                    domains.insert(domain);
                }
                if let Some(action) = record.action {
                    actions.insert(action);
                }
            }
        }

        // BTreeSet iteration is already ascending.
        Ok(FilterSet {
            levels: levels.into_iter().collect(),
            domains: domains.into_iter().collect(),
            actions: actions.into_iter().collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{LogDocument, LogLevel};
    use crate::store::DEFAULT_QUERY_LIMIT;
    use async_trait::async_trait;
    use std::error::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Unhealthy store that records whether search was ever attempted.
    #[derive(Default)]
    struct DownStore {
        searches: AtomicUsize,
    }

    #[async_trait]
    impl RemoteStore for DownStore {
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
            self.searches.fetch_add(1, Ordering::SeqCst);
            Err("down".into())
        }
        async fn aggregate_filters(&self) -> Result<FilterSet, Box<dyn Error + Send + Sync>> {
            Err("down".into())
        }
    }

    fn config_in(dir: &TempDir) -> Arc<Config> {
        Arc::new(Config {
            local_dir: dir.path().to_path_buf(),
            remote_enabled: false,
            ..Config::default()
        })
    }

    fn write_file(dir: &TempDir, name: &str, lines: &[&str]) {
        let mut body = String::new();
        for line in lines {
            body.push_str(line);
            body.push('\n');
        }
        fs::write(dir.path().join(name), body).unwrap();
        // Distinct mtimes so newest-first ordering is deterministic.
        std::thread::sleep(std::time::Duration::from_millis(15));
    }

    fn line(ts: &str, level: &str, message: &str, domain: &str) -> String {
        format!(
            r#"[{ts}] production.{level}: [REMOTE-FALLBACK] {message} {{"domain":"{domain}","context":{{}}}}"#
        )
    }

    #[tokio::test]
    async fn unhealthy_remote_forces_fallback_without_a_search_call() {
        let dir = TempDir::new().unwrap();
        write_file(
            &dir,
            "marketplace-2026-08-30.log",
            &[&line("2026-08-30T10:00:00+00:00", "ERROR", "boom", "orders")],
        );

        let remote = Arc::new(DownStore::default());
        let service = LogQueryService::new(config_in(&dir), remote.clone());
        let outcome = service
            .query(&LogQuery::with_limit(DEFAULT_QUERY_LIMIT))
            .await
            .unwrap();

        assert!(outcome.fallback_mode);
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].message, "boom");
        assert_eq!(remote.searches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn local_scan_applies_filters_and_resorts_by_timestamp() {
        let dir = TempDir::new().unwrap();
        // Older file written first, newer second; timestamps interleave
        // so the final re-sort matters.
        write_file(
            &dir,
            "marketplace-2026-08-29.log",
            &[
                &line("2026-08-29T09:00:00+00:00", "ERROR", "old error", "orders"),
                &line("2026-08-29T23:59:00+00:00", "INFO", "late info", "orders"),
            ],
        );
        write_file(
            &dir,
            "marketplace-2026-08-30.log",
            &[
                &line("2026-08-30T08:00:00+00:00", "ERROR", "new error", "orders"),
                &line("2026-08-30T09:00:00+00:00", "ERROR", "other domain", "companies"),
                "not a log line at all",
            ],
        );

        let service = LogQueryService::new(config_in(&dir), Arc::new(DownStore::default()));
        let query = LogQuery {
            level: Some(LogLevel::Error),
            domain: Some("orders".into()),
            limit: 10,
            ..LogQuery::default()
        };
        let outcome = service.query(&query).await.unwrap();

        let messages: Vec<&str> = outcome
            .records
            .iter()
            .map(|r| r.message.as_str())
            .collect();
        assert_eq!(messages, vec!["new error", "old error"]);
    }

    #[tokio::test]
    async fn local_scan_stops_at_the_limit() {
        let dir = TempDir::new().unwrap();
        let lines: Vec<String> = (0..10)
            .map(|i| {
                line(
                    &format!("2026-08-30T10:{i:02}:00+00:00"),
                    "ERROR",
                    &format!("err {i}"),
                    "orders",
                )
            })
            .collect();
        let refs: Vec<&str> = lines.iter().map(|s| s.as_str()).collect();
        write_file(&dir, "marketplace-2026-08-30.log", &refs);

        let service = LogQueryService::new(config_in(&dir), Arc::new(DownStore::default()));
        let outcome = service.query(&LogQuery::with_limit(3)).await.unwrap();

        assert_eq!(outcome.records.len(), 3);
        // Reverse read order means the newest lines are kept.
        assert_eq!(outcome.records[0].message, "err 9");
    }

    #[tokio::test]
    async fn search_matches_message_and_context_case_insensitively() {
        let dir = TempDir::new().unwrap();
        write_file(
            &dir,
            "marketplace-2026-08-30.log",
            &[
                r#"[2026-08-30T10:00:00+00:00] production.ERROR: payment declined {"context":{"gateway":"StripeMock"}}"#,
                r#"[2026-08-30T10:01:00+00:00] production.ERROR: unrelated {"context":{}}"#,
            ],
        );

        let service = LogQueryService::new(config_in(&dir), Arc::new(DownStore::default()));

        let by_message = LogQuery {
            search: Some("DECLINED".into()),
            limit: 10,
            ..LogQuery::default()
        };
        assert_eq!(service.query(&by_message).await.unwrap().records.len(), 1);

        let by_context = LogQuery {
            search: Some("stripemock".into()),
            limit: 10,
            ..LogQuery::default()
        };
        assert_eq!(service.query(&by_context).await.unwrap().records.len(), 1);
    }

    #[tokio::test]
    async fn filter_catalog_scans_only_the_three_newest_files() {
        let dir = TempDir::new().unwrap();
        // Five files; the two oldest carry levels that must not appear.
        write_file(
            &dir,
            "marketplace-2026-08-25.log",
            &[&line("2026-08-25T10:00:00+00:00", "ALERT", "ancient", "archive")],
        );
        write_file(
            &dir,
            "marketplace-2026-08-26.log",
            &[&line("2026-08-26T10:00:00+00:00", "DEBUG", "older", "archive")],
        );
        write_file(
            &dir,
            "marketplace-2026-08-27.log",
            &[&line("2026-08-27T10:00:00+00:00", "WARNING", "w", "listings")],
        );
        write_file(
            &dir,
            "marketplace-2026-08-28.log",
            &[&line("2026-08-28T10:00:00+00:00", "ERROR", "e", "orders")],
        );
        write_file(
            &dir,
            "marketplace-2026-08-29.log",
            &[&line("2026-08-29T10:00:00+00:00", "INFO", "i", "companies")],
        );

        let catalog = FilterCatalog::new(config_in(&dir), Arc::new(DownStore::default()));
        let set = catalog.available_filters().await.unwrap();

        assert_eq!(set.levels, vec!["error", "info", "warning"]);
        assert_eq!(set.domains, vec!["companies", "listings", "orders"]);
        assert!(set.actions.is_empty());
    }
}
