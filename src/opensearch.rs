use crate::config::Config;
use crate::document::LogDocument;
use crate::record::LogRecord;
use crate::store::{FilterSet, LogQuery, RemoteStore};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde_json::{json, Value};
use std::error::Error;
use std::sync::Arc;

/// Bucket caps for the filter aggregation, per dimension.
const LEVEL_BUCKETS: u32 = 20;
const DOMAIN_BUCKETS: u32 = 50;
const ACTION_BUCKETS: u32 = 100;

/// OpenSearch-compatible implementation of [`RemoteStore`] over HTTP.
///
/// Documents land in date-partitioned indices named
/// `{prefix}-YYYY.MM.DD`; searches fan out over `{prefix}-*`.
#[derive(Clone)]
pub struct OpenSearchStore {
    client: Client,
    config: Arc<Config>,
}

impl OpenSearchStore {
    pub fn new(config: Arc<Config>) -> Self {
        OpenSearchStore {
            client: Client::new(),
            config,
        }
    }

    fn base_url(&self) -> &str {
        self.config.remote_host.trim_end_matches('/')
    }

    /// Partition name for the current UTC date, computed per call so a
    /// day rollover produces a fresh index without restart.
    fn dated_index(&self) -> String {
        format!(
            "{}-{}",
            self.config.index_prefix,
            Utc::now().format("%Y.%m.%d")
        )
    }

    fn search_body(query: &LogQuery) -> Value {
        let mut filter = Vec::new();
        let mut must = Vec::new();

        if let Some(level) = query.level {
            filter.push(json!({"term": {"level": level.as_str()}}));
        }
        if let Some(domain) = &query.domain {
            filter.push(json!({"term": {"domain": domain}}));
        }
        if let Some(action) = &query.action {
            filter.push(json!({"term": {"action": action}}));
        }
        if let Some(since) = query.since {
            filter.push(json!({"range": {"timestamp": {"gte": since.to_rfc3339()}}}));
        }
        if let Some(search) = query.search.as_deref().filter(|s| !s.is_empty()) {
            must.push(json!({
                "multi_match": {"query": search, "fields": ["message", "context.*"]}
            }));
        }

        json!({
            "size": query.limit,
            "sort": [{"timestamp": {"order": "desc"}}],
            "query": {"bool": {"filter": filter, "must": must}}
        })
    }
}

#[async_trait]
impl RemoteStore for OpenSearchStore {
    async fn is_healthy(&self) -> bool {
        let url = format!("{}/_cluster/health", self.base_url());
        let resp = self
            .client
            .get(&url)
            .timeout(self.config.probe_timeout)
            .send()
            .await;

        let resp = match resp {
            Ok(r) if r.status().is_success() => r,
            _ => return false,
        };

        match resp.json::<Value>().await {
            Ok(body) => matches!(
                body.get("status").and_then(Value::as_str),
                Some("green") | Some("yellow")
            ),
            Err(_) => false,
        }
    }

    async fn send(&self, document: &LogDocument) -> bool {
        if !self.config.remote_enabled {
            return false;
        }
        // Fail fast on an unhealthy cluster instead of burning the write
        // timeout on a doomed POST.
        if !self.is_healthy().await {
            return false;
        }

        let url = format!("{}/{}/_doc", self.base_url(), self.dated_index());
        match self
            .client
            .post(&url)
            .timeout(self.config.remote_timeout)
            .json(document)
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(err) => {
                tracing::debug!(error = %err, "remote log write failed");
                false
            }
        }
    }

    async fn search(
        &self,
        query: &LogQuery,
    ) -> Result<Vec<LogRecord>, Box<dyn Error + Send + Sync>> {
        let url = format!("{}/{}-*/_search", self.base_url(), self.config.index_prefix);
        let resp = self
            .client
            .post(&url)
            .timeout(self.config.remote_timeout)
            .json(&Self::search_body(query))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(format!("log search failed with status {}", resp.status()).into());
        }

        let body: Value = resp.json().await?;
        let hits = body
            .pointer("/hits/hits")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut records = Vec::with_capacity(hits.len());
        for hit in hits {
            let id = hit
                .get("_id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let Some(source) = hit.get("_source") else {
                continue;
            };
            let doc: LogDocument = match serde_json::from_value(source.clone()) {
                Ok(doc) => doc,
                // A foreign document in the index is not worth failing
                // the whole feed over.
                Err(_) => continue,
            };
            records.push(
                LogRecord {
                    id,
                    timestamp: doc.timestamp,
                    level: doc.level,
                    level_label: String::new(),
                    domain: doc.domain,
                    domain_label: None,
                    action: doc.action,
                    action_label: None,
                    message: doc.message,
                    context: doc.context,
                    remote_ok: None,
                }
                .with_labels(),
            );
        }
        Ok(records)
    }

    async fn aggregate_filters(&self) -> Result<FilterSet, Box<dyn Error + Send + Sync>> {
        let url = format!("{}/{}-*/_search", self.base_url(), self.config.index_prefix);
        let body = json!({
            "size": 0,
            "aggs": {
                "levels":  {"terms": {"field": "level",  "size": LEVEL_BUCKETS}},
                "domains": {"terms": {"field": "domain", "size": DOMAIN_BUCKETS}},
                "actions": {"terms": {"field": "action", "size": ACTION_BUCKETS}}
            }
        });

        let resp = self
            .client
            .post(&url)
            .timeout(self.config.remote_timeout)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(format!("filter aggregation failed with status {}", resp.status()).into());
        }

        let body: Value = resp.json().await?;
        Ok(FilterSet {
            levels: bucket_keys(&body, "levels"),
            domains: bucket_keys(&body, "domains"),
            actions: bucket_keys(&body, "actions"),
        })
    }
}

fn bucket_keys(body: &Value, agg: &str) -> Vec<String> {
    body.pointer(&format!("/aggregations/{agg}/buckets"))
        .and_then(Value::as_array)
        .map(|buckets| {
            buckets
                .iter()
                .filter_map(|b| b.get("key").and_then(Value::as_str))
                .map(|k| k.to_string())
                .collect()
        })
        .unwrap_or_default()
}
