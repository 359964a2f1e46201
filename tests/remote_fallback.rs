//! End-to-end behavior of the dual-sink pipeline against a mocked remote
//! document index.

use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use marketlog::config::Config;
use marketlog::document::ContextMap;
use marketlog::opensearch::OpenSearchStore;
use marketlog::query::{FilterCatalog, LogQueryService};
use marketlog::store::{LogQuery, RemoteStore};
use marketlog::writer::LogWriter;

fn config_for(server_uri: &str, dir: &TempDir) -> Arc<Config> {
    Arc::new(Config {
        remote_host: server_uri.to_string(),
        local_dir: dir.path().to_path_buf(),
        ..Config::default()
    })
}

async fn mock_health(server: &MockServer, status: &str) {
    Mock::given(method("GET"))
        .and(path("/_cluster/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": status})))
        .mount(server)
        .await;
}

fn read_single_log_file(dir: &TempDir) -> String {
    let entry = std::fs::read_dir(dir.path())
        .unwrap()
        .next()
        .expect("one log file written")
        .unwrap();
    std::fs::read_to_string(entry.path()).unwrap()
}

#[tokio::test]
async fn healthy_cluster_accepts_the_write_and_the_local_line_is_tagged_remote() {
    let server = MockServer::start().await;
    mock_health(&server, "green").await;
    Mock::given(method("POST"))
        .and(path_regex(r"^/marketplace-logs-\d{4}\.\d{2}\.\d{2}/_doc$"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = config_for(&server.uri(), &dir);
    let store = Arc::new(OpenSearchStore::new(Arc::clone(&config)));
    let writer = LogWriter::new(Arc::clone(&config), store);

    writer.error("remote write", ContextMap::new()).await;

    let content = read_single_log_file(&dir);
    assert!(content.contains("[REMOTE] remote write"), "got: {content}");
}

#[tokio::test]
async fn red_cluster_fails_fast_and_the_write_falls_back_to_local() {
    let server = MockServer::start().await;
    mock_health(&server, "red").await;
    // An unhealthy cluster must not even see the document.
    Mock::given(method("POST"))
        .and(path_regex(r"/_doc$"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = config_for(&server.uri(), &dir);
    let store = Arc::new(OpenSearchStore::new(Arc::clone(&config)));
    let writer = LogWriter::new(Arc::clone(&config), store);

    writer.error("degraded write", ContextMap::new()).await;

    let content = read_single_log_file(&dir);
    assert!(
        content.contains("[REMOTE-FALLBACK] degraded write"),
        "got: {content}"
    );
}

#[tokio::test]
async fn disabled_remote_skips_network_io_entirely() {
    let server = MockServer::start().await;
    // No mocks mounted: any request would 404 and trip nothing, but the
    // point is that none is made while the server verifies expectations.
    let dir = TempDir::new().unwrap();
    let config = Arc::new(Config {
        remote_host: server.uri(),
        local_dir: dir.path().to_path_buf(),
        remote_enabled: false,
        ..Config::default()
    });
    let store = OpenSearchStore::new(Arc::clone(&config));

    let doc = marketlog::document::DocumentBuilder::new(&config).build(
        marketlog::document::LogLevel::Error,
        "local only",
        ContextMap::new(),
        None,
    );
    assert!(!store.send(&doc).await);
    assert_eq!(server.received_requests().await.unwrap().len(), 0);
}

#[tokio::test]
async fn health_probe_is_false_on_error_responses_and_unreachable_hosts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/_cluster/health"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = config_for(&server.uri(), &dir);
    let store = OpenSearchStore::new(config);
    assert!(!store.is_healthy().await);

    let dir2 = TempDir::new().unwrap();
    let unreachable = config_for("http://127.0.0.1:1", &dir2);
    let store = OpenSearchStore::new(unreachable);
    assert!(!store.is_healthy().await);
}

#[tokio::test]
async fn healthy_remote_serves_the_feed_without_fallback() {
    let server = MockServer::start().await;
    mock_health(&server, "yellow").await;
    Mock::given(method("POST"))
        .and(path("/marketplace-logs-*/_search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "hits": {"hits": [{
                "_id": "doc-1",
                "_source": {
                    "timestamp": "2026-08-30T10:00:00Z",
                    "level": "error",
                    "app": "marketplace",
                    "env": "production",
                    "message": "indexed error",
                    "domain": "orders",
                    "context": {"order_id": 7}
                }
            }]}
        })))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = config_for(&server.uri(), &dir);
    let store = Arc::new(OpenSearchStore::new(Arc::clone(&config)));
    let service = LogQueryService::new(config, store);

    let outcome = service.query(&LogQuery::with_limit(50)).await.unwrap();
    assert!(!outcome.fallback_mode);
    assert_eq!(outcome.records.len(), 1);
    assert_eq!(outcome.records[0].id, "doc-1");
    assert_eq!(outcome.records[0].message, "indexed error");
    assert_eq!(outcome.records[0].domain_label.as_deref(), Some("Orders"));
}

#[tokio::test]
async fn remote_search_error_falls_back_to_local_files() {
    let server = MockServer::start().await;
    mock_health(&server, "green").await;
    Mock::given(method("POST"))
        .and(path("/marketplace-logs-*/_search"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("marketplace-2026-08-30.log"),
        "[2026-08-30T10:00:00+00:00] production.ERROR: [REMOTE] survived {\"context\":{}}\n",
    )
    .unwrap();

    let config = config_for(&server.uri(), &dir);
    let store = Arc::new(OpenSearchStore::new(Arc::clone(&config)));
    let service = LogQueryService::new(config, store);

    let outcome = service.query(&LogQuery::with_limit(50)).await.unwrap();
    assert!(outcome.fallback_mode);
    assert_eq!(outcome.records.len(), 1);
    assert_eq!(outcome.records[0].message, "survived");
}

#[tokio::test]
async fn filter_catalog_prefers_the_remote_aggregation() {
    let server = MockServer::start().await;
    mock_health(&server, "green").await;
    Mock::given(method("POST"))
        .and(path("/marketplace-logs-*/_search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "aggregations": {
                "levels":  {"buckets": [{"key": "info"}, {"key": "error"}]},
                "domains": {"buckets": [{"key": "orders"}, {"key": "companies"}]},
                "actions": {"buckets": [{"key": "create"}]}
            }
        })))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = config_for(&server.uri(), &dir);
    let store = Arc::new(OpenSearchStore::new(Arc::clone(&config)));
    let catalog = FilterCatalog::new(config, store);

    let set = catalog.available_filters().await.unwrap();
    assert_eq!(set.levels, vec!["error", "info"]);
    assert_eq!(set.domains, vec!["companies", "orders"]);
    assert_eq!(set.actions, vec!["create"]);
}
