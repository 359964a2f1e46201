use std::sync::Arc;

use serde_json::json;

use marketlog::config::Config;
use marketlog::document::ContextMap;
use marketlog::noop_store::NoopStore;
use marketlog::query::LogQueryService;
use marketlog::store::LogQuery;
use marketlog::writer::LogWriter;

/// Local-only pipeline: no remote index, every write lands in a dated
/// file under ./demo-logs and the feed is served in fallback mode.
#[tokio::main]
async fn main() {
    let config = Arc::new(Config {
        remote_enabled: false,
        local_dir: "demo-logs".into(),
        ..Config::default()
    });

    let writer = LogWriter::new(Arc::clone(&config), Arc::new(NoopStore));

    let mut context = ContextMap::new();
    context.insert("domain".into(), json!("companies"));
    context.insert("action".into(), json!("create"));
    context.insert("api_key".into(), json!("will-be-masked"));
    writer.error("company creation failed", context).await;

    let service = LogQueryService::new(Arc::clone(&config), Arc::new(NoopStore));
    let outcome = service
        .query(&LogQuery::with_limit(10))
        .await
        .expect("local scan");

    println!(
        "fallback_mode={} records={}",
        outcome.fallback_mode,
        outcome.records.len()
    );
    for record in outcome.records {
        println!(
            "[{}] {}: {} {}",
            record.timestamp,
            record.level_label,
            record.message,
            serde_json::Value::Object(record.context)
        );
    }
}
