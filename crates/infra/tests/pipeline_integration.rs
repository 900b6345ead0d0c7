//! End-to-end pipeline tests against a mock collector.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use pagetrail_core::storage::{StateStore, StateStoreExt};
use pagetrail_domain::constants::keys;
use pagetrail_domain::{AuthSignal, PageVisit};
use pagetrail_infra::{DeliveryPipeline, MemoryStateStore};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn visit(title: &str) -> PageVisit {
    PageVisit {
        timestamp: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        url: format!("https://example.com/{title}"),
        title: title.to_string(),
        description: "an article".to_string(),
        external_id: "host-1".to_string(),
    }
}

async fn pipeline(server_uri: &str) -> (Arc<MemoryStateStore>, DeliveryPipeline) {
    let store = Arc::new(MemoryStateStore::new());
    let pipeline = DeliveryPipeline::builder(store.clone())
        .base_url(server_uri)
        .timeout(Duration::from_secs(5))
        .build()
        .await
        .unwrap();
    (store, pipeline)
}

#[tokio::test]
async fn visit_is_delivered_and_archived() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/history"))
        .and(header("Authorization", "Bearer tok"))
        .and(body_partial_json(json!({ "title": "news" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let (store, pipeline) = pipeline(&server.uri()).await;
    pipeline.store_tokens("tok".to_string(), None).await.unwrap();

    pipeline.handle_visit(None, visit("news"), Utc::now()).await.unwrap();

    // Nothing left queued, and the local archive holds the row.
    let pending = store.get_value(keys::PENDING_UPLOADS).await.unwrap();
    assert_eq!(pending.unwrap_or(json!([])), json!([]));
    let export = pipeline.export_archive().await.unwrap();
    assert!(export.contains("news"));
}

#[tokio::test]
async fn unreachable_collector_queues_then_backlog_drains() {
    init_tracing();
    let server = MockServer::start().await;
    let outage = Mock::given(method("POST"))
        .and(path("/history"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount_as_scoped(&server)
        .await;

    let (_store, pipeline) = pipeline(&server.uri()).await;
    pipeline.store_tokens("tok".to_string(), None).await.unwrap();

    // Delivery fails; the visit lands in the queue instead of erroring.
    pipeline.handle_visit(None, visit("offline"), Utc::now()).await.unwrap();
    drop(outage);

    // Collector recovers.
    Mock::given(method("POST"))
        .and(path("/history"))
        .and(body_partial_json(json!({ "title": "offline" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    assert_eq!(pipeline.drain_backlog().await.unwrap(), 1);
    assert_eq!(pipeline.drain_backlog().await.unwrap(), 0);
}

#[tokio::test]
async fn backlog_persisted_by_an_earlier_run_is_recovered() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/history"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(2)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStateStore::new());
    store
        .set_value(
            keys::PENDING_UPLOADS,
            json!([
                serde_json::to_value(visit("from-last-run-1")).unwrap(),
                serde_json::to_value(visit("from-last-run-2")).unwrap(),
            ]),
        )
        .await
        .unwrap();
    store.set_value(keys::ACCESS_TOKEN, json!("tok")).await.unwrap();

    let pipeline = DeliveryPipeline::builder(store.clone())
        .base_url(server.uri())
        .build()
        .await
        .unwrap();

    assert_eq!(pipeline.drain_backlog().await.unwrap(), 2);
}

#[tokio::test]
async fn missing_credentials_emit_a_sign_in_request() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/history"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (_store, pipeline) = pipeline(&server.uri()).await;
    let mut signals = pipeline.subscribe_auth();

    pipeline.handle_visit(None, visit("ignored"), Utc::now()).await.unwrap();

    assert_eq!(signals.recv().await.unwrap(), AuthSignal::Required);
}

#[tokio::test]
async fn rejected_credentials_queue_the_visit_and_signal_invalid() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/history"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/refresh"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let (store, pipeline) = pipeline(&server.uri()).await;
    pipeline.store_tokens("bad".to_string(), Some("dead".to_string())).await.unwrap();
    let mut signals = pipeline.subscribe_auth();

    pipeline.handle_visit(None, visit("held"), Utc::now()).await.unwrap();

    // Failed refresh wiped the credentials and the visit was kept.
    assert!(store.get(&[keys::ACCESS_TOKEN]).await.unwrap().is_empty());
    let pending = store.get_value(keys::PENDING_UPLOADS).await.unwrap().unwrap();
    assert_eq!(pending.as_array().unwrap().len(), 1);
    assert_eq!(signals.recv().await.unwrap(), AuthSignal::Invalid);
}

#[tokio::test]
async fn expired_access_token_is_refreshed_transparently() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/history"))
        .and(header("Authorization", "Bearer stale"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/refresh"))
        .and(body_partial_json(json!({ "refresh_token": "refresh-1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access_token": "fresh" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/history"))
        .and(header("Authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let (store, pipeline) = pipeline(&server.uri()).await;
    pipeline
        .store_tokens("stale".to_string(), Some("refresh-1".to_string()))
        .await
        .unwrap();

    pipeline.handle_visit(None, visit("article"), Utc::now()).await.unwrap();

    let stored = store.get_value(keys::ACCESS_TOKEN).await.unwrap().unwrap();
    assert_eq!(stored, json!("fresh"));
    let pending = store.get_value(keys::PENDING_UPLOADS).await.unwrap();
    assert_eq!(pending.unwrap_or(json!([])), json!([]));
}

#[tokio::test]
async fn dwell_batching_settles_on_session_close() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/history"))
        .and(body_partial_json(json!({ "title": "long read" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let (store, pipeline) = pipeline(&server.uri()).await;
    pipeline.store_tokens("tok".to_string(), None).await.unwrap();
    store.set_value(keys::BATCH_MODE_ENABLED, json!(true)).await.unwrap();
    store.set_value(keys::DWELL_THRESHOLD_SECS, json!(30)).await.unwrap();

    let session = pagetrail_domain::SessionId(7);
    let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();

    let mut held = visit("long");
    held.title = "long read".to_string();
    pipeline.handle_visit(Some(session), held, start).await.unwrap();

    // Closing after the threshold emits the held visit.
    let end = start + chrono::Duration::seconds(45);
    pipeline.session_closed(session, end).await.unwrap();
}
