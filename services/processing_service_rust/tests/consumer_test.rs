//! Consumer orchestrator tests over the in-memory stream and cache.

use processing_service_rust::{process_batch, run_invocation};
use quotestream_core::cache::{MemoryCache, SYMBOL_SET_KEY};
use quotestream_core::models::RawQuote;
use quotestream_core::stream::{MemoryStream, StreamPosition, StreamPublisher, StreamTransport};
use quotestream_core::ErrorKind;
use serde_json::{json, Value};

const SYMBOL: &str = "DE0005104400";

fn quote(value: Value) -> RawQuote {
    RawQuote::from_value(value).unwrap()
}

#[tokio::test]
async fn test_malformed_record_is_isolated() {
    let stream = MemoryStream::new("quotes");
    let publisher = StreamPublisher::new(&stream, SYMBOL);

    let first = publisher
        .publish(quote(json!({"c": 100, "metrics": {"eps": 10}})))
        .await
        .unwrap();
    let bad = stream.push_encoded(SYMBOL, "%%% not base64 %%%").await;
    let third = publisher
        .publish(quote(json!({"c": 60, "metrics": {"pe/ratio": "30.456"}})))
        .await
        .unwrap();

    let records = stream.read_batch(&StreamPosition::Beginning, 10).await.unwrap();
    assert_eq!(records.len(), 3);

    let cache = MemoryCache::new();
    let outcome = process_batch(&cache, &records, SYMBOL).await;

    assert!(outcome.is_success());
    assert_eq!(outcome.processed_count, 2);
    assert_eq!(outcome.failed_count, 1);
    assert_eq!(outcome.failed_records[0].record_id, bad);
    assert_eq!(outcome.failed_records[0].error_kind, ErrorKind::MalformedRecord);
    assert!(outcome.failed_records[0].error.contains(&bad));

    // two history entries, one per good record
    let history: Vec<String> = cache
        .keys()
        .await
        .into_iter()
        .filter(|k| k.starts_with(&format!("pe:{}:", SYMBOL)))
        .collect();
    assert_eq!(history.len(), 2);

    // latest reflects the last good record in delivery order
    let latest: Value =
        serde_json::from_str(&cache.get(&format!("pe:latest:{}", SYMBOL)).await.unwrap()).unwrap();
    assert_eq!(latest["analytics"]["pe_ratio"], json!(30.46));
    assert_eq!(latest["analytics"]["pe_category"], json!("expensive"));
    assert_eq!(latest["analytics"]["valuation_signal"], json!("sell"));
    assert_eq!(cache.get(&format!("price:{}", SYMBOL)).await.as_deref(), Some("60"));

    assert!(cache.set_members(SYMBOL_SET_KEY).await.contains(SYMBOL));
    assert_ne!(first, third);
}

#[tokio::test]
async fn test_batch_outcome_serializes_failures() {
    let stream = MemoryStream::new("quotes");
    stream.push_encoded(SYMBOL, "e30=").await; // "{}"
    stream.push_encoded(SYMBOL, "WzEsMl0=").await; // "[1,2]"

    let records = stream.read_batch(&StreamPosition::Beginning, 10).await.unwrap();
    let cache = MemoryCache::new();
    let outcome = process_batch(&cache, &records, SYMBOL).await;

    let value = serde_json::to_value(&outcome).unwrap();
    assert_eq!(value["status"], json!("success"));
    assert_eq!(value["processed_count"], json!(1));
    assert_eq!(value["failed_count"], json!(1));
    assert_eq!(value["failed_records"][0]["record_id"], json!("2-0"));
    assert_eq!(value["failed_records"][0]["error_kind"], json!("malformed_record"));
}

#[tokio::test]
async fn test_failed_invocation_leaves_batch_for_redelivery() {
    let stream = MemoryStream::new("quotes");
    let publisher = StreamPublisher::new(&stream, SYMBOL);
    let position = stream.attach(StreamPosition::Latest).await.unwrap();
    publisher.publish(quote(json!({"c": 150, "metrics": {"eps": 7.5}}))).await.unwrap();

    let records = stream.read_batch(&position, 10).await.unwrap();
    let outcome = run_invocation(
        || async {
            Err::<MemoryCache, _>(quotestream_core::PipelineError::CacheUnavailable(
                "connection refused".into(),
            ))
        },
        &records,
        SYMBOL,
    )
    .await;
    assert!(!outcome.is_success());

    // the reader keeps its position, so the same records come back
    let redelivered = stream.read_batch(&position, 10).await.unwrap();
    assert_eq!(redelivered, records);

    let cache = MemoryCache::new();
    let retried = run_invocation(|| async { Ok(cache) }, &redelivered, SYMBOL).await;
    assert!(retried.is_success());
    assert_eq!(retried.processed_count, 1);
}
