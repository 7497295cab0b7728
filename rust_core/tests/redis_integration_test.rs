//! Round trips through a live Redis server.
//!
//! Run with `REDIS_URL=redis://localhost:6379 cargo test -- --ignored`.

use std::time::Duration;

use quotestream_core::analytics::analyze;
use quotestream_core::cache::{CacheWriter, RedisCache, SYMBOL_SET_KEY};
use quotestream_core::models::RawQuote;
use quotestream_core::stream::{
    decode_record, RedisStream, StreamPosition, StreamPublisher, StreamTransport,
};
use serde_json::json;

fn redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string())
}

#[tokio::test]
#[ignore] // Requires Redis
async fn test_stream_append_and_read_after_attach() {
    let name = format!("quotes-test-{}", uuid::Uuid::new_v4());
    let stream = RedisStream::connect(&redis_url(), &name, Duration::from_secs(2))
        .await
        .unwrap()
        .with_block_ms(100);

    let before = stream.attach(StreamPosition::Latest).await.unwrap();
    assert_eq!(before, StreamPosition::After("0-0".to_string()));

    let publisher = StreamPublisher::new(&stream, "DE0005104400");
    let quote = RawQuote::from_value(json!({"c": 150, "metrics": {"eps": 7.5}})).unwrap();
    let id = publisher.publish(quote.clone()).await.unwrap();

    let records = stream.read_batch(&before, 10).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].record_id, id);
    assert_eq!(records[0].partition_key, "DE0005104400");
    assert_eq!(decode_record(&records[0]).unwrap().quote, quote);

    let after = stream.attach(StreamPosition::Latest).await.unwrap();
    assert_eq!(after, StreamPosition::After(id));
    assert!(stream.read_batch(&after, 10).await.unwrap().is_empty());
}

#[tokio::test]
#[ignore] // Requires Redis
async fn test_cache_projection_with_ttls() {
    let url = redis_url();
    let cache = RedisCache::connect(&url, Duration::from_secs(2)).await.unwrap();
    let symbol = format!("TEST{}", uuid::Uuid::new_v4().simple());
    let quote = RawQuote::from_value(json!({"c": 120.5, "metrics": {"pe/ratio": 18.3}})).unwrap();
    let result = analyze(&quote, &symbol, "2026-10-19T12:00:00.000000Z");

    let report = CacheWriter::new(&cache).write(&result).await;
    assert!(report.is_complete());

    let client = redis::Client::open(url).unwrap();
    let mut conn = client.get_async_connection().await.unwrap();

    let price: String = redis::cmd("GET")
        .arg(format!("price:{}", symbol))
        .query_async(&mut conn)
        .await
        .unwrap();
    assert_eq!(price, "120.5");

    let ttl: i64 = redis::cmd("TTL")
        .arg(format!("pe:summary:{}", symbol))
        .query_async(&mut conn)
        .await
        .unwrap();
    assert!(ttl > 1700 && ttl <= 1800);

    let member: bool = redis::cmd("SISMEMBER")
        .arg(SYMBOL_SET_KEY)
        .arg(&symbol)
        .query_async(&mut conn)
        .await
        .unwrap();
    assert!(member);

    let set_ttl: i64 = redis::cmd("TTL")
        .arg(SYMBOL_SET_KEY)
        .query_async(&mut conn)
        .await
        .unwrap();
    assert!(set_ttl > 86000);
}
