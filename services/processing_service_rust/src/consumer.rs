//! Consumer orchestrator
//!
//! One invocation handles one delivered batch: each record is decoded,
//! analyzed and projected into the cache in delivery order. A failing record
//! is logged and reported without stopping the rest of the batch; only an
//! unreachable cache fails the whole invocation.

use std::future::Future;

use quotestream_core::analytics::analyze;
use quotestream_core::cache::{CacheStore, CacheWriter, RedisCache};
use quotestream_core::models::{
    utc_timestamp, AnalyticsResult, BatchOutcome, FailedRecord, TransportRecord,
};
use quotestream_core::stream::decode_record;
use quotestream_core::PipelineError;
use tracing::{debug, error, info};

use crate::config::Config;

/// Decode, analyze and cache one record.
///
/// The analytics timestamp is the record's ingestion timestamp when the
/// envelope carries one, so reprocessing a record rewrites identical keys.
pub async fn process_record<C>(
    cache: &C,
    record: &TransportRecord,
    fallback_symbol: &str,
) -> Result<AnalyticsResult, PipelineError>
where
    C: CacheStore + ?Sized,
{
    let decoded = decode_record(record)?;

    let symbol = match decoded.partition_key.trim() {
        "" => fallback_symbol,
        key => key,
    };
    let observed_at = decoded
        .ingestion_timestamp
        .clone()
        .unwrap_or_else(utc_timestamp);
    debug!(
        record_id = %record.record_id,
        symbol,
        request_id = ?decoded.request_id,
        "Processing record"
    );

    let result = analyze(&decoded.quote, symbol, &observed_at);
    CacheWriter::new(cache).write(&result).await.into_result()?;
    Ok(result)
}

/// Process every record of a batch sequentially, isolating failures per record.
pub async fn process_batch<C>(
    cache: &C,
    records: &[TransportRecord],
    fallback_symbol: &str,
) -> BatchOutcome
where
    C: CacheStore + ?Sized,
{
    let mut processed = 0;
    let mut failed_records = Vec::new();

    for record in records {
        match process_record(cache, record, fallback_symbol).await {
            Ok(_) => processed += 1,
            Err(e) => {
                error!(record_id = %record.record_id, "Error processing record: {}", e);
                failed_records.push(FailedRecord {
                    record_id: record.record_id.clone(),
                    error: e.to_string(),
                    error_kind: e.kind(),
                });
            }
        }
    }

    info!(
        "Batch complete: {} processed, {} failed",
        processed,
        failed_records.len()
    );
    BatchOutcome::completed(processed, failed_records)
}

/// One invocation: acquire a cache handle, process the batch, release it.
///
/// If the cache cannot be reached no record is touched and the outcome is a
/// failure, so the caller can redeliver the same batch later.
pub async fn run_invocation<C, F, Fut>(
    connect: F,
    records: &[TransportRecord],
    fallback_symbol: &str,
) -> BatchOutcome
where
    C: CacheStore,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<C, PipelineError>>,
{
    let cache = match connect().await {
        Ok(cache) => cache,
        Err(e) => {
            error!("Cache unavailable, aborting batch of {}: {}", records.len(), e);
            return BatchOutcome::aborted(&e);
        }
    };
    process_batch(&cache, records, fallback_symbol).await
}

/// [`run_invocation`] against the Redis cache named in `config`.
pub async fn process_with_redis(config: &Config, records: &[TransportRecord]) -> BatchOutcome {
    run_invocation(
        || RedisCache::connect(&config.cache_redis_url, config.cache_connect_timeout),
        records,
        &config.tracked_symbol,
    )
    .await
}
