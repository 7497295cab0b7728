//! Cache projections of analytics results
//!
//! One [`AnalyticsResult`] is written under four keys with independent TTLs,
//! and its symbol is added to the tracked-symbol set:
//!
//! | key                        | value              | TTL    |
//! |----------------------------|--------------------|--------|
//! | `pe:{symbol}:{timestamp}`  | full result        | 1h     |
//! | `pe:latest:{symbol}`       | full result        | 1h     |
//! | `pe:summary:{symbol}`      | [`PeSummary`]      | 30min  |
//! | `price:{symbol}`           | current price      | 15min  |
//! | `pe:symbols` (set member)  | symbol             | 24h    |
//!
//! Every operation is a plain overwrite (`SETEX`, `SADD` + `EXPIRE`) derived
//! only from the result itself. Replaying the same result therefore writes
//! the same keys with the same values, which is what lets the consumer accept
//! at-least-once delivery without deduplication.

pub mod memory;
pub mod redis_cache;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{error, info};

use crate::error::PipelineError;
use crate::models::{AnalyticsResult, PeSummary};

pub use memory::MemoryCache;
pub use redis_cache::RedisCache;

pub const HISTORY_TTL: Duration = Duration::from_secs(3600);
pub const LATEST_TTL: Duration = Duration::from_secs(3600);
pub const SUMMARY_TTL: Duration = Duration::from_secs(1800);
pub const PRICE_TTL: Duration = Duration::from_secs(900);
pub const SYMBOL_SET_TTL: Duration = Duration::from_secs(86400);

/// Set of every symbol with analytics in the cache
pub const SYMBOL_SET_KEY: &str = "pe:symbols";

pub fn history_key(symbol: &str, timestamp: &str) -> String {
    format!("pe:{}:{}", symbol, timestamp)
}

pub fn latest_key(symbol: &str) -> String {
    format!("pe:latest:{}", symbol)
}

pub fn summary_key(symbol: &str) -> String {
    format!("pe:summary:{}", symbol)
}

pub fn price_key(symbol: &str) -> String {
    format!("price:{}", symbol)
}

/// Key/value store with per-key expiry.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn set_with_expiry(&self, key: &str, value: &str, ttl: Duration)
        -> Result<(), PipelineError>;

    /// Add `member` to the set at `key` and (re)arm the set's expiry.
    async fn add_to_set_with_expiry(
        &self,
        key: &str,
        member: &str,
        ttl: Duration,
    ) -> Result<(), PipelineError>;
}

/// One cache mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheOp {
    Set {
        key: String,
        value: String,
        ttl: Duration,
    },
    AddToSet {
        key: String,
        member: String,
        ttl: Duration,
    },
}

impl CacheOp {
    pub fn key(&self) -> &str {
        match self {
            CacheOp::Set { key, .. } | CacheOp::AddToSet { key, .. } => key,
        }
    }

    pub fn ttl(&self) -> Duration {
        match self {
            CacheOp::Set { ttl, .. } | CacheOp::AddToSet { ttl, .. } => *ttl,
        }
    }

    pub async fn apply<S: CacheStore + ?Sized>(&self, store: &S) -> Result<(), PipelineError> {
        match self {
            CacheOp::Set { key, value, ttl } => store.set_with_expiry(key, value, *ttl).await,
            CacheOp::AddToSet { key, member, ttl } => {
                store.add_to_set_with_expiry(key, member, *ttl).await
            }
        }
    }
}

fn to_json<T: Serialize>(key: &str, value: &T) -> Result<String, PipelineError> {
    serde_json::to_string(value).map_err(|e| PipelineError::CacheWrite {
        key: key.to_string(),
        reason: format!("serialization failed: {}", e),
    })
}

/// Render the quote's price as stored: strings unquoted, numbers as written.
pub fn format_price(price: &Value) -> String {
    match price {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// The cache operations for one result, in write order.
pub fn plan_writes(result: &AnalyticsResult) -> Result<Vec<CacheOp>, PipelineError> {
    let symbol = result.symbol.as_str();
    let history = history_key(symbol, &result.timestamp);
    let latest = latest_key(symbol);
    let summary = summary_key(symbol);

    let full = to_json(&history, result)?;
    let summary_json = to_json(&summary, &PeSummary::from(result))?;

    let mut ops = vec![
        CacheOp::Set {
            key: history,
            value: full.clone(),
            ttl: HISTORY_TTL,
        },
        CacheOp::Set {
            key: latest,
            value: full,
            ttl: LATEST_TTL,
        },
        CacheOp::Set {
            key: summary,
            value: summary_json,
            ttl: SUMMARY_TTL,
        },
    ];

    if let Some(price) = &result.market_data.current_price {
        ops.push(CacheOp::Set {
            key: price_key(symbol),
            value: format_price(price),
            ttl: PRICE_TTL,
        });
    }

    ops.push(CacheOp::AddToSet {
        key: SYMBOL_SET_KEY.to_string(),
        member: symbol.to_string(),
        ttl: SYMBOL_SET_TTL,
    });

    Ok(ops)
}

/// Outcome of writing one result. Successful writes are never rolled back.
#[derive(Debug, Default)]
pub struct CacheWriteReport {
    pub written: Vec<String>,
    pub failed: Vec<PipelineError>,
}

impl CacheWriteReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Collapse into a single error naming every key that failed.
    pub fn into_result(self) -> Result<Vec<String>, PipelineError> {
        if self.failed.is_empty() {
            return Ok(self.written);
        }
        let keys: Vec<String> = self
            .failed
            .iter()
            .map(|e| match e {
                PipelineError::CacheWrite { key, .. } => key.clone(),
                other => other.to_string(),
            })
            .collect();
        let reason = self
            .failed
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        Err(PipelineError::CacheWrite {
            key: keys.join(", "),
            reason,
        })
    }
}

/// Writes analytics results to a [`CacheStore`].
pub struct CacheWriter<'a, S: CacheStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: CacheStore + ?Sized> CacheWriter<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Attempt every projection, even after a failure, and report what landed.
    pub async fn write(&self, result: &AnalyticsResult) -> CacheWriteReport {
        let mut report = CacheWriteReport::default();
        let ops = match plan_writes(result) {
            Ok(ops) => ops,
            Err(e) => {
                report.failed.push(e);
                return report;
            }
        };

        for op in ops {
            match op.apply(self.store).await {
                Ok(()) => report.written.push(op.key().to_string()),
                Err(e) => {
                    error!(key = op.key(), "Cache write failed: {}", e);
                    report.failed.push(e);
                }
            }
        }

        info!(
            symbol = %result.symbol,
            price = ?result.market_data.current_price,
            pe_ratio = ?result.analytics.pe_ratio,
            signal = result.analytics.valuation_signal.as_str(),
            written = report.written.len(),
            failed = report.failed.len(),
            "Stored P/E analytics"
        );
        report
    }
}
