// Shared models for the quote ingestion and P/E processing services
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ErrorKind, PipelineError};

pub mod quote;

pub use quote::RawQuote;

/// Source tag stamped on every published record
pub const SOURCE_TAG: &str = "quote_api";
/// Version of the analytics payload layout
pub const PROCESSOR_VERSION: &str = "2.0";
pub const PROCESSING_SOURCE: &str = "stream_consumer";
pub const ANALYSIS_TYPE: &str = "pe_ratio";
pub const DEFAULT_CURRENCY: &str = "EUR";

/// Current UTC time as an ISO-8601 string with microsecond precision.
pub fn utc_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

// ============================================================================
// Stream Envelope
// ============================================================================

/// A fetched quote wrapped with ingestion metadata, as appended to the stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    pub data: RawQuote,
    pub ingestion_timestamp: String,
    pub source: String,
    pub request_id: String,
}

impl EnrichedRecord {
    pub fn new(data: RawQuote, request_id: String) -> Self {
        Self {
            data,
            ingestion_timestamp: utc_timestamp(),
            source: SOURCE_TAG.to_string(),
            request_id,
        }
    }
}

/// One unit delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportRecord {
    /// Transport-assigned id; doubles as the sequence token
    pub record_id: String,
    pub partition_key: String,
    /// Base64 of the serialized [`EnrichedRecord`]
    pub data: String,
}

/// A transport record after decoding, with the envelope peeled off.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedRecord {
    pub record_id: String,
    pub partition_key: String,
    pub quote: RawQuote,
    /// Present only when the payload carried the ingestion envelope
    pub ingestion_timestamp: Option<String>,
    pub request_id: Option<String>,
}

// ============================================================================
// P/E Analytics
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeCategory {
    NegativeEarnings,
    Undervalued,
    FairValue,
    GrowthStock,
    Expensive,
    HighlySpeculative,
    InsufficientData,
}

impl PeCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeCategory::NegativeEarnings => "negative_earnings",
            PeCategory::Undervalued => "undervalued",
            PeCategory::FairValue => "fair_value",
            PeCategory::GrowthStock => "growth_stock",
            PeCategory::Expensive => "expensive",
            PeCategory::HighlySpeculative => "highly_speculative",
            PeCategory::InsufficientData => "insufficient_data",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValuationSignal {
    Avoid,
    Buy,
    Hold,
    Sell,
    Unknown,
}

impl ValuationSignal {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValuationSignal::Avoid => "avoid",
            ValuationSignal::Buy => "buy",
            ValuationSignal::Hold => "hold",
            ValuationSignal::Sell => "sell",
            ValuationSignal::Unknown => "unknown",
        }
    }
}

/// P/E analysis block. `pe_ratio` serializes as `null` when not computable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeAnalytics {
    pub pe_ratio: Option<f64>,
    pub pe_category: PeCategory,
    pub valuation_signal: ValuationSignal,
}

/// Market fields copied verbatim from the quote. Absent fields are omitted,
/// never zeroed or coerced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_price: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_price: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high_price: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low_price: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_change: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_change_percent: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_volume: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eps: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shares_outstanding: Option<Value>,
    /// Raw `historical_price` series, copied verbatim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub historical_prices: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultMetadata {
    pub processor_version: String,
    pub processing_source: String,
    pub analysis_type: String,
    /// Raw `t` field from the quote
    pub data_timestamp: Option<Value>,
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_earnings: Option<Value>,
}

/// Terminal artifact of the consumer: one quote plus its derived analytics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsResult {
    pub symbol: String,
    pub timestamp: String,
    pub original_data: RawQuote,
    pub analytics: PeAnalytics,
    pub market_data: MarketData,
    pub metadata: ResultMetadata,
}

/// Compact view stored under the summary key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeSummary {
    pub symbol: String,
    pub last_updated: String,
    pub current_price: Option<Value>,
    pub pe_ratio: Option<f64>,
    pub pe_category: PeCategory,
    pub valuation_signal: ValuationSignal,
    pub data_available: bool,
    pub currency: String,
}

impl From<&AnalyticsResult> for PeSummary {
    fn from(result: &AnalyticsResult) -> Self {
        Self {
            symbol: result.symbol.clone(),
            last_updated: result.timestamp.clone(),
            current_price: result.market_data.current_price.clone(),
            pe_ratio: result.analytics.pe_ratio,
            pe_category: result.analytics.pe_category,
            valuation_signal: result.analytics.valuation_signal,
            data_available: result.analytics.pe_ratio.is_some(),
            currency: result.metadata.currency.clone(),
        }
    }
}

// ============================================================================
// Invocation Results
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationStatus {
    Success,
    Failure,
}

/// Structured result of one producer invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionOutcome {
    pub status: InvocationStatus,
    pub message: String,
    pub symbol: String,
    pub records_published: usize,
    pub sequence_numbers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl IngestionOutcome {
    pub fn published(symbol: &str, sequence_number: String) -> Self {
        Self {
            status: InvocationStatus::Success,
            message: "Quote ingested and appended to stream".to_string(),
            symbol: symbol.to_string(),
            records_published: 1,
            sequence_numbers: vec![sequence_number],
            error: None,
            error_kind: None,
        }
    }

    pub fn failed(symbol: &str, err: &PipelineError) -> Self {
        Self {
            status: InvocationStatus::Failure,
            message: "Failed to ingest quote".to_string(),
            symbol: symbol.to_string(),
            records_published: 0,
            sequence_numbers: Vec::new(),
            error: Some(err.to_string()),
            error_kind: Some(err.kind()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == InvocationStatus::Success
    }
}

/// Diagnostic for one record that could not be processed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedRecord {
    pub record_id: String,
    pub error: String,
    pub error_kind: ErrorKind,
}

/// Structured result of one consumer invocation over a delivered batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub status: InvocationStatus,
    pub message: String,
    pub processed_count: usize,
    pub failed_count: usize,
    pub failed_records: Vec<FailedRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl BatchOutcome {
    pub fn completed(processed_count: usize, failed_records: Vec<FailedRecord>) -> Self {
        Self {
            status: InvocationStatus::Success,
            message: format!("Processed {} records", processed_count),
            processed_count,
            failed_count: failed_records.len(),
            failed_records,
            error: None,
            error_kind: None,
        }
    }

    /// Invocation-level failure: nothing in the batch was processed.
    pub fn aborted(err: &PipelineError) -> Self {
        Self {
            status: InvocationStatus::Failure,
            message: "Critical failure in data processing".to_string(),
            processed_count: 0,
            failed_count: 0,
            failed_records: Vec::new(),
            error: Some(err.to_string()),
            error_kind: Some(err.kind()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == InvocationStatus::Success
    }
}
