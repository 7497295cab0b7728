//! Quotestream Core - quote ingestion and P/E analytics pipeline.
//!
//! This crate provides:
//! - Quote API client with bounded timeout and optional retry
//! - Ordered stream transport (Redis Streams, in-memory) with publisher and decoder
//! - P/E ratio derivation, categorization and valuation signal
//! - Market data extraction from loosely-typed quote documents
//! - Cache projections of analytics results with per-key TTLs
//! - Structured invocation outcomes and a categorized error type

pub mod analytics;
pub mod cache;
pub mod clients;
pub mod error;
pub mod models;
pub mod retry;
pub mod stream;

pub use analytics::analyze;
pub use cache::{CacheStore, CacheWriter};
pub use clients::{QuoteApiClient, QuoteSource};
pub use error::{ErrorKind, PipelineError};
pub use models::{AnalyticsResult, BatchOutcome, IngestionOutcome, RawQuote};
pub use retry::RetryPolicy;
pub use stream::{StreamPosition, StreamTransport};
