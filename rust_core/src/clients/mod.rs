//! Upstream data clients
//!
//! Defines the quote source interface the producer depends on and its HTTP
//! implementation.

pub mod quote_api;

use async_trait::async_trait;

use crate::error::PipelineError;
use crate::models::RawQuote;

pub use quote_api::QuoteApiClient;

/// Something that can produce the current quote for one tracked identifier.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Identifier this source fetches quotes for.
    fn symbol(&self) -> &str;

    /// Fetch one quote. Failures are typed as upstream timeout, transport or
    /// decode errors and are never retried here.
    async fn fetch_quote(&self) -> Result<RawQuote, PipelineError>;
}
