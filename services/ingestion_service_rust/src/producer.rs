//! Producer orchestrator: fetch one quote, publish it, report the outcome.

use quotestream_core::clients::{QuoteApiClient, QuoteSource};
use quotestream_core::models::IngestionOutcome;
use quotestream_core::stream::{RedisStream, StreamPublisher, StreamTransport};
use quotestream_core::{PipelineError, RetryPolicy};
use tracing::{error, info};

use crate::config::Config;

/// Fetch then publish. Never errors: every failure becomes a `failure` outcome,
/// and nothing is appended unless the fetch produced a complete quote.
pub async fn run_ingestion<S, T>(source: &S, transport: &T, retry: &RetryPolicy) -> IngestionOutcome
where
    S: QuoteSource + ?Sized,
    T: StreamTransport + ?Sized,
{
    let symbol = source.symbol();
    match fetch_and_publish(source, transport, retry).await {
        Ok(sequence_number) => {
            info!(symbol, sequence_number = %sequence_number, "Successfully processed quote");
            IngestionOutcome::published(symbol, sequence_number)
        }
        Err(e) => {
            error!(symbol, kind = ?e.kind(), "Error in ingestion: {}", e);
            IngestionOutcome::failed(symbol, &e)
        }
    }
}

async fn fetch_and_publish<S, T>(
    source: &S,
    transport: &T,
    retry: &RetryPolicy,
) -> Result<String, PipelineError>
where
    S: QuoteSource + ?Sized,
    T: StreamTransport + ?Sized,
{
    let quote = retry.run(|| source.fetch_quote()).await?;
    StreamPublisher::new(transport, source.symbol()).publish(quote).await
}

/// One stateless invocation: build the HTTP client and a fresh transport
/// connection, run the orchestrator, release both on return.
pub async fn ingest_once(config: &Config) -> IngestionOutcome {
    let source = match QuoteApiClient::new(
        &config.api_url,
        &config.api_key,
        &config.symbol,
        config.request_timeout,
    ) {
        Ok(source) => source,
        Err(e) => {
            error!("Quote client misconfigured: {}", e);
            return IngestionOutcome::failed(&config.symbol, &e);
        }
    };

    let transport = match RedisStream::connect(
        &config.stream_redis_url,
        &config.stream_name,
        config.stream_connect_timeout,
    )
    .await
    {
        Ok(transport) => transport,
        Err(e) => {
            error!(stream = %config.stream_name, "Stream unavailable: {}", e);
            return IngestionOutcome::failed(&config.symbol, &e);
        }
    };

    let retry = RetryPolicy::upstream(config.fetch_max_attempts);
    run_ingestion(&source, &transport, &retry).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use quotestream_core::models::{InvocationStatus, RawQuote};
    use quotestream_core::stream::MemoryStream;
    use quotestream_core::ErrorKind;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Replays a script of quotes; `None` answers with an HTTP 503.
    struct ScriptedSource {
        responses: Vec<Option<RawQuote>>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(responses: Vec<Option<RawQuote>>) -> Self {
            Self {
                responses,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl QuoteSource for ScriptedSource {
        fn symbol(&self) -> &str {
            "DE0005104400"
        }

        async fn fetch_quote(&self) -> Result<RawQuote, PipelineError> {
            let i = self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses[i.min(self.responses.len() - 1)]
                .clone()
                .ok_or_else(|| PipelineError::UpstreamTransport("HTTP 503".into()))
        }
    }

    fn quote() -> RawQuote {
        RawQuote::from_value(json!({"c": 150, "metrics": {"eps": 7.5}})).unwrap()
    }

    #[tokio::test]
    async fn test_success_publishes_one_record() {
        let source = ScriptedSource::new(vec![Some(quote())]);
        let stream = MemoryStream::new("quotes");

        let outcome = run_ingestion(&source, &stream, &RetryPolicy::default()).await;
        assert_eq!(outcome.status, InvocationStatus::Success);
        assert_eq!(outcome.records_published, 1);
        assert_eq!(outcome.sequence_numbers, vec!["1-0".to_string()]);
        assert_eq!(outcome.symbol, "DE0005104400");
        assert_eq!(stream.len().await, 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_publishes_nothing() {
        let source = ScriptedSource::new(vec![None]);
        let stream = MemoryStream::new("quotes");

        let outcome = run_ingestion(&source, &stream, &RetryPolicy::default()).await;
        assert!(!outcome.is_success());
        assert_eq!(outcome.error_kind, Some(ErrorKind::UpstreamTransportFailure));
        assert_eq!(outcome.records_published, 0);
        assert!(stream.is_empty().await);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transient_failure_retried_when_configured() {
        let source = ScriptedSource::new(vec![None, Some(quote())]);
        let stream = MemoryStream::new("quotes");
        let retry = RetryPolicy::new(2, 1, 1, 0.0);

        let outcome = run_ingestion(&source, &stream, &retry).await;
        assert!(outcome.is_success());
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(stream.len().await, 1);
    }

    #[tokio::test]
    async fn test_publish_rejection_is_failure() {
        let source = ScriptedSource::new(vec![Some(quote())]);
        let stream = MemoryStream::new("quotes");
        stream.reject_appends("stream does not exist").await;

        let outcome = run_ingestion(&source, &stream, &RetryPolicy::default()).await;
        assert_eq!(outcome.error_kind, Some(ErrorKind::PublishFailure));
        assert!(outcome.error.unwrap().contains("stream does not exist"));
    }

    #[tokio::test]
    async fn test_outcome_serializes_without_error_on_success() {
        let source = ScriptedSource::new(vec![Some(quote())]);
        let stream = MemoryStream::new("quotes");
        let outcome = run_ingestion(&source, &stream, &RetryPolicy::default()).await;

        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["status"], json!("success"));
        assert!(value.get("error").is_none());
    }
}
