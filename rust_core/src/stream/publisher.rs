use tracing::{error, info};
use uuid::Uuid;

use super::StreamTransport;
use crate::error::PipelineError;
use crate::models::{EnrichedRecord, RawQuote};

/// Wraps quotes with ingestion metadata and appends them to the stream.
///
/// Every record for a symbol goes under the same partition key so the
/// transport keeps them in one ordered sub-sequence.
pub struct StreamPublisher<'a, T: StreamTransport + ?Sized> {
    transport: &'a T,
    partition_key: String,
}

impl<'a, T: StreamTransport + ?Sized> StreamPublisher<'a, T> {
    pub fn new(transport: &'a T, partition_key: &str) -> Self {
        Self {
            transport,
            partition_key: partition_key.to_string(),
        }
    }

    pub fn partition_key(&self) -> &str {
        &self.partition_key
    }

    /// Enrich, serialize and append one quote. Returns the sequence token.
    pub async fn publish(&self, quote: RawQuote) -> Result<String, PipelineError> {
        let record = EnrichedRecord::new(quote, Uuid::new_v4().to_string());
        let payload = serde_json::to_vec(&record)
            .map_err(|e| PipelineError::Publish(format!("failed to serialize record: {}", e)))?;

        let sequence_number = self
            .transport
            .append(&self.partition_key, &payload)
            .await
            .map_err(|e| {
                error!(stream = self.transport.stream_name(), "Failed to append record: {}", e);
                e
            })?;

        info!(
            stream = self.transport.stream_name(),
            partition_key = %self.partition_key,
            request_id = %record.request_id,
            sequence_number = %sequence_number,
            "Sent record to stream"
        );
        Ok(sequence_number)
    }
}
