//! Ordered append-only transport between producer and consumer
//!
//! Records are appended under a partition key and delivered in order as
//! [`TransportRecord`]s whose `data` is the base64 of the appended bytes.

pub mod decoder;
pub mod memory;
pub mod publisher;
pub mod redis_stream;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::error::PipelineError;
use crate::models::TransportRecord;

pub use decoder::decode_record;
pub use memory::MemoryStream;
pub use publisher::StreamPublisher;
pub use redis_stream::RedisStream;

/// Field names of one stream entry
pub const PARTITION_KEY_FIELD: &str = "partition_key";
pub const DATA_FIELD: &str = "data";

/// Where a reader starts or resumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamPosition {
    /// Everything retained in the stream
    Beginning,
    /// Only records appended after the reader attaches
    Latest,
    /// Records strictly after the given record id
    After(String),
}

impl StreamPosition {
    /// Position to resume from once `records` have been handled.
    pub fn advance(&self, records: &[TransportRecord]) -> StreamPosition {
        match records.last() {
            Some(last) => StreamPosition::After(last.record_id.clone()),
            None => self.clone(),
        }
    }
}

#[async_trait]
pub trait StreamTransport: Send + Sync {
    fn stream_name(&self) -> &str;

    /// Pin a starting position to a concrete record id so that records
    /// appended between two reads are not skipped.
    async fn attach(&self, position: StreamPosition) -> Result<StreamPosition, PipelineError> {
        Ok(position)
    }

    /// Append one payload and return the transport-assigned sequence token.
    async fn append(&self, partition_key: &str, payload: &[u8]) -> Result<String, PipelineError>;

    /// Read up to `max_records` records after `position`, in transport order.
    async fn read_batch(
        &self,
        position: &StreamPosition,
        max_records: usize,
    ) -> Result<Vec<TransportRecord>, PipelineError>;
}

/// Encode payload bytes the way the transport delivers them.
pub fn encode_payload(payload: &[u8]) -> String {
    STANDARD.encode(payload)
}
