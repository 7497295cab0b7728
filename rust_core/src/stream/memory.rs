//! In-process stream transport
//!
//! Keeps records in a vector with Redis-style `"<n>-0"` ids. Used for local
//! runs and tests; ordering and delivery shape match [`super::RedisStream`].

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{encode_payload, StreamPosition, StreamTransport};
use crate::error::PipelineError;
use crate::models::TransportRecord;

#[derive(Debug, Default)]
struct State {
    records: Vec<TransportRecord>,
    next_seq: u64,
    reject_reason: Option<String>,
}

#[derive(Debug)]
pub struct MemoryStream {
    name: String,
    state: Mutex<State>,
}

impl MemoryStream {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: Mutex::new(State {
                next_seq: 1,
                ..Default::default()
            }),
        }
    }

    /// Append an already-encoded `data` field verbatim, bypassing encoding.
    pub async fn push_encoded(&self, partition_key: &str, data: &str) -> String {
        let mut state = self.state.lock().await;
        push(&mut state, partition_key, data.to_string())
    }

    /// Make every following append fail with `reason`.
    pub async fn reject_appends(&self, reason: &str) {
        self.state.lock().await.reject_reason = Some(reason.to_string());
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.records.is_empty()
    }
}

fn push(state: &mut State, partition_key: &str, data: String) -> String {
    let record_id = format!("{}-0", state.next_seq);
    state.next_seq += 1;
    state.records.push(TransportRecord {
        record_id: record_id.clone(),
        partition_key: partition_key.to_string(),
        data,
    });
    record_id
}

/// Numeric part of a `"<n>-<m>"` id, used for ordering comparisons.
fn sequence_of(record_id: &str) -> Option<u64> {
    record_id.split('-').next()?.parse().ok()
}

#[async_trait]
impl StreamTransport for MemoryStream {
    fn stream_name(&self) -> &str {
        &self.name
    }

    async fn attach(&self, position: StreamPosition) -> Result<StreamPosition, PipelineError> {
        if position != StreamPosition::Latest {
            return Ok(position);
        }
        let state = self.state.lock().await;
        Ok(StreamPosition::After(format!("{}-0", state.next_seq - 1)))
    }

    async fn append(&self, partition_key: &str, payload: &[u8]) -> Result<String, PipelineError> {
        let mut state = self.state.lock().await;
        if let Some(reason) = &state.reject_reason {
            return Err(PipelineError::Publish(reason.clone()));
        }
        Ok(push(&mut state, partition_key, encode_payload(payload)))
    }

    async fn read_batch(
        &self,
        position: &StreamPosition,
        max_records: usize,
    ) -> Result<Vec<TransportRecord>, PipelineError> {
        let state = self.state.lock().await;
        let after = match position {
            StreamPosition::Beginning => 0,
            StreamPosition::Latest => return Ok(Vec::new()),
            StreamPosition::After(id) => sequence_of(id).ok_or_else(|| {
                PipelineError::StreamRead(format!("invalid stream position {}", id))
            })?,
        };

        Ok(state
            .records
            .iter()
            .filter(|r| sequence_of(&r.record_id).map_or(false, |seq| seq > after))
            .take(max_records)
            .cloned()
            .collect())
    }
}
