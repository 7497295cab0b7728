//! Redis Streams transport
//!
//! Each record is one stream entry with two fields, `partition_key` and
//! `data` (base64 payload). The entry id is the sequence token and record id.

use async_trait::async_trait;
use redis::aio::Connection;
use redis::streams::{StreamRangeReply, StreamReadOptions, StreamReadReply};
use redis::{AsyncCommands, Client};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{encode_payload, StreamPosition, StreamTransport, DATA_FIELD, PARTITION_KEY_FIELD};
use crate::error::PipelineError;
use crate::models::TransportRecord;

/// Default time a read blocks waiting for new entries
pub const DEFAULT_BLOCK_MS: usize = 5_000;

pub struct RedisStream {
    name: String,
    block_ms: usize,
    connection: Mutex<Connection>,
}

impl RedisStream {
    /// Open a dedicated connection to the stream's Redis server.
    pub async fn connect(
        redis_url: &str,
        stream_name: &str,
        connect_timeout: Duration,
    ) -> Result<Self, PipelineError> {
        if stream_name.trim().is_empty() {
            return Err(PipelineError::Configuration("stream name is empty".into()));
        }
        let client = Client::open(redis_url)
            .map_err(|e| PipelineError::Configuration(format!("invalid stream Redis URL: {}", e)))?;

        let connection = tokio::time::timeout(connect_timeout, client.get_async_connection())
            .await
            .map_err(|_| {
                PipelineError::StreamUnavailable(format!(
                    "connect timed out after {:?}",
                    connect_timeout
                ))
            })?
            .map_err(|e| PipelineError::StreamUnavailable(e.to_string()))?;

        debug!(stream = stream_name, "Connected to stream transport");
        Ok(Self {
            name: stream_name.to_string(),
            block_ms: DEFAULT_BLOCK_MS,
            connection: Mutex::new(connection),
        })
    }

    /// How long `read_batch` waits for new entries before returning empty.
    pub fn with_block_ms(mut self, block_ms: usize) -> Self {
        self.block_ms = block_ms;
        self
    }
}

fn position_id(position: &StreamPosition) -> &str {
    match position {
        StreamPosition::Beginning => "0-0",
        StreamPosition::Latest => "$",
        StreamPosition::After(id) => id.as_str(),
    }
}

#[async_trait]
impl StreamTransport for RedisStream {
    fn stream_name(&self) -> &str {
        &self.name
    }

    async fn attach(&self, position: StreamPosition) -> Result<StreamPosition, PipelineError> {
        if position != StreamPosition::Latest {
            return Ok(position);
        }
        let mut conn = self.connection.lock().await;
        let reply: StreamRangeReply = conn
            .xrevrange_count(&self.name, "+", "-", 1)
            .await
            .map_err(|e| PipelineError::StreamRead(e.to_string()))?;

        let pinned = match reply.ids.first() {
            Some(newest) => StreamPosition::After(newest.id.clone()),
            None => StreamPosition::After("0-0".to_string()),
        };
        info!(stream = %self.name, position = ?pinned, "Attached to stream");
        Ok(pinned)
    }

    async fn append(&self, partition_key: &str, payload: &[u8]) -> Result<String, PipelineError> {
        let data = encode_payload(payload);
        let mut conn = self.connection.lock().await;
        redis::cmd("XADD")
            .arg(&self.name)
            .arg("*")
            .arg(PARTITION_KEY_FIELD)
            .arg(partition_key)
            .arg(DATA_FIELD)
            .arg(data)
            .query_async::<_, String>(&mut *conn)
            .await
            .map_err(|e| PipelineError::Publish(e.to_string()))
    }

    async fn read_batch(
        &self,
        position: &StreamPosition,
        max_records: usize,
    ) -> Result<Vec<TransportRecord>, PipelineError> {
        let options = StreamReadOptions::default()
            .count(max_records.max(1))
            .block(self.block_ms);

        let mut conn = self.connection.lock().await;
        let reply: Option<StreamReadReply> = conn
            .xread_options(&[self.name.as_str()], &[position_id(position)], &options)
            .await
            .map_err(|e| PipelineError::StreamRead(e.to_string()))?;

        let mut records = Vec::new();
        for key in reply.map(|r| r.keys).unwrap_or_default() {
            for entry in key.ids {
                let partition_key: String = entry.get(PARTITION_KEY_FIELD).unwrap_or_default();
                let data: Option<String> = entry.get(DATA_FIELD);
                if data.is_none() {
                    warn!(record_id = %entry.id, "Stream entry has no data field");
                }
                records.push(TransportRecord {
                    record_id: entry.id,
                    partition_key,
                    data: data.unwrap_or_default(),
                });
            }
        }
        Ok(records)
    }
}
