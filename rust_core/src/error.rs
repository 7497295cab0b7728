//! Pipeline error taxonomy
//!
//! Every failure the producer or consumer can hit maps to one variant here so
//! that structured results can carry a stable category next to the message.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors raised anywhere in the ingestion/processing pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Missing or invalid credential, URL or identifier. Never retried.
    #[error("configuration fault: {0}")]
    Configuration(String),

    #[error("quote API did not respond within {0:?}")]
    UpstreamTimeout(Duration),

    /// Network, DNS, TLS or non-2xx status from the quote API.
    #[error("quote API request failed: {0}")]
    UpstreamTransport(String),

    #[error("quote API response could not be decoded: {0}")]
    UpstreamDecode(String),

    /// The transport rejected an append (stream missing, throughput exceeded, ...).
    #[error("stream append rejected: {0}")]
    Publish(String),

    #[error("stream read failed: {0}")]
    StreamRead(String),

    #[error("stream unavailable: {0}")]
    StreamUnavailable(String),

    #[error("malformed record {record_id}: {reason}")]
    MalformedRecord { record_id: String, reason: String },

    #[error("cache write to {key} failed: {reason}")]
    CacheWrite { key: String, reason: String },

    /// The cache could not be reached at all. Fatal for a consumer invocation.
    #[error("cache unavailable: {0}")]
    CacheUnavailable(String),
}

/// Stable category of a [`PipelineError`], carried in structured results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ConfigurationFault,
    UpstreamTimeout,
    UpstreamTransportFailure,
    UpstreamDecodeFailure,
    PublishFailure,
    StreamReadFailure,
    StreamUnavailable,
    MalformedRecord,
    CacheWriteFailure,
    CacheUnavailable,
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::ConfigurationFault,
            Self::UpstreamTimeout(_) => ErrorKind::UpstreamTimeout,
            Self::UpstreamTransport(_) => ErrorKind::UpstreamTransportFailure,
            Self::UpstreamDecode(_) => ErrorKind::UpstreamDecodeFailure,
            Self::Publish(_) => ErrorKind::PublishFailure,
            Self::StreamRead(_) => ErrorKind::StreamReadFailure,
            Self::StreamUnavailable(_) => ErrorKind::StreamUnavailable,
            Self::MalformedRecord { .. } => ErrorKind::MalformedRecord,
            Self::CacheWrite { .. } => ErrorKind::CacheWriteFailure,
            Self::CacheUnavailable(_) => ErrorKind::CacheUnavailable,
        }
    }

    /// Whether a fresh attempt at the same upstream call could succeed.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::UpstreamTimeout(_) | Self::UpstreamTransport(_))
    }

    pub(crate) fn malformed(record_id: &str, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            record_id: record_id.to_string(),
            reason: reason.into(),
        }
    }
}
