use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::PipelineError;
use crate::models::{DecodedRecord, RawQuote, TransportRecord};

/// Decode one transport record into its inner quote.
///
/// Accepts both the enriched envelope `{"data": {...}, ...}` and a bare quote
/// object; the envelope form wins when a `data` key is present. Any failure is
/// reported as a [`PipelineError::MalformedRecord`] naming this record.
pub fn decode_record(record: &TransportRecord) -> Result<DecodedRecord, PipelineError> {
    let id = record.record_id.as_str();

    let bytes = STANDARD
        .decode(record.data.trim())
        .map_err(|e| PipelineError::malformed(id, format!("invalid base64 payload: {}", e)))?;
    let text = std::str::from_utf8(&bytes)
        .map_err(|e| PipelineError::malformed(id, format!("payload is not UTF-8: {}", e)))?;
    let value: Value = serde_json::from_str(text)
        .map_err(|e| PipelineError::malformed(id, format!("payload is not JSON: {}", e)))?;

    let Value::Object(mut outer) = value else {
        return Err(PipelineError::malformed(id, "payload is not a JSON object"));
    };

    debug!(record_id = id, partition_key = %record.partition_key, "Decoding record");

    let (quote, ingestion_timestamp, request_id) = match outer.remove("data") {
        Some(Value::Object(inner)) => (
            RawQuote::new(inner),
            take_string(&mut outer, "ingestion_timestamp"),
            take_string(&mut outer, "request_id"),
        ),
        Some(_) => {
            return Err(PipelineError::malformed(id, "`data` is not a JSON object"));
        }
        None => (RawQuote::new(outer), None, None),
    };

    Ok(DecodedRecord {
        record_id: record.record_id.clone(),
        partition_key: record.partition_key.clone(),
        quote,
        ingestion_timestamp,
        request_id,
    })
}

fn take_string(map: &mut Map<String, Value>, key: &str) -> Option<String> {
    match map.remove(key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        _ => None,
    }
}
