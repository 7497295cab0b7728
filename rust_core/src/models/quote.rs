//! Raw quote payload
//!
//! The quote API returns a loosely typed JSON object. Prices may arrive as
//! numbers or as numeric strings, and any field may be missing or null.
//! `RawQuote` keeps the object verbatim and exposes accessors that report
//! presence explicitly, so a missing price is never mistaken for zero.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Current/close price
pub const FIELD_CURRENT_PRICE: &str = "c";
pub const FIELD_OPEN_PRICE: &str = "o";
pub const FIELD_HIGH_PRICE: &str = "h";
pub const FIELD_LOW_PRICE: &str = "l";
/// Absolute price change
pub const FIELD_PRICE_CHANGE: &str = "d";
/// Percentage price change
pub const FIELD_PRICE_CHANGE_PERCENT: &str = "dp";
pub const FIELD_VOLUME: &str = "v";
/// Unix timestamp of the quote as reported by the API
pub const FIELD_DATA_TIMESTAMP: &str = "t";
pub const FIELD_CURRENCY: &str = "currency";
pub const FIELD_HISTORICAL_PRICE: &str = "historical_price";
pub const FIELD_EARNINGS_ANNOUNCEMENT: &str = "earningsAnnouncement";
pub const FIELD_METRICS: &str = "metrics";

/// Keys inside the nested `metrics` object
pub mod metrics {
    pub const PE_RATIO: &str = "pe/ratio";
    pub const EPS: &str = "eps";
    pub const MARKET_CAP: &str = "marketCapitalization";
    pub const AVG_VOLUME: &str = "avgVolume";
    pub const SHARES_OUTSTANDING: &str = "sharesOutstanding";
}

/// One quote for one identifier at one instant, as returned by the API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawQuote(Map<String, Value>);

impl RawQuote {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Wrap a JSON value, accepting only objects.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// Raw field value. Absent and JSON null both yield `None`.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.0.get(name).filter(|v| !v.is_null())
    }

    /// Field parsed as a finite number (numeric strings accepted).
    pub fn number(&self, name: &str) -> Option<f64> {
        self.field(name).and_then(parse_number)
    }

    /// Field as a string, if it is one.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.field(name).and_then(Value::as_str)
    }

    /// Raw value under the nested `metrics` object.
    pub fn metric(&self, name: &str) -> Option<&Value> {
        self.field(FIELD_METRICS)
            .and_then(Value::as_object)
            .and_then(|m| m.get(name))
            .filter(|v| !v.is_null())
    }

    pub fn metric_number(&self, name: &str) -> Option<f64> {
        self.metric(name).and_then(parse_number)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for RawQuote {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

/// Parse a JSON number or numeric string. Non-finite results are rejected.
pub fn parse_number(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    parsed.is_finite().then_some(parsed)
}
