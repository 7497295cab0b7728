use std::env;
use std::time::Duration;

use quotestream_core::PipelineError;

pub const DEFAULT_SYMBOL: &str = "DE0005104400";
pub const DEFAULT_STREAM_REDIS_URL: &str = "redis://localhost:6379";

#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub api_key: String,
    pub symbol: String,

    pub stream_name: String,
    pub stream_redis_url: String,
    pub stream_connect_timeout: Duration,

    pub interval: Duration,
    pub request_timeout: Duration,
    pub fetch_max_attempts: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, PipelineError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any variable source; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, PipelineError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_url = required(&lookup, "QUOTE_API_URL")?;
        let api_key = required(&lookup, "QUOTE_API_KEY")?;
        let symbol = optional(&lookup, "QUOTE_SYMBOL").unwrap_or_else(|| DEFAULT_SYMBOL.to_string());

        let stream_name = required(&lookup, "STREAM_NAME")?;
        let stream_redis_url = optional(&lookup, "STREAM_REDIS_URL")
            .unwrap_or_else(|| DEFAULT_STREAM_REDIS_URL.to_string());

        let interval = Duration::from_secs(parse_u64_env(&lookup, "INGESTION_INTERVAL_SECS", 300)?);
        let request_timeout =
            Duration::from_secs(parse_u64_env(&lookup, "QUOTE_REQUEST_TIMEOUT_SECS", 25)?);
        let fetch_max_attempts = parse_u64_env(&lookup, "FETCH_MAX_ATTEMPTS", 1)?.clamp(1, 10) as u32;

        if interval.is_zero() {
            return Err(PipelineError::Configuration(
                "INGESTION_INTERVAL_SECS must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            api_url,
            api_key,
            symbol,
            stream_name,
            stream_redis_url,
            stream_connect_timeout: Duration::from_secs(5),
            interval,
            request_timeout,
            fetch_max_attempts,
        })
    }
}

fn optional<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str) -> Option<String> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str) -> Result<String, PipelineError> {
    optional(lookup, key)
        .ok_or_else(|| PipelineError::Configuration(format!("{key} must be set")))
}

fn parse_u64_env<F: Fn(&str) -> Option<String>>(
    lookup: &F,
    key: &str,
    default: u64,
) -> Result<u64, PipelineError> {
    match optional(lookup, key) {
        None => Ok(default),
        Some(raw) => raw.parse::<u64>().map_err(|_| {
            PipelineError::Configuration(format!("Invalid {key}: {raw} (expected integer)"))
        }),
    }
}
