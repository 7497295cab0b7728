use std::env;
use std::time::Duration;

use quotestream_core::PipelineError;

pub const DEFAULT_TRACKED_SYMBOL: &str = "DE0005104400";
pub const DEFAULT_STREAM_REDIS_URL: &str = "redis://localhost:6379";

#[derive(Debug, Clone)]
pub struct Config {
    pub cache_redis_url: String,
    pub cache_connect_timeout: Duration,

    pub stream_name: String,
    pub stream_redis_url: String,
    pub stream_connect_timeout: Duration,
    pub batch_size: usize,
    pub block_ms: usize,

    pub tracked_symbol: String,
    pub redelivery_backoff: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, PipelineError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, PipelineError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let cache_redis_url = required(&lookup, "CACHE_REDIS_URL")?;
        let cache_connect_timeout =
            Duration::from_secs(parse_env(&lookup, "CACHE_CONNECT_TIMEOUT_SECS", 5)?.max(1));

        let stream_name = required(&lookup, "STREAM_NAME")?;
        let stream_redis_url = optional(&lookup, "STREAM_REDIS_URL")
            .unwrap_or_else(|| DEFAULT_STREAM_REDIS_URL.to_string());
        let stream_connect_timeout =
            Duration::from_secs(parse_env(&lookup, "STREAM_CONNECT_TIMEOUT_SECS", 5)?.max(1));
        let batch_size = parse_env(&lookup, "STREAM_BATCH_SIZE", 100)?.max(1) as usize;
        let block_ms = parse_env(&lookup, "STREAM_BLOCK_MS", 5_000)? as usize;

        let tracked_symbol = optional(&lookup, "TRACKED_SYMBOL")
            .unwrap_or_else(|| DEFAULT_TRACKED_SYMBOL.to_string());
        let redelivery_backoff =
            Duration::from_secs(parse_env(&lookup, "REDELIVERY_BACKOFF_SECS", 5)?);

        Ok(Self {
            cache_redis_url,
            cache_connect_timeout,
            stream_name,
            stream_redis_url,
            stream_connect_timeout,
            batch_size,
            block_ms,
            tracked_symbol,
            redelivery_backoff,
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

fn parse_env<F: Fn(&str) -> Option<String>>(
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

#[cfg(test)]
mod tests {
    use super::*;

    fn base(key: &str) -> Option<String> {
        match key {
            "CACHE_REDIS_URL" => Some("redis://cache:6379".to_string()),
            "STREAM_NAME" => Some("quotes".to_string()),
            _ => None,
        }
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(base).unwrap();
        assert_eq!(config.cache_connect_timeout, Duration::from_secs(5));
        assert_eq!(config.stream_redis_url, DEFAULT_STREAM_REDIS_URL);
        assert_eq!(config.stream_connect_timeout, Duration::from_secs(5));
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.block_ms, 5_000);
        assert_eq!(config.tracked_symbol, DEFAULT_TRACKED_SYMBOL);
        assert_eq!(config.redelivery_backoff, Duration::from_secs(5));
    }

    #[test]
    fn test_missing_cache_url_is_configuration_fault() {
        let err = Config::from_lookup(|key| match key {
            "STREAM_NAME" => Some("quotes".to_string()),
            _ => None,
        })
        .unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(ref m) if m.contains("CACHE_REDIS_URL")));
    }

    #[test]
    fn test_batch_size_override_and_floor() {
        let config = Config::from_lookup(|key| match key {
            "STREAM_BATCH_SIZE" => Some("0".to_string()),
            other => base(other),
        })
        .unwrap();
        assert_eq!(config.batch_size, 1);
    }

    #[test]
    fn test_stream_and_cache_timeouts_are_independent() {
        let config = Config::from_lookup(|key| match key {
            "CACHE_CONNECT_TIMEOUT_SECS" => Some("2".to_string()),
            "STREAM_CONNECT_TIMEOUT_SECS" => Some("30".to_string()),
            other => base(other),
        })
        .unwrap();
        assert_eq!(config.cache_connect_timeout, Duration::from_secs(2));
        assert_eq!(config.stream_connect_timeout, Duration::from_secs(30));

        let floored = Config::from_lookup(|key| match key {
            "STREAM_CONNECT_TIMEOUT_SECS" => Some("0".to_string()),
            other => base(other),
        })
        .unwrap();
        assert_eq!(floored.stream_connect_timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_invalid_number_names_variable() {
        let err = Config::from_lookup(|key| match key {
            "STREAM_BLOCK_MS" => Some("-1".to_string()),
            other => base(other),
        })
        .unwrap_err();
        assert!(err.to_string().contains("STREAM_BLOCK_MS"));
    }
}
