use anyhow::{Context, Result};
use dotenv::dotenv;
use processing_service_rust::{process_with_redis, Config};
use quotestream_core::stream::{RedisStream, StreamPosition, StreamTransport};
use quotestream_core::PipelineError;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Connect to the stream, retrying transient failures until it answers.
async fn open_stream(config: &Config) -> Result<RedisStream, PipelineError> {
    loop {
        match RedisStream::connect(
            &config.stream_redis_url,
            &config.stream_name,
            config.stream_connect_timeout,
        )
        .await
        {
            Ok(stream) => return Ok(stream.with_block_ms(config.block_ms)),
            Err(e @ PipelineError::Configuration(_)) => return Err(e),
            Err(e) => {
                error!(
                    "Failed to connect to stream {}: {}. Retrying in {}s",
                    config.stream_name,
                    e,
                    config.redelivery_backoff.as_secs()
                );
                tokio::time::sleep(config.redelivery_backoff).await;
            }
        }
    }
}

/// Connect and pin the starting position to the newest entry.
async fn attach_latest(config: &Config) -> Result<(RedisStream, StreamPosition), PipelineError> {
    loop {
        let stream = open_stream(config).await?;
        match stream.attach(StreamPosition::Latest).await {
            Ok(position) => return Ok((stream, position)),
            Err(e) => {
                error!("Failed to attach to stream {}: {}", config.stream_name, e);
                tokio::time::sleep(config.redelivery_backoff).await;
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    info!("Starting P/E Processing Service...");

    let config = Config::from_env().context("Invalid processing configuration")?;
    let (mut stream, mut position) = attach_latest(&config)
        .await
        .context("Failed to open stream")?;

    info!(
        "Consuming stream {} from {:?} (batch size {})",
        config.stream_name, position, config.batch_size
    );

    loop {
        let read = tokio::select! {
            read = stream.read_batch(&position, config.batch_size) => read,
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        };

        let records = match read {
            Ok(records) => records,
            Err(e) => {
                error!(
                    "Stream read failed: {}. Reconnecting in {}s",
                    e,
                    config.redelivery_backoff.as_secs()
                );
                tokio::time::sleep(config.redelivery_backoff).await;
                stream = open_stream(&config).await.context("Failed to reopen stream")?;
                continue;
            }
        };

        if records.is_empty() {
            continue;
        }

        let outcome = process_with_redis(&config, &records).await;
        match serde_json::to_string(&outcome) {
            Ok(json) if outcome.is_success() => info!("{}", json),
            Ok(json) => warn!("{}", json),
            Err(e) => error!("Failed to serialize batch outcome: {}", e),
        }

        if outcome.is_success() {
            position = position.advance(&records);
        } else {
            warn!(
                "Redelivering {} records in {}s",
                records.len(),
                config.redelivery_backoff.as_secs()
            );
            tokio::time::sleep(config.redelivery_backoff).await;
        }
    }

    info!("P/E Processing Service stopped");
    Ok(())
}
