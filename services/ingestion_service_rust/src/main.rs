use anyhow::{Context, Result};
use dotenv::dotenv;
use ingestion_service_rust::{ingest_once, Config};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    info!("Starting Quote Ingestion Service...");

    let config = Config::from_env().context("Invalid ingestion configuration")?;
    info!(
        "Tracking {} -> stream {} every {}s",
        config.symbol,
        config.stream_name,
        config.interval.as_secs()
    );

    let mut ticker = interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let outcome = ingest_once(&config).await;
                match serde_json::to_string(&outcome) {
                    Ok(json) if outcome.is_success() => info!("{}", json),
                    Ok(json) => warn!("{}", json),
                    Err(e) => error!("Failed to serialize ingestion outcome: {}", e),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    info!("Quote Ingestion Service stopped");
    Ok(())
}
