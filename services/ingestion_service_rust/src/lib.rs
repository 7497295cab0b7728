//! Quote Ingestion Service Library
//!
//! Exposes the producer configuration and orchestrator for the binary and tests.

pub mod config;
pub mod producer;

pub use config::Config;
pub use producer::{ingest_once, run_ingestion};
