//! P/E Processing Service Library
//!
//! Exposes the consumer configuration and orchestrator for the binary and tests.

pub mod config;
pub mod consumer;

pub use config::Config;
pub use consumer::{process_batch, process_record, process_with_redis, run_invocation};
