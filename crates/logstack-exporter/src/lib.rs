//! Logstack Exporter
//!
//! Checks an Elasticsearch index for the most recent occurrence of a log
//! message and publishes freshness, ingestion lag and presence as Prometheus
//! metrics.
//!
//! # Pipeline
//! - `trigger` decides when a scrape cycle runs (on every read, or on a timer)
//! - `engine` queries the index and derives the metric values
//! - `telemetry` owns the metric state and serializes cycles
//!
//! # Design Principles
//! - One cycle at a time: gauges are never updated concurrently
//! - Stale on failure: a failed cycle only increments the failure counter
//! - Atomic reload: a cycle sees one configuration in full

pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod handler;
pub mod reload;
pub mod target;
pub mod telemetry;
pub mod trigger;

// Re-export contracts
#[path = "../contracts/mod.rs"]
pub mod contracts;

pub use contracts::*;
pub use error::{ExporterError, Result};
