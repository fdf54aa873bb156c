//! Metric names and read-only views of the published metric state.

use serde::{Deserialize, Serialize};

/// Cumulative failed scrape cycles
pub const SCRAPE_FAILURES_TOTAL: &str = "exporter_scrape_failures_total";

/// Unix seconds of the latest matching event
pub const LAST_MESSAGE_TIMESTAMP: &str = "last_message_received_timestamp";

/// Ingestion lag in seconds
pub const PROCESSED_TIME: &str = "lostack_processed_time";

/// 1/0 presence or hit count in the trailing window
pub const LOG_PRESENCE: &str = "log_presence";

/// Prometheus metric type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Counter,
    Gauge,
}

/// Name, help text and type of a published metric
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricDescriptor {
    pub name: String,
    pub help: String,
    pub kind: MetricKind,
}

/// Last published values
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricSnapshot {
    /// Unix seconds of the newest matching event
    pub last_message_timestamp: f64,

    /// Seconds between event generation and ingestion
    pub processed_time: f64,

    /// Presence indicator or window hit count
    pub log_presence: f64,

    /// Failed scrape cycles since start
    pub scrape_failures: f64,
}

impl MetricSnapshot {
    /// Whether the gauges (not the failure counter) are equal
    pub fn same_gauges(&self, other: &MetricSnapshot) -> bool {
        self.last_message_timestamp == other.last_message_timestamp
            && self.processed_time == other.processed_time
            && self.log_presence == other.log_presence
    }
}
