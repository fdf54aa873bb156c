//! Prometheus metrics for the Logstack Exporter
//!
//! Published metrics:
//! - `exporter_scrape_failures_total` (counter) - Failed scrape cycles
//! - `last_message_received_timestamp` (gauge) - Unix seconds of the newest match
//! - `lostack_processed_time` (gauge) - Ingestion lag of the newest match
//! - `log_presence` (gauge) - 1/0, or hit count in range mode
//!
//! Gauges change only when a cycle succeeds. A failed cycle increments the
//! failure counter and leaves the last known values in place.
//!
//! # Example
//!
//! ```rust,no_run
//! use logstack_exporter::telemetry::MetricPublisher;
//! use logstack_exporter::{QueryMode, ScrapeOutcome, ScrapeResult};
//!
//! # async fn demo() -> logstack_exporter::Result<()> {
//! let publisher = MetricPublisher::new()?;
//!
//! let cycle = publisher.begin_cycle().await;
//! cycle.apply(&ScrapeResult::Success(ScrapeOutcome::no_hit(QueryMode::Range)));
//!
//! println!("{}", publisher.encode_text()?);
//! # Ok(())
//! # }
//! ```

use prometheus::core::Collector;
use prometheus::{Counter, Encoder, Gauge, Registry, TextEncoder};
use std::sync::{Mutex, MutexGuard};

use crate::contracts::*;
use crate::error::{ExporterError, Result};

/// Owner of the exporter's metric state
pub struct MetricPublisher {
    registry: Registry,

    /// Failed scrape cycles
    scrape_failures: Counter,

    /// Unix seconds of the newest matching event
    last_timestamp: Gauge,

    /// Seconds between generation and ingestion
    processed_time: Gauge,

    /// Presence indicator or window hit count
    log_presence: Gauge,

    /// Held for a whole scrape cycle, backend I/O included
    cycle: tokio::sync::Mutex<()>,

    /// Held while gauges are written or read, never across I/O
    publish: Mutex<()>,
}

impl MetricPublisher {
    /// Create a publisher with its own registry
    pub fn new() -> Result<Self> {
        Self::with_registry(Registry::new())
    }

    /// Create a publisher registering into an existing registry
    pub fn with_registry(registry: Registry) -> Result<Self> {
        let scrape_failures = Counter::new(
            SCRAPE_FAILURES_TOTAL,
            "Number of errors while scraping the search index",
        )?;

        let last_timestamp = Gauge::new(
            LAST_MESSAGE_TIMESTAMP,
            "Timestamp of the last matching log entry in Unix seconds",
        )?;

        let processed_time = Gauge::new(
            PROCESSED_TIME,
            "Difference in seconds between log generation and arrival in the ingestion pipeline",
        )?;

        let log_presence = Gauge::new(
            LOG_PRESENCE,
            "1 if the message was found, or the number of matches in the trailing window",
        )?;

        registry.register(Box::new(scrape_failures.clone()))?;
        registry.register(Box::new(last_timestamp.clone()))?;
        registry.register(Box::new(processed_time.clone()))?;
        registry.register(Box::new(log_presence.clone()))?;

        Ok(Self {
            registry,
            scrape_failures,
            last_timestamp,
            processed_time,
            log_presence,
            cycle: tokio::sync::Mutex::new(()),
            publish: Mutex::new(()),
        })
    }

    /// Also export `process_*` metrics for this process
    #[cfg(target_os = "linux")]
    pub fn register_process_metrics(&self) -> Result<()> {
        let collector = prometheus::process_collector::ProcessCollector::for_self();
        self.registry.register(Box::new(collector))?;
        Ok(())
    }

    #[cfg(not(target_os = "linux"))]
    pub fn register_process_metrics(&self) -> Result<()> {
        Ok(())
    }

    /// Wait for exclusive use of the metric state for one scrape cycle
    pub async fn begin_cycle(&self) -> CycleGuard<'_> {
        CycleGuard {
            publisher: self,
            _cycle: self.cycle.lock().await,
        }
    }

    /// Every published metric, whether or not it has a value yet
    pub fn describe(&self) -> Vec<MetricDescriptor> {
        let collectors: [(&dyn Collector, MetricKind); 4] = [
            (&self.scrape_failures, MetricKind::Counter),
            (&self.last_timestamp, MetricKind::Gauge),
            (&self.processed_time, MetricKind::Gauge),
            (&self.log_presence, MetricKind::Gauge),
        ];

        collectors
            .iter()
            .flat_map(|(collector, kind)| {
                collector.desc().into_iter().map(move |desc| MetricDescriptor {
                    name: desc.fq_name.clone(),
                    help: desc.help.clone(),
                    kind: *kind,
                })
            })
            .collect()
    }

    /// Current values
    pub fn snapshot(&self) -> MetricSnapshot {
        let _publish = self.lock_publish();
        MetricSnapshot {
            last_message_timestamp: self.last_timestamp.get(),
            processed_time: self.processed_time.get(),
            log_presence: self.log_presence.get(),
            scrape_failures: self.scrape_failures.get(),
        }
    }

    /// Encode all metrics in the Prometheus text format
    pub fn encode_text(&self) -> Result<String> {
        let families = {
            let _publish = self.lock_publish();
            self.registry.gather()
        };

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&families, &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| ExporterError::Metrics(prometheus::Error::Msg(e.to_string())))
    }

    fn lock_publish(&self) -> MutexGuard<'_, ()> {
        match self.publish.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn apply(&self, result: &ScrapeResult) {
        let _publish = self.lock_publish();

        match result {
            ScrapeResult::Success(outcome) => match (outcome.mode, outcome.hit_found) {
                (QueryMode::Latest, true) => {
                    if let Some(freshness) = outcome.freshness_seconds {
                        self.last_timestamp.set(freshness);
                    }
                    if let Some(lag) = outcome.lag_seconds {
                        self.processed_time.set(lag);
                    }
                    self.log_presence.set(1.0);
                }
                (QueryMode::Latest, false) => {
                    tracing::debug!("No matching document, keeping last known values");
                }
                (QueryMode::Range, _) => {
                    self.log_presence.set(outcome.total_hits as f64);
                }
            },
            ScrapeResult::Failure(err) => {
                self.scrape_failures.inc();
                tracing::error!(
                    kind = %err.kind(),
                    error = %err,
                    "Error scraping search index"
                );
            }
        }
    }
}

/// Exclusive access to the metric state for one scrape cycle
///
/// Dropping the guard without applying leaves every metric untouched.
pub struct CycleGuard<'a> {
    publisher: &'a MetricPublisher,
    _cycle: tokio::sync::MutexGuard<'a, ()>,
}

impl<'a> CycleGuard<'a> {
    /// Publish the cycle's result and release the cycle
    pub fn apply(self, result: &ScrapeResult) {
        self.publisher.apply(result);
    }
}
