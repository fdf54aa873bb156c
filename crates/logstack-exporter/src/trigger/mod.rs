//! Scrape triggers
//!
//! A trigger decides when a scrape cycle runs and nothing else. Both
//! strategies call through [`ScrapeCycle::run_once`]:
//!
//! - [`PullTrigger`] scrapes on every metrics read, before the response is
//!   encoded. Metrics are never older than the read, but reads wait on the
//!   backend.
//! - [`PushTrigger`] scrapes on a fixed interval in a background task. Reads
//!   return the last completed cycle immediately.

mod shutdown;

pub use shutdown::{channel as shutdown_channel, Shutdown, ShutdownSender};

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::Instrument;
use uuid::Uuid;

use crate::contracts::ScrapeResult;
use crate::engine::ScrapeEngine;
use crate::target::TargetHandle;
use crate::telemetry::MetricPublisher;

/// Default push interval
pub const DEFAULT_SCRAPE_INTERVAL: Duration = Duration::from_secs(300);

/// One scrape-and-publish sequence
pub struct ScrapeCycle {
    engine: ScrapeEngine,
    publisher: Arc<MetricPublisher>,
    target: Arc<TargetHandle>,
}

impl ScrapeCycle {
    pub fn new(
        engine: ScrapeEngine,
        publisher: Arc<MetricPublisher>,
        target: Arc<TargetHandle>,
    ) -> Self {
        Self {
            engine,
            publisher,
            target,
        }
    }

    pub fn publisher(&self) -> &Arc<MetricPublisher> {
        &self.publisher
    }

    pub fn target(&self) -> &Arc<TargetHandle> {
        &self.target
    }

    /// Run one cycle: take the cycle lock, load the target, scrape, publish
    pub async fn run_once(&self) -> ScrapeResult {
        let cycle_id = Uuid::new_v4();
        let span = tracing::info_span!("scrape_cycle", %cycle_id);

        async move {
            let cycle = self.publisher.begin_cycle().await;
            let target = self.target.load();
            let start = Instant::now();

            let result = self.engine.run(&target).await;

            tracing::debug!(
                index = %target.config.index,
                mode = %target.config.query_mode,
                success = result.is_success(),
                duration_ms = start.elapsed().as_millis() as u64,
                "Scrape cycle finished"
            );

            cycle.apply(&result);
            result
        }
        .instrument(span)
        .await
    }
}

/// Deployment mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum TriggerMode {
    /// Scrape on every metrics read
    #[default]
    Pull,
    /// Scrape on a fixed interval
    Push,
}

impl TriggerMode {
    /// Build the trigger for this mode
    pub fn build(self, interval: Duration) -> Arc<dyn Trigger> {
        match self {
            TriggerMode::Pull => Arc::new(PullTrigger),
            TriggerMode::Push => Arc::new(PushTrigger::new(interval)),
        }
    }
}

/// Scheduling strategy for scrape cycles
#[async_trait]
pub trait Trigger: Send + Sync {
    /// Strategy identifier
    fn name(&self) -> &'static str;

    /// Called on every metrics read, before the metrics are encoded
    async fn on_read(&self, cycle: &ScrapeCycle);

    /// Start background work, if the strategy has any
    fn start(&self, cycle: Arc<ScrapeCycle>, shutdown: Shutdown) -> Option<JoinHandle<()>>;
}

/// Scrape synchronously on every read
#[derive(Debug, Default)]
pub struct PullTrigger;

#[async_trait]
impl Trigger for PullTrigger {
    fn name(&self) -> &'static str {
        "pull"
    }

    async fn on_read(&self, cycle: &ScrapeCycle) {
        cycle.run_once().await;
    }

    fn start(&self, _cycle: Arc<ScrapeCycle>, _shutdown: Shutdown) -> Option<JoinHandle<()>> {
        None
    }
}

/// Scrape on a fixed interval, independent of reads
#[derive(Debug)]
pub struct PushTrigger {
    interval: Duration,
}

impl PushTrigger {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Loop until shutdown; the signal is only observed between cycles
    async fn run_loop(cycle: Arc<ScrapeCycle>, interval: Duration, mut shutdown: Shutdown) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(interval_secs = interval.as_secs(), "Scrape loop started");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.wait() => break,
                _ = ticker.tick() => {}
            }

            cycle.run_once().await;

            if shutdown.is_signalled() {
                break;
            }
        }

        tracing::info!("Scrape loop stopped");
    }
}

#[async_trait]
impl Trigger for PushTrigger {
    fn name(&self) -> &'static str {
        "push"
    }

    async fn on_read(&self, _cycle: &ScrapeCycle) {}

    fn start(&self, cycle: Arc<ScrapeCycle>, shutdown: Shutdown) -> Option<JoinHandle<()>> {
        Some(tokio::spawn(Self::run_loop(cycle, self.interval, shutdown)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_builds_matching_trigger() {
        assert_eq!(TriggerMode::Pull.build(DEFAULT_SCRAPE_INTERVAL).name(), "pull");
        assert_eq!(TriggerMode::Push.build(DEFAULT_SCRAPE_INTERVAL).name(), "push");
    }

    #[test]
    fn test_push_interval() {
        let trigger = PushTrigger::new(Duration::from_secs(60));
        assert_eq!(trigger.interval(), Duration::from_secs(60));
    }
}
