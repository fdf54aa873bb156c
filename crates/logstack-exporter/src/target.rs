//! Atomically swapped scrape target
//!
//! A [`ScrapeTarget`] pairs a config with the backend client built from it.
//! [`TargetHandle`] holds the current one behind a single `Arc` so a cycle
//! that loaded it keeps the whole snapshot, old or new, until it finishes.

use std::sync::{Arc, RwLock};

use crate::client::{ElasticsearchClient, SearchBackend};
use crate::config::ScrapeConfig;
use crate::error::{ExporterError, Result};

/// Config plus the backend it points at
pub struct ScrapeTarget {
    pub config: ScrapeConfig,
    pub backend: Arc<dyn SearchBackend>,
}

impl ScrapeTarget {
    pub fn new(config: ScrapeConfig, backend: Arc<dyn SearchBackend>) -> Self {
        Self { config, backend }
    }

    /// Validate the config and build an Elasticsearch client for it
    pub fn connect(config: ScrapeConfig) -> Result<Self> {
        config.validate()?;
        let client = ElasticsearchClient::new(&config.backend)?;
        Ok(Self::new(config, Arc::new(client)))
    }

    /// Fail unless the backend answers
    pub async fn ping(&self) -> Result<()> {
        self.backend.ping().await.map_err(|e| {
            ExporterError::client(format!(
                "search backend at {} is unreachable: {}",
                self.config.backend.url, e
            ))
        })
    }
}

/// Single-writer handle to the current target
pub struct TargetHandle {
    current: RwLock<Arc<ScrapeTarget>>,
}

impl TargetHandle {
    pub fn new(target: ScrapeTarget) -> Self {
        Self {
            current: RwLock::new(Arc::new(target)),
        }
    }

    /// Snapshot of the current target
    pub fn load(&self) -> Arc<ScrapeTarget> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&*guard),
            Err(poisoned) => Arc::clone(&*poisoned.into_inner()),
        }
    }

    /// Replace the current target, returning the previous one
    pub fn swap(&self, target: ScrapeTarget) -> Arc<ScrapeTarget> {
        let next = Arc::new(target);
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        std::mem::replace(&mut *guard, next)
    }
}
