//! Scrape engine
//!
//! Runs the query for a target and derives freshness, lag and presence from
//! the response. The engine never retries; the trigger's schedule does.

mod query;

pub use query::*;

use chrono::{DateTime, Utc};
use tokio::time::timeout;

use crate::client::SearchResponse;
use crate::config::ScrapeConfig;
use crate::contracts::*;
use crate::target::ScrapeTarget;

/// Scrape engine
#[derive(Debug, Default)]
pub struct ScrapeEngine;

impl ScrapeEngine {
    pub fn new() -> Self {
        Self
    }

    /// Run one scrape against the target
    pub async fn run(&self, target: &ScrapeTarget) -> ScrapeResult {
        let config = &target.config;
        let request = build_request(config);
        let deadline = config.backend.timeout();

        let query = target.backend.run_query(&config.index, &request);
        let response = match timeout(deadline, query).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                return ScrapeResult::Failure(ScrapeError::backend(format!(
                    "error scraping index '{}' on {}: {}",
                    config.index,
                    target.backend.name(),
                    e
                )))
            }
            Err(_) => {
                return ScrapeResult::Failure(ScrapeError::backend(format!(
                    "query against index '{}' timed out after {}s",
                    config.index, config.backend.timeout_secs
                )))
            }
        };

        Self::derive(config, &response).into()
    }

    /// Turn a backend response into derived values
    pub fn derive(
        config: &ScrapeConfig,
        response: &SearchResponse,
    ) -> Result<ScrapeOutcome, ScrapeError> {
        match config.query_mode {
            QueryMode::Range => Ok(ScrapeOutcome::counted(response.total_hits)),
            QueryMode::Latest => match response.hits.first() {
                None => Ok(ScrapeOutcome::no_hit(QueryMode::Latest)),
                Some(source) => {
                    let hit = Self::parse_hit(config, source, response.total_hits)?;
                    Ok(ScrapeOutcome::latest(&hit))
                }
            },
        }
    }

    /// Parse both timestamps out of a document's `_source`
    pub fn parse_hit(
        config: &ScrapeConfig,
        source: &serde_json::Value,
        total_hits: u64,
    ) -> Result<SearchHit, ScrapeError> {
        let event_timestamp = parse_timestamp_field(source, &config.timestamp_field)?;
        let ingested_at = parse_timestamp_field(source, &config.processed_field)?;

        Ok(SearchHit {
            event_timestamp,
            ingested_at,
            total_hits: total_hits.max(1),
        })
    }
}

/// Look up `field` literally, then as a dotted path into nested objects
fn lookup<'a>(source: &'a serde_json::Value, field: &str) -> Option<&'a serde_json::Value> {
    if let Some(value) = source.get(field) {
        return Some(value);
    }
    field
        .split('.')
        .try_fold(source, |value, segment| value.get(segment))
}

fn parse_timestamp_field(
    source: &serde_json::Value,
    field: &str,
) -> Result<DateTime<Utc>, ScrapeError> {
    let raw = match lookup(source, field) {
        Some(serde_json::Value::String(raw)) => raw,
        Some(other) => {
            return Err(ScrapeError::malformed(
                field,
                format!("expected an RFC 3339 string, got {}", other),
            ))
        }
        None => return Err(ScrapeError::malformed(field, "field is missing")),
    };

    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| ScrapeError::malformed(field, format!("'{}': {}", raw, e)))
}
