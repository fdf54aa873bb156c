//! Logstack Exporter Contracts
//!
//! Values passed between the scrape engine, the metric publisher and the
//! triggers. Everything here is created fresh per cycle, except the metric
//! descriptors and snapshots exposed by the publisher.

mod metrics;

pub use metrics::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// How the index is queried
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum QueryMode {
    /// Fetch the single newest matching document
    #[default]
    Latest,
    /// Count matching documents in a trailing time window
    Range,
}

impl QueryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryMode::Latest => "latest",
            QueryMode::Range => "range",
        }
    }
}

impl fmt::Display for QueryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The newest matching document, with both timestamps parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    /// When the log line was generated
    pub event_timestamp: DateTime<Utc>,

    /// When the ingestion pipeline marked it processed
    pub ingested_at: DateTime<Utc>,

    /// Matching documents reported by the backend
    pub total_hits: u64,
}

impl SearchHit {
    /// Unix seconds of the event, truncated to whole seconds
    pub fn freshness_seconds(&self) -> f64 {
        self.event_timestamp.timestamp() as f64
    }

    /// Ingestion delay in seconds; negative when the clocks disagree
    pub fn lag_seconds(&self) -> f64 {
        let delta = self.ingested_at.signed_duration_since(self.event_timestamp);
        match delta.num_nanoseconds() {
            Some(nanos) => nanos as f64 / 1e9,
            None => delta.num_milliseconds() as f64 / 1e3,
        }
    }
}

/// Values derived by one successful scrape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeOutcome {
    /// Mode the query ran in
    pub mode: QueryMode,

    /// Whether any document matched
    pub hit_found: bool,

    /// Unix seconds of the newest matching event (latest mode only)
    pub freshness_seconds: Option<f64>,

    /// Ingestion lag of the newest matching event (latest mode only)
    pub lag_seconds: Option<f64>,

    /// Matching documents reported by the backend
    pub total_hits: u64,

    /// When the scrape finished
    pub completed_at: DateTime<Utc>,
}

impl ScrapeOutcome {
    /// Query matched nothing
    pub fn no_hit(mode: QueryMode) -> Self {
        Self {
            mode,
            hit_found: false,
            freshness_seconds: None,
            lag_seconds: None,
            total_hits: 0,
            completed_at: Utc::now(),
        }
    }

    /// Latest-mode hit with derived freshness and lag
    pub fn latest(hit: &SearchHit) -> Self {
        Self {
            mode: QueryMode::Latest,
            hit_found: true,
            freshness_seconds: Some(hit.freshness_seconds()),
            lag_seconds: Some(hit.lag_seconds()),
            total_hits: hit.total_hits,
            completed_at: Utc::now(),
        }
    }

    /// Range-mode count
    pub fn counted(total_hits: u64) -> Self {
        if total_hits == 0 {
            return Self::no_hit(QueryMode::Range);
        }

        Self {
            mode: QueryMode::Range,
            hit_found: true,
            freshness_seconds: None,
            lag_seconds: None,
            total_hits,
            completed_at: Utc::now(),
        }
    }
}

/// Category of a failed scrape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Connection or query execution failed
    BackendUnavailable,
    /// A document matched but a timestamp field could not be parsed
    MalformedTimestamp,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::BackendUnavailable => "backend_unavailable",
            FailureKind::MalformedTimestamp => "malformed_timestamp",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recoverable scrape failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScrapeError {
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("malformed timestamp in field `{field}`: {reason}")]
    MalformedTimestamp { field: String, reason: String },
}

impl ScrapeError {
    pub fn backend(msg: impl Into<String>) -> Self {
        ScrapeError::BackendUnavailable(msg.into())
    }

    pub fn malformed(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ScrapeError::MalformedTimestamp {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            ScrapeError::BackendUnavailable(_) => FailureKind::BackendUnavailable,
            ScrapeError::MalformedTimestamp { .. } => FailureKind::MalformedTimestamp,
        }
    }
}

/// Result of one scrape, applied to the publisher and then discarded
#[derive(Debug, Clone, PartialEq)]
pub enum ScrapeResult {
    Success(ScrapeOutcome),
    Failure(ScrapeError),
}

impl ScrapeResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ScrapeResult::Success(_))
    }

    pub fn error(&self) -> Option<&ScrapeError> {
        match self {
            ScrapeResult::Success(_) => None,
            ScrapeResult::Failure(err) => Some(err),
        }
    }

    /// Machine-readable summary, used by the `check` command
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ScrapeResult::Success(outcome) => serde_json::json!({
                "success": true,
                "outcome": outcome,
            }),
            ScrapeResult::Failure(err) => serde_json::json!({
                "success": false,
                "kind": err.kind(),
                "error": err.to_string(),
            }),
        }
    }
}

impl From<Result<ScrapeOutcome, ScrapeError>> for ScrapeResult {
    fn from(result: Result<ScrapeOutcome, ScrapeError>) -> Self {
        match result {
            Ok(outcome) => ScrapeResult::Success(outcome),
            Err(err) => ScrapeResult::Failure(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_lag_with_fractional_seconds() {
        let hit = SearchHit {
            event_timestamp: ts("2024-01-01T00:00:00Z"),
            ingested_at: ts("2024-01-01T00:00:03.500Z"),
            total_hits: 1,
        };
        assert_eq!(hit.freshness_seconds(), 1704067200.0);
        assert_eq!(hit.lag_seconds(), 3.5);
    }

    #[test]
    fn test_negative_lag_is_not_clamped() {
        let hit = SearchHit {
            event_timestamp: ts("2024-01-01T00:00:10Z"),
            ingested_at: ts("2024-01-01T00:00:08.250Z"),
            total_hits: 1,
        };
        assert_eq!(hit.lag_seconds(), -1.75);
    }

    #[test]
    fn test_counted_zero_is_no_hit() {
        let outcome = ScrapeOutcome::counted(0);
        assert!(!outcome.hit_found);
        assert_eq!(outcome.mode, QueryMode::Range);
        assert_eq!(outcome.total_hits, 0);
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            ScrapeError::backend("refused").kind(),
            FailureKind::BackendUnavailable
        );
        assert_eq!(
            ScrapeError::malformed("@timestamp", "bad").kind(),
            FailureKind::MalformedTimestamp
        );
    }

    #[test]
    fn test_failure_json() {
        let result = ScrapeResult::Failure(ScrapeError::backend("timed out"));
        let json = result.to_json();
        assert_eq!(json["success"], false);
        assert_eq!(json["kind"], "backend_unavailable");
    }
}
