//! Query construction
//!
//! Latest mode asks for the single newest match; range mode asks only for the
//! number of matches in the trailing window.

use std::time::Duration;

use crate::client::{SearchRequest, Sort};
use crate::config::ScrapeConfig;
use crate::contracts::QueryMode;

/// Documents requested in latest mode
pub const LATEST_QUERY_SIZE: usize = 1;

/// Build the search request for a config
pub fn build_request(config: &ScrapeConfig) -> SearchRequest {
    match config.query_mode {
        QueryMode::Latest => SearchRequest {
            query: bool_query(config, None),
            size: LATEST_QUERY_SIZE,
            sort: Some(Sort::descending(&config.timestamp_field)),
            track_total_hits: false,
        },
        QueryMode::Range => SearchRequest {
            query: bool_query(config, Some(config.window())),
            size: 0,
            sort: None,
            track_total_hits: true,
        },
    }
}

fn bool_query(config: &ScrapeConfig, window: Option<Duration>) -> serde_json::Value {
    let mut must_match = serde_json::Map::new();
    must_match.insert(
        config.message_field.clone(),
        serde_json::Value::String(config.message.clone()),
    );

    let mut query = serde_json::json!({
        "bool": {
            "must": [ { "match": must_match } ]
        }
    });

    if let Some(window) = window {
        let mut range = serde_json::Map::new();
        range.insert(
            config.timestamp_field.clone(),
            serde_json::json!({ "gte": format!("now-{}s", window.as_secs()) }),
        );
        query["bool"]["filter"] = serde_json::json!([ { "range": range } ]);
    }

    query
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_request() {
        let config = ScrapeConfig::new("http://localhost:9200", "logs", "backup done");
        let request = build_request(&config);

        assert_eq!(request.size, 1);
        assert_eq!(request.sort, Some(Sort::descending("@timestamp")));
        assert!(!request.track_total_hits);
        assert_eq!(
            request.query["bool"]["must"][0]["match"]["message"],
            "backup done"
        );
        assert!(request.query["bool"].get("filter").is_none());
    }

    #[test]
    fn test_range_request_is_count_only() {
        let config = ScrapeConfig::new("http://localhost:9200", "logs", "backup done")
            .with_range(Duration::from_secs(300));
        let request = build_request(&config);

        assert_eq!(request.size, 0);
        assert!(request.sort.is_none());
        assert!(request.track_total_hits);
        assert_eq!(
            request.query["bool"]["filter"][0]["range"]["@timestamp"]["gte"],
            "now-300s"
        );
    }

    #[test]
    fn test_custom_fields() {
        let mut config = ScrapeConfig::new("http://localhost:9200", "logs", "ok");
        config.message_field = "log.original".to_string();
        config.timestamp_field = "event.created".to_string();

        let request = build_request(&config);
        assert_eq!(request.query["bool"]["must"][0]["match"]["log.original"], "ok");
        assert_eq!(request.sort, Some(Sort::descending("event.created")));
    }
}
