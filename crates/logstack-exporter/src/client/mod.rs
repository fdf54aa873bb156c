//! Search backend client
//!
//! The engine talks to the index only through [`SearchBackend`], so tests can
//! substitute a fake. [`ElasticsearchClient`] is the production implementation
//! over the Elasticsearch `_search` API.

mod elasticsearch;

pub use elasticsearch::ElasticsearchClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Sort order for the single returned document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    pub field: String,
    pub descending: bool,
}

impl Sort {
    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }
}

/// One query against one index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Query DSL (`{"bool": {...}}`)
    pub query: serde_json::Value,

    /// Documents to return; 0 for a count-only request
    pub size: usize,

    pub sort: Option<Sort>,

    /// Ask for an exact hit count instead of a lower bound
    pub track_total_hits: bool,
}

impl SearchRequest {
    /// Request body in Elasticsearch search DSL
    pub fn to_body(&self) -> serde_json::Value {
        let mut body = serde_json::json!({
            "query": self.query,
            "size": self.size,
        });

        if let Some(sort) = &self.sort {
            let order = if sort.descending { "desc" } else { "asc" };
            let mut clause = serde_json::Map::new();
            clause.insert(sort.field.clone(), serde_json::json!({ "order": order }));
            body["sort"] = serde_json::Value::Array(vec![serde_json::Value::Object(clause)]);
        }
        if self.track_total_hits {
            body["track_total_hits"] = serde_json::Value::Bool(true);
        }

        body
    }
}

/// Ordered hits plus the total match count
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub total_hits: u64,

    /// `_source` of each returned document, in backend order
    pub hits: Vec<serde_json::Value>,
}

/// Capability to run a query against a named index
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Backend identifier, used in logs
    fn name(&self) -> &str;

    /// Run a query and return the ordered hits
    async fn run_query(
        &self,
        index: &str,
        request: &SearchRequest,
    ) -> Result<SearchResponse, BackendError>;

    /// Check that the backend answers at all
    async fn ping(&self) -> Result<(), BackendError> {
        Ok(())
    }
}

/// Client errors
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("Client build error: {0}")]
    Build(String),
}
