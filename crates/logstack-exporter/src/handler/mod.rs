//! HTTP handler for the Logstack Exporter
//!
//! Serves the Prometheus scrape endpoint plus a health probe.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use futures::future::BoxFuture;
use serde::Serialize;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinError;
use tower_http::trace::TraceLayer;

use crate::trigger::{ScrapeCycle, Shutdown, Trigger};

/// Application state
pub struct AppState {
    pub cycle: Arc<ScrapeCycle>,
    pub trigger: Arc<dyn Trigger>,
}

impl AppState {
    pub fn new(cycle: Arc<ScrapeCycle>, trigger: Arc<dyn Trigger>) -> Self {
        Self { cycle, trigger }
    }
}

/// Create the router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(landing_page))
        .route("/metrics", get(metrics))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until shutdown is signalled, then drain
///
/// In-flight requests and `background` work share one deadline of
/// `grace_period`, counted from the signal. Whatever is still running when it
/// elapses is abandoned.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    mut shutdown: Shutdown,
    grace_period: Duration,
    background: Vec<BoxFuture<'static, ()>>,
) -> io::Result<()> {
    let mut server_shutdown = shutdown.clone();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move { server_shutdown.wait().await })
            .await
    });

    tokio::select! {
        joined = &mut server => return flatten(joined),
        _ = shutdown.wait() => {}
    }

    tracing::info!(
        grace_period_ms = grace_period.as_millis() as u64,
        "Waiting for in-flight work"
    );

    let drain = async {
        let served = (&mut server).await;
        futures::future::join_all(background).await;
        served
    };

    let drained = tokio::time::timeout(grace_period, drain).await;
    match drained {
        Ok(joined) => flatten(joined),
        Err(_) => {
            tracing::warn!("Grace period elapsed before in-flight work finished");
            server.abort();
            Ok(())
        }
    }
}

fn flatten(joined: Result<io::Result<()>, JoinError>) -> io::Result<()> {
    joined.map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
}

const LANDING_PAGE: &str = r#"<html>
<head><title>Logstack Exporter</title></head>
<body>
<h1>Logstack Exporter</h1>
<p><a href="/metrics">Metrics</a></p>
</body>
</html>
"#;

async fn landing_page() -> Html<&'static str> {
    Html(LANDING_PAGE)
}

/// Prometheus scrape endpoint
async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    state.trigger.on_read(&state.cycle).await;

    match state.cycle.publisher().encode_text() {
        Ok(body) => ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Health check endpoint
async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let target = state.cycle.target().load();

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        trigger: state.trigger.name().to_string(),
        index: target.config.index.clone(),
    })
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub trigger: String,
    pub index: String,
}
