//! Logstack Exporter entry point
//!
//! Publishes freshness and ingestion lag of a log message as Prometheus metrics.
//!
//! # Usage
//!
//! ```bash
//! # Serve /metrics, scraping on every read
//! logstack-exporter serve --scrape-uri https://elastic:9200 \
//!     --scrape-index 'logstash-*' --query-msg 'heartbeat from billing'
//!
//! # Scrape every five minutes and hot-reload the config file
//! logstack-exporter serve --trigger push --config-file exporter.yaml
//!
//! # Run one scrape and print the result
//! logstack-exporter check --config-file exporter.yaml
//! ```
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Startup failure, or a failed scrape in `check`

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use futures::future::BoxFuture;
use logstack_exporter::config::ScrapeConfig;
use logstack_exporter::engine::ScrapeEngine;
use logstack_exporter::handler::{self, create_router, AppState};
use logstack_exporter::reload::ConfigWatcher;
use logstack_exporter::target::{ScrapeTarget, TargetHandle};
use logstack_exporter::telemetry::{init_tracing, LogFormat, MetricPublisher};
use logstack_exporter::trigger::{shutdown_channel, ScrapeCycle, ShutdownSender, TriggerMode};
use logstack_exporter::QueryMode;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "logstack-exporter")]
#[command(about = "Prometheus exporter for log message freshness and ingestion lag")]
#[command(version)]
struct Cli {
    /// Log output format
    #[arg(long, value_enum, default_value = "json", global = true)]
    log_format: LogFormat,

    /// Minimum log level; `RUST_LOG` takes precedence when set
    #[arg(long, default_value = "info", env = "LOG_LEVEL", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the metrics server
    Serve {
        #[command(flatten)]
        scrape: ScrapeArgs,

        /// Address to listen on
        #[arg(long, default_value = "0.0.0.0:9090", env = "LISTEN_ADDRESS")]
        listen_address: String,

        /// When to scrape: on every metrics read, or on a fixed interval
        #[arg(long, value_enum, default_value = "pull")]
        trigger: TriggerMode,

        /// Push-mode scrape interval in seconds
        #[arg(long, default_value = "300")]
        scrape_interval_secs: u64,

        /// Seconds to wait for in-flight work after a termination signal
        #[arg(long, default_value = "2")]
        grace_period_secs: u64,
    },

    /// Run a single scrape and print the result
    Check {
        #[command(flatten)]
        scrape: ScrapeArgs,
    },
}

#[derive(Args, Debug, Clone)]
struct ScrapeArgs {
    /// Search backend endpoint
    #[arg(long, default_value = "https://127.0.0.1:9092", env = "SCRAPE_URI")]
    scrape_uri: String,

    /// Index to search
    #[arg(long, default_value = "", env = "SCRAPE_INDEX")]
    scrape_index: String,

    /// Message to match in the index
    #[arg(long, default_value = "", env = "QUERY_MSG")]
    query_msg: String,

    /// Username for the search backend
    #[arg(long, default_value = "", env = "ELASTIC_USERNAME")]
    username: String,

    /// Password for the search backend
    #[arg(long, default_value = "", env = "ELASTIC_PASSWORD", hide_env_values = true)]
    password: String,

    /// Fetch the newest match, or count matches in a trailing window
    #[arg(long, value_enum, default_value = "latest")]
    query_mode: QueryMode,

    /// Trailing window for range mode, in seconds
    #[arg(long, default_value = "300")]
    window_secs: u64,

    /// Deadline for each backend request, in seconds
    #[arg(long, default_value = "10")]
    timeout_secs: u64,

    /// Skip TLS certificate verification (insecure)
    #[arg(long)]
    insecure_skip_verify: bool,

    /// Config file (YAML, TOML or JSON); replaces the flags above and is hot-reloaded
    #[arg(long, env = "EXPORTER_CONFIG")]
    config_file: Option<PathBuf>,
}

impl ScrapeArgs {
    fn load(&self) -> logstack_exporter::Result<ScrapeConfig> {
        if let Some(path) = &self.config_file {
            return ScrapeConfig::from_file(path);
        }

        let mut config = ScrapeConfig::new(&self.scrape_uri, &self.scrape_index, &self.query_msg)
            .with_credentials(&self.username, &self.password)
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_insecure_skip_verify(self.insecure_skip_verify);
        config.query_mode = self.query_mode;
        config.window_secs = self.window_secs;

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log_format, &cli.log_level);

    let outcome = match cli.command {
        Commands::Serve {
            scrape,
            listen_address,
            trigger,
            scrape_interval_secs,
            grace_period_secs,
        } => {
            serve(
                scrape,
                listen_address,
                trigger,
                Duration::from_secs(scrape_interval_secs),
                Duration::from_secs(grace_period_secs),
            )
            .await
        }
        Commands::Check { scrape } => check(scrape).await,
    };

    if let Err(e) = outcome {
        tracing::error!(error = %format!("{:#}", e), "Exporter failed");
        std::process::exit(1);
    }
}

async fn serve(
    scrape: ScrapeArgs,
    listen_address: String,
    trigger_mode: TriggerMode,
    interval: Duration,
    grace_period: Duration,
) -> anyhow::Result<()> {
    let config = scrape.load().context("invalid configuration")?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        scrape_uri = %config.backend.url,
        index = %config.index,
        mode = %config.query_mode,
        trigger = ?trigger_mode,
        "Starting logstack-exporter"
    );

    let target = ScrapeTarget::connect(config).context("failed to build search client")?;
    target.ping().await?;

    let publisher = Arc::new(MetricPublisher::new()?);
    publisher.register_process_metrics()?;

    let handle = Arc::new(TargetHandle::new(target));
    let cycle = Arc::new(ScrapeCycle::new(
        ScrapeEngine::new(),
        Arc::clone(&publisher),
        Arc::clone(&handle),
    ));

    let trigger = trigger_mode.build(interval);
    let (sender, shutdown) = shutdown_channel();
    let scrape_loop = trigger.start(Arc::clone(&cycle), shutdown);

    let watcher = match &scrape.config_file {
        Some(path) => Some(ConfigWatcher::spawn(
            path.clone(),
            Arc::clone(&handle),
            sender.subscribe(),
        )?),
        None => None,
    };

    let addr: SocketAddr = listen_address
        .parse()
        .with_context(|| format!("invalid listen address '{}'", listen_address))?;
    let router = create_router(Arc::new(AppState::new(cycle, trigger)));

    let mut background: Vec<BoxFuture<'static, ()>> = Vec::new();
    if let Some(task) = scrape_loop {
        background.push(Box::pin(async move {
            task.await.ok();
        }));
    }
    if let Some(watcher) = watcher {
        background.push(Box::pin(watcher.join()));
    }

    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let server_shutdown = sender.subscribe();
    tokio::spawn(shutdown_on_signal(sender));
    handler::serve(listener, router, server_shutdown, grace_period, background).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn check(scrape: ScrapeArgs) -> anyhow::Result<()> {
    let config = scrape.load().context("invalid configuration")?;
    let target = ScrapeTarget::connect(config).context("failed to build search client")?;

    let publisher = Arc::new(MetricPublisher::new()?);
    let cycle = ScrapeCycle::new(
        ScrapeEngine::new(),
        Arc::clone(&publisher),
        Arc::new(TargetHandle::new(target)),
    );

    let result = cycle.run_once().await;

    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "result": result.to_json(),
            "metrics": publisher.snapshot(),
        }))?
    );

    if !result.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

/// Resolve on the first termination signal, then tell background work to stop
async fn shutdown_on_signal(sender: ShutdownSender) {
    wait_for_signal().await;
    sender.signal();
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let kinds = [
        ("SIGTERM", SignalKind::terminate()),
        ("SIGINT", SignalKind::interrupt()),
        ("SIGHUP", SignalKind::hangup()),
        ("SIGQUIT", SignalKind::quit()),
    ];

    let mut streams = Vec::new();
    for (name, kind) in kinds {
        match signal(kind) {
            Ok(stream) => streams.push((name, stream)),
            Err(e) => tracing::warn!(signal = name, error = %e, "Failed to install signal handler"),
        }
    }

    if streams.is_empty() {
        std::future::pending::<()>().await;
    }

    let waits = streams.iter_mut().map(|(name, stream)| {
        let name = *name;
        Box::pin(async move {
            stream.recv().await;
            name
        })
    });
    let (name, _, _) = futures::future::select_all(waits).await;
    tracing::info!(signal = name, "Caught signal, shutting down");
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Caught Ctrl+C, shutting down");
}
