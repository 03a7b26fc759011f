//! Hooklab — experimentation and predictive scoring service.
//!
//! Main entry point that initializes all subsystems and starts the server.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use hooklab_analytics::{LogTransport, QueuedEventSink};
use hooklab_api::{ApiServer, HookEngine};
use hooklab_core::config::AppConfig;
use hooklab_monitoring::PushMetricsSource;
use tokio::sync::watch;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "hooklab")]
#[command(about = "A/B assignment, visitor segmentation, lead scoring and dashboard alerts")]
#[command(version)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, env = "HOOKLAB_CONFIG")]
    config: Option<String>,

    /// Node identifier (overrides config)
    #[arg(long, env = "HOOKLAB__NODE_ID")]
    node_id: Option<String>,

    /// HTTP port (overrides config)
    #[arg(long, env = "HOOKLAB__API__HTTP_PORT")]
    http_port: Option<u16>,

    /// Seconds between aggregator cycles (overrides config)
    #[arg(long, env = "HOOKLAB__AGGREGATOR__INTERVAL_SECS")]
    aggregator_interval_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hooklab=info,tower_http=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("Hooklab starting up");

    // Load configuration
    let mut config = AppConfig::load(cli.config.as_deref()).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    // Apply CLI overrides
    if let Some(node_id) = cli.node_id {
        config.node_id = node_id;
    }
    if let Some(port) = cli.http_port {
        config.api.http_port = port;
    }
    if let Some(secs) = cli.aggregator_interval_secs {
        config.aggregator.interval_secs = secs;
    }

    info!(
        node_id = %config.node_id,
        http_port = config.api.http_port,
        aggregator_interval_secs = config.aggregator.interval_secs,
        alert_rules = config.aggregator.rules.len(),
        "Configuration loaded"
    );

    // Event delivery
    let (event_sink, sink_writer) = QueuedEventSink::spawn(&config.sink, Arc::new(LogTransport));
    let event_sink = Arc::new(event_sink);

    // Engines
    let counters = Arc::new(PushMetricsSource::new(chrono::Duration::seconds(
        config.aggregator.counters_max_age_secs as i64,
    )));
    let engine = Arc::new(HookEngine::new(&config, counters.clone(), event_sink)?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let aggregator = engine.aggregator().clone().spawn(shutdown_rx);

    // Start API server
    let api_server = ApiServer::new(config.clone(), engine.clone(), counters);

    // Start metrics exporter
    if let Err(e) = api_server.start_metrics() {
        error!(error = %e, "Failed to start metrics exporter");
    }

    info!("Hooklab is ready to serve traffic");

    // Start HTTP server (blocks until shutdown)
    let served = api_server.start_http(shutdown_signal()).await;

    info!("Shutting down");
    let _ = shutdown_tx.send(true);
    if let Err(e) = aggregator.await {
        error!(error = %e, "Aggregator task failed");
    }

    // Last handles to the sink go here; the writer then drains its buffer.
    drop(api_server);
    drop(engine);
    if tokio::time::timeout(Duration::from_secs(5), sink_writer)
        .await
        .is_err()
    {
        warn!("Timed out flushing analytics events");
    }

    served
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
