//! API server — HTTP REST endpoints and the Prometheus exporter.

use crate::rest::{self, AppState};
use crate::service::HookEngine;
use axum::routing::{get, post, put};
use axum::Router;
use hooklab_core::config::AppConfig;
use hooklab_monitoring::PushMetricsSource;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Build the REST router over shared state.
pub fn router(state: AppState) -> Router {
    Router::new()
        // Experiments
        .route("/v1/tests", post(rest::handle_register_test))
        .route("/v1/tests/:test_id/results", get(rest::handle_results))
        .route("/v1/assign", post(rest::handle_assign))
        .route("/v1/conversions", post(rest::handle_conversion))
        .route("/v1/significance", post(rest::handle_significance))
        // Segmentation & scoring
        .route("/v1/classify", post(rest::handle_classify))
        .route("/v1/behavior", post(rest::handle_behavior))
        .route("/v1/score", post(rest::handle_score))
        // Monitoring
        .route("/v1/metrics/snapshot", get(rest::handle_snapshot))
        .route("/v1/metrics/counters", put(rest::handle_push_counters))
        .route("/v1/metrics/refresh", post(rest::handle_refresh))
        .route("/v1/alerts", get(rest::handle_alerts))
        // Operational endpoints
        .route("/health", get(rest::health_check))
        .route("/live", get(rest::liveness))
        // Middleware
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub struct ApiServer {
    config: AppConfig,
    engine: Arc<HookEngine>,
    counters: Arc<PushMetricsSource>,
}

impl ApiServer {
    pub fn new(
        config: AppConfig,
        engine: Arc<HookEngine>,
        counters: Arc<PushMetricsSource>,
    ) -> Self {
        Self {
            config,
            engine,
            counters,
        }
    }

    /// Start the HTTP REST server. Returns once `shutdown` resolves and
    /// in-flight requests have drained.
    pub async fn start_http(
        &self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let state = AppState {
            engine: self.engine.clone(),
            counters: self.counters.clone(),
            node_id: self.config.node_id.clone(),
            start_time: Instant::now(),
        };
        let app = router(state);

        let addr = SocketAddr::new(self.config.api.host.parse()?, self.config.api.http_port);

        info!(addr = %addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        Ok(())
    }

    /// Start the metrics server on a separate port.
    pub fn start_metrics(&self) -> anyhow::Result<()> {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(SocketAddr::new(
                self.config.api.host.parse()?,
                self.config.metrics.port,
            ))
            .install()?;

        info!(port = self.config.metrics.port, "Metrics exporter started");
        Ok(())
    }
}
