//! REST API handlers for experiments, segmentation, scoring and monitoring.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use hooklab_core::types::{
    Alert, BehaviorProfile, BehaviorSignal, MetricsSnapshot, RawCounters, ScoreProfile,
    TrialEngagement, VisitorContext, VisitorSegment,
};
use hooklab_core::HooklabError;
use hooklab_experimentation::{
    AllocationSlot, Assignment, SignificanceResult, TestDefinition, TestResults,
};
use hooklab_monitoring::{CycleOutcome, PushMetricsSource};

use crate::service::HookEngine;

/// Maximum identifier length (test ID, visitor ID, goal).
const MAX_FIELD_LEN: usize = 256;

/// Shared application state for REST handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<HookEngine>,
    pub counters: Arc<PushMetricsSource>,
    pub node_id: String,
    pub start_time: Instant,
}

// ─── Errors ─────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Handler error carrying the status it maps to.
pub struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl ApiError {
    fn new(status: StatusCode, error: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorResponse {
                error: error.to_string(),
                message: message.into(),
            },
        }
    }

    fn invalid(message: impl Into<String>) -> Self {
        let message = message.into();
        warn!(error = %message, "request validation failed");
        metrics::counter!("api.validation_errors").increment(1);
        Self::new(StatusCode::BAD_REQUEST, "invalid_input", message)
    }
}

impl From<HooklabError> for ApiError {
    fn from(err: HooklabError) -> Self {
        match err {
            HooklabError::InvalidInput(message) => Self::invalid(message),
            HooklabError::MetricsUnavailable(message) => {
                Self::new(StatusCode::SERVICE_UNAVAILABLE, "metrics_unavailable", message)
            }
            other => {
                error!(error = %other, "request failed");
                metrics::counter!("api.errors").increment(1);
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal processing error",
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

fn validate_id(field: &str, value: &str) -> ApiResult<()> {
    if value.is_empty() {
        return Err(ApiError::invalid(format!("'{field}' must not be empty")));
    }
    if value.len() > MAX_FIELD_LEN {
        return Err(ApiError::invalid(format!("'{field}' exceeds maximum length")));
    }
    Ok(())
}

// ─── Experiments ────────────────────────────────────────────────────────────

/// POST /v1/tests — Register (or replace) a test definition.
pub async fn handle_register_test(
    State(state): State<AppState>,
    Json(definition): Json<TestDefinition>,
) -> ApiResult<(StatusCode, Json<TestDefinition>)> {
    validate_id("test_id", &definition.test_id)?;
    state.engine.register_test(definition.clone())?;
    Ok((StatusCode::CREATED, Json(definition)))
}

#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    pub test_id: String,
    pub visitor_id: String,
    /// Ad-hoc definition; when absent the registered test is used.
    #[serde(default)]
    pub allocation: Option<Vec<AllocationSlot>>,
    #[serde(default)]
    pub variants: Option<Vec<String>>,
}

/// POST /v1/assign — Assign a visitor to a variant.
pub async fn handle_assign(
    State(state): State<AppState>,
    Json(request): Json<AssignRequest>,
) -> ApiResult<Json<Assignment>> {
    validate_id("test_id", &request.test_id)?;
    validate_id("visitor_id", &request.visitor_id)?;

    let assignment = match request.allocation {
        Some(allocation) => {
            let variants = request
                .variants
                .unwrap_or_else(|| allocation.iter().map(|s| s.variant.clone()).collect());
            state
                .engine
                .assign(&request.test_id, &request.visitor_id, &variants, &allocation)?
        }
        None => state
            .engine
            .assign_registered(&request.test_id, &request.visitor_id)?,
    };
    Ok(Json(assignment))
}

#[derive(Debug, Deserialize)]
pub struct ConversionRequest {
    pub test_id: String,
    pub visitor_id: String,
    #[serde(default)]
    pub goal: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConversionResponse {
    /// False when the visitor had already converted or the goal is not
    /// tracked by the test.
    pub counted: bool,
}

/// POST /v1/conversions — Record a goal event for an assigned visitor.
pub async fn handle_conversion(
    State(state): State<AppState>,
    Json(request): Json<ConversionRequest>,
) -> ApiResult<Json<ConversionResponse>> {
    validate_id("test_id", &request.test_id)?;
    validate_id("visitor_id", &request.visitor_id)?;
    let counted = state.engine.record_conversion(
        &request.test_id,
        &request.visitor_id,
        request.goal.as_deref(),
    )?;
    Ok(Json(ConversionResponse { counted }))
}

/// GET /v1/tests/:test_id/results — Per-variant tallies and verdicts.
pub async fn handle_results(
    State(state): State<AppState>,
    Path(test_id): Path<String>,
) -> ApiResult<Json<TestResults>> {
    if state.engine.experiments().get_test(&test_id).is_none() {
        return Err(ApiError::new(
            StatusCode::NOT_FOUND,
            "test_not_found",
            format!("test '{test_id}' is not registered"),
        ));
    }
    Ok(Json(state.engine.results(&test_id)?))
}

#[derive(Debug, Deserialize)]
pub struct SignificanceRequest {
    pub control_conversions: u64,
    pub control_visitors: u64,
    pub variant_conversions: u64,
    pub variant_visitors: u64,
    #[serde(default)]
    pub confidence_level: Option<f64>,
}

/// POST /v1/significance — Two-proportion z-test on raw counts.
pub async fn handle_significance(
    State(state): State<AppState>,
    Json(request): Json<SignificanceRequest>,
) -> ApiResult<Json<SignificanceResult>> {
    let result = state.engine.compute_significance(
        request.control_conversions,
        request.control_visitors,
        request.variant_conversions,
        request.variant_visitors,
        request.confidence_level,
    )?;
    Ok(Json(result))
}

// ─── Segmentation & scoring ─────────────────────────────────────────────────

/// POST /v1/classify — Classify a visitor context into a segment.
pub async fn handle_classify(
    State(state): State<AppState>,
    Json(context): Json<VisitorContext>,
) -> ApiResult<Json<VisitorSegment>> {
    validate_id("visitor_id", &context.visitor_id)?;
    Ok(Json(state.engine.classify(&context)))
}

#[derive(Debug, Deserialize)]
pub struct BehaviorRequest {
    pub visitor_id: String,
    pub signals: Vec<BehaviorSignal>,
}

/// POST /v1/behavior — Fold interactions into the visitor's profile and
/// return the refreshed score.
pub async fn handle_behavior(
    State(state): State<AppState>,
    Json(request): Json<BehaviorRequest>,
) -> ApiResult<Json<ScoreProfile>> {
    validate_id("visitor_id", &request.visitor_id)?;
    let mut signals = request.signals.into_iter();
    let first = signals
        .next()
        .ok_or_else(|| ApiError::invalid("'signals' must not be empty"))?;

    let mut score = state.engine.record_behavior(&request.visitor_id, first);
    for signal in signals {
        score = state.engine.record_behavior(&request.visitor_id, signal);
    }
    Ok(Json(score))
}

#[derive(Debug, Deserialize)]
pub struct ScoreRequest {
    pub behavior: BehaviorProfile,
    #[serde(default)]
    pub segment: Option<VisitorSegment>,
    #[serde(default)]
    pub trial: Option<TrialEngagement>,
}

/// POST /v1/score — Score a full behavior profile.
pub async fn handle_score(
    State(state): State<AppState>,
    Json(request): Json<ScoreRequest>,
) -> ApiResult<Json<ScoreProfile>> {
    validate_id("visitor_id", &request.behavior.visitor_id)?;
    if let Some(trial) = request.trial {
        state
            .engine
            .set_trial_engagement(&request.behavior.visitor_id, trial);
    }
    Ok(Json(
        state
            .engine
            .score(&request.behavior, request.segment.as_ref()),
    ))
}

// ─── Monitoring ─────────────────────────────────────────────────────────────

/// GET /v1/metrics/snapshot — Latest derived snapshot.
pub async fn handle_snapshot(
    State(state): State<AppState>,
) -> ApiResult<Json<MetricsSnapshot>> {
    state
        .engine
        .current_snapshot()
        .map(|s| Json((*s).clone()))
        .ok_or_else(|| {
            ApiError::new(
                StatusCode::NOT_FOUND,
                "snapshot_unavailable",
                "no metrics snapshot has been captured yet",
            )
        })
}

/// PUT /v1/metrics/counters — Push the latest raw counters.
pub async fn handle_push_counters(
    State(state): State<AppState>,
    Json(counters): Json<RawCounters>,
) -> StatusCode {
    state.counters.push(counters);
    StatusCode::ACCEPTED
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_id: Option<String>,
    #[serde(default)]
    pub raised: Vec<String>,
    #[serde(default)]
    pub retired: Vec<String>,
}

/// POST /v1/metrics/refresh — Run an aggregator cycle now.
pub async fn handle_refresh(State(state): State<AppState>) -> Json<RefreshResponse> {
    let response = match state.engine.aggregator().run_cycle().await {
        CycleOutcome::Completed {
            snapshot_id,
            raised,
            retired,
        } => RefreshResponse {
            outcome: "completed".to_string(),
            snapshot_id: Some(snapshot_id.to_string()),
            raised,
            retired,
        },
        CycleOutcome::Busy => RefreshResponse {
            outcome: "busy".to_string(),
            snapshot_id: None,
            raised: Vec::new(),
            retired: Vec::new(),
        },
        CycleOutcome::SourceUnavailable => RefreshResponse {
            outcome: "source_unavailable".to_string(),
            snapshot_id: None,
            raised: Vec::new(),
            retired: Vec::new(),
        },
    };
    Json(response)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AlertsResponse {
    pub alerts: Vec<Alert>,
    /// Rules whose condition held on the last completed cycle.
    pub firing: Vec<String>,
}

/// GET /v1/alerts — Recent alerts, oldest first.
pub async fn handle_alerts(State(state): State<AppState>) -> Json<AlertsResponse> {
    Json(AlertsResponse {
        alerts: state.engine.active_alerts(),
        firing: state.engine.aggregator().firing_rules(),
    })
}

// ─── Operational ────────────────────────────────────────────────────────────

/// GET /health — Health check endpoint.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        node_id: state.node_id.clone(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        aggregator: state.engine.aggregator().state(),
        snapshot_available: state.engine.current_snapshot().is_some(),
    })
}

/// GET /live — Liveness check for Kubernetes.
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub node_id: String,
    pub uptime_secs: u64,
    pub aggregator: hooklab_monitoring::AggregatorState,
    pub snapshot_available: bool,
}
