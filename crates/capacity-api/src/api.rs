//! HTTP API for cost finalization, org lookups, health and metrics

use crate::sizing;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use capacity_core::{
    finalize::FinalizeRequest,
    health::{ComponentStatus, HealthRegistry},
    observability::{CapacityMetrics, StructuredLogger},
    summary::{NONPROD_CPU_PER_NAMESPACE, PROD_CPU_PER_NAMESPACE},
    OrganizationDirectory, TierPricing, DEFAULT_PROVISIONER, PROD_ENV,
};
use prometheus::{Encoder, TextEncoder};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

pub const EMPTY_RESULTS_ERROR: &str =
    "No data available for cost calculation. Please add some namespaces first.";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub metrics: CapacityMetrics,
    pub logger: StructuredLogger,
    pub directory: Arc<OrganizationDirectory>,
    pub pricing: TierPricing,
    pub environment: String,
}

impl AppState {
    pub fn new(
        health_registry: HealthRegistry,
        metrics: CapacityMetrics,
        logger: StructuredLogger,
        directory: OrganizationDirectory,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            health_registry,
            metrics,
            logger,
            directory: Arc::new(directory),
            pricing: TierPricing::default(),
            environment: environment.into(),
        }
    }
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(json!({ "success": false, "error": message.into() })),
    )
        .into_response()
}

/// Connectivity check
async fn test(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "success": true,
        "message": "Backend is working!",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "environment": state.environment,
    }))
}

/// Per-environment breakdown of the submitted namespaces
async fn finalize_cost(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<FinalizeRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            debug!(error = %rejection, "Rejected finalize-cost body");
            return error_response(StatusCode::BAD_REQUEST, EMPTY_RESULTS_ERROR);
        }
    };
    if request.results.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, EMPTY_RESULTS_ERROR);
    }

    let started = Instant::now();
    let response = sizing::breakdown(&request.results, &state.directory);
    state
        .metrics
        .observe_finalize_latency(started.elapsed().as_secs_f64());
    state
        .metrics
        .add_namespaces_processed(request.results.len() as u64);

    state.logger.log_breakdown_computed(
        response.finalized_costs.as_ref().map_or(0, |costs| costs.len()),
        request.results.len(),
        response.raw_total_monthly.unwrap_or(0.0),
    );

    (StatusCode::OK, Json(response)).into_response()
}

/// Echo a namespace entry with sizing defaults filled in
async fn add_entry(payload: Result<Json<Value>, JsonRejection>) -> Response {
    let mut entry = match payload {
        Ok(Json(Value::Object(entry))) if !entry.is_empty() => entry,
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "No data provided" })),
            )
                .into_response()
        }
    };

    let cpu_core_ns = if entry.get("env").and_then(Value::as_str) == Some(PROD_ENV) {
        PROD_CPU_PER_NAMESPACE
    } else {
        NONPROD_CPU_PER_NAMESPACE
    };
    entry.insert("cpu_core_ns".to_string(), json!(cpu_core_ns));
    fill_default(&mut entry, "cluster_name", "");
    fill_default(&mut entry, "provisioner", DEFAULT_PROVISIONER);
    fill_default(&mut entry, "pdb", sizing::DEFAULT_PDB);
    fill_default(&mut entry, "eks_version", sizing::DEFAULT_EKS_VERSION);

    Json(json!({
        "success": true,
        "entry": entry,
        "message": "Entry added successfully",
    }))
    .into_response()
}

fn fill_default(entry: &mut Map<String, Value>, key: &str, value: &str) {
    entry
        .entry(key.to_string())
        .or_insert_with(|| Value::String(value.to_string()));
}

/// Pricing table, org directory and provisioners
async fn get_config(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let provisioners: Vec<&str> = state
        .pricing
        .tiers
        .iter()
        .map(|price| price.tier.as_str())
        .collect();

    Json(json!({
        "success": true,
        "configs": {
            "costMap": state.pricing,
            "orgMapping": state.directory.entries(),
            "defaults": {
                "cpu_core_ns": {
                    "prod": PROD_CPU_PER_NAMESPACE,
                    "nonprod": NONPROD_CPU_PER_NAMESPACE,
                },
                "provisioner": DEFAULT_PROVISIONER,
                "pdb": sizing::DEFAULT_PDB,
                "eks_version": sizing::DEFAULT_EKS_VERSION,
            },
        },
        "config_summary": {
            "orgMapping_source": state.directory.source().label(),
            "available_provisioners": provisioners,
            "available_tribes": state.directory.tribes(),
        },
    }))
}

#[derive(Debug, Deserialize)]
struct FindApproverRequest {
    #[serde(default)]
    tribe: String,
}

async fn find_approver(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<FindApproverRequest>, JsonRejection>,
) -> Response {
    let tribe = match payload {
        Ok(Json(request)) if !request.tribe.trim().is_empty() => request.tribe,
        _ => return error_response(StatusCode::BAD_REQUEST, "Tribe name is required"),
    };

    state.metrics.inc_approver_lookups();
    let approver = state.directory.find_approver(&tribe).to_string();
    debug!(tribe = %tribe, approver = %approver, "Approver lookup");

    Json(json!({
        "success": true,
        "tribe": tribe,
        "approver": approver,
    }))
    .into_response()
}

/// Health check response - returns 200 if healthy, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK, // Still operational
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!(error = %e, "Failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

async fn not_found(uri: Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "Endpoint not found",
            "path": uri.path(),
        })),
    )
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/test", get(test))
        .route("/api/finalize-cost", post(finalize_cost))
        .route("/api/add", post(add_entry))
        .route("/api/config", get(get_config))
        .route("/api/find-approver", post(find_approver))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .fallback(not_found)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
