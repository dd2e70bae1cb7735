use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::manifest::HostingDetail;
use crate::orchestrator::provision;
use crate::server::state::AppState;

/// Inbound trigger event: a batch of records, each wrapping a JSON-encoded
/// provisioning request.
#[derive(Debug, Deserialize)]
pub struct TriggerEvent {
    #[serde(default)]
    pub record: Vec<TriggerRecord>,
}

#[derive(Debug, Deserialize)]
pub struct TriggerRecord {
    pub smn: SmnRecord,
}

#[derive(Debug, Deserialize)]
pub struct SmnRecord {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ProvisionResponse {
    pub result: String,
    pub request_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub request_id: Uuid,
}

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    StatusCode::OK
}

/// Service status endpoint
pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    Json(ServiceStatus {
        namespace: state.settings.namespace.clone(),
        builder_image: state.settings.builder_image.clone(),
        processed: state.processed_count(),
        failed: state.failed_count(),
    })
}

#[derive(Serialize)]
struct ServiceStatus {
    namespace: String,
    builder_image: String,
    processed: u64,
    failed: u64,
}

/// Provisioning trigger endpoint.
///
/// Only the first record of a batch is processed; the rest are discarded
/// and logged. This mirrors the upstream trigger contract of one request
/// per event — an empty batch is a successful no-op.
pub async fn provision_event(
    State(state): State<AppState>,
    Json(event): Json<TriggerEvent>,
) -> impl IntoResponse {
    let request_id = Uuid::new_v4();

    let Some(record) = event.record.first() else {
        info!(%request_id, "trigger event carried no records");
        return Json(ProvisionResponse { result: "ok".to_string(), request_id }).into_response();
    };
    if event.record.len() > 1 {
        warn!(
            %request_id,
            discarded = event.record.len() - 1,
            "processing first record only, discarding the rest"
        );
    }

    let detail: HostingDetail = match serde_json::from_str(&record.smn.message) {
        Ok(detail) => detail,
        Err(e) => {
            error!(%request_id, "invalid record payload: {}", e);
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: format!("invalid data: {}", e),
                    request_id,
                }),
            )
                .into_response();
        }
    };

    info!(%request_id, subdomain = %detail.subdomain, "hosting build requested");

    match provision(&state.settings, &state.token, &detail, &state.poller).await {
        Ok(()) => {
            state.record_success();
            info!(%request_id, subdomain = %detail.subdomain, "hosting build job finished");
            Json(ProvisionResponse { result: "ok".to_string(), request_id }).into_response()
        }
        Err(e) => {
            state.record_failure();
            error!(%request_id, subdomain = %detail.subdomain, "provisioning failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse { error: e.to_string(), request_id }),
            )
                .into_response()
        }
    }
}

/// Create the Axum router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/v1/provision", post(provision_event))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
