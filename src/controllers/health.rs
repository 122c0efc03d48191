//! Health check endpoints
//!
//! Report liveness and the state of the provider circuits

use actix_web::web::{Data, Json};
use actix_web::{HttpResponse, Responder, get};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::provider::{SEARCH_OPERATION, TOKEN_OPERATION};
use crate::resilience::{CircuitState, ResilienceExecutor};

/// Liveness health check response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LivenessResponse {
    /// Service status
    pub status: String,
    /// Timestamp of the check
    pub timestamp: DateTime<Utc>,
}

/// Breaker state of one provider operation
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CircuitStatus {
    #[schema(example = "provider.flights.search")]
    pub operation: String,
    /// Closed, Open, HalfOpen, or Idle when the operation never ran
    #[schema(example = "Closed")]
    pub state: String,
}

/// Readiness check response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReadinessResponse {
    pub status: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub circuits: Vec<CircuitStatus>,
}

/// Liveness check endpoint
///
/// Always 200 while the process serves requests; no dependency is checked.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is alive", body = LivenessResponse),
    )
)]
#[get("/health")]
pub async fn health() -> impl Responder {
    let response = LivenessResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now(),
    };

    tracing::debug!("Liveness check: healthy");
    Json(response)
}

/// Readiness probe
///
/// Not ready while the search circuit is open, since every search would be
/// rejected or served from cache only.
#[utoipa::path(
    get,
    path = "/ready",
    tag = "Health",
    responses(
        (status = 200, description = "Service is ready", body = ReadinessResponse),
        (status = 503, description = "Provider circuit is open", body = ReadinessResponse),
    )
)]
#[get("/ready")]
pub async fn ready(executor: Data<ResilienceExecutor>) -> impl Responder {
    let circuits: Vec<CircuitStatus> = [SEARCH_OPERATION, TOKEN_OPERATION]
        .into_iter()
        .map(|operation| CircuitStatus {
            operation: operation.to_string(),
            state: executor
                .circuit_state(operation)
                .map(|state| state.to_string())
                .unwrap_or_else(|| "Idle".to_string()),
        })
        .collect();

    let is_ready = executor.circuit_state(SEARCH_OPERATION) != Some(CircuitState::Open);
    let status = if is_ready { "ready" } else { "not_ready" };

    tracing::debug!(status, "Readiness check performed");

    let response = ReadinessResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        circuits,
    };

    if is_ready {
        HttpResponse::Ok().json(response)
    } else {
        HttpResponse::ServiceUnavailable().json(response)
    }
}
