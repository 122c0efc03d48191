use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::services::SearchError;

/// Error body returned by every endpoint
#[derive(Clone, Debug, Deserialize, Serialize, ToSchema, PartialEq, Eq)]
pub struct ErrorResponse {
    /// Machine-readable error code
    #[schema(example = "validation_error")]
    pub error: String,
    #[schema(example = "origin must be a 3-letter IATA code, got 'JFK1'")]
    pub message: String,
    /// Upstream detail, when the provider gave one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: &str, message: impl Into<String>) -> Self {
        Self {
            error: error.to_string(),
            message: message.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: Option<String>) -> Self {
        self.detail = detail;
        self
    }
}

impl SearchError {
    fn code(&self) -> &'static str {
        match self {
            SearchError::Validation(_) | SearchError::Dates(_) => "validation_error",
            SearchError::Unavailable { .. } => "provider_unavailable",
            SearchError::Timeout { .. } => "provider_timeout",
            SearchError::Upstream { .. } => "provider_error",
        }
    }
}

impl ResponseError for SearchError {
    fn status_code(&self) -> StatusCode {
        match self {
            SearchError::Validation(_) | SearchError::Dates(_) => StatusCode::BAD_REQUEST,
            SearchError::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            SearchError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            SearchError::Upstream { .. } => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let detail = match self {
            SearchError::Upstream { detail, .. } => detail.clone(),
            _ => None,
        };

        let status = self.status_code();
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), error = %self, "Search failed");
        }

        HttpResponse::build(status)
            .json(ErrorResponse::new(self.code(), self.to_string()).with_detail(detail))
    }
}
