// logtail - app/api_error.rs
//
// Mapping from domain errors to HTTP responses.
//
// Every error body has the shape `{"detail": "<message>"}` on both the node
// and the primary surface.

use crate::util::error::{AggregateError, PeerFailure, RegistryError, TailError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use std::fmt;

/// An error on its way out of a handler.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    detail: &'a str,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, detail)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.detail)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, detail = %self.detail, "Request failed");
        } else {
            tracing::debug!(status = %self.status, detail = %self.detail, "Request rejected");
        }
        let body = Json(ErrorBody {
            detail: &self.detail,
        });
        (self.status, body).into_response()
    }
}

impl From<TailError> for ApiError {
    fn from(e: TailError) -> Self {
        let status = match &e {
            TailError::InvalidQuery { .. } => StatusCode::BAD_REQUEST,
            TailError::SourceNotFound { .. } => StatusCode::NOT_FOUND,
            TailError::SourceTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            TailError::Io { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, e.to_string())
    }
}

impl From<AggregateError> for ApiError {
    fn from(e: AggregateError) -> Self {
        let status = match &e {
            AggregateError::UnknownPeers { .. } => StatusCode::NOT_FOUND,
            AggregateError::NoPeers
            | AggregateError::DuplicatePeer { .. }
            | AggregateError::InvalidQuery { .. } => StatusCode::BAD_REQUEST,
        };
        Self::new(status, e.to_string())
    }
}

impl From<RegistryError> for ApiError {
    fn from(e: RegistryError) -> Self {
        let status = match &e {
            RegistryError::NotFound { .. } => StatusCode::NOT_FOUND,
            RegistryError::AlreadyRegistered { .. }
            | RegistryError::InvalidUrl { .. }
            | RegistryError::Full { .. }
            | RegistryError::HealthCheckFailed { .. } => StatusCode::BAD_REQUEST,
        };
        Self::new(status, e.to_string())
    }
}

impl From<PeerFailure> for ApiError {
    fn from(e: PeerFailure) -> Self {
        let status = match &e {
            PeerFailure::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            PeerFailure::Unreachable { .. } | PeerFailure::BadResponse { .. } => {
                StatusCode::BAD_GATEWAY
            }
        };
        Self::new(status, e.to_string())
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::internal(format!("worker task failed: {e}"))
    }
}
