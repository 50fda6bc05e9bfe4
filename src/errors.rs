use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::error::DbErr;
use sea_orm::TransactionError;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::TransitionError;

/// Error body returned by every failing admin endpoint.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "Conflict",
    "message": "Duplicate request: order line 550e8400-e29b-41d4-a716-446655440000 already has an active request",
    "timestamp": "2024-12-09T10:30:00.000Z"
}))]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Bad Request")
    #[schema(example = "Conflict")]
    pub error: String,
    /// Human-readable error description
    pub message: String,
    /// ISO 8601 timestamp when the error occurred
    #[schema(example = "2024-12-09T10:30:00.000Z")]
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Duplicate request: {0}")]
    DuplicateRequest(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(#[from] TransitionError),

    #[error("Upstream error: {0}")]
    UpstreamError(String),

    #[error("Event error: {0}")]
    EventError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl From<TransactionError<ServiceError>> for ServiceError {
    fn from(err: TransactionError<ServiceError>) -> Self {
        match err {
            TransactionError::Connection(db_err) => ServiceError::DatabaseError(db_err),
            TransactionError::Transaction(service_err) => service_err,
        }
    }
}

impl ServiceError {
    pub fn not_found(what: &str, id: impl std::fmt::Display) -> Self {
        ServiceError::NotFound(format!("{} {} not found", what, id))
    }

    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) | Self::DuplicateRequest(_) | Self::InvalidTransition(_) => {
                StatusCode::CONFLICT
            }
            Self::UpstreamError(_) => StatusCode::BAD_GATEWAY,
            Self::DatabaseError(_)
            | Self::EventError(_)
            | Self::InternalError(_)
            | Self::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Internal errors return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::EventError(_) | Self::InternalError(_) | Self::Other(_) => {
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.response_message(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(err)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OrderLineStatus;
    use axum::body::to_bytes;

    #[test]
    fn status_code_mapping() {
        assert_eq!(
            ServiceError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::ValidationError("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::DuplicateRequest("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::from(TransitionError::Terminal {
                from: OrderLineStatus::Confirmed
            })
            .status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::UpstreamError("x".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ServiceError::DatabaseError(DbErr::Custom("boom".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn response_message_hides_persistence_details() {
        assert_eq!(
            ServiceError::DatabaseError(DbErr::Custom("relation does not exist".into()))
                .response_message(),
            "Database error"
        );
        assert_eq!(
            ServiceError::ValidationError("quantity must be positive".into()).response_message(),
            "Validation error: quantity must be positive"
        );
    }

    #[test]
    fn transaction_errors_unwrap_to_inner_service_error() {
        let err: ServiceError =
            TransactionError::Transaction(ServiceError::Conflict("locked".into())).into();
        assert!(matches!(err, ServiceError::Conflict(_)));

        let err: ServiceError =
            TransactionError::<ServiceError>::Connection(DbErr::Custom("gone".into())).into();
        assert!(matches!(err, ServiceError::DatabaseError(_)));
    }

    #[tokio::test]
    async fn renders_error_body() {
        let response = ServiceError::NotFound("order 1 not found".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(payload.error, "Not Found");
        assert_eq!(payload.message, "Not found: order 1 not found");
    }
}
