//! Error types for wastewise-api

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::services::midtrans_client::MidtransError;
use crate::services::ml_client::MlClientError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Rejected credential or signature (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Conflict (409), e.g. duplicate slug
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// Upstream answered with an error (502)
    #[error("Bad gateway: {0}")]
    BadGateway(String),

    /// ML service could not be reached (503)
    #[error("ML service unavailable: {0}")]
    MlServiceUnavailable(String),

    /// Upstream did not answer in time (504)
    #[error("Timeout: {0}")]
    Timeout(String),

    /// wastewise-common error
    #[error("Common error: {0}")]
    Common(#[from] wastewise_common::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        use wastewise_common::Error as CommonError;

        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, "BAD_GATEWAY", msg),
            ApiError::MlServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "ML_SERVICE_UNAVAILABLE", msg)
            }
            ApiError::Timeout(msg) => (StatusCode::GATEWAY_TIMEOUT, "TIMEOUT", msg),
            ApiError::Common(CommonError::NotFound(msg)) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", msg)
            }
            ApiError::Common(CommonError::Conflict(msg)) => (StatusCode::CONFLICT, "CONFLICT", msg),
            ApiError::Common(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "COMMON_ERROR",
                err.to_string(),
            ),
        };

        if status.is_server_error() {
            tracing::error!(code = error_code, "{}", message);
        } else {
            tracing::debug!(code = error_code, "{}", message);
        }

        let body = Json(json!({
            "success": false,
            "status": "error",
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

impl From<MlClientError> for ApiError {
    fn from(err: MlClientError) -> Self {
        match err {
            MlClientError::Unavailable(msg) => ApiError::MlServiceUnavailable(format!(
                "ML service is not available, make sure it is running: {}",
                msg
            )),
            MlClientError::Timeout => {
                ApiError::Timeout("ML service did not respond in time".to_string())
            }
            MlClientError::Upstream { status, body } => {
                ApiError::BadGateway(format!("ML service returned {}: {}", status, body))
            }
            MlClientError::Rejected(msg) => {
                ApiError::Internal(format!("Classification failed: {}", msg))
            }
            MlClientError::Network(msg) | MlClientError::Parse(msg) => {
                ApiError::Internal(format!("ML service request failed: {}", msg))
            }
        }
    }
}

impl From<MidtransError> for ApiError {
    fn from(err: MidtransError) -> Self {
        match err {
            MidtransError::NotConfigured => {
                ApiError::Internal("Payment gateway keys are not configured".to_string())
            }
            MidtransError::InvalidOrderId(id) => {
                ApiError::BadRequest(format!("Invalid order id: {}", id))
            }
            other => ApiError::BadGateway(other.to_string()),
        }
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_errors_map_to_client_statuses() {
        use wastewise_common::Error as CommonError;

        let not_found = ApiError::from(CommonError::NotFound("x".into())).into_response();
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);

        let conflict = ApiError::from(CommonError::Conflict("x".into())).into_response();
        assert_eq!(conflict.status(), StatusCode::CONFLICT);

        let internal = ApiError::from(CommonError::Internal("x".into())).into_response();
        assert_eq!(internal.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_ml_errors_map_to_gateway_statuses() {
        let unavailable: ApiError = MlClientError::Unavailable("refused".into()).into();
        assert_eq!(unavailable.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);

        let timeout: ApiError = MlClientError::Timeout.into();
        assert_eq!(timeout.into_response().status(), StatusCode::GATEWAY_TIMEOUT);

        let upstream: ApiError = MlClientError::Upstream {
            status: 500,
            body: "boom".into(),
        }
        .into();
        assert_eq!(upstream.into_response().status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_midtrans_errors_map_to_statuses() {
        let bad_id: ApiError = MidtransError::InvalidOrderId("a/b".into()).into();
        assert_eq!(bad_id.into_response().status(), StatusCode::BAD_REQUEST);

        let missing: ApiError = MidtransError::NotConfigured.into();
        assert_eq!(missing.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);

        let network: ApiError = MidtransError::Network("refused".into()).into();
        assert_eq!(network.into_response().status(), StatusCode::BAD_GATEWAY);
    }
}
