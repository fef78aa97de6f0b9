//! Error handling for the dashboard HTTP layer

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use uuid::Uuid;

/// Standard error payload for all HTTP errors
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    pub details: Vec<serde_json::Value>,
    pub trace_id: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

/// Application error types that map to HTTP responses
#[derive(Error, Debug)]
pub enum AppError {
    #[error("validation error: {message}")]
    Validation {
        details: Vec<serde_json::Value>,
        code: String,
        message: String,
    },

    #[error("not found: {message}")]
    NotFound { message: String, code: String },

    #[error("bad request: {message}")]
    BadRequest { message: String, code: String },

    #[error("upstream failure: {message}")]
    Upstream { message: String, code: String },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Create a validation error
    pub fn validation(details: Vec<serde_json::Value>, message: impl Into<String>) -> Self {
        Self::Validation {
            details,
            code: "validation_error".to_string(),
            message: message.into(),
        }
    }

    /// Create a validation error with a domain-specific code
    pub fn validation_with_code(
        code: impl Into<String>,
        details: Vec<serde_json::Value>,
        message: impl Into<String>,
    ) -> Self {
        Self::Validation {
            details,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
            code: "not_found".to_string(),
        }
    }

    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
            code: "bad_request".to_string(),
        }
    }

    /// Create an error for a failed call to an external service
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream {
            message: message.into(),
            code: "upstream_unavailable".to_string(),
        }
    }

    fn parts(self) -> (StatusCode, String, String, Vec<serde_json::Value>) {
        match self {
            AppError::Validation {
                details,
                code,
                message,
            } => (StatusCode::UNPROCESSABLE_ENTITY, code, message, details),
            AppError::NotFound { message, code } => {
                (StatusCode::NOT_FOUND, code, message, Vec::new())
            }
            AppError::BadRequest { message, code } => {
                (StatusCode::BAD_REQUEST, code, message, Vec::new())
            }
            AppError::Upstream { message, code } => {
                (StatusCode::BAD_GATEWAY, code, message, Vec::new())
            }
            AppError::Internal(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error".to_string(),
                format!("{e:#}"),
                Vec::new(),
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let error_id = Uuid::new_v4();
        let timestamp = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default();

        let (status, code, message, details) = self.parts();

        if status.is_server_error() {
            tracing::error!(
                error_id = %error_id,
                error_code = %code,
                status_code = %status.as_u16(),
                %message,
                "request failed"
            );
        } else {
            tracing::warn!(
                error_id = %error_id,
                error_code = %code,
                status_code = %status.as_u16(),
                "request rejected"
            );
        }

        // Internal error details stay in the logs for release builds.
        let message = if cfg!(not(debug_assertions)) && status == StatusCode::INTERNAL_SERVER_ERROR
        {
            "An internal server error occurred".to_string()
        } else {
            message
        };

        let envelope = ErrorEnvelope {
            error: ErrorBody {
                code,
                message,
                details,
                trace_id: error_id.to_string(),
                timestamp,
            },
        };

        (status, Json(envelope)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_validation_error() {
        let details = vec![serde_json::json!({"field": "date", "error": "required"})];
        let error = AppError::validation(details.clone(), "Validation failed");

        match error {
            AppError::Validation {
                details: d,
                code,
                message,
            } => {
                assert_eq!(d, details);
                assert_eq!(code, "validation_error");
                assert_eq!(message, "Validation failed");
            }
            _ => panic!("Expected Validation error"),
        }
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError::not_found("missing").into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::bad_request("bad").into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::upstream("shopify down").into_response().status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AppError::Internal(anyhow::anyhow!("disk full"))
                .into_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_error_response_format() {
        let error = AppError::validation_with_code(
            "invalid_transition",
            vec![serde_json::json!({"from": "approved", "to": "pending"})],
            "invalid approval change",
        );
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "invalid_transition");
        assert_eq!(body["error"]["message"], "invalid approval change");
        assert_eq!(body["error"]["details"][0]["to"], "pending");
        assert!(Uuid::parse_str(body["error"]["trace_id"].as_str().unwrap()).is_ok());
        assert!(body["error"]["timestamp"].as_str().unwrap().contains('T'));
    }
}
