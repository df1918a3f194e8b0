//! Error response types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// API error response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Optional details about the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    /// Creates a new API error with details.
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: Some(details.into()),
        }
    }
}

/// API error with HTTP status code.
#[derive(Debug, Clone)]
pub struct ApiErrorResponse {
    /// The HTTP status code.
    pub status: StatusCode,
    /// The error body.
    pub error: ApiError,
}

impl IntoResponse for ApiErrorResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self.error)).into_response()
    }
}

fn status_of(error: &EngineError) -> StatusCode {
    StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

impl From<EngineError> for ApiErrorResponse {
    fn from(error: EngineError) -> Self {
        let status = status_of(&error);
        let error = match error {
            EngineError::Unauthenticated { message } => ApiError::new("UNAUTHENTICATED", message),
            EngineError::Forbidden { message } => ApiError::new("FORBIDDEN", message),
            EngineError::NotFound { message } => ApiError::new("NOT_FOUND", message),
            EngineError::Conflict { message } => ApiError::new("CONFLICT", message),
            EngineError::Validation { message } => ApiError::new("VALIDATION_ERROR", message),
            EngineError::ConfigNotFound { path } => ApiError::with_details(
                "CONFIG_ERROR",
                "Configuration error",
                format!("Configuration file not found: {}", path),
            ),
            EngineError::ConfigParseError { path, message } => ApiError::with_details(
                "CONFIG_ERROR",
                "Configuration parse error",
                format!("Failed to parse {}: {}", path, message),
            ),
            EngineError::Storage { message } => {
                ApiError::with_details("STORAGE_ERROR", "Storage failure", message)
            }
        };
        ApiErrorResponse { status, error }
    }
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        ApiErrorResponse::from(self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_serialization() {
        let error = ApiError::new("CONFLICT", "overlapping leave request exists");
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("\"code\":\"CONFLICT\""));
        assert!(json.contains("\"message\":\"overlapping leave request exists\""));
        assert!(!json.contains("details"));
    }

    #[test]
    fn test_api_error_with_details_serialization() {
        let error = ApiError::with_details("STORAGE_ERROR", "Storage failure", "lock poisoned");
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("\"details\":\"lock poisoned\""));
    }

    #[test]
    fn test_domain_errors_keep_their_status() {
        let cases = [
            (EngineError::unauthenticated("missing tenant context"), StatusCode::UNAUTHORIZED, "UNAUTHENTICATED"),
            (EngineError::forbidden("insufficient permissions"), StatusCode::FORBIDDEN, "FORBIDDEN"),
            (EngineError::not_found("leave request not found"), StatusCode::NOT_FOUND, "NOT_FOUND"),
            (EngineError::conflict("deduction profile version mismatch"), StatusCode::CONFLICT, "CONFLICT"),
            (EngineError::validation("reason is required"), StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
        ];
        for (engine_error, status, code) in cases {
            let message = engine_error.to_string();
            let response: ApiErrorResponse = engine_error.into();
            assert_eq!(response.status, status);
            assert_eq!(response.error.code, code);
            assert_eq!(response.error.message, message);
        }
    }

    #[test]
    fn test_config_errors_are_internal() {
        let response: ApiErrorResponse = EngineError::ConfigNotFound {
            path: "config/engine.yaml".to_string(),
        }
        .into();
        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.error.code, "CONFIG_ERROR");
    }

    #[test]
    fn test_engine_error_into_response() {
        let response = EngineError::conflict("payroll run already confirmed").into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
