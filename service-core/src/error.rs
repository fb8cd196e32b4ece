use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(#[from] validator::ValidationErrors),

    /// A field is missing, malformed or outside its enumeration.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Every field is individually valid but the combination is not offered.
    #[error("Unsupported combination: {0}")]
    UnsupportedCombination(String),

    #[error("Content policy violation: {0}")]
    ContentPolicy(String),

    #[error("Not found: {0}")]
    NotFound(anyhow::Error),

    /// Provider failure. The message is already sanitized for callers.
    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Upstream timeout: {0}")]
    Timeout(String),

    #[error("Storage error: {0}")]
    StorageError(anyhow::Error),

    #[error("Internal server error: {0}")]
    InternalError(#[from] anyhow::Error),

    #[error("Configuration error: {0}")]
    ConfigError(anyhow::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) | AppError::InvalidInput(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::UnsupportedCombination(_) | AppError::ContentPolicy(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Upstream(_)
            | AppError::StorageError(_)
            | AppError::InternalError(_)
            | AppError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(anyhow::Error::new(err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(anyhow::Error::new(err))
    }
}

/// Body shared by every failed response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub detail: String,
    pub status_code: u16,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let (error, detail) = match self {
            AppError::ValidationError(err) => ("Validation Error", err.to_string()),
            AppError::InvalidInput(msg) => ("Validation Error", msg),
            AppError::UnsupportedCombination(msg) => ("Unsupported Combination", msg),
            AppError::ContentPolicy(msg) => ("Content Policy Violation", msg),
            AppError::NotFound(err) => ("Not Found", err.to_string()),
            AppError::Upstream(msg) => {
                tracing::error!(detail = %msg, "Upstream provider failure");
                ("Upstream Error", msg)
            }
            AppError::Timeout(msg) => {
                tracing::error!(detail = %msg, "Upstream provider timed out");
                ("Timeout", msg)
            }
            AppError::StorageError(err) => {
                tracing::error!(error = ?err, "Storage failure");
                ("Storage Error", "Failed to store generated media".to_string())
            }
            AppError::InternalError(err) => {
                tracing::error!(error = ?err, "Internal error");
                (
                    "Internal Server Error",
                    "An unexpected error occurred".to_string(),
                )
            }
            AppError::ConfigError(err) => {
                tracing::error!(error = ?err, "Configuration error");
                (
                    "Configuration Error",
                    "Service is misconfigured".to_string(),
                )
            }
        };

        (
            status,
            Json(ErrorResponse {
                error: error.to_string(),
                detail,
                status_code: status.as_u16(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        (status, serde_json::from_slice(&bytes).expect("json"))
    }

    #[tokio::test]
    async fn invalid_input_maps_to_422_envelope() {
        let (status, body) = body_json(AppError::InvalidInput("prompt is required".into())).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "Validation Error");
        assert_eq!(body["detail"], "prompt is required");
        assert_eq!(body["status_code"], 422);
    }

    #[tokio::test]
    async fn unsupported_combination_is_400() {
        let (status, body) =
            body_json(AppError::UnsupportedCombination("needs 1 image".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status_code"], 400);
    }

    #[tokio::test]
    async fn content_policy_is_400_with_its_own_label() {
        let (status, body) = body_json(AppError::ContentPolicy("blocked".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Content Policy Violation");
    }

    #[tokio::test]
    async fn timeout_is_504() {
        let (status, _) = body_json(AppError::Timeout("fal".into())).await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    }

    #[tokio::test]
    async fn internal_errors_do_not_leak_detail() {
        let (status, body) =
            body_json(AppError::InternalError(anyhow::anyhow!("secret path /etc/x"))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body["detail"].as_str().unwrap().contains("/etc/x"));
    }
}
