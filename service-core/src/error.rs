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

    #[error("Bad request: {0}")]
    BadRequest(anyhow::Error),

    #[error("Not found: {0}")]
    NotFound(anyhow::Error),

    #[error("Conflict: {0}")]
    Conflict(anyhow::Error),

    #[error("Unauthorized: {0}")]
    Unauthorized(anyhow::Error),

    /// Quota exhaustion. Rendered as 403 with the machine-readable `code`
    /// plus the ceiling and current count so clients can display them.
    #[error("Limit exceeded ({code}): {message}")]
    LimitExceeded {
        code: &'static str,
        message: String,
        limit: u32,
        count: u32,
    },

    #[error("Internal server error: {0}")]
    InternalError(#[from] anyhow::Error),

    #[error("Service Unavailable")]
    ServiceUnavailable,

    #[error("Database error: {0}")]
    DatabaseError(anyhow::Error),

    #[error("Configuration error: {0}")]
    ConfigError(anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(anyhow::Error::new(err))
    }
}

impl From<axum::extract::rejection::QueryRejection> for AppError {
    fn from(err: axum::extract::rejection::QueryRejection) -> Self {
        AppError::BadRequest(anyhow::anyhow!(
            "Invalid query parameters: {}",
            err.body_text()
        ))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(anyhow::Error::new(err))
    }
}

impl From<mongodb::error::Error> for AppError {
    fn from(err: mongodb::error::Error) -> Self {
        AppError::DatabaseError(anyhow::Error::new(err))
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    count: Option<u32>,
}

impl ErrorResponse {
    fn new(error: impl Into<String>, details: Option<String>) -> Self {
        Self {
            error: error.into(),
            code: None,
            details,
            limit: None,
            count: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::ValidationError(err) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new("Validation error", Some(err.to_string())),
            ),
            AppError::BadRequest(err) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new(err.to_string(), None),
            ),
            AppError::NotFound(err) => (
                StatusCode::NOT_FOUND,
                ErrorResponse::new(err.to_string(), None),
            ),
            AppError::Conflict(err) => (
                StatusCode::CONFLICT,
                ErrorResponse::new(err.to_string(), None),
            ),
            AppError::Unauthorized(err) => (
                StatusCode::UNAUTHORIZED,
                ErrorResponse::new(err.to_string(), None),
            ),
            AppError::LimitExceeded {
                code,
                message,
                limit,
                count,
            } => (
                StatusCode::FORBIDDEN,
                ErrorResponse {
                    error: message,
                    code: Some(code),
                    details: None,
                    limit: Some(limit),
                    count: Some(count),
                },
            ),
            AppError::InternalError(err) => {
                tracing::error!(error = ?err, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("Internal server error", None),
                )
            }
            AppError::ServiceUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorResponse::new("Service unavailable", None),
            ),
            AppError::DatabaseError(err) => {
                tracing::error!(error = %err, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("Database error", None),
                )
            }
            AppError::ConfigError(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::new("Configuration error", Some(err.to_string())),
            ),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(res: Response) -> serde_json::Value {
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn limit_exceeded_renders_forbidden_with_metadata() {
        let res = AppError::LimitExceeded {
            code: "DAILY_LIMIT_REACHED",
            message: "Daily message limit reached".to_string(),
            limit: 5,
            count: 5,
        }
        .into_response();

        assert_eq!(res.status(), StatusCode::FORBIDDEN);
        let body = body_json(res).await;
        assert_eq!(body["code"], "DAILY_LIMIT_REACHED");
        assert_eq!(body["limit"], 5);
        assert_eq!(body["count"], 5);
    }

    #[tokio::test]
    async fn internal_error_hides_details() {
        let res = AppError::InternalError(anyhow::anyhow!("secret connection string")).into_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(res).await;
        assert_eq!(body["error"], "Internal server error");
        assert!(body.get("details").is_none());
    }

    #[tokio::test]
    async fn service_unavailable_renders_503() {
        let res = AppError::ServiceUnavailable.into_response();
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_json(res).await["error"], "Service unavailable");
    }
}
