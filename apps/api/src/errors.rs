use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Request-shape problems caught before any document is processed.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("job_description cannot be empty")]
    MissingJobDescription,

    #[error("criteria count must be between 1 and {max}, got {count}")]
    InvalidCriteriaCount { count: usize, max: usize },

    #[error("criteria file is not valid JSON: {0}")]
    MalformedCriteria(String),

    #[error("criteria set must contain at least one criterion")]
    EmptyCriteria,

    #[error("criterion at position {index} has no id")]
    MissingCriterionId { index: usize },

    #[error("criterion '{0}' appears more than once")]
    DuplicateCriterion(String),

    #[error("criterion '{0}' has no question")]
    MissingQuestion(String),

    #[error("criterion '{id}' has weight {weight}; weights must be within 0..1")]
    InvalidWeight { id: String, weight: f64 },

    #[error("unknown criterion '{0}'")]
    UnknownCriterion(String),

    #[error("at least one resume file is required")]
    NoDocuments,

    #[error("invalid multipart field '{field}': {message}")]
    InvalidField { field: String, message: String },
}

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Validation(e) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", e.to_string()),
            AppError::Llm(msg) => {
                tracing::error!("LLM error: {msg}");
                (
                    StatusCode::BAD_GATEWAY,
                    "LLM_ERROR",
                    "The completion service could not process this request".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_maps_to_bad_request() {
        let response = AppError::from(ValidationError::MissingJobDescription).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_llm_error_hides_details() {
        let response = AppError::Llm("upstream said no".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
