use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Error, Debug, Clone)]
pub enum ApiError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Translation failed: {0}")]
    Translation(String),

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Vector search failed: {0}")]
    Search(String),

    #[error("Completion failed: {0}")]
    Completion(String),

    #[error("Not enough matching books: needed {required}, found {found}")]
    InsufficientResults { required: usize, found: usize },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl ApiError {
    /// Message shown to the person using the UI. Upstream details stay in the logs.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::InvalidInput(message) => message.clone(),
            ApiError::InsufficientResults { .. } => {
                "Not enough matching books were found to write a recommendation.".to_string()
            }
            ApiError::Translation(_) => "Could not translate your description.".to_string(),
            ApiError::Embedding(_) | ApiError::Search(_) => {
                "Could not search for matching books.".to_string()
            }
            ApiError::Completion(_) => "Could not write a recommendation.".to_string(),
            ApiError::Config(_) | ApiError::InternalError(_) => {
                "Something went wrong. Please try again.".to_string()
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::InsufficientResults { .. } => StatusCode::NOT_FOUND,
            ApiError::Translation(_)
            | ApiError::Embedding(_)
            | ApiError::Search(_)
            | ApiError::Completion(_) => StatusCode::BAD_GATEWAY,
            ApiError::Config(_) | ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let error = ErrorResponse {
            error: self.user_message(),
        };

        HttpResponse::build(self.status_code()).json(error)
    }
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::Config(err.to_string())
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        ApiError::InternalError(err.to_string())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::InternalError(format!("{:#}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::InvalidInput("empty".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Search("down".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ApiError::InsufficientResults {
                required: 3,
                found: 1
            }
            .status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Config("missing key".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_user_message_hides_upstream_details() {
        let err = ApiError::Completion("401 invalid api key sk-123".into());
        assert!(!err.user_message().contains("sk-123"));
        assert!(err.to_string().contains("401"));
    }
}
