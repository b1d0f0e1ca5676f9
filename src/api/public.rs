//! Public API types

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::response::{IntoResponse, Response};
use http::StatusCode;
use serde::Serialize;

use crate::chat::{ChatError, UPSTREAM_ERROR_MESSAGE};

// Errors

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Internal error chain attached to error responses. Only rendered
/// when the server runs in development mode.
#[derive(Clone, Debug)]
pub struct ErrorDetails {
    pub error: String,
    pub details: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    source: Option<anyhow::Error>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: &str) -> Self {
        Self {
            status,
            message: message.to_string(),
            source: None,
        }
    }

    pub fn bad_request(message: &str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

/// Convert `ApiError` into an Axum compatible response.
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            match &self.source {
                Some(source) => tracing::error!("{}: {:#}", self.message, source),
                None => tracing::error!("{}", self.message),
            }
        }

        let body = ErrorBody {
            error: self.message.clone(),
            details: None,
        };
        let mut response = (self.status, Json(body)).into_response();
        if let Some(source) = self.source {
            response.extensions_mut().insert(ErrorDetails {
                error: self.message,
                details: format!("{:#}", source),
            });
        }
        response
    }
}

/// Enables using `?` on functions that return `Result<_,
/// anyhow::Error>`. The message stays generic, the cause is logged.
impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: String::from("Internal Server Error"),
            source: Some(err),
        }
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::Validation(message) => Self::bad_request(message),
            ChatError::Upstream(source) => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: UPSTREAM_ERROR_MESSAGE.to_string(),
                source: Some(source),
            },
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), &rejection.body_text())
    }
}

// Re-export public types from each route

pub mod chat {
    pub use crate::api::routes::chat::public::*;
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;

    use super::*;

    #[test]
    fn test_chat_error_status() {
        let err = ApiError::from(ChatError::Validation("message is required"));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err = ApiError::from(ChatError::Upstream(anyhow!("timed out")));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, UPSTREAM_ERROR_MESSAGE);
    }

    #[test]
    fn test_error_details_attached_only_with_source() {
        let response = ApiError::bad_request("nope").into_response();
        assert!(response.extensions().get::<ErrorDetails>().is_none());

        let err = ApiError::from(anyhow!("disk full").context("Failed to write"));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let details = response.extensions().get::<ErrorDetails>().unwrap();
        assert_eq!(details.error, "Internal Server Error");
        assert_eq!(details.details, "Failed to write: disk full");
    }
}
