//! API error type and the JSON error envelope.

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use crate::common::ids::ConversationIdError;
use crate::common::pagination::PageError;
use crate::conversation::ConversationError;
use crate::folders::FolderError;
use crate::tags::TagError;

/// Message of every 500 response.
const INTERNAL_MESSAGE: &str = "Internal server error";
/// Message of every 502 response.
const UPSTREAM_MESSAGE: &str = "LLM request failed";

/// Convenience result alias for handlers.
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors returned by handlers, rendered as `{code, message, details}`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed request (400).
    #[error("{0}")]
    BadRequest(String),
    /// Unknown resource (404).
    #[error("{0}")]
    NotFound(String),
    /// Resource already exists (409).
    #[error("{0}")]
    Conflict(String),
    /// Request is well-formed but invalid (422).
    #[error("{0}")]
    Validation(String),
    /// The LLM backend failed (502).
    #[error("{0}")]
    Upstream(String),
    /// Anything else (500).
    #[error("{0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: u32,
    message: String,
    details: Option<String>,
}

impl ApiError {
    /// HTTP status of this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn into_body(self) -> ErrorBody {
        let code = u32::from(self.status().as_u16()) * 10;
        let (message, details) = match self {
            Self::Upstream(details) => (UPSTREAM_MESSAGE.to_string(), Some(details)),
            Self::Internal(details) => (INTERNAL_MESSAGE.to_string(), Some(details)),
            Self::BadRequest(message)
            | Self::NotFound(message)
            | Self::Conflict(message)
            | Self::Validation(message) => (message, None),
        };
        ErrorBody {
            code,
            message,
            details,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "request failed");
        } else {
            warn!(status = status.as_u16(), error = %self, "request rejected");
        }
        (status, Json(self.into_body())).into_response()
    }
}

impl From<ConversationError> for ApiError {
    fn from(err: ConversationError) -> Self {
        match err {
            ConversationError::EmptyContent | ConversationError::InvalidConfig(_) => {
                Self::Validation(err.to_string())
            }
            ConversationError::AlreadyExists(_) => Self::Conflict(err.to_string()),
            ConversationError::Llm(inner) => Self::Upstream(inner.to_string()),
            ConversationError::Storage(inner) => Self::Internal(inner.to_string()),
        }
    }
}

impl From<FolderError> for ApiError {
    fn from(err: FolderError) -> Self {
        match err {
            FolderError::NotFound(_) => Self::NotFound(err.to_string()),
            FolderError::EmptyName
            | FolderError::DuplicateName(_)
            | FolderError::DefaultImmutable(_)
            | FolderError::MissingConversationId => Self::BadRequest(err.to_string()),
            FolderError::Storage(inner) => Self::Internal(inner.to_string()),
        }
    }
}

impl From<TagError> for ApiError {
    fn from(err: TagError) -> Self {
        match err {
            TagError::NotFound(_) => Self::NotFound(err.to_string()),
            TagError::EmptyTag => Self::Validation(err.to_string()),
            TagError::Storage(inner) => Self::Internal(inner.to_string()),
        }
    }
}

impl From<PageError> for ApiError {
    fn from(err: PageError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<ConversationIdError> for ApiError {
    fn from(err: ConversationIdError) -> Self {
        Self::BadRequest(format!("invalid conversation id: {err}"))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::UNPROCESSABLE_ENTITY {
            Self::Validation(rejection.body_text())
        } else {
            Self::BadRequest(rejection.body_text())
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_codes() {
        let body = ApiError::NotFound("gone".to_string()).into_body();
        assert_eq!(body.code, 4040);
        assert_eq!(body.message, "gone");
        assert!(body.details.is_none());

        let body = ApiError::Internal("disk full".to_string()).into_body();
        assert_eq!(body.code, 5000);
        assert_eq!(body.message, INTERNAL_MESSAGE);
        assert_eq!(body.details.as_deref(), Some("disk full"));

        assert_eq!(ApiError::Upstream(String::new()).into_body().code, 5020);
        assert_eq!(ApiError::Conflict(String::new()).into_body().code, 4090);
        assert_eq!(ApiError::Validation(String::new()).into_body().code, 4220);
    }

    #[test]
    fn test_domain_error_mapping() {
        let err: ApiError = ConversationError::EmptyContent.into();
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let err: ApiError = FolderError::DefaultImmutable("deleted").into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err: ApiError = TagError::EmptyTag.into();
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let err: ApiError = PageError::Page(0).into();
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
