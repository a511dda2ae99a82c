use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::repositories::StoreError;
use crate::services::score_recompute::RecomputeError;

#[derive(Debug, Serialize)]
struct ErrorResponse {
    status: u16,
    detail: String,
}

#[derive(Debug)]
pub(crate) enum ApiError {
    Unauthorized(&'static str),
    Forbidden(&'static str),
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    UnprocessableEntity(String),
    ServiceUnavailable(String),
    Internal(String),
}

impl ApiError {
    /// Log the underlying error with context and return an `Internal` variant.
    pub(crate) fn internal(err: impl std::fmt::Display, context: &str) -> Self {
        tracing::error!(error = %err, "{context}");
        Self::Internal(context.to_string())
    }

    /// Store failures become 503 when the backend is unreachable and 500 otherwise.
    pub(crate) fn store(err: StoreError, context: &str) -> Self {
        match err {
            StoreError::Unavailable(reason) => {
                tracing::warn!(error = %reason, "{context}");
                Self::ServiceUnavailable(context.to_string())
            }
            other => Self::internal(other, context),
        }
    }

    /// Recomputation failures are always client errors. Store causes stay out of the body.
    pub(crate) fn recompute(err: RecomputeError) -> Self {
        match &err {
            RecomputeError::MissingAttemptId => Self::BadRequest(err.to_string()),
            RecomputeError::AttemptNotFound | RecomputeError::NoQuestions => {
                Self::NotFound(err.to_string())
            }
            RecomputeError::NotCompleted => Self::Conflict(err.to_string()),
            RecomputeError::ScoreOutOfRange(_) => Self::UnprocessableEntity(err.to_string()),
            RecomputeError::Store(store_err) => {
                tracing::warn!(error = %store_err, "Score recomputation failed");
                Self::BadRequest("Failed to recompute score".to_string())
            }
        }
    }

    pub(crate) fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::UnprocessableEntity(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub(crate) fn detail(&self) -> &str {
        match self {
            ApiError::Unauthorized(message) | ApiError::Forbidden(message) => *message,
            ApiError::BadRequest(message)
            | ApiError::NotFound(message)
            | ApiError::Conflict(message)
            | ApiError::UnprocessableEntity(message)
            | ApiError::ServiceUnavailable(message)
            | ApiError::Internal(message) => message.as_str(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let unauthorized = matches!(self, ApiError::Unauthorized(_));
        let detail = self.detail().to_string();

        let mut response =
            (status, Json(ErrorResponse { status: status.as_u16(), detail })).into_response();
        if unauthorized {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}
