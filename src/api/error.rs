//! API error taxonomy.
//!
//! Callers always receive a distinguishable kind so clients can decide
//! between re-login, a permission message, or input correction, never a
//! raw internal message. `Internal` logs the underlying error and
//! surfaces only the kind.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;
use utoipa::ToSchema;

use crate::auth::guard::GuardError;
use crate::page::PageError;

#[derive(Debug)]
pub enum ApiError {
    InvalidCredentials,
    Unauthenticated,
    Forbidden,
    BadRequest(&'static str),
    NotFound,
    Conflict(&'static str),
    Internal(anyhow::Error),
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, detail) = match self {
            Self::InvalidCredentials => (StatusCode::UNAUTHORIZED, "invalid_credentials", None),
            Self::Unauthenticated => (StatusCode::UNAUTHORIZED, "unauthenticated", None),
            Self::Forbidden => (StatusCode::FORBIDDEN, "forbidden", None),
            Self::BadRequest(detail) => (StatusCode::BAD_REQUEST, "bad_request", Some(detail)),
            Self::NotFound => (StatusCode::NOT_FOUND, "not_found", None),
            Self::Conflict(detail) => (StatusCode::CONFLICT, "conflict", Some(detail)),
            Self::Internal(err) => {
                error!("internal error: {err:#}");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal", None)
            }
        };
        let body = ErrorBody {
            error: kind.to_string(),
            detail: detail.map(str::to_string),
        };
        (status, Json(body)).into_response()
    }
}

impl From<GuardError> for ApiError {
    fn from(err: GuardError) -> Self {
        match err {
            GuardError::Unauthenticated => Self::Unauthenticated,
            GuardError::Forbidden => Self::Forbidden,
            GuardError::Store(err) => Self::Internal(err),
        }
    }
}

impl From<PageError> for ApiError {
    fn from(err: PageError) -> Self {
        match err {
            PageError::ConflictingCursors => {
                Self::BadRequest("before and after cursors are mutually exclusive")
            }
            PageError::Source(err) => Self::Internal(err),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

// Token issuing failures are infrastructure problems; validation errors
// never reach this conversion (the guard folds them into its own kind).
impl From<crate::auth::token::Error> for ApiError {
    fn from(err: crate::auth::token::Error) -> Self {
        Self::Internal(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_failures_keep_their_kind() {
        assert!(matches!(
            ApiError::from(GuardError::Unauthenticated),
            ApiError::Unauthenticated
        ));
        assert!(matches!(
            ApiError::from(GuardError::Forbidden),
            ApiError::Forbidden
        ));
        assert!(matches!(
            ApiError::from(GuardError::Store(anyhow::anyhow!("boom"))),
            ApiError::Internal(_)
        ));
    }

    #[test]
    fn conflicting_cursors_map_to_bad_request() {
        assert!(matches!(
            ApiError::from(PageError::ConflictingCursors),
            ApiError::BadRequest(_)
        ));
    }

    #[test]
    fn responses_carry_the_expected_status() {
        assert_eq!(
            ApiError::InvalidCredentials.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::Unauthenticated.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::Forbidden.into_response().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::BadRequest("nope").into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::NotFound.into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Internal(anyhow::anyhow!("boom"))
                .into_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
