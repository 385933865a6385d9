//! HTTP handlers, grouped by resource.

use axum::http::HeaderMap;
use sqlx::PgPool;

use crate::auth::guard::{self, Identity, Scope};

use super::error::ApiError;
use super::state::AppState;

pub mod boards;
pub mod comments;
pub mod files;
pub mod health;
pub mod members;
pub mod posts;
pub mod push;
pub mod tokens;

/// Resolve the caller for a scope that requires one.
pub(crate) async fn require_identity(
    scope: Scope,
    headers: &HeaderMap,
    state: &AppState,
    pool: &PgPool,
) -> Result<Identity, ApiError> {
    Ok(guard::require(scope, headers, state.codec(), pool).await?)
}

/// Resolve the caller when a scope may be `None`; an absent header is
/// fine, a bad token is not.
pub(crate) async fn authorize_scope(
    scope: Scope,
    headers: &HeaderMap,
    state: &AppState,
    pool: &PgPool,
) -> Result<Option<Identity>, ApiError> {
    Ok(guard::authorize(scope, headers, state.codec(), pool).await?)
}
