//! Access token issuing: login and refresh.
//!
//! Flow Overview: login verifies the stored credential and mints a token
//! carrying a snapshot of the member's privilege; refresh re-issues from
//! the live identity so the snapshot is brought up to date.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::auth::{guard::Scope, password};
use crate::store::members;

use super::super::{error::ApiError, state::AppState};
use super::require_identity;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub login_id: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AccessToken {
    pub key: String,
}

#[utoipa::path(
    post,
    path = "/v1/tokens",
    request_body = LoginRequest,
    responses(
        (status = 201, description = "Token issued", body = AccessToken),
        (status = 401, description = "Unknown login id, wrong password, or deactivated account"),
    ),
    tag = "tokens"
)]
pub async fn create(
    pool: Extension<PgPool>,
    state: Extension<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let credential = members::lookup_credential_by_login(&pool, payload.login_id.trim())
        .await?
        .ok_or(ApiError::InvalidCredentials)?;

    // Deliberately CPU-bound (memory-hard KDF); run it off the async workers.
    let verified = tokio::task::spawn_blocking(move || {
        password::verify(
            &payload.password,
            &credential.password_salt,
            &credential.password_hash,
        )
        .then_some(credential)
    })
    .await
    .map_err(|err| ApiError::Internal(err.into()))?;

    let Some(credential) = verified else {
        return Err(ApiError::InvalidCredentials);
    };
    if !credential.is_active {
        return Err(ApiError::InvalidCredentials);
    }

    let key = state
        .codec()
        .issue(&credential.uuid.to_string(), credential.is_admin)?;
    Ok((StatusCode::CREATED, Json(AccessToken { key })))
}

#[utoipa::path(
    post,
    path = "/v1/tokens/refresh",
    responses(
        (status = 201, description = "Token re-issued from the live identity", body = AccessToken),
        (status = 401, description = "Missing or invalid token"),
    ),
    tag = "tokens"
)]
pub async fn refresh(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let identity = require_identity(Scope::Authenticated, &headers, &state, &pool).await?;

    // The refreshed token carries the current privilege snapshot, not the
    // one embedded in the presented token.
    let key = state
        .codec()
        .issue(&identity.subject_id, identity.is_admin)?;
    Ok((StatusCode::CREATED, Json(AccessToken { key })))
}
