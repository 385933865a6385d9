//! Device push tokens and board subscriptions.

use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::guard::Scope;
use crate::store::{boards, push};

use super::super::{error::ApiError, state::AppState};
use super::require_identity;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct PushTokenInput {
    pub token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PushTokenBody {
    pub member_uuid: String,
    pub token: String,
}

fn subject_uuid(subject_id: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(subject_id).map_err(|err| ApiError::Internal(err.into()))
}

#[utoipa::path(
    post,
    path = "/v1/push-tokens",
    request_body = PushTokenInput,
    responses(
        (status = 201, description = "Device token registered", body = PushTokenBody),
        (status = 400, description = "Empty token"),
        (status = 401, description = "Missing or invalid token"),
    ),
    tag = "push"
)]
pub async fn register(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AppState>>,
    Json(payload): Json<PushTokenInput>,
) -> Result<impl IntoResponse, ApiError> {
    let identity = require_identity(Scope::Authenticated, &headers, &state, &pool).await?;

    let token = payload.token.trim();
    if token.is_empty() {
        return Err(ApiError::BadRequest("device token is required"));
    }

    let member_uuid = subject_uuid(&identity.subject_id)?;
    push::register_push_token(&pool, member_uuid, token).await?;
    Ok((
        StatusCode::CREATED,
        Json(PushTokenBody {
            member_uuid: identity.subject_id,
            token: token.to_string(),
        }),
    ))
}

#[utoipa::path(
    delete,
    path = "/v1/push-tokens",
    request_body = PushTokenInput,
    responses(
        (status = 204, description = "Device token removed"),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Token was not registered"),
    ),
    tag = "push"
)]
pub async fn deregister(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AppState>>,
    Json(payload): Json<PushTokenInput>,
) -> Result<impl IntoResponse, ApiError> {
    let identity = require_identity(Scope::Authenticated, &headers, &state, &pool).await?;
    let member_uuid = subject_uuid(&identity.subject_id)?;

    if push::deregister_push_token(&pool, member_uuid, payload.token.trim()).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound)
    }
}

#[utoipa::path(
    post,
    path = "/v1/boards/{id}/subscription",
    params(("id" = i64, Path, description = "Board id")),
    responses(
        (status = 204, description = "Subscribed to the board's new posts"),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Unknown board"),
    ),
    tag = "push"
)]
pub async fn subscribe(
    Path(id): Path<i64>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let identity = require_identity(Scope::Authenticated, &headers, &state, &pool).await?;
    if boards::fetch_board(&pool, id).await?.is_none() {
        return Err(ApiError::NotFound);
    }

    let member_uuid = subject_uuid(&identity.subject_id)?;
    push::subscribe_board(&pool, member_uuid, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/v1/boards/{id}/subscription",
    params(("id" = i64, Path, description = "Board id")),
    responses(
        (status = 204, description = "Subscription removed"),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "No such subscription"),
    ),
    tag = "push"
)]
pub async fn unsubscribe(
    Path(id): Path<i64>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let identity = require_identity(Scope::Authenticated, &headers, &state, &pool).await?;
    let member_uuid = subject_uuid(&identity.subject_id)?;

    if push::unsubscribe_board(&pool, member_uuid, id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound)
    }
}
