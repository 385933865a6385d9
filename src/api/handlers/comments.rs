//! Comments under posts. Anyone who can read the board can comment.

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
use crate::store::boards;
use crate::store::comments::{self, CommentRecord};
use crate::store::posts;

use super::super::{error::ApiError, state::AppState};
use super::require_identity;

#[derive(Debug, Serialize, ToSchema)]
pub struct CommentBody {
    pub id: i64,
    pub post_id: i64,
    pub author_uuid: String,
    pub body: String,
    pub created_at: String,
}

impl From<CommentRecord> for CommentBody {
    fn from(record: CommentRecord) -> Self {
        Self {
            id: record.id,
            post_id: record.post_id,
            author_uuid: record.author_uuid,
            body: record.body,
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CommentInput {
    pub body: String,
}

#[utoipa::path(
    post,
    path = "/v1/posts/{id}/comments",
    params(("id" = i64, Path, description = "Post id")),
    request_body = CommentInput,
    responses(
        (status = 201, description = "Comment created", body = CommentBody),
        (status = 400, description = "Empty body"),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Board requires administrator access"),
        (status = 404, description = "Unknown post"),
    ),
    tag = "comments"
)]
pub async fn create(
    Path(id): Path<i64>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AppState>>,
    Json(payload): Json<CommentInput>,
) -> Result<impl IntoResponse, ApiError> {
    let post = posts::fetch_post(&pool, id).await?.ok_or(ApiError::NotFound)?;
    let board = boards::fetch_board(&pool, post.board_id)
        .await?
        .ok_or(ApiError::NotFound)?;

    // Commenting follows the board's read permission, but always needs an
    // author.
    let scope = match board.read_scope() {
        Scope::None => Scope::Authenticated,
        scope => scope,
    };
    let identity = require_identity(scope, &headers, &state, &pool).await?;

    if payload.body.trim().is_empty() {
        return Err(ApiError::BadRequest("comment body is required"));
    }

    let author_uuid = Uuid::parse_str(&identity.subject_id)
        .map_err(|err| ApiError::Internal(err.into()))?;
    let record = comments::insert_comment(&pool, post.id, author_uuid, &payload.body).await?;
    Ok((StatusCode::CREATED, Json(CommentBody::from(record))))
}

#[utoipa::path(
    delete,
    path = "/v1/comments/{id}",
    params(("id" = i64, Path, description = "Comment id")),
    responses(
        (status = 204, description = "Comment deleted"),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Caller is neither the author nor an administrator"),
        (status = 404, description = "Unknown comment"),
    ),
    tag = "comments"
)]
pub async fn delete(
    Path(id): Path<i64>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let identity = require_identity(Scope::Authenticated, &headers, &state, &pool).await?;
    let record = comments::fetch_comment(&pool, id)
        .await?
        .ok_or(ApiError::NotFound)?;

    if !identity.is_admin && record.author_uuid != identity.subject_id {
        return Err(ApiError::Forbidden);
    }

    comments::delete_comment(&pool, record.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
