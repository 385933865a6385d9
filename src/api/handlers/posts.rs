//! Posts: the paginated board window, creation with subscriber fan-out,
//! single-post reads, and deletion.
//!
//! Flow Overview: every post operation first resolves the board so its
//! read/write permission decides the required scope; the scope guard
//! then resolves the caller before any data is touched.

use axum::{
    extract::{Extension, Path, Query},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::auth::guard::Scope;
use crate::page::{paginate, PageCursor};
use crate::store::boards::{self, BoardRecord};
use crate::store::comments;
use crate::store::posts::{self, BoardPosts, NewPost, PostRecord};
use crate::store::push;

use super::super::{
    error::ApiError,
    notify::{fan_out, PushNote},
    state::AppState,
};
use super::{authorize_scope, require_identity};
use super::comments::CommentBody;

#[derive(Debug, Serialize, ToSchema)]
pub struct PostBody {
    pub id: i64,
    pub board_id: i64,
    pub author_uuid: String,
    pub title: String,
    pub body: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<PostRecord> for PostBody {
    fn from(record: PostRecord) -> Self {
        Self {
            id: record.id,
            board_id: record.board_id,
            author_uuid: record.author_uuid,
            title: record.title,
            body: record.body,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// Keyset cursor bounds; `before`/`after` are exclusive post ids.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct WindowQuery {
    pub before: Option<i64>,
    pub after: Option<i64>,
    pub count: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PostWindow {
    pub posts: Vec<PostBody>,
    pub has_previous: bool,
    pub has_next: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PostDetail {
    #[serde(flatten)]
    pub post: PostBody,
    pub comments: Vec<CommentBody>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct PostInput {
    pub title: String,
    pub body: String,
}

async fn board_or_404(pool: &PgPool, id: i64) -> Result<BoardRecord, ApiError> {
    boards::fetch_board(pool, id).await?.ok_or(ApiError::NotFound)
}

#[utoipa::path(
    get,
    path = "/v1/boards/{id}/posts",
    params(("id" = i64, Path, description = "Board id"), WindowQuery),
    responses(
        (status = 200, description = "A descending window of posts", body = PostWindow),
        (status = 400, description = "Contradictory cursors"),
        (status = 401, description = "Board requires authentication"),
        (status = 403, description = "Board requires administrator access"),
        (status = 404, description = "Unknown board"),
    ),
    tag = "posts"
)]
pub async fn window(
    Path(id): Path<i64>,
    Query(query): Query<WindowQuery>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let board = board_or_404(&pool, id).await?;
    authorize_scope(board.read_scope(), &headers, &state, &pool).await?;

    let window = paginate(
        &BoardPosts {
            pool: &pool,
            board_id: board.id,
        },
        PageCursor {
            before: query.before,
            after: query.after,
            count: query.count,
        },
    )
    .await?;

    Ok(Json(PostWindow {
        posts: window.items.into_iter().map(PostBody::from).collect(),
        has_previous: window.has_previous,
        has_next: window.has_next,
    }))
}

#[utoipa::path(
    post,
    path = "/v1/boards/{id}/posts",
    params(("id" = i64, Path, description = "Board id")),
    request_body = PostInput,
    responses(
        (status = 201, description = "Post created", body = PostBody),
        (status = 400, description = "Missing title or body"),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Board requires administrator access"),
        (status = 404, description = "Unknown board"),
    ),
    tag = "posts"
)]
pub async fn create(
    Path(id): Path<i64>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AppState>>,
    Json(payload): Json<PostInput>,
) -> Result<impl IntoResponse, ApiError> {
    let board = board_or_404(&pool, id).await?;

    // Posting always needs an author, so a PUBLIC write permission still
    // requires a logged-in caller.
    let scope = match board.write_scope() {
        Scope::None => Scope::Authenticated,
        scope => scope,
    };
    let identity = require_identity(scope, &headers, &state, &pool).await?;

    let title = payload.title.trim();
    if title.is_empty() || payload.body.is_empty() {
        return Err(ApiError::BadRequest("title and body are required"));
    }

    let author_uuid = Uuid::parse_str(&identity.subject_id)
        .map_err(|err| ApiError::Internal(err.into()))?;
    let record = posts::insert_post(
        &pool,
        NewPost {
            board_id: board.id,
            author_uuid,
            title,
            body: &payload.body,
        },
    )
    .await?;

    notify_subscribers(&pool, &state, &board, &record).await;

    Ok((StatusCode::CREATED, Json(PostBody::from(record))))
}

/// Best-effort push fan-out to board subscribers; failures only log.
async fn notify_subscribers(
    pool: &PgPool,
    state: &AppState,
    board: &BoardRecord,
    post: &PostRecord,
) {
    let tokens = match push::fetch_subscriber_tokens(pool, board.id).await {
        Ok(tokens) => tokens,
        Err(err) => {
            tracing::error!("failed to fetch subscriber tokens: {err:#}");
            return;
        }
    };

    let mut data = HashMap::new();
    data.insert("board_id".to_string(), board.id.to_string());
    data.insert("post_id".to_string(), post.id.to_string());

    let notes = tokens
        .into_iter()
        .map(|device_token| PushNote {
            device_token,
            title: format!("New post in {}", board.name),
            body: post.title.clone(),
            data: data.clone(),
        })
        .collect();
    fan_out(state.push(), notes);
}

#[utoipa::path(
    get,
    path = "/v1/posts/{id}",
    params(("id" = i64, Path, description = "Post id")),
    responses(
        (status = 200, description = "Post with its comments, oldest first", body = PostDetail),
        (status = 401, description = "Board requires authentication"),
        (status = 403, description = "Board requires administrator access"),
        (status = 404, description = "Unknown post"),
    ),
    tag = "posts"
)]
pub async fn get(
    Path(id): Path<i64>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let record = posts::fetch_post(&pool, id).await?.ok_or(ApiError::NotFound)?;
    let board = board_or_404(&pool, record.board_id).await?;
    authorize_scope(board.read_scope(), &headers, &state, &pool).await?;

    let comments = comments::fetch_comments(&pool, record.id).await?;
    Ok(Json(PostDetail {
        post: PostBody::from(record),
        comments: comments.into_iter().map(CommentBody::from).collect(),
    }))
}

#[utoipa::path(
    delete,
    path = "/v1/posts/{id}",
    params(("id" = i64, Path, description = "Post id")),
    responses(
        (status = 204, description = "Post deleted"),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Caller is neither the author nor an administrator"),
        (status = 404, description = "Unknown post"),
    ),
    tag = "posts"
)]
pub async fn delete(
    Path(id): Path<i64>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let identity = require_identity(Scope::Authenticated, &headers, &state, &pool).await?;
    let record = posts::fetch_post(&pool, id).await?.ok_or(ApiError::NotFound)?;

    if !identity.is_admin && record.author_uuid != identity.subject_id {
        return Err(ApiError::Forbidden);
    }

    posts::delete_post(&pool, record.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
