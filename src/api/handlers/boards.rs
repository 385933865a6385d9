//! Board management. Listing is public metadata; mutation is admin-only.

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

use crate::auth::guard::Scope;
use crate::store::boards::{self, BoardOutcome, BoardRecord, NewBoard, PERMISSION_LEVELS};

use super::super::{error::ApiError, state::AppState};
use super::require_identity;

#[derive(Debug, Serialize, ToSchema)]
pub struct BoardBody {
    pub id: i64,
    pub name: String,
    pub url_path: String,
    pub read_permission: String,
    pub write_permission: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<BoardRecord> for BoardBody {
    fn from(record: BoardRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            url_path: record.url_path,
            read_permission: record.read_permission,
            write_permission: record.write_permission,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct BoardInput {
    pub name: Option<String>,
    pub url_path: Option<String>,
    pub read_permission: Option<String>,
    pub write_permission: Option<String>,
}

fn valid_permission(level: &str) -> bool {
    PERMISSION_LEVELS.iter().any(|&candidate| candidate == level)
}

#[utoipa::path(
    get,
    path = "/v1/boards",
    responses(
        (status = 200, description = "All boards in creation order", body = [BoardBody]),
    ),
    tag = "boards"
)]
pub async fn list(pool: Extension<PgPool>) -> Result<impl IntoResponse, ApiError> {
    let records = boards::fetch_boards(&pool).await?;
    let body: Vec<BoardBody> = records.into_iter().map(BoardBody::from).collect();
    Ok(Json(body))
}

#[utoipa::path(
    post,
    path = "/v1/boards",
    request_body = BoardInput,
    responses(
        (status = 201, description = "Board created", body = BoardBody),
        (status = 400, description = "Missing fields or unknown permission level"),
        (status = 403, description = "Caller is not an administrator"),
        (status = 409, description = "Board name or url path already in use"),
    ),
    tag = "boards"
)]
pub async fn create(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AppState>>,
    Json(payload): Json<BoardInput>,
) -> Result<impl IntoResponse, ApiError> {
    require_identity(Scope::Administrator, &headers, &state, &pool).await?;

    let (Some(name), Some(url_path), Some(read), Some(write)) = (
        payload.name.as_deref().map(str::trim),
        payload.url_path.as_deref().map(str::trim),
        payload.read_permission.as_deref(),
        payload.write_permission.as_deref(),
    ) else {
        return Err(ApiError::BadRequest(
            "name, url_path, read_permission and write_permission are required",
        ));
    };

    if name.is_empty() || url_path.is_empty() {
        return Err(ApiError::BadRequest("name and url_path must not be empty"));
    }
    if !valid_permission(read) || !valid_permission(write) {
        return Err(ApiError::BadRequest(
            "permission levels are PUBLIC, MEMBER or ADMIN",
        ));
    }

    let outcome = boards::insert_board(
        &pool,
        NewBoard {
            name,
            url_path,
            read_permission: read,
            write_permission: write,
        },
    )
    .await?;

    match outcome {
        BoardOutcome::Created(record) => Ok((StatusCode::CREATED, Json(BoardBody::from(record)))),
        BoardOutcome::Conflict => Err(ApiError::Conflict("board name or url path already in use")),
    }
}

#[utoipa::path(
    put,
    path = "/v1/boards/{id}",
    params(("id" = i64, Path, description = "Board id")),
    request_body = BoardInput,
    responses(
        (status = 200, description = "Board updated", body = BoardBody),
        (status = 400, description = "Unknown permission level"),
        (status = 403, description = "Caller is not an administrator"),
        (status = 404, description = "Unknown board"),
    ),
    tag = "boards"
)]
pub async fn update(
    Path(id): Path<i64>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AppState>>,
    Json(payload): Json<BoardInput>,
) -> Result<impl IntoResponse, ApiError> {
    require_identity(Scope::Administrator, &headers, &state, &pool).await?;

    for level in [&payload.read_permission, &payload.write_permission]
        .into_iter()
        .flatten()
    {
        if !valid_permission(level) {
            return Err(ApiError::BadRequest(
                "permission levels are PUBLIC, MEMBER or ADMIN",
            ));
        }
    }

    let record = boards::update_board(
        &pool,
        id,
        payload.name.as_deref().map(str::trim),
        payload.url_path.as_deref().map(str::trim),
        payload.read_permission.as_deref(),
        payload.write_permission.as_deref(),
    )
    .await?
    .ok_or(ApiError::NotFound)?;
    Ok(Json(BoardBody::from(record)))
}

#[utoipa::path(
    delete,
    path = "/v1/boards/{id}",
    params(("id" = i64, Path, description = "Board id")),
    responses(
        (status = 204, description = "Board deleted"),
        (status = 403, description = "Caller is not an administrator"),
        (status = 404, description = "Unknown board"),
    ),
    tag = "boards"
)]
pub async fn delete(
    Path(id): Path<i64>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    require_identity(Scope::Administrator, &headers, &state, &pool).await?;
    if boards::delete_board(&pool, id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_validation() {
        assert!(valid_permission("PUBLIC"));
        assert!(valid_permission("MEMBER"));
        assert!(valid_permission("ADMIN"));
        assert!(!valid_permission("public"));
        assert!(!valid_permission("SECRET"));
    }
}
