//! Blob upload and download endpoints.

use axum::{
    extract::{Extension, Multipart, Path},
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::IntoResponse,
};
use sqlx::PgPool;
use std::sync::Arc;

use crate::auth::guard::Scope;
use crate::blob::{valid_name, MAX_BLOB_BYTES};

use super::super::{error::ApiError, state::AppState};
use super::require_identity;

#[utoipa::path(
    get,
    path = "/files/{name}",
    params(("name" = String, Path, description = "Blob name")),
    responses(
        (status = 200, description = "Blob content"),
        (status = 404, description = "Unknown blob"),
    ),
    tag = "files"
)]
pub async fn download(
    Path(name): Path<String>,
    state: Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let blobs = state.blobs();
    let fetched = tokio::task::spawn_blocking(move || blobs.get(&name))
        .await
        .map_err(|err| ApiError::Internal(err.into()))??;

    let (bytes, content_type) = fetched.ok_or(ApiError::NotFound)?;

    let mut response = bytes.into_response();
    if let Some(value) = content_type.and_then(|value| value.parse().ok()) {
        response.headers_mut().insert(CONTENT_TYPE, value);
    }
    Ok(response)
}

#[utoipa::path(
    post,
    path = "/files/{name}",
    params(("name" = String, Path, description = "Blob name")),
    responses(
        (status = 200, description = "Blob stored"),
        (status = 400, description = "Invalid name or missing upload field"),
        (status = 401, description = "Missing or invalid token"),
    ),
    tag = "files"
)]
pub async fn upload(
    Path(name): Path<String>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    // Only logged-in members can upload.
    require_identity(Scope::Authenticated, &headers, &state, &pool).await?;

    if !valid_name(&name) {
        return Err(ApiError::BadRequest("invalid file name"));
    }

    let mut bytes = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::BadRequest("malformed multipart body"))?
    {
        if field.name() == Some("upload") {
            bytes = Some(
                field
                    .bytes()
                    .await
                    .map_err(|_| ApiError::BadRequest("upload exceeds the size limit"))?,
            );
            break;
        }
    }
    let bytes = bytes.ok_or(ApiError::BadRequest("missing upload field"))?;
    if bytes.len() > MAX_BLOB_BYTES {
        return Err(ApiError::BadRequest("upload exceeds the size limit"));
    }

    let blobs = state.blobs();
    tokio::task::spawn_blocking(move || blobs.put(&name, &bytes))
        .await
        .map_err(|err| ApiError::Internal(err.into()))??;

    Ok(StatusCode::OK)
}
