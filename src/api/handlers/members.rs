//! Member lifecycle: signup, profile, admin toggles, and credentials.
//!
//! Flow Overview: signup creates a deactivated, unprivileged member with
//! a fresh credential. Admin toggles flip the live flags the scope guard
//! re-fetches, so they take effect on the very next call. Credential
//! changes always replace hash and salt wholesale.

use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{guard::Scope, password};
use crate::store::members::{self, MemberRecord, NewMember, SignupOutcome};

use super::super::{
    error::ApiError,
    notify::{send_email, EmailMessage},
    state::AppState,
};
use super::require_identity;

#[derive(Debug, Serialize, ToSchema)]
pub struct MemberBody {
    pub uuid: String,
    pub login_id: String,
    pub email: String,
    pub name: String,
    pub is_active: bool,
    pub is_admin: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<MemberRecord> for MemberBody {
    fn from(record: MemberRecord) -> Self {
        Self {
            uuid: record.uuid,
            login_id: record.login_id,
            email: record.email,
            name: record.name,
            is_active: record.is_active,
            is_admin: record.is_admin,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct SignupRequest {
    pub login_id: String,
    pub email: String,
    pub name: String,
    pub password: String,
}

#[utoipa::path(
    post,
    path = "/v1/members",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Member created, pending activation", body = MemberBody),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Login id or email already in use"),
    ),
    tag = "members"
)]
pub async fn signup(
    pool: Extension<PgPool>,
    Json(payload): Json<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let login_id = payload.login_id.trim().to_string();
    let email = normalize_email(&payload.email);
    let name = payload.name.trim().to_string();

    if login_id.is_empty() || name.is_empty() {
        return Err(ApiError::BadRequest("login id and name are required"));
    }
    if !valid_email(&email) {
        return Err(ApiError::BadRequest("invalid email address"));
    }
    if payload.password.is_empty() {
        return Err(ApiError::BadRequest("password is required"));
    }

    let (hash, salt) = derive_credential(payload.password).await?;
    let outcome = members::insert_member(
        &pool,
        NewMember {
            login_id: &login_id,
            email: &email,
            name: &name,
            password_hash: &hash,
            password_salt: &salt,
        },
    )
    .await?;

    match outcome {
        SignupOutcome::Created(record) => {
            Ok((StatusCode::CREATED, Json(MemberBody::from(record))))
        }
        SignupOutcome::Conflict => Err(ApiError::Conflict("login id or email already in use")),
    }
}

#[utoipa::path(
    get,
    path = "/v1/me",
    responses(
        (status = 200, description = "The caller's own member record", body = MemberBody),
        (status = 401, description = "Missing or invalid token"),
    ),
    tag = "members"
)]
pub async fn me(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let identity = require_identity(Scope::Authenticated, &headers, &state, &pool).await?;
    let record = members::fetch_member(&pool, parse_uuid(&identity.subject_id)?)
        .await?
        .ok_or(ApiError::Unauthenticated)?;
    Ok(Json(MemberBody::from(record)))
}

#[utoipa::path(
    get,
    path = "/v1/members",
    responses(
        (status = 200, description = "All members, newest first", body = [MemberBody]),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Caller is not an administrator"),
    ),
    tag = "members"
)]
pub async fn list(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    require_identity(Scope::Administrator, &headers, &state, &pool).await?;
    let records = members::fetch_members(&pool).await?;
    let body: Vec<MemberBody> = records.into_iter().map(MemberBody::from).collect();
    Ok(Json(body))
}

#[utoipa::path(
    post,
    path = "/v1/members/{uuid}/activation",
    params(("uuid" = String, Path, description = "Member uuid")),
    responses(
        (status = 200, description = "Activation flag flipped", body = MemberBody),
        (status = 403, description = "Caller is not an administrator"),
        (status = 404, description = "Unknown member"),
    ),
    tag = "members"
)]
pub async fn toggle_activation(
    Path(uuid): Path<String>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    require_identity(Scope::Administrator, &headers, &state, &pool).await?;
    let record = members::toggle_activation(&pool, parse_uuid(&uuid)?)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(MemberBody::from(record)))
}

#[utoipa::path(
    post,
    path = "/v1/members/{uuid}/privilege",
    params(("uuid" = String, Path, description = "Member uuid")),
    responses(
        (status = 200, description = "Administrator flag flipped", body = MemberBody),
        (status = 403, description = "Caller is not an administrator"),
        (status = 404, description = "Unknown member"),
    ),
    tag = "members"
)]
pub async fn toggle_privilege(
    Path(uuid): Path<String>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    require_identity(Scope::Administrator, &headers, &state, &pool).await?;
    let record = members::toggle_privilege(&pool, parse_uuid(&uuid)?)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(MemberBody::from(record)))
}

#[utoipa::path(
    delete,
    path = "/v1/members/{uuid}",
    params(("uuid" = String, Path, description = "Member uuid")),
    responses(
        (status = 204, description = "Member deleted"),
        (status = 403, description = "Caller is not an administrator"),
        (status = 404, description = "Unknown member"),
    ),
    tag = "members"
)]
pub async fn delete(
    Path(uuid): Path<String>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    require_identity(Scope::Administrator, &headers, &state, &pool).await?;
    if members::delete_member(&pool, parse_uuid(&uuid)?).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound)
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct PasswordChangeRequest {
    pub current_password: String,
    pub new_password: String,
}

#[utoipa::path(
    put,
    path = "/v1/me/password",
    request_body = PasswordChangeRequest,
    responses(
        (status = 204, description = "Credential replaced"),
        (status = 401, description = "Missing token or wrong current password"),
    ),
    tag = "members"
)]
pub async fn change_password(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AppState>>,
    Json(payload): Json<PasswordChangeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let identity = require_identity(Scope::Authenticated, &headers, &state, &pool).await?;
    if payload.new_password.is_empty() {
        return Err(ApiError::BadRequest("password is required"));
    }

    let uuid = parse_uuid(&identity.subject_id)?;
    let credential = members::lookup_credential(&pool, uuid)
        .await?
        .ok_or(ApiError::Unauthenticated)?;

    let current = payload.current_password;
    let verified = tokio::task::spawn_blocking(move || {
        password::verify(&current, &credential.password_salt, &credential.password_hash)
    })
    .await
    .map_err(|err| ApiError::Internal(err.into()))?;
    if !verified {
        return Err(ApiError::InvalidCredentials);
    }

    let (hash, salt) = derive_credential(payload.new_password).await?;
    members::replace_credential(&pool, uuid, &hash, &salt).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ResetRequest {
    pub email: String,
}

#[utoipa::path(
    post,
    path = "/v1/password-resets",
    request_body = ResetRequest,
    responses(
        (status = 204, description = "Accepted; no hint whether the address is known"),
    ),
    tag = "members"
)]
pub async fn request_reset(
    pool: Extension<PgPool>,
    state: Extension<Arc<AppState>>,
    Json(payload): Json<ResetRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = normalize_email(&payload.email);
    if !valid_email(&email) {
        // Still opaque: an invalid address gets the same answer.
        return Ok(StatusCode::NO_CONTENT);
    }

    let token = generate_reset_token()?;
    let token_hash = hash_reset_token(&token);
    let ttl = state.config().reset_token_ttl_seconds();

    if let Some(to) = members::store_reset_token(&pool, &email, &token_hash, ttl).await? {
        let link = reset_link(state.config().frontend_base_url(), &token);
        send_email(
            state.email(),
            EmailMessage {
                to,
                subject: "Password reset".to_string(),
                body: format!(
                    "A password reset was requested for your account.\n\
                     Follow this link within 24 hours to choose a new password:\n{link}\n\
                     If you did not request this, contact an administrator."
                ),
            },
        );
    }

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ResetConfirmRequest {
    pub token: String,
    pub password: String,
}

#[utoipa::path(
    put,
    path = "/v1/password-resets",
    request_body = ResetConfirmRequest,
    responses(
        (status = 204, description = "Credential replaced"),
        (status = 400, description = "Unknown or expired reset token"),
    ),
    tag = "members"
)]
pub async fn confirm_reset(
    pool: Extension<PgPool>,
    Json(payload): Json<ResetConfirmRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.password.is_empty() {
        return Err(ApiError::BadRequest("password is required"));
    }

    let token_hash = hash_reset_token(payload.token.trim());
    let (hash, salt) = derive_credential(payload.password).await?;
    if members::consume_reset_token(&pool, &token_hash, &hash, &salt).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::BadRequest("unknown or expired reset token"))
    }
}

/// Derive a fresh credential off the async workers; the KDF is
/// memory-hard by design.
async fn derive_credential(
    password: String,
) -> Result<([u8; password::HASH_LEN], [u8; password::SALT_LEN]), ApiError> {
    tokio::task::spawn_blocking(move || {
        let salt = password::generate_salt()?;
        let hash = password::derive_hash(&password, &salt)?;
        Ok::<_, anyhow::Error>((hash, salt))
    })
    .await
    .map_err(|err| ApiError::Internal(err.into()))?
    .map_err(ApiError::Internal)
}

fn parse_uuid(value: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(value.trim()).map_err(|_| ApiError::BadRequest("invalid member uuid"))
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

/// Raw token for the reset link; only its hash is stored.
fn generate_reset_token() -> Result<String, ApiError> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|err| ApiError::Internal(anyhow::anyhow!("failed to generate reset token: {err}")))?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

fn hash_reset_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

fn reset_link(frontend_base_url: &str, token: &str) -> String {
    let base = frontend_base_url.trim_end_matches('/');
    format!("{base}/password-reset#token={token}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_email_trims_and_lowercases() {
        assert_eq!(normalize_email(" Alice@Example.COM "), "alice@example.com");
    }

    #[test]
    fn valid_email_accepts_basic_format() {
        assert!(valid_email("a@example.com"));
        assert!(!valid_email("not-an-email"));
        assert!(!valid_email("missing-domain@"));
    }

    #[test]
    fn reset_token_is_url_safe_base64_of_32_bytes() {
        let decoded_len = generate_reset_token()
            .ok()
            .and_then(|token| Base64UrlUnpadded::decode_vec(&token).ok())
            .map(|bytes| bytes.len());
        assert_eq!(decoded_len, Some(32));
    }

    #[test]
    fn reset_token_hash_is_stable() {
        assert_eq!(hash_reset_token("token"), hash_reset_token("token"));
        assert_ne!(hash_reset_token("token"), hash_reset_token("other"));
    }

    #[test]
    fn reset_link_trims_trailing_slash() {
        assert_eq!(
            reset_link("https://agora.dev/", "tok"),
            "https://agora.dev/password-reset#token=tok"
        );
    }

    #[test]
    fn parse_uuid_rejects_garbage() {
        assert!(parse_uuid("not-a-uuid").is_err());
        assert!(parse_uuid(&Uuid::nil().to_string()).is_ok());
    }
}
