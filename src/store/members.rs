//! Member records, credentials, and the identity re-fetch seam.

use anyhow::{Context, Result};
use sqlx::{PgPool, Row};
use tracing::{info_span, Instrument};
use uuid::Uuid;

use super::{is_unique_violation, TIMESTAMP_FORMAT};
use crate::auth::guard::{Identity, IdentityStore};

/// Public member fields, as returned by the API.
#[derive(Clone, Debug)]
pub struct MemberRecord {
    pub uuid: String,
    pub login_id: String,
    pub email: String,
    pub name: String,
    pub is_active: bool,
    pub is_admin: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Stored credential material plus the flags login decisions need.
pub struct CredentialRecord {
    pub uuid: Uuid,
    pub password_hash: Vec<u8>,
    pub password_salt: Vec<u8>,
    pub is_active: bool,
    pub is_admin: bool,
}

/// Outcome when attempting to create a member.
#[derive(Debug)]
pub enum SignupOutcome {
    Created(MemberRecord),
    Conflict,
}

pub struct NewMember<'a> {
    pub login_id: &'a str,
    pub email: &'a str,
    pub name: &'a str,
    pub password_hash: &'a [u8],
    pub password_salt: &'a [u8],
}

fn member_columns() -> String {
    format!(
        r"
        uuid::text AS uuid,
        login_id,
        email,
        name,
        is_active,
        is_admin,
        to_char(created_at AT TIME ZONE 'utc', '{TIMESTAMP_FORMAT}') AS created_at,
        to_char(updated_at AT TIME ZONE 'utc', '{TIMESTAMP_FORMAT}') AS updated_at
        "
    )
}

fn map_member(row: &sqlx::postgres::PgRow) -> MemberRecord {
    MemberRecord {
        uuid: row.get("uuid"),
        login_id: row.get("login_id"),
        email: row.get("email"),
        name: row.get("name"),
        is_active: row.get("is_active"),
        is_admin: row.get("is_admin"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

/// Insert a new, deactivated and unprivileged member.
///
/// # Errors
///
/// Returns an error on persistence failure; a duplicate login id or
/// email maps to `SignupOutcome::Conflict` instead of an error.
pub async fn insert_member(pool: &PgPool, member: NewMember<'_>) -> Result<SignupOutcome> {
    let query = format!(
        r"
        INSERT INTO members (uuid, login_id, email, name, password_hash, password_salt)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {}
        ",
        member_columns()
    );
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT"
    );
    let row = sqlx::query(&query)
        .bind(Uuid::new_v4())
        .bind(member.login_id)
        .bind(member.email)
        .bind(member.name)
        .bind(member.password_hash)
        .bind(member.password_salt)
        .fetch_one(pool)
        .instrument(span)
        .await;

    match row {
        Ok(row) => Ok(SignupOutcome::Created(map_member(&row))),
        Err(err) if is_unique_violation(&err) => Ok(SignupOutcome::Conflict),
        Err(err) => Err(err).context("failed to insert member"),
    }
}

/// Look up credential material by login id (login path only).
///
/// # Errors
///
/// Returns an error on persistence failure.
pub async fn lookup_credential_by_login(
    pool: &PgPool,
    login_id: &str,
) -> Result<Option<CredentialRecord>> {
    let query = r"
        SELECT uuid, password_hash, password_salt, is_active, is_admin
        FROM members
        WHERE login_id = $1
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT"
    );
    let row = sqlx::query(query)
        .bind(login_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup credential")?;

    Ok(row.map(|row| CredentialRecord {
        uuid: row.get("uuid"),
        password_hash: row.get("password_hash"),
        password_salt: row.get("password_salt"),
        is_active: row.get("is_active"),
        is_admin: row.get("is_admin"),
    }))
}

/// Look up credential material by member uuid (password change path).
///
/// # Errors
///
/// Returns an error on persistence failure.
pub async fn lookup_credential(pool: &PgPool, uuid: Uuid) -> Result<Option<CredentialRecord>> {
    let query = r"
        SELECT uuid, password_hash, password_salt, is_active, is_admin
        FROM members
        WHERE uuid = $1
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT"
    );
    let row = sqlx::query(query)
        .bind(uuid)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup credential")?;

    Ok(row.map(|row| CredentialRecord {
        uuid: row.get("uuid"),
        password_hash: row.get("password_hash"),
        password_salt: row.get("password_salt"),
        is_active: row.get("is_active"),
        is_admin: row.get("is_admin"),
    }))
}

/// Fetch one member by uuid.
///
/// # Errors
///
/// Returns an error on persistence failure.
pub async fn fetch_member(pool: &PgPool, uuid: Uuid) -> Result<Option<MemberRecord>> {
    let query = format!("SELECT {} FROM members WHERE uuid = $1", member_columns());
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT"
    );
    let row = sqlx::query(&query)
        .bind(uuid)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to fetch member")?;
    Ok(row.as_ref().map(map_member))
}

/// List every member, newest first.
///
/// # Errors
///
/// Returns an error on persistence failure.
pub async fn fetch_members(pool: &PgPool) -> Result<Vec<MemberRecord>> {
    let query = format!(
        "SELECT {} FROM members ORDER BY created_at DESC",
        member_columns()
    );
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT"
    );
    let rows = sqlx::query(&query)
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to list members")?;
    Ok(rows.iter().map(map_member).collect())
}

/// Flip the activation flag; returns the updated member.
///
/// # Errors
///
/// Returns an error on persistence failure.
pub async fn toggle_activation(pool: &PgPool, uuid: Uuid) -> Result<Option<MemberRecord>> {
    toggle_flag(pool, uuid, "is_active").await
}

/// Flip the administrator flag; returns the updated member.
///
/// # Errors
///
/// Returns an error on persistence failure.
pub async fn toggle_privilege(pool: &PgPool, uuid: Uuid) -> Result<Option<MemberRecord>> {
    toggle_flag(pool, uuid, "is_admin").await
}

async fn toggle_flag(pool: &PgPool, uuid: Uuid, column: &str) -> Result<Option<MemberRecord>> {
    let query = format!(
        r"
        UPDATE members
        SET {column} = NOT {column}, updated_at = NOW()
        WHERE uuid = $1
        RETURNING {}
        ",
        member_columns()
    );
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE"
    );
    let row = sqlx::query(&query)
        .bind(uuid)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to toggle member flag")?;
    Ok(row.as_ref().map(map_member))
}

/// Delete a member; true when a row was removed.
///
/// # Errors
///
/// Returns an error on persistence failure.
pub async fn delete_member(pool: &PgPool, uuid: Uuid) -> Result<bool> {
    let query = "DELETE FROM members WHERE uuid = $1";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE"
    );
    let result = sqlx::query(query)
        .bind(uuid)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to delete member")?;
    Ok(result.rows_affected() > 0)
}

/// Replace a credential wholesale: fresh hash and fresh salt together.
///
/// # Errors
///
/// Returns an error on persistence failure.
pub async fn replace_credential(
    pool: &PgPool,
    uuid: Uuid,
    password_hash: &[u8],
    password_salt: &[u8],
) -> Result<bool> {
    let query = r"
        UPDATE members
        SET password_hash = $2, password_salt = $3, updated_at = NOW()
        WHERE uuid = $1
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE"
    );
    let result = sqlx::query(query)
        .bind(uuid)
        .bind(password_hash)
        .bind(password_salt)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to replace credential")?;
    Ok(result.rows_affected() > 0)
}

/// Store a hashed password-reset token with its expiry.
///
/// Returns the member's email when the address is known; callers stay
/// silent either way to avoid account probing.
///
/// # Errors
///
/// Returns an error on persistence failure.
pub async fn store_reset_token(
    pool: &PgPool,
    email: &str,
    token_hash: &[u8],
    ttl_seconds: i64,
) -> Result<Option<String>> {
    let query = r"
        UPDATE members
        SET password_reset_hash = $2,
            password_reset_expires_at = NOW() + ($3 * INTERVAL '1 second'),
            updated_at = NOW()
        WHERE email = $1
        RETURNING email
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE"
    );
    let row = sqlx::query(query)
        .bind(email)
        .bind(token_hash)
        .bind(ttl_seconds)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to store reset token")?;
    Ok(row.map(|row| row.get("email")))
}

/// Consume a valid reset token and replace the credential in one step.
///
/// Returns false for an unknown or expired token.
///
/// # Errors
///
/// Returns an error on persistence failure.
pub async fn consume_reset_token(
    pool: &PgPool,
    token_hash: &[u8],
    password_hash: &[u8],
    password_salt: &[u8],
) -> Result<bool> {
    let query = r"
        UPDATE members
        SET password_hash = $2,
            password_salt = $3,
            password_reset_hash = NULL,
            password_reset_expires_at = NULL,
            updated_at = NOW()
        WHERE password_reset_hash = $1
          AND password_reset_expires_at > NOW()
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE"
    );
    let result = sqlx::query(query)
        .bind(token_hash)
        .bind(password_hash)
        .bind(password_salt)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to consume reset token")?;
    Ok(result.rows_affected() > 0)
}

impl IdentityStore for PgPool {
    /// The per-call identity re-fetch behind the scope guard.
    async fn find_identity(&self, subject_id: &str) -> Result<Option<Identity>> {
        // A malformed subject id cannot match any member.
        let Ok(uuid) = Uuid::parse_str(subject_id) else {
            return Ok(None);
        };

        let query = "SELECT uuid::text AS uuid, is_admin, is_active FROM members WHERE uuid = $1";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT"
        );
        let row = sqlx::query(query)
            .bind(uuid)
            .fetch_optional(self)
            .instrument(span)
            .await
            .context("failed to fetch identity")?;

        Ok(row.map(|row| Identity {
            subject_id: row.get("uuid"),
            is_admin: row.get("is_admin"),
            is_active: row.get("is_active"),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn member_columns_render_timestamps_as_utc_strings() {
        let columns = member_columns();
        assert!(columns.contains("AT TIME ZONE 'utc'"));
        assert!(columns.contains("AS created_at"));
        assert!(columns.contains("AS updated_at"));
    }

    #[test]
    fn signup_outcome_debug_names() {
        assert_eq!(format!("{:?}", SignupOutcome::Conflict), "Conflict");
    }
}
