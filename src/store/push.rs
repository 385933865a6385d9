//! Device push tokens and board subscriptions.

use anyhow::{Context, Result};
use sqlx::{PgPool, Row};
use tracing::{info_span, Instrument};
use uuid::Uuid;

/// Register a device token for a member. Idempotent.
///
/// # Errors
///
/// Returns an error on persistence failure.
pub async fn register_push_token(pool: &PgPool, member_uuid: Uuid, token: &str) -> Result<()> {
    let query = r"
        INSERT INTO push_tokens (member_uuid, token)
        VALUES ($1, $2)
        ON CONFLICT (member_uuid, token) DO NOTHING
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT"
    );
    sqlx::query(query)
        .bind(member_uuid)
        .bind(token)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to register push token")?;
    Ok(())
}

/// Remove a device token; true when a row was removed.
///
/// # Errors
///
/// Returns an error on persistence failure.
pub async fn deregister_push_token(pool: &PgPool, member_uuid: Uuid, token: &str) -> Result<bool> {
    let query = "DELETE FROM push_tokens WHERE member_uuid = $1 AND token = $2";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE"
    );
    let result = sqlx::query(query)
        .bind(member_uuid)
        .bind(token)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to deregister push token")?;
    Ok(result.rows_affected() > 0)
}

/// Subscribe a member to a board's new-post notifications. Idempotent.
///
/// # Errors
///
/// Returns an error on persistence failure.
pub async fn subscribe_board(pool: &PgPool, member_uuid: Uuid, board_id: i64) -> Result<()> {
    let query = r"
        INSERT INTO board_subscriptions (member_uuid, board_id)
        VALUES ($1, $2)
        ON CONFLICT (member_uuid, board_id) DO NOTHING
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT"
    );
    sqlx::query(query)
        .bind(member_uuid)
        .bind(board_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to subscribe board")?;
    Ok(())
}

/// Remove a board subscription; true when a row was removed.
///
/// # Errors
///
/// Returns an error on persistence failure.
pub async fn unsubscribe_board(pool: &PgPool, member_uuid: Uuid, board_id: i64) -> Result<bool> {
    let query = "DELETE FROM board_subscriptions WHERE member_uuid = $1 AND board_id = $2";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE"
    );
    let result = sqlx::query(query)
        .bind(member_uuid)
        .bind(board_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to unsubscribe board")?;
    Ok(result.rows_affected() > 0)
}

/// Device tokens of every member subscribed to a board.
///
/// # Errors
///
/// Returns an error on persistence failure.
pub async fn fetch_subscriber_tokens(pool: &PgPool, board_id: i64) -> Result<Vec<String>> {
    let query = r"
        SELECT push_tokens.token
        FROM push_tokens
        JOIN board_subscriptions
          ON board_subscriptions.member_uuid = push_tokens.member_uuid
        WHERE board_subscriptions.board_id = $1
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT"
    );
    let rows = sqlx::query(query)
        .bind(board_id)
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to fetch subscriber tokens")?;
    Ok(rows.iter().map(|row| row.get("token")).collect())
}
