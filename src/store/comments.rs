//! Comment records, always read in ascending key order under a post.

use anyhow::{Context, Result};
use sqlx::{PgPool, Row};
use tracing::{info_span, Instrument};
use uuid::Uuid;

use super::TIMESTAMP_FORMAT;

#[derive(Clone, Debug)]
pub struct CommentRecord {
    pub id: i64,
    pub post_id: i64,
    pub author_uuid: String,
    pub body: String,
    pub created_at: String,
}

fn comment_columns() -> String {
    format!(
        r"
        id,
        post_id,
        author_uuid::text AS author_uuid,
        body,
        to_char(created_at AT TIME ZONE 'utc', '{TIMESTAMP_FORMAT}') AS created_at
        "
    )
}

fn map_comment(row: &sqlx::postgres::PgRow) -> CommentRecord {
    CommentRecord {
        id: row.get("id"),
        post_id: row.get("post_id"),
        author_uuid: row.get("author_uuid"),
        body: row.get("body"),
        created_at: row.get("created_at"),
    }
}

/// All comments of a post, oldest first.
///
/// # Errors
///
/// Returns an error on persistence failure.
pub async fn fetch_comments(pool: &PgPool, post_id: i64) -> Result<Vec<CommentRecord>> {
    let query = format!(
        "SELECT {} FROM comments WHERE post_id = $1 ORDER BY id ASC",
        comment_columns()
    );
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT"
    );
    let rows = sqlx::query(&query)
        .bind(post_id)
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to list comments")?;
    Ok(rows.iter().map(map_comment).collect())
}

/// Insert a comment.
///
/// # Errors
///
/// Returns an error on persistence failure.
pub async fn insert_comment(
    pool: &PgPool,
    post_id: i64,
    author_uuid: Uuid,
    body: &str,
) -> Result<CommentRecord> {
    let query = format!(
        r"
        INSERT INTO comments (post_id, author_uuid, body)
        VALUES ($1, $2, $3)
        RETURNING {}
        ",
        comment_columns()
    );
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT"
    );
    let row = sqlx::query(&query)
        .bind(post_id)
        .bind(author_uuid)
        .bind(body)
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to insert comment")?;
    Ok(map_comment(&row))
}

/// Fetch one comment.
///
/// # Errors
///
/// Returns an error on persistence failure.
pub async fn fetch_comment(pool: &PgPool, id: i64) -> Result<Option<CommentRecord>> {
    let query = format!("SELECT {} FROM comments WHERE id = $1", comment_columns());
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT"
    );
    let row = sqlx::query(&query)
        .bind(id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to fetch comment")?;
    Ok(row.as_ref().map(map_comment))
}

/// Delete a comment; true when a row was removed.
///
/// # Errors
///
/// Returns an error on persistence failure.
pub async fn delete_comment(pool: &PgPool, id: i64) -> Result<bool> {
    let query = "DELETE FROM comments WHERE id = $1";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE"
    );
    let result = sqlx::query(query)
        .bind(id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to delete comment")?;
    Ok(result.rows_affected() > 0)
}
