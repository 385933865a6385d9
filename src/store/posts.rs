//! Post records and the per-board keyset source.

use anyhow::{Context, Result};
use sqlx::{PgPool, Row};
use tracing::{info_span, Instrument};
use uuid::Uuid;

use super::TIMESTAMP_FORMAT;
use crate::page::{KeyOrder, KeyRange, KeysetSource};

#[derive(Clone, Debug)]
pub struct PostRecord {
    pub id: i64,
    pub board_id: i64,
    pub author_uuid: String,
    pub title: String,
    pub body: String,
    pub created_at: String,
    pub updated_at: String,
}

pub struct NewPost<'a> {
    pub board_id: i64,
    pub author_uuid: Uuid,
    pub title: &'a str,
    pub body: &'a str,
}

fn post_columns() -> String {
    format!(
        r"
        id,
        board_id,
        author_uuid::text AS author_uuid,
        title,
        body,
        to_char(created_at AT TIME ZONE 'utc', '{TIMESTAMP_FORMAT}') AS created_at,
        to_char(updated_at AT TIME ZONE 'utc', '{TIMESTAMP_FORMAT}') AS updated_at
        "
    )
}

fn map_post(row: &sqlx::postgres::PgRow) -> PostRecord {
    PostRecord {
        id: row.get("id"),
        board_id: row.get("board_id"),
        author_uuid: row.get("author_uuid"),
        title: row.get("title"),
        body: row.get("body"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

/// Insert a post.
///
/// # Errors
///
/// Returns an error on persistence failure.
pub async fn insert_post(pool: &PgPool, post: NewPost<'_>) -> Result<PostRecord> {
    let query = format!(
        r"
        INSERT INTO posts (board_id, author_uuid, title, body)
        VALUES ($1, $2, $3, $4)
        RETURNING {}
        ",
        post_columns()
    );
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT"
    );
    let row = sqlx::query(&query)
        .bind(post.board_id)
        .bind(post.author_uuid)
        .bind(post.title)
        .bind(post.body)
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to insert post")?;
    Ok(map_post(&row))
}

/// Fetch one post.
///
/// # Errors
///
/// Returns an error on persistence failure.
pub async fn fetch_post(pool: &PgPool, id: i64) -> Result<Option<PostRecord>> {
    let query = format!("SELECT {} FROM posts WHERE id = $1", post_columns());
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
        .context("failed to fetch post")?;
    Ok(row.as_ref().map(map_post))
}

/// Delete a post; true when a row was removed.
///
/// # Errors
///
/// Returns an error on persistence failure.
pub async fn delete_post(pool: &PgPool, id: i64) -> Result<bool> {
    let query = "DELETE FROM posts WHERE id = $1";
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
        .context("failed to delete post")?;
    Ok(result.rows_affected() > 0)
}

/// The posts of one board as a keyset-paginated collection.
///
/// Post ids are allocated by a sequence, so they increase monotonically
/// with insertion order, the property keyset pagination relies on.
pub struct BoardPosts<'a> {
    pub pool: &'a PgPool,
    pub board_id: i64,
}

fn range_clause(range: KeyRange) -> (&'static str, Option<i64>) {
    match range {
        KeyRange::All => ("", None),
        KeyRange::Below(bound) => ("AND id < $2", Some(bound)),
        KeyRange::Above(bound) => ("AND id > $2", Some(bound)),
    }
}

impl KeysetSource for BoardPosts<'_> {
    type Item = PostRecord;

    fn key(item: &PostRecord) -> i64 {
        item.id
    }

    async fn fetch(&self, range: KeyRange, order: KeyOrder, limit: i64) -> Result<Vec<PostRecord>> {
        let (clause, bound) = range_clause(range);
        let direction = match order {
            KeyOrder::Ascending => "ASC",
            KeyOrder::Descending => "DESC",
        };
        let query = format!(
            "SELECT {} FROM posts WHERE board_id = $1 {clause} ORDER BY id {direction} LIMIT {limit}",
            post_columns()
        );
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT"
        );
        let mut query = sqlx::query(&query).bind(self.board_id);
        if let Some(bound) = bound {
            query = query.bind(bound);
        }
        let rows = query
            .fetch_all(self.pool)
            .instrument(span)
            .await
            .context("failed to fetch post window")?;
        Ok(rows.iter().map(map_post).collect())
    }

    async fn count(&self, range: KeyRange) -> Result<i64> {
        let (clause, bound) = range_clause(range);
        let query = format!("SELECT COUNT(*) AS count FROM posts WHERE board_id = $1 {clause}");
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT"
        );
        let mut query = sqlx::query(&query).bind(self.board_id);
        if let Some(bound) = bound {
            query = query.bind(bound);
        }
        let row = query
            .fetch_one(self.pool)
            .instrument(span)
            .await
            .context("failed to count posts")?;
        Ok(row.get("count"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_clauses_bind_exclusive_bounds() {
        assert_eq!(range_clause(KeyRange::All), ("", None));
        assert_eq!(range_clause(KeyRange::Below(8)), ("AND id < $2", Some(8)));
        assert_eq!(range_clause(KeyRange::Above(2)), ("AND id > $2", Some(2)));
    }
}
