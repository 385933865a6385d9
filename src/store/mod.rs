//! Postgres-backed record store.
//!
//! Per-entity modules expose plain async functions over a `PgPool`, the
//! same shape the handlers consume. The two invariant-bearing consumers
//! (scope guard, keyset paginator) reach this layer only through their
//! trait seams, implemented here.

use anyhow::{Context, Result};
use sqlx::PgPool;
use tracing::{info_span, Instrument};

pub mod boards;
pub mod comments;
pub mod members;
pub mod posts;
pub mod push;

// API timestamps are rendered in the database to keep row mapping plain.
pub(crate) const TIMESTAMP_FORMAT: &str = r#"YYYY-MM-DD"T"HH24:MI:SS"Z""#;

const SCHEMA: &[&str] = &[
    r"
    CREATE TABLE IF NOT EXISTS members (
        uuid UUID PRIMARY KEY,
        login_id TEXT NOT NULL UNIQUE,
        password_hash BYTEA NOT NULL,
        password_salt BYTEA NOT NULL,
        email TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL,
        is_active BOOLEAN NOT NULL DEFAULT FALSE,
        is_admin BOOLEAN NOT NULL DEFAULT FALSE,
        password_reset_hash BYTEA,
        password_reset_expires_at TIMESTAMPTZ,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS boards (
        id BIGSERIAL PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        url_path TEXT NOT NULL UNIQUE,
        read_permission TEXT NOT NULL,
        write_permission TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS posts (
        id BIGSERIAL PRIMARY KEY,
        board_id BIGINT NOT NULL REFERENCES boards (id) ON DELETE CASCADE,
        author_uuid UUID NOT NULL,
        title TEXT NOT NULL,
        body TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    ",
    "CREATE INDEX IF NOT EXISTS posts_board_id_idx ON posts (board_id, id)",
    r"
    CREATE TABLE IF NOT EXISTS comments (
        id BIGSERIAL PRIMARY KEY,
        post_id BIGINT NOT NULL REFERENCES posts (id) ON DELETE CASCADE,
        author_uuid UUID NOT NULL,
        body TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    ",
    "CREATE INDEX IF NOT EXISTS comments_post_id_idx ON comments (post_id, id)",
    r"
    CREATE TABLE IF NOT EXISTS push_tokens (
        member_uuid UUID NOT NULL,
        token TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        PRIMARY KEY (member_uuid, token)
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS board_subscriptions (
        member_uuid UUID NOT NULL,
        board_id BIGINT NOT NULL REFERENCES boards (id) ON DELETE CASCADE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        PRIMARY KEY (member_uuid, board_id)
    )
    ",
];

/// Create missing tables and indexes at startup.
///
/// # Errors
///
/// Returns an error when a DDL statement fails.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    for statement in SCHEMA {
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DDL"
        );
        sqlx::query(statement)
            .execute(pool)
            .instrument(span)
            .await
            .context("failed to run schema statement")?;
    }
    Ok(())
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_creates_every_entity_table() {
        let ddl = SCHEMA.join("\n");
        for table in [
            "members",
            "boards",
            "posts",
            "comments",
            "push_tokens",
            "board_subscriptions",
        ] {
            assert!(
                ddl.contains(&format!("CREATE TABLE IF NOT EXISTS {table}")),
                "missing table: {table}"
            );
        }
    }
}
