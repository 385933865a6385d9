//! Board records and their read/write permission levels.

use anyhow::{Context, Result};
use sqlx::{PgPool, Row};
use tracing::{info_span, Instrument};

use super::{is_unique_violation, TIMESTAMP_FORMAT};
use crate::auth::guard::Scope;

/// Permission levels a board can require for reading or writing.
pub const PERMISSION_LEVELS: &[&str] = &["PUBLIC", "MEMBER", "ADMIN"];

#[derive(Clone, Debug)]
pub struct BoardRecord {
    pub id: i64,
    pub name: String,
    pub url_path: String,
    pub read_permission: String,
    pub write_permission: String,
    pub created_at: String,
    pub updated_at: String,
}

impl BoardRecord {
    /// Scope a caller needs to read this board.
    #[must_use]
    pub fn read_scope(&self) -> Scope {
        permission_scope(&self.read_permission)
    }

    /// Scope a caller needs to write to this board.
    #[must_use]
    pub fn write_scope(&self) -> Scope {
        permission_scope(&self.write_permission)
    }
}

fn permission_scope(permission: &str) -> Scope {
    match permission {
        "PUBLIC" => Scope::None,
        "ADMIN" => Scope::Administrator,
        _ => Scope::Authenticated,
    }
}

/// Outcome when attempting to create a board.
#[derive(Debug)]
pub enum BoardOutcome {
    Created(BoardRecord),
    Conflict,
}

pub struct NewBoard<'a> {
    pub name: &'a str,
    pub url_path: &'a str,
    pub read_permission: &'a str,
    pub write_permission: &'a str,
}

fn board_columns() -> String {
    format!(
        r"
        id,
        name,
        url_path,
        read_permission,
        write_permission,
        to_char(created_at AT TIME ZONE 'utc', '{TIMESTAMP_FORMAT}') AS created_at,
        to_char(updated_at AT TIME ZONE 'utc', '{TIMESTAMP_FORMAT}') AS updated_at
        "
    )
}

fn map_board(row: &sqlx::postgres::PgRow) -> BoardRecord {
    BoardRecord {
        id: row.get("id"),
        name: row.get("name"),
        url_path: row.get("url_path"),
        read_permission: row.get("read_permission"),
        write_permission: row.get("write_permission"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

/// List every board in creation order.
///
/// # Errors
///
/// Returns an error on persistence failure.
pub async fn fetch_boards(pool: &PgPool) -> Result<Vec<BoardRecord>> {
    let query = format!("SELECT {} FROM boards ORDER BY id ASC", board_columns());
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT"
    );
    let rows = sqlx::query(&query)
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to list boards")?;
    Ok(rows.iter().map(map_board).collect())
}

/// Fetch one board.
///
/// # Errors
///
/// Returns an error on persistence failure.
pub async fn fetch_board(pool: &PgPool, id: i64) -> Result<Option<BoardRecord>> {
    let query = format!("SELECT {} FROM boards WHERE id = $1", board_columns());
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
        .context("failed to fetch board")?;
    Ok(row.as_ref().map(map_board))
}

/// Insert a board.
///
/// # Errors
///
/// Returns an error on persistence failure; duplicate name or url path
/// maps to `BoardOutcome::Conflict`.
pub async fn insert_board(pool: &PgPool, board: NewBoard<'_>) -> Result<BoardOutcome> {
    let query = format!(
        r"
        INSERT INTO boards (name, url_path, read_permission, write_permission)
        VALUES ($1, $2, $3, $4)
        RETURNING {}
        ",
        board_columns()
    );
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT"
    );
    let row = sqlx::query(&query)
        .bind(board.name)
        .bind(board.url_path)
        .bind(board.read_permission)
        .bind(board.write_permission)
        .fetch_one(pool)
        .instrument(span)
        .await;

    match row {
        Ok(row) => Ok(BoardOutcome::Created(map_board(&row))),
        Err(err) if is_unique_violation(&err) => Ok(BoardOutcome::Conflict),
        Err(err) => Err(err).context("failed to insert board"),
    }
}

/// Update the provided fields of a board; `None` leaves a field as is.
///
/// # Errors
///
/// Returns an error on persistence failure.
pub async fn update_board(
    pool: &PgPool,
    id: i64,
    name: Option<&str>,
    url_path: Option<&str>,
    read_permission: Option<&str>,
    write_permission: Option<&str>,
) -> Result<Option<BoardRecord>> {
    let query = format!(
        r"
        UPDATE boards
        SET name = COALESCE($2, name),
            url_path = COALESCE($3, url_path),
            read_permission = COALESCE($4, read_permission),
            write_permission = COALESCE($5, write_permission),
            updated_at = NOW()
        WHERE id = $1
        RETURNING {}
        ",
        board_columns()
    );
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE"
    );
    let row = sqlx::query(&query)
        .bind(id)
        .bind(name)
        .bind(url_path)
        .bind(read_permission)
        .bind(write_permission)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to update board")?;
    Ok(row.as_ref().map(map_board))
}

/// Delete a board; true when a row was removed.
///
/// # Errors
///
/// Returns an error on persistence failure.
pub async fn delete_board(pool: &PgPool, id: i64) -> Result<bool> {
    let query = "DELETE FROM boards WHERE id = $1";
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
        .context("failed to delete board")?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board(read: &str, write: &str) -> BoardRecord {
        BoardRecord {
            id: 1,
            name: "notice".to_string(),
            url_path: "notice".to_string(),
            read_permission: read.to_string(),
            write_permission: write.to_string(),
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn permission_levels_map_to_scopes() {
        assert_eq!(board("PUBLIC", "ADMIN").read_scope(), Scope::None);
        assert_eq!(board("PUBLIC", "ADMIN").write_scope(), Scope::Administrator);
        assert_eq!(board("MEMBER", "MEMBER").read_scope(), Scope::Authenticated);
        assert_eq!(board("ADMIN", "MEMBER").read_scope(), Scope::Administrator);
    }

    #[test]
    fn unknown_permission_defaults_to_authenticated() {
        assert_eq!(board("SECRET", "SECRET").read_scope(), Scope::Authenticated);
    }
}
