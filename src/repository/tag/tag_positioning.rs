//! Tag Positioning Operations
//!
//! Operations for managing `order_column`. Positions are scoped to a tag type,
//! untyped tags forming their own group, and start at 1.

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use crate::domain::{DomainError, DomainResult};
use super::super::db::{now_millis, write_transaction};

/// Trait for tag positioning operations
#[async_trait]
pub trait TagPositioningOperations {
    /// Move a tag to a new position among the tags of its type
    async fn move_tag(&self, id: i64, new_position: i64) -> DomainResult<()>;

    /// Rewrite order_column in the order of `ids`, starting at `start`
    async fn set_new_order(&self, ids: &[i64], start: i64) -> DomainResult<()>;

    /// Renumber every type group to 1, 2, 3, ... keeping the current order
    async fn reindex_tags(&self) -> DomainResult<()>;
}

#[async_trait]
impl TagPositioningOperations for super::tag_repo::TagRepository {
    async fn move_tag(&self, id: i64, new_position: i64) -> DomainResult<()> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(DomainError::not_initialized)?;

        write_transaction(conn, |conn| {
            let (tag_type, old_position): (Option<String>, i64) = conn
                .query_row(
                    "SELECT type, order_column FROM tags WHERE id = ?1",
                    params![id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?
                .ok_or_else(|| DomainError::NotFound(format!("Tag {} not found", id)))?;

            if old_position == new_position {
                return Ok(());
            }

            if new_position < old_position {
                // Moving up: shift tags in [new_position, old_position) down by +1
                conn.execute(
                    "UPDATE tags SET order_column = order_column + 1
                     WHERE type IS ?1 AND order_column >= ?2 AND order_column < ?3",
                    params![tag_type, new_position, old_position],
                )?;
            } else {
                // Moving down: shift tags in (old_position, new_position] up by -1
                conn.execute(
                    "UPDATE tags SET order_column = order_column - 1
                     WHERE type IS ?1 AND order_column > ?2 AND order_column <= ?3",
                    params![tag_type, old_position, new_position],
                )?;
            }

            conn.execute(
                "UPDATE tags SET order_column = ?1, updated_at = ?2 WHERE id = ?3",
                params![new_position, now_millis(), id],
            )?;

            reindex_group(conn, tag_type.as_deref())
        })
    }

    async fn set_new_order(&self, ids: &[i64], start: i64) -> DomainResult<()> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(DomainError::not_initialized)?;

        write_transaction(conn, |conn| {
            let now = now_millis();
            for (offset, id) in ids.iter().enumerate() {
                conn.execute(
                    "UPDATE tags SET order_column = ?1, updated_at = ?2 WHERE id = ?3",
                    params![start + offset as i64, now, id],
                )?;
            }
            Ok(())
        })
    }

    async fn reindex_tags(&self) -> DomainResult<()> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(DomainError::not_initialized)?;

        write_transaction(conn, |conn| {
            let mut stmt = conn.prepare("SELECT DISTINCT type FROM tags")?;
            let types = stmt
                .query_map([], |row| row.get::<_, Option<String>>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            drop(stmt);

            for tag_type in types {
                reindex_group(conn, tag_type.as_deref())?;
            }
            Ok(())
        })
    }
}

/// Renumber one type group sequentially, closing gaps and duplicates
fn reindex_group(conn: &Connection, tag_type: Option<&str>) -> DomainResult<()> {
    let mut stmt = conn.prepare("SELECT id FROM tags WHERE type IS ?1 ORDER BY order_column, id")?;
    let ids = stmt
        .query_map(params![tag_type], |row| row.get::<_, i64>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    drop(stmt);

    for (index, id) in ids.iter().enumerate() {
        conn.execute(
            "UPDATE tags SET order_column = ?1 WHERE id = ?2 AND order_column != ?1",
            params![index as i64 + 1, id],
        )?;
    }
    Ok(())
}
