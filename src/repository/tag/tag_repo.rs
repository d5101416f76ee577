//! Tag Repository - Core CRUD Operations
//!
//! SQLite-backed implementation for Tag CRUD.
//! Specialized operations are in separate modules:
//! - tag_lookup: name resolution and find-or-create
//! - tag_translation: per-locale values
//! - tag_positioning: order_column management

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Params};
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::TagsConfig;
use crate::domain::{DomainError, DomainResult, Tag, TagTranslation, TranslatableField};
use super::super::db::{now_millis, write_transaction, SharedConnection};
use super::super::traits::{Repository, SearchableRepository};
use super::tag_translation::upsert_translation;

/// Ids bound per translation query, well under SQLite's variable limit
const TRANSLATION_CHUNK: usize = 500;

/// Columns selected wherever a full Tag is read
pub(crate) const TAG_COLUMNS: &str = "tags.id, tags.name, tags.slug, tags.type, tags.order_column";

/// SQLite implementation of Tag repository
#[derive(Clone)]
pub struct TagRepository {
    pub(super) conn: SharedConnection,
    pub(super) config: Arc<TagsConfig>,
    /// Locale used when an operation is not given one
    pub(super) locale: Option<String>,
}

impl TagRepository {
    pub fn new(conn: SharedConnection, config: Arc<TagsConfig>) -> Self {
        Self { conn, config, locale: None }
    }

    /// Handle whose active locale is `locale`
    pub fn in_locale(&self, locale: impl Into<String>) -> Self {
        Self {
            conn: self.conn.clone(),
            config: self.config.clone(),
            locale: Some(locale.into()),
        }
    }

    pub fn config(&self) -> &TagsConfig {
        &self.config
    }

    /// Explicit locale, else the active one, else the default
    pub fn active_locale<'a>(&'a self, locale: Option<&'a str>) -> &'a str {
        locale
            .or(self.locale.as_deref())
            .unwrap_or(&self.config.default_locale)
    }
}

#[async_trait]
impl Repository<Tag> for TagRepository {
    async fn create(&self, entity: &Tag) -> DomainResult<Tag> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(DomainError::not_initialized)?;

        write_transaction(conn, |conn| {
            let order_column = if entity.order_column > 0 {
                entity.order_column
            } else {
                next_order_column(conn, entity.tag_type.as_deref())?
            };
            let slug = if entity.slug.is_empty() { &entity.name } else { &entity.slug };
            let now = now_millis();

            conn.execute(
                "INSERT INTO tags (name, slug, type, order_column, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                params![entity.name, slug, entity.tag_type, order_column, now],
            )?;
            let id = conn.last_insert_rowid();

            // The base columns already carry the default locale
            let mut tag = entity.clone();
            tag.translations.retain(|t| {
                self.config.is_translatable && !self.config.is_default_locale(&t.locale)
            });
            for t in &tag.translations {
                upsert_translation(conn, id, t.field, &t.locale, &t.value)?;
            }

            tag.id = id;
            tag.slug = slug.clone();
            tag.order_column = order_column;
            Ok(tag)
        })
    }

    async fn find_by_id(&self, id: i64) -> DomainResult<Option<Tag>> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(DomainError::not_initialized)?;
        find_by_id_in(conn, &self.config, id)
    }

    async fn list(&self) -> DomainResult<Vec<Tag>> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(DomainError::not_initialized)?;

        query_tags(
            conn,
            &self.config,
            &format!(
                "SELECT {} FROM tags ORDER BY tags.type, tags.order_column, tags.id",
                TAG_COLUMNS
            ),
            [],
        )
    }

    async fn update(&self, entity: &Tag) -> DomainResult<Tag> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(DomainError::not_initialized)?;

        let changed = conn.execute(
            "UPDATE tags SET name = ?1, slug = ?2, type = ?3, order_column = ?4, updated_at = ?5
             WHERE id = ?6",
            params![
                entity.name,
                entity.slug,
                entity.tag_type,
                entity.order_column,
                now_millis(),
                entity.id
            ],
        )?;
        if changed == 0 {
            return Err(DomainError::NotFound(format!("Tag {} not found", entity.id)));
        }

        find_by_id_in(conn, &self.config, entity.id)?
            .ok_or_else(|| DomainError::NotFound(format!("Tag {} not found", entity.id)))
    }

    async fn delete(&self, id: i64) -> DomainResult<()> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(DomainError::not_initialized)?;
        let link_table = self.config.taggable.table_name.clone();

        // Links and translations go with the tag even when foreign keys are off
        write_transaction(conn, |conn| {
            conn.execute(&format!("DELETE FROM {} WHERE tag_id = ?1", link_table), params![id])?;
            conn.execute("DELETE FROM tag_translations WHERE tag_id = ?1", params![id])?;
            conn.execute("DELETE FROM tags WHERE id = ?1", params![id])?;
            Ok(())
        })?;

        log::debug!("Deleted tag {}", id);
        Ok(())
    }
}

#[async_trait]
impl SearchableRepository<Tag> for TagRepository {
    /// Tags whose name, or name in the active locale, contains `query`
    async fn search(&self, query: &str) -> DomainResult<Vec<Tag>> {
        let pattern = format!("%{}%", escape_like(query));
        let locale = self.active_locale(None).to_string();

        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(DomainError::not_initialized)?;

        if self.config.is_translatable {
            query_tags(
                conn,
                &self.config,
                &format!(
                    "SELECT {} FROM tags
                     WHERE tags.name LIKE ?1 ESCAPE '\\'
                        OR EXISTS (SELECT 1 FROM tag_translations tr
                                   WHERE tr.tag_id = tags.id AND tr.field = 'name'
                                     AND tr.locale = ?2 AND tr.value LIKE ?1 ESCAPE '\\')
                     ORDER BY tags.order_column, tags.id",
                    TAG_COLUMNS
                ),
                params![pattern, locale],
            )
        } else {
            query_tags(
                conn,
                &self.config,
                &format!(
                    "SELECT {} FROM tags WHERE tags.name LIKE ?1 ESCAPE '\\'
                     ORDER BY tags.order_column, tags.id",
                    TAG_COLUMNS
                ),
                params![pattern],
            )
        }
    }
}

fn escape_like(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len());
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Convert a database row to Tag
pub(crate) fn row_to_tag(row: &rusqlite::Row) -> rusqlite::Result<Tag> {
    Ok(Tag {
        id: row.get(0)?,
        name: row.get(1)?,
        slug: row.get(2)?,
        tag_type: row.get(3)?,
        order_column: row.get(4)?,
        translations: Vec::new(),
    })
}

/// Run a tag query and attach translations when they are enabled
pub(crate) fn query_tags<P: Params>(
    conn: &Connection,
    config: &TagsConfig,
    sql: &str,
    params: P,
) -> DomainResult<Vec<Tag>> {
    let mut stmt = conn.prepare(sql)?;
    let tags = stmt
        .query_map(params, row_to_tag)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    load_translations(conn, config, tags)
}

pub(crate) fn find_by_id_in(
    conn: &Connection,
    config: &TagsConfig,
    id: i64,
) -> DomainResult<Option<Tag>> {
    let tag = conn
        .query_row(
            &format!("SELECT {} FROM tags WHERE tags.id = ?1", TAG_COLUMNS),
            params![id],
            row_to_tag,
        )
        .optional()?;

    match tag {
        Some(tag) => Ok(load_translations(conn, config, vec![tag])?.pop()),
        None => Ok(None),
    }
}

pub(crate) fn load_translations(
    conn: &Connection,
    config: &TagsConfig,
    mut tags: Vec<Tag>,
) -> DomainResult<Vec<Tag>> {
    if !config.is_translatable || tags.is_empty() {
        return Ok(tags);
    }

    let positions: HashMap<i64, Vec<usize>> =
        tags.iter().enumerate().fold(HashMap::new(), |mut acc, (i, t)| {
            acc.entry(t.id).or_default().push(i);
            acc
        });
    let ids: Vec<i64> = positions.keys().copied().collect();

    for chunk in ids.chunks(TRANSLATION_CHUNK) {
        let placeholders = vec!["?"; chunk.len()].join(", ");
        let mut stmt = conn.prepare(&format!(
            "SELECT tag_id, field, locale, value FROM tag_translations
             WHERE tag_id IN ({}) ORDER BY id",
            placeholders
        ))?;
        let rows = stmt.query_map(rusqlite::params_from_iter(chunk.iter()), |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        for row in rows {
            let (tag_id, field, locale, value) = row?;
            let Some(field) = TranslatableField::parse(&field) else {
                continue;
            };
            for &i in positions.get(&tag_id).into_iter().flatten() {
                tags[i].translations.push(TagTranslation {
                    field,
                    locale: locale.clone(),
                    value: value.clone(),
                });
            }
        }
    }
    Ok(tags)
}

/// Next free order_column within a type
pub(crate) fn next_order_column(conn: &Connection, tag_type: Option<&str>) -> DomainResult<i64> {
    let next = conn.query_row(
        "SELECT COALESCE(MAX(order_column), 0) + 1 FROM tags WHERE type IS ?1",
        params![tag_type],
        |row| row.get(0),
    )?;
    Ok(next)
}
