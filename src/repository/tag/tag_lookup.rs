//! Tag Lookup Operations
//!
//! Name resolution, find-or-create and type listings.
//! The synchronous `*_in` functions take a bare connection so the taggable layer
//! can resolve tags inside its own transaction.

use async_trait::async_trait;
use rusqlite::{params, Connection};

use crate::config::TagsConfig;
use crate::domain::{
    DomainError, DomainResult, SortDirection, Tag, TagBatch, TagReference, TagTranslation,
    TagValues, TranslatableField,
};
use super::super::db::{now_millis, write_transaction};
use super::tag_repo::{find_by_id_in, next_order_column, query_tags, TAG_COLUMNS};
use super::tag_translation::upsert_translation;

/// Trait for tag lookup operations
#[async_trait]
pub trait TagLookupOperations {
    /// First tag of `tag_type` whose name, or translated name in `locale`, is `name`
    async fn find_by_name(
        &self,
        name: &str,
        tag_type: Option<&str>,
        locale: Option<&str>,
    ) -> DomainResult<Option<Tag>>;

    /// All tags of any type matching `name` by name, slug or translation
    async fn find_by_name_any_type(
        &self,
        name: &str,
        locale: Option<&str>,
    ) -> DomainResult<Vec<Tag>>;

    /// Look up by name and type, creating the tag when absent
    async fn find_or_create(
        &self,
        name: &str,
        tag_type: Option<&str>,
        locale: Option<&str>,
    ) -> DomainResult<Tag>;

    /// `find_or_create` over one or many references, shaped like the input
    async fn find_or_create_batch(
        &self,
        values: TagValues,
        tag_type: Option<&str>,
        locale: Option<&str>,
    ) -> DomainResult<TagBatch>;

    /// Distinct types present, `None` standing for untyped tags
    async fn list_types(&self) -> DomainResult<Vec<Option<String>>>;

    /// Tags of `tag_type` ordered by order_column
    async fn list_by_type(
        &self,
        tag_type: &str,
        direction: SortDirection,
    ) -> DomainResult<Vec<Tag>>;
}

#[async_trait]
impl TagLookupOperations for super::tag_repo::TagRepository {
    async fn find_by_name(
        &self,
        name: &str,
        tag_type: Option<&str>,
        locale: Option<&str>,
    ) -> DomainResult<Option<Tag>> {
        let locale = self.active_locale(locale);
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(DomainError::not_initialized)?;
        find_by_name_in(conn, &self.config, name, tag_type, locale)
    }

    async fn find_by_name_any_type(
        &self,
        name: &str,
        locale: Option<&str>,
    ) -> DomainResult<Vec<Tag>> {
        let locale = self.active_locale(locale);
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(DomainError::not_initialized)?;
        find_by_name_any_type_in(conn, &self.config, name, locale)
    }

    async fn find_or_create(
        &self,
        name: &str,
        tag_type: Option<&str>,
        locale: Option<&str>,
    ) -> DomainResult<Tag> {
        let locale = self.active_locale(locale);
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(DomainError::not_initialized)?;
        write_transaction(conn, |conn| {
            find_or_create_in(conn, &self.config, name, tag_type, locale)
        })
    }

    async fn find_or_create_batch(
        &self,
        values: TagValues,
        tag_type: Option<&str>,
        locale: Option<&str>,
    ) -> DomainResult<TagBatch> {
        let locale = self.active_locale(locale);
        let single = values.is_single();
        let references = values.into_references();

        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(DomainError::not_initialized)?;
        let mut tags = write_transaction(conn, |conn| {
            find_or_create_all_in(conn, &self.config, references, tag_type, locale)
        })?;

        if single {
            if let Some(tag) = tags.pop() {
                return Ok(TagBatch::One(tag));
            }
        }
        Ok(TagBatch::Many(tags))
    }

    async fn list_types(&self) -> DomainResult<Vec<Option<String>>> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(DomainError::not_initialized)?;

        let mut stmt = conn.prepare("SELECT DISTINCT type FROM tags ORDER BY type")?;
        let types = stmt
            .query_map([], |row| row.get::<_, Option<String>>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(types)
    }

    async fn list_by_type(
        &self,
        tag_type: &str,
        direction: SortDirection,
    ) -> DomainResult<Vec<Tag>> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(DomainError::not_initialized)?;

        query_tags(
            conn,
            &self.config,
            &format!(
                "SELECT {} FROM tags WHERE tags.type = ?1 ORDER BY tags.order_column {}, tags.id",
                TAG_COLUMNS,
                direction.as_sql()
            ),
            params![tag_type],
        )
    }
}

pub(crate) fn find_by_name_in(
    conn: &Connection,
    config: &TagsConfig,
    name: &str,
    tag_type: Option<&str>,
    locale: &str,
) -> DomainResult<Option<Tag>> {
    let tags = if config.is_translatable {
        query_tags(
            conn,
            config,
            &format!(
                "SELECT {} FROM tags
                 WHERE tags.type IS ?1
                   AND (tags.name = ?2
                        OR EXISTS (SELECT 1 FROM tag_translations tr
                                   WHERE tr.tag_id = tags.id AND tr.field = 'name'
                                     AND tr.value = ?2 AND tr.locale = ?3))
                 ORDER BY tags.id LIMIT 1",
                TAG_COLUMNS
            ),
            params![tag_type, name, locale],
        )?
    } else {
        query_tags(
            conn,
            config,
            &format!(
                "SELECT {} FROM tags WHERE tags.type IS ?1 AND tags.name = ?2
                 ORDER BY tags.id LIMIT 1",
                TAG_COLUMNS
            ),
            params![tag_type, name],
        )?
    };
    Ok(tags.into_iter().next())
}

pub(crate) fn find_by_name_any_type_in(
    conn: &Connection,
    config: &TagsConfig,
    name: &str,
    locale: &str,
) -> DomainResult<Vec<Tag>> {
    if config.is_translatable {
        query_tags(
            conn,
            config,
            &format!(
                "SELECT {} FROM tags
                 WHERE tags.name = ?1 OR tags.slug = ?1
                    OR EXISTS (SELECT 1 FROM tag_translations tr
                               WHERE tr.tag_id = tags.id AND tr.field IN ('name', 'slug')
                                 AND tr.value = ?1 AND tr.locale = ?2)
                 ORDER BY tags.id",
                TAG_COLUMNS
            ),
            params![name, locale],
        )
    } else {
        query_tags(
            conn,
            config,
            &format!(
                "SELECT {} FROM tags WHERE tags.name = ?1 OR tags.slug = ?1 ORDER BY tags.id",
                TAG_COLUMNS
            ),
            params![name],
        )
    }
}

/// Base columns always hold `name`; a non-default locale also gets a translation row.
pub(crate) fn find_or_create_in(
    conn: &Connection,
    config: &TagsConfig,
    name: &str,
    tag_type: Option<&str>,
    locale: &str,
) -> DomainResult<Tag> {
    if let Some(tag) = find_by_name_in(conn, config, name, tag_type, locale)? {
        return Ok(tag);
    }

    let order_column = next_order_column(conn, tag_type)?;
    let now = now_millis();
    conn.execute(
        "INSERT INTO tags (name, slug, type, order_column, created_at, updated_at)
         VALUES (?1, ?1, ?2, ?3, ?4, ?4)",
        params![name, tag_type, order_column, now],
    )?;
    let id = conn.last_insert_rowid();

    let mut tag = Tag {
        id,
        name: name.to_string(),
        slug: name.to_string(),
        tag_type: tag_type.map(str::to_string),
        order_column,
        translations: Vec::new(),
    };

    if config.is_translatable && !config.is_default_locale(locale) {
        upsert_translation(conn, id, TranslatableField::Name, locale, name)?;
        tag.translations.push(TagTranslation {
            field: TranslatableField::Name,
            locale: locale.to_string(),
            value: name.to_string(),
        });
    }

    log::debug!("Created tag {} '{}' (type {:?})", id, name, tag_type);
    Ok(tag)
}

/// Resolve every reference, creating named tags on demand.
///
/// Ids and resolved tags that don't exist abort with `NotFound`; run inside a
/// transaction so nothing created before the failure survives.
pub(crate) fn find_or_create_all_in(
    conn: &Connection,
    config: &TagsConfig,
    references: Vec<TagReference>,
    tag_type: Option<&str>,
    locale: &str,
) -> DomainResult<Vec<Tag>> {
    references
        .into_iter()
        .map(|reference| match reference {
            TagReference::Resolved(tag) => {
                if tag_exists_in(conn, tag.id)? {
                    Ok(tag)
                } else {
                    Err(DomainError::NotFound(format!("Tag {} not found", tag.id)))
                }
            }
            TagReference::Identity(id) => find_by_id_in(conn, config, id)?
                .ok_or_else(|| DomainError::NotFound(format!("Tag {} not found", id))),
            TagReference::Name(name) => find_or_create_in(conn, config, &name, tag_type, locale),
        })
        .collect()
}

fn tag_exists_in(conn: &Connection, id: i64) -> DomainResult<bool> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM tags WHERE id = ?1)",
        params![id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// Resolve references without creating anything; misses are dropped.
pub(crate) fn find_existing_in(
    conn: &Connection,
    config: &TagsConfig,
    references: Vec<TagReference>,
    tag_type: Option<&str>,
    locale: &str,
) -> DomainResult<Vec<Tag>> {
    let mut tags = Vec::with_capacity(references.len());
    for reference in references {
        let found = match reference {
            TagReference::Resolved(tag) => Some(tag),
            TagReference::Identity(id) => find_by_id_in(conn, config, id)?,
            TagReference::Name(name) => find_by_name_in(conn, config, &name, tag_type, locale)?,
        };
        tags.extend(found);
    }
    Ok(tags)
}
