//! Taggable Repository
//!
//! Many-to-many links between owners and tags. Every mutation resolves its tag
//! references and rewrites links inside one immediate transaction.

use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::config::TagsConfig;
use crate::domain::{
    DomainError, DomainResult, Tag, TagReference, TagValues, Taggable, TaggableLink,
    DEFAULT_LINK_NAME,
};
use crate::repository::db::{write_transaction, SharedConnection};
use crate::repository::tag::{find_existing_in, find_or_create_all_in, query_tags, TAG_COLUMNS};

/// Tag ids added and removed by a sync
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncChanges {
    pub attached: Vec<i64>,
    pub detached: Vec<i64>,
}

impl SyncChanges {
    pub fn is_empty(&self) -> bool {
        self.attached.is_empty() && self.detached.is_empty()
    }
}

/// SQLite implementation of the owner-tag association
#[derive(Clone)]
pub struct TaggableRepository {
    pub(super) conn: SharedConnection,
    pub(super) config: Arc<TagsConfig>,
    pub(super) locale: Option<String>,
}

impl TaggableRepository {
    pub fn new(conn: SharedConnection, config: Arc<TagsConfig>) -> Self {
        Self { conn, config, locale: None }
    }

    /// Handle whose active locale is `locale`; tags created through it in a
    /// non-default locale get a translation row
    pub fn in_locale(&self, locale: impl Into<String>) -> Self {
        Self {
            conn: self.conn.clone(),
            config: self.config.clone(),
            locale: Some(locale.into()),
        }
    }

    pub(super) fn locale(&self) -> &str {
        self.locale.as_deref().unwrap_or(&self.config.default_locale)
    }

    /// Tags linked to `owner` under `link_name`, ordered by order_column
    pub async fn tags<O: Taggable>(&self, owner: &O, link_name: &str) -> DomainResult<Vec<Tag>> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(DomainError::not_initialized)?;
        linked_tags_in(conn, &self.config, O::MORPH_TYPE, owner.id(), link_name, None)
    }

    /// Linked tags of one type
    pub async fn tags_with_type<O: Taggable>(
        &self,
        owner: &O,
        tag_type: &str,
        link_name: &str,
    ) -> DomainResult<Vec<Tag>> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(DomainError::not_initialized)?;
        linked_tags_in(conn, &self.config, O::MORPH_TYPE, owner.id(), link_name, Some(tag_type))
    }

    /// Raw link rows of `owner` under `link_name`
    pub async fn links<O: Taggable>(
        &self,
        owner: &O,
        link_name: &str,
    ) -> DomainResult<Vec<TaggableLink>> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(DomainError::not_initialized)?;

        let link = &self.config.taggable;
        let mut stmt = conn.prepare(&format!(
            "SELECT l.tag_id, l.{type_col}, l.{id_col}, l.link_name, l.type
             FROM {table} l JOIN tags ON tags.id = l.tag_id
             WHERE l.{type_col} = ?1 AND l.{id_col} = ?2 AND l.link_name = ?3
             ORDER BY tags.order_column, tags.id",
            table = link.table_name,
            type_col = link.type_column(),
            id_col = link.id_column(),
        ))?;
        let links = stmt
            .query_map(params![O::MORPH_TYPE, owner.id(), link_name], |row| {
                Ok(TaggableLink {
                    tag_id: row.get(0)?,
                    taggable_type: row.get(1)?,
                    taggable_id: row.get(2)?,
                    link_name: row.get(3)?,
                    link_type: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(links)
    }

    /// Link `values` to `owner`, creating named tags as needed.
    ///
    /// Already linked tags are left alone. Returns the resolved tags in input order.
    pub async fn attach_tags<O: Taggable>(
        &self,
        owner: &O,
        values: impl Into<TagValues>,
        tag_type: Option<&str>,
        link_name: &str,
    ) -> DomainResult<Vec<Tag>> {
        let references = values.into().into_references();
        let locale = self.locale();

        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(DomainError::not_initialized)?;

        let tags = write_transaction(conn, |conn| {
            let tags = find_or_create_all_in(conn, &self.config, references, tag_type, locale)?;
            for tag in &tags {
                insert_link_in(conn, &self.config, O::MORPH_TYPE, owner.id(), tag.id, link_name)?;
            }
            Ok(tags)
        })?;

        log::debug!(
            "Attached {} tag(s) to {}#{} under '{}'",
            tags.len(),
            O::MORPH_TYPE,
            owner.id(),
            link_name
        );
        Ok(tags)
    }

    /// Attach one tag under the default link name
    pub async fn attach_tag<O: Taggable>(
        &self,
        owner: &O,
        value: impl Into<TagReference>,
        tag_type: Option<&str>,
    ) -> DomainResult<Tag> {
        let tags = self
            .attach_tags(owner, TagValues::One(value.into()), tag_type, DEFAULT_LINK_NAME)
            .await?;
        tags.into_iter()
            .next()
            .ok_or_else(|| DomainError::Internal("Attach resolved no tag".to_string()))
    }

    /// Unlink `values` from `owner`. Names are looked up with `tag_type`;
    /// unknown tags and missing links are ignored. Returns the number of links removed.
    pub async fn detach_tags<O: Taggable>(
        &self,
        owner: &O,
        values: impl Into<TagValues>,
        tag_type: Option<&str>,
        link_name: &str,
    ) -> DomainResult<usize> {
        let references = values.into().into_references();
        let locale = self.locale();

        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(DomainError::not_initialized)?;

        write_transaction(conn, |conn| {
            let mut ids = BTreeSet::new();
            let mut names = Vec::new();
            for reference in references {
                match reference.known_id() {
                    Some(id) => {
                        ids.insert(id);
                    }
                    None => names.push(reference),
                }
            }
            for tag in find_existing_in(conn, &self.config, names, tag_type, locale)? {
                ids.insert(tag.id);
            }

            let mut removed = 0;
            for tag_id in ids {
                removed += delete_link_in(
                    conn,
                    &self.config,
                    O::MORPH_TYPE,
                    owner.id(),
                    tag_id,
                    link_name,
                )?;
            }
            Ok(removed)
        })
    }

    /// Detach one tag under the default link name
    pub async fn detach_tag<O: Taggable>(
        &self,
        owner: &O,
        value: impl Into<TagReference>,
        tag_type: Option<&str>,
    ) -> DomainResult<usize> {
        self.detach_tags(owner, TagValues::One(value.into()), tag_type, DEFAULT_LINK_NAME)
            .await
    }

    /// Make the links under `link_name` exactly the resolved `values`.
    ///
    /// Computed as a set difference: links that stay keep their pivot data.
    pub async fn sync_tags<O: Taggable>(
        &self,
        owner: &O,
        values: impl Into<TagValues>,
        tag_type: Option<&str>,
        link_name: &str,
    ) -> DomainResult<SyncChanges> {
        let references = values.into().into_references();
        let locale = self.locale();

        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(DomainError::not_initialized)?;

        let changes = write_transaction(conn, |conn| {
            let desired =
                find_or_create_all_in(conn, &self.config, references, tag_type, locale)?;
            let current =
                linked_tags_in(conn, &self.config, O::MORPH_TYPE, owner.id(), link_name, None)?;
            sync_links_in(
                conn,
                &self.config,
                O::MORPH_TYPE,
                owner.id(),
                link_name,
                &current,
                &desired,
            )
        })?;

        log::info!(
            "Synced tags of {}#{} under '{}': +{} -{}",
            O::MORPH_TYPE,
            owner.id(),
            link_name,
            changes.attached.len(),
            changes.detached.len()
        );
        Ok(changes)
    }

    /// Like `sync_tags` but only links to tags of `tag_type` are replaced
    pub async fn sync_tags_with_type<O: Taggable>(
        &self,
        owner: &O,
        values: impl Into<TagValues>,
        tag_type: &str,
        link_name: &str,
    ) -> DomainResult<SyncChanges> {
        let references = values.into().into_references();
        let locale = self.locale();

        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(DomainError::not_initialized)?;

        write_transaction(conn, |conn| {
            let desired =
                find_or_create_all_in(conn, &self.config, references, Some(tag_type), locale)?;
            let current = linked_tags_in(
                conn,
                &self.config,
                O::MORPH_TYPE,
                owner.id(),
                link_name,
                Some(tag_type),
            )?;
            sync_links_in(
                conn,
                &self.config,
                O::MORPH_TYPE,
                owner.id(),
                link_name,
                &current,
                &desired,
            )
        })
    }

    /// Whether `owner` is linked to the referenced tag
    pub async fn has_tag<O: Taggable>(
        &self,
        owner: &O,
        value: impl Into<TagReference>,
        tag_type: Option<&str>,
        link_name: &str,
    ) -> DomainResult<bool> {
        let reference = value.into();
        let locale = self.locale();

        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(DomainError::not_initialized)?;

        let tag_id = match reference.known_id() {
            Some(id) => id,
            None => {
                let found =
                    find_existing_in(conn, &self.config, vec![reference], tag_type, locale)?;
                match found.into_iter().next() {
                    Some(tag) => tag.id,
                    None => return Ok(false),
                }
            }
        };

        let link = &self.config.taggable;
        let count: i64 = conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM {}
                 WHERE tag_id = ?1 AND {} = ?2 AND {} = ?3 AND link_name = ?4",
                link.table_name,
                link.type_column(),
                link.id_column()
            ),
            params![tag_id, O::MORPH_TYPE, owner.id(), link_name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Set or clear the pivot type of one link; returns whether the link exists
    pub async fn set_link_type<O: Taggable>(
        &self,
        owner: &O,
        tag_id: i64,
        link_type: Option<&str>,
        link_name: &str,
    ) -> DomainResult<bool> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(DomainError::not_initialized)?;

        let link = &self.config.taggable;
        let changed = conn.execute(
            &format!(
                "UPDATE {} SET type = ?1
                 WHERE tag_id = ?2 AND {} = ?3 AND {} = ?4 AND link_name = ?5",
                link.table_name,
                link.type_column(),
                link.id_column()
            ),
            params![link_type, tag_id, O::MORPH_TYPE, owner.id(), link_name],
        )?;
        Ok(changed > 0)
    }
}

fn linked_tags_in(
    conn: &Connection,
    config: &TagsConfig,
    morph_type: &str,
    owner_id: i64,
    link_name: &str,
    tag_type: Option<&str>,
) -> DomainResult<Vec<Tag>> {
    let link = &config.taggable;
    let base = format!(
        "SELECT {cols} FROM tags JOIN {table} l ON l.tag_id = tags.id
         WHERE l.{type_col} = ?1 AND l.{id_col} = ?2 AND l.link_name = ?3",
        cols = TAG_COLUMNS,
        table = link.table_name,
        type_col = link.type_column(),
        id_col = link.id_column(),
    );

    match tag_type {
        Some(tag_type) => query_tags(
            conn,
            config,
            &format!("{} AND tags.type = ?4 ORDER BY tags.order_column, tags.id", base),
            params![morph_type, owner_id, link_name, tag_type],
        ),
        None => query_tags(
            conn,
            config,
            &format!("{} ORDER BY tags.order_column, tags.id", base),
            params![morph_type, owner_id, link_name],
        ),
    }
}

fn insert_link_in(
    conn: &Connection,
    config: &TagsConfig,
    morph_type: &str,
    owner_id: i64,
    tag_id: i64,
    link_name: &str,
) -> DomainResult<bool> {
    let link = &config.taggable;
    let inserted = conn.execute(
        &format!(
            "INSERT OR IGNORE INTO {} (tag_id, {}, {}, link_name) VALUES (?1, ?2, ?3, ?4)",
            link.table_name,
            link.type_column(),
            link.id_column()
        ),
        params![tag_id, morph_type, owner_id, link_name],
    )?;
    Ok(inserted > 0)
}

fn delete_link_in(
    conn: &Connection,
    config: &TagsConfig,
    morph_type: &str,
    owner_id: i64,
    tag_id: i64,
    link_name: &str,
) -> DomainResult<usize> {
    let link = &config.taggable;
    let removed = conn.execute(
        &format!(
            "DELETE FROM {} WHERE tag_id = ?1 AND {} = ?2 AND {} = ?3 AND link_name = ?4",
            link.table_name,
            link.type_column(),
            link.id_column()
        ),
        params![tag_id, morph_type, owner_id, link_name],
    )?;
    Ok(removed)
}

/// Detach `current - desired`, attach `desired - current`
fn sync_links_in(
    conn: &Connection,
    config: &TagsConfig,
    morph_type: &str,
    owner_id: i64,
    link_name: &str,
    current: &[Tag],
    desired: &[Tag],
) -> DomainResult<SyncChanges> {
    let current_ids: BTreeSet<i64> = current.iter().map(|t| t.id).collect();
    let desired_ids: BTreeSet<i64> = desired.iter().map(|t| t.id).collect();
    let mut changes = SyncChanges::default();

    for tag_id in current_ids.difference(&desired_ids) {
        delete_link_in(conn, config, morph_type, owner_id, *tag_id, link_name)?;
        changes.detached.push(*tag_id);
    }

    // Input order, duplicates skipped
    let mut seen = BTreeSet::new();
    for tag in desired {
        if current_ids.contains(&tag.id) || !seen.insert(tag.id) {
            continue;
        }
        if insert_link_in(conn, config, morph_type, owner_id, tag.id, link_name)? {
            changes.attached.push(tag.id);
        }
    }

    Ok(changes)
}
