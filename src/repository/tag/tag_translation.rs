//! Tag Translation Operations
//!
//! Per-locale values of translatable tag fields. Values for the default locale
//! live in the base columns, every other locale in `tag_translations`.

use async_trait::async_trait;
use rusqlite::{params, Connection};

use crate::domain::{DomainError, DomainResult, Tag, TagTranslation, TranslatableField};
use super::super::db::{now_millis, write_transaction};
use super::tag_repo::find_by_id_in;

/// Trait for tag translation operations
#[async_trait]
pub trait TagTranslationOperations {
    /// Store `value` for `field` in `locale` and return the refreshed tag
    async fn set_translation(
        &self,
        tag_id: i64,
        field: TranslatableField,
        locale: &str,
        value: &str,
    ) -> DomainResult<Tag>;

    /// Remove a translation; returns whether one existed
    async fn forget_translation(
        &self,
        tag_id: i64,
        field: TranslatableField,
        locale: &str,
    ) -> DomainResult<bool>;

    async fn translations_for(&self, tag_id: i64) -> DomainResult<Vec<TagTranslation>>;

    /// Rename a tag as seen from `locale` (the active locale when `None`)
    async fn rename(&self, tag_id: i64, name: &str, locale: Option<&str>) -> DomainResult<Tag>;

    /// Name of `tag` in `locale`, falling back to the base column
    fn resolved_name<'a>(&'a self, tag: &'a Tag, locale: Option<&'a str>) -> &'a str;
}

#[async_trait]
impl TagTranslationOperations for super::tag_repo::TagRepository {
    async fn set_translation(
        &self,
        tag_id: i64,
        field: TranslatableField,
        locale: &str,
        value: &str,
    ) -> DomainResult<Tag> {
        let is_default = self.config.is_default_locale(locale);
        if !is_default && !self.config.is_translatable {
            return Err(DomainError::InvalidInput(
                "Tag translations are disabled".to_string(),
            ));
        }

        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(DomainError::not_initialized)?;

        write_transaction(conn, |conn| {
            if find_by_id_in(conn, &self.config, tag_id)?.is_none() {
                return Err(DomainError::NotFound(format!("Tag {} not found", tag_id)));
            }

            if is_default {
                update_base_field(conn, tag_id, field, value)?;
            } else {
                upsert_translation(conn, tag_id, field, locale, value)?;
            }

            find_by_id_in(conn, &self.config, tag_id)?
                .ok_or_else(|| DomainError::NotFound(format!("Tag {} not found", tag_id)))
        })
    }

    async fn forget_translation(
        &self,
        tag_id: i64,
        field: TranslatableField,
        locale: &str,
    ) -> DomainResult<bool> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(DomainError::not_initialized)?;

        let removed = conn.execute(
            "DELETE FROM tag_translations WHERE tag_id = ?1 AND field = ?2 AND locale = ?3",
            params![tag_id, field.as_str(), locale],
        )?;
        Ok(removed > 0)
    }

    async fn translations_for(&self, tag_id: i64) -> DomainResult<Vec<TagTranslation>> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(DomainError::not_initialized)?;

        let mut stmt = conn.prepare(
            "SELECT field, locale, value FROM tag_translations WHERE tag_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![tag_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut translations = Vec::new();
        for row in rows {
            let (field, locale, value) = row?;
            if let Some(field) = TranslatableField::parse(&field) {
                translations.push(TagTranslation { field, locale, value });
            }
        }
        Ok(translations)
    }

    async fn rename(&self, tag_id: i64, name: &str, locale: Option<&str>) -> DomainResult<Tag> {
        let locale = self.active_locale(locale);
        self.set_translation(tag_id, TranslatableField::Name, locale, name).await
    }

    fn resolved_name<'a>(&'a self, tag: &'a Tag, locale: Option<&'a str>) -> &'a str {
        tag.resolved_name(self.active_locale(locale), &self.config)
    }
}

/// Write a default-locale value straight into the base column
pub(crate) fn update_base_field(
    conn: &Connection,
    tag_id: i64,
    field: TranslatableField,
    value: &str,
) -> DomainResult<()> {
    conn.execute(
        &format!("UPDATE tags SET {} = ?1, updated_at = ?2 WHERE id = ?3", field.as_str()),
        params![value, now_millis(), tag_id],
    )?;
    Ok(())
}

pub(crate) fn upsert_translation(
    conn: &Connection,
    tag_id: i64,
    field: TranslatableField,
    locale: &str,
    value: &str,
) -> DomainResult<()> {
    conn.execute(
        "INSERT INTO tag_translations (tag_id, field, locale, value) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (tag_id, field, locale) DO UPDATE SET value = excluded.value",
        params![tag_id, field.as_str(), locale, value],
    )?;
    Ok(())
}
