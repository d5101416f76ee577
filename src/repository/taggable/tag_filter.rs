//! Owner Queries by Tag
//!
//! `TaggableQuery` collects tag filters for one owner type. Compiling it resolves
//! names to tag ids and renders a WHERE fragment over the owner table, so it can be
//! run directly (`owner_ids`) or spliced into a caller's own query.
//!
//! Empty or fully unresolved inputs: all-of matches every owner, any-of matches
//! none, none-of excludes nothing.

use rusqlite::types::Value;
use rusqlite::Connection;
use std::collections::BTreeSet;
use std::marker::PhantomData;

use crate::config::{check_identifier, TagsConfig};
use crate::domain::{
    DomainError, DomainResult, TagReference, TagValues, Taggable, DEFAULT_LINK_NAME,
};
use crate::repository::tag::{find_by_name_any_type_in, find_existing_in};
use super::taggable_repo::TaggableRepository;

#[derive(Debug, Clone, PartialEq, Eq)]
enum TagFilter {
    AllOf { references: Vec<TagReference>, tag_type: Option<String> },
    AnyOf { references: Vec<TagReference>, tag_type: Option<String> },
    NoneOf { references: Vec<TagReference>, tag_type: Option<String> },
    AllOfAnyType(Vec<TagReference>),
    AnyOfAnyType(Vec<TagReference>),
}

/// Tag filters over owners of type `O`, combined with AND
#[derive(Debug, Clone)]
pub struct TaggableQuery<O> {
    filters: Vec<TagFilter>,
    link_name: String,
    _owner: PhantomData<fn() -> O>,
}

impl<O: Taggable> Default for TaggableQuery<O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: Taggable> TaggableQuery<O> {
    pub fn new() -> Self {
        Self {
            filters: Vec::new(),
            link_name: DEFAULT_LINK_NAME.to_string(),
            _owner: PhantomData,
        }
    }

    /// Match links under `link_name` instead of the default one
    pub fn on_link(mut self, link_name: impl Into<String>) -> Self {
        self.link_name = link_name.into();
        self
    }

    /// Owners linked to every given tag of `tag_type`
    pub fn with_all_tags(mut self, values: impl Into<TagValues>, tag_type: Option<&str>) -> Self {
        self.filters.push(TagFilter::AllOf {
            references: values.into().into_references(),
            tag_type: tag_type.map(str::to_string),
        });
        self
    }

    /// Owners linked to at least one given tag of `tag_type`
    pub fn with_any_tags(mut self, values: impl Into<TagValues>, tag_type: Option<&str>) -> Self {
        self.filters.push(TagFilter::AnyOf {
            references: values.into().into_references(),
            tag_type: tag_type.map(str::to_string),
        });
        self
    }

    /// Owners linked to none of the given tags of `tag_type`
    pub fn without_tags(mut self, values: impl Into<TagValues>, tag_type: Option<&str>) -> Self {
        self.filters.push(TagFilter::NoneOf {
            references: values.into().into_references(),
            tag_type: tag_type.map(str::to_string),
        });
        self
    }

    /// Owners linked to every given tag, whatever its type.
    ///
    /// Tags and ids match by identity; a name matches any tag with that name or slug.
    pub fn with_all_tags_of_any_type(mut self, values: impl Into<TagValues>) -> Self {
        self.filters
            .push(TagFilter::AllOfAnyType(values.into().into_references()));
        self
    }

    /// Owners linked to at least one given tag, whatever its type
    pub fn with_any_tags_of_any_type(mut self, values: impl Into<TagValues>) -> Self {
        self.filters
            .push(TagFilter::AnyOfAnyType(values.into().into_references()));
        self
    }

    pub fn link_name(&self) -> &str {
        &self.link_name
    }
}

/// WHERE fragment over the owner table plus its positional parameters.
///
/// The fragment refers to the owner table by its own name, so the caller's query
/// must not alias it.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFilter {
    pub sql: String,
    pub params: Vec<Value>,
}

enum Condition {
    /// Linked to at least one tag of the group
    Exists(Vec<i64>),
    NotExists(Vec<i64>),
    /// Linked to every tag of the group
    All(Vec<i64>),
    Never,
}

impl TaggableRepository {
    /// Resolve the query's tag references and render its WHERE fragment
    pub async fn compile<O: Taggable>(
        &self,
        query: &TaggableQuery<O>,
    ) -> DomainResult<CompiledFilter> {
        let locale = self.locale();
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(DomainError::not_initialized)?;
        compile_in(conn, &self.config, locale, query)
    }

    /// Ids of the owners matching `query`, ascending
    pub async fn owner_ids<O: Taggable>(&self, query: &TaggableQuery<O>) -> DomainResult<Vec<i64>> {
        let locale = self.locale();
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(DomainError::not_initialized)?;

        let filter = compile_in(conn, &self.config, locale, query)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {table}.{key} FROM {table} WHERE {sql} ORDER BY {table}.{key}",
            table = O::TABLE,
            key = O::KEY_COLUMN,
            sql = filter.sql,
        ))?;
        let ids = stmt
            .query_map(rusqlite::params_from_iter(filter.params.iter()), |row| {
                row.get::<_, i64>(0)
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ids)
    }
}

fn compile_in<O: Taggable>(
    conn: &Connection,
    config: &TagsConfig,
    locale: &str,
    query: &TaggableQuery<O>,
) -> DomainResult<CompiledFilter> {
    check_identifier("owner table", O::TABLE)?;
    check_identifier("owner key column", O::KEY_COLUMN)?;

    let mut conditions = Vec::new();
    for filter in &query.filters {
        resolve_filter(conn, config, locale, filter, &mut conditions)?;
    }

    if conditions.is_empty() {
        return Ok(CompiledFilter { sql: "1".to_string(), params: Vec::new() });
    }

    let link = &config.taggable;
    let mut parts = Vec::with_capacity(conditions.len());
    let mut params = Vec::new();
    for condition in conditions {
        let (head, ids, required) = match condition {
            Condition::Never => {
                parts.push("0".to_string());
                continue;
            }
            Condition::Exists(ids) => ("EXISTS (SELECT 1", ids, None),
            Condition::NotExists(ids) => ("NOT EXISTS (SELECT 1", ids, None),
            Condition::All(ids) => {
                let required = ids.len() as i64;
                ("(SELECT COUNT(DISTINCT l.tag_id)", ids, Some(required))
            }
        };
        // One bound JSON array per group, whatever its size
        let mut part = format!(
            "{head} FROM {table} l
                WHERE l.{type_col} = ? AND l.{id_col} = {owner}.{key}
                  AND l.link_name = ? AND l.tag_id IN (SELECT value FROM json_each(?)))",
            table = link.table_name,
            type_col = link.type_column(),
            id_col = link.id_column(),
            owner = O::TABLE,
            key = O::KEY_COLUMN,
        );
        params.push(Value::Text(O::MORPH_TYPE.to_string()));
        params.push(Value::Text(query.link_name.clone()));
        params.push(Value::Text(id_array(&ids)?));
        if let Some(required) = required {
            part.push_str(" = ?");
            params.push(Value::Integer(required));
        }
        parts.push(part);
    }

    Ok(CompiledFilter { sql: parts.join(" AND "), params })
}

fn id_array(ids: &[i64]) -> DomainResult<String> {
    serde_json::to_string(ids).map_err(|e| DomainError::Internal(e.to_string()))
}

fn resolve_filter(
    conn: &Connection,
    config: &TagsConfig,
    locale: &str,
    filter: &TagFilter,
    conditions: &mut Vec<Condition>,
) -> DomainResult<()> {
    match filter {
        TagFilter::AllOf { references, tag_type } => {
            let ids = resolve_ids(conn, config, locale, references, tag_type.as_deref())?;
            if !ids.is_empty() {
                conditions.push(Condition::All(ids.into_iter().collect()));
            }
        }
        TagFilter::AnyOf { references, tag_type } => {
            let ids = resolve_ids(conn, config, locale, references, tag_type.as_deref())?;
            if ids.is_empty() {
                conditions.push(Condition::Never);
            } else {
                conditions.push(Condition::Exists(ids.into_iter().collect()));
            }
        }
        TagFilter::NoneOf { references, tag_type } => {
            let ids = resolve_ids(conn, config, locale, references, tag_type.as_deref())?;
            if !ids.is_empty() {
                conditions.push(Condition::NotExists(ids.into_iter().collect()));
            }
        }
        TagFilter::AllOfAnyType(references) => {
            for group in any_type_groups(conn, config, locale, references)? {
                conditions.push(Condition::Exists(group));
            }
        }
        TagFilter::AnyOfAnyType(references) => {
            let ids: BTreeSet<i64> = any_type_groups(conn, config, locale, references)?
                .into_iter()
                .flatten()
                .collect();
            if ids.is_empty() {
                conditions.push(Condition::Never);
            } else {
                conditions.push(Condition::Exists(ids.into_iter().collect()));
            }
        }
    }
    Ok(())
}

/// Typed lookup; unresolved references are dropped
fn resolve_ids(
    conn: &Connection,
    config: &TagsConfig,
    locale: &str,
    references: &[TagReference],
    tag_type: Option<&str>,
) -> DomainResult<BTreeSet<i64>> {
    let tags = find_existing_in(conn, config, references.to_vec(), tag_type, locale)?;
    Ok(tags.into_iter().map(|t| t.id).collect())
}

/// One id group per reference; names with no match are dropped
fn any_type_groups(
    conn: &Connection,
    config: &TagsConfig,
    locale: &str,
    references: &[TagReference],
) -> DomainResult<Vec<Vec<i64>>> {
    let mut groups = Vec::with_capacity(references.len());
    for reference in references {
        let group: Vec<i64> = match reference {
            TagReference::Name(name) => find_by_name_any_type_in(conn, config, name, locale)?
                .into_iter()
                .map(|t| t.id)
                .collect(),
            other => other.known_id().into_iter().collect(),
        };
        if !group.is_empty() {
            groups.push(group);
        }
    }
    Ok(groups)
}
