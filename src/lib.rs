//! Taggable
//!
//! Typed, translatable tags for any SQLite-backed entity.
//!
//! Layered architecture:
//! - domain: Core entities and business rules
//! - repository: Data access abstractions and implementations
//! - config: Tagging settings

use std::path::Path;
use std::sync::Arc;

pub mod config;
pub mod domain;
pub mod repository;

pub use config::{TaggableConfig, TagsConfig};
pub use domain::{
    DomainError, DomainResult, Entity, SortDirection, Tag, TagBatch, TagReference,
    TagTranslation, TagValues, Taggable, TaggableLink, TranslatableField, DEFAULT_LINK_NAME,
};
pub use repository::tag::{TagLookupOperations, TagPositioningOperations, TagTranslationOperations};
pub use repository::{
    init_db, schema_statements, CompiledFilter, DbState, Repository, SearchableRepository,
    SyncChanges, TagRepository, TaggableQuery, TaggableRepository,
};

/// Database handle plus both repositories, sharing one connection and config
#[derive(Clone)]
pub struct TagStore {
    pub db_state: DbState,
    pub tags: TagRepository,
    pub taggables: TaggableRepository,
}

impl TagStore {
    /// Open (or create) the database at `db_path` and run migrations
    pub async fn open(db_path: &Path, config: TagsConfig) -> DomainResult<Self> {
        let db_state = init_db(db_path, &config).await?;
        Ok(Self::from_state(db_state, config))
    }

    pub fn from_state(db_state: DbState, config: TagsConfig) -> Self {
        let config = Arc::new(config);
        Self {
            tags: TagRepository::new(db_state.connection(), config.clone()),
            taggables: TaggableRepository::new(db_state.connection(), config),
            db_state,
        }
    }

    /// Both repositories with `locale` as the active locale
    pub fn in_locale(&self, locale: &str) -> Self {
        Self {
            db_state: self.db_state.clone(),
            tags: self.tags.in_locale(locale),
            taggables: self.taggables.in_locale(locale),
        }
    }

    pub fn config(&self) -> &TagsConfig {
        self.tags.config()
    }
}
