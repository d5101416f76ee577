//! Tag Repository Module
//!
//! This module provides tag repository functionality split into specialized sub-modules:
//! - tag_repo: Core CRUD operations
//! - tag_lookup: Name resolution, find-or-create, type listings
//! - tag_translation: Per-locale values
//! - tag_positioning: Position management operations

mod tag_repo;
mod tag_lookup;
mod tag_translation;
mod tag_positioning;

pub use tag_repo::TagRepository;

// Re-export all operation traits so they can be used by importing TagRepository
pub use tag_lookup::TagLookupOperations;
pub use tag_translation::TagTranslationOperations;
pub use tag_positioning::TagPositioningOperations;

pub(crate) use tag_lookup::{find_by_name_any_type_in, find_existing_in, find_or_create_all_in};
pub(crate) use tag_repo::{query_tags, TAG_COLUMNS};
