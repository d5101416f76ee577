//! Taggable Association Module
//!
//! - taggable_repo: attach / detach / sync of owner-tag links
//! - tag_filter: owner queries by tag membership

mod taggable_repo;
mod tag_filter;

pub use taggable_repo::{SyncChanges, TaggableRepository};
pub use tag_filter::{CompiledFilter, TaggableQuery};
