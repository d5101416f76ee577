//! Taggable Owners
//!
//! Any entity stored in its own table can hold tags through the polymorphic
//! link table, keyed by `(MORPH_TYPE, id)`.

use serde::{Deserialize, Serialize};
use super::entity::Entity;

/// Link name used when callers don't ask for another one
pub const DEFAULT_LINK_NAME: &str = "tags";

/// An entity that can hold tags
pub trait Taggable: Entity<Id = i64> {
    /// Stable discriminator stored in the link table
    const MORPH_TYPE: &'static str;
    /// Table holding the owner rows, used by owner queries
    const TABLE: &'static str;
    /// Primary key column of `TABLE`
    const KEY_COLUMN: &'static str = "id";
}

/// Join table entry between an owner and a tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggableLink {
    pub tag_id: i64,
    pub taggable_type: String,
    pub taggable_id: i64,
    pub link_name: String,
    /// Optional pivot override of the tag's type
    pub link_type: Option<String>,
}
