//! Domain Layer
//!
//! Contains all domain entities and core abstractions.
//! Nothing here touches the database.

mod entity;
mod tag;
mod tag_reference;
mod taggable;

pub use entity::{Entity, DomainError, DomainResult};
pub use tag::{Tag, TagTranslation, TranslatableField, SortDirection};
pub use tag_reference::{TagReference, TagValues, TagBatch};
pub use taggable::{Taggable, TaggableLink, DEFAULT_LINK_NAME};
