//! Repository Layer
//!
//! Data access abstractions and their SQLite implementations.

mod traits;
mod db;
pub mod tag;
pub mod taggable;

#[cfg(test)]
mod tests;

pub use traits::{Repository, SearchableRepository};
pub use db::{init_db, run_migrations, schema_statements, DbState, SharedConnection};
pub use tag::TagRepository;
pub use taggable::{CompiledFilter, SyncChanges, TaggableQuery, TaggableRepository};
