//! Repository Layer - Core Traits
//!
//! Generic CRUD contract shared by the record repositories.

use async_trait::async_trait;
use crate::domain::{Entity, DomainResult};

/// Core repository trait for CRUD operations
#[async_trait]
pub trait Repository<T: Entity>: Send + Sync {
    /// Insert `entity`, returning it with its assigned id
    async fn create(&self, entity: &T) -> DomainResult<T>;

    async fn find_by_id(&self, id: T::Id) -> DomainResult<Option<T>>;

    async fn list(&self) -> DomainResult<Vec<T>>;

    /// Overwrite the stored record; `NotFound` if it does not exist
    async fn update(&self, entity: &T) -> DomainResult<T>;

    /// Remove the record and anything that only exists through it
    async fn delete(&self, id: T::Id) -> DomainResult<()>;

    async fn exists(&self, id: T::Id) -> DomainResult<bool> {
        Ok(self.find_by_id(id).await?.is_some())
    }
}

/// Extension for repositories that support text search
#[async_trait]
pub trait SearchableRepository<T: Entity>: Repository<T> {
    /// Records whose display text contains `query`
    async fn search(&self, query: &str) -> DomainResult<Vec<T>>;
}
