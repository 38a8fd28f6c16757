use async_trait::async_trait;
use uuid::Uuid;

use crate::{errors::ServiceError, models::Entity};

pub mod memory;

pub use memory::InMemoryRepository;

/// Storage for one collection of records.
///
/// Writes are guarded by the record's `version`: `update` succeeds only when
/// the stored version equals the version the caller read, and bumps it.
#[async_trait]
pub trait Repository<T: Entity>: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<T>, ServiceError>;

    /// Every record, newest first.
    async fn list(&self) -> Result<Vec<T>, ServiceError>;

    async fn insert(&self, record: T) -> Result<T, ServiceError>;

    /// Replaces the record if its stored version equals `record.version()`.
    /// Returns the stored copy with the new version.
    async fn update(&self, record: T) -> Result<T, ServiceError>;

    async fn delete(&self, id: Uuid, expected_version: Option<u64>) -> Result<(), ServiceError>;

    /// Like `get` but fails with `NotFound`.
    async fn find(&self, id: Uuid) -> Result<T, ServiceError> {
        self.get(id)
            .await?
            .ok_or_else(|| ServiceError::not_found(T::NAME, id))
    }
}

/// Fails with `ConcurrentModification` when the client sent a version that
/// is no longer current.
pub fn ensure_version<T: Entity>(record: &T, expected: Option<u64>) -> Result<(), ServiceError> {
    match expected {
        Some(version) if version != record.version() => {
            Err(ServiceError::ConcurrentModification(record.id()))
        }
        _ => Ok(()),
    }
}
