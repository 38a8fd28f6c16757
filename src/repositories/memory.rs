use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::{mapref::entry::Entry, DashMap};
use tracing::debug;
use uuid::Uuid;

use super::Repository;
use crate::{errors::ServiceError, models::Entity};

/// In-process repository backed by a `DashMap`.
///
/// The version check and the write happen under the same shard lock, so two
/// concurrent updates from the same version cannot both succeed. Unique keys
/// are claimed through their own map entry before the record is written.
#[derive(Clone)]
pub struct InMemoryRepository<T: Entity> {
    records: Arc<DashMap<Uuid, T>>,
    unique_keys: Arc<DashMap<String, Uuid>>,
}

impl<T: Entity> Default for InMemoryRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Entity> InMemoryRepository<T> {
    pub fn new() -> Self {
        Self {
            records: Arc::new(DashMap::new()),
            unique_keys: Arc::new(DashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Claims `key` for `id`. Returns `true` when the claim is new and
    /// `false` when `id` already held it.
    fn claim_key(&self, key: &str, id: Uuid) -> Result<bool, ServiceError> {
        match self.unique_keys.entry(key.to_string()) {
            Entry::Occupied(holder) if *holder.get() == id => Ok(false),
            Entry::Occupied(_) => Err(ServiceError::Conflict(format!(
                "{} '{}' already exists",
                T::NAME,
                key
            ))),
            Entry::Vacant(slot) => {
                slot.insert(id);
                Ok(true)
            }
        }
    }

    fn release_key(&self, key: Option<String>, id: Uuid) {
        if let Some(key) = key {
            self.unique_keys.remove_if(&key, |_, holder| *holder == id);
        }
    }

    fn replace(&self, mut record: T) -> Result<(T, Option<String>), ServiceError> {
        let id = record.id();
        let mut stored = self
            .records
            .get_mut(&id)
            .ok_or_else(|| ServiceError::not_found(T::NAME, id))?;

        if stored.version() != record.version() {
            debug!(
                entity = T::NAME,
                %id,
                stored = stored.version(),
                expected = record.version(),
                "version mismatch"
            );
            return Err(ServiceError::ConcurrentModification(id));
        }

        let previous_key = stored.unique_key();
        record.set_version(record.version() + 1);
        record.touch(Utc::now());
        *stored = record.clone();
        Ok((record, previous_key))
    }
}

#[async_trait]
impl<T: Entity> Repository<T> for InMemoryRepository<T> {
    async fn get(&self, id: Uuid) -> Result<Option<T>, ServiceError> {
        Ok(self.records.get(&id).map(|r| r.value().clone()))
    }

    async fn list(&self) -> Result<Vec<T>, ServiceError> {
        let mut all: Vec<T> = self.records.iter().map(|r| r.value().clone()).collect();
        all.sort_by(|a, b| b.created_at().cmp(&a.created_at()).then(a.id().cmp(&b.id())));
        Ok(all)
    }

    async fn insert(&self, mut record: T) -> Result<T, ServiceError> {
        let id = record.id();
        let key = record.unique_key();
        let claimed = match key.as_deref() {
            Some(k) => self.claim_key(k, id)?,
            None => false,
        };

        match self.records.entry(id) {
            Entry::Occupied(_) => {
                if claimed {
                    self.release_key(key, id);
                }
                Err(ServiceError::Conflict(format!("{} {} already exists", T::NAME, id)))
            }
            Entry::Vacant(slot) => {
                record.set_version(1);
                slot.insert(record.clone());
                Ok(record)
            }
        }
    }

    async fn update(&self, record: T) -> Result<T, ServiceError> {
        let id = record.id();
        let key = record.unique_key();
        let claimed = match key.as_deref() {
            Some(k) => self.claim_key(k, id)?,
            None => false,
        };

        match self.replace(record) {
            Ok((saved, previous_key)) => {
                if previous_key != key {
                    self.release_key(previous_key, id);
                }
                Ok(saved)
            }
            Err(e) => {
                if claimed {
                    self.release_key(key, id);
                }
                Err(e)
            }
        }
    }

    async fn delete(&self, id: Uuid, expected_version: Option<u64>) -> Result<(), ServiceError> {
        let removed = self
            .records
            .remove_if(&id, |_, r| expected_version.map_or(true, |v| r.version() == v));

        match removed {
            Some((_, record)) => {
                self.release_key(record.unique_key(), id);
                Ok(())
            }
            None if self.records.contains_key(&id) => {
                Err(ServiceError::ConcurrentModification(id))
            }
            None => Err(ServiceError::not_found(T::NAME, id)),
        }
    }
}
