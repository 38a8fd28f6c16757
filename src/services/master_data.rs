use std::sync::Arc;

use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    common::{ListParams, Page},
    errors::ServiceError,
    events::{Event, EventSender},
    models::MasterRecord,
    repositories::{ensure_version, Repository},
    validation::validate_form,
};

/// CRUD over one master-data collection.
pub struct MasterDataService<T: MasterRecord> {
    records: Arc<dyn Repository<T>>,
    events: EventSender,
}

impl<T: MasterRecord> Clone for MasterDataService<T> {
    fn clone(&self) -> Self {
        Self {
            records: self.records.clone(),
            events: self.events.clone(),
        }
    }
}

impl<T: MasterRecord> MasterDataService<T> {
    pub fn new(records: Arc<dyn Repository<T>>, events: EventSender) -> Self {
        Self { records, events }
    }

    fn publish(&self, user: &AuthUser, id: Uuid, operation: &str) {
        self.events.publish(
            Event::MasterDataChanged {
                entity: T::NAME.to_string(),
                id,
                operation: operation.to_string(),
            },
            &user.user_id,
        );
    }

    #[instrument(skip(self, user), fields(user_id = %user.user_id, entity = T::NAME))]
    pub async fn get(&self, user: &AuthUser, id: Uuid) -> Result<T, ServiceError> {
        user.require(T::READ_PERMISSION)?;
        self.records.find(id).await
    }

    #[instrument(skip(self, user), fields(user_id = %user.user_id, entity = T::NAME))]
    pub async fn list(
        &self,
        user: &AuthUser,
        params: &ListParams,
        limit: u64,
    ) -> Result<Page<T>, ServiceError> {
        user.require(T::READ_PERMISSION)?;
        params.apply(self.records.list().await?, limit)
    }

    #[instrument(skip(self, user, form), fields(user_id = %user.user_id, entity = T::NAME))]
    pub async fn create(&self, user: &AuthUser, form: T::Form) -> Result<T, ServiceError> {
        user.require(T::WRITE_PERMISSION)?;
        validate_form(&form)?;

        let record = self.records.insert(T::from_form(form)).await?;

        info!(id = %record.id(), "{} created", T::NAME);
        self.publish(user, record.id(), "created");
        Ok(record)
    }

    #[instrument(skip(self, user, form), fields(user_id = %user.user_id, entity = T::NAME))]
    pub async fn update(
        &self,
        user: &AuthUser,
        id: Uuid,
        form: T::Form,
        version: Option<u64>,
    ) -> Result<T, ServiceError> {
        user.require(T::WRITE_PERMISSION)?;
        validate_form(&form)?;

        let mut record = self.records.find(id).await?;
        ensure_version(&record, version)?;
        record.apply(form);
        let record = self.records.update(record).await?;

        info!(id = %id, version = record.version(), "{} updated", T::NAME);
        self.publish(user, id, "updated");
        Ok(record)
    }

    #[instrument(skip(self, user), fields(user_id = %user.user_id, entity = T::NAME))]
    pub async fn delete(
        &self,
        user: &AuthUser,
        id: Uuid,
        version: Option<u64>,
    ) -> Result<(), ServiceError> {
        user.require(T::WRITE_PERMISSION)?;
        self.records.delete(id, version).await?;

        info!(id = %id, "{} deleted", T::NAME);
        self.publish(user, id, "deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::consts,
        models::{Product, ProductForm},
        pricing::Money,
        repositories::InMemoryRepository,
    };
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    fn form(sku: &str) -> ProductForm {
        ProductForm {
            name: "Pantoprazole 40".into(),
            sku: sku.into(),
            generic_name: None,
            hsn_code: None,
            unit_price: Money::new(dec!(8.50)),
            gst_rate: dec!(12),
            is_active: true,
        }
    }

    fn service() -> MasterDataService<Product> {
        let (events, _rx) = EventSender::channel(16);
        MasterDataService::new(Arc::new(InMemoryRepository::new()), events)
    }

    #[tokio::test]
    async fn duplicate_sku_is_a_conflict() {
        let svc = service();
        let user = AuthUser::with_permissions("u", &[consts::PRODUCTS_WRITE]);
        svc.create(&user, form("PAN-40")).await.unwrap();
        assert_matches!(
            svc.create(&user, form("pan-40")).await,
            Err(ServiceError::Conflict(_))
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_creates_keep_one_sku() {
        let svc = service();
        let user = AuthUser::with_permissions("u", &[consts::PRODUCTS_WRITE]);
        let (first, second) = tokio::join!(
            svc.create(&user, form("MET-500")),
            svc.create(&user, form("met-500"))
        );
        assert_eq!(first.is_ok() as u8 + second.is_ok() as u8, 1);
        let reader = AuthUser::with_permissions("r", &[consts::PRODUCTS_READ]);
        let page = svc.list(&reader, &ListParams::default(), 20).await.unwrap();
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn write_needs_write_permission() {
        let svc = service();
        let reader = AuthUser::with_permissions("u", &[consts::PRODUCTS_READ]);
        assert_matches!(
            svc.create(&reader, form("X-1")).await,
            Err(ServiceError::Forbidden(_))
        );
        assert_eq!(
            svc.list(&reader, &ListParams::default(), 20)
                .await
                .unwrap()
                .total,
            0
        );
    }

    #[tokio::test]
    async fn update_with_stale_version_fails() {
        let svc = service();
        let user = AuthUser::with_permissions("u", &["products:*"]);
        let created = svc.create(&user, form("OME-20")).await.unwrap();
        svc.update(&user, created.id, form("OME-20"), Some(created.version))
            .await
            .unwrap();
        assert_matches!(
            svc.update(&user, created.id, form("OME-20"), Some(created.version))
                .await,
            Err(ServiceError::ConcurrentModification(_))
        );
    }
}
