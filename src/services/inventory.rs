use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::{consts, AuthUser},
    common::{ListParams, Page},
    errors::ServiceError,
    events::{Event, EventSender},
    export::to_csv,
    models::{Inventory, StockQuantity},
    repositories::{ensure_version, Repository},
    validation::validate_form,
};

/// Service for managing inventory
#[derive(Clone)]
pub struct InventoryService {
    stock: Arc<dyn Repository<Inventory>>,
    events: EventSender,
}

impl InventoryService {
    /// Creates a new inventory service instance
    pub fn new(stock: Arc<dyn Repository<Inventory>>, events: EventSender) -> Self {
        Self { stock, events }
    }

    #[instrument(skip(self, user), fields(user_id = %user.user_id))]
    pub async fn get(&self, user: &AuthUser, id: Uuid) -> Result<Inventory, ServiceError> {
        user.require(consts::INVENTORY_READ)?;
        self.stock.find(id).await
    }

    /// Lists stock; `status` filters on `in_stock` / `out_of_stock`
    #[instrument(skip(self, user), fields(user_id = %user.user_id))]
    pub async fn list(
        &self,
        user: &AuthUser,
        params: &ListParams,
        limit: u64,
    ) -> Result<Page<Inventory>, ServiceError> {
        user.require(consts::INVENTORY_READ)?;
        params.apply(self.stock.list().await?, limit)
    }

    /// Reserves available stock
    #[instrument(skip(self, user, form), fields(user_id = %user.user_id, quantity = form.quantity))]
    pub async fn reserve(
        &self,
        user: &AuthUser,
        id: Uuid,
        form: StockQuantity,
    ) -> Result<Inventory, ServiceError> {
        user.require(consts::INVENTORY_RESERVE)?;
        validate_form(&form)?;

        let mut stock = self.stock.find(id).await?;
        ensure_version(&stock, form.version)?;
        if stock.is_expired(Utc::now().date_naive()) {
            return Err(ServiceError::InvalidOperation(format!(
                "batch {} expired on {}",
                stock.batch_number.as_deref().unwrap_or("-"),
                stock.expiry_date.map(|d| d.to_string()).unwrap_or_default()
            )));
        }
        stock.reserve(form.quantity)?;
        let stock = self.stock.update(stock).await?;

        info!(inventory_id = %stock.id, available = stock.available_quantity, "inventory reserved");
        self.events.publish(
            Event::InventoryReserved {
                inventory_id: stock.id,
                quantity: form.quantity,
            },
            &user.user_id,
        );
        Ok(stock)
    }

    /// Releases reserved stock
    #[instrument(skip(self, user, form), fields(user_id = %user.user_id, quantity = form.quantity))]
    pub async fn release(
        &self,
        user: &AuthUser,
        id: Uuid,
        form: StockQuantity,
    ) -> Result<Inventory, ServiceError> {
        user.require(consts::INVENTORY_RESERVE)?;
        validate_form(&form)?;

        let mut stock = self.stock.find(id).await?;
        ensure_version(&stock, form.version)?;
        stock.release(form.quantity)?;
        let stock = self.stock.update(stock).await?;

        info!(inventory_id = %stock.id, available = stock.available_quantity, "inventory released");
        self.events.publish(
            Event::InventoryReleased {
                inventory_id: stock.id,
                quantity: form.quantity,
            },
            &user.user_id,
        );
        Ok(stock)
    }

    #[instrument(skip(self, user), fields(user_id = %user.user_id))]
    pub async fn export_csv(
        &self,
        user: &AuthUser,
        params: &ListParams,
    ) -> Result<String, ServiceError> {
        user.require(consts::INVENTORY_READ)?;
        let all = self.stock.list().await?;
        let limit = all.len().max(1) as u64;
        let page = ListParams {
            page: Some(1),
            ..params.clone()
        }
        .apply(all, limit)?;
        to_csv(&page.items)
    }
}
