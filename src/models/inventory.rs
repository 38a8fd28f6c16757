use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{Entity, Listable, StorageItem, WarehouseApproval};
use crate::errors::ServiceError;

/// Stock of one product batch in one warehouse.
///
/// `available_quantity` always equals `quantity - reserved_quantity`; it is
/// only ever changed through [`Inventory::reserve`] and [`Inventory::release`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub warehouse_id: Uuid,
    pub batch_number: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    pub quantity: i64,
    pub reserved_quantity: i64,
    pub available_quantity: i64,
    pub storage_location: Option<String>,
    pub warehouse_approval_id: Uuid,
    pub quality_control_id: Uuid,
    pub purchase_order_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

impl Inventory {
    /// Stock entry for an accepted storage item.
    pub fn from_storage_item(approval: &WarehouseApproval, item: &StorageItem) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            product_id: item.product_id,
            product_name: item.product_name.clone(),
            warehouse_id: approval.warehouse_id,
            batch_number: item.batch_number.clone(),
            expiry_date: item.expiry_date,
            quantity: item.approved_quantity,
            reserved_quantity: 0,
            available_quantity: item.approved_quantity,
            storage_location: item.storage_location.clone(),
            warehouse_approval_id: approval.id,
            quality_control_id: approval.quality_control_id,
            purchase_order_id: approval.purchase_order_id,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    pub fn reserve(&mut self, quantity: i64) -> Result<(), ServiceError> {
        if quantity > self.available_quantity {
            return Err(ServiceError::InsufficientStock(format!(
                "requested {} but only {} available",
                quantity, self.available_quantity
            )));
        }
        self.reserved_quantity += quantity;
        self.available_quantity = self.quantity - self.reserved_quantity;
        Ok(())
    }

    pub fn release(&mut self, quantity: i64) -> Result<(), ServiceError> {
        if quantity > self.reserved_quantity {
            return Err(ServiceError::InvalidOperation(format!(
                "cannot release {} with only {} reserved",
                quantity, self.reserved_quantity
            )));
        }
        self.reserved_quantity -= quantity;
        self.available_quantity = self.quantity - self.reserved_quantity;
        Ok(())
    }

    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.expiry_date.map_or(false, |d| d < today)
    }
}

impl Entity for Inventory {
    const NAME: &'static str = "Inventory";

    fn id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn touch(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }
}

impl Listable for Inventory {
    fn status_code(&self) -> Option<String> {
        Some(if self.available_quantity > 0 {
            "in_stock".to_string()
        } else {
            "out_of_stock".to_string()
        })
    }

    fn search_text(&self) -> Vec<&str> {
        let mut text = vec![self.product_name.as_str()];
        text.extend(self.batch_number.as_deref());
        text.extend(self.storage_location.as_deref());
        text
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct StockQuantity {
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i64,
    #[serde(default)]
    pub version: Option<u64>,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Unreserved stock of one batch expiring on `expiry_date`.
    pub fn stock(quantity: i64, expiry_date: Option<NaiveDate>) -> Inventory {
        let now = Utc::now();
        Inventory {
            id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            product_name: "Azithromycin 250".into(),
            warehouse_id: Uuid::new_v4(),
            batch_number: Some("AZ-1".into()),
            expiry_date,
            quantity,
            reserved_quantity: 0,
            available_quantity: quantity,
            storage_location: None,
            warehouse_approval_id: Uuid::new_v4(),
            quality_control_id: Uuid::new_v4(),
            purchase_order_id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn stock(quantity: i64) -> Inventory {
        fixtures::stock(quantity, NaiveDate::from_ymd_opt(2026, 1, 31))
    }

    #[test]
    fn reserve_and_release_keep_available_in_step() {
        let mut inv = stock(50);
        inv.reserve(20).unwrap();
        assert_eq!((inv.reserved_quantity, inv.available_quantity), (20, 30));
        inv.release(5).unwrap();
        assert_eq!((inv.reserved_quantity, inv.available_quantity), (15, 35));
        assert_eq!(inv.available_quantity, inv.quantity - inv.reserved_quantity);
    }

    #[test]
    fn over_reservation_is_rejected_without_change() {
        let mut inv = stock(10);
        assert_matches!(inv.reserve(11), Err(ServiceError::InsufficientStock(_)));
        assert_eq!(inv.available_quantity, 10);
        assert_matches!(inv.release(1), Err(ServiceError::InvalidOperation(_)));
    }

    #[test]
    fn expiry() {
        let inv = stock(1);
        assert!(inv.is_expired(NaiveDate::from_ymd_opt(2026, 2, 1).unwrap()));
        assert!(!inv.is_expired(NaiveDate::from_ymd_opt(2026, 1, 31).unwrap()));
    }
}
