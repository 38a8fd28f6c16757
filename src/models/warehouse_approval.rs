use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;
use validator::Validate;

use super::{Entity, EventKind, Listable, Priority, QcItem, WorkflowEvent};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum WarehouseApprovalStatus {
    Pending,
    Submitted,
    Approved,
    Rejected,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ItemDecision {
    #[default]
    Pending,
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageItem {
    pub id: Uuid,
    pub qc_item_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub batch_number: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    /// Quantity that passed inspection
    pub passed_quantity: i64,
    pub approved_quantity: i64,
    pub storage_location: Option<String>,
    pub decision: ItemDecision,
    pub remarks: Option<String>,
}

impl StorageItem {
    pub fn from_qc_item(item: &QcItem) -> Self {
        Self {
            id: Uuid::new_v4(),
            qc_item_id: item.id,
            product_id: item.product_id,
            product_name: item.product_name.clone(),
            batch_number: item.batch_number.clone(),
            expiry_date: item.expiry_date,
            passed_quantity: item.received_quantity,
            approved_quantity: item.received_quantity,
            storage_location: None,
            decision: ItemDecision::Pending,
            remarks: None,
        }
    }
}

/// Storage sign-off for the items that passed a QC inspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseApproval {
    pub id: Uuid,
    pub approval_number: String,
    pub quality_control_id: Uuid,
    pub purchase_order_id: Uuid,
    pub warehouse_id: Uuid,
    pub status: WarehouseApprovalStatus,
    pub priority: Priority,
    pub items: Vec<StorageItem>,
    pub assigned_to: Option<String>,
    pub approved_by: Option<String>,
    pub events: Vec<WorkflowEvent>,
    pub notes: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub version: u64,
}

impl WarehouseApproval {
    pub fn item_mut(&mut self, item_id: Uuid) -> Option<&mut StorageItem> {
        self.items.iter_mut().find(|i| i.id == item_id)
    }

    pub fn all_decided(&self) -> bool {
        self.items.iter().all(|i| i.decision != ItemDecision::Pending)
    }

    pub fn accepted_items(&self) -> impl Iterator<Item = &StorageItem> {
        self.items
            .iter()
            .filter(|i| i.decision == ItemDecision::Accepted && i.approved_quantity > 0)
    }

    pub fn log(&mut self, kind: EventKind, actor: &str, remarks: Option<String>) {
        let event = WorkflowEvent::new(kind, actor, remarks);
        self.updated_at = event.at;
        self.events.push(event);
    }
}

impl Entity for WarehouseApproval {
    const NAME: &'static str = "Warehouse approval";

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

    /// One live approval per inspection; a rejected approval frees it.
    fn unique_key(&self) -> Option<String> {
        (self.status != WarehouseApprovalStatus::Rejected)
            .then(|| self.quality_control_id.to_string())
    }
}

impl Listable for WarehouseApproval {
    fn status_code(&self) -> Option<String> {
        Some(self.status.to_string())
    }

    fn search_text(&self) -> Vec<&str> {
        let mut text = vec![self.approval_number.as_str()];
        text.extend(self.items.iter().map(|i| i.product_name.as_str()));
        text.extend(self.items.iter().filter_map(|i| i.storage_location.as_deref()));
        text
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateWarehouseApproval {
    pub quality_control_id: Uuid,
    pub warehouse_id: Uuid,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    #[validate(length(min = 1, max = 100))]
    pub assigned_to: Option<String>,
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateStorageItem {
    pub decision: ItemDecision,
    #[validate(range(min = 0, message = "Approved quantity cannot be negative"))]
    pub approved_quantity: i64,
    #[serde(default)]
    #[validate(length(min = 1, max = 64, message = "Storage location is invalid"))]
    pub storage_location: Option<String>,
    #[serde(default)]
    #[validate(length(max = 1000))]
    pub remarks: Option<String>,
    #[serde(default)]
    pub version: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepted_items_skip_zero_quantities() {
        let now = Utc::now();
        let item = |decision, approved_quantity| StorageItem {
            id: Uuid::new_v4(),
            qc_item_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            product_name: "Cetirizine".into(),
            batch_number: None,
            expiry_date: None,
            passed_quantity: 10,
            approved_quantity,
            storage_location: Some("R1-S2".into()),
            decision,
            remarks: None,
        };
        let approval = WarehouseApproval {
            id: Uuid::new_v4(),
            approval_number: "WA-1".into(),
            quality_control_id: Uuid::new_v4(),
            purchase_order_id: Uuid::new_v4(),
            warehouse_id: Uuid::new_v4(),
            status: WarehouseApprovalStatus::Pending,
            priority: Priority::Medium,
            items: vec![
                item(ItemDecision::Accepted, 10),
                item(ItemDecision::Accepted, 0),
                item(ItemDecision::Rejected, 10),
            ],
            assigned_to: None,
            approved_by: None,
            events: Vec::new(),
            notes: None,
            created_by: "u-1".into(),
            created_at: now,
            updated_at: now,
            approved_at: None,
            version: 0,
        };
        assert!(approval.all_decided());
        assert_eq!(approval.accepted_items().count(), 1);
    }
}
