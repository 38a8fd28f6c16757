use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;
use validator::Validate;

use super::{Entity, EventKind, Listable, Priority, ProductLine, WorkflowEvent};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum QcStatus {
    Pending,
    InProgress,
    Submitted,
    Approved,
    Rejected,
}

/// Inspection outcome of a single item.
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
pub enum InspectionResult {
    #[default]
    Pending,
    Passed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QcItem {
    pub id: Uuid,
    pub line_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub batch_number: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    pub received_quantity: i64,
    pub sample_size: i64,
    pub result: InspectionResult,
    pub remarks: Option<String>,
}

impl QcItem {
    pub fn from_line(line: &ProductLine) -> Self {
        Self {
            id: Uuid::new_v4(),
            line_id: line.id,
            product_id: line.product_id,
            product_name: line.product_name.clone(),
            batch_number: line.batch_number.clone(),
            expiry_date: line.expiry_date,
            received_quantity: line.received_quantity,
            sample_size: 0,
            result: InspectionResult::Pending,
            remarks: None,
        }
    }
}

/// Quality-control inspection of the goods received on one purchase order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityControl {
    pub id: Uuid,
    pub qc_number: String,
    pub purchase_order_id: Uuid,
    pub po_number: String,
    pub status: QcStatus,
    pub priority: Priority,
    pub items: Vec<QcItem>,
    pub assigned_to: Option<String>,
    pub approved_by: Option<String>,
    pub events: Vec<WorkflowEvent>,
    pub notes: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub approved_at: Option<DateTime<Utc>>,
    pub version: u64,
}

impl QualityControl {
    pub fn item(&self, item_id: Uuid) -> Option<&QcItem> {
        self.items.iter().find(|i| i.id == item_id)
    }

    pub fn item_mut(&mut self, item_id: Uuid) -> Option<&mut QcItem> {
        self.items.iter_mut().find(|i| i.id == item_id)
    }

    pub fn all_inspected(&self) -> bool {
        self.items
            .iter()
            .all(|i| i.result != InspectionResult::Pending)
    }

    pub fn passed_items(&self) -> impl Iterator<Item = &QcItem> {
        self.items
            .iter()
            .filter(|i| i.result == InspectionResult::Passed)
    }

    pub fn any_passed(&self) -> bool {
        self.passed_items().next().is_some()
    }

    /// Records an event and bumps `updated_at`.
    pub fn log(&mut self, kind: EventKind, actor: &str, remarks: Option<String>) {
        let event = WorkflowEvent::new(kind, actor, remarks);
        self.updated_at = event.at;
        self.events.push(event);
    }
}

impl Entity for QualityControl {
    const NAME: &'static str = "Quality control";

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

impl Listable for QualityControl {
    fn status_code(&self) -> Option<String> {
        Some(self.status.to_string())
    }

    fn search_text(&self) -> Vec<&str> {
        let mut text = vec![self.qc_number.as_str(), self.po_number.as_str()];
        text.extend(self.items.iter().map(|i| i.product_name.as_str()));
        text.extend(self.items.iter().filter_map(|i| i.batch_number.as_deref()));
        text
    }
}

/// Opens an inspection for a received purchase order.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateQualityControl {
    pub purchase_order_id: Uuid,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    #[validate(length(min = 1, max = 100))]
    pub assigned_to: Option<String>,
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    #[serde(default)]
    pub version: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AssignInspector {
    #[validate(length(min = 1, max = 100, message = "Assignee is required"))]
    pub assigned_to: String,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub version: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RecordInspection {
    pub result: InspectionResult,
    #[validate(range(min = 0, message = "Sample size cannot be negative"))]
    #[serde(default)]
    pub sample_size: i64,
    #[serde(default)]
    #[validate(length(max = 1000))]
    pub remarks: Option<String>,
    #[serde(default)]
    pub version: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(result: InspectionResult) -> QcItem {
        QcItem {
            id: Uuid::new_v4(),
            line_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            product_name: "Paracetamol 650".into(),
            batch_number: Some("B-77".into()),
            expiry_date: None,
            received_quantity: 40,
            sample_size: 2,
            result,
            remarks: None,
        }
    }

    fn qc(items: Vec<QcItem>) -> QualityControl {
        let now = Utc::now();
        QualityControl {
            id: Uuid::new_v4(),
            qc_number: "QC-1".into(),
            purchase_order_id: Uuid::new_v4(),
            po_number: "PO-1".into(),
            status: QcStatus::InProgress,
            priority: Priority::High,
            items,
            assigned_to: None,
            approved_by: None,
            events: Vec::new(),
            notes: None,
            created_by: "u-1".into(),
            created_at: now,
            updated_at: now,
            submitted_at: None,
            approved_at: None,
            version: 0,
        }
    }

    #[test]
    fn inspection_completeness_and_outcome() {
        let mut record = qc(vec![
            item(InspectionResult::Passed),
            item(InspectionResult::Pending),
        ]);
        assert!(!record.all_inspected());
        assert!(record.any_passed());

        record.items[1].result = InspectionResult::Failed;
        assert!(record.all_inspected());
        assert_eq!(record.passed_items().count(), 1);
    }

    #[test]
    fn search_covers_batch_numbers() {
        let record = qc(vec![item(InspectionResult::Pending)]);
        assert!(record.search_text().contains(&"B-77"));
    }

    #[test]
    fn status_codes() {
        assert_eq!(QcStatus::InProgress.to_string(), "in_progress");
        assert_eq!("SUBMITTED".parse::<QcStatus>().unwrap(), QcStatus::Submitted);
    }
}
