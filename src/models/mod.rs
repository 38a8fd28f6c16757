// Workflow records
pub mod inventory;
pub mod purchase_order;
pub mod quality_control;
pub mod warehouse_approval;

// Master data
pub mod master_data;

pub use inventory::*;
pub use master_data::*;
pub use purchase_order::*;
pub use quality_control::*;
pub use warehouse_approval::*;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

/// A stored record with an identity and an optimistic-concurrency version.
pub trait Entity: Clone + Send + Sync + 'static {
    /// Human readable entity name used in error messages
    const NAME: &'static str;

    fn id(&self) -> Uuid;
    fn version(&self) -> u64;
    fn set_version(&mut self, version: u64);
    fn created_at(&self) -> DateTime<Utc>;
    fn touch(&mut self, at: DateTime<Utc>);

    /// Key that at most one stored record may hold at a time. Repositories
    /// claim it atomically with the write that introduces it.
    fn unique_key(&self) -> Option<String> {
        None
    }
}

/// Hooks used by list filtering.
pub trait Listable: Entity {
    /// Status code compared against the `status` filter
    fn status_code(&self) -> Option<String> {
        None
    }

    /// Free text the `search` filter is matched against
    fn search_text(&self) -> Vec<&str>;
}

/// Priority of an inspection or approval task.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
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
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

/// What happened in a workflow event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventKind {
    Created,
    Assigned,
    Recorded,
    Submitted,
    Approved,
    Rejected,
}

/// Timestamped actor event on a QC or warehouse approval record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowEvent {
    pub kind: EventKind,
    pub actor: String,
    pub at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
}

impl WorkflowEvent {
    pub fn new(kind: EventKind, actor: &str, remarks: Option<String>) -> Self {
        Self {
            kind,
            actor: actor.to_string(),
            at: Utc::now(),
            remarks,
        }
    }
}

/// Generates a document number such as `PO-20240501-4F9A1C`.
pub fn document_number(prefix: &str, at: DateTime<Utc>) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..0x0100_0000);
    format!("{}-{}-{:06X}", prefix, at.format("%Y%m%d"), suffix)
}
