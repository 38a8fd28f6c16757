use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{consts, AuthUser},
    common::{ListParams, Page},
    errors::{FieldError, ServiceError},
    events::{Event, EventSender},
    models::{
        document_number, CreateWarehouseApproval, EventKind, Inventory, ItemDecision, QcStatus,
        StorageItem, UpdateStorageItem, Warehouse, WarehouseApproval, WarehouseApprovalStatus,
    },
    repositories::{ensure_version, Repository},
    services::quality_control::QualityControlService,
    validation::validate_form,
};

fn expect_status(
    approval: &WarehouseApproval,
    allowed: &[WarehouseApprovalStatus],
    doing: &str,
) -> Result<(), ServiceError> {
    if allowed.contains(&approval.status) {
        Ok(())
    } else {
        Err(ServiceError::InvalidStatus(format!(
            "cannot {} warehouse approval {} while it is {}",
            doing, approval.approval_number, approval.status
        )))
    }
}

/// Service for storage sign-off of inspected goods
#[derive(Clone)]
pub struct WarehouseApprovalService {
    approvals: Arc<dyn Repository<WarehouseApproval>>,
    inventory: Arc<dyn Repository<Inventory>>,
    warehouses: Arc<dyn Repository<Warehouse>>,
    inspections: QualityControlService,
    events: EventSender,
}

impl WarehouseApprovalService {
    pub fn new(
        approvals: Arc<dyn Repository<WarehouseApproval>>,
        inventory: Arc<dyn Repository<Inventory>>,
        warehouses: Arc<dyn Repository<Warehouse>>,
        inspections: QualityControlService,
        events: EventSender,
    ) -> Self {
        Self {
            approvals,
            inventory,
            warehouses,
            inspections,
            events,
        }
    }

    /// Opens a storage approval for the passed items of an approved inspection.
    #[instrument(
        skip(self, user, form),
        fields(user_id = %user.user_id, qc_id = %form.quality_control_id)
    )]
    pub async fn create(
        &self,
        user: &AuthUser,
        form: CreateWarehouseApproval,
    ) -> Result<WarehouseApproval, ServiceError> {
        user.require(consts::WAREHOUSE_APPROVAL_CREATE)?;
        validate_form(&form)?;

        let qc = self.inspections.find(form.quality_control_id).await?;
        if qc.status != QcStatus::Approved {
            return Err(ServiceError::InvalidStatus(format!(
                "quality control {} is {}; only approved inspections go to storage",
                qc.qc_number, qc.status
            )));
        }
        let items: Vec<StorageItem> = qc.passed_items().map(StorageItem::from_qc_item).collect();
        if items.is_empty() {
            return Err(ServiceError::InvalidOperation(format!(
                "quality control {} has no passed items to store",
                qc.qc_number
            )));
        }

        let warehouse = self.warehouses.find(form.warehouse_id).await?;
        if !warehouse.is_active {
            return Err(ServiceError::InvalidOperation(format!(
                "warehouse {} is inactive",
                warehouse.code
            )));
        }

        let now = Utc::now();
        let mut approval = WarehouseApproval {
            id: Uuid::new_v4(),
            approval_number: document_number("WA", now),
            quality_control_id: qc.id,
            purchase_order_id: qc.purchase_order_id,
            warehouse_id: warehouse.id,
            status: WarehouseApprovalStatus::Pending,
            priority: form.priority,
            items,
            assigned_to: form.assigned_to,
            approved_by: None,
            events: Vec::new(),
            notes: form.notes,
            created_by: user.user_id.clone(),
            created_at: now,
            updated_at: now,
            approved_at: None,
            version: 0,
        };
        approval.log(EventKind::Created, &user.user_id, None);

        // The inspection id is the approval's unique key
        let approval = self.approvals.insert(approval).await.map_err(|e| match e {
            ServiceError::Conflict(_) => ServiceError::Conflict(format!(
                "quality control {} already has a warehouse approval",
                qc.qc_number
            )),
            other => other,
        })?;
        info!(approval_id = %approval.id, warehouse = %warehouse.code, "warehouse approval opened");
        self.events.publish(
            Event::WarehouseApprovalCreated {
                warehouse_approval_id: approval.id,
                quality_control_id: approval.quality_control_id,
            },
            &user.user_id,
        );
        Ok(approval)
    }

    #[instrument(skip(self, user), fields(user_id = %user.user_id))]
    pub async fn get(&self, user: &AuthUser, id: Uuid) -> Result<WarehouseApproval, ServiceError> {
        user.require(consts::WAREHOUSE_APPROVAL_READ)?;
        self.approvals.find(id).await
    }

    #[instrument(skip(self, user), fields(user_id = %user.user_id))]
    pub async fn list(
        &self,
        user: &AuthUser,
        params: &ListParams,
        limit: u64,
    ) -> Result<Page<WarehouseApproval>, ServiceError> {
        user.require(consts::WAREHOUSE_APPROVAL_READ)?;
        params.apply(self.approvals.list().await?, limit)
    }

    /// Sets quantity, location and decision of one item. Editing a rejected
    /// approval reopens it.
    #[instrument(
        skip(self, user, form),
        fields(user_id = %user.user_id, decision = %form.decision)
    )]
    pub async fn update_item(
        &self,
        user: &AuthUser,
        id: Uuid,
        item_id: Uuid,
        form: UpdateStorageItem,
    ) -> Result<WarehouseApproval, ServiceError> {
        user.require(consts::WAREHOUSE_APPROVAL_UPDATE)?;
        validate_form(&form)?;

        let mut approval = self.approvals.find(id).await?;
        ensure_version(&approval, form.version)?;
        expect_status(
            &approval,
            &[
                WarehouseApprovalStatus::Pending,
                WarehouseApprovalStatus::Rejected,
            ],
            "edit",
        )?;

        let item = approval
            .item_mut(item_id)
            .ok_or_else(|| ServiceError::not_found("Warehouse approval item", item_id))?;

        let mut errors = Vec::new();
        if form.approved_quantity > item.passed_quantity {
            errors.push(FieldError::new(
                "approved_quantity",
                format!(
                    "Approved quantity cannot exceed the passed quantity {}",
                    item.passed_quantity
                ),
            ));
        }
        if form.decision == ItemDecision::Accepted {
            if form.approved_quantity == 0 {
                errors.push(FieldError::new(
                    "approved_quantity",
                    "Accepted items need a quantity",
                ));
            }
            if form.storage_location.is_none() && item.storage_location.is_none() {
                errors.push(FieldError::new(
                    "storage_location",
                    "Accepted items need a storage location",
                ));
            }
        }
        if !errors.is_empty() {
            return Err(ServiceError::FieldValidation(errors));
        }

        item.decision = form.decision;
        item.approved_quantity = match form.decision {
            ItemDecision::Rejected => 0,
            _ => form.approved_quantity,
        };
        if form.storage_location.is_some() {
            item.storage_location = form.storage_location;
        }
        item.remarks = form.remarks;

        approval.status = WarehouseApprovalStatus::Pending;
        let approval = self.approvals.update(approval).await?;
        info!(approval_id = %approval.id, %item_id, "storage item updated");
        Ok(approval)
    }

    #[instrument(skip(self, user), fields(user_id = %user.user_id))]
    pub async fn submit(
        &self,
        user: &AuthUser,
        id: Uuid,
        remarks: Option<String>,
        version: Option<u64>,
    ) -> Result<WarehouseApproval, ServiceError> {
        user.require(consts::WAREHOUSE_APPROVAL_UPDATE)?;
        let mut approval = self.approvals.find(id).await?;
        ensure_version(&approval, version)?;
        expect_status(&approval, &[WarehouseApprovalStatus::Pending], "submit")?;
        if !approval.all_decided() {
            return Err(ServiceError::InvalidOperation(
                "every item needs an accept or reject decision".to_string(),
            ));
        }

        approval.status = WarehouseApprovalStatus::Submitted;
        approval.log(EventKind::Submitted, &user.user_id, remarks);
        let approval = self.approvals.update(approval).await?;

        info!(approval_id = %approval.id, "warehouse approval submitted");
        self.events.publish(
            Event::WarehouseApprovalSubmitted {
                warehouse_approval_id: approval.id,
            },
            &user.user_id,
        );
        Ok(approval)
    }

    /// Approves storage and creates one inventory record per accepted item.
    #[instrument(skip(self, user), fields(user_id = %user.user_id))]
    pub async fn approve(
        &self,
        user: &AuthUser,
        id: Uuid,
        remarks: Option<String>,
        version: Option<u64>,
    ) -> Result<(WarehouseApproval, Vec<Inventory>), ServiceError> {
        user.require(consts::WAREHOUSE_APPROVAL_APPROVE)?;
        let mut approval = self.approvals.find(id).await?;
        ensure_version(&approval, version)?;
        expect_status(&approval, &[WarehouseApprovalStatus::Submitted], "approve")?;

        let now = Utc::now();
        approval.status = WarehouseApprovalStatus::Approved;
        approval.approved_by = Some(user.user_id.clone());
        approval.approved_at = Some(now);
        approval.log(EventKind::Approved, &user.user_id, remarks);
        // Stored first so a concurrent approve loses on the version check
        // before any stock exists.
        let approval = self.approvals.update(approval).await?;

        let mut created = Vec::new();
        for item in approval.accepted_items() {
            let stock = Inventory::from_storage_item(&approval, item);
            created.push(self.inventory.insert(stock).await?);
        }

        info!(
            approval_id = %approval.id,
            inventory_records = created.len(),
            "warehouse approval approved"
        );
        self.events.publish(
            Event::WarehouseApprovalApproved {
                warehouse_approval_id: approval.id,
                inventory_ids: created.iter().map(|i| i.id).collect(),
            },
            &user.user_id,
        );
        Ok((approval, created))
    }

    #[instrument(skip(self, user), fields(user_id = %user.user_id))]
    pub async fn reject(
        &self,
        user: &AuthUser,
        id: Uuid,
        remarks: Option<String>,
        version: Option<u64>,
    ) -> Result<WarehouseApproval, ServiceError> {
        user.require(consts::WAREHOUSE_APPROVAL_APPROVE)?;
        let mut approval = self.approvals.find(id).await?;
        ensure_version(&approval, version)?;
        expect_status(&approval, &[WarehouseApprovalStatus::Submitted], "reject")?;

        approval.status = WarehouseApprovalStatus::Rejected;
        approval.log(EventKind::Rejected, &user.user_id, remarks);
        let approval = self.approvals.update(approval).await?;

        warn!(approval_id = %approval.id, "warehouse approval rejected");
        self.events.publish(
            Event::WarehouseApprovalRejected {
                warehouse_approval_id: approval.id,
            },
            &user.user_id,
        );
        Ok(approval)
    }
}
