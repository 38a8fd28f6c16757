use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{consts, AuthUser},
    common::{ListParams, Page},
    errors::ServiceError,
    events::{Event, EventSender},
    export::to_csv,
    models::{
        document_number, AssignInspector, CreateQualityControl, EventKind, QcItem, QcStatus,
        QualityControl, RecordInspection,
    },
    repositories::{ensure_version, Repository},
    services::purchase_orders::PurchaseOrderService,
    validation::validate_form,
    workflow::{authorize_transition, Action},
};

fn expect_status(
    qc: &QualityControl,
    allowed: &[QcStatus],
    doing: &str,
) -> Result<(), ServiceError> {
    if allowed.contains(&qc.status) {
        Ok(())
    } else {
        Err(ServiceError::InvalidStatus(format!(
            "cannot {} quality control {} while it is {}",
            doing, qc.qc_number, qc.status
        )))
    }
}

/// Service for quality-control inspections
#[derive(Clone)]
pub struct QualityControlService {
    inspections: Arc<dyn Repository<QualityControl>>,
    orders: PurchaseOrderService,
    events: EventSender,
}

impl QualityControlService {
    pub fn new(
        inspections: Arc<dyn Repository<QualityControl>>,
        orders: PurchaseOrderService,
        events: EventSender,
    ) -> Self {
        Self {
            inspections,
            orders,
            events,
        }
    }

    /// Opens an inspection for a `RECEIVED` order and moves the order to `QC_PENDING`.
    #[instrument(
        skip(self, user, form),
        fields(user_id = %user.user_id, po_id = %form.purchase_order_id)
    )]
    pub async fn create(
        &self,
        user: &AuthUser,
        form: CreateQualityControl,
    ) -> Result<QualityControl, ServiceError> {
        user.require(consts::QUALITY_CONTROL_CREATE)?;
        validate_form(&form)?;

        let order = self.orders.find(form.purchase_order_id).await?;
        ensure_version(&order, form.version)?;
        let items: Vec<QcItem> = order
            .lines
            .iter()
            .filter(|l| l.received_quantity > 0)
            .map(QcItem::from_line)
            .collect();
        let order = self
            .orders
            .advance(order, Action::SendToQc, user, form.notes.clone())
            .await?;

        let now = Utc::now();
        let mut qc = QualityControl {
            id: Uuid::new_v4(),
            qc_number: document_number("QC", now),
            purchase_order_id: order.id,
            po_number: order.po_number.clone(),
            status: QcStatus::Pending,
            priority: form.priority,
            items,
            assigned_to: None,
            approved_by: None,
            events: Vec::new(),
            notes: form.notes,
            created_by: user.user_id.clone(),
            created_at: now,
            updated_at: now,
            submitted_at: None,
            approved_at: None,
            version: 0,
        };
        qc.log(EventKind::Created, &user.user_id, None);
        if let Some(assignee) = form.assigned_to {
            qc.status = QcStatus::InProgress;
            qc.log(EventKind::Assigned, &user.user_id, Some(assignee.clone()));
            qc.assigned_to = Some(assignee);
        }

        let qc = self.inspections.insert(qc).await?;
        info!(
            qc_id = %qc.id,
            qc_number = %qc.qc_number,
            items = qc.items.len(),
            "quality control opened"
        );
        self.events.publish(
            Event::QualityControlCreated {
                quality_control_id: qc.id,
                purchase_order_id: qc.purchase_order_id,
            },
            &user.user_id,
        );
        Ok(qc)
    }

    #[instrument(skip(self, user), fields(user_id = %user.user_id))]
    pub async fn get(&self, user: &AuthUser, id: Uuid) -> Result<QualityControl, ServiceError> {
        user.require(consts::QUALITY_CONTROL_READ)?;
        self.inspections.find(id).await
    }

    #[instrument(skip(self, user), fields(user_id = %user.user_id))]
    pub async fn list(
        &self,
        user: &AuthUser,
        params: &ListParams,
        limit: u64,
    ) -> Result<Page<QualityControl>, ServiceError> {
        user.require(consts::QUALITY_CONTROL_READ)?;
        params.apply(self.inspections.list().await?, limit)
    }

    #[instrument(skip(self, user, form), fields(user_id = %user.user_id))]
    pub async fn assign(
        &self,
        user: &AuthUser,
        id: Uuid,
        form: AssignInspector,
    ) -> Result<QualityControl, ServiceError> {
        user.require(consts::QUALITY_CONTROL_ASSIGN)?;
        validate_form(&form)?;

        let mut qc = self.inspections.find(id).await?;
        ensure_version(&qc, form.version)?;
        expect_status(
            &qc,
            &[QcStatus::Pending, QcStatus::InProgress, QcStatus::Rejected],
            "assign",
        )?;

        qc.assigned_to = Some(form.assigned_to.clone());
        if let Some(priority) = form.priority {
            qc.priority = priority;
        }
        if qc.status == QcStatus::Pending {
            qc.status = QcStatus::InProgress;
        }
        qc.log(EventKind::Assigned, &user.user_id, Some(form.assigned_to.clone()));
        let qc = self.inspections.update(qc).await?;

        info!(qc_id = %qc.id, assigned_to = %form.assigned_to, "inspector assigned");
        self.events.publish(
            Event::QualityControlAssigned {
                quality_control_id: qc.id,
                assigned_to: form.assigned_to,
            },
            &user.user_id,
        );
        Ok(qc)
    }

    /// Records the outcome for one item. A rejected inspection goes back to
    /// `in_progress` when results are re-recorded.
    #[instrument(skip(self, user, form), fields(user_id = %user.user_id, result = %form.result))]
    pub async fn record_item_result(
        &self,
        user: &AuthUser,
        id: Uuid,
        item_id: Uuid,
        form: RecordInspection,
    ) -> Result<QualityControl, ServiceError> {
        user.require(consts::QUALITY_CONTROL_UPDATE)?;
        validate_form(&form)?;

        let mut qc = self.inspections.find(id).await?;
        ensure_version(&qc, form.version)?;
        expect_status(
            &qc,
            &[QcStatus::Pending, QcStatus::InProgress, QcStatus::Rejected],
            "record results on",
        )?;
        if let Some(assignee) = qc.assigned_to.as_deref() {
            if assignee != user.user_id && !user.has_permission(consts::QUALITY_CONTROL_ASSIGN) {
                return Err(ServiceError::Forbidden(format!(
                    "quality control {} is assigned to {}",
                    qc.qc_number, assignee
                )));
            }
        }

        let qc_number = qc.qc_number.clone();
        let item = qc
            .item_mut(item_id)
            .ok_or_else(|| ServiceError::not_found("Quality control item", item_id))?;
        if form.sample_size > item.received_quantity {
            return Err(ServiceError::FieldValidation(vec![crate::errors::FieldError::new(
                "sample_size",
                format!(
                    "Sample size cannot exceed the received quantity {}",
                    item.received_quantity
                ),
            )]));
        }
        item.result = form.result;
        item.sample_size = form.sample_size;
        item.remarks = form.remarks;
        let product = item.product_name.clone();

        qc.status = QcStatus::InProgress;
        qc.log(
            EventKind::Recorded,
            &user.user_id,
            Some(format!("{}: {}", product, form.result)),
        );
        let qc = self.inspections.update(qc).await?;
        info!(qc_number = %qc_number, %item_id, "inspection result recorded");
        Ok(qc)
    }

    #[instrument(skip(self, user), fields(user_id = %user.user_id))]
    pub async fn submit(
        &self,
        user: &AuthUser,
        id: Uuid,
        remarks: Option<String>,
        version: Option<u64>,
    ) -> Result<QualityControl, ServiceError> {
        user.require(consts::QUALITY_CONTROL_UPDATE)?;
        let mut qc = self.inspections.find(id).await?;
        ensure_version(&qc, version)?;
        expect_status(&qc, &[QcStatus::Pending, QcStatus::InProgress], "submit")?;
        if !qc.all_inspected() {
            let pending: Vec<&str> = qc
                .items
                .iter()
                .filter(|i| i.result == crate::models::InspectionResult::Pending)
                .map(|i| i.product_name.as_str())
                .collect();
            return Err(ServiceError::InvalidOperation(format!(
                "items still awaiting inspection: {}",
                pending.join(", ")
            )));
        }

        let now = Utc::now();
        qc.status = QcStatus::Submitted;
        qc.submitted_at = Some(now);
        qc.log(EventKind::Submitted, &user.user_id, remarks);
        let qc = self.inspections.update(qc).await?;

        info!(qc_id = %qc.id, "quality control submitted");
        self.events.publish(
            Event::QualityControlSubmitted {
                quality_control_id: qc.id,
            },
            &user.user_id,
        );
        Ok(qc)
    }

    /// Approves a submitted inspection. The order moves to `QC_PASSED` when at
    /// least one item passed, and only the passed items go on to warehouse
    /// approval; with no passing item it moves to `QC_FAILED`.
    #[instrument(skip(self, user), fields(user_id = %user.user_id))]
    pub async fn approve(
        &self,
        user: &AuthUser,
        id: Uuid,
        remarks: Option<String>,
        version: Option<u64>,
    ) -> Result<QualityControl, ServiceError> {
        user.require(consts::QUALITY_CONTROL_APPROVE)?;
        let mut qc = self.inspections.find(id).await?;
        ensure_version(&qc, version)?;
        expect_status(&qc, &[QcStatus::Submitted], "approve")?;

        let passed = qc.any_passed();
        let action = if passed { Action::PassQc } else { Action::FailQc };
        let order = self.orders.find(qc.purchase_order_id).await?;
        authorize_transition(order.status, action, user)?;

        // The inspection is written first; a concurrent change to it fails
        // here and leaves the order in QC_PENDING.
        let submitted = qc.clone();
        qc.status = QcStatus::Approved;
        qc.approved_by = Some(user.user_id.clone());
        qc.approved_at = Some(Utc::now());
        qc.log(EventKind::Approved, &user.user_id, remarks.clone());
        let qc = self.inspections.update(qc).await?;

        if let Err(e) = self.orders.advance(order, action, user, remarks).await {
            warn!(qc_id = %qc.id, error = %e, "order did not advance; reopening quality control");
            let mut reopened = submitted;
            reopened.version = qc.version;
            if let Err(undo) = self.inspections.update(reopened).await {
                error!(qc_id = %qc.id, error = %undo, "could not reopen quality control");
            }
            return Err(e);
        }

        if passed {
            info!(qc_id = %qc.id, "quality control approved");
        } else {
            warn!(qc_id = %qc.id, "quality control approved with no passing items");
        }
        self.events.publish(
            Event::QualityControlApproved {
                quality_control_id: qc.id,
                purchase_order_id: qc.purchase_order_id,
                passed,
            },
            &user.user_id,
        );
        Ok(qc)
    }

    /// Sends a submitted inspection back to the inspector.
    #[instrument(skip(self, user), fields(user_id = %user.user_id))]
    pub async fn reject(
        &self,
        user: &AuthUser,
        id: Uuid,
        remarks: Option<String>,
        version: Option<u64>,
    ) -> Result<QualityControl, ServiceError> {
        user.require(consts::QUALITY_CONTROL_APPROVE)?;
        let mut qc = self.inspections.find(id).await?;
        ensure_version(&qc, version)?;
        expect_status(&qc, &[QcStatus::Submitted], "reject")?;

        qc.status = QcStatus::Rejected;
        qc.submitted_at = None;
        qc.log(EventKind::Rejected, &user.user_id, remarks);
        let qc = self.inspections.update(qc).await?;

        warn!(qc_id = %qc.id, "quality control rejected");
        self.events.publish(
            Event::QualityControlRejected {
                quality_control_id: qc.id,
            },
            &user.user_id,
        );
        Ok(qc)
    }

    pub(crate) async fn find(&self, id: Uuid) -> Result<QualityControl, ServiceError> {
        self.inspections.find(id).await
    }

    #[instrument(skip(self, user), fields(user_id = %user.user_id))]
    pub async fn export_csv(
        &self,
        user: &AuthUser,
        params: &ListParams,
    ) -> Result<String, ServiceError> {
        user.require(consts::QUALITY_CONTROL_READ)?;
        let all = self.inspections.list().await?;
        let limit = all.len().max(1) as u64;
        let page = ListParams {
            page: Some(1),
            ..params.clone()
        }
        .apply(all, limit)?;
        to_csv(&page.items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{
            purchase_order::fixtures, InspectionResult, ReceiptForm, ReceiptLine,
            TransitionRequest,
        },
        repositories::InMemoryRepository,
        workflow::Stage,
    };
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Inspection store where a reviewer rejects the inspection just before
    /// the first approval is written.
    struct RejectedMeanwhile {
        inner: InMemoryRepository<QualityControl>,
        fired: AtomicBool,
    }

    #[async_trait]
    impl Repository<QualityControl> for RejectedMeanwhile {
        async fn get(&self, id: Uuid) -> Result<Option<QualityControl>, ServiceError> {
            self.inner.get(id).await
        }

        async fn list(&self) -> Result<Vec<QualityControl>, ServiceError> {
            self.inner.list().await
        }

        async fn insert(&self, record: QualityControl) -> Result<QualityControl, ServiceError> {
            self.inner.insert(record).await
        }

        async fn update(&self, record: QualityControl) -> Result<QualityControl, ServiceError> {
            if record.status == QcStatus::Approved && !self.fired.swap(true, Ordering::SeqCst) {
                let mut rejected = self.inner.find(record.id).await?;
                rejected.status = QcStatus::Rejected;
                self.inner.update(rejected).await?;
            }
            self.inner.update(record).await
        }

        async fn delete(
            &self,
            id: Uuid,
            expected_version: Option<u64>,
        ) -> Result<(), ServiceError> {
            self.inner.delete(id, expected_version).await
        }
    }

    fn admin() -> AuthUser {
        AuthUser::new("admin-1", vec!["admin".into()], vec![])
    }

    fn passed() -> RecordInspection {
        RecordInspection {
            result: InspectionResult::Passed,
            sample_size: 5,
            remarks: None,
            version: None,
        }
    }

    /// A received reference order with a submitted, fully passed inspection.
    async fn submitted(
        inspections: Arc<dyn Repository<QualityControl>>,
    ) -> (QualityControlService, PurchaseOrderService, QualityControl) {
        let (events, _rx) = EventSender::channel(64);
        let orders = PurchaseOrderService::new(
            Arc::new(InMemoryRepository::new()),
            events.clone(),
            dec!(12),
        );
        let svc = QualityControlService::new(inspections, orders.clone(), events);
        let user = admin();

        let mut order = orders.create(&user, fixtures::order_form()).await.unwrap();
        for action in [Action::Approve, Action::Approve, Action::Approve, Action::PlaceOrder] {
            let request = TransitionRequest {
                action,
                remarks: None,
                version: None,
            };
            order = orders.transition(&user, order.id, request).await.unwrap();
        }
        let receipt = ReceiptForm {
            lines: vec![ReceiptLine {
                line_id: order.lines[0].id,
                quantity: 100,
                batch_number: Some("B-7".into()),
                expiry_date: None,
            }],
            remarks: None,
            version: None,
        };
        let order = orders.record_receipt(&user, order.id, receipt).await.unwrap();
        assert_eq!(order.status, Stage::Received);

        let form = CreateQualityControl {
            purchase_order_id: order.id,
            priority: Default::default(),
            assigned_to: None,
            notes: None,
            version: None,
        };
        let qc = svc.create(&user, form).await.unwrap();
        svc.record_item_result(&user, qc.id, qc.items[0].id, passed())
            .await
            .unwrap();
        let qc = svc.submit(&user, qc.id, None, None).await.unwrap();
        (svc, orders, qc)
    }

    #[tokio::test]
    async fn approval_moves_order_to_passed() {
        let (svc, orders, qc) = submitted(Arc::new(InMemoryRepository::new())).await;
        let user = admin();

        let approved = svc.approve(&user, qc.id, None, None).await.unwrap();
        assert_eq!(approved.status, QcStatus::Approved);
        let order = orders.get(&user, qc.purchase_order_id).await.unwrap();
        assert_eq!(order.status, Stage::QcPassed);
    }

    #[tokio::test]
    async fn approval_that_loses_to_a_rejection_leaves_order_pending() {
        let inspections = Arc::new(RejectedMeanwhile {
            inner: InMemoryRepository::new(),
            fired: AtomicBool::new(false),
        });
        let (svc, orders, qc) = submitted(inspections).await;
        let user = admin();

        assert_matches!(
            svc.approve(&user, qc.id, None, None).await,
            Err(ServiceError::ConcurrentModification(_))
        );
        let order = orders.get(&user, qc.purchase_order_id).await.unwrap();
        assert_eq!(order.status, Stage::QcPending);
        assert_eq!(svc.get(&user, qc.id).await.unwrap().status, QcStatus::Rejected);

        // The rejected inspection can still be redone and approved
        svc.record_item_result(&user, qc.id, qc.items[0].id, passed())
            .await
            .unwrap();
        svc.submit(&user, qc.id, None, None).await.unwrap();
        svc.approve(&user, qc.id, None, None).await.unwrap();
        let order = orders.get(&user, qc.purchase_order_id).await.unwrap();
        assert_eq!(order.status, Stage::QcPassed);
    }
}
