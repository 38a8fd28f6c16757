use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{consts, AuthUser},
    common::{ListParams, Page},
    errors::ServiceError,
    events::{Event, EventSender},
    export::{to_csv, PricedOrder},
    models::{
        document_number, PurchaseOrder, PurchaseOrderForm, ReceiptForm, TotalsPreview,
        TransitionRequest,
    },
    pricing::{calculate_totals, LineInput, OrderTotals, TaxSpec},
    repositories::{ensure_version, Repository},
    validation::{validate_preview, validate_purchase_order, validate_receipt},
    workflow::{authorize_transition, available_actions, Action, Stage},
};

/// Actions in `stage` the caller may perform, as served to clients.
#[derive(Debug, Clone, Serialize)]
pub struct AvailableActions {
    pub purchase_order_id: Uuid,
    pub stage: Stage,
    pub version: u64,
    pub actions: Vec<Action>,
}

/// Where an action with side effects beyond the stage change is performed.
fn dedicated_endpoint(action: Action) -> Option<&'static str> {
    match action {
        Action::Receive | Action::ReceivePartial => Some("POST /purchase-orders/:id/receipts"),
        Action::SendToQc => Some("POST /quality-controls"),
        Action::PassQc | Action::FailQc => Some("POST /quality-controls/:id/approve"),
        _ => None,
    }
}

/// Service for the purchase order lifecycle
#[derive(Clone)]
pub struct PurchaseOrderService {
    orders: Arc<dyn Repository<PurchaseOrder>>,
    events: EventSender,
    default_gst_rate: Decimal,
    currency: String,
}

impl PurchaseOrderService {
    pub fn new(
        orders: Arc<dyn Repository<PurchaseOrder>>,
        events: EventSender,
        default_gst_rate: Decimal,
    ) -> Self {
        Self {
            orders,
            events,
            default_gst_rate,
            currency: "INR".to_string(),
        }
    }

    /// Currency code printed on exported documents
    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    /// Creates a purchase order in `DRAFT`
    #[instrument(skip(self, user, form), fields(user_id = %user.user_id))]
    pub async fn create(
        &self,
        user: &AuthUser,
        form: PurchaseOrderForm,
    ) -> Result<PurchaseOrder, ServiceError> {
        user.require(consts::PURCHASE_ORDERS_CREATE)?;
        validate_purchase_order(&form)?;

        let po_number = document_number("PO", chrono::Utc::now());
        let order = PurchaseOrder::draft(&form, po_number, self.default_gst_rate, &user.user_id);
        let order = self.orders.insert(order).await?;

        info!(
            po_id = %order.id,
            po_number = %order.po_number,
            grand_total = %order.totals.grand_total,
            "purchase order created"
        );
        self.events.publish(
            Event::PurchaseOrderCreated {
                purchase_order_id: order.id,
                po_number: order.po_number.clone(),
            },
            &user.user_id,
        );
        Ok(order)
    }

    #[instrument(skip(self, user), fields(user_id = %user.user_id))]
    pub async fn get(&self, user: &AuthUser, id: Uuid) -> Result<PurchaseOrder, ServiceError> {
        user.require(consts::PURCHASE_ORDERS_READ)?;
        self.orders.find(id).await
    }

    #[instrument(skip(self, user), fields(user_id = %user.user_id))]
    pub async fn list(
        &self,
        user: &AuthUser,
        params: &ListParams,
        limit: u64,
    ) -> Result<Page<PurchaseOrder>, ServiceError> {
        user.require(consts::PURCHASE_ORDERS_READ)?;
        params.apply(self.orders.list().await?, limit)
    }

    /// Replaces header and lines of a draft
    #[instrument(skip(self, user, form), fields(user_id = %user.user_id))]
    pub async fn update(
        &self,
        user: &AuthUser,
        id: Uuid,
        form: PurchaseOrderForm,
        version: Option<u64>,
    ) -> Result<PurchaseOrder, ServiceError> {
        user.require(consts::PURCHASE_ORDERS_UPDATE)?;
        let mut order = self.orders.find(id).await?;
        ensure_version(&order, version)?;
        if !order.status.is_editable() {
            return Err(ServiceError::InvalidStatus(format!(
                "purchase order {} is {} and can no longer be edited",
                order.po_number, order.status
            )));
        }
        validate_purchase_order(&form)?;

        order.apply_form(&form);
        let order = self.orders.update(order).await?;

        info!(po_id = %order.id, version = order.version, "purchase order updated");
        self.events.publish(
            Event::PurchaseOrderUpdated {
                purchase_order_id: order.id,
            },
            &user.user_id,
        );
        Ok(order)
    }

    /// Deletes a draft or cancelled order
    #[instrument(skip(self, user), fields(user_id = %user.user_id))]
    pub async fn delete(
        &self,
        user: &AuthUser,
        id: Uuid,
        version: Option<u64>,
    ) -> Result<(), ServiceError> {
        user.require(consts::PURCHASE_ORDERS_DELETE)?;
        let order = self.orders.find(id).await?;
        ensure_version(&order, version)?;
        if !matches!(order.status, Stage::Draft | Stage::Cancelled) {
            return Err(ServiceError::InvalidStatus(format!(
                "purchase order {} is {}; only DRAFT or CANCELLED orders can be deleted",
                order.po_number, order.status
            )));
        }

        self.orders.delete(id, Some(order.version)).await?;
        info!(po_id = %id, "purchase order deleted");
        self.events.publish(
            Event::PurchaseOrderDeleted {
                purchase_order_id: id,
            },
            &user.user_id,
        );
        Ok(())
    }

    /// Applies a workflow action requested by a client.
    #[instrument(
        skip(self, user, request),
        fields(user_id = %user.user_id, action = %request.action)
    )]
    pub async fn transition(
        &self,
        user: &AuthUser,
        id: Uuid,
        request: TransitionRequest,
    ) -> Result<PurchaseOrder, ServiceError> {
        let order = self.orders.find(id).await?;
        ensure_version(&order, request.version)?;
        authorize_transition(order.status, request.action, user)?;

        if let Some(endpoint) = dedicated_endpoint(request.action) {
            return Err(ServiceError::InvalidOperation(format!(
                "action '{}' is performed through {}",
                request.action, endpoint
            )));
        }

        self.advance(order, request.action, user, request.remarks)
            .await
    }

    /// Moves `order` through `action` and stores it.
    ///
    /// The table and the caller's permission are checked here, so every path
    /// that changes a stage goes through the same gate.
    pub(crate) async fn advance(
        &self,
        mut order: PurchaseOrder,
        action: Action,
        user: &AuthUser,
        remarks: Option<String>,
    ) -> Result<PurchaseOrder, ServiceError> {
        let from = order.status;
        let to = authorize_transition(from, action, user).map_err(|e| {
            warn!(po_id = %order.id, stage = %from, %action, error = %e, "transition refused");
            e
        })?;

        order.set_stage(to, Some(action), &user.user_id, remarks);
        let order = self.orders.update(order).await?;

        info!(po_id = %order.id, %from, %to, %action, "purchase order stage changed");
        self.events.publish(
            Event::PurchaseOrderStageChanged {
                purchase_order_id: order.id,
                from,
                to,
                action,
            },
            &user.user_id,
        );
        Ok(order)
    }

    pub(crate) async fn find(&self, id: Uuid) -> Result<PurchaseOrder, ServiceError> {
        self.orders.find(id).await
    }

    #[instrument(skip(self, user), fields(user_id = %user.user_id))]
    pub async fn available_actions(
        &self,
        user: &AuthUser,
        id: Uuid,
    ) -> Result<AvailableActions, ServiceError> {
        user.require(consts::PURCHASE_ORDERS_READ)?;
        let order = self.orders.find(id).await?;
        Ok(AvailableActions {
            purchase_order_id: order.id,
            stage: order.status,
            version: order.version,
            actions: available_actions(order.status, user),
        })
    }

    /// Records received quantities and moves the order to
    /// `PARTIAL_RECEIVED` or `RECEIVED` depending on what is still outstanding.
    #[instrument(skip(self, user, form), fields(user_id = %user.user_id))]
    pub async fn record_receipt(
        &self,
        user: &AuthUser,
        id: Uuid,
        form: ReceiptForm,
    ) -> Result<PurchaseOrder, ServiceError> {
        let mut order = self.orders.find(id).await?;
        ensure_version(&order, form.version)?;
        // Checked against the partial action first so an order in the wrong
        // stage reports the table error before any quantity problem.
        authorize_transition(order.status, Action::ReceivePartial, user)?;
        validate_receipt(&order, &form)?;

        let mut quantity = 0;
        for receipt in &form.lines {
            if let Some(line) = order.lines.iter_mut().find(|l| l.id == receipt.line_id) {
                line.received_quantity += receipt.quantity;
                if receipt.batch_number.is_some() {
                    line.batch_number = receipt.batch_number.clone();
                }
                if receipt.expiry_date.is_some() {
                    line.expiry_date = receipt.expiry_date;
                }
                quantity += receipt.quantity;
            }
        }

        let fully_received = order.is_fully_received();
        let action = if fully_received {
            Action::Receive
        } else {
            Action::ReceivePartial
        };
        let order = self.advance(order, action, user, form.remarks).await?;

        info!(po_id = %order.id, quantity, fully_received, "goods received");
        self.events.publish(
            Event::GoodsReceived {
                purchase_order_id: order.id,
                quantity,
                fully_received,
            },
            &user.user_id,
        );
        Ok(order)
    }

    /// Prices lines without storing anything.
    pub fn preview_totals(
        &self,
        user: &AuthUser,
        preview: &TotalsPreview,
    ) -> Result<OrderTotals, ServiceError> {
        user.require_any(&[consts::PURCHASE_ORDERS_CREATE, consts::PURCHASE_ORDERS_UPDATE])?;
        validate_preview(preview)?;

        let inputs: Vec<LineInput> = preview.lines.iter().map(|l| l.pricing()).collect();
        let tax = TaxSpec {
            tax_type: preview.tax_type,
            rate: preview.gst_rate.unwrap_or(self.default_gst_rate),
        };
        Ok(calculate_totals(
            &inputs,
            preview.discount.as_ref(),
            &tax,
            preview.shipping.as_ref(),
        ))
    }

    /// Filtered list as CSV; pagination is ignored.
    #[instrument(skip(self, user), fields(user_id = %user.user_id))]
    pub async fn export_csv(
        &self,
        user: &AuthUser,
        params: &ListParams,
    ) -> Result<String, ServiceError> {
        user.require(consts::PURCHASE_ORDERS_EXPORT)?;
        let all = self.orders.list().await?;
        let limit = all.len().max(1) as u64;
        let page = ListParams {
            page: Some(1),
            ..params.clone()
        }
        .apply(all, limit)?;
        let rows: Vec<PricedOrder<'_>> = page
            .items
            .iter()
            .map(|order| PricedOrder {
                order,
                currency: &self.currency,
            })
            .collect();
        to_csv(&rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{purchase_order::fixtures, ReceiptLine},
        repositories::InMemoryRepository,
    };
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    fn service() -> PurchaseOrderService {
        let (events, _rx) = EventSender::channel(64);
        PurchaseOrderService::new(Arc::new(InMemoryRepository::new()), events, dec!(12))
    }

    fn manager() -> AuthUser {
        AuthUser::new("mgr", vec!["purchase_manager".into()], vec![])
    }

    fn request(action: Action) -> TransitionRequest {
        TransitionRequest {
            action,
            remarks: None,
            version: None,
        }
    }

    async fn ordered(svc: &PurchaseOrderService, user: &AuthUser) -> PurchaseOrder {
        let order = svc.create(user, fixtures::order_form()).await.unwrap();
        let mut order = order;
        for action in [Action::Approve, Action::Approve, Action::Approve, Action::PlaceOrder] {
            order = svc.transition(user, order.id, request(action)).await.unwrap();
        }
        assert_eq!(order.status, Stage::Ordered);
        order
    }

    #[tokio::test]
    async fn create_assigns_number_and_totals() {
        let svc = service();
        let order = svc.create(&manager(), fixtures::order_form()).await.unwrap();
        assert!(order.po_number.starts_with("PO-"));
        assert_eq!(order.version, 1);
        assert_eq!(order.totals.grand_total.to_string(), "4252.50");
    }

    #[tokio::test]
    async fn forbidden_transition_leaves_stage_unchanged() {
        let svc = service();
        let order = svc.create(&manager(), fixtures::order_form()).await.unwrap();
        let executive = AuthUser::new("exec", vec!["purchase_executive".into()], vec![]);

        let order = svc
            .transition(&executive, order.id, request(Action::Approve))
            .await
            .unwrap();
        assert_eq!(order.status, Stage::PendingApproval);

        assert_matches!(
            svc.transition(&executive, order.id, request(Action::Approve)).await,
            Err(ServiceError::Forbidden(_))
        );
        let stored = svc.get(&executive, order.id).await.unwrap();
        assert_eq!(stored.status, Stage::PendingApproval);
        assert_eq!(stored.version, order.version);
    }

    #[tokio::test]
    async fn stale_version_is_a_conflict() {
        let svc = service();
        let user = manager();
        let order = svc.create(&user, fixtures::order_form()).await.unwrap();
        let stale = order.version;
        svc.transition(&user, order.id, request(Action::Approve))
            .await
            .unwrap();

        let mut req = request(Action::Cancel);
        req.version = Some(stale);
        assert_matches!(
            svc.transition(&user, order.id, req).await,
            Err(ServiceError::ConcurrentModification(_))
        );
    }

    #[tokio::test]
    async fn unknown_pair_is_invalid_operation() {
        let svc = service();
        let user = manager();
        let order = svc.create(&user, fixtures::order_form()).await.unwrap();
        assert_matches!(
            svc.transition(&user, order.id, request(Action::Complete)).await,
            Err(ServiceError::InvalidOperation(_))
        );
    }

    #[tokio::test]
    async fn receiving_moves_through_partial_to_received() {
        let svc = service();
        let user = manager();
        let order = ordered(&svc, &user).await;
        let line_id = order.lines[0].id;
        let receipt = |quantity| ReceiptForm {
            lines: vec![ReceiptLine {
                line_id,
                quantity,
                batch_number: Some("B-1".into()),
                expiry_date: None,
            }],
            remarks: None,
            version: None,
        };

        let order = svc.record_receipt(&user, order.id, receipt(60)).await.unwrap();
        assert_eq!(order.status, Stage::PartialReceived);
        assert_eq!(order.total_backlog(), 40);

        assert_matches!(
            svc.record_receipt(&user, order.id, receipt(41)).await,
            Err(ServiceError::FieldValidation(_))
        );

        let order = svc.record_receipt(&user, order.id, receipt(40)).await.unwrap();
        assert_eq!(order.status, Stage::Received);
        assert_eq!(order.lines[0].batch_number.as_deref(), Some("B-1"));
    }

    #[tokio::test]
    async fn receive_actions_are_not_plain_transitions() {
        let svc = service();
        let user = manager();
        let order = ordered(&svc, &user).await;
        assert_matches!(
            svc.transition(&user, order.id, request(Action::Receive)).await,
            Err(ServiceError::InvalidOperation(msg)) if msg.contains("receipts")
        );
    }

    #[tokio::test]
    async fn only_drafts_are_editable() {
        let svc = service();
        let user = manager();
        let order = svc.create(&user, fixtures::order_form()).await.unwrap();
        let order = svc
            .transition(&user, order.id, request(Action::Approve))
            .await
            .unwrap();
        assert_matches!(
            svc.update(&user, order.id, fixtures::order_form(), None).await,
            Err(ServiceError::InvalidStatus(_))
        );
        assert_matches!(
            svc.delete(&user, order.id, None).await,
            Err(ServiceError::InvalidStatus(_))
        );
    }

    #[tokio::test]
    async fn export_renders_filtered_rows() {
        let svc = service();
        let user = manager();
        svc.create(&user, fixtures::order_form()).await.unwrap();
        svc.create(&user, fixtures::order_form()).await.unwrap();
        let csv = svc.export_csv(&user, &ListParams::default()).await.unwrap();
        assert_eq!(csv.lines().count(), 3);
        assert!(csv.starts_with("\"PO Number\""));
        assert!(csv.lines().nth(1).unwrap().contains("\"INR\""));
    }

    #[tokio::test]
    async fn export_uses_configured_currency() {
        let svc = service().with_currency("USD");
        let user = manager();
        svc.create(&user, fixtures::order_form()).await.unwrap();
        let csv = svc.export_csv(&user, &ListParams::default()).await.unwrap();
        let row = csv.lines().nth(1).unwrap();
        assert!(row.contains("\"USD\""));
        assert!(row.contains("\"4,252.50\""));
    }
}
