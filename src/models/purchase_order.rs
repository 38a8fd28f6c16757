use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{Entity, Listable};
use crate::{
    pricing::{
        self, calculate_totals, Discount, LineAmounts, LineInput, Money, OrderTotals, Shipping,
        TaxSpec, TaxType,
    },
    workflow::{Action, Stage},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Address {
    #[validate(length(min = 1, max = 200, message = "Address line is required"))]
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    #[validate(length(min = 1, max = 100, message = "City is required"))]
    pub city: String,
    #[validate(length(min = 1, max = 100, message = "State is required"))]
    pub state: String,
    #[validate(length(min = 3, max = 12, message = "Postal code is invalid"))]
    pub postal_code: String,
    #[serde(default = "default_country")]
    #[validate(length(min = 2, max = 56))]
    pub country: String,
    /// GST registration of the party at this address
    #[serde(default)]
    #[validate(length(equal = 15, message = "GSTIN must be 15 characters"))]
    pub gstin: Option<String>,
}

fn default_country() -> String {
    "India".to_string()
}

/// The principal (manufacturer / supplier) the order is placed with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Principal {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[validate(length(min = 1, max = 200, message = "Principal name is required"))]
    pub name: String,
}

/// One product on a purchase order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductLine {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i64,
    pub unit_price: Money,
    #[serde(default)]
    pub foc_quantity: i64,
    #[serde(default)]
    pub discount: Option<Discount>,
    #[serde(default)]
    pub received_quantity: i64,
    #[serde(default)]
    pub batch_number: Option<String>,
    #[serde(default)]
    pub expiry_date: Option<NaiveDate>,
}

impl ProductLine {
    pub fn from_form(form: &ProductLineForm) -> Self {
        Self {
            id: Uuid::new_v4(),
            product_id: form.product_id,
            product_name: form.product_name.trim().to_string(),
            quantity: form.quantity,
            unit_price: form.unit_price,
            foc_quantity: form.foc_quantity.unwrap_or(0),
            discount: form.discount,
            received_quantity: 0,
            batch_number: None,
            expiry_date: None,
        }
    }

    pub fn pricing(&self) -> LineInput {
        LineInput {
            quantity: self.quantity,
            foc_quantity: self.foc_quantity,
            unit_price: self.unit_price,
            discount: self.discount,
        }
    }

    pub fn amounts(&self) -> LineAmounts {
        pricing::line_amounts(&self.pricing())
    }

    /// Quantity still expected from the principal.
    pub fn backlog(&self) -> i64 {
        pricing::backlog(self.quantity, self.received_quantity)
    }
}

/// A stage change recorded on the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageChange {
    pub from: Option<Stage>,
    pub to: Stage,
    pub action: Option<Action>,
    pub actor: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrder {
    pub id: Uuid,
    pub po_number: String,
    pub principal: Principal,
    pub bill_to: Address,
    pub ship_to: Address,
    pub lines: Vec<ProductLine>,
    pub tax_type: TaxType,
    pub gst_rate: Decimal,
    pub discount: Option<Discount>,
    pub shipping: Option<Shipping>,
    pub status: Stage,
    pub workflow_stage: Stage,
    pub totals: OrderTotals,
    pub expected_delivery_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub history: Vec<StageChange>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

impl PurchaseOrder {
    /// Builds a draft from a validated form.
    pub fn draft(
        form: &PurchaseOrderForm,
        po_number: String,
        default_gst_rate: Decimal,
        created_by: &str,
    ) -> Self {
        let now = Utc::now();
        let mut order = Self {
            id: Uuid::new_v4(),
            po_number,
            principal: form.principal.clone(),
            bill_to: form.bill_to.clone(),
            ship_to: form.ship_to.clone().unwrap_or_else(|| form.bill_to.clone()),
            lines: form.lines.iter().map(ProductLine::from_form).collect(),
            tax_type: form.tax_type,
            gst_rate: form.gst_rate.unwrap_or(default_gst_rate),
            discount: form.discount,
            shipping: form.shipping,
            status: Stage::Draft,
            workflow_stage: Stage::Draft,
            totals: calculate_totals(&[], None, &TaxSpec::intra_state(Decimal::ZERO), None),
            expected_delivery_date: form.expected_delivery_date,
            notes: form.notes.clone(),
            history: vec![StageChange {
                from: None,
                to: Stage::Draft,
                action: None,
                actor: created_by.to_string(),
                remarks: None,
                at: now,
            }],
            created_by: created_by.to_string(),
            created_at: now,
            updated_at: now,
            version: 0,
        };
        order.recalculate();
        order
    }

    /// Replaces the editable header and lines with `form`.
    pub fn apply_form(&mut self, form: &PurchaseOrderForm) {
        self.principal = form.principal.clone();
        self.bill_to = form.bill_to.clone();
        self.ship_to = form.ship_to.clone().unwrap_or_else(|| form.bill_to.clone());
        self.lines = form.lines.iter().map(ProductLine::from_form).collect();
        self.tax_type = form.tax_type;
        if let Some(rate) = form.gst_rate {
            self.gst_rate = rate;
        }
        self.discount = form.discount;
        self.shipping = form.shipping;
        self.expected_delivery_date = form.expected_delivery_date;
        self.notes = form.notes.clone();
        self.recalculate();
    }

    pub fn tax_spec(&self) -> TaxSpec {
        TaxSpec {
            tax_type: self.tax_type,
            rate: self.gst_rate,
        }
    }

    pub fn recalculate(&mut self) {
        let inputs: Vec<LineInput> = self.lines.iter().map(ProductLine::pricing).collect();
        self.totals = calculate_totals(
            &inputs,
            self.discount.as_ref(),
            &self.tax_spec(),
            self.shipping.as_ref(),
        );
    }

    pub fn total_backlog(&self) -> i64 {
        self.lines.iter().map(ProductLine::backlog).sum()
    }

    pub fn is_fully_received(&self) -> bool {
        self.total_backlog() == 0
    }

    /// Moves the order to `to` and appends the history entry.
    pub fn set_stage(
        &mut self,
        to: Stage,
        action: Option<Action>,
        actor: &str,
        remarks: Option<String>,
    ) {
        let now = Utc::now();
        self.history.push(StageChange {
            from: Some(self.status),
            to,
            action,
            actor: actor.to_string(),
            remarks,
            at: now,
        });
        self.status = to;
        self.workflow_stage = to;
        self.updated_at = now;
    }

    pub fn line(&self, line_id: Uuid) -> Option<&ProductLine> {
        self.lines.iter().find(|l| l.id == line_id)
    }
}

impl Entity for PurchaseOrder {
    const NAME: &'static str = "Purchase order";

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

impl Listable for PurchaseOrder {
    fn status_code(&self) -> Option<String> {
        Some(self.status.to_string())
    }

    fn search_text(&self) -> Vec<&str> {
        let mut text = vec![self.po_number.as_str(), self.principal.name.as_str()];
        text.extend(self.lines.iter().map(|l| l.product_name.as_str()));
        text
    }
}

/// Create / update payload for a purchase order.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PurchaseOrderForm {
    #[validate]
    pub principal: Principal,
    #[validate]
    pub bill_to: Address,
    #[serde(default)]
    #[validate]
    pub ship_to: Option<Address>,
    /// Must be non-empty; checked in `validation::validate_purchase_order`
    #[validate]
    pub lines: Vec<ProductLineForm>,
    #[serde(default)]
    pub tax_type: TaxType,
    /// GST percent; the configured default applies when absent
    #[serde(default)]
    pub gst_rate: Option<Decimal>,
    #[serde(default)]
    pub discount: Option<Discount>,
    #[serde(default)]
    pub shipping: Option<Shipping>,
    #[serde(default)]
    pub expected_delivery_date: Option<NaiveDate>,
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ProductLineForm {
    pub product_id: Uuid,
    #[validate(length(min = 1, max = 200, message = "Product name is required"))]
    pub product_name: String,
    #[validate(range(
        min = 1,
        max = 1000000000,
        message = "Quantity must be between 1 and 1,000,000,000"
    ))]
    pub quantity: i64,
    /// At most `validation::MAX_UNIT_PRICE`; checked in `validation::pricing_errors`
    pub unit_price: Money,
    #[serde(default)]
    #[validate(range(
        min = 0,
        max = 1000000000,
        message = "FOC quantity must be between 0 and 1,000,000,000"
    ))]
    pub foc_quantity: Option<i64>,
    #[serde(default)]
    pub discount: Option<Discount>,
}

impl ProductLineForm {
    pub fn pricing(&self) -> LineInput {
        LineInput {
            quantity: self.quantity,
            foc_quantity: self.foc_quantity.unwrap_or(0),
            unit_price: self.unit_price,
            discount: self.discount,
        }
    }
}

/// Lines and tax parameters priced without creating an order.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TotalsPreview {
    #[validate]
    pub lines: Vec<ProductLineForm>,
    #[serde(default)]
    pub tax_type: TaxType,
    #[serde(default)]
    pub gst_rate: Option<Decimal>,
    #[serde(default)]
    pub discount: Option<Discount>,
    #[serde(default)]
    pub shipping: Option<Shipping>,
}

/// Request body of `POST /purchase-orders/:id/transitions`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TransitionRequest {
    pub action: Action,
    #[serde(default)]
    #[validate(length(max = 1000))]
    pub remarks: Option<String>,
    /// Version the client last read; stale versions are rejected
    #[serde(default)]
    pub version: Option<u64>,
}

/// Goods received against one line.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ReceiptLine {
    pub line_id: Uuid,
    #[validate(range(
        min = 1,
        max = 1000000000,
        message = "Received quantity must be between 1 and 1,000,000,000"
    ))]
    pub quantity: i64,
    #[serde(default)]
    #[validate(length(min = 1, max = 64))]
    pub batch_number: Option<String>,
    #[serde(default)]
    pub expiry_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ReceiptForm {
    #[validate]
    pub lines: Vec<ReceiptLine>,
    #[serde(default)]
    pub remarks: Option<String>,
    #[serde(default)]
    pub version: Option<u64>,
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn draft_computes_totals_and_history() {
        let order = PurchaseOrder::draft(&order_form(), "PO-1".into(), dec!(12), "u-1");
        assert_eq!(order.status, Stage::Draft);
        assert_eq!(order.ship_to, order.bill_to);
        assert_eq!(order.totals.grand_total, Money::new(dec!(4252.50)));
        assert_eq!(order.history.len(), 1);
        assert_eq!(order.history[0].to, Stage::Draft);
    }

    #[test]
    fn default_gst_rate_applies_when_form_omits_it() {
        let mut form = order_form();
        form.gst_rate = None;
        let order = PurchaseOrder::draft(&form, "PO-2".into(), dec!(12), "u-1");
        assert_eq!(order.gst_rate, dec!(12));
    }

    #[test]
    fn set_stage_keeps_status_and_stage_in_step() {
        let mut order = PurchaseOrder::draft(&order_form(), "PO-3".into(), dec!(12), "u-1");
        order.set_stage(Stage::PendingApproval, Some(Action::Approve), "u-2", None);
        assert_eq!(order.status, Stage::PendingApproval);
        assert_eq!(order.workflow_stage, Stage::PendingApproval);
        assert_eq!(order.history.last().unwrap().from, Some(Stage::Draft));
    }

    #[test]
    fn backlog_tracks_receipts() {
        let mut order = PurchaseOrder::draft(&order_form(), "PO-4".into(), dec!(12), "u-1");
        assert_eq!(order.total_backlog(), 100);
        order.lines[0].received_quantity = 60;
        assert_eq!(order.total_backlog(), 40);
        assert!(!order.is_fully_received());
        order.lines[0].received_quantity = 100;
        assert!(order.is_fully_received());
    }
}
