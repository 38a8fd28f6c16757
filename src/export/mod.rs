//! CSV rendering of list views.
//!
//! Every field is double-quoted, embedded quotes are doubled and rows end in
//! `\n`, so the output opens cleanly in spreadsheet tools regardless of the
//! content of free-text columns.

use csv::{QuoteStyle, Terminator, WriterBuilder};

use crate::{
    errors::ServiceError,
    models::{Inventory, PurchaseOrder, QualityControl},
};

/// A record that can be written as one CSV row.
pub trait CsvRow {
    fn headers() -> &'static [&'static str];
    fn row(&self) -> Vec<String>;
}

/// Renders a header row followed by one row per record.
pub fn to_csv<T: CsvRow>(records: &[T]) -> Result<String, ServiceError> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    let csv_err = |e: csv::Error| ServiceError::InternalError(format!("CSV export failed: {}", e));

    writer.write_record(T::headers()).map_err(csv_err)?;
    for record in records {
        writer.write_record(record.row()).map_err(csv_err)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ServiceError::InternalError(format!("CSV export failed: {}", e)))?;
    String::from_utf8(bytes)
        .map_err(|e| ServiceError::InternalError(format!("CSV export is not UTF-8: {}", e)))
}

fn opt(value: Option<impl ToString>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// A purchase order rendered with its document currency. Money columns use
/// thousands separators.
pub struct PricedOrder<'a> {
    pub order: &'a PurchaseOrder,
    pub currency: &'a str,
}

impl CsvRow for PricedOrder<'_> {
    fn headers() -> &'static [&'static str] {
        &[
            "PO Number",
            "Principal",
            "Status",
            "Lines",
            "Ordered Qty",
            "Received Qty",
            "Currency",
            "Subtotal",
            "Discount",
            "GST",
            "Shipping",
            "Grand Total",
            "Expected Delivery",
            "Created By",
            "Created At",
        ]
    }

    fn row(&self) -> Vec<String> {
        let order = self.order;
        let ordered = order.lines.iter().fold(0i64, |n, l| n.saturating_add(l.quantity));
        let received = order
            .lines
            .iter()
            .fold(0i64, |n, l| n.saturating_add(l.received_quantity));
        vec![
            order.po_number.clone(),
            order.principal.name.clone(),
            order.status.to_string(),
            order.lines.len().to_string(),
            ordered.to_string(),
            received.to_string(),
            self.currency.to_string(),
            order.totals.subtotal.format_grouped(),
            order.totals.order_discount.format_grouped(),
            order.totals.gst_amount.format_grouped(),
            order.totals.shipping_amount.format_grouped(),
            order.totals.grand_total.format_grouped(),
            opt(order.expected_delivery_date),
            order.created_by.clone(),
            order.created_at.to_rfc3339(),
        ]
    }
}

impl CsvRow for QualityControl {
    fn headers() -> &'static [&'static str] {
        &[
            "QC Number",
            "PO Number",
            "Status",
            "Priority",
            "Items",
            "Passed",
            "Failed",
            "Assigned To",
            "Approved By",
            "Created At",
        ]
    }

    fn row(&self) -> Vec<String> {
        use crate::models::InspectionResult;
        let count = |r: InspectionResult| self.items.iter().filter(|i| i.result == r).count();
        vec![
            self.qc_number.clone(),
            self.po_number.clone(),
            self.status.to_string(),
            self.priority.to_string(),
            self.items.len().to_string(),
            count(InspectionResult::Passed).to_string(),
            count(InspectionResult::Failed).to_string(),
            opt(self.assigned_to.as_deref()),
            opt(self.approved_by.as_deref()),
            self.created_at.to_rfc3339(),
        ]
    }
}

impl CsvRow for Inventory {
    fn headers() -> &'static [&'static str] {
        &[
            "Product",
            "Batch",
            "Expiry",
            "Warehouse",
            "Location",
            "Quantity",
            "Reserved",
            "Available",
        ]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.product_name.clone(),
            opt(self.batch_number.as_deref()),
            opt(self.expiry_date),
            self.warehouse_id.to_string(),
            opt(self.storage_location.as_deref()),
            self.quantity.to_string(),
            self.reserved_quantity.to_string(),
            self.available_quantity.to_string(),
        ]
    }
}
