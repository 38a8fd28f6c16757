//! Form validation beyond what the `validator` derives can express.
//!
//! Every check returns the full list of `{field, message}` problems so the
//! client can show them all at once; a submission with any problem is
//! rejected as a whole.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

use crate::{
    errors::{FieldError, ServiceError},
    models::{ProductLineForm, PurchaseOrder, PurchaseOrderForm, ReceiptForm, TotalsPreview},
    pricing::{line_amounts, Discount, Money, Shipping},
};

/// Largest ordered, free or received quantity on one line.
pub const MAX_LINE_QUANTITY: i64 = 1_000_000_000;
/// Largest number of product lines on one order.
pub const MAX_LINES: usize = 500;
/// Largest unit price or flat charge, in major units.
pub const MAX_UNIT_PRICE: Decimal = dec!(1000000000000);

/// Flattens nested `validator` errors into dotted field paths
/// (`lines[0].quantity`), sorted by path.
pub fn flatten_validation_errors(
    errors: &ValidationErrors,
    prefix: Option<&str>,
) -> Vec<FieldError> {
    let mut out = Vec::new();
    collect(errors, prefix, &mut out);
    out.sort_by(|a, b| a.field.cmp(&b.field));
    out
}

fn collect(errors: &ValidationErrors, prefix: Option<&str>, out: &mut Vec<FieldError>) {
    let path = |field: &str| match prefix {
        Some(p) => format!("{}.{}", p, field),
        None => field.to_string(),
    };

    for (field, kind) in errors.errors() {
        match kind {
            ValidationErrorsKind::Field(list) => {
                for err in list {
                    let message = err
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("{} is invalid ({})", field, err.code));
                    out.push(FieldError::new(path(field), message));
                }
            }
            ValidationErrorsKind::Struct(inner) => collect(inner, Some(&path(field)), out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect(inner, Some(&format!("{}[{}]", path(field), index)), out);
                }
            }
        }
    }
}

/// Runs derive validation and returns the problems as field errors.
pub fn derive_errors<T: Validate>(form: &T) -> Vec<FieldError> {
    match form.validate() {
        Ok(()) => Vec::new(),
        Err(errors) => flatten_validation_errors(&errors, None),
    }
}

fn into_result(mut errors: Vec<FieldError>) -> Result<(), ServiceError> {
    if errors.is_empty() {
        Ok(())
    } else {
        errors.sort_by(|a, b| a.field.cmp(&b.field));
        Err(ServiceError::FieldValidation(errors))
    }
}

/// Derive validation only.
pub fn validate_form<T: Validate>(form: &T) -> Result<(), ServiceError> {
    into_result(derive_errors(form))
}

pub fn check_gst_rate(field: &str, rate: Decimal, errors: &mut Vec<FieldError>) {
    if rate < Decimal::ZERO || rate > Decimal::ONE_HUNDRED {
        errors.push(FieldError::new(field, "GST rate must be between 0 and 100"));
    }
}

fn check_discount(field: &str, discount: &Discount, base: Money, errors: &mut Vec<FieldError>) {
    match *discount {
        Discount::Percentage(pct) => {
            if pct < Decimal::ZERO || pct > Decimal::ONE_HUNDRED {
                errors.push(FieldError::new(
                    field,
                    "Discount percentage must be between 0 and 100",
                ));
            }
        }
        Discount::Flat(amount) => {
            if amount.is_negative() {
                errors.push(FieldError::new(field, "Discount cannot be negative"));
            } else if amount > base {
                errors.push(FieldError::new(
                    field,
                    format!("Discount cannot exceed the amount it applies to ({})", base),
                ));
            }
        }
    }
}

fn within_limits(line: &ProductLineForm) -> bool {
    let foc = line.foc_quantity.unwrap_or(0);
    (1..=MAX_LINE_QUANTITY).contains(&line.quantity)
        && (0..=line.quantity).contains(&foc)
        && !line.unit_price.is_negative()
        && line.unit_price.amount() <= MAX_UNIT_PRICE
}

fn check_line(index: usize, line: &ProductLineForm, errors: &mut Vec<FieldError>) {
    let field = |name: &str| format!("lines[{}].{}", index, name);

    if line.unit_price.is_negative() {
        errors.push(FieldError::new(field("unit_price"), "Unit price cannot be negative"));
    } else if line.unit_price.amount() > MAX_UNIT_PRICE {
        errors.push(FieldError::new(
            field("unit_price"),
            format!("Unit price cannot exceed {}", MAX_UNIT_PRICE),
        ));
    }
    let foc = line.foc_quantity.unwrap_or(0);
    if foc > line.quantity {
        errors.push(FieldError::new(
            field("foc_quantity"),
            "FOC quantity cannot exceed the ordered quantity",
        ));
    }
    // Range errors on quantity come from the derive; only price lines within limits
    if let (Some(discount), true) = (&line.discount, within_limits(line)) {
        let gross = line_amounts(&line.pricing()).gross;
        check_discount(&field("discount"), discount, gross, errors);
    }
}

/// Business rules on the priced part of an order: lines, GST rate, order
/// discount and shipping.
pub fn pricing_errors(
    lines: &[ProductLineForm],
    gst_rate: Option<Decimal>,
    discount: Option<&Discount>,
    shipping: Option<&Shipping>,
) -> Vec<FieldError> {
    let mut errors = Vec::new();

    if lines.is_empty() {
        errors.push(FieldError::new(
            "lines",
            "At least one product line is required",
        ));
    } else if lines.len() > MAX_LINES {
        errors.push(FieldError::new(
            "lines",
            format!("An order can have at most {} lines", MAX_LINES),
        ));
    }
    for (index, line) in lines.iter().enumerate() {
        check_line(index, line, &mut errors);
    }

    if let Some(rate) = gst_rate {
        check_gst_rate("gst_rate", rate, &mut errors);
    }

    let priceable = lines.len() <= MAX_LINES && lines.iter().all(within_limits);
    if let (Some(discount), true) = (discount, priceable) {
        let subtotal: Money = lines.iter().map(|l| line_amounts(&l.pricing()).net).sum();
        check_discount("discount", discount, subtotal, &mut errors);
    }

    match shipping {
        Some(Shipping::Flat(amount)) if amount.is_negative() => {
            errors.push(FieldError::new("shipping", "Shipping cannot be negative"));
        }
        Some(Shipping::Flat(amount)) if amount.amount() > MAX_UNIT_PRICE => {
            errors.push(FieldError::new(
                "shipping",
                format!("Shipping cannot exceed {}", MAX_UNIT_PRICE),
            ));
        }
        Some(Shipping::Percentage(pct))
            if *pct < Decimal::ZERO || *pct > Decimal::ONE_HUNDRED =>
        {
            errors.push(FieldError::new(
                "shipping",
                "Shipping percentage must be between 0 and 100",
            ));
        }
        _ => {}
    }

    errors
}

/// Full validation of a purchase order form.
pub fn validate_purchase_order(form: &PurchaseOrderForm) -> Result<(), ServiceError> {
    let mut errors = derive_errors(form);
    errors.extend(pricing_errors(
        &form.lines,
        form.gst_rate,
        form.discount.as_ref(),
        form.shipping.as_ref(),
    ));
    into_result(errors)
}

/// Validation of a totals preview request.
pub fn validate_preview(form: &TotalsPreview) -> Result<(), ServiceError> {
    let mut errors = derive_errors(form);
    errors.extend(pricing_errors(
        &form.lines,
        form.gst_rate,
        form.discount.as_ref(),
        form.shipping.as_ref(),
    ));
    into_result(errors)
}

/// Validates a goods receipt against the order's outstanding quantities.
pub fn validate_receipt(order: &PurchaseOrder, form: &ReceiptForm) -> Result<(), ServiceError> {
    let mut errors = derive_errors(form);

    if form.lines.is_empty() {
        errors.push(FieldError::new(
            "lines",
            "At least one received line is required",
        ));
    }

    for (index, receipt) in form.lines.iter().enumerate() {
        let field = format!("lines[{}].quantity", index);
        match order.line(receipt.line_id) {
            None => errors.push(FieldError::new(
                format!("lines[{}].line_id", index),
                "Line does not belong to this purchase order",
            )),
            Some(line) => {
                // Repeated entries for one line are summed against its backlog
                let total_for_line = form
                    .lines
                    .iter()
                    .filter(|r| r.line_id == receipt.line_id)
                    .fold(0i64, |sum, r| sum.saturating_add(r.quantity));
                if total_for_line > line.backlog() {
                    errors.push(FieldError::new(
                        field,
                        format!(
                            "Received quantity exceeds the outstanding {} for {}",
                            line.backlog(),
                            line.product_name
                        ),
                    ));
                }
            }
        }
    }

    into_result(errors)
}
