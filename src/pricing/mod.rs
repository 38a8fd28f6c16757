//! Purchase order totals: line amounts, discounts, GST and shipping.
//!
//! All arithmetic goes through [`Money`]; see the module docs there for the
//! rounding rules.

pub mod money;

pub use money::Money;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A discount applied either to a single line or to the whole order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Discount {
    /// Percent of the amount it applies to (0..=100).
    Percentage(Decimal),
    /// Fixed amount, capped at the amount it applies to.
    Flat(Money),
}

impl Discount {
    /// Discount amount against `base`. Never exceeds `base` and is never negative.
    pub fn amount_on(&self, base: Money) -> Money {
        if base.is_negative() {
            return Money::ZERO;
        }
        let amount = match *self {
            Discount::Percentage(pct) => {
                base.percent(pct.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED))
            }
            Discount::Flat(flat) => flat.max(Money::ZERO),
        };
        amount.min(base)
    }
}

/// How GST is levied on an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaxType {
    /// Same-state supply: CGST and SGST at half the rate each.
    #[default]
    #[serde(alias = "cgst_sgst", alias = "CGST_SGST")]
    IntraState,
    /// Inter-state supply: a single IGST at the full rate.
    #[serde(alias = "igst", alias = "IGST")]
    InterState,
}

/// Shipping charge for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Shipping {
    Flat(Money),
    /// Percent of the order total after discount.
    Percentage(Decimal),
}

impl Shipping {
    pub fn amount_on(&self, total_after_discount: Money) -> Money {
        match *self {
            Shipping::Flat(flat) => flat.max(Money::ZERO),
            Shipping::Percentage(pct) => total_after_discount
                .max(Money::ZERO)
                .percent(pct.max(Decimal::ZERO)),
        }
    }
}

/// The priced view of one product line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineInput {
    pub quantity: i64,
    pub foc_quantity: i64,
    pub unit_price: Money,
    pub discount: Option<Discount>,
}

impl LineInput {
    pub fn new(quantity: i64, unit_price: Money) -> Self {
        Self {
            quantity,
            foc_quantity: 0,
            unit_price,
            discount: None,
        }
    }

    pub fn with_foc(mut self, foc_quantity: i64) -> Self {
        self.foc_quantity = foc_quantity;
        self
    }

    pub fn with_discount(mut self, discount: Discount) -> Self {
        self.discount = Some(discount);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineAmounts {
    /// Ordered quantity minus free-of-charge units
    pub billable_quantity: i64,
    pub gross: Money,
    pub discount: Money,
    pub net: Money,
}

/// GST parameters of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxSpec {
    pub tax_type: TaxType,
    /// Percent, e.g. `5` for 5%.
    pub rate: Decimal,
}

impl TaxSpec {
    pub fn intra_state(rate: Decimal) -> Self {
        Self {
            tax_type: TaxType::IntraState,
            rate,
        }
    }

    pub fn inter_state(rate: Decimal) -> Self {
        Self {
            tax_type: TaxType::InterState,
            rate,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GstBreakdown {
    pub cgst: Money,
    pub sgst: Money,
    pub igst: Money,
    pub total: Money,
}

impl GstBreakdown {
    /// Splits GST on `taxable` according to `tax`.
    ///
    /// The intra-state split floors CGST to the minor unit and gives SGST the
    /// remainder, so `cgst + sgst` equals the inter-state IGST on the same base.
    pub fn compute(taxable: Money, tax: &TaxSpec) -> Self {
        let total = taxable
            .max(Money::ZERO)
            .percent(tax.rate.max(Decimal::ZERO));
        match tax.tax_type {
            TaxType::InterState => GstBreakdown {
                cgst: Money::ZERO,
                sgst: Money::ZERO,
                igst: total,
                total,
            },
            TaxType::IntraState => {
                let cgst = total.half_floor();
                GstBreakdown {
                    cgst,
                    sgst: total - cgst,
                    igst: Money::ZERO,
                    total,
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub lines: Vec<LineAmounts>,
    pub subtotal: Money,
    pub order_discount: Money,
    pub total_after_discount: Money,
    pub gst: GstBreakdown,
    pub gst_amount: Money,
    pub shipping_amount: Money,
    pub grand_total: Money,
}

/// Amounts for a single line: `(quantity - foc) * unit_price - discount`.
pub fn line_amounts(line: &LineInput) -> LineAmounts {
    let billable_quantity = line.quantity.saturating_sub(line.foc_quantity.max(0)).max(0);
    let gross = line.unit_price * billable_quantity;
    let discount = line
        .discount
        .map(|d| d.amount_on(gross))
        .unwrap_or(Money::ZERO);

    LineAmounts {
        billable_quantity,
        gross,
        discount,
        net: gross - discount,
    }
}

/// Quantity still to be received on a line.
pub fn backlog(quantity: i64, received_quantity: i64) -> i64 {
    quantity.saturating_sub(received_quantity.max(0)).max(0)
}

/// Computes every total of an order.
///
/// `grand_total == total_after_discount + gst_amount + shipping_amount` holds
/// exactly for both tax types.
pub fn calculate_totals(
    lines: &[LineInput],
    order_discount: Option<&Discount>,
    tax: &TaxSpec,
    shipping: Option<&Shipping>,
) -> OrderTotals {
    let line_amounts: Vec<LineAmounts> = lines.iter().map(line_amounts).collect();
    let subtotal: Money = line_amounts.iter().map(|l| l.net).sum();

    let order_discount = order_discount
        .map(|d| d.amount_on(subtotal))
        .unwrap_or(Money::ZERO);
    let total_after_discount = subtotal - order_discount;

    let gst = GstBreakdown::compute(total_after_discount, tax);
    let shipping_amount = shipping
        .map(|s| s.amount_on(total_after_discount))
        .unwrap_or(Money::ZERO);

    let grand_total = total_after_discount + gst.total + shipping_amount;

    OrderTotals {
        lines: line_amounts,
        subtotal,
        order_discount,
        total_after_discount,
        gst_amount: gst.total,
        gst,
        shipping_amount,
        grand_total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn money(value: Decimal) -> Money {
        Money::new(value)
    }

    #[test]
    fn foc_and_percentage_discount_scenario() {
        let line = LineInput::new(100, money(dec!(50)))
            .with_foc(10)
            .with_discount(Discount::Percentage(dec!(10)));

        let amounts = line_amounts(&line);
        assert_eq!(amounts.billable_quantity, 90);
        assert_eq!(amounts.gross, money(dec!(4500)));
        assert_eq!(amounts.net, money(dec!(4050)));

        let totals = calculate_totals(&[line], None, &TaxSpec::inter_state(dec!(5)), None);
        assert_eq!(totals.gst.igst, money(dec!(202.50)));
        assert_eq!(totals.grand_total, money(dec!(4252.50)));
    }

    #[test]
    fn intra_state_splits_gst_evenly() {
        let line = LineInput::new(10, money(dec!(100)));
        let totals = calculate_totals(&[line], None, &TaxSpec::intra_state(dec!(12)), None);
        assert_eq!(totals.gst.cgst, money(dec!(60)));
        assert_eq!(totals.gst.sgst, money(dec!(60)));
        assert_eq!(totals.gst.igst, Money::ZERO);
        assert_eq!(totals.grand_total, money(dec!(1120)));
    }

    #[test]
    fn odd_gst_split_keeps_every_minor_unit() {
        // 0.60 * 5% = 0.03 -> CGST 0.01, SGST 0.02
        let line = LineInput::new(1, money(dec!(0.60)));
        let intra = calculate_totals(&[line], None, &TaxSpec::intra_state(dec!(5)), None);
        let inter = calculate_totals(&[line], None, &TaxSpec::inter_state(dec!(5)), None);
        assert_eq!(intra.gst.cgst, Money::from_minor(1));
        assert_eq!(intra.gst.sgst, Money::from_minor(2));
        assert_eq!(intra.gst.cgst + intra.gst.sgst, inter.gst.igst);
    }

    #[test]
    fn order_discount_and_percentage_shipping() {
        let lines = [
            LineInput::new(10, money(dec!(25))),
            LineInput::new(4, money(dec!(125))).with_discount(Discount::Flat(money(dec!(50)))),
        ];
        let totals = calculate_totals(
            &lines,
            Some(&Discount::Percentage(dec!(10))),
            &TaxSpec::inter_state(dec!(18)),
            Some(&Shipping::Percentage(dec!(2))),
        );

        assert_eq!(totals.subtotal, money(dec!(700)));
        assert_eq!(totals.order_discount, money(dec!(70)));
        assert_eq!(totals.total_after_discount, money(dec!(630)));
        assert_eq!(totals.gst_amount, money(dec!(113.40)));
        assert_eq!(totals.shipping_amount, money(dec!(12.60)));
        assert_eq!(totals.grand_total, money(dec!(756)));
    }

    #[test]
    fn flat_discounts_never_push_amounts_negative() {
        let line =
            LineInput::new(1, money(dec!(10))).with_discount(Discount::Flat(money(dec!(25))));
        assert_eq!(line_amounts(&line).net, Money::ZERO);

        let totals = calculate_totals(
            &[LineInput::new(1, money(dec!(10)))],
            Some(&Discount::Flat(money(dec!(99)))),
            &TaxSpec::inter_state(dec!(5)),
            Some(&Shipping::Flat(money(dec!(40)))),
        );
        assert_eq!(totals.total_after_discount, Money::ZERO);
        assert_eq!(totals.grand_total, money(dec!(40)));
    }

    #[test]
    fn foc_greater_than_quantity_bills_nothing() {
        let line = LineInput::new(5, money(dec!(10))).with_foc(8);
        assert_eq!(line_amounts(&line).billable_quantity, 0);
        assert_eq!(line_amounts(&line).net, Money::ZERO);
    }

    #[test]
    fn backlog_is_never_negative() {
        assert_eq!(backlog(100, 40), 60);
        assert_eq!(backlog(100, 100), 0);
        assert_eq!(backlog(100, 120), 0);
        assert_eq!(backlog(i64::MIN, 1), 0);
    }

    #[test]
    fn extreme_quantities_do_not_panic() {
        let line = LineInput::new(i64::MAX, money(dec!(100000000000)))
            .with_discount(Discount::Percentage(dec!(10)));
        let totals = calculate_totals(&[line, line], None, &TaxSpec::intra_state(dec!(28)), None);
        assert!(!totals.grand_total.is_negative());

        let negative = LineInput::new(i64::MIN, money(dec!(1))).with_foc(1);
        assert_eq!(line_amounts(&negative).billable_quantity, 0);
    }

    #[test]
    fn tax_type_accepts_legacy_codes() {
        let igst: TaxType = serde_json::from_str("\"IGST\"").unwrap();
        let cgst: TaxType = serde_json::from_str("\"cgst_sgst\"").unwrap();
        assert_eq!(igst, TaxType::InterState);
        assert_eq!(cgst, TaxType::IntraState);
    }
}
