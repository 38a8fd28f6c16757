//! Property-based tests for the totals calculator, the transition table and
//! the permission predicates.

use pharmadist_api::{
    auth::{has_all_permissions, has_any_permission, has_permission},
    pricing::{
        calculate_totals, line_amounts, Discount, GstBreakdown, LineInput, Money, Shipping,
        TaxSpec,
    },
    workflow::{next_stage, Action, Stage, TRANSITIONS},
};
use proptest::prelude::*;
use rust_decimal::Decimal;
use strum::IntoEnumIterator;

// Strategies for generating test data
fn money_strategy() -> impl Strategy<Value = Money> {
    (0i64..10_000_000).prop_map(Money::from_minor)
}

fn percent_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..=10_000).prop_map(|basis_points| Decimal::new(basis_points, 2))
}

fn gst_rate_strategy() -> impl Strategy<Value = Decimal> {
    prop_oneof![
        Just(Decimal::ZERO),
        Just(Decimal::new(5, 0)),
        Just(Decimal::new(12, 0)),
        Just(Decimal::new(18, 0)),
        Just(Decimal::new(28, 0)),
        (0i64..=10_000).prop_map(|bp| Decimal::new(bp, 2)),
    ]
}

fn discount_strategy() -> impl Strategy<Value = Option<Discount>> {
    prop_oneof![
        Just(None),
        percent_strategy().prop_map(|p| Some(Discount::Percentage(p))),
        money_strategy().prop_map(|m| Some(Discount::Flat(m))),
    ]
}

fn line_strategy() -> impl Strategy<Value = LineInput> {
    (1i64..5_000, 0i64..5_000, money_strategy(), discount_strategy()).prop_map(
        |(quantity, foc, unit_price, discount)| LineInput {
            quantity,
            foc_quantity: foc.min(quantity),
            unit_price,
            discount,
        },
    )
}

fn shipping_strategy() -> impl Strategy<Value = Option<Shipping>> {
    prop_oneof![
        Just(None),
        money_strategy().prop_map(|m| Some(Shipping::Flat(m))),
        percent_strategy().prop_map(|p| Some(Shipping::Percentage(p))),
    ]
}

fn tax_strategy() -> impl Strategy<Value = TaxSpec> {
    (any::<bool>(), gst_rate_strategy()).prop_map(|(inter, rate)| {
        if inter {
            TaxSpec::inter_state(rate)
        } else {
            TaxSpec::intra_state(rate)
        }
    })
}

// Property: totals add up exactly
proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn subtotal_is_sum_of_line_nets(lines in prop::collection::vec(line_strategy(), 0..12)) {
        let totals = calculate_totals(&lines, None, &TaxSpec::intra_state(Decimal::ZERO), None);
        let expected: Money = lines.iter().map(|l| line_amounts(l).net).sum();
        prop_assert_eq!(totals.subtotal, expected);
        for amounts in &totals.lines {
            prop_assert!(!amounts.net.is_negative(), "negative line net: {:?}", amounts);
        }
    }

    #[test]
    fn grand_total_is_exact(
        lines in prop::collection::vec(line_strategy(), 1..8),
        order_discount in discount_strategy(),
        tax in tax_strategy(),
        shipping in shipping_strategy(),
    ) {
        let totals = calculate_totals(&lines, order_discount.as_ref(), &tax, shipping.as_ref());
        prop_assert_eq!(
            totals.grand_total,
            totals.total_after_discount + totals.gst_amount + totals.shipping_amount
        );
        prop_assert!(totals.order_discount <= totals.subtotal);
        prop_assert_eq!(totals.gst.total, totals.gst.cgst + totals.gst.sgst + totals.gst.igst);
    }

    #[test]
    fn intra_state_split_matches_igst(taxable in money_strategy(), rate in gst_rate_strategy()) {
        let intra = GstBreakdown::compute(taxable, &TaxSpec::intra_state(rate));
        let inter = GstBreakdown::compute(taxable, &TaxSpec::inter_state(rate));
        prop_assert_eq!(intra.cgst + intra.sgst, inter.igst);
        prop_assert!(intra.sgst >= intra.cgst);
        prop_assert!((intra.sgst - intra.cgst) <= Money::from_minor(1));
    }
}

// Property: only enumerated (stage, action) pairs resolve
proptest! {
    #[test]
    fn next_stage_only_for_enumerated_pairs(
        stage in prop::sample::select(Stage::iter().collect::<Vec<_>>()),
        action in prop::sample::select(Action::iter().collect::<Vec<_>>()),
    ) {
        let row = TRANSITIONS.iter().find(|t| t.from == stage && t.action == action);
        prop_assert_eq!(next_stage(stage, action), row.map(|t| t.to));
    }
}

fn permission_strategy() -> impl Strategy<Value = String> {
    (
        prop_oneof!["purchase_orders", "quality_control", "inventory", "products"],
        prop_oneof!["read", "create", "approve_l1", "reserve"],
    )
        .prop_map(|(resource, action)| format!("{}:{}", resource, action))
}

// Property: permission predicates
proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    #[test]
    fn empty_requirements(granted in prop::collection::vec(permission_strategy(), 0..6)) {
        prop_assert!(has_all_permissions(&granted, &[]));
        prop_assert!(!has_any_permission(&granted, &[]));
    }

    #[test]
    fn all_implies_any(
        granted in prop::collection::vec(permission_strategy(), 0..6),
        required in prop::collection::vec(permission_strategy(), 1..4),
    ) {
        let required: Vec<&str> = required.iter().map(String::as_str).collect();
        if has_all_permissions(&granted, &required) {
            prop_assert!(has_any_permission(&granted, &required));
        }
        let any = required.iter().any(|r| has_permission(&granted, r));
        prop_assert_eq!(has_any_permission(&granted, &required), any);
    }

    #[test]
    fn resource_wildcard_grants_its_actions(required in permission_strategy()) {
        let resource = required.split(':').next().unwrap().to_string();
        let granted = vec![format!("{}:*", resource)];
        prop_assert!(has_permission(&granted, &required));
        prop_assert!(has_permission(&vec!["*".to_string()], &required));
    }
}

#[test]
fn reference_scenario() {
    let line = LineInput::new(100, Money::from_major(50))
        .with_foc(10)
        .with_discount(Discount::Percentage(Decimal::new(10, 0)));
    let totals = calculate_totals(&[line], None, &TaxSpec::inter_state(Decimal::new(5, 0)), None);
    assert_eq!(totals.subtotal.to_string(), "4050.00");
    assert_eq!(totals.gst.igst.to_string(), "202.50");
    assert_eq!(totals.grand_total.to_string(), "4252.50");
}
