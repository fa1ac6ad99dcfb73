//! Checkout total calculator.
//!
//! Pure function of the cart and the payment draft, re-run after every edit.
//! Order of application:
//! 1. per-line `rate × quantity`, tax backed out (inclusive) or added (exclusive)
//! 2. percentage discount and membership discount, both on the pre-tax subtotal
//! 3. loyalty points, then account balance, each capped by what is left
//! 4. grand total floored at zero

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use super::cart::{Cart, CartLine};
use super::draft::{PaymentDraft, PaymentStatus};
use crate::money::{clamp_non_negative, percent_of, round_money};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineBreakdown {
    pub line_id: Uuid,
    /// `rate × quantity` as entered.
    pub line_total: Decimal,
    pub tax: Decimal,
    /// Contribution to the subtotal.
    pub pre_tax: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct CheckoutTotals {
    pub lines: Vec<LineBreakdown>,
    pub item_count: u64,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub discount: Decimal,
    pub membership_discount: Decimal,
    /// `subtotal − discount − membership_discount + tax`, floored at zero.
    pub base_total: Decimal,
    pub points_discount: Decimal,
    pub balance_discount: Decimal,
    pub grand_total: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Settlement {
    pub status: PaymentStatus,
    pub amount_paid: Decimal,
    pub due_amount: Decimal,
    pub change_amount: Decimal,
}

/// Tax and subtotal contribution of one line.
///
/// Inclusive: `tax = total − total / (1 + rate/100)` and the line adds
/// `total − tax` to the subtotal. Exclusive: `tax = total × rate/100` and the
/// whole total counts towards the subtotal. Tax is rounded to cents, so
/// `tax + pre_tax == total` holds exactly for inclusive lines.
pub fn line_tax(line_total: Decimal, rate: Option<Decimal>, inclusive: bool) -> (Decimal, Decimal) {
    let rate = match rate {
        Some(r) if r > Decimal::ZERO => r,
        _ => return (Decimal::ZERO, line_total),
    };
    if inclusive {
        let divisor = Decimal::ONE + rate / Decimal::ONE_HUNDRED;
        let tax = round_money(line_total - line_total / divisor);
        (tax, line_total - tax)
    } else {
        (round_money(percent_of(line_total, rate)), line_total)
    }
}

fn breakdown(line: &CartLine) -> LineBreakdown {
    let line_total = line.line_total();
    let (tax, pre_tax) = line_tax(line_total, line.tax_rate, line.tax_inclusive);
    LineBreakdown {
        line_id: line.line_id,
        line_total,
        tax,
        pre_tax,
    }
}

/// Totals for the current cart and draft. `point_value` is the currency
/// value of one loyalty point.
pub fn compute_totals(cart: &Cart, draft: &PaymentDraft, point_value: Decimal) -> CheckoutTotals {
    let lines: Vec<LineBreakdown> = cart.lines().iter().map(breakdown).collect();
    let subtotal: Decimal = lines.iter().map(|l| l.pre_tax).sum();
    let tax: Decimal = lines.iter().map(|l| l.tax).sum();

    let discount = round_money(percent_of(subtotal, draft.discount_percent()));
    let membership_discount = round_money(percent_of(subtotal, draft.membership_discount_percent()));
    let base_total = clamp_non_negative(subtotal - discount - membership_discount + tax);

    let points_value = clamp_non_negative(Decimal::from(draft.points_to_use()).saturating_mul(point_value));
    let points_discount = round_money(points_value.min(base_total));
    let balance_discount = clamp_non_negative(draft.balance_to_use())
        .min(clamp_non_negative(base_total - points_discount));
    let grand_total = clamp_non_negative(base_total - points_discount - balance_discount);

    debug!(
        lines = lines.len(),
        subtotal = %subtotal,
        tax = %tax,
        grand_total = %grand_total,
        "Checkout totals evaluated"
    );

    CheckoutTotals {
        item_count: cart.item_count(),
        lines,
        subtotal,
        tax,
        discount,
        membership_discount,
        base_total,
        points_discount,
        balance_discount,
        grand_total,
    }
}

/// How much is collected now, left due, or handed back as change.
pub fn settle(grand_total: Decimal, draft: &PaymentDraft) -> Settlement {
    let grand_total = clamp_non_negative(grand_total);
    match draft.status() {
        PaymentStatus::Due => Settlement {
            status: PaymentStatus::Due,
            amount_paid: Decimal::ZERO,
            due_amount: grand_total,
            change_amount: Decimal::ZERO,
        },
        PaymentStatus::Partial => {
            let partial = clamp_non_negative(draft.partial_amount());
            Settlement {
                status: PaymentStatus::Partial,
                amount_paid: partial.min(grand_total),
                due_amount: clamp_non_negative(grand_total - partial),
                change_amount: Decimal::ZERO,
            }
        }
        PaymentStatus::Paid => {
            let tendered = draft.amount_tendered().unwrap_or(grand_total);
            Settlement {
                status: PaymentStatus::Paid,
                amount_paid: grand_total,
                due_amount: Decimal::ZERO,
                change_amount: clamp_non_negative(tendered - grand_total),
            }
        }
    }
}
