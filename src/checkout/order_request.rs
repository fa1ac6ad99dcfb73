//! Pre-submit validation and the order-creation payload.

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::warn;

use super::calculator::{compute_totals, settle, CheckoutTotals, Settlement};
use super::cart::Cart;
use super::draft::{PaymentDraft, PaymentStatus};
use crate::error::PosError;
use crate::money::round_money;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderItemRequest {
    pub product_id: String,
    pub stock_id: String,
    pub quantity: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub tax: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub subtotal: Decimal,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub serial_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warranty_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateOrderRequest {
    pub store_id: String,
    /// `None` for walk-in sales.
    pub customer_id: Option<String>,
    pub items: Vec<OrderItemRequest>,
    #[serde(with = "rust_decimal::serde::float")]
    pub subtotal: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub tax: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub discount_percent: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub discount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub membership_discount: Decimal,
    pub points_used: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub points_discount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub balance_used: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub grand_total: Decimal,
    pub payment_method_id: String,
    pub payment_status: PaymentStatus,
    #[serde(with = "rust_decimal::serde::float")]
    pub paid_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub due_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub change_amount: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Checkout state frozen for submission.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedOrder {
    pub request: CreateOrderRequest,
    pub totals: CheckoutTotals,
    pub settlement: Settlement,
}

fn reject(message: impl Into<String>) -> PosError {
    let message = message.into();
    warn!(reason = %message, "Order submission blocked");
    PosError::Validation(message)
}

/// Validate the checkout and build the payload sent to the store API.
pub fn prepare_order(
    store_id: Option<&str>,
    cart: &Cart,
    draft: &PaymentDraft,
    point_value: Decimal,
) -> Result<PreparedOrder, PosError> {
    let store_id = store_id
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| reject("Select a store first"))?;
    if cart.is_empty() {
        return Err(reject("Add at least one product to the cart"));
    }
    for line in cart.lines() {
        if line.quantity == 0 {
            return Err(reject(format!("Enter a quantity for {}", line.name)));
        }
        if line.serial_tracked && line.serial_ids.len() as u32 != line.quantity {
            return Err(reject(format!(
                "Select {} serial number(s) for {}",
                line.quantity, line.name
            )));
        }
    }
    let payment_method_id = draft
        .payment_method_id()
        .ok_or_else(|| reject("Select a payment method"))?
        .to_string();

    let totals = compute_totals(cart, draft, point_value);
    let settlement = settle(totals.grand_total, draft);

    match draft.status() {
        PaymentStatus::Due | PaymentStatus::Partial if draft.customer().is_walk_in() => {
            return Err(reject("Walk-in customers must pay in full"));
        }
        PaymentStatus::Partial => {
            let partial = draft.partial_amount();
            if partial <= Decimal::ZERO || partial >= totals.grand_total {
                return Err(reject(
                    "Partial payment must be more than zero and less than the total",
                ));
            }
        }
        PaymentStatus::Paid => {
            if let Some(tendered) = draft.amount_tendered() {
                if tendered < totals.grand_total {
                    return Err(reject("Amount received is less than the total"));
                }
            }
        }
        PaymentStatus::Due => {}
    }

    let items = cart
        .lines()
        .iter()
        .zip(totals.lines.iter())
        .map(|(line, calc)| OrderItemRequest {
            product_id: line.product_id.clone(),
            stock_id: line.stock_id.clone(),
            quantity: line.quantity,
            unit_price: line.unit_price,
            tax: calc.tax,
            subtotal: round_money(calc.line_total),
            serial_ids: line.serial_ids.clone(),
            warranty_id: line.warranty_id.clone(),
        })
        .collect();

    let request = CreateOrderRequest {
        store_id: store_id.to_string(),
        customer_id: draft.customer().customer().map(|c| c.id.clone()),
        items,
        subtotal: round_money(totals.subtotal),
        tax: totals.tax,
        discount_percent: draft.discount_percent(),
        discount: totals.discount,
        membership_discount: totals.membership_discount,
        points_used: draft.points_to_use(),
        points_discount: totals.points_discount,
        balance_used: totals.balance_discount,
        grand_total: round_money(totals.grand_total),
        payment_method_id,
        payment_status: settlement.status,
        paid_amount: round_money(settlement.amount_paid),
        due_amount: round_money(settlement.due_amount),
        change_amount: round_money(settlement.change_amount),
        note: draft.note().map(str::to_string),
    };

    Ok(PreparedOrder {
        request,
        totals,
        settlement,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SellableStock;
    use crate::customers::Customer;
    use rust_decimal_macros::dec;

    fn cart() -> Cart {
        let mut cart = Cart::new();
        let id = cart
            .add_stock(&SellableStock {
                stock_id: "s1".into(),
                product_id: "p1".into(),
                name: "Kettle".into(),
                retail_price: dec!(100),
                tax_rate: Some(dec!(10)),
                ..SellableStock::default()
            })
            .unwrap();
        cart.set_quantity(id, 2).unwrap();
        cart
    }

    fn paid_draft() -> PaymentDraft {
        let mut draft = PaymentDraft::new();
        draft.set_payment_method(Some("cash".into()));
        draft
    }

    #[test]
    fn builds_walk_in_payload() {
        let mut draft = paid_draft();
        draft.set_amount_tendered(Some(dec!(250)));
        draft.set_note(Some("  gift wrap ".into()));
        let prepared = prepare_order(Some("1"), &cart(), &draft, Decimal::ONE).unwrap();
        let req = &prepared.request;
        assert_eq!(req.customer_id, None);
        assert_eq!(req.grand_total, dec!(220));
        assert_eq!(req.change_amount, dec!(30));
        assert_eq!(req.items[0].subtotal, dec!(200));
        assert_eq!(req.items[0].tax, dec!(20));

        let json = serde_json::to_value(req).unwrap();
        assert_eq!(json["items"][0]["product_id"], "p1");
        assert_eq!(json["items"][0]["unit_price"], 100.0);
        assert!(json["items"][0].get("serial_ids").is_none());
        assert_eq!(json["payment_status"], "paid");
        assert_eq!(json["customer_id"], serde_json::Value::Null);
        assert_eq!(json["note"], "gift wrap");
    }

    #[test]
    fn rejects_missing_prerequisites() {
        let draft = paid_draft();
        assert!(prepare_order(None, &cart(), &draft, Decimal::ONE).is_err());
        assert!(prepare_order(Some("1"), &Cart::new(), &draft, Decimal::ONE).is_err());
        let err = prepare_order(Some("1"), &cart(), &PaymentDraft::new(), Decimal::ONE).unwrap_err();
        assert_eq!(err.user_message(), "Select a payment method");
    }

    #[test]
    fn rejects_short_tender_and_bad_partial() {
        let mut draft = paid_draft();
        draft.set_amount_tendered(Some(dec!(100)));
        assert!(prepare_order(Some("1"), &cart(), &draft, Decimal::ONE).is_err());

        draft.set_amount_tendered(None);
        draft.select_customer(Customer {
            id: "c1".into(),
            ..Customer::default()
        });
        draft.set_status(PaymentStatus::Partial).unwrap();
        draft.set_partial_amount(dec!(220));
        assert!(prepare_order(Some("1"), &cart(), &draft, Decimal::ONE).is_err());

        draft.set_partial_amount(dec!(100));
        let prepared = prepare_order(Some("1"), &cart(), &draft, Decimal::ONE).unwrap();
        assert_eq!(prepared.request.due_amount, dec!(120));
        assert_eq!(prepared.request.customer_id.as_deref(), Some("c1"));
    }

    #[test]
    fn zero_quantity_and_missing_serials_block_submission() {
        let mut c = cart();
        let id = c.lines()[0].line_id;
        c.set_quantity(id, 0).unwrap();
        assert!(prepare_order(Some("1"), &c, &paid_draft(), Decimal::ONE).is_err());

        let mut c = Cart::new();
        let id = c
            .add_stock(&SellableStock {
                stock_id: "s2".into(),
                name: "Phone".into(),
                retail_price: dec!(300),
                serial_tracked: true,
                ..SellableStock::default()
            })
            .unwrap();
        let err = prepare_order(Some("1"), &c, &paid_draft(), Decimal::ONE).unwrap_err();
        assert_eq!(err.user_message(), "Select 1 serial number(s) for Phone");
        c.set_serials(id, vec!["sn-1".into()]).unwrap();
        let prepared = prepare_order(Some("1"), &c, &paid_draft(), Decimal::ONE).unwrap();
        assert_eq!(prepared.request.items[0].serial_ids, vec!["sn-1"]);
    }
}
