//! Order/invoice normalization.
//!
//! The store API has been migrating orders from flat legacy fields
//! (`grand_total`, `payment_status`, ...) to nested `financial` / `payment`
//! objects, and records in between populate either, both or neither. Every
//! displayed field is therefore resolved on its own: nested path first, then
//! the legacy flat key, then a hard default. Nothing here fails; missing data
//! degrades to zero or a placeholder.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::checkout::PaymentStatus;
use crate::money::{decimal_from_value, i64_from_value, id_from_value};

pub const WALK_IN_CUSTOMER: &str = "Walk-in Customer";
pub const PLACEHOLDER: &str = "N/A";

/// Which generation of the order payload a record came in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderShape {
    Legacy,
    Nested,
    Mixed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct OrderCustomer {
    pub id: Option<String>,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
}

impl OrderCustomer {
    pub fn is_walk_in(&self) -> bool {
        self.id.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct OrderLine {
    /// Backend order item id; lines without one cannot be returned.
    pub id: Option<String>,
    pub product_id: String,
    pub name: String,
    pub sku: Option<String>,
    pub quantity: i64,
    pub returned_quantity: i64,
    pub unit_price: Decimal,
    pub tax: Decimal,
    pub subtotal: Decimal,
    pub serials: Vec<String>,
    pub warranty: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct OrderFinancials {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub discount: Decimal,
    pub membership_discount: Decimal,
    pub points_discount: Decimal,
    pub balance_discount: Decimal,
    pub grand_total: Decimal,
    pub paid_amount: Decimal,
    pub due_amount: Decimal,
    pub change_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct OrderPayment {
    pub method: String,
    pub status: Option<PaymentStatus>,
}

impl OrderPayment {
    pub fn status_label(&self) -> &'static str {
        match self.status {
            Some(PaymentStatus::Paid) => "Paid",
            Some(PaymentStatus::Partial) => "Partial",
            Some(PaymentStatus::Due) => "Due",
            None => PLACEHOLDER,
        }
    }
}

/// Canonical display shape of an order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Order {
    pub id: String,
    pub invoice_no: String,
    pub status: String,
    pub created_at: Option<NaiveDateTime>,
    pub store_name: Option<String>,
    pub customer: OrderCustomer,
    pub items: Vec<OrderLine>,
    pub financial: OrderFinancials,
    pub payment: OrderPayment,
    pub note: Option<String>,
    pub shape: OrderShape,
}

impl Order {
    pub fn created_at_display(&self) -> String {
        self.created_at
            .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| PLACEHOLDER.to_string())
    }

    /// True when at least one line still has quantity that can be returned.
    pub fn has_returnable_items(&self) -> bool {
        self.items
            .iter()
            .any(|i| i.id.is_some() && i.quantity - i.returned_quantity > 0)
    }
}

// ---------------------------------------------------------------------------
// Field lookup
// ---------------------------------------------------------------------------

/// Resolve a dotted path such as `financial.grand_total`.
fn lookup<'a>(v: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(v, |node, key| node.get(key))
        .filter(|found| !found.is_null())
}

fn first_decimal(v: &Value, paths: &[&str]) -> Option<Decimal> {
    paths
        .iter()
        .find_map(|p| lookup(v, p).and_then(decimal_from_value))
}

fn money_field(v: &Value, paths: &[&str]) -> Decimal {
    first_decimal(v, paths).unwrap_or(Decimal::ZERO)
}

fn first_str(v: &Value, paths: &[&str]) -> Option<String> {
    paths.iter().find_map(|p| match lookup(v, p) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn first_id(v: &Value, paths: &[&str]) -> Option<String> {
    paths
        .iter()
        .find_map(|p| lookup(v, p).and_then(id_from_value))
}

fn first_i64(v: &Value, paths: &[&str]) -> Option<i64> {
    paths
        .iter()
        .find_map(|p| lookup(v, p).and_then(i64_from_value))
}

const LEGACY_KEYS: &[&str] = &[
    "grand_total",
    "total",
    "subtotal",
    "paid_amount",
    "due_amount",
    "payment_status",
    "payment_method",
];

fn classify(raw: &Value) -> OrderShape {
    let nested = ["financial", "payment"]
        .iter()
        .any(|k| raw.get(*k).map(Value::is_object).unwrap_or(false));
    let legacy = LEGACY_KEYS
        .iter()
        .any(|k| raw.get(*k).map(|v| !v.is_null() && !v.is_object()).unwrap_or(false));
    match (nested, legacy) {
        (true, true) => OrderShape::Mixed,
        (true, false) => OrderShape::Nested,
        _ => OrderShape::Legacy,
    }
}

fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

fn normalize_customer(raw: &Value) -> OrderCustomer {
    let id = first_id(raw, &["customer.id", "customer_id"]);
    let name = first_str(raw, &["customer.name", "customer_name"])
        .unwrap_or_else(|| WALK_IN_CUSTOMER.to_string());
    OrderCustomer {
        id,
        name,
        phone: first_str(
            raw,
            &["customer.phone", "customer.mobile", "customer_phone", "customer_mobile"],
        ),
        email: first_str(raw, &["customer.email", "customer_email"]),
        address: first_str(raw, &["customer.address", "customer_address"]),
    }
}

fn normalize_serials(item: &Value) -> Vec<String> {
    let list = ["serials", "serial_numbers", "serial_ids"]
        .iter()
        .find_map(|k| item.get(*k).and_then(Value::as_array));
    list.map(|entries| {
        entries
            .iter()
            .filter_map(|e| match e {
                Value::Object(_) => first_str(e, &["serial_number", "serial", "number", "id"]),
                other => id_from_value(other),
            })
            .collect()
    })
    .unwrap_or_default()
}

fn normalize_line(item: &Value) -> OrderLine {
    let quantity = first_i64(item, &["quantity", "qty"]).unwrap_or(0).max(0);
    let unit_price = money_field(item, &["unit_price", "price", "rate", "selling_price"]);
    let subtotal = first_decimal(item, &["subtotal", "sub_total", "total", "line_total"])
        .unwrap_or_else(|| {
            unit_price
                .checked_mul(Decimal::from(quantity))
                .unwrap_or(Decimal::ZERO)
        });
    OrderLine {
        id: first_id(item, &["id", "order_item_id"]),
        product_id: first_id(item, &["product_id", "product.id"]).unwrap_or_default(),
        name: first_str(item, &["product.name", "product_name", "name"])
            .unwrap_or_else(|| PLACEHOLDER.to_string()),
        sku: first_str(item, &["product.sku", "sku", "barcode"]),
        quantity,
        returned_quantity: first_i64(
            item,
            &["returned_quantity", "return_quantity", "returned_qty"],
        )
        .unwrap_or(0)
        .clamp(0, quantity),
        unit_price,
        tax: money_field(item, &["tax", "tax_amount"]),
        subtotal,
        serials: normalize_serials(item),
        warranty: first_str(item, &["warranty.name", "warranty_name", "warranty_type"]),
    }
}

fn normalize_items(raw: &Value) -> Vec<OrderLine> {
    ["items", "order_items", "details", "products"]
        .iter()
        .find_map(|k| raw.get(*k).and_then(Value::as_array))
        .map(|rows| {
            rows.iter()
                .filter(|row| row.is_object())
                .map(normalize_line)
                .collect()
        })
        .unwrap_or_default()
}

fn normalize_financials(raw: &Value) -> OrderFinancials {
    OrderFinancials {
        subtotal: money_field(
            raw,
            &["financial.subtotal", "financial.sub_total", "subtotal", "sub_total"],
        ),
        tax: money_field(
            raw,
            &["financial.tax", "financial.tax_amount", "tax", "tax_amount", "total_tax"],
        ),
        discount: money_field(
            raw,
            &[
                "financial.discount",
                "financial.discount_amount",
                "discount",
                "discount_amount",
            ],
        ),
        membership_discount: money_field(
            raw,
            &["financial.membership_discount", "membership_discount"],
        ),
        points_discount: money_field(
            raw,
            &[
                "financial.points_discount",
                "financial.loyalty_discount",
                "points_discount",
                "loyalty_discount",
            ],
        ),
        balance_discount: money_field(
            raw,
            &[
                "financial.balance_discount",
                "financial.balance_used",
                "balance_discount",
                "balance_used",
            ],
        ),
        grand_total: money_field(
            raw,
            &[
                "financial.grand_total",
                "financial.total",
                "grand_total",
                "total",
                "total_amount",
            ],
        ),
        paid_amount: money_field(
            raw,
            &[
                "payment.amount_paid",
                "payment.paid_amount",
                "financial.paid_amount",
                "paid_amount",
                "amount_paid",
                "paid",
            ],
        ),
        due_amount: money_field(
            raw,
            &[
                "payment.due_amount",
                "financial.due_amount",
                "due_amount",
                "due",
            ],
        ),
        change_amount: money_field(
            raw,
            &[
                "payment.change_amount",
                "financial.change_amount",
                "change_amount",
                "change",
            ],
        ),
    }
}

fn normalize_payment(raw: &Value) -> OrderPayment {
    let method = first_str(
        raw,
        &[
            "payment.method.name",
            "payment.method",
            "payment.payment_method",
            "payment_method.name",
            "payment_method",
            "payment_method_name",
        ],
    )
    .unwrap_or_else(|| PLACEHOLDER.to_string());
    let status = first_str(raw, &["payment.status", "payment.payment_status", "payment_status"])
        .and_then(|s| PaymentStatus::from_value(&s));
    OrderPayment { method, status }
}

/// Normalize one order payload into the canonical [`Order`].
pub fn normalize_order(raw: &Value) -> Order {
    let shape = classify(raw);
    let id = first_id(raw, &["id", "order_id"]).unwrap_or_default();
    let invoice_no = first_str(
        raw,
        &["invoice_no", "invoice_number", "order_number", "reference"],
    )
    .unwrap_or_else(|| {
        if id.is_empty() {
            PLACEHOLDER.to_string()
        } else {
            format!("#{id}")
        }
    });

    let order = Order {
        invoice_no,
        status: first_str(raw, &["status", "order_status"])
            .map(|s| s.to_ascii_lowercase())
            .unwrap_or_else(|| "completed".to_string()),
        created_at: first_str(raw, &["created_at", "order_date", "date"])
            .as_deref()
            .and_then(parse_datetime),
        store_name: first_str(raw, &["store.name", "store_name"]),
        customer: normalize_customer(raw),
        items: normalize_items(raw),
        financial: normalize_financials(raw),
        payment: normalize_payment(raw),
        note: first_str(raw, &["note", "notes"]),
        shape,
        id,
    };
    debug!(order_id = %order.id, shape = ?order.shape, items = order.items.len(), "Normalized order");
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn legacy_flat_order() {
        let order = normalize_order(&json!({
            "id": 7,
            "invoice_no": "INV-0007",
            "created_at": "2024-03-01 10:15:00",
            "customer_name": "Bo",
            "customer_id": 3,
            "subtotal": "200.00",
            "tax": 20,
            "discount": 10,
            "grand_total": "210.00",
            "paid_amount": 100,
            "due_amount": 110,
            "payment_status": "partial",
            "payment_method": "Cash",
            "items": [{ "id": 1, "product_name": "Kettle", "quantity": 2, "price": "100" }]
        }));
        assert_eq!(order.shape, OrderShape::Legacy);
        assert_eq!(order.invoice_no, "INV-0007");
        assert_eq!(order.customer.name, "Bo");
        assert_eq!(order.customer.id.as_deref(), Some("3"));
        assert_eq!(order.financial.grand_total, dec!(210));
        assert_eq!(order.financial.due_amount, dec!(110));
        assert_eq!(order.payment.status, Some(PaymentStatus::Partial));
        assert_eq!(order.payment.method, "Cash");
        assert_eq!(order.items[0].subtotal, dec!(200));
        assert_eq!(order.created_at_display(), "2024-03-01 10:15");
    }

    #[test]
    fn nested_order() {
        let order = normalize_order(&json!({
            "id": "a1",
            "order_number": "SO-1",
            "created_at": "2024-03-01T10:15:00Z",
            "customer": { "id": 5, "name": "Cy", "mobile": "555" },
            "financial": { "sub_total": 50, "tax_amount": 5, "total": 55 },
            "payment": { "method": { "name": "Card" }, "status": "paid", "amount_paid": 55 },
            "order_items": [
                { "product": { "id": 9, "name": "Mug", "sku": "MUG" }, "qty": "1", "unit_price": 50,
                  "serials": [{ "serial_number": "S1" }], "warranty": { "name": "1 Year" } }
            ]
        }));
        assert_eq!(order.shape, OrderShape::Nested);
        assert_eq!(order.invoice_no, "SO-1");
        assert_eq!(order.customer.phone.as_deref(), Some("555"));
        assert_eq!(order.financial.subtotal, dec!(50));
        assert_eq!(order.financial.grand_total, dec!(55));
        assert_eq!(order.financial.paid_amount, dec!(55));
        assert_eq!(order.payment.method, "Card");
        assert_eq!(order.items[0].product_id, "9");
        assert_eq!(order.items[0].sku.as_deref(), Some("MUG"));
        assert_eq!(order.items[0].serials, vec!["S1"]);
        assert_eq!(order.items[0].warranty.as_deref(), Some("1 Year"));
    }

    #[test]
    fn fallback_is_per_field() {
        // Nested object present but only partly populated: missing nested
        // fields fall back to flat ones individually.
        let order = normalize_order(&json!({
            "id": 1,
            "financial": { "grand_total": 99, "tax": null },
            "tax": "9",
            "grand_total": 1,
            "payment": { "status": null },
            "payment_status": "due"
        }));
        assert_eq!(order.shape, OrderShape::Mixed);
        assert_eq!(order.financial.grand_total, dec!(99));
        assert_eq!(order.financial.tax, dec!(9));
        assert_eq!(order.payment.status, Some(PaymentStatus::Due));
    }

    #[test]
    fn empty_payload_degrades_to_defaults() {
        let order = normalize_order(&json!({}));
        assert_eq!(order.id, "");
        assert_eq!(order.invoice_no, PLACEHOLDER);
        assert_eq!(order.customer.name, WALK_IN_CUSTOMER);
        assert!(order.customer.is_walk_in());
        assert_eq!(order.financial, OrderFinancials::default());
        assert_eq!(order.payment.method, PLACEHOLDER);
        assert_eq!(order.payment.status_label(), PLACEHOLDER);
        assert_eq!(order.created_at_display(), PLACEHOLDER);
        assert!(order.items.is_empty());

        let order = normalize_order(&json!("not an object"));
        assert_eq!(order.invoice_no, PLACEHOLDER);
    }

    #[test]
    fn returned_quantity_is_bounded() {
        let order = normalize_order(&json!({
            "id": 2,
            "items": [
                { "id": 1, "quantity": 2, "returned_quantity": 5, "price": 1 },
                { "id": 2, "quantity": 3, "returned_qty": "1", "price": 1 }
            ]
        }));
        assert_eq!(order.items[0].returned_quantity, 2);
        assert_eq!(order.items[1].returned_quantity, 1);
        assert!(order.has_returnable_items());
        assert_eq!(order.invoice_no, "#2");
    }

    #[test]
    fn items_without_an_id_do_not_borrow_a_position() {
        let order = normalize_order(&json!({
            "id": 4,
            "items": [
                { "id": 1, "product_name": "Kettle", "quantity": 1, "price": 10 },
                { "product_name": "Mug", "quantity": 3, "price": 2 }
            ]
        }));
        let ids: Vec<_> = order.items.iter().map(|i| i.id.as_deref()).collect();
        assert_eq!(ids, vec![Some("1"), None]);
        assert_eq!(order.items[1].subtotal, Decimal::from(6));
    }

    #[test]
    fn oversized_line_subtotal_falls_back_to_zero() {
        let order = normalize_order(&json!({
            "id": 5,
            "items": [{ "id": 1, "quantity": i64::MAX, "price": "79228162514264337593543950335" }]
        }));
        assert_eq!(order.items[0].subtotal, Decimal::ZERO);
    }
}
