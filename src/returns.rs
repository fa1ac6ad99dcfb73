//! Order returns.
//!
//! A return session is opened from a normalized order and edited line by line
//! before submission. Sessions live behind a [`ReturnSessionRepository`] keyed
//! by store so a screen can resume the one in progress.
//!
//! **Rules:**
//! - A line can return at most `sold − already returned`
//! - Lines the backend sent without an item id cannot be returned
//! - Every line with a quantity needs a reason
//! - Refund per unit is the billed line subtotal divided by the sold quantity
//! - Walk-in orders cannot be refunded to a customer balance

use std::collections::HashMap;
use std::sync::Mutex;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::api::{build_query, unwrap_data, ApiClient, Page};
use crate::error::PosError;
use crate::money::{decimal_from_value, id_from_value, round_money};
use crate::orders::{Order, OrderLine};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RefundMethod {
    #[default]
    Cash,
    CustomerBalance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnLine {
    pub order_item_id: Option<String>,
    pub product_id: String,
    pub name: String,
    pub sold_quantity: i64,
    pub returned_quantity: i64,
    pub unit_refund: Decimal,
    pub return_quantity: i64,
    pub reason_id: Option<String>,
}

impl ReturnLine {
    fn from_order_line(line: &OrderLine) -> Self {
        let unit_refund = if line.quantity > 0 {
            line.subtotal / Decimal::from(line.quantity)
        } else {
            Decimal::ZERO
        };
        Self {
            order_item_id: line.id.clone(),
            product_id: line.product_id.clone(),
            name: line.name.clone(),
            sold_quantity: line.quantity,
            returned_quantity: line.returned_quantity,
            unit_refund,
            return_quantity: 0,
            reason_id: None,
        }
    }

    pub fn returnable(&self) -> i64 {
        if self.order_item_id.is_none() {
            return 0;
        }
        (self.sold_quantity - self.returned_quantity).max(0)
    }

    pub fn refund_amount(&self) -> Decimal {
        self.unit_refund
            .checked_mul(Decimal::from(self.return_quantity))
            .map(round_money)
            .unwrap_or(Decimal::ZERO)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnSession {
    pub store_id: String,
    pub order_id: String,
    pub invoice_no: String,
    pub customer_id: Option<String>,
    lines: Vec<ReturnLine>,
    refund_method: RefundMethod,
    note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReturnItemRequest {
    pub order_item_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub reason_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub refund_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReturnRequest {
    pub order_id: String,
    pub store_id: String,
    pub refund_method: RefundMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub items: Vec<ReturnItemRequest>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_refund: Decimal,
}

impl ReturnSession {
    pub fn from_order(store_id: &str, order: &Order) -> Self {
        Self {
            store_id: store_id.to_string(),
            order_id: order.id.clone(),
            invoice_no: order.invoice_no.clone(),
            customer_id: order.customer.id.clone(),
            lines: order.items.iter().map(ReturnLine::from_order_line).collect(),
            refund_method: RefundMethod::Cash,
            note: None,
        }
    }

    pub fn lines(&self) -> &[ReturnLine] {
        &self.lines
    }

    pub fn refund_method(&self) -> RefundMethod {
        self.refund_method
    }

    pub fn note(&self) -> Option<&str> {
        self.note.as_deref()
    }

    fn line_mut(&mut self, order_item_id: &str) -> Result<&mut ReturnLine, PosError> {
        self.lines
            .iter_mut()
            .find(|l| l.order_item_id.as_deref() == Some(order_item_id))
            .ok_or_else(|| PosError::validation("Item is not part of this order"))
    }

    pub fn set_return_quantity(&mut self, order_item_id: &str, quantity: i64) -> Result<(), PosError> {
        let line = self.line_mut(order_item_id)?;
        if quantity < 0 {
            return Err(PosError::validation("Return quantity cannot be negative"));
        }
        let returnable = line.returnable();
        if quantity > returnable {
            warn!(order_item_id, requested = quantity, returnable, "Rejected return above returnable quantity");
            return Err(PosError::validation(format!(
                "Only {returnable} of {} can be returned",
                line.name
            )));
        }
        line.return_quantity = quantity;
        Ok(())
    }

    pub fn set_reason(&mut self, order_item_id: &str, reason_id: Option<String>) -> Result<(), PosError> {
        let line = self.line_mut(order_item_id)?;
        line.reason_id = reason_id.filter(|r| !r.trim().is_empty());
        Ok(())
    }

    pub fn set_note(&mut self, note: Option<String>) {
        self.note = note
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
    }

    pub fn set_refund_method(&mut self, method: RefundMethod) -> Result<(), PosError> {
        if method == RefundMethod::CustomerBalance && self.customer_id.is_none() {
            return Err(PosError::validation(
                "Walk-in orders cannot be refunded to a customer balance",
            ));
        }
        self.refund_method = method;
        Ok(())
    }

    pub fn refund_total(&self) -> Decimal {
        self.lines.iter().map(ReturnLine::refund_amount).sum()
    }

    pub fn to_request(&self) -> Result<ReturnRequest, PosError> {
        let selected: Vec<&ReturnLine> =
            self.lines.iter().filter(|l| l.return_quantity > 0).collect();
        if selected.is_empty() {
            return Err(PosError::validation("Select at least one item to return"));
        }
        let mut items = Vec::with_capacity(selected.len());
        for line in selected {
            let order_item_id = line.order_item_id.clone().ok_or_else(|| {
                PosError::validation(format!("{} cannot be returned from this order", line.name))
            })?;
            let reason_id = line
                .reason_id
                .clone()
                .ok_or_else(|| PosError::validation(format!("Select a return reason for {}", line.name)))?;
            items.push(ReturnItemRequest {
                order_item_id,
                product_id: line.product_id.clone(),
                quantity: line.return_quantity,
                reason_id,
                refund_amount: line.refund_amount(),
            });
        }
        Ok(ReturnRequest {
            order_id: self.order_id.clone(),
            store_id: self.store_id.clone(),
            refund_method: self.refund_method,
            note: self.note.clone(),
            items,
            total_refund: self.refund_total(),
        })
    }
}

// ---------------------------------------------------------------------------
// Session storage
// ---------------------------------------------------------------------------

/// Holds the return session in progress per store. Writes are last-writer-wins.
pub trait ReturnSessionRepository: Send + Sync {
    fn init(&self, session: ReturnSession);
    fn get(&self, store_id: &str) -> Option<ReturnSession>;
    /// Apply `edit` to the stored session. Errors when none was initialised.
    fn update(
        &self,
        store_id: &str,
        edit: &mut dyn FnMut(&mut ReturnSession) -> Result<(), PosError>,
    ) -> Result<(), PosError>;
    fn clear(&self, store_id: &str);
}

#[derive(Debug, Default)]
pub struct InMemoryReturnSessions {
    sessions: Mutex<HashMap<String, ReturnSession>>,
}

impl InMemoryReturnSessions {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, ReturnSession>> {
        // A panic mid-edit leaves a plain value behind; keep using it.
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ReturnSessionRepository for InMemoryReturnSessions {
    fn init(&self, session: ReturnSession) {
        self.lock().insert(session.store_id.clone(), session);
    }

    fn get(&self, store_id: &str) -> Option<ReturnSession> {
        self.lock().get(store_id).cloned()
    }

    fn update(
        &self,
        store_id: &str,
        edit: &mut dyn FnMut(&mut ReturnSession) -> Result<(), PosError>,
    ) -> Result<(), PosError> {
        let mut sessions = self.lock();
        let session = sessions
            .get_mut(store_id)
            .ok_or_else(|| PosError::validation("No return in progress"))?;
        edit(session)
    }

    fn clear(&self, store_id: &str) {
        self.lock().remove(store_id);
    }
}

// ---------------------------------------------------------------------------
// API
// ---------------------------------------------------------------------------

/// A past return as listed by the store API.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReturnRecord {
    pub id: String,
    pub order_id: Option<String>,
    pub invoice_no: Option<String>,
    pub total_refund: Decimal,
    pub created_at: Option<String>,
}

fn parse_return_record(row: &Value) -> Option<ReturnRecord> {
    let id = row.get("id").and_then(id_from_value)?;
    Some(ReturnRecord {
        id,
        order_id: row.get("order_id").and_then(id_from_value),
        invoice_no: crate::value_str(row, &["invoice_no", "order_number", "reference"]),
        total_refund: ["total_refund", "refund_amount", "total"]
            .iter()
            .find_map(|k| row.get(*k).and_then(decimal_from_value))
            .unwrap_or(Decimal::ZERO),
        created_at: crate::value_str(row, &["created_at", "date"]),
    })
}

pub struct ReturnsApi<'a> {
    client: &'a ApiClient,
}

impl<'a> ReturnsApi<'a> {
    pub fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    pub async fn submit(&self, session: &ReturnSession) -> Result<Value, PosError> {
        let request = session.to_request()?;
        let path = format!("/api/stores/{}/order-returns", request.store_id);
        let body = self.client.post_value(&path, &request).await?;
        info!(
            store_id = %request.store_id,
            order_id = %request.order_id,
            items = request.items.len(),
            total_refund = %request.total_refund,
            "Order return submitted"
        );
        Ok(unwrap_data(body))
    }

    pub async fn list(&self, store_id: &str, page: u32) -> Result<Page<ReturnRecord>, PosError> {
        let path = build_query(
            &format!("/api/stores/{store_id}/order-returns"),
            &[("page", page.max(1).to_string())],
        );
        let body = self.client.get_value(&path).await?;
        Ok(Page::from_value(&body, parse_return_record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::normalize_order;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn order(customer: bool) -> Order {
        let mut raw = json!({
            "id": 11,
            "invoice_no": "INV-11",
            "items": [
                { "id": 1, "product_id": 5, "product_name": "Kettle", "quantity": 3,
                  "returned_quantity": 1, "unit_price": 100, "subtotal": "270" },
                { "id": 2, "product_id": 6, "product_name": "Mug", "quantity": 1,
                  "unit_price": 10 }
            ]
        });
        if customer {
            raw["customer"] = json!({ "id": 4, "name": "Ed" });
        }
        normalize_order(&raw)
    }

    #[test]
    fn returnable_is_sold_minus_returned() {
        let mut session = ReturnSession::from_order("1", &order(false));
        assert_eq!(session.lines()[0].returnable(), 2);
        let err = session.set_return_quantity("1", 3).unwrap_err();
        assert_eq!(err.user_message(), "Only 2 of Kettle can be returned");
        session.set_return_quantity("1", 2).unwrap();
        assert!(session.set_return_quantity("9", 1).is_err());
    }

    #[test]
    fn refund_uses_billed_unit_price() {
        let mut session = ReturnSession::from_order("1", &order(false));
        session.set_return_quantity("1", 2).unwrap();
        session.set_return_quantity("2", 1).unwrap();
        assert_eq!(session.lines()[0].refund_amount(), dec!(180));
        assert_eq!(session.refund_total(), dec!(190));
    }

    #[test]
    fn request_requires_lines_and_reasons() {
        let mut session = ReturnSession::from_order("1", &order(true));
        assert!(session.to_request().is_err());

        session.set_return_quantity("1", 1).unwrap();
        let err = session.to_request().unwrap_err();
        assert_eq!(err.user_message(), "Select a return reason for Kettle");

        session.set_reason("1", Some("r1".into())).unwrap();
        session.set_refund_method(RefundMethod::CustomerBalance).unwrap();
        session.set_note(Some(" damaged box ".into()));
        let req = session.to_request().unwrap();
        assert_eq!(req.items.len(), 1);
        assert_eq!(req.total_refund, dec!(90));

        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["refund_method"], "customer_balance");
        assert_eq!(json["items"][0]["order_item_id"], "1");
        assert_eq!(json["items"][0]["refund_amount"], 90.0);
        assert_eq!(json["note"], "damaged box");
    }

    #[test]
    fn walk_in_cannot_refund_to_balance() {
        let mut session = ReturnSession::from_order("1", &order(false));
        assert!(session.set_refund_method(RefundMethod::CustomerBalance).is_err());
        assert_eq!(session.refund_method(), RefundMethod::Cash);
    }

    #[test]
    fn repository_is_keyed_by_store_with_explicit_clear() {
        let repo = InMemoryReturnSessions::new();
        assert!(repo.get("1").is_none());
        assert!(repo.update("1", &mut |_: &mut ReturnSession| Ok(())).is_err());

        repo.init(ReturnSession::from_order("1", &order(false)));
        repo.update("1", &mut |s: &mut ReturnSession| s.set_return_quantity("2", 1)).unwrap();
        assert_eq!(repo.get("1").unwrap().lines()[1].return_quantity, 1);
        assert!(repo.get("2").is_none());

        // A second init replaces the first.
        repo.init(ReturnSession::from_order("1", &order(true)));
        assert_eq!(repo.get("1").unwrap().lines()[1].return_quantity, 0);

        repo.clear("1");
        assert!(repo.get("1").is_none());
    }

    #[test]
    fn lines_without_an_item_id_cannot_be_returned() {
        let raw = json!({
            "id": 12,
            "items": [
                { "id": 1, "product_name": "Kettle", "quantity": 1, "unit_price": 10 },
                { "product_name": "Mug", "quantity": 3, "unit_price": 2 }
            ]
        });
        let mut session = ReturnSession::from_order("1", &normalize_order(&raw));
        assert_eq!(session.lines()[1].order_item_id, None);
        assert_eq!(session.lines()[1].returnable(), 0);

        // The Mug's position must not stand in for an id.
        assert!(session.set_return_quantity("0", 1).is_err());
        assert!(session.set_return_quantity("1", 2).is_err());
        session.set_return_quantity("1", 1).unwrap();
        assert_eq!(session.lines()[0].return_quantity, 1);
        assert_eq!(session.lines()[1].return_quantity, 0);

        // A restored session that still carries a quantity is refused.
        let mut restored = session.clone();
        restored.lines[1].return_quantity = 3;
        restored.lines[1].reason_id = Some("r".into());
        restored.set_reason("1", Some("r".into())).unwrap();
        let err = restored.to_request().unwrap_err();
        assert_eq!(err.user_message(), "Mug cannot be returned from this order");
    }

    #[test]
    fn oversized_refund_does_not_panic() {
        let mut session = ReturnSession::from_order("1", &order(false));
        session.lines[0].unit_refund = Decimal::MAX;
        session.lines[0].return_quantity = 2;
        assert_eq!(session.lines()[0].refund_amount(), Decimal::ZERO);
    }

    #[test]
    fn parses_return_listing() {
        let body = json!({ "data": [
            { "id": 3, "order_id": 11, "invoice_no": "INV-11", "total_refund": "90.00" },
            { "order_id": 12 }
        ] });
        let page = Page::from_value(&body, parse_return_record);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].total_refund, dec!(90));
    }
}
