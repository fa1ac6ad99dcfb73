//! Stock adjustment drafts: manual additions and write-offs against store stock.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::api::{unwrap_data, ApiClient};
use crate::catalog::SellableStock;
use crate::error::PosError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AdjustmentKind {
    #[default]
    Addition,
    Subtraction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentLine {
    pub stock_id: String,
    pub name: String,
    pub current_quantity: i64,
    pub quantity: i64,
    pub kind: AdjustmentKind,
}

impl AdjustmentLine {
    pub fn resulting_quantity(&self) -> i64 {
        match self.kind {
            AdjustmentKind::Addition => self.current_quantity + self.quantity,
            AdjustmentKind::Subtraction => self.current_quantity - self.quantity,
        }
    }

    fn check(&self) -> Result<(), PosError> {
        if self.quantity <= 0 {
            return Err(PosError::validation(format!(
                "Enter a quantity above zero for {}",
                self.name
            )));
        }
        if self.kind == AdjustmentKind::Subtraction && self.quantity > self.current_quantity {
            return Err(PosError::validation(format!(
                "Cannot remove {} of {}; only {} in stock",
                self.quantity, self.name, self.current_quantity
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdjustmentItemRequest {
    pub stock_id: String,
    #[serde(rename = "type")]
    pub kind: AdjustmentKind,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockAdjustmentRequest {
    pub store_id: String,
    pub reason_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub items: Vec<AdjustmentItemRequest>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StockAdjustmentDraft {
    store_id: Option<String>,
    reason_id: Option<String>,
    note: Option<String>,
    lines: Vec<AdjustmentLine>,
}

impl StockAdjustmentDraft {
    pub fn new(store_id: Option<String>) -> Self {
        Self {
            store_id,
            ..Self::default()
        }
    }

    pub fn lines(&self) -> &[AdjustmentLine] {
        &self.lines
    }

    pub fn set_reason(&mut self, reason_id: Option<String>) {
        self.reason_id = reason_id.filter(|r| !r.trim().is_empty());
    }

    pub fn set_note(&mut self, note: Option<String>) {
        self.note = note
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
    }

    /// Add a stock with quantity one as an addition. A stock can appear once.
    pub fn add_stock(&mut self, stock: &SellableStock) -> Result<(), PosError> {
        if self.lines.iter().any(|l| l.stock_id == stock.stock_id) {
            return Err(PosError::validation(format!(
                "{} is already in the adjustment",
                stock.name
            )));
        }
        self.lines.push(AdjustmentLine {
            stock_id: stock.stock_id.clone(),
            name: stock.name.clone(),
            current_quantity: stock.available_quantity.map(i64::from).unwrap_or(0),
            quantity: 1,
            kind: AdjustmentKind::Addition,
        });
        Ok(())
    }

    fn line_mut(&mut self, stock_id: &str) -> Result<&mut AdjustmentLine, PosError> {
        self.lines
            .iter_mut()
            .find(|l| l.stock_id == stock_id)
            .ok_or_else(|| PosError::validation("Item is not part of this adjustment"))
    }

    /// Change quantity and kind together; the line is left untouched when the
    /// result would be invalid.
    pub fn set_line(&mut self, stock_id: &str, quantity: i64, kind: AdjustmentKind) -> Result<(), PosError> {
        let line = self.line_mut(stock_id)?;
        let candidate = AdjustmentLine {
            quantity,
            kind,
            ..line.clone()
        };
        if let Err(e) = candidate.check() {
            warn!(stock_id, quantity, kind = ?kind, "Rejected stock adjustment line");
            return Err(e);
        }
        *line = candidate;
        Ok(())
    }

    pub fn remove(&mut self, stock_id: &str) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| l.stock_id != stock_id);
        self.lines.len() != before
    }

    pub fn to_request(&self) -> Result<StockAdjustmentRequest, PosError> {
        let store_id = self
            .store_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| PosError::validation("Select a store first"))?;
        let reason_id = self
            .reason_id
            .clone()
            .ok_or_else(|| PosError::validation("Select an adjustment reason"))?;
        if self.lines.is_empty() {
            return Err(PosError::validation("Add at least one product to adjust"));
        }
        for line in &self.lines {
            line.check()?;
        }
        Ok(StockAdjustmentRequest {
            store_id: store_id.to_string(),
            reason_id,
            note: self.note.clone(),
            items: self
                .lines
                .iter()
                .map(|l| AdjustmentItemRequest {
                    stock_id: l.stock_id.clone(),
                    kind: l.kind,
                    quantity: l.quantity,
                })
                .collect(),
        })
    }
}

pub struct StockAdjustmentsApi<'a> {
    client: &'a ApiClient,
}

impl<'a> StockAdjustmentsApi<'a> {
    pub fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    pub async fn submit(&self, draft: &StockAdjustmentDraft) -> Result<Value, PosError> {
        let request = draft.to_request()?;
        let path = format!("/api/stores/{}/stock-adjustments", request.store_id);
        let body = self.client.post_value(&path, &request).await?;
        info!(
            store_id = %request.store_id,
            reason_id = %request.reason_id,
            lines = request.items.len(),
            "Stock adjustment submitted"
        );
        Ok(unwrap_data(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stock(id: &str, available: u32) -> SellableStock {
        SellableStock {
            stock_id: id.into(),
            name: format!("Item {id}"),
            available_quantity: Some(available),
            ..SellableStock::default()
        }
    }

    #[test]
    fn resulting_quantity_follows_kind() {
        let mut draft = StockAdjustmentDraft::new(Some("1".into()));
        draft.add_stock(&stock("a", 5)).unwrap();
        draft.set_line("a", 3, AdjustmentKind::Addition).unwrap();
        assert_eq!(draft.lines()[0].resulting_quantity(), 8);
        draft.set_line("a", 5, AdjustmentKind::Subtraction).unwrap();
        assert_eq!(draft.lines()[0].resulting_quantity(), 0);
    }

    #[test]
    fn rejects_over_subtraction_and_duplicates() {
        let mut draft = StockAdjustmentDraft::new(Some("1".into()));
        draft.add_stock(&stock("a", 2)).unwrap();
        assert!(draft.add_stock(&stock("a", 2)).is_err());
        let err = draft.set_line("a", 3, AdjustmentKind::Subtraction).unwrap_err();
        assert_eq!(err.user_message(), "Cannot remove 3 of Item a; only 2 in stock");
        assert_eq!(draft.lines()[0].quantity, 1);
        assert_eq!(draft.lines()[0].kind, AdjustmentKind::Addition);
        assert!(draft.set_line("a", 0, AdjustmentKind::Addition).is_err());
    }

    #[test]
    fn request_validation_and_payload() {
        let mut draft = StockAdjustmentDraft::new(None);
        assert!(draft.to_request().is_err());

        let mut draft = StockAdjustmentDraft::new(Some("7".into()));
        draft.add_stock(&stock("a", 4)).unwrap();
        assert_eq!(draft.to_request().unwrap_err().user_message(), "Select an adjustment reason");
        draft.set_reason(Some("r".into()));
        draft.set_line("a", 2, AdjustmentKind::Subtraction).unwrap();
        draft.set_note(Some(" broken ".into()));

        let json = serde_json::to_value(draft.to_request().unwrap()).unwrap();
        assert_eq!(json["store_id"], "7");
        assert_eq!(json["reason_id"], "r");
        assert_eq!(json["note"], "broken");
        assert_eq!(json["items"][0]["type"], "subtraction");
        assert_eq!(json["items"][0]["quantity"], 2);

        assert!(draft.remove("a"));
        assert!(draft.to_request().is_err());
    }
}
