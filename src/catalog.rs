//! Sellable stock lookup for the checkout screen.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use tracing::warn;

use crate::api::{build_query, unwrap_data, ApiClient};
use crate::error::PosError;
use crate::{value_decimal, value_flag, value_i64, value_id, value_str};

/// A stock row as offered at the till: one product in one store.
///
/// Serde derives cover the canonical shape only; rows from the store API go
/// through [`SellableStock::from_wire`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SellableStock {
    pub stock_id: String,
    pub product_id: String,
    pub name: String,
    pub sku: Option<String>,
    pub retail_price: Decimal,
    pub wholesale_price: Option<Decimal>,
    pub tax_rate: Option<Decimal>,
    pub tax_inclusive: bool,
    pub available_quantity: Option<u32>,
    pub serial_tracked: bool,
    pub available_serials: Vec<StockSerial>,
    pub warranty_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockSerial {
    pub id: String,
    pub serial: String,
}

/// Serials come as `[{id, serial_number}]`, `[{id, serial}]` or plain strings.
fn parse_serials(items: &[Value]) -> Vec<StockSerial> {
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(s) if !s.trim().is_empty() => Some(StockSerial {
                id: s.trim().to_string(),
                serial: s.trim().to_string(),
            }),
            Value::Object(_) => {
                let id = value_id(item, &["id"])?;
                let serial = value_str(item, &["serial_number", "serial", "number"])
                    .unwrap_or_else(|| id.clone());
                Some(StockSerial { id, serial })
            }
            _ => None,
        })
        .collect()
}

impl SellableStock {
    /// Decode one API row. Each field takes the first usable spelling, so a
    /// row carrying both `id` and `stock_id` still decodes. `None` only when
    /// the row has no stock id at all.
    pub fn from_wire(row: &Value) -> Option<Self> {
        let stock_id = value_id(row, &["stock_id", "id"])?;
        let available_serials = ["available_serials", "serials"]
            .iter()
            .find_map(|k| row.get(*k).and_then(Value::as_array))
            .map(|items| parse_serials(items))
            .unwrap_or_default();
        Some(Self {
            stock_id,
            product_id: value_id(row, &["product_id"]).unwrap_or_default(),
            name: value_str(row, &["name", "product_name"]).unwrap_or_default(),
            sku: value_str(row, &["sku", "barcode"]),
            retail_price: value_decimal(row, &["retail_price", "selling_price", "price"])
                .unwrap_or(Decimal::ZERO),
            wholesale_price: value_decimal(row, &["wholesale_price"]),
            tax_rate: value_decimal(row, &["tax_rate", "tax_percentage", "tax"]),
            tax_inclusive: value_flag(row, &["tax_inclusive", "is_tax_inclusive"]).unwrap_or(false),
            available_quantity: value_i64(row, &["available_quantity", "quantity", "stock_quantity"])
                .map(|q| q.clamp(0, u32::MAX as i64) as u32),
            serial_tracked: value_flag(row, &["serial_tracked", "has_serial"]).unwrap_or(false),
            available_serials,
            warranty_id: value_id(row, &["warranty_id"]),
        })
    }

    /// Wholesale price, falling back to retail when none is set.
    pub fn effective_wholesale_price(&self) -> Decimal {
        self.wholesale_price.unwrap_or(self.retail_price)
    }
}

pub struct CatalogApi<'a> {
    client: &'a ApiClient,
}

impl<'a> CatalogApi<'a> {
    pub fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// Search sellable stock in a store by name, SKU or barcode.
    pub async fn search(&self, store_id: &str, query: &str) -> Result<Vec<SellableStock>, PosError> {
        let path = build_query(
            &format!("/api/stores/{store_id}/stocks"),
            &[("search", query.to_string())],
        );
        let body = unwrap_data(self.client.get_value(&path).await?);
        Ok(parse_stock_rows(&body))
    }
}

/// Rows without a stock id are skipped with a warning rather than failing
/// the listing.
pub fn parse_stock_rows(body: &Value) -> Vec<SellableStock> {
    body.as_array()
        .map(|rows| {
            rows.iter()
                .filter_map(|row| {
                    let stock = SellableStock::from_wire(row);
                    if stock.is_none() {
                        warn!(row = %row, "Skipping stock row without an id");
                    }
                    stock
                })
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn parses_mixed_wire_encodings() {
        let rows = parse_stock_rows(&json!([
            {
                "id": 11,
                "product_id": "5",
                "product_name": "USB Cable",
                "selling_price": "4.50",
                "wholesale_price": 3,
                "tax": "10",
                "is_tax_inclusive": 1,
                "quantity": "12",
                "has_serial": false
            },
            {
                "stock_id": "12",
                "name": "Phone",
                "price": 300,
                "has_serial": "1",
                "serials": [{ "id": 1, "serial_number": "SN-1" }, "SN-2"],
                "warranty_id": 4
            },
            "garbage"
        ]));
        assert_eq!(rows.len(), 2);

        let cable = &rows[0];
        assert_eq!(cable.stock_id, "11");
        assert_eq!(cable.retail_price, dec!(4.50));
        assert_eq!(cable.effective_wholesale_price(), dec!(3));
        assert_eq!(cable.tax_rate, Some(dec!(10)));
        assert!(cable.tax_inclusive);
        assert_eq!(cable.available_quantity, Some(12));

        let phone = &rows[1];
        assert!(phone.serial_tracked);
        assert_eq!(phone.effective_wholesale_price(), dec!(300));
        assert_eq!(phone.available_serials.len(), 2);
        assert_eq!(phone.available_serials[0].serial, "SN-1");
        assert_eq!(phone.available_serials[1].id, "SN-2");
        assert_eq!(phone.warranty_id.as_deref(), Some("4"));
        assert_eq!(phone.available_quantity, None);
    }

    #[test]
    fn rows_with_several_spellings_of_a_field_still_decode() {
        let rows = parse_stock_rows(&json!([
            { "id": 7, "stock_id": 11, "product_id": 3, "name": "Mouse", "product_name": "Mouse (old)",
              "price": "9", "selling_price": "10", "quantity": 4, "stock_quantity": 8 },
            { "stock_id": 12, "name": "Pad", "product_name": "Pad", "barcode": "B-12", "sku": "P-12",
              "tax": 5, "tax_rate": 7, "has_serial": 1, "serial_tracked": null }
        ]));
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].stock_id, "11");
        assert_eq!(rows[0].name, "Mouse");
        assert_eq!(rows[0].retail_price, dec!(9));
        assert_eq!(rows[0].available_quantity, Some(4));
        assert_eq!(rows[1].sku.as_deref(), Some("P-12"));
        assert_eq!(rows[1].tax_rate, Some(dec!(7)));
        assert!(rows[1].serial_tracked);
    }

    #[test]
    fn rows_without_an_id_are_skipped() {
        let rows = parse_stock_rows(&json!([{ "name": "Ghost" }, { "id": "", "name": "Blank" }]));
        assert!(rows.is_empty());
    }

    #[test]
    fn non_array_body_yields_nothing() {
        assert!(parse_stock_rows(&json!({ "message": "none" })).is_empty());
    }
}
