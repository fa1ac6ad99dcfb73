//! Cart line items and their edit rules.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::catalog::SellableStock;
use crate::error::PosError;

/// Upper bound for a line quantity typed at the till.
pub const MAX_LINE_QUANTITY: u32 = 99_999;

/// Upper bound for a unit price, in store currency.
pub const MAX_UNIT_PRICE: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PriceMode {
    #[default]
    Retail,
    Wholesale,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub line_id: Uuid,
    pub stock_id: String,
    pub product_id: String,
    pub name: String,
    pub sku: Option<String>,
    pub quantity: u32,
    /// Current rate; follows `price_mode` unless edited by hand.
    pub unit_price: Decimal,
    pub price_mode: PriceMode,
    pub retail_price: Decimal,
    pub wholesale_price: Decimal,
    pub tax_rate: Option<Decimal>,
    pub tax_inclusive: bool,
    pub max_quantity: Option<u32>,
    pub serial_tracked: bool,
    pub serial_ids: Vec<String>,
    pub warranty_id: Option<String>,
}

impl CartLine {
    pub fn from_stock(stock: &SellableStock) -> Self {
        Self {
            line_id: Uuid::new_v4(),
            stock_id: stock.stock_id.clone(),
            product_id: stock.product_id.clone(),
            name: stock.name.clone(),
            sku: stock.sku.clone(),
            quantity: 1,
            unit_price: bounded_price(stock.retail_price),
            price_mode: PriceMode::Retail,
            retail_price: bounded_price(stock.retail_price),
            wholesale_price: bounded_price(stock.effective_wholesale_price()),
            tax_rate: stock.tax_rate.filter(|r| *r > Decimal::ZERO),
            tax_inclusive: stock.tax_inclusive,
            max_quantity: stock.available_quantity,
            serial_tracked: stock.serial_tracked,
            serial_ids: Vec::new(),
            warranty_id: stock.warranty_id.clone(),
        }
    }

    /// `rate × quantity`.
    pub fn line_total(&self) -> Decimal {
        self.unit_price.saturating_mul(Decimal::from(self.quantity))
    }
}

fn bounded_price(price: Decimal) -> Decimal {
    price.clamp(Decimal::ZERO, MAX_UNIT_PRICE)
}

fn exceeds_message(max: u32) -> String {
    format!("Only {max} available in stock")
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn line(&self, line_id: Uuid) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.line_id == line_id)
    }

    fn line_mut(&mut self, line_id: Uuid) -> Result<&mut CartLine, PosError> {
        self.lines
            .iter_mut()
            .find(|l| l.line_id == line_id)
            .ok_or_else(|| PosError::validation("Item is no longer in the cart"))
    }

    /// Add one unit of `stock`, merging into an existing line for the same
    /// stock. Returns the line id.
    pub fn add_stock(&mut self, stock: &SellableStock) -> Result<Uuid, PosError> {
        if stock.available_quantity == Some(0) {
            return Err(PosError::validation(format!("{} is out of stock", stock.name)));
        }
        if let Some(line) = self.lines.iter_mut().find(|l| l.stock_id == stock.stock_id) {
            let next = line.quantity.saturating_add(1);
            if let Some(max) = line.max_quantity.filter(|m| next > *m) {
                warn!(stock_id = %line.stock_id, max, "Rejected quantity above available stock");
                return Err(PosError::validation(exceeds_message(max)));
            }
            if next > MAX_LINE_QUANTITY {
                warn!(stock_id = %line.stock_id, "Rejected quantity above line limit");
                return Err(PosError::validation(format!(
                    "Quantity cannot exceed {MAX_LINE_QUANTITY}"
                )));
            }
            line.quantity = next;
            return Ok(line.line_id);
        }
        let line = CartLine::from_stock(stock);
        let id = line.line_id;
        debug!(stock_id = %line.stock_id, "Added line to cart");
        self.lines.push(line);
        Ok(id)
    }

    /// Set a quantity typed by the user. Zero is accepted while editing;
    /// see [`Cart::normalize_quantity_on_blur`].
    pub fn set_quantity(&mut self, line_id: Uuid, quantity: u32) -> Result<(), PosError> {
        let line = self.line_mut(line_id)?;
        if let Some(max) = line.max_quantity.filter(|m| quantity > *m) {
            warn!(stock_id = %line.stock_id, requested = quantity, max, "Rejected quantity above available stock");
            return Err(PosError::validation(exceeds_message(max)));
        }
        if quantity > MAX_LINE_QUANTITY {
            warn!(stock_id = %line.stock_id, requested = quantity, "Rejected quantity above line limit");
            return Err(PosError::validation(format!(
                "Quantity cannot exceed {MAX_LINE_QUANTITY}"
            )));
        }
        if line.serial_tracked && (line.serial_ids.len() as u32) > quantity {
            line.serial_ids.truncate(quantity as usize);
        }
        line.quantity = quantity;
        Ok(())
    }

    /// A line left at zero when the field loses focus goes back to one.
    pub fn normalize_quantity_on_blur(&mut self, line_id: Uuid) -> Result<(), PosError> {
        let line = self.line_mut(line_id)?;
        if line.quantity == 0 {
            line.quantity = 1;
        }
        Ok(())
    }

    /// Hand-edited price; negative input floors at zero.
    pub fn set_unit_price(&mut self, line_id: Uuid, price: Decimal) -> Result<(), PosError> {
        let line = self.line_mut(line_id)?;
        if price > MAX_UNIT_PRICE {
            return Err(PosError::validation(format!(
                "Price cannot exceed {MAX_UNIT_PRICE}"
            )));
        }
        line.unit_price = price.max(Decimal::ZERO);
        Ok(())
    }

    /// Switch between retail and wholesale pricing for one line.
    pub fn set_price_mode(&mut self, line_id: Uuid, mode: PriceMode) -> Result<(), PosError> {
        let line = self.line_mut(line_id)?;
        line.price_mode = mode;
        line.unit_price = match mode {
            PriceMode::Retail => line.retail_price,
            PriceMode::Wholesale => line.wholesale_price,
        };
        Ok(())
    }

    pub fn set_serials(&mut self, line_id: Uuid, serial_ids: Vec<String>) -> Result<(), PosError> {
        let line = self.line_mut(line_id)?;
        if !line.serial_tracked {
            return Err(PosError::validation(format!(
                "{} does not track serial numbers",
                line.name
            )));
        }
        let mut unique: Vec<String> = Vec::with_capacity(serial_ids.len());
        for id in serial_ids {
            let id = id.trim().to_string();
            if !id.is_empty() && !unique.contains(&id) {
                unique.push(id);
            }
        }
        if unique.len() as u32 > line.quantity {
            return Err(PosError::validation(format!(
                "Select at most {} serial number(s) for {}",
                line.quantity, line.name
            )));
        }
        line.serial_ids = unique;
        Ok(())
    }

    pub fn set_warranty(&mut self, line_id: Uuid, warranty_id: Option<String>) -> Result<(), PosError> {
        let line = self.line_mut(line_id)?;
        line.warranty_id = warranty_id.filter(|w| !w.trim().is_empty());
        Ok(())
    }

    pub fn remove(&mut self, line_id: Uuid) -> Option<CartLine> {
        let idx = self.lines.iter().position(|l| l.line_id == line_id)?;
        Some(self.lines.remove(idx))
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn item_count(&self) -> u64 {
        self.lines
            .iter()
            .fold(0u64, |acc, l| acc.saturating_add(u64::from(l.quantity)))
    }
}
