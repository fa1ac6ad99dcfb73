//! Payment draft: who is buying, which discounts apply and how it is paid.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::customers::{Customer, MembershipTier};
use crate::error::PosError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Paid,
    Partial,
    Due,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Paid => "paid",
            Self::Partial => "partial",
            Self::Due => "due",
        }
    }

    pub fn from_value(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "paid" | "complete" | "completed" => Some(Self::Paid),
            "partial" | "partially_paid" | "partially paid" => Some(Self::Partial),
            "due" | "unpaid" | "pending" => Some(Self::Due),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum CustomerSelection {
    /// No customer record attached.
    #[default]
    WalkIn,
    Customer(Customer),
}

impl CustomerSelection {
    pub fn customer(&self) -> Option<&Customer> {
        match self {
            Self::WalkIn => None,
            Self::Customer(c) => Some(c),
        }
    }

    pub fn is_walk_in(&self) -> bool {
        matches!(self, Self::WalkIn)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PaymentDraft {
    customer: CustomerSelection,
    discount_percent: Decimal,
    points_to_use: i64,
    balance_to_use: Decimal,
    payment_method_id: Option<String>,
    status: PaymentStatus,
    partial_amount: Decimal,
    amount_tendered: Option<Decimal>,
    note: Option<String>,
}

impl PaymentDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn customer(&self) -> &CustomerSelection {
        &self.customer
    }

    pub fn discount_percent(&self) -> Decimal {
        self.discount_percent
    }

    pub fn membership_tier(&self) -> MembershipTier {
        self.customer
            .customer()
            .map(|c| c.membership_tier)
            .unwrap_or_default()
    }

    pub fn membership_discount_percent(&self) -> Decimal {
        self.membership_tier().discount_percent()
    }

    pub fn points_to_use(&self) -> i64 {
        self.points_to_use
    }

    pub fn balance_to_use(&self) -> Decimal {
        self.balance_to_use
    }

    pub fn payment_method_id(&self) -> Option<&str> {
        self.payment_method_id.as_deref()
    }

    pub fn status(&self) -> PaymentStatus {
        self.status
    }

    pub fn partial_amount(&self) -> Decimal {
        self.partial_amount
    }

    pub fn amount_tendered(&self) -> Option<Decimal> {
        self.amount_tendered
    }

    pub fn note(&self) -> Option<&str> {
        self.note.as_deref()
    }

    /// Walk-in sales are always settled in full and earn no customer perks.
    pub fn select_walk_in(&mut self) {
        self.customer = CustomerSelection::WalkIn;
        self.points_to_use = 0;
        self.balance_to_use = Decimal::ZERO;
        self.status = PaymentStatus::Paid;
        self.partial_amount = Decimal::ZERO;
    }

    /// Switching customers re-caps points/balance to what the new customer has.
    pub fn select_customer(&mut self, customer: Customer) {
        self.points_to_use = self.points_to_use.clamp(0, customer.loyalty_points.max(0));
        self.balance_to_use = self
            .balance_to_use
            .clamp(Decimal::ZERO, customer.balance.max(Decimal::ZERO));
        self.customer = CustomerSelection::Customer(customer);
    }

    /// Clamped to 0..=100.
    pub fn set_discount_percent(&mut self, percent: Decimal) {
        self.discount_percent = percent.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED);
    }

    pub fn set_points_to_use(&mut self, points: i64) -> Result<(), PosError> {
        let customer = self
            .customer
            .customer()
            .ok_or_else(|| PosError::validation("Select a customer to redeem points"))?;
        self.points_to_use = points.clamp(0, customer.loyalty_points.max(0));
        Ok(())
    }

    pub fn set_balance_to_use(&mut self, amount: Decimal) -> Result<(), PosError> {
        let customer = self
            .customer
            .customer()
            .ok_or_else(|| PosError::validation("Select a customer to use account balance"))?;
        self.balance_to_use = amount.clamp(Decimal::ZERO, customer.balance.max(Decimal::ZERO));
        Ok(())
    }

    pub fn set_payment_method(&mut self, method_id: Option<String>) {
        self.payment_method_id = method_id.filter(|m| !m.trim().is_empty());
    }

    pub fn set_status(&mut self, status: PaymentStatus) -> Result<(), PosError> {
        if status != PaymentStatus::Paid && self.customer.is_walk_in() {
            return Err(PosError::validation(
                "Walk-in customers must pay in full",
            ));
        }
        self.status = status;
        if status != PaymentStatus::Partial {
            self.partial_amount = Decimal::ZERO;
        }
        Ok(())
    }

    pub fn set_partial_amount(&mut self, amount: Decimal) {
        self.partial_amount = amount.max(Decimal::ZERO);
    }

    pub fn set_amount_tendered(&mut self, amount: Option<Decimal>) {
        self.amount_tendered = amount.map(|a| a.max(Decimal::ZERO));
    }

    pub fn set_note(&mut self, note: Option<String>) {
        self.note = note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
    }
}
