use chrono::NaiveDate;

use super::normalize::Order;
use crate::checkout::PaymentStatus;

pub const DEFAULT_PER_PAGE: u32 = 20;

/// Order list filters, shared by the server query and the client-side check.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderFilter {
    pub search: Option<String>,
    pub order_status: Option<String>,
    pub payment_status: Option<PaymentStatus>,
    pub customer_id: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub page: u32,
    pub per_page: u32,
}

impl Default for OrderFilter {
    fn default() -> Self {
        Self {
            search: None,
            order_status: None,
            payment_status: None,
            customer_id: None,
            date_from: None,
            date_to: None,
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl OrderFilter {
    /// Query parameters; empty values are left out.
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(s) = non_empty(&self.search) {
            params.push(("search", s.to_string()));
        }
        if let Some(s) = non_empty(&self.order_status) {
            params.push(("status", s.to_ascii_lowercase()));
        }
        if let Some(s) = self.payment_status {
            params.push(("payment_status", s.as_str().to_string()));
        }
        if let Some(s) = non_empty(&self.customer_id) {
            params.push(("customer_id", s.to_string()));
        }
        if let Some(d) = self.date_from {
            params.push(("date_from", d.format("%Y-%m-%d").to_string()));
        }
        if let Some(d) = self.date_to {
            params.push(("date_to", d.format("%Y-%m-%d").to_string()));
        }
        params.push(("page", self.page.max(1).to_string()));
        params.push(("per_page", self.per_page.max(1).to_string()));
        params
    }

    /// Same filter applied locally to an already normalized order.
    pub fn matches(&self, order: &Order) -> bool {
        if let Some(needle) = non_empty(&self.search) {
            let needle = needle.to_lowercase();
            let hit = [
                Some(order.invoice_no.as_str()),
                Some(order.customer.name.as_str()),
                order.customer.phone.as_deref(),
            ]
            .into_iter()
            .flatten()
            .any(|field| field.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }
        if let Some(status) = non_empty(&self.order_status) {
            if !order.status.eq_ignore_ascii_case(status) {
                return false;
            }
        }
        if let Some(status) = self.payment_status {
            if order.payment.status != Some(status) {
                return false;
            }
        }
        if let Some(customer) = non_empty(&self.customer_id) {
            if order.customer.id.as_deref() != Some(customer) {
                return false;
            }
        }
        if self.date_from.is_some() || self.date_to.is_some() {
            let Some(day) = order.created_at.map(|d| d.date()) else {
                return false;
            };
            if self.date_from.is_some_and(|from| day < from) {
                return false;
            }
            if self.date_to.is_some_and(|to| day > to) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::normalize_order;
    use serde_json::json;

    fn order() -> Order {
        normalize_order(&json!({
            "id": 1,
            "invoice_no": "INV-0042",
            "status": "Completed",
            "created_at": "2024-05-10 09:00:00",
            "customer": { "id": 8, "name": "Dana Reyes", "phone": "0170000" },
            "payment_status": "due"
        }))
    }

    #[test]
    fn query_skips_empty_values() {
        let filter = OrderFilter {
            search: Some("  ".into()),
            order_status: Some("Completed".into()),
            date_from: NaiveDate::from_ymd_opt(2024, 5, 1),
            ..OrderFilter::default()
        };
        assert_eq!(
            filter.to_query(),
            vec![
                ("status", "completed".to_string()),
                ("date_from", "2024-05-01".to_string()),
                ("page", "1".to_string()),
                ("per_page", "20".to_string()),
            ]
        );
    }

    #[test]
    fn search_is_case_insensitive_over_invoice_and_customer() {
        let o = order();
        for q in ["inv-0042", "dana", "01700"] {
            let f = OrderFilter {
                search: Some(q.into()),
                ..OrderFilter::default()
            };
            assert!(f.matches(&o), "{q}");
        }
        let f = OrderFilter {
            search: Some("zzz".into()),
            ..OrderFilter::default()
        };
        assert!(!f.matches(&o));
    }

    #[test]
    fn status_customer_and_dates() {
        let o = order();
        let mut f = OrderFilter {
            order_status: Some("completed".into()),
            payment_status: Some(PaymentStatus::Due),
            customer_id: Some("8".into()),
            date_from: NaiveDate::from_ymd_opt(2024, 5, 10),
            date_to: NaiveDate::from_ymd_opt(2024, 5, 10),
            ..OrderFilter::default()
        };
        assert!(f.matches(&o));

        f.payment_status = Some(PaymentStatus::Paid);
        assert!(!f.matches(&o));

        f.payment_status = None;
        f.date_to = NaiveDate::from_ymd_opt(2024, 5, 9);
        assert!(!f.matches(&o));
    }
}
