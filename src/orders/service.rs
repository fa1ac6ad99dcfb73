use serde_json::Value;
use tracing::info;

use super::filter::OrderFilter;
use super::normalize::{normalize_order, Order};
use crate::api::{build_query, unwrap_data, ApiClient, Page};
use crate::checkout::CreateOrderRequest;
use crate::error::PosError;

/// Orders endpoints. Every order leaving this type is already normalized.
pub struct OrdersApi<'a> {
    client: &'a ApiClient,
}

impl<'a> OrdersApi<'a> {
    pub fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    pub async fn list(&self, store_id: &str, filter: &OrderFilter) -> Result<Page<Order>, PosError> {
        let path = build_query(&format!("/api/stores/{store_id}/orders"), &filter.to_query());
        let body = self.client.get_value(&path).await?;
        Ok(parse_order_page(&body))
    }

    pub async fn get(&self, store_id: &str, order_id: &str) -> Result<Order, PosError> {
        let body = self
            .client
            .get_value(&format!("/api/stores/{store_id}/orders/{order_id}"))
            .await?;
        Ok(normalize_order(&unwrap_data(body)))
    }

    pub async fn create(&self, request: &CreateOrderRequest) -> Result<Order, PosError> {
        let path = format!("/api/stores/{}/orders", request.store_id);
        let body = self.client.post_value(&path, request).await?;
        let order = normalize_order(&unwrap_data(body));
        info!(
            store_id = %request.store_id,
            order_id = %order.id,
            invoice_no = %order.invoice_no,
            grand_total = %request.grand_total,
            "Order created"
        );
        Ok(order)
    }
}

pub fn parse_order_page(body: &Value) -> Page<Order> {
    Page::from_value(body, |row| row.is_object().then(|| normalize_order(row)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn page_of_mixed_shapes() {
        let body = json!({
            "data": [
                { "id": 1, "grand_total": "10" },
                { "id": 2, "financial": { "grand_total": 20 } },
                "junk"
            ],
            "meta": { "current_page": 1, "last_page": 3, "per_page": 2, "total": 6 }
        });
        let page = parse_order_page(&body);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[1].financial.grand_total.to_string(), "20");
        assert!(page.has_next());
        assert_eq!(page.total, 6);
    }
}
