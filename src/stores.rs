use serde::{Deserialize, Serialize};

use crate::api::{unwrap_data, ApiClient};
use crate::error::PosError;
use crate::money::lenient;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Store {
    #[serde(deserialize_with = "lenient::id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default, alias = "phone_number")]
    pub phone: Option<String>,
    #[serde(default = "default_active", alias = "is_active", deserialize_with = "active_flag")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

// Stores without an explicit flag are active.
fn active_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match raw {
        None | Some(serde_json::Value::Null) => true,
        Some(v) => lenient::flag(v).unwrap_or(true),
    })
}

pub struct StoresApi<'a> {
    client: &'a ApiClient,
}

impl<'a> StoresApi<'a> {
    pub fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// Active stores the current user can operate.
    pub async fn list(&self) -> Result<Vec<Store>, PosError> {
        let body = unwrap_data(self.client.get_value("/api/stores").await?);
        Ok(parse_stores(&body))
    }
}

pub fn parse_stores(body: &serde_json::Value) -> Vec<Store> {
    body.as_array()
        .map(|rows| {
            rows.iter()
                .filter_map(|row| serde_json::from_value::<Store>(row.clone()).ok())
                .filter(|s| s.active)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn inactive_stores_are_hidden() {
        let stores = parse_stores(&json!([
            { "id": 1, "name": "Main" },
            { "id": 2, "name": "Closed", "is_active": 0 },
            { "id": "3", "name": "Mall", "active": "true", "phone_number": "123" }
        ]));
        let names: Vec<_> = stores.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Main", "Mall"]);
        assert_eq!(stores[1].phone.as_deref(), Some("123"));
    }
}
