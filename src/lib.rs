//! Store POS client core.
//!
//! Typed client for a multi-store point-of-sale backend: checkout math and
//! order submission, order history, returns, stock adjustments, receipt
//! rendering and store settings. [`StorePos`] wires configuration, logging
//! and the HTTP client together; each area also works on its own.

use std::path::Path;
use std::sync::Arc;

use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;

pub mod api;
pub mod catalog;
pub mod checkout;
pub mod config;
pub mod customers;
pub mod error;
pub mod logging;
pub mod money;
pub mod orders;
pub mod receipt;
pub mod returns;
pub mod settings;
pub mod stock_adjustment;
pub mod stores;

pub use api::{ApiClient, Page};
pub use config::ClientConfig;
pub use error::PosError;

use catalog::CatalogApi;
use checkout::{prepare_order, Cart, PaymentDraft, PreparedOrder};
use customers::{CustomerSearch, CustomersApi};
use orders::OrdersApi;
use returns::ReturnsApi;
use settings::SettingsApi;
use stock_adjustment::StockAdjustmentsApi;
use stores::StoresApi;

/// First non-empty trimmed string among `keys`.
pub(crate) fn value_str(v: &serde_json::Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        if let Some(s) = v.get(*key).and_then(|x| x.as_str()) {
            let trimmed = s.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
    }
    None
}

// Wire rows often carry several spellings of one field, sometimes at once.
// These take the first key that holds a usable value.

pub(crate) fn value_id(v: &serde_json::Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| v.get(*k).and_then(money::id_from_value))
}

pub(crate) fn value_decimal(v: &serde_json::Value, keys: &[&str]) -> Option<rust_decimal::Decimal> {
    keys.iter()
        .find_map(|k| v.get(*k).and_then(money::decimal_from_value))
}

pub(crate) fn value_i64(v: &serde_json::Value, keys: &[&str]) -> Option<i64> {
    keys.iter()
        .find_map(|k| v.get(*k).and_then(money::i64_from_value))
}

pub(crate) fn value_flag(v: &serde_json::Value, keys: &[&str]) -> Option<bool> {
    keys.iter()
        .find_map(|k| v.get(*k).and_then(money::flag_from_value))
}

/// Configured client plus the log guard that keeps file logging alive.
pub struct StorePos {
    config: ClientConfig,
    client: ApiClient,
    _log_guard: Option<WorkerGuard>,
}

impl StorePos {
    /// Load configuration, start logging and build the HTTP client.
    pub fn start(config_path: Option<&Path>) -> Result<Self, PosError> {
        let config = ClientConfig::load(config_path)?;
        let guard = logging::init_logging(&config.log)?;
        info!(
            version = env!("CARGO_PKG_VERSION"),
            api = %api::normalize_base_url(&config.api_base_url),
            store_id = ?config.store_id,
            "Starting Store POS client"
        );
        let mut pos = Self::from_config(config)?;
        pos._log_guard = guard;
        Ok(pos)
    }

    /// Build without touching global logging state.
    pub fn from_config(config: ClientConfig) -> Result<Self, PosError> {
        config.validate()?;
        let client = ApiClient::new(&config)?;
        Ok(Self {
            config,
            client,
            _log_guard: None,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn store_id(&self) -> Option<&str> {
        self.config.store_id.as_deref()
    }

    pub fn set_store(&mut self, store_id: Option<String>) {
        self.config.store_id = store_id.filter(|s| !s.trim().is_empty());
    }

    pub fn stores(&self) -> StoresApi<'_> {
        StoresApi::new(&self.client)
    }

    pub fn catalog(&self) -> CatalogApi<'_> {
        CatalogApi::new(&self.client)
    }

    pub fn orders(&self) -> OrdersApi<'_> {
        OrdersApi::new(&self.client)
    }

    pub fn returns(&self) -> ReturnsApi<'_> {
        ReturnsApi::new(&self.client)
    }

    pub fn stock_adjustments(&self) -> StockAdjustmentsApi<'_> {
        StockAdjustmentsApi::new(&self.client)
    }

    pub fn settings(&self) -> SettingsApi<'_> {
        SettingsApi::new(&self.client)
    }

    pub fn customers(&self) -> CustomersApi {
        CustomersApi::new(self.client.clone())
    }

    /// Debounced customer lookup using the configured delay.
    pub fn customer_search(&self) -> CustomerSearch<CustomersApi> {
        CustomerSearch::new(Arc::new(self.customers()), self.config.search_debounce())
    }

    /// Validate the checkout against the selected store and configured
    /// loyalty point value.
    pub fn prepare_order(&self, cart: &Cart, draft: &PaymentDraft) -> Result<PreparedOrder, PosError> {
        prepare_order(self.store_id(), cart, draft, self.config.loyalty_point_value)
    }
}
