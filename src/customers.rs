//! Customers, membership tiers and the debounced customer search.
//!
//! Search is the only timed behaviour in the client: each keystroke cancels
//! the pending lookup and schedules a new one after the debounce window.
//! Whichever lookup completes last publishes its results.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::{build_query, unwrap_data, ApiClient};
use crate::error::PosError;
use crate::{value_decimal, value_i64, value_id, value_str};

/// Queries shorter than this clear the results without hitting the API.
pub const MIN_SEARCH_CHARS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MembershipTier {
    #[default]
    Normal,
    Silver,
    Gold,
    Platinum,
}

impl MembershipTier {
    /// Unknown or missing tiers are treated as normal.
    pub fn from_value(value: Option<&str>) -> Self {
        match value.map(str::trim).map(str::to_ascii_lowercase).as_deref() {
            Some("silver") => Self::Silver,
            Some("gold") => Self::Gold,
            Some("platinum") => Self::Platinum,
            _ => Self::Normal,
        }
    }

    /// Automatic discount percent granted at checkout.
    pub fn discount_percent(self) -> Decimal {
        match self {
            Self::Normal => Decimal::ZERO,
            Self::Silver => Decimal::from(5),
            Self::Gold => Decimal::from(7),
            Self::Platinum => Decimal::from(10),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::Silver => "Silver",
            Self::Gold => "Gold",
            Self::Platinum => "Platinum",
        }
    }
}

/// A customer record. Serde derives cover the canonical shape only; rows
/// from the store API go through [`Customer::from_wire`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub membership_tier: MembershipTier,
    pub loyalty_points: i64,
    pub balance: Decimal,
}

impl Customer {
    /// Decode one API row, taking the first usable spelling of each field.
    /// `None` only when the row has no id.
    pub fn from_wire(row: &Value) -> Option<Self> {
        Some(Self {
            id: value_id(row, &["id", "customer_id"])?,
            name: value_str(row, &["name", "full_name", "customer_name"]).unwrap_or_default(),
            phone: value_str(row, &["phone", "mobile", "phone_number"]),
            email: value_str(row, &["email"]),
            membership_tier: MembershipTier::from_value(
                value_str(row, &["membership_tier", "membership", "membership_type", "tier"])
                    .as_deref(),
            ),
            loyalty_points: value_i64(row, &["loyalty_points", "points"]).unwrap_or(0).max(0),
            balance: value_decimal(row, &["balance", "account_balance"]).unwrap_or(Decimal::ZERO),
        })
    }
}

fn parse_customer_rows(body: &Value) -> Vec<Customer> {
    body.as_array()
        .map(|rows| {
            rows.iter()
                .filter_map(|row| {
                    let customer = Customer::from_wire(row);
                    if customer.is_none() {
                        warn!(row = %row, "Skipping customer row without an id");
                    }
                    customer
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Anything that can look customers up by free text.
pub trait CustomerDirectory: Send + Sync + 'static {
    fn search(&self, query: &str)
        -> impl Future<Output = Result<Vec<Customer>, PosError>> + Send;
}

pub struct CustomersApi {
    client: ApiClient,
}

impl CustomersApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub async fn get(&self, id: &str) -> Result<Customer, PosError> {
        let body = unwrap_data(self.client.get_value(&format!("/api/customers/{id}")).await?);
        Customer::from_wire(&body)
            .ok_or_else(|| PosError::Decode(format!("customer {id} has no id")))
    }
}

impl CustomerDirectory for CustomersApi {
    async fn search(&self, query: &str) -> Result<Vec<Customer>, PosError> {
        let path = build_query("/api/customers", &[("search", query.to_string())]);
        let body = unwrap_data(self.client.get_value(&path).await?);
        Ok(parse_customer_rows(&body))
    }
}

// ---------------------------------------------------------------------------
// Debounce
// ---------------------------------------------------------------------------

/// Cancel-and-reschedule timer.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    pending: Mutex<Option<CancellationToken>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Mutex::new(None),
        }
    }

    /// Run `task` after the delay unless another call arrives first.
    pub fn schedule<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        {
            let mut guard = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(previous) = guard.replace(token.clone()) {
                previous.cancel();
            }
        }
        let delay = self.delay;
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    tokio::select! {
                        _ = token.cancelled() => {}
                        _ = task => {}
                    }
                }
            }
        });
    }

    pub fn cancel(&self) {
        let mut guard = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = guard.take() {
            previous.cancel();
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// State published to the customer picker.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchState {
    pub query: String,
    pub results: Vec<Customer>,
    pub error: Option<String>,
}

pub struct CustomerSearch<D: CustomerDirectory> {
    directory: Arc<D>,
    debouncer: Debouncer,
    state: watch::Sender<SearchState>,
}

impl<D: CustomerDirectory> CustomerSearch<D> {
    pub fn new(directory: Arc<D>, debounce: Duration) -> Self {
        let (state, _) = watch::channel(SearchState::default());
        Self {
            directory,
            debouncer: Debouncer::new(debounce),
            state,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchState> {
        self.state.subscribe()
    }

    /// Called on every keystroke.
    pub fn on_input(&self, query: &str) {
        let query = query.trim().to_string();
        if query.chars().count() < MIN_SEARCH_CHARS {
            self.debouncer.cancel();
            self.state.send_replace(SearchState {
                query,
                ..SearchState::default()
            });
            return;
        }

        let directory = Arc::clone(&self.directory);
        let state = self.state.clone();
        self.debouncer.schedule(async move {
            debug!(query = %query, "Searching customers");
            match directory.search(&query).await {
                Ok(results) => {
                    state.send_replace(SearchState {
                        query,
                        results,
                        error: None,
                    });
                }
                Err(e) => {
                    // The last successful results stay on screen.
                    warn!(query = %query, error = %e, "Customer search failed");
                    state.send_modify(|current| {
                        current.query = query;
                        current.error = Some(e.user_message());
                    });
                }
            }
        });
    }
}
