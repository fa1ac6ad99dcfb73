//! Store API client.
//!
//! Thin authenticated JSON client over `reqwest`. Every call is a single
//! request/response: no retries, failures are mapped once into [`PosError`]
//! with the most readable message the error payload offers.

use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::{PosError, GENERIC_FAILURE_MESSAGE};
use crate::money;

// ---------------------------------------------------------------------------
// URL normalisation
// ---------------------------------------------------------------------------

/// Normalise the API base URL:
/// - ensure a scheme is present (https, or http for localhost)
/// - strip trailing slashes
/// - strip a trailing `/api` segment (paths below always start with `/api/`)
pub fn normalize_base_url(url: &str) -> String {
    let mut url = url.trim().to_string();
    if url.is_empty() {
        return url;
    }

    if !url.starts_with("http://") && !url.starts_with("https://") {
        if url.starts_with("localhost") || url.starts_with("127.0.0.1") {
            url = format!("http://{url}");
        } else {
            url = format!("https://{url}");
        }
    }

    while url.ends_with('/') {
        url.pop();
    }
    if url.ends_with("/api") {
        url.truncate(url.len() - 4);
    }
    while url.ends_with('/') {
        url.pop();
    }

    url
}

/// Append `params` to `path` as a query string, skipping empty values.
pub fn build_query(path: &str, params: &[(&str, String)]) -> String {
    fn enc(s: &str) -> String {
        s.replace('%', "%25")
            .replace('&', "%26")
            .replace('=', "%3D")
            .replace(' ', "%20")
            .replace('+', "%2B")
            .replace('?', "%3F")
            .replace('#', "%23")
    }
    let query: Vec<String> = params
        .iter()
        .filter(|(_, v)| !v.trim().is_empty())
        .map(|(k, v)| format!("{}={}", enc(k), enc(v.trim())))
        .collect();
    if query.is_empty() {
        return path.to_string();
    }
    format!("{path}?{}", query.join("&"))
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

fn friendly_error(url: &str, err: &reqwest::Error) -> PosError {
    if err.is_connect() {
        return PosError::Network(format!("Cannot reach the store server at {url}"));
    }
    if err.is_timeout() {
        return PosError::Network(format!("Connection to {url} timed out"));
    }
    if err.is_builder() {
        return PosError::Network(format!("Invalid store server URL: {url}"));
    }
    PosError::Network(format!("Network error communicating with {url}: {err}"))
}

fn status_message(status: StatusCode) -> String {
    match status.as_u16() {
        401 => "Your session has expired. Please sign in again".to_string(),
        403 => "You are not allowed to perform this action".to_string(),
        404 => "The requested record was not found".to_string(),
        s if s >= 500 => format!("Store server error (HTTP {s})"),
        _ => GENERIC_FAILURE_MESSAGE.to_string(),
    }
}

/// Collect `errors: { field: [msg, ...] }` (or `field: "msg"`) into a map.
pub fn extract_field_errors(body: &Value) -> BTreeMap<String, Vec<String>> {
    let mut out = BTreeMap::new();
    if let Some(Value::Object(errors)) = body.get("errors") {
        for (field, v) in errors {
            let messages: Vec<String> = match v {
                Value::Array(items) => items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                Value::String(s) if !s.trim().is_empty() => vec![s.trim().to_string()],
                _ => Vec::new(),
            };
            if !messages.is_empty() {
                out.insert(field.clone(), messages);
            }
        }
    }
    out
}

/// Pick the message shown to the user for a rejected request: the first
/// field error, then `message`, then `error`, then the generic text.
pub fn extract_error_message(body: &Value) -> Option<String> {
    let field_errors = extract_field_errors(body);
    if let Some(first) = field_errors.values().flatten().next() {
        return Some(first.clone());
    }
    if let Some(Value::Array(errors)) = body.get("errors") {
        if let Some(first) = errors.iter().find_map(|e| {
            e.as_str()
                .or_else(|| e.get("message").and_then(Value::as_str))
        }) {
            return Some(first.trim().to_string());
        }
    }
    ["message", "error"].iter().find_map(|key| {
        body.get(*key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

fn submission_error(status: StatusCode, body_text: &str) -> PosError {
    let parsed = serde_json::from_str::<Value>(body_text).ok();
    let (message, field_errors) = match parsed.as_ref() {
        Some(json) => (
            extract_error_message(json).unwrap_or_else(|| status_message(status)),
            extract_field_errors(json),
        ),
        None => (status_message(status), BTreeMap::new()),
    };
    PosError::Submission {
        status: status.as_u16(),
        message,
        field_errors,
    }
}

// ---------------------------------------------------------------------------
// Pagination
// ---------------------------------------------------------------------------

/// One page of a listing.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub current_page: u32,
    pub last_page: u32,
    pub per_page: u32,
    pub total: u64,
}

impl<T> Page<T> {
    /// Read `data` plus either nested `meta` or flat pagination keys. A bare
    /// array is one page holding everything. Rows are mapped with `row`.
    pub fn from_value(body: &Value, mut row: impl FnMut(&Value) -> Option<T>) -> Self {
        let rows: &[Value] = match body {
            Value::Array(items) => items,
            _ => body
                .get("data")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or(&[]),
        };
        let items: Vec<T> = rows.iter().filter_map(&mut row).collect();
        let meta = body.get("meta").unwrap_or(body);
        let read = |key: &str| meta.get(key).and_then(money::i64_from_value);

        let count = items.len() as u64;
        let per_page = read("per_page").map(|v| v.max(1) as u32).unwrap_or(count.max(1) as u32);
        Self {
            current_page: read("current_page").map(|v| v.max(1) as u32).unwrap_or(1),
            last_page: read("last_page").map(|v| v.max(1) as u32).unwrap_or(1),
            per_page,
            total: read("total").map(|v| v.max(0) as u64).unwrap_or(count),
            items,
        }
    }

    pub fn has_next(&self) -> bool {
        self.current_page < self.last_page
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> Result<Self, PosError> {
        let http = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| PosError::Config(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: normalize_base_url(&config.api_base_url),
            token: config.api_token.clone().filter(|t| !t.trim().is_empty()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Perform a request and return the JSON body (`Null` for empty bodies).
    ///
    /// `path` includes the leading slash, e.g. `/api/stores/1/orders`.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, PosError> {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self
            .http
            .request(method.clone(), &url)
            .header("Accept", "application/json");
        if let Some(token) = self.token.as_deref() {
            req = req.bearer_auth(token);
        }
        if let Some(b) = body {
            req = req.json(b);
        }

        let start = Instant::now();
        let resp = req
            .send()
            .await
            .map_err(|e| friendly_error(&self.base_url, &e))?;
        let status = resp.status();
        let latency_ms = start.elapsed().as_millis() as u64;
        let body_text = resp.text().await.unwrap_or_default();

        if !status.is_success() {
            let err = submission_error(status, &body_text);
            warn!(
                method = %method,
                path,
                status = status.as_u16(),
                latency_ms,
                error = %err,
                "Store API request rejected"
            );
            return Err(err);
        }

        debug!(method = %method, path, status = status.as_u16(), latency_ms, "Store API request");
        if body_text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body_text).map_err(PosError::from)
    }

    pub async fn get_value(&self, path: &str) -> Result<Value, PosError> {
        self.send(Method::GET, path, None).await
    }

    pub async fn post_value<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Value, PosError> {
        let body = serde_json::to_value(body)?;
        self.send(Method::POST, path, Some(&body)).await
    }

    pub async fn put_value<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Value, PosError> {
        let body = serde_json::to_value(body)?;
        self.send(Method::PUT, path, Some(&body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<(), PosError> {
        self.send(Method::DELETE, path, None).await.map(|_| ())
    }

    /// GET and deserialize the record, unwrapping a `{ "data": ... }` envelope.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, PosError> {
        let body = self.get_value(path).await?;
        Ok(serde_json::from_value(unwrap_data(body))?)
    }
}

/// Many endpoints wrap the record in `{ "data": ... }`; some do not.
pub fn unwrap_data(body: Value) -> Value {
    match body {
        Value::Object(mut obj)
            if !obj.contains_key("id")
                && obj
                    .get("data")
                    .map(|d| d.is_object() || d.is_array())
                    .unwrap_or(false) =>
        {
            obj.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}
