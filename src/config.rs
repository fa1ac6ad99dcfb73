//! Client configuration.
//!
//! Resolution order: built-in defaults, then an optional JSON file, then
//! `STORE_POS_*` environment variables.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

use crate::api::normalize_base_url;
use crate::error::PosError;
use crate::money::decimal_from_value;

pub const ENV_API_URL: &str = "STORE_POS_API_URL";
pub const ENV_API_TOKEN: &str = "STORE_POS_API_TOKEN";
pub const ENV_STORE_ID: &str = "STORE_POS_STORE_ID";
pub const ENV_POINT_VALUE: &str = "STORE_POS_POINT_VALUE";
pub const ENV_LOG_DIR: &str = "STORE_POS_LOG_DIR";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    /// Directory for daily rolling log files; console only when unset.
    pub directory: Option<PathBuf>,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum PaperWidth {
    #[default]
    #[serde(rename = "58mm")]
    Mm58,
    #[serde(rename = "80mm")]
    Mm80,
}

impl PaperWidth {
    pub fn css_width(self) -> &'static str {
        match self {
            Self::Mm58 => "58mm",
            Self::Mm80 => "80mm",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReceiptConfig {
    pub store_name: String,
    pub store_address: Option<String>,
    pub store_phone: Option<String>,
    pub footer_text: Option<String>,
    pub paper_width: PaperWidth,
    pub currency_symbol: String,
    /// Adds a script that opens the print dialog once the document loads.
    pub auto_print: bool,
}

impl Default for ReceiptConfig {
    fn default() -> Self {
        Self {
            store_name: "Store".to_string(),
            store_address: None,
            store_phone: None,
            footer_text: Some("Thank you for shopping with us".to_string()),
            paper_width: PaperWidth::Mm58,
            currency_symbol: "$".to_string(),
            auto_print: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub api_token: Option<String>,
    pub store_id: Option<String>,
    pub request_timeout_secs: u64,
    pub search_debounce_ms: u64,
    /// Currency value of one loyalty point.
    #[serde(
        serialize_with = "rust_decimal::serde::str::serialize",
        deserialize_with = "decimal_number_or_str"
    )]
    pub loyalty_point_value: Decimal,
    pub receipt: ReceiptConfig,
    pub log: LogConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000".to_string(),
            api_token: None,
            store_id: None,
            request_timeout_secs: 30,
            search_debounce_ms: 300,
            loyalty_point_value: Decimal::ONE,
            receipt: ReceiptConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Load defaults, overlay `path` when given, then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, PosError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_env();
        config.api_base_url = normalize_base_url(&config.api_base_url);
        config.validate()?;
        info!(
            api = %config.api_base_url,
            store_id = config.store_id.as_deref().unwrap_or("-"),
            "Client configuration loaded"
        );
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, PosError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| PosError::Config(format!("read {}: {e}", path.display())))?;
        serde_json::from_str(&raw)
            .map_err(|e| PosError::Config(format!("parse {}: {e}", path.display())))
    }

    pub fn apply_env(&mut self) {
        if let Some(url) = env_value(ENV_API_URL) {
            self.api_base_url = url;
        }
        if let Some(token) = env_value(ENV_API_TOKEN) {
            self.api_token = Some(token);
        }
        if let Some(store) = env_value(ENV_STORE_ID) {
            self.store_id = Some(store);
        }
        if let Some(raw) = env_value(ENV_POINT_VALUE) {
            match Decimal::from_str(&raw) {
                Ok(v) => self.loyalty_point_value = v,
                Err(e) => warn!(value = %raw, error = %e, "Ignoring invalid point value override"),
            }
        }
        if let Some(dir) = env_value(ENV_LOG_DIR) {
            self.log.directory = Some(PathBuf::from(dir));
        }
    }

    pub fn validate(&self) -> Result<(), PosError> {
        if self.api_base_url.trim().is_empty() {
            return Err(PosError::Config("api_base_url is empty".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(PosError::Config(
                "request_timeout_secs must be greater than zero".into(),
            ));
        }
        if self.loyalty_point_value.is_sign_negative() {
            return Err(PosError::Config(
                "loyalty_point_value must not be negative".into(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }
}

/// Accepts `0.05` as well as `"0.05"`.
fn decimal_number_or_str<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Decimal, D::Error> {
    let raw = Value::deserialize(deserializer)?;
    decimal_from_value(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("expected a decimal, got {raw}")))
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serial_test::serial;
    use std::io::Write as _;

    fn clear_env() {
        for key in [
            ENV_API_URL,
            ENV_API_TOKEN,
            ENV_STORE_ID,
            ENV_POINT_VALUE,
            ENV_LOG_DIR,
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn defaults_are_valid() {
        clear_env();
        let config = ClientConfig::load(None).unwrap();
        assert_eq!(config.api_base_url, "http://localhost:8000");
        assert_eq!(config.search_debounce(), Duration::from_millis(300));
        assert_eq!(config.loyalty_point_value, Decimal::ONE);
        assert_eq!(config.receipt.paper_width, PaperWidth::Mm58);
    }

    #[test]
    #[serial]
    fn file_then_env_overrides() {
        clear_env();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "api_base_url": "shop.example.com/api/",
                "store_id": "3",
                "loyalty_point_value": "0.05",
                "receipt": {{ "store_name": "Corner Shop", "paper_width": "80mm" }}
            }}"#
        )
        .unwrap();

        std::env::set_var(ENV_STORE_ID, "7");
        std::env::set_var(ENV_API_TOKEN, "tok");
        let config = ClientConfig::load(Some(file.path())).unwrap();
        clear_env();

        assert_eq!(config.api_base_url, "https://shop.example.com");
        assert_eq!(config.store_id.as_deref(), Some("7"));
        assert_eq!(config.api_token.as_deref(), Some("tok"));
        assert_eq!(config.loyalty_point_value, dec!(0.05));
        assert_eq!(config.receipt.store_name, "Corner Shop");
        assert_eq!(config.receipt.paper_width, PaperWidth::Mm80);
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    #[serial]
    fn invalid_point_value_override_is_ignored() {
        clear_env();
        std::env::set_var(ENV_POINT_VALUE, "lots");
        let config = ClientConfig::load(None).unwrap();
        clear_env();
        assert_eq!(config.loyalty_point_value, Decimal::ONE);
    }

    #[test]
    fn rejects_zero_timeout_and_negative_point_value() {
        let mut config = ClientConfig {
            request_timeout_secs: 0,
            ..ClientConfig::default()
        };
        assert!(matches!(config.validate(), Err(PosError::Config(_))));
        config.request_timeout_secs = 5;
        config.loyalty_point_value = dec!(-1);
        assert!(matches!(config.validate(), Err(PosError::Config(_))));
    }

    #[test]
    fn point_value_accepts_number_or_string() {
        let config: ClientConfig = serde_json::from_str(r#"{ "loyalty_point_value": 0.05 }"#).unwrap();
        assert_eq!(config.loyalty_point_value, dec!(0.05));
        let config: ClientConfig = serde_json::from_str(r#"{ "loyalty_point_value": "0.05" }"#).unwrap();
        assert_eq!(config.loyalty_point_value, dec!(0.05));
        let config: ClientConfig = serde_json::from_str(r#"{ "loyalty_point_value": 2 }"#).unwrap();
        assert_eq!(config.loyalty_point_value, dec!(2));
        assert!(serde_json::from_str::<ClientConfig>(r#"{ "loyalty_point_value": true }"#).is_err());

        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["loyalty_point_value"], "2");
    }

    #[test]
    fn unreadable_file_is_a_config_error() {
        let err = ClientConfig::from_file(Path::new("/definitely/missing.json")).unwrap_err();
        assert!(matches!(err, PosError::Config(_)));
    }
}
