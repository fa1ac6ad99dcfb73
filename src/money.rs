//! Decimal helpers for monetary arithmetic.
//!
//! All checkout math runs on `rust_decimal::Decimal`. The store API is not
//! consistent about numeric encoding (numbers, numeric strings, nulls), so
//! reads go through the lenient helpers here.

use rust_decimal::prelude::*;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Currency precision used for rounding displayed and submitted amounts.
pub const MONEY_DP: u32 = 2;

/// Round half away from zero to cents.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// `value × percent / 100`.
pub fn percent_of(value: Decimal, percent: Decimal) -> Decimal {
    value * percent / Decimal::ONE_HUNDRED
}

pub fn clamp_non_negative(value: Decimal) -> Decimal {
    value.max(Decimal::ZERO)
}

/// Format with two decimals, e.g. `12.5` -> `12.50`.
pub fn format_money(value: Decimal) -> String {
    format!("{:.2}", round_money(value))
}

/// Parse a JSON number or numeric string (thousands separators allowed).
pub fn decimal_from_value(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Some(Decimal::from(i));
            }
            n.as_f64().and_then(Decimal::from_f64)
        }
        Value::String(s) => {
            let cleaned: String = s.trim().chars().filter(|c| *c != ',').collect();
            if cleaned.is_empty() {
                return None;
            }
            Decimal::from_str(&cleaned)
                .ok()
                .or_else(|| Decimal::from_scientific(&cleaned).ok())
        }
        _ => None,
    }
}

/// Lenient integer read (quantities, points).
pub fn i64_from_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => {
            let t = s.trim();
            t.parse::<i64>()
                .ok()
                .or_else(|| t.parse::<f64>().ok().map(|f| f.trunc() as i64))
        }
        _ => None,
    }
}

/// `deserialize_with` adapters for wire structs.
pub mod lenient {
    use super::*;

    /// Missing, null or unparseable values become `None`.
    pub fn option_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<Value>::deserialize(deserializer)?;
        Ok(raw.as_ref().and_then(decimal_from_value))
    }

    /// Missing, null or unparseable values become zero.
    pub fn decimal_or_zero<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(option_decimal(deserializer)?.unwrap_or(Decimal::ZERO))
    }

    pub fn i64_or_zero<'de, D>(deserializer: D) -> Result<i64, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<Value>::deserialize(deserializer)?;
        Ok(raw.as_ref().and_then(i64_from_value).unwrap_or(0))
    }

    /// Accepts `true`/`false`, `1`/`0` and their string forms.
    pub fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<Value>::deserialize(deserializer)?;
        Ok(raw.as_ref().and_then(flag_from_value).unwrap_or(false))
    }

    /// Ids arrive as numbers or strings; both are kept as strings.
    pub fn option_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<Value>::deserialize(deserializer)?;
        Ok(raw.as_ref().and_then(super::id_from_value))
    }

    pub fn id<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(option_id(deserializer)?.unwrap_or_default())
    }
}

/// Accepts `true`/`false`, `1`/`0` and their string forms.
pub fn flag_from_value(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|i| i != 0),
        Value::String(s) => Some(matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )),
        _ => None,
    }
}

/// Read a string or numeric id.
pub fn id_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(round_money(dec!(2.345)), dec!(2.35));
        assert_eq!(round_money(dec!(2.344)), dec!(2.34));
        assert_eq!(round_money(dec!(-2.345)), dec!(-2.35));
    }

    #[test]
    fn parses_numbers_and_numeric_strings() {
        assert_eq!(decimal_from_value(&json!(12)), Some(dec!(12)));
        assert_eq!(decimal_from_value(&json!("1,250.50")), Some(dec!(1250.50)));
        assert_eq!(decimal_from_value(&json!(" 7.5 ")), Some(dec!(7.5)));
        assert_eq!(decimal_from_value(&json!("")), None);
        assert_eq!(decimal_from_value(&json!("abc")), None);
        assert_eq!(decimal_from_value(&json!(null)), None);
    }

    #[test]
    fn integer_reads_truncate_fractions() {
        assert_eq!(i64_from_value(&json!(3)), Some(3));
        assert_eq!(i64_from_value(&json!("4")), Some(4));
        assert_eq!(i64_from_value(&json!("2.0")), Some(2));
        assert_eq!(i64_from_value(&json!([])), None);
    }

    #[test]
    fn formats_two_decimals() {
        assert_eq!(format_money(dec!(12.5)), "12.50");
        assert_eq!(format_money(dec!(0)), "0.00");
    }

    #[derive(Deserialize)]
    struct Wire {
        #[serde(default, deserialize_with = "lenient::option_decimal")]
        amount: Option<Decimal>,
        #[serde(default, deserialize_with = "lenient::flag")]
        enabled: bool,
        #[serde(default, deserialize_with = "lenient::id")]
        id: String,
    }

    #[test]
    fn lenient_adapters_tolerate_mixed_encodings() {
        let w: Wire = serde_json::from_value(json!({
            "amount": "9.99",
            "enabled": "1",
            "id": 42
        }))
        .unwrap();
        assert_eq!(w.amount, Some(dec!(9.99)));
        assert!(w.enabled);
        assert_eq!(w.id, "42");

        let w: Wire = serde_json::from_value(json!({ "amount": null })).unwrap();
        assert_eq!(w.amount, None);
        assert!(!w.enabled);
        assert_eq!(w.id, "");
    }
}
