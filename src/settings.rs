//! Store settings administration.
//!
//! Each settings tab edits one store-scoped resource list. Resources are
//! typed records implementing [`SettingsResource`]; [`SettingsApi`] does the
//! CRUD generically and validates before anything is sent.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use tracing::{info, warn};

use crate::api::{unwrap_data, ApiClient};
use crate::error::PosError;
use crate::money::lenient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingsTab {
    Units,
    Attributes,
    PaymentMethods,
    Currencies,
    PaymentStatuses,
    WarrantyTypes,
    AdjustmentReasons,
    ReturnReasons,
}

impl SettingsTab {
    pub const ALL: [SettingsTab; 8] = [
        Self::Units,
        Self::Attributes,
        Self::PaymentMethods,
        Self::Currencies,
        Self::PaymentStatuses,
        Self::WarrantyTypes,
        Self::AdjustmentReasons,
        Self::ReturnReasons,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Units => Unit::LABEL,
            Self::Attributes => Attribute::LABEL,
            Self::PaymentMethods => PaymentMethod::LABEL,
            Self::Currencies => Currency::LABEL,
            Self::PaymentStatuses => PaymentStatusDefinition::LABEL,
            Self::WarrantyTypes => WarrantyType::LABEL,
            Self::AdjustmentReasons => AdjustmentReason::LABEL,
            Self::ReturnReasons => ReturnReason::LABEL,
        }
    }

    pub fn path(self) -> &'static str {
        match self {
            Self::Units => Unit::PATH,
            Self::Attributes => Attribute::PATH,
            Self::PaymentMethods => PaymentMethod::PATH,
            Self::Currencies => Currency::PATH,
            Self::PaymentStatuses => PaymentStatusDefinition::PATH,
            Self::WarrantyTypes => WarrantyType::PATH,
            Self::AdjustmentReasons => AdjustmentReason::PATH,
            Self::ReturnReasons => ReturnReason::PATH,
        }
    }
}

/// A store-scoped settings record.
pub trait SettingsResource: Serialize + DeserializeOwned + Clone + Send + Sync {
    /// Path segment under `/api/stores/{store}/`.
    const PATH: &'static str;
    const LABEL: &'static str;

    fn id(&self) -> Option<&str>;
    fn validate(&self) -> Result<(), PosError>;

    /// Rules spanning the whole list.
    fn validate_collection(_items: &[Self]) -> Result<(), PosError> {
        Ok(())
    }
}

fn require(value: &str, field: &str) -> Result<(), PosError> {
    if value.trim().is_empty() {
        return Err(PosError::validation(format!("{field} is required")));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Resources
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Unit {
    #[serde(default, deserialize_with = "lenient::option_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default, alias = "short")]
    pub short_name: String,
}

impl SettingsResource for Unit {
    const PATH: &'static str = "units";
    const LABEL: &'static str = "Units";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn validate(&self) -> Result<(), PosError> {
        require(&self.name, "Name")?;
        require(&self.short_name, "Short name")
    }
}

// Values arrive as plain strings or `{ "value": ... }` objects.
fn attribute_values<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw
        .iter()
        .filter_map(|v| match v {
            Value::Object(_) => crate::value_str(v, &["value", "name"]),
            Value::String(s) => Some(s.clone()),
            _ => None,
        })
        .collect())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Attribute {
    #[serde(default, deserialize_with = "lenient::option_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "attribute_values")]
    pub values: Vec<String>,
}

impl SettingsResource for Attribute {
    const PATH: &'static str = "attributes";
    const LABEL: &'static str = "Attributes";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn validate(&self) -> Result<(), PosError> {
        require(&self.name, "Name")?;
        let mut seen: Vec<String> = Vec::with_capacity(self.values.len());
        for value in &self.values {
            let key = value.trim().to_lowercase();
            if key.is_empty() {
                return Err(PosError::validation("Attribute values cannot be empty"));
            }
            if seen.contains(&key) {
                return Err(PosError::validation(format!(
                    "Duplicate attribute value: {}",
                    value.trim()
                )));
            }
            seen.push(key);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PaymentMethod {
    #[serde(default, deserialize_with = "lenient::option_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default = "enabled", alias = "is_active", deserialize_with = "lenient::flag")]
    pub active: bool,
}

fn enabled() -> bool {
    true
}

impl SettingsResource for PaymentMethod {
    const PATH: &'static str = "payment-methods";
    const LABEL: &'static str = "Payment Methods";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn validate(&self) -> Result<(), PosError> {
        require(&self.name, "Name")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Currency {
    #[serde(default, deserialize_with = "lenient::option_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(
        default,
        deserialize_with = "lenient::decimal_or_zero",
        serialize_with = "rust_decimal::serde::float::serialize"
    )]
    pub exchange_rate: rust_decimal::Decimal,
    #[serde(default, alias = "default", deserialize_with = "lenient::flag")]
    pub is_default: bool,
}

impl SettingsResource for Currency {
    const PATH: &'static str = "currencies";
    const LABEL: &'static str = "Currencies";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn validate(&self) -> Result<(), PosError> {
        require(&self.name, "Name")?;
        let code = self.code.trim();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(PosError::validation("Currency code must be 3 letters"));
        }
        require(&self.symbol, "Symbol")?;
        if self.exchange_rate <= rust_decimal::Decimal::ZERO {
            return Err(PosError::validation("Exchange rate must be greater than zero"));
        }
        Ok(())
    }

    fn validate_collection(items: &[Self]) -> Result<(), PosError> {
        if items.iter().filter(|c| c.is_default).count() > 1 {
            return Err(PosError::validation("Only one currency can be the default"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PaymentStatusDefinition {
    #[serde(default, deserialize_with = "lenient::option_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
}

impl SettingsResource for PaymentStatusDefinition {
    const PATH: &'static str = "payment-statuses";
    const LABEL: &'static str = "Payment Statuses";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn validate(&self) -> Result<(), PosError> {
        require(&self.name, "Name")
    }
}

/// Warranty period unit. Labels are matched case-insensitively, singular or
/// plural; anything else is kept as [`DurationUnit::Other`] so the row still
/// loads and fails validation instead.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DurationUnit {
    Days,
    #[default]
    Months,
    Years,
    Other(String),
}

impl DurationUnit {
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "" => Self::default(),
            "day" | "days" => Self::Days,
            "month" | "months" => Self::Months,
            "year" | "years" => Self::Years,
            _ => Self::Other(label.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Days => "days",
            Self::Months => "months",
            Self::Years => "years",
            Self::Other(label) => label,
        }
    }
}

impl Serialize for DurationUnit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DurationUnit {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(s) => Self::from_label(&s),
            Value::Null => Self::default(),
            other => Self::Other(other.to_string()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct WarrantyType {
    #[serde(default, deserialize_with = "lenient::option_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::i64_or_zero")]
    pub duration: i64,
    #[serde(default, alias = "unit")]
    pub duration_unit: DurationUnit,
}

impl SettingsResource for WarrantyType {
    const PATH: &'static str = "warranty-types";
    const LABEL: &'static str = "Warranty Types";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn validate(&self) -> Result<(), PosError> {
        require(&self.name, "Name")?;
        if self.duration <= 0 {
            return Err(PosError::validation("Duration must be greater than zero"));
        }
        if let DurationUnit::Other(label) = &self.duration_unit {
            return Err(PosError::validation(format!(
                "Unsupported duration unit \"{label}\"; use days, months or years"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AdjustmentReason {
    #[serde(default, deserialize_with = "lenient::option_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
}

impl SettingsResource for AdjustmentReason {
    const PATH: &'static str = "adjustment-reasons";
    const LABEL: &'static str = "Adjustment Reasons";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn validate(&self) -> Result<(), PosError> {
        require(&self.name, "Name")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ReturnReason {
    #[serde(default, deserialize_with = "lenient::option_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
}

impl SettingsResource for ReturnReason {
    const PATH: &'static str = "return-reasons";
    const LABEL: &'static str = "Return Reasons";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn validate(&self) -> Result<(), PosError> {
        require(&self.name, "Name")
    }
}

// ---------------------------------------------------------------------------
// API
// ---------------------------------------------------------------------------

/// Rows that fail to decode are skipped with a warning.
pub fn parse_resource_list<T: SettingsResource>(body: &Value) -> Vec<T> {
    let rows = match unwrap_data(body.clone()) {
        Value::Array(rows) => rows,
        _ => return Vec::new(),
    };
    rows.into_iter()
        .filter_map(|row| match serde_json::from_value::<T>(row) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!(resource = T::PATH, error = %e, "Skipping malformed settings row");
                None
            }
        })
        .collect()
}

pub struct SettingsApi<'a> {
    client: &'a ApiClient,
}

impl<'a> SettingsApi<'a> {
    pub fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    fn path<T: SettingsResource>(store_id: &str) -> String {
        format!("/api/stores/{store_id}/{}", T::PATH)
    }

    pub async fn list<T: SettingsResource>(&self, store_id: &str) -> Result<Vec<T>, PosError> {
        let body = self.client.get_value(&Self::path::<T>(store_id)).await?;
        Ok(parse_resource_list(&body))
    }

    /// Returns the stored record, or `item` itself when the response is empty.
    pub async fn create<T: SettingsResource>(&self, store_id: &str, item: &T) -> Result<T, PosError> {
        item.validate()?;
        let body = self.client.post_value(&Self::path::<T>(store_id), item).await?;
        let saved = decode_saved(body, item);
        info!(store_id, resource = T::PATH, id = ?saved.id(), "Settings record created");
        Ok(saved)
    }

    pub async fn update<T: SettingsResource>(&self, store_id: &str, item: &T) -> Result<T, PosError> {
        let id = item
            .id()
            .ok_or_else(|| PosError::validation(format!("{} record has no id", T::LABEL)))?;
        item.validate()?;
        let path = format!("{}/{id}", Self::path::<T>(store_id));
        let body = self.client.put_value(&path, item).await?;
        let saved = decode_saved(body, item);
        info!(store_id, resource = T::PATH, id, "Settings record updated");
        Ok(saved)
    }

    pub async fn delete<T: SettingsResource>(&self, store_id: &str, id: &str) -> Result<(), PosError> {
        self.client
            .delete(&format!("{}/{id}", Self::path::<T>(store_id)))
            .await?;
        info!(store_id, resource = T::PATH, id, "Settings record deleted");
        Ok(())
    }
}

fn decode_saved<T: SettingsResource>(body: Value, fallback: &T) -> T {
    match unwrap_data(body) {
        Value::Object(obj) => serde_json::from_value(Value::Object(obj)).unwrap_or_else(|e| {
            warn!(resource = T::PATH, error = %e, "Could not decode saved settings record");
            fallback.clone()
        }),
        _ => fallback.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn tabs_cover_every_resource() {
        let paths: Vec<&str> = SettingsTab::ALL.iter().map(|t| t.path()).collect();
        assert_eq!(paths.len(), 8);
        assert!(paths.contains(&"warranty-types"));
        assert_eq!(SettingsTab::ReturnReasons.label(), "Return Reasons");
    }

    #[test]
    fn unit_requires_both_names() {
        let mut unit = Unit {
            name: "Kilogram".into(),
            ..Unit::default()
        };
        assert_eq!(unit.validate().unwrap_err().user_message(), "Short name is required");
        unit.short_name = "kg".into();
        assert!(unit.validate().is_ok());
    }

    #[test]
    fn attribute_values_unique_case_insensitive() {
        let attr: Attribute = serde_json::from_value(json!({
            "id": 3, "name": "Color", "values": ["Red", { "value": "red " }]
        }))
        .unwrap();
        assert_eq!(attr.id.as_deref(), Some("3"));
        assert!(attr.validate().is_err());

        let attr = Attribute {
            name: "Size".into(),
            values: vec!["S".into(), " ".into()],
            ..Attribute::default()
        };
        assert!(attr.validate().is_err());
    }

    #[test]
    fn currency_rules() {
        let mut usd = Currency {
            name: "US Dollar".into(),
            code: "USD".into(),
            symbol: "$".into(),
            exchange_rate: dec!(1),
            is_default: true,
            ..Currency::default()
        };
        assert!(usd.validate().is_ok());
        usd.code = "US1".into();
        assert!(usd.validate().is_err());
        usd.code = "USD".into();
        usd.exchange_rate = Decimal::ZERO;
        assert!(usd.validate().is_err());
        usd.exchange_rate = dec!(1);

        let eur = Currency {
            code: "EUR".into(),
            ..usd.clone()
        };
        assert!(Currency::validate_collection(&[usd.clone(), eur.clone()]).is_err());
        let eur = Currency {
            is_default: false,
            ..eur
        };
        assert!(Currency::validate_collection(&[usd, eur]).is_ok());
    }

    #[test]
    fn warranty_duration_and_unit() {
        let w: WarrantyType =
            serde_json::from_value(json!({ "name": "Std", "duration": "12", "unit": "month" })).unwrap();
        assert_eq!(w.duration_unit, DurationUnit::Months);
        assert!(w.validate().is_ok());
        let w = WarrantyType { duration: 0, ..w };
        assert!(w.validate().is_err());
    }

    #[test]
    fn duration_unit_labels_are_case_insensitive() {
        let body = json!([
            { "id": 1, "name": "A", "duration": 6, "duration_unit": "Months" },
            { "id": 2, "name": "B", "duration": 2, "duration_unit": "weeks" },
            { "id": 3, "name": "C", "duration": 1, "duration_unit": " YEAR " },
            { "id": 4, "name": "D", "duration": 30, "duration_unit": null }
        ]);
        let rows: Vec<WarrantyType> = parse_resource_list(&body);
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].duration_unit, DurationUnit::Months);
        assert_eq!(rows[1].duration_unit, DurationUnit::Other("weeks".into()));
        assert_eq!(rows[2].duration_unit, DurationUnit::Years);
        assert_eq!(rows[3].duration_unit, DurationUnit::Months);
        assert!(rows[0].validate().is_ok());
        assert_eq!(
            rows[1].validate().unwrap_err().user_message(),
            "Unsupported duration unit \"weeks\"; use days, months or years"
        );
        assert_eq!(serde_json::to_value(&rows[2]).unwrap()["duration_unit"], "years");
    }

    #[test]
    fn list_parsing_skips_bad_rows() {
        let body = json!({ "data": [
            { "id": 1, "name": "Std", "duration": 1, "duration_unit": "years" },
            { "id": 2, "name": "Odd", "duration": 1, "duration_unit": "fortnights" }
        ] });
        let rows: Vec<WarrantyType> = parse_resource_list(&body);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].duration_unit, DurationUnit::Years);
        assert_eq!(rows[1].duration_unit, DurationUnit::Other("fortnights".into()));
        assert!(rows[1].validate().is_err());

        let rows: Vec<WarrantyType> = parse_resource_list(&json!([{ "id": 1, "name": 5 }]));
        assert!(rows.is_empty());

        let methods: Vec<PaymentMethod> = parse_resource_list(&json!([{ "id": 1, "name": "Cash" }]));
        assert!(methods[0].active);
    }

    #[test]
    fn saved_record_falls_back_to_input() {
        let reason = ReturnReason {
            name: "Damaged".into(),
            ..ReturnReason::default()
        };
        assert_eq!(decode_saved(Value::Null, &reason), reason);
        let saved = decode_saved(json!({ "data": { "id": 9, "name": "Damaged" } }), &reason);
        assert_eq!(saved.id.as_deref(), Some("9"));
    }
}
