use crate::core::quote::Symbol;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Marker used in the portfolio JSON format for a field with no value.
pub const EMPTY_SENTINEL: &str = "empty";

/// A portfolio purchase record. Fields hold the raw user text; they are only
/// interpreted by the valuation step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HoldingRecord {
    pub symbol: Symbol,
    pub buy_price: Option<String>,
    pub buy_date: Option<String>,
    pub quantity: Option<String>,
    pub limit_high: Option<String>,
    pub limit_low: Option<String>,
    pub custom_label: Option<String>,
    pub secondary_symbol: Option<String>,
}

impl HoldingRecord {
    pub fn new(symbol: Symbol) -> Self {
        Self {
            symbol,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        [
            &self.buy_price,
            &self.buy_date,
            &self.quantity,
            &self.limit_high,
            &self.limit_low,
            &self.custom_label,
            &self.secondary_symbol,
        ]
        .iter()
        .all(|f| f.is_none())
    }

    pub fn has_buy_price(&self) -> bool {
        self.buy_price.is_some()
    }
}

/// Wire shape of a single holding in the portfolio JSON document.
#[derive(Debug, Serialize, Deserialize)]
struct HoldingFields {
    #[serde(rename = "PRICE", default, with = "sentinel")]
    price: Option<String>,
    #[serde(rename = "DATE", default, with = "sentinel")]
    date: Option<String>,
    #[serde(rename = "QUANTITY", default, with = "sentinel")]
    quantity: Option<String>,
    #[serde(rename = "LIMIT_HIGH", default, with = "sentinel")]
    limit_high: Option<String>,
    #[serde(rename = "LIMIT_LOW", default, with = "sentinel")]
    limit_low: Option<String>,
    #[serde(rename = "CUSTOM_DISPLAY", default, with = "sentinel")]
    custom_display: Option<String>,
    #[serde(rename = "SYMBOL_2", default, with = "sentinel")]
    symbol_2: Option<String>,
}

mod sentinel {
    use super::EMPTY_SENTINEL;
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    pub fn serialize<S: Serializer>(value: &Option<String>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(value.as_deref().unwrap_or(EMPTY_SENTINEL))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        let value = Value::deserialize(d)?;
        Ok(match value {
            Value::Null => None,
            Value::String(s) if s == EMPTY_SENTINEL || s.is_empty() => None,
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        })
    }
}

impl HoldingFields {
    fn from_record(record: &HoldingRecord) -> Self {
        Self {
            price: record.buy_price.clone(),
            date: record.buy_date.clone(),
            quantity: record.quantity.clone(),
            limit_high: record.limit_high.clone(),
            limit_low: record.limit_low.clone(),
            custom_display: record.custom_label.clone(),
            symbol_2: record.secondary_symbol.clone(),
        }
    }

    fn into_record(self, symbol: Symbol) -> HoldingRecord {
        HoldingRecord {
            symbol,
            buy_price: self.price,
            buy_date: self.date,
            quantity: self.quantity,
            limit_high: self.limit_high,
            limit_low: self.limit_low,
            custom_label: self.custom_display,
            secondary_symbol: self.symbol_2,
        }
    }
}

/// Serializes non-empty holdings into the portfolio JSON document.
pub fn holdings_to_json<'a>(
    holdings: impl IntoIterator<Item = &'a HoldingRecord>,
) -> serde_json::Result<String> {
    let document: BTreeMap<&Symbol, HoldingFields> = holdings
        .into_iter()
        .filter(|h| !h.is_empty())
        .map(|h| (&h.symbol, HoldingFields::from_record(h)))
        .collect();
    serde_json::to_string(&document)
}

/// Parses a portfolio JSON document. The whole document is validated before
/// anything is returned.
pub fn holdings_from_json(raw: &str) -> serde_json::Result<BTreeMap<Symbol, HoldingRecord>> {
    let document: BTreeMap<Symbol, HoldingFields> = serde_json::from_str(raw)?;
    Ok(document
        .into_iter()
        .map(|(symbol, fields)| (symbol.clone(), fields.into_record(symbol)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aapl() -> HoldingRecord {
        HoldingRecord {
            buy_price: Some("150".to_string()),
            buy_date: Some("2020-01-01".to_string()),
            quantity: Some("5".to_string()),
            ..HoldingRecord::new(Symbol::from("AAPL"))
        }
    }

    #[test]
    fn test_round_trip_preserves_fields() {
        let json = holdings_to_json([&aapl()]).unwrap();
        let restored = holdings_from_json(&json).unwrap();
        assert_eq!(restored.get(&Symbol::from("AAPL")), Some(&aapl()));
    }

    #[test]
    fn test_absent_fields_are_written_as_sentinel() {
        let json = holdings_to_json([&aapl()]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["AAPL"]["LIMIT_HIGH"], "empty");
        assert_eq!(value["AAPL"]["PRICE"], "150");
    }

    #[test]
    fn test_sentinel_and_missing_keys_read_as_absent() {
        let raw = r#"{"MSFT": {"PRICE": 300.5, "DATE": "empty", "QUANTITY": "2"}}"#;
        let restored = holdings_from_json(raw).unwrap();
        let msft = &restored[&Symbol::from("MSFT")];
        assert_eq!(msft.buy_price.as_deref(), Some("300.5"));
        assert_eq!(msft.buy_date, None);
        assert_eq!(msft.custom_label, None);
        assert_eq!(msft.quantity.as_deref(), Some("2"));
    }

    #[test]
    fn test_empty_holdings_are_not_written() {
        let blank = HoldingRecord::new(Symbol::from("GOOG"));
        assert!(blank.is_empty());
        let json = holdings_to_json([&blank, &aapl()]).unwrap();
        assert!(!json.contains("GOOG"));
    }

    #[test]
    fn test_malformed_document_is_rejected() {
        assert!(holdings_from_json("{not json").is_err());
        assert!(holdings_from_json(r#"{"AAPL": "flat string"}"#).is_err());
    }
}
