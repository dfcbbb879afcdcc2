//! Reference price table: the sparse, manually verified ground truth

use serde::de::{Deserialize, Deserializer, MapAccess, Visitor};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use tracing::info;

use crate::error::{PricingError, Result};
use crate::models::{Accessories, ConditionTuple, Price, MAX_PRICE};

/// Known prices keyed by accessory-free condition tuples
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferencePriceTable {
    prices: BTreeMap<ConditionTuple, Price>,
}

impl ReferencePriceTable {
    /// Build a table from `key -> price` pairs, rejecting anything malformed
    pub fn from_entries<K, I>(entries: I) -> Result<Self>
    where
        K: AsRef<str>,
        I: IntoIterator<Item = (K, Price)>,
    {
        let mut prices = BTreeMap::new();

        for (key, price) in entries {
            let key = key.as_ref();
            let tuple = key
                .parse::<ConditionTuple>()
                .map_err(|e| PricingError::invalid_reference(key, e.to_string()))?;

            if tuple.accessories != Accessories::None {
                return Err(PricingError::invalid_reference(
                    key,
                    "reference prices must have accessories 'None'",
                ));
            }
            if price < 0 {
                return Err(PricingError::invalid_reference(key, "price must not be negative"));
            }
            if price > MAX_PRICE {
                return Err(PricingError::invalid_reference(
                    key,
                    format!("price must not exceed {}", MAX_PRICE),
                ));
            }
            if prices.insert(tuple, price).is_some() {
                return Err(PricingError::invalid_reference(key, "duplicate key"));
            }
        }

        if prices.is_empty() {
            return Err(PricingError::EmptyReference);
        }

        Ok(Self { prices })
    }

    /// Parse a JSON object of `key -> price`
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: RawEntries = serde_json::from_str(json)?;
        Self::from_entries(raw.0)
    }

    /// Load the reference file; any failure here is fatal to a batch run
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| PricingError::io(path, e))?;
        let table = Self::from_json_str(&content)?;
        info!("Loaded {} reference prices from {}", table.len(), path.display());
        Ok(table)
    }

    /// Price for the accessory-free version of `tuple`
    pub fn get(&self, tuple: &ConditionTuple) -> Option<Price> {
        self.prices.get(&tuple.base()).copied()
    }

    pub fn contains(&self, tuple: &ConditionTuple) -> bool {
        self.prices.contains_key(&tuple.base())
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ConditionTuple, &Price)> {
        self.prices.iter()
    }

    /// Copy of the table with one entry removed; used by the drift audit
    pub fn without(&self, tuple: &ConditionTuple) -> Self {
        let mut prices = self.prices.clone();
        prices.remove(&tuple.base());
        Self { prices }
    }
}

/// Object entries in document order, repeated keys included
struct RawEntries(Vec<(String, Price)>);

impl<'de> Deserialize<'de> for RawEntries {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = RawEntries;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object of condition key to integer price")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut map: A,
            ) -> std::result::Result<RawEntries, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some(entry) = map.next_entry::<String, Price>()? {
                    entries.push(entry);
                }
                Ok(RawEntries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_lookup_ignores_accessories() {
        let table =
            ReferencePriceTable::from_entries([("Local_GradeA_GradeA_91-100%_None", 1070)])
                .unwrap();
        let tuple: ConditionTuple = "Local_GradeA_GradeA_91-100%_CableBox".parse().unwrap();
        assert_eq!(table.get(&tuple), Some(1070));
        assert!(table.contains(&tuple));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_rejects_accessory_keys() {
        let result = ReferencePriceTable::from_entries([("Local_GradeA_GradeA_91-100%_Box", 1090)]);
        assert!(matches!(result, Err(PricingError::InvalidReference { .. })));
    }

    #[test]
    fn test_rejects_malformed_and_negative() {
        assert!(ReferencePriceTable::from_entries([("Local_GradeA", 1)]).is_err());
        assert!(
            ReferencePriceTable::from_entries([("Local_GradeA_GradeA_80%_None", -1)]).is_err()
        );
    }

    #[test]
    fn test_rejects_prices_above_ceiling() {
        let result = ReferencePriceTable::from_json_str(
            r#"{"Local_GradeA_GradeA_91-100%_None": 9223372036854775800}"#,
        );
        assert!(matches!(result, Err(PricingError::InvalidReference { .. })));

        let at_ceiling =
            ReferencePriceTable::from_entries([("Local_GradeA_GradeA_91-100%_None", MAX_PRICE)]);
        assert!(at_ceiling.is_ok());
    }

    #[test]
    fn test_rejects_repeated_json_key() {
        let result = ReferencePriceTable::from_json_str(
            r#"{"Local_GradeA_GradeA_80%_None": 990, "Local_GradeA_GradeA_80%_None": 980}"#,
        );
        match result {
            Err(PricingError::InvalidReference { key, reason }) => {
                assert_eq!(key, "Local_GradeA_GradeA_80%_None");
                assert_eq!(reason, "duplicate key");
            }
            other => panic!("Expected duplicate key error, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_empty() {
        let entries: Vec<(&str, Price)> = Vec::new();
        assert!(matches!(
            ReferencePriceTable::from_entries(entries),
            Err(PricingError::EmptyReference)
        ));
        assert!(matches!(
            ReferencePriceTable::from_json_str("{}"),
            Err(PricingError::EmptyReference)
        ));
    }

    #[test]
    fn test_rejects_non_integer_json() {
        let result = ReferencePriceTable::from_json_str(r#"{"Local_GradeA_GradeA_80%_None": "990"}"#);
        assert!(matches!(result, Err(PricingError::Json(_))));
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("reference_prices.json");
        std::fs::write(
            &path,
            r#"{"Export_GradeC_GradeC_91-100%_None": 760, "Local_GradeA_GradeA_80%_None": 990}"#,
        )
        .unwrap();

        let table = ReferencePriceTable::load_from_file(&path).unwrap();
        assert_eq!(table.len(), 2);

        let tuple: ConditionTuple = "Export_GradeC_GradeC_91-100%_None".parse().unwrap();
        assert_eq!(table.get(&tuple), Some(760));
        assert!(!table.without(&tuple).contains(&tuple));
    }

    #[test]
    fn test_missing_file_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let result = ReferencePriceTable::load_from_file(temp_dir.path().join("nope.json"));
        assert!(matches!(result, Err(PricingError::Io { .. })));
    }
}
