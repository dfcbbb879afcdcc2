//! JSON and CSV writers for resolved price tables

use chrono::{DateTime, Utc};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

use crate::catalog::Catalog;
use crate::engine::PriceTable;
use crate::error::{PricingError, Result};
use crate::models::{ConditionTuple, Price};

/// Document the storefront reads by exact key lookup
#[derive(Debug, Serialize)]
pub struct PriceTableDocument<'a> {
    pub label: &'a str,
    pub note: &'a str,
    pub generated_at: DateTime<Utc>,
    pub exact_prices_used: usize,
    pub estimated_prices: usize,
    pub total: usize,
    pub prices: OrderedPrices<'a>,
}

/// Serializes prices as a JSON object in enumeration order
#[derive(Debug)]
pub struct OrderedPrices<'a>(pub &'a PriceTable);

impl Serialize for OrderedPrices<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, price) in self.0.prices() {
            map.serialize_entry(&key, &price)?;
        }
        map.end()
    }
}

/// The subset of the JSON document needed to check it after writing
#[derive(Debug, Deserialize)]
pub struct StoredPriceTable {
    pub label: String,
    pub total: usize,
    pub prices: BTreeMap<String, Price>,
}

impl<'a> PriceTableDocument<'a> {
    pub fn new(table: &'a PriceTable, label: &'a str, note: &'a str) -> Self {
        Self {
            label,
            note,
            generated_at: Utc::now(),
            exact_prices_used: table.exact_count,
            estimated_prices: table.estimated_count,
            total: table.len(),
            prices: OrderedPrices(table),
        }
    }
}

fn create_file(path: &Path) -> Result<BufWriter<File>> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| PricingError::io(parent, e))?;
        }
    }
    let file = File::create(path).map_err(|e| PricingError::io(path, e))?;
    Ok(BufWriter::new(file))
}

pub fn write_json(table: &PriceTable, label: &str, note: &str, path: &Path) -> Result<()> {
    let document = PriceTableDocument::new(table, label, note);
    let mut writer = create_file(path)?;
    serde_json::to_writer_pretty(&mut writer, &document)?;
    writer.flush().map_err(|e| PricingError::io(path, e))?;
    info!("Saved {} prices to {}", table.len(), path.display());
    Ok(())
}

/// One row per tuple, price descending
pub fn write_csv(table: &PriceTable, path: &Path) -> Result<()> {
    let mut writer = create_file(path)?;
    write_csv_rows(table, &mut writer).map_err(|e| PricingError::io(path, e))?;
    info!("Saved {} rows to {}", table.len(), path.display());
    Ok(())
}

fn write_csv_rows<W: Write>(table: &PriceTable, writer: &mut W) -> std::io::Result<()> {
    writeln!(writer, "#,Country,Body,Screen,Battery,Accessories,Price,Key")?;
    for (index, (tuple, price)) in table.ranked_entries().into_iter().enumerate() {
        writeln!(
            writer,
            "{},{},{},{},{},{},{},{}",
            index + 1,
            tuple.country,
            tuple.body,
            tuple.screen,
            tuple.battery,
            tuple.accessories,
            price,
            tuple
        )?;
    }
    writer.flush()
}

pub fn write_catalog(catalog: &Catalog, path: &Path) -> Result<()> {
    let mut writer = create_file(path)?;
    serde_json::to_writer_pretty(&mut writer, catalog)?;
    writer.flush().map_err(|e| PricingError::io(path, e))?;
    info!("Saved catalog ({} models) to {}", catalog.model_count(), path.display());
    Ok(())
}

/// Re-read a written table and confirm every storefront key is present.
/// Returns the keys that are missing.
pub fn verify_storefront_contract(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path).map_err(|e| PricingError::io(path, e))?;
    let stored: StoredPriceTable = serde_json::from_str(&content)?;

    let missing: Vec<String> = ConditionTuple::all()
        .map(|t| t.key())
        .filter(|key| !stored.prices.contains_key(key))
        .collect();

    Ok(missing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PricingPolicy;
    use crate::engine::PriceTableEngine;
    use crate::reference::ReferencePriceTable;
    use tempfile::TempDir;

    fn table() -> PriceTable {
        let reference = ReferencePriceTable::from_entries([
            ("Local_GradeA_GradeA_91-100%_None", 1070),
            ("Export_GradeC_GradeC_91-100%_None", 760),
        ])
        .unwrap();
        PriceTableEngine::new(reference, PricingPolicy::default()).generate()
    }

    #[test]
    fn test_json_output() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("out").join("prices.json");
        let table = table();

        write_json(&table, "iPhone 16 Pro Max 256GB", "test", &path).unwrap();

        let stored: StoredPriceTable =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(stored.label, "iPhone 16 Pro Max 256GB");
        assert_eq!(stored.total, 512);
        assert_eq!(stored.prices.len(), 512);
        assert_eq!(stored.prices["Export_GradeC_GradeC_91-100%_None"], 760);
        assert_eq!(stored.prices["Export_GradeC_GradeC_91-100%_CableBox"], 795);

        let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["exact_prices_used"], 8);
        assert_eq!(raw["estimated_prices"], 504);

        assert!(verify_storefront_contract(&path).unwrap().is_empty());
    }

    #[test]
    fn test_json_preserves_enumeration_order() {
        let table = table();
        let json = serde_json::to_string(&OrderedPrices(&table)).unwrap();
        let first = json.find("Local_GradeA_GradeA_91-100%_None").unwrap();
        let second = json.find("Local_GradeA_GradeA_91-100%_Cable\"").unwrap();
        let last = json.find("Export_Defective_Defective_80%_CableBox").unwrap();
        assert!(first < second && second < last);
    }

    #[test]
    fn test_csv_output() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("prices.csv");
        let table = table();

        write_csv(&table, &path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 513);
        assert_eq!(lines[0], "#,Country,Body,Screen,Battery,Accessories,Price,Key");
        assert_eq!(
            lines[1],
            "1,Local,GradeA,GradeA,91-100%,CableBox,1105,Local_GradeA_GradeA_91-100%_CableBox"
        );

        let prices: Vec<i64> = lines[1..]
            .iter()
            .map(|l| l.split(',').nth(6).unwrap().parse().unwrap())
            .collect();
        assert!(prices.windows(2).all(|w| w[0] >= w[1]));
        assert!(lines[512].starts_with("512,"));
    }

    #[test]
    fn test_contract_detects_missing_keys() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("partial.json");
        fs::write(
            &path,
            r#"{"label": "x", "total": 1, "prices": {"Local_GradeA_GradeA_91-100%_None": 1070}}"#,
        )
        .unwrap();

        let missing = verify_storefront_contract(&path).unwrap();
        assert_eq!(missing.len(), 511);
        assert!(!missing.contains(&"Local_GradeA_GradeA_91-100%_None".to_string()));
    }
}
