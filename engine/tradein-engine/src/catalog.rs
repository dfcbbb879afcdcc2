//! Multi-model catalog expansion.
//!
//! Each catalog model gets its own used-device price model: a base price
//! scaled from the reference device by a per-model factor and a per-storage
//! adjustment, then percentage deductions for body and screen grade, a flat
//! export deduction and a battery multiplier. The reference model at the
//! reference storage tier carries the resolved price table instead.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::config::BatteryRatios;
use crate::engine::PriceTable;
use crate::error::{PricingError, Result};
use crate::models::{
    Accessories, BatteryBucket, ConditionTuple, Country, Grade, Price, MAX_PRICE,
};

/// Largest accepted model factor
pub const MAX_MODEL_FACTOR: f64 = 100.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Model whose reference-storage conditions come from the resolved table
    pub reference_model: String,

    /// Storage tier the reference prices were quoted at
    pub reference_storage: String,

    /// Catalog output file, relative to the generator output directory
    pub output_file: String,

    /// Reference-model prices for unused devices
    pub new_sealed_base: Price,
    pub new_activated_base: Price,

    pub new_sealed_floor: Price,
    pub new_activated_floor: Price,
    pub used_base_floor: Price,

    /// Flat adjustment per storage tier; unknown tiers adjust by 0
    pub storage_adjustments: BTreeMap<String, Price>,

    pub conditions: ConditionModel,

    pub models: Vec<ModelScaling>,
}

/// Price factor of one model relative to the reference device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelScaling {
    pub name: String,
    pub brand: String,
    pub factor: f64,
    pub storage: Vec<String>,
}

/// Condition pricing for scaled catalog models
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditionModel {
    /// Lowest condition price a scaled model is listed at
    pub floor: Price,

    /// Flat deduction for export devices
    pub export_deduction: Price,

    /// Fractions of the used base price deducted per grade
    pub body_rates: GradeRates,
    pub screen_rates: GradeRates,

    pub battery_factors: BatteryRatios,
}

/// Deduction fractions relative to GradeA
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GradeRates {
    #[serde(rename = "GradeB")]
    pub grade_b: f64,
    #[serde(rename = "GradeC")]
    pub grade_c: f64,
    #[serde(rename = "Defective")]
    pub defective: f64,
}

impl GradeRates {
    pub fn rate(&self, grade: Grade) -> f64 {
        match grade {
            Grade::GradeA => 0.0,
            Grade::GradeB => self.grade_b,
            Grade::GradeC => self.grade_c,
            Grade::Defective => self.defective,
        }
    }
}

impl Default for ConditionModel {
    fn default() -> Self {
        Self {
            floor: 50,
            export_deduction: 60,
            body_rates: GradeRates { grade_b: 0.10, grade_c: 0.15, defective: 0.28 },
            screen_rates: GradeRates { grade_b: 0.06, grade_c: 0.13, defective: 0.24 },
            battery_factors: BatteryRatios {
                health_91_100: 1.0,
                health_86_90: 0.97,
                health_81_85: 0.94,
                health_80: 0.92,
            },
        }
    }
}

impl ConditionModel {
    /// Price of one accessory-free condition for a model with `used_base`
    pub fn price(&self, tuple: &ConditionTuple, used_base: Price) -> Price {
        let mut price = used_base;
        if tuple.country == Country::Export {
            price -= self.export_deduction;
        }
        price -= (used_base as f64 * self.body_rates.rate(tuple.body)) as Price;
        price -= (used_base as f64 * self.screen_rates.rate(tuple.screen)) as Price;
        price = (price as f64 * self.battery_factors.ratio(tuple.battery)) as Price;
        price.max(self.floor)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0..=MAX_PRICE).contains(&self.floor) || !(0..=MAX_PRICE).contains(&self.export_deduction)
        {
            return Err(PricingError::config(format!(
                "catalog condition floor and export deduction must be within 0..={}",
                MAX_PRICE
            )));
        }
        for grade in Grade::ALL {
            for rate in [self.body_rates.rate(grade), self.screen_rates.rate(grade)] {
                if !(0.0..=1.0).contains(&rate) {
                    return Err(PricingError::config(format!(
                        "catalog deduction rate for {} must be in [0, 1], got {}",
                        grade, rate
                    )));
                }
            }
        }
        for battery in BatteryBucket::ALL {
            let factor = self.battery_factors.ratio(battery);
            if !(factor > 0.0 && factor <= 1.0) {
                return Err(PricingError::config(format!(
                    "catalog battery factor for {} must be in (0, 1], got {}",
                    battery, factor
                )));
            }
        }
        Ok(())
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        let storage_adjustments = [
            ("64GB", -50),
            ("128GB", 0),
            ("256GB", 50),
            ("512GB", 100),
            ("1TB", 150),
            ("2TB", 200),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        Self {
            reference_model: "iPhone 16 Pro Max".to_string(),
            reference_storage: "256GB".to_string(),
            output_file: "catalog.json".to_string(),
            new_sealed_base: 2400,
            new_activated_base: 2200,
            new_sealed_floor: 100,
            new_activated_floor: 90,
            used_base_floor: 80,
            storage_adjustments,
            conditions: ConditionModel::default(),
            models: Vec::new(),
        }
    }
}

impl CatalogConfig {
    pub fn validate(&self) -> Result<()> {
        let amounts = [
            ("new_sealed_base", self.new_sealed_base),
            ("new_activated_base", self.new_activated_base),
            ("new_sealed_floor", self.new_sealed_floor),
            ("new_activated_floor", self.new_activated_floor),
            ("used_base_floor", self.used_base_floor),
        ];
        if let Some((name, _)) = amounts.iter().find(|(_, v)| !(0..=MAX_PRICE).contains(v)) {
            return Err(PricingError::config(format!(
                "catalog {} must be within 0..={}",
                name, MAX_PRICE
            )));
        }

        if let Some((tier, _)) = self.storage_adjustments.iter().find(|(_, v)| v.abs() > MAX_PRICE) {
            return Err(PricingError::config(format!(
                "storage adjustment for {} exceeds {}",
                tier, MAX_PRICE
            )));
        }

        self.conditions.validate()?;

        for model in &self.models {
            if model.name.trim().is_empty() || model.brand.trim().is_empty() {
                return Err(PricingError::config("catalog models need a name and brand"));
            }
            if !(model.factor > 0.0 && model.factor <= MAX_MODEL_FACTOR) {
                return Err(PricingError::config(format!(
                    "catalog model '{}' factor must be in (0, {}]",
                    model.name, MAX_MODEL_FACTOR
                )));
            }
            if model.storage.is_empty() {
                return Err(PricingError::config(format!(
                    "catalog model '{}' lists no storage tiers",
                    model.name
                )));
            }
        }

        Ok(())
    }

    pub fn storage_adjustment(&self, storage: &str) -> Price {
        self.storage_adjustments.get(storage).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Catalog {
    pub generated_at: DateTime<Utc>,
    pub base_model: String,
    pub reference_model: String,
    pub reference_storage: String,
    pub best_used: Price,
    /// brand -> model -> prices
    pub brands: BTreeMap<String, BTreeMap<String, ModelPrices>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelPrices {
    pub factor: f64,
    pub storage: BTreeMap<String, StoragePrices>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoragePrices {
    pub new_sealed: Price,
    pub new_activated: Price,
    pub used_base: Price,
    /// True when `conditions` is the resolved reference table
    pub verified: bool,
    /// Keyed `{country}_{body}_{screen}_{battery}`
    pub conditions: BTreeMap<String, Price>,
}

impl Catalog {
    pub fn model(&self, brand: &str, name: &str) -> Option<&ModelPrices> {
        self.brands.get(brand)?.get(name)
    }

    pub fn model_count(&self) -> usize {
        self.brands.values().map(BTreeMap::len).sum()
    }
}

fn scaled(base: Price, factor: f64, adjustment: Price) -> Price {
    (base as f64 * factor + adjustment as f64) as Price
}

/// Best-condition tuple the catalog scales from
pub fn best_used_tuple() -> ConditionTuple {
    ConditionTuple::new(
        Country::Local,
        Grade::GradeA,
        Grade::GradeA,
        BatteryBucket::REFERENCE,
        Accessories::None,
    )
}

fn accessory_free() -> impl Iterator<Item = ConditionTuple> {
    ConditionTuple::all().filter(|t| t.accessories == Accessories::None)
}

pub fn generate_catalog(
    config: &CatalogConfig,
    table: &PriceTable,
    base_model: &str,
) -> Result<Catalog> {
    config.validate()?;

    let best_used = table
        .get(&best_used_tuple())
        .map(|r| r.price)
        .ok_or_else(|| PricingError::config("price table has no best-condition entry"))?;
    if best_used <= 0 {
        return Err(PricingError::config(format!(
            "best-condition price must be positive to scale a catalog, got {}",
            best_used
        )));
    }

    let mut brands: BTreeMap<String, BTreeMap<String, ModelPrices>> = BTreeMap::new();
    let mut reference_found = false;

    for model in &config.models {
        let mut storage = BTreeMap::new();

        for tier in &model.storage {
            let adjustment = config.storage_adjustment(tier);
            let used_base = scaled(best_used, model.factor, adjustment).max(config.used_base_floor);
            let verified =
                model.name == config.reference_model && *tier == config.reference_storage;

            let conditions = if verified {
                reference_found = true;
                accessory_free()
                    .filter_map(|t| table.get(&t).map(|r| (t.condition_key(), r.price)))
                    .collect()
            } else {
                accessory_free()
                    .map(|t| (t.condition_key(), config.conditions.price(&t, used_base)))
                    .collect()
            };

            storage.insert(
                tier.clone(),
                StoragePrices {
                    new_sealed: scaled(config.new_sealed_base, model.factor, adjustment)
                        .max(config.new_sealed_floor),
                    new_activated: scaled(config.new_activated_base, model.factor, adjustment)
                        .max(config.new_activated_floor),
                    used_base,
                    verified,
                    conditions,
                },
            );
        }

        brands
            .entry(model.brand.clone())
            .or_default()
            .insert(model.name.clone(), ModelPrices { factor: model.factor, storage });
    }

    if !reference_found && !config.models.is_empty() {
        warn!(
            "Catalog has no {} {} entry; every model uses the condition model",
            config.reference_model, config.reference_storage
        );
    }

    let catalog = Catalog {
        generated_at: Utc::now(),
        base_model: base_model.to_string(),
        reference_model: config.reference_model.clone(),
        reference_storage: config.reference_storage.clone(),
        best_used,
        brands,
    };

    info!("Catalog generated for {} models", catalog.model_count());
    Ok(catalog)
}
