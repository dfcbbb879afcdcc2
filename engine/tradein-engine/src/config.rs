//! Configuration for the trade-in price engine

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::catalog::CatalogConfig;
use crate::error::{PricingError, Result};
use crate::models::{Accessories, BatteryBucket, ConditionTuple, Country, Grade, Price, MAX_PRICE};

/// Top-level generator configuration, normally read from `pricing.toml`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Human label of the device/config the references were taken from
    pub label: String,

    /// Free-form note copied into the JSON output
    pub note: String,

    /// Reference price file (JSON object of key -> price)
    pub reference_path: PathBuf,

    /// Directory the output files are written to
    pub output_dir: PathBuf,

    /// Output file names, relative to `output_dir`
    pub json_file: String,
    pub csv_file: String,

    /// How many highest/lowest entries the summary lists
    pub top_n: usize,

    /// Known tuples compared against their expected price after a run
    pub spot_checks: Vec<SpotCheck>,

    /// Pricing constants
    pub policy: PricingPolicy,

    /// Optional multi-model catalog expansion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog: Option<CatalogConfig>,

    /// Directory relative paths are resolved against
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// Expected price for a single key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpotCheck {
    pub key: String,
    pub expected: Price,
}

/// Constant tables driving every resolution tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingPolicy {
    /// Minimum price any tuple resolves to
    pub price_floor: Price,

    /// Starting price of the structural (last resort) estimate
    pub structural_base: Price,

    /// Flat structural deduction for export devices
    pub structural_export_deduction: Price,

    /// Absolute tier drift above which the audit logs a warning
    pub drift_warn_threshold: Price,

    /// Discount applied when an export price is derived from a local reference
    pub export_discount: ExportDiscount,

    pub battery_ratios: BatteryRatios,
    pub accessory_bonuses: AccessoryBonuses,
    pub body_deductions: GradeDeductions,
    pub screen_deductions: GradeDeductions,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatteryRatios {
    #[serde(rename = "91-100%")]
    pub health_91_100: f64,
    #[serde(rename = "86-90%")]
    pub health_86_90: f64,
    #[serde(rename = "81-85%")]
    pub health_81_85: f64,
    #[serde(rename = "80%")]
    pub health_80: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessoryBonuses {
    #[serde(rename = "None")]
    pub none: Price,
    #[serde(rename = "Cable")]
    pub cable: Price,
    #[serde(rename = "Box")]
    pub boxed: Price,
    #[serde(rename = "CableBox")]
    pub cable_box: Price,
}

/// Deductions relative to GradeA
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeDeductions {
    #[serde(rename = "GradeB")]
    pub grade_b: Price,
    #[serde(rename = "GradeC")]
    pub grade_c: Price,
    #[serde(rename = "Defective")]
    pub defective: Price,
}

/// Export discount, keyed on body grade only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportDiscount {
    /// Body GradeA or GradeB
    pub standard: Price,
    /// Body GradeC or Defective
    pub worn: Price,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            label: "iPhone 16 Pro Max 256GB".to_string(),
            note: "Reference prices used directly where available".to_string(),
            reference_path: PathBuf::from("reference_prices.json"),
            output_dir: PathBuf::from("."),
            json_file: "price_table.json".to_string(),
            csv_file: "price_table.csv".to_string(),
            top_n: 5,
            spot_checks: Vec::new(),
            policy: PricingPolicy::default(),
            catalog: None,
            base_dir: PathBuf::from("."),
        }
    }
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            price_floor: 100,
            structural_base: 1070,
            structural_export_deduction: 60,
            drift_warn_threshold: 50,
            export_discount: ExportDiscount::default(),
            battery_ratios: BatteryRatios::default(),
            accessory_bonuses: AccessoryBonuses::default(),
            body_deductions: GradeDeductions { grade_b: 100, grade_c: 150, defective: 280 },
            screen_deductions: GradeDeductions { grade_b: 60, grade_c: 130, defective: 240 },
        }
    }
}

impl Default for BatteryRatios {
    fn default() -> Self {
        Self { health_91_100: 1.0, health_86_90: 0.95, health_81_85: 0.89, health_80: 0.84 }
    }
}

impl Default for AccessoryBonuses {
    fn default() -> Self {
        Self { none: 0, cable: 15, boxed: 20, cable_box: 35 }
    }
}

impl Default for ExportDiscount {
    fn default() -> Self {
        Self { standard: 60, worn: 30 }
    }
}

impl BatteryRatios {
    pub fn ratio(&self, battery: BatteryBucket) -> f64 {
        match battery {
            BatteryBucket::Health91To100 => self.health_91_100,
            BatteryBucket::Health86To90 => self.health_86_90,
            BatteryBucket::Health81To85 => self.health_81_85,
            BatteryBucket::Health80 => self.health_80,
        }
    }
}

impl AccessoryBonuses {
    pub fn bonus(&self, accessories: Accessories) -> Price {
        match accessories {
            Accessories::None => self.none,
            Accessories::Cable => self.cable,
            Accessories::Box => self.boxed,
            Accessories::CableBox => self.cable_box,
        }
    }
}

impl GradeDeductions {
    pub fn deduction(&self, grade: Grade) -> Price {
        match grade {
            Grade::GradeA => 0,
            Grade::GradeB => self.grade_b,
            Grade::GradeC => self.grade_c,
            Grade::Defective => self.defective,
        }
    }
}

impl ExportDiscount {
    pub fn for_body(&self, body: Grade) -> Price {
        match body {
            Grade::GradeC | Grade::Defective => self.worn,
            Grade::GradeA | Grade::GradeB => self.standard,
        }
    }
}

impl PricingPolicy {
    /// `floor(base * ratio[battery])`
    pub fn apply_battery(&self, base: Price, battery: BatteryBucket) -> Price {
        (base as f64 * self.battery_ratios.ratio(battery)).floor() as Price
    }

    pub fn accessory_bonus(&self, accessories: Accessories) -> Price {
        self.accessory_bonuses.bonus(accessories)
    }

    /// Discount subtracted from a local reference when pricing an export tuple
    pub fn export_discount_for(&self, tuple: &ConditionTuple) -> Price {
        match tuple.country {
            Country::Local => 0,
            Country::Export => self.export_discount.for_body(tuple.body),
        }
    }

    /// Validate the policy
    pub fn validate(&self) -> Result<()> {
        if self.price_floor < 0 {
            return Err(PricingError::invalid_policy("price_floor must not be negative"));
        }

        for battery in BatteryBucket::ALL {
            let ratio = self.battery_ratios.ratio(battery);
            if !(ratio > 0.0 && ratio <= 1.0) {
                return Err(PricingError::invalid_policy(format!(
                    "battery ratio for {} must be in (0, 1], got {}",
                    battery, ratio
                )));
            }
        }

        for accessories in Accessories::ALL {
            if self.accessory_bonus(accessories) < 0 {
                return Err(PricingError::invalid_policy(format!(
                    "accessory bonus for {} must not be negative",
                    accessories
                )));
            }
        }

        for grade in Grade::ALL {
            if self.body_deductions.deduction(grade) < 0
                || self.screen_deductions.deduction(grade) < 0
            {
                return Err(PricingError::invalid_policy(format!(
                    "deductions for {} must not be negative",
                    grade
                )));
            }
        }

        if self.structural_export_deduction < 0
            || self.export_discount.standard < 0
            || self.export_discount.worn < 0
        {
            return Err(PricingError::invalid_policy("export discounts must not be negative"));
        }

        if self.drift_warn_threshold < 0 {
            return Err(PricingError::invalid_policy("drift_warn_threshold must not be negative"));
        }

        let amounts = [
            ("price_floor", self.price_floor),
            ("structural_base", self.structural_base),
            ("structural_export_deduction", self.structural_export_deduction),
            ("export_discount.standard", self.export_discount.standard),
            ("export_discount.worn", self.export_discount.worn),
        ];
        let grade_amounts = Grade::ALL.into_iter().flat_map(|g| {
            [self.body_deductions.deduction(g), self.screen_deductions.deduction(g)]
        });
        let bonus_amounts = Accessories::ALL.into_iter().map(|a| self.accessory_bonus(a));

        if let Some((name, _)) = amounts.iter().find(|(_, v)| *v > MAX_PRICE) {
            return Err(PricingError::invalid_policy(format!(
                "{} must not exceed {}",
                name, MAX_PRICE
            )));
        }
        if self.structural_base < 0 {
            return Err(PricingError::invalid_policy("structural_base must not be negative"));
        }
        if grade_amounts.chain(bonus_amounts).any(|v| v > MAX_PRICE) {
            return Err(PricingError::invalid_policy(format!(
                "deductions and accessory bonuses must not exceed {}",
                MAX_PRICE
            )));
        }

        Ok(())
    }
}

impl GeneratorConfig {
    /// Load configuration from a TOML file; relative paths inside it resolve
    /// against the file's directory
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| PricingError::io(path, e))?;
        let mut config: GeneratorConfig = toml::from_str(&content)?;
        config.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| PricingError::io(path, e))?;
        Ok(())
    }

    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn reference_file(&self) -> PathBuf {
        self.resolve_path(&self.reference_path)
    }

    pub fn json_output(&self) -> PathBuf {
        self.resolve_path(&self.output_dir).join(&self.json_file)
    }

    pub fn csv_output(&self) -> PathBuf {
        self.resolve_path(&self.output_dir).join(&self.csv_file)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.policy.validate()?;

        if self.json_file.trim().is_empty() || self.csv_file.trim().is_empty() {
            return Err(PricingError::config("json_file and csv_file must be set"));
        }

        for check in &self.spot_checks {
            check.key.parse::<ConditionTuple>()?;
        }

        if let Some(catalog) = &self.catalog {
            catalog.validate()?;
        }

        Ok(())
    }
}
