use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{PricingError, Result};

/// Whole-unit trade-in price
pub type Price = i64;

/// Upper bound for any configured or reference amount. Keeps every
/// resolution sum well inside `Price` range.
pub const MAX_PRICE: Price = 1_000_000_000;

/// Market the device was originally sold into
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Country {
    Local,
    Export,
}

/// Cosmetic/functional grade, shared by body and screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Grade {
    GradeA,
    GradeB,
    GradeC,
    Defective,
}

/// Battery health bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BatteryBucket {
    #[serde(rename = "91-100%")]
    Health91To100,
    #[serde(rename = "86-90%")]
    Health86To90,
    #[serde(rename = "81-85%")]
    Health81To85,
    #[serde(rename = "80%")]
    Health80,
}

/// Accessories shipped with the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Accessories {
    None,
    Cable,
    Box,
    CableBox,
}

impl Country {
    pub const ALL: [Country; 2] = [Country::Local, Country::Export];

    pub fn label(self) -> &'static str {
        match self {
            Country::Local => "Local",
            Country::Export => "Export",
        }
    }
}

impl Grade {
    pub const ALL: [Grade; 4] = [Grade::GradeA, Grade::GradeB, Grade::GradeC, Grade::Defective];

    pub fn label(self) -> &'static str {
        match self {
            Grade::GradeA => "GradeA",
            Grade::GradeB => "GradeB",
            Grade::GradeC => "GradeC",
            Grade::Defective => "Defective",
        }
    }
}

impl BatteryBucket {
    pub const ALL: [BatteryBucket; 4] = [
        BatteryBucket::Health91To100,
        BatteryBucket::Health86To90,
        BatteryBucket::Health81To85,
        BatteryBucket::Health80,
    ];

    /// Bucket the reference prices are quoted at
    pub const REFERENCE: BatteryBucket = BatteryBucket::Health91To100;

    pub fn label(self) -> &'static str {
        match self {
            BatteryBucket::Health91To100 => "91-100%",
            BatteryBucket::Health86To90 => "86-90%",
            BatteryBucket::Health81To85 => "81-85%",
            BatteryBucket::Health80 => "80%",
        }
    }
}

impl Accessories {
    pub const ALL: [Accessories; 4] =
        [Accessories::None, Accessories::Cable, Accessories::Box, Accessories::CableBox];

    pub fn label(self) -> &'static str {
        match self {
            Accessories::None => "None",
            Accessories::Cable => "Cable",
            Accessories::Box => "Box",
            Accessories::CableBox => "CableBox",
        }
    }
}

macro_rules! label_parsing {
    ($ty:ident, $field:literal) => {
        impl FromStr for $ty {
            type Err = PricingError;

            fn from_str(s: &str) -> Result<Self> {
                $ty::ALL
                    .into_iter()
                    .find(|v| v.label() == s)
                    .ok_or_else(|| PricingError::invalid_key(s, concat!("unknown ", $field)))
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }
    };
}

label_parsing!(Country, "country");
label_parsing!(Grade, "grade");
label_parsing!(BatteryBucket, "battery bucket");
label_parsing!(Accessories, "accessories");

/// A priceable device configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConditionTuple {
    pub country: Country,
    pub body: Grade,
    pub screen: Grade,
    pub battery: BatteryBucket,
    pub accessories: Accessories,
}

/// Number of tuples in the full condition space
pub const CONDITION_SPACE_SIZE: usize = Country::ALL.len()
    * Grade::ALL.len()
    * Grade::ALL.len()
    * BatteryBucket::ALL.len()
    * Accessories::ALL.len();

impl ConditionTuple {
    pub fn new(
        country: Country,
        body: Grade,
        screen: Grade,
        battery: BatteryBucket,
        accessories: Accessories,
    ) -> Self {
        Self { country, body, screen, battery, accessories }
    }

    /// Every tuple, ordered country, body, screen, battery, accessories
    pub fn all() -> impl Iterator<Item = ConditionTuple> {
        Country::ALL.into_iter().flat_map(|country| {
            Grade::ALL.into_iter().flat_map(move |body| {
                Grade::ALL.into_iter().flat_map(move |screen| {
                    BatteryBucket::ALL.into_iter().flat_map(move |battery| {
                        Accessories::ALL.into_iter().map(move |accessories| {
                            ConditionTuple::new(country, body, screen, battery, accessories)
                        })
                    })
                })
            })
        })
    }

    /// The accessory-free tuple reference prices are keyed by
    pub fn base(self) -> Self {
        Self { accessories: Accessories::None, ..self }
    }

    pub fn with_battery(self, battery: BatteryBucket) -> Self {
        Self { battery, ..self }
    }

    pub fn with_country(self, country: Country) -> Self {
        Self { country, ..self }
    }

    pub fn with_accessories(self, accessories: Accessories) -> Self {
        Self { accessories, ..self }
    }

    /// Storefront lookup key, e.g. `Export_GradeC_GradeC_91-100%_None`
    pub fn key(&self) -> String {
        self.to_string()
    }

    /// Key without the accessories segment, e.g. `Export_GradeC_GradeC_91-100%`
    pub fn condition_key(&self) -> String {
        format!("{}_{}_{}_{}", self.country, self.body, self.screen, self.battery)
    }
}

impl fmt::Display for ConditionTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}_{}_{}",
            self.country, self.body, self.screen, self.battery, self.accessories
        )
    }
}

impl FromStr for ConditionTuple {
    type Err = PricingError;

    fn from_str(key: &str) -> Result<Self> {
        let parts: Vec<&str> = key.split('_').collect();
        if parts.len() != 5 {
            return Err(PricingError::invalid_key(
                key,
                format!("expected 5 segments, found {}", parts.len()),
            ));
        }

        let wrap = |e: PricingError| match e {
            PricingError::InvalidKey { reason, .. } => PricingError::invalid_key(key, reason),
            other => other,
        };

        Ok(ConditionTuple {
            country: parts[0].parse::<Country>().map_err(wrap)?,
            body: parts[1].parse::<Grade>().map_err(wrap)?,
            screen: parts[2].parse::<Grade>().map_err(wrap)?,
            battery: parts[3].parse::<BatteryBucket>().map_err(wrap)?,
            accessories: parts[4].parse::<Accessories>().map_err(wrap)?,
        })
    }
}

/// Whether a price came straight from a reference or was derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Exact,
    Estimated,
}

/// Name of the resolution tier that produced a price
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    ExactMatch,
    ReferenceBattery,
    CrossCountry,
    Structural,
}

impl StrategyKind {
    pub fn name(self) -> &'static str {
        match self {
            StrategyKind::ExactMatch => "exact_match",
            StrategyKind::ReferenceBattery => "reference_battery",
            StrategyKind::CrossCountry => "cross_country",
            StrategyKind::Structural => "structural",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Raw strategy output, before the floor clamp
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Estimate {
    pub price: Price,
    pub provenance: Provenance,
}

impl Estimate {
    pub fn exact(price: Price) -> Self {
        Self { price, provenance: Provenance::Exact }
    }

    pub fn estimated(price: Price) -> Self {
        Self { price, provenance: Provenance::Estimated }
    }
}

/// Final price for one tuple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolvedPrice {
    pub price: Price,
    pub provenance: Provenance,
    pub strategy: StrategyKind,
    /// Set when the floor clamp raised the price
    pub floored: bool,
}

impl ResolvedPrice {
    pub fn is_exact(&self) -> bool {
        self.provenance == Provenance::Exact
    }
}
