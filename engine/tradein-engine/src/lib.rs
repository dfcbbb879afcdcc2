//! Trade-in Price Engine
//!
//! Builds a complete trade-in price table for every device condition
//! (country × body grade × screen grade × battery bucket × accessories) from a
//! sparse set of manually verified reference prices. Missing prices are
//! estimated by an ordered chain of resolution strategies, and every result is
//! clamped to a price floor.
//!
//! ## Usage
//!
//! ```rust
//! use tradein_engine::{PriceTableEngine, PricingPolicy, ReferencePriceTable};
//!
//! let reference = ReferencePriceTable::from_entries([
//!     ("Export_GradeC_GradeC_91-100%_None", 760),
//! ])
//! .unwrap();
//! let table = PriceTableEngine::new(reference, PricingPolicy::default()).generate();
//!
//! assert_eq!(table.len(), 512);
//! assert_eq!(table.price_for_key("Export_GradeC_GradeC_91-100%_None"), Some(760));
//! ```

pub mod audit;
pub mod calculator;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod output;
pub mod reference;


pub use audit::{audit_tier_drift, DriftReport, TierDrift};
pub use calculator::{PriceCalculator, ResolutionStrategy};
pub use catalog::{generate_catalog, Catalog, CatalogConfig, ConditionModel, ModelScaling};
pub use config::{GeneratorConfig, PricingPolicy, SpotCheck};
pub use engine::{PriceTable, PriceTableEngine, SpotCheckResult};
pub use error::{PricingError, Result};
pub use models::*;
pub use reference::ReferencePriceTable;

/// Current version of the engine
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
