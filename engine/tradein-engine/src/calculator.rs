//! Price resolution: an ordered chain of named strategies.
//!
//! Each strategy inspects one tuple against the reference table and either
//! yields an estimate or passes. The calculator walks the chain in order and
//! takes the first estimate, then applies the price floor.

use tracing::debug;

use crate::config::PricingPolicy;
use crate::models::{
    BatteryBucket, ConditionTuple, Country, Estimate, Price, ResolvedPrice, StrategyKind,
};
use crate::reference::ReferencePriceTable;

/// One tier of the fallback chain
pub trait ResolutionStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    fn estimate(
        &self,
        tuple: &ConditionTuple,
        reference: &ReferencePriceTable,
        policy: &PricingPolicy,
    ) -> Option<Estimate>;
}

/// Reference price for the exact tuple, plus accessory bonus
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactMatch;

/// Same country/body/screen at the reference battery bucket, scaled by battery ratio
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceBattery;

/// Local reference at the reference battery bucket; export tuples take a
/// body-dependent discount before battery scaling
#[derive(Debug, Clone, Copy, Default)]
pub struct CrossCountry;

/// Additive deduction model from a fixed best-case base; always yields
#[derive(Debug, Clone, Copy, Default)]
pub struct Structural;

impl ResolutionStrategy for ExactMatch {
    fn kind(&self) -> StrategyKind {
        StrategyKind::ExactMatch
    }

    fn estimate(
        &self,
        tuple: &ConditionTuple,
        reference: &ReferencePriceTable,
        policy: &PricingPolicy,
    ) -> Option<Estimate> {
        let base = reference.get(tuple)?;
        Some(Estimate::exact(base + policy.accessory_bonus(tuple.accessories)))
    }
}

impl ResolutionStrategy for ReferenceBattery {
    fn kind(&self) -> StrategyKind {
        StrategyKind::ReferenceBattery
    }

    fn estimate(
        &self,
        tuple: &ConditionTuple,
        reference: &ReferencePriceTable,
        policy: &PricingPolicy,
    ) -> Option<Estimate> {
        let base = reference.get(&tuple.with_battery(BatteryBucket::REFERENCE))?;
        let price = policy.apply_battery(base, tuple.battery) + policy.accessory_bonus(tuple.accessories);
        Some(Estimate::estimated(price))
    }
}

impl ResolutionStrategy for CrossCountry {
    fn kind(&self) -> StrategyKind {
        StrategyKind::CrossCountry
    }

    fn estimate(
        &self,
        tuple: &ConditionTuple,
        reference: &ReferencePriceTable,
        policy: &PricingPolicy,
    ) -> Option<Estimate> {
        let local = tuple.with_country(Country::Local).with_battery(BatteryBucket::REFERENCE);
        let base = reference.get(&local)? - policy.export_discount_for(tuple);
        let price = policy.apply_battery(base, tuple.battery) + policy.accessory_bonus(tuple.accessories);
        Some(Estimate::estimated(price))
    }
}

impl Structural {
    /// Deduction-model price; shared with the catalog and audit paths
    pub fn price(tuple: &ConditionTuple, policy: &PricingPolicy) -> Price {
        let mut base = policy.structural_base;
        if tuple.country == Country::Export {
            base -= policy.structural_export_deduction;
        }
        base -= policy.body_deductions.deduction(tuple.body);
        base -= policy.screen_deductions.deduction(tuple.screen);
        policy.apply_battery(base, tuple.battery) + policy.accessory_bonus(tuple.accessories)
    }
}

impl ResolutionStrategy for Structural {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Structural
    }

    fn estimate(
        &self,
        tuple: &ConditionTuple,
        _reference: &ReferencePriceTable,
        policy: &PricingPolicy,
    ) -> Option<Estimate> {
        Some(Estimate::estimated(Structural::price(tuple, policy)))
    }
}

/// The standard four-tier chain, in priority order
pub fn default_chain() -> Vec<Box<dyn ResolutionStrategy>> {
    vec![
        Box::new(ExactMatch),
        Box::new(ReferenceBattery),
        Box::new(CrossCountry),
        Box::new(Structural),
    ]
}

/// Resolves tuples against a fixed reference table and policy
pub struct PriceCalculator {
    reference: ReferencePriceTable,
    policy: PricingPolicy,
    chain: Vec<Box<dyn ResolutionStrategy>>,
}

impl PriceCalculator {
    /// Create a calculator with the standard strategy chain
    pub fn new(reference: ReferencePriceTable, policy: PricingPolicy) -> Self {
        Self::with_chain(reference, policy, default_chain())
    }

    /// Create a calculator with a custom strategy chain
    pub fn with_chain(
        reference: ReferencePriceTable,
        policy: PricingPolicy,
        chain: Vec<Box<dyn ResolutionStrategy>>,
    ) -> Self {
        Self { reference, policy, chain }
    }

    pub fn reference(&self) -> &ReferencePriceTable {
        &self.reference
    }

    pub fn policy(&self) -> &PricingPolicy {
        &self.policy
    }

    pub fn strategies(&self) -> impl Iterator<Item = StrategyKind> + '_ {
        self.chain.iter().map(|s| s.kind())
    }

    /// Resolve one tuple. Never fails: a chain that passes on every tier
    /// falls through to the structural estimate.
    pub fn resolve(&self, tuple: &ConditionTuple) -> ResolvedPrice {
        let (strategy, estimate) = self
            .chain
            .iter()
            .find_map(|s| s.estimate(tuple, &self.reference, &self.policy).map(|e| (s.kind(), e)))
            .unwrap_or_else(|| {
                (StrategyKind::Structural, Estimate::estimated(Structural::price(tuple, &self.policy)))
            });

        let floored = estimate.price < self.policy.price_floor;
        let price = estimate.price.max(self.policy.price_floor);

        debug!("Resolved {} -> {} via {} (floored: {})", tuple, price, strategy, floored);

        ResolvedPrice { price, provenance: estimate.provenance, strategy, floored }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Provenance;

    fn tuple(key: &str) -> ConditionTuple {
        key.parse().unwrap()
    }

    fn reference(entries: &[(&str, i64)]) -> ReferencePriceTable {
        ReferencePriceTable::from_entries(entries.iter().copied()).unwrap()
    }

    #[test]
    fn test_exact_match() {
        let table = reference(&[("Export_GradeC_GradeC_91-100%_None", 760)]);
        let policy = PricingPolicy::default();

        let hit = ExactMatch.estimate(&tuple("Export_GradeC_GradeC_91-100%_None"), &table, &policy);
        assert_eq!(hit, Some(Estimate::exact(760)));

        let with_box = ExactMatch.estimate(&tuple("Export_GradeC_GradeC_91-100%_Box"), &table, &policy);
        assert_eq!(with_box, Some(Estimate::exact(780)));

        let miss = ExactMatch.estimate(&tuple("Export_GradeC_GradeC_80%_None"), &table, &policy);
        assert_eq!(miss, None);
    }

    #[test]
    fn test_reference_battery() {
        let table = reference(&[("Local_GradeB_GradeB_91-100%_None", 910)]);
        let policy = PricingPolicy::default();

        let estimate =
            ReferenceBattery.estimate(&tuple("Local_GradeB_GradeB_80%_Box"), &table, &policy);
        assert_eq!(estimate, Some(Estimate::estimated(784)));

        let other_screen =
            ReferenceBattery.estimate(&tuple("Local_GradeB_GradeC_80%_Box"), &table, &policy);
        assert_eq!(other_screen, None);
    }

    #[test]
    fn test_cross_country_export_discount() {
        let table = reference(&[
            ("Local_GradeA_GradeA_91-100%_None", 1070),
            ("Local_GradeC_GradeA_91-100%_None", 920),
        ]);
        let policy = PricingPolicy::default();

        let standard =
            CrossCountry.estimate(&tuple("Export_GradeA_GradeA_91-100%_None"), &table, &policy);
        assert_eq!(standard, Some(Estimate::estimated(1010)));

        let worn =
            CrossCountry.estimate(&tuple("Export_GradeC_GradeA_91-100%_Cable"), &table, &policy);
        assert_eq!(worn, Some(Estimate::estimated(920 - 30 + 15)));

        let local =
            CrossCountry.estimate(&tuple("Local_GradeA_GradeA_86-90%_None"), &table, &policy);
        assert_eq!(local, Some(Estimate::estimated(1016)));
    }

    #[test]
    fn test_structural() {
        let policy = PricingPolicy::default();
        assert_eq!(Structural::price(&tuple("Local_GradeB_GradeB_80%_Box"), &policy), 784);
        assert_eq!(Structural::price(&tuple("Local_GradeA_GradeA_91-100%_None"), &policy), 1070);
        // 1070 - 60 - 280 - 240 = 490
        assert_eq!(Structural::price(&tuple("Export_Defective_Defective_91-100%_None"), &policy), 490);
    }

    #[test]
    fn test_chain_priority() {
        let table = reference(&[
            ("Local_GradeA_GradeA_91-100%_None", 1070),
            ("Local_GradeA_GradeA_80%_None", 990),
        ]);
        let calculator = PriceCalculator::new(table, PricingPolicy::default());

        let exact = calculator.resolve(&tuple("Local_GradeA_GradeA_80%_None"));
        assert_eq!(exact.strategy, StrategyKind::ExactMatch);
        assert_eq!(exact.price, 990);
        assert_eq!(exact.provenance, Provenance::Exact);

        let battery = calculator.resolve(&tuple("Local_GradeA_GradeA_86-90%_None"));
        assert_eq!(battery.strategy, StrategyKind::ReferenceBattery);
        assert_eq!(battery.price, 1016);

        let cross = calculator.resolve(&tuple("Export_GradeA_GradeA_91-100%_None"));
        assert_eq!(cross.strategy, StrategyKind::CrossCountry);
        assert_eq!(cross.price, 1010);

        let structural = calculator.resolve(&tuple("Local_GradeB_GradeB_80%_Box"));
        assert_eq!(structural.strategy, StrategyKind::Structural);
        assert_eq!(structural.price, 784);
        assert_eq!(structural.provenance, Provenance::Estimated);
    }

    #[test]
    fn test_floor_clamp() {
        let table = reference(&[("Local_Defective_Defective_91-100%_None", 40)]);
        let calculator = PriceCalculator::new(table, PricingPolicy::default());

        let resolved = calculator.resolve(&tuple("Local_Defective_Defective_91-100%_None"));
        assert_eq!(resolved.price, 100);
        assert!(resolved.floored);
        assert_eq!(resolved.provenance, Provenance::Exact);

        let resolved = calculator.resolve(&tuple("Local_Defective_Defective_91-100%_CableBox"));
        assert_eq!(resolved.price, 100);

        let untouched = calculator.resolve(&tuple("Local_GradeA_GradeA_91-100%_None"));
        assert!(!untouched.floored);
    }

    #[test]
    fn test_empty_chain_falls_back_to_structural() {
        let table = reference(&[("Local_GradeA_GradeA_91-100%_None", 1070)]);
        let calculator = PriceCalculator::with_chain(table, PricingPolicy::default(), Vec::new());

        let resolved = calculator.resolve(&tuple("Local_GradeB_GradeB_80%_Box"));
        assert_eq!(resolved.strategy, StrategyKind::Structural);
        assert_eq!(resolved.price, 784);
        assert_eq!(calculator.strategies().count(), 0);
    }

    #[test]
    fn test_alternate_policy() {
        let table = reference(&[("Local_GradeA_GradeA_91-100%_None", 1000)]);
        let mut policy = PricingPolicy::default();
        policy.accessory_bonuses.cable_box = 100;
        policy.battery_ratios.health_80 = 0.5;
        let calculator = PriceCalculator::new(table, policy);

        let resolved = calculator.resolve(&tuple("Local_GradeA_GradeA_80%_CableBox"));
        assert_eq!(resolved.price, 600);
        assert_eq!(
            calculator.resolve(&tuple("Local_GradeA_GradeA_91-100%_None")).price,
            1000
        );
    }
}
