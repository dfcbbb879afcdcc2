use std::cmp::Reverse;
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::calculator::PriceCalculator;
use crate::config::{PricingPolicy, SpotCheck};
use crate::error::Result;
use crate::models::{ConditionTuple, Price, ResolvedPrice, StrategyKind, CONDITION_SPACE_SIZE};
use crate::reference::ReferencePriceTable;

/// Drives the calculator over the full condition space
pub struct PriceTableEngine {
    calculator: PriceCalculator,
}

/// Complete resolved table for one reference set
#[derive(Debug, Clone)]
pub struct PriceTable {
    entries: Vec<(ConditionTuple, ResolvedPrice)>,
    /// Position of each tuple in `entries`
    index: BTreeMap<ConditionTuple, usize>,
    pub exact_count: usize,
    pub estimated_count: usize,
    pub floored_count: usize,
    pub strategy_counts: BTreeMap<StrategyKind, usize>,
}

/// Outcome of comparing one key against its expected price
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpotCheckResult {
    pub key: String,
    pub expected: Price,
    /// `None` when the key is outside the condition space
    pub actual: Option<Price>,
}

impl SpotCheckResult {
    pub fn matches(&self) -> bool {
        self.actual == Some(self.expected)
    }
}

impl PriceTableEngine {
    pub fn new(reference: ReferencePriceTable, policy: PricingPolicy) -> Self {
        Self { calculator: PriceCalculator::new(reference, policy) }
    }

    pub fn with_calculator(calculator: PriceCalculator) -> Self {
        Self { calculator }
    }

    pub fn calculator(&self) -> &PriceCalculator {
        &self.calculator
    }

    /// Resolve a single storefront key
    pub fn resolve_key(&self, key: &str) -> Result<(ConditionTuple, ResolvedPrice)> {
        let tuple: ConditionTuple = key.parse()?;
        Ok((tuple, self.calculator.resolve(&tuple)))
    }

    /// Resolve every tuple in enumeration order
    pub fn generate(&self) -> PriceTable {
        info!(
            "Generating price table from {} reference prices",
            self.calculator.reference().len()
        );

        let mut entries = Vec::with_capacity(CONDITION_SPACE_SIZE);
        let mut exact_count = 0;
        let mut estimated_count = 0;
        let mut floored_count = 0;
        let mut strategy_counts = BTreeMap::new();
        let mut index = BTreeMap::new();

        for tuple in ConditionTuple::all() {
            let resolved = self.calculator.resolve(&tuple);

            if resolved.is_exact() {
                exact_count += 1;
            } else {
                estimated_count += 1;
            }
            if resolved.floored {
                floored_count += 1;
            }
            *strategy_counts.entry(resolved.strategy).or_insert(0) += 1;

            index.insert(tuple, entries.len());
            entries.push((tuple, resolved));
        }

        info!(
            "Price table complete: {} exact, {} estimated, {} floored",
            exact_count, estimated_count, floored_count
        );

        PriceTable { entries, index, exact_count, estimated_count, floored_count, strategy_counts }
    }
}

impl PriceTable {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in enumeration order
    pub fn entries(&self) -> &[(ConditionTuple, ResolvedPrice)] {
        &self.entries
    }

    pub fn get(&self, tuple: &ConditionTuple) -> Option<&ResolvedPrice> {
        self.index.get(tuple).map(|&i| &self.entries[i].1)
    }

    pub fn price_for_key(&self, key: &str) -> Option<Price> {
        let tuple: ConditionTuple = key.parse().ok()?;
        self.get(&tuple).map(|r| r.price)
    }

    /// Flat `key -> price` map in enumeration order
    pub fn prices(&self) -> impl Iterator<Item = (String, Price)> + '_ {
        self.entries.iter().map(|(t, r)| (t.key(), r.price))
    }

    /// Tuples sorted by price descending, key ascending on ties
    pub fn ranked_entries(&self) -> Vec<(ConditionTuple, Price)> {
        let mut ranked: Vec<(ConditionTuple, Price)> =
            self.entries.iter().map(|(t, r)| (*t, r.price)).collect();
        ranked.sort_by_cached_key(|(t, price)| (Reverse(*price), t.key()));
        ranked
    }

    pub fn ranked(&self) -> Vec<(String, Price)> {
        self.ranked_entries().into_iter().map(|(t, price)| (t.key(), price)).collect()
    }

    pub fn highest(&self, n: usize) -> Vec<(String, Price)> {
        self.ranked().into_iter().take(n).collect()
    }

    /// The `n` cheapest entries, still in descending order
    pub fn lowest(&self, n: usize) -> Vec<(String, Price)> {
        let ranked = self.ranked();
        let start = ranked.len().saturating_sub(n);
        ranked[start..].to_vec()
    }

    pub fn spot_check(&self, checks: &[SpotCheck]) -> Vec<SpotCheckResult> {
        checks
            .iter()
            .map(|check| {
                let result = SpotCheckResult {
                    key: check.key.clone(),
                    expected: check.expected,
                    actual: self.price_for_key(&check.key),
                };
                if result.matches() {
                    info!("Spot check {}: {} (match)", result.key, check.expected);
                } else {
                    warn!(
                        "Spot check {}: expected {}, got {:?}",
                        result.key, result.expected, result.actual
                    );
                }
                result
            })
            .collect()
    }
}
