//! Terminal summaries

use colored::*;

use tradein_engine::{Catalog, ConditionTuple, DriftReport, Price, PriceTable, ResolvedPrice, SpotCheckResult};

const RULE: &str = "================================================================================";

pub fn print_header(title: &str) {
    println!("{}", RULE);
    println!("  {}", title.cyan().bold());
    println!("{}", RULE);
}

pub fn print_table_summary(table: &PriceTable, label: &str) {
    print_header(&format!("PRICE TABLE - {} ({} combinations)", label, table.len()));
    println!();
    println!("  Exact prices used: {}", table.exact_count.to_string().green().bold());
    println!("  Estimated prices:  {}", table.estimated_count.to_string().yellow().bold());
    println!("  Floored:           {}", table.floored_count);
    println!("  Total:             {}", table.len());
    println!();
    println!("  By strategy:");
    for (strategy, count) in &table.strategy_counts {
        println!("    {:<18} {}", strategy.to_string(), count);
    }
}

pub fn print_spot_checks(results: &[SpotCheckResult]) {
    if results.is_empty() {
        return;
    }
    println!();
    println!("  Spot checks:");
    for result in results {
        let actual = result.actual.map(|p| format!("${}", p)).unwrap_or_else(|| "-".to_string());
        let status = if result.matches() { "YES".green().bold() } else { "NO".red().bold() };
        println!("    {}", result.key);
        println!("      Generated: {}", actual);
        println!("      Expected:  ${}", result.expected);
        println!("      Match:     {}", status);
    }
}

pub fn print_extremes(table: &PriceTable, n: usize) {
    if n == 0 {
        return;
    }
    println!();
    println!("  Top {} highest:", n);
    print_prices(&table.highest(n));
    println!();
    println!("  Bottom {} lowest:", n);
    print_prices(&table.lowest(n));
}

fn print_prices(prices: &[(String, Price)]) {
    for (key, price) in prices {
        println!("    ${:<6} {}", price, key);
    }
}

pub fn print_resolution(tuple: &ConditionTuple, resolved: &ResolvedPrice) {
    let provenance = if resolved.is_exact() { "exact".green().bold() } else { "estimated".yellow().bold() };
    println!("{}", tuple.key().bold());
    println!("  Price:      ${}", resolved.price);
    println!("  Provenance: {}", provenance);
    println!("  Strategy:   {}", resolved.strategy);
    if resolved.floored {
        println!("  {}", "Raised to price floor".red());
    }
}

pub fn print_drift(report: &DriftReport, show_all: bool) {
    print_header("TIER DRIFT AUDIT");
    println!();
    println!(
        "  {} comparisons, {} above threshold {}, max |drift| {}",
        report.entries.len(),
        report.flagged().count(),
        report.threshold,
        report.max_abs_drift()
    );
    println!();

    let rows: Vec<_> = if show_all {
        report.entries.iter().collect()
    } else {
        report.flagged().collect()
    };

    for drift in rows {
        let delta = format!("{:+}", drift.drift);
        let delta = if drift.abs_drift() > report.threshold { delta.red() } else { delta.normal() };
        println!(
            "    {:<42} {:<18} ref {:>5}  est {:>5}  {}",
            drift.key,
            drift.strategy.to_string(),
            drift.reference,
            drift.estimate,
            delta
        );
    }
}

pub fn print_catalog_summary(catalog: &Catalog) {
    print_header("MODEL CATALOG");
    println!();
    for (brand, models) in &catalog.brands {
        println!("  {}: {} models", brand.bold(), models.len());
    }
    println!("  Total models: {}", catalog.model_count());
    println!("  Base model:   {} (best used ${})", catalog.base_model, catalog.best_used);
}
