//! Trade-in price table CLI
//!
//! Commands:
//! - generate: resolve every condition and write the JSON/CSV tables
//! - resolve: price a single storefront key
//! - audit: compare fallback tiers against the reference prices
//! - catalog: price every configured model from the resolved table
//! - init: write a default configuration file

mod logging;
mod report;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use tradein_engine::output::{verify_storefront_contract, write_catalog, write_csv, write_json};
use tradein_engine::{
    audit_tier_drift, generate_catalog, GeneratorConfig, PriceTableEngine, ReferencePriceTable,
};

#[derive(Parser)]
#[command(name = "price-table")]
#[command(about = "Generate trade-in price tables from verified reference prices")]
#[command(version)]
struct Cli {
    /// Generator configuration file
    #[arg(short, long, global = true, default_value = "pricing.toml")]
    config: PathBuf,

    /// Debug-level logging (ignored when RUST_LOG is set)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve all combinations and write the JSON and CSV tables
    Generate {
        /// Exit non-zero when a spot check does not match
        #[arg(long)]
        strict: bool,
    },

    /// Resolve a single key, e.g. Export_GradeC_GradeC_91-100%_None
    Resolve { key: String },

    /// Report how far each fallback tier drifts from the reference prices
    Audit {
        /// List every comparison, not just those above the threshold
        #[arg(long)]
        all: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Expand the table across the configured model catalog
    Catalog,

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Loaded inputs shared by every command that resolves prices
struct Inputs {
    config: GeneratorConfig,
    engine: PriceTableEngine,
}

fn load_inputs(config_path: &Path) -> Result<Inputs> {
    let config = GeneratorConfig::load_from_file(config_path)
        .with_context(|| format!("Failed to load config {}", config_path.display()))?;
    info!("Loaded configuration for {}", config.label);

    let reference_path = config.reference_file();
    let reference = ReferencePriceTable::load_from_file(&reference_path).with_context(|| {
        format!("Failed to load reference prices {}", reference_path.display())
    })?;

    let engine = PriceTableEngine::new(reference, config.policy.clone());
    Ok(Inputs { config, engine })
}

fn run_generate(config_path: &Path, strict: bool) -> Result<()> {
    let Inputs { config, engine } = load_inputs(config_path)?;
    let table = engine.generate();

    let json_path = config.json_output();
    let csv_path = config.csv_output();
    write_json(&table, &config.label, &config.note, &json_path)
        .with_context(|| format!("Failed to write {}", json_path.display()))?;
    write_csv(&table, &csv_path).with_context(|| format!("Failed to write {}", csv_path.display()))?;

    let missing = verify_storefront_contract(&json_path)?;
    if !missing.is_empty() {
        bail!("{} storefront keys missing from {}", missing.len(), json_path.display());
    }

    report::print_table_summary(&table, &config.label);
    let results = table.spot_check(&config.spot_checks);
    report::print_spot_checks(&results);
    report::print_extremes(&table, config.top_n);

    println!();
    println!("  Saved: {}", json_path.display());
    println!("  Saved: {}", csv_path.display());

    let failed = results.iter().filter(|r| !r.matches()).count();
    if strict && failed > 0 {
        bail!("{} spot check(s) did not match", failed);
    }
    Ok(())
}

fn run_resolve(config_path: &Path, key: &str) -> Result<()> {
    let Inputs { engine, .. } = load_inputs(config_path)?;
    let (tuple, resolved) = engine.resolve_key(key).with_context(|| format!("Cannot resolve '{}'", key))?;
    report::print_resolution(&tuple, &resolved);
    Ok(())
}

fn run_audit(config_path: &Path, all: bool, json: bool) -> Result<()> {
    let Inputs { config, engine } = load_inputs(config_path)?;
    let report = audit_tier_drift(engine.calculator().reference(), &config.policy);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        report::print_drift(&report, all);
    }
    Ok(())
}

fn run_catalog(config_path: &Path) -> Result<()> {
    let Inputs { config, engine } = load_inputs(config_path)?;
    let Some(catalog_config) = &config.catalog else {
        bail!("No [catalog] section in {}", config_path.display());
    };

    let table = engine.generate();
    let catalog = generate_catalog(catalog_config, &table, &config.label)?;

    let path = config.resolve_path(&config.output_dir).join(&catalog_config.output_file);
    write_catalog(&catalog, &path).with_context(|| format!("Failed to write {}", path.display()))?;

    report::print_catalog_summary(&catalog);
    println!();
    println!("  Saved: {}", path.display());
    Ok(())
}

fn run_init(config_path: &Path, force: bool) -> Result<()> {
    if config_path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", config_path.display());
    }
    GeneratorConfig::default()
        .save_to_file(config_path)
        .with_context(|| format!("Failed to write {}", config_path.display()))?;
    println!("{} {}", "Wrote".green().bold(), config_path.display());
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::initialize_logging(cli.verbose)?;

    let result = match &cli.command {
        Commands::Generate { strict } => run_generate(&cli.config, *strict),
        Commands::Resolve { key } => run_resolve(&cli.config, key),
        Commands::Audit { all, json } => run_audit(&cli.config, *all, *json),
        Commands::Catalog => run_catalog(&cli.config),
        Commands::Init { force } => run_init(&cli.config, *force),
    };

    if let Err(e) = &result {
        error!("{:#}", e);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_generate_defaults() {
        let cli = Cli::try_parse_from(["price-table", "generate"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("pricing.toml"));
        assert!(!cli.verbose);
        assert!(matches!(cli.command, Commands::Generate { strict: false }));
    }

    #[test]
    fn test_parse_resolve_with_global_flags() {
        let cli = Cli::try_parse_from([
            "price-table",
            "resolve",
            "Export_GradeC_GradeC_91-100%_None",
            "--config",
            "conf/pricing.toml",
            "-v",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from("conf/pricing.toml"));
        assert!(cli.verbose);
        match cli.command {
            Commands::Resolve { key } => assert_eq!(key, "Export_GradeC_GradeC_91-100%_None"),
            _ => panic!("Expected Resolve"),
        }
    }

    #[test]
    fn test_missing_config_is_fatal() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let result = load_inputs(&temp_dir.path().join("missing.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_reference_is_fatal() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config_path = temp_dir.path().join("pricing.toml");
        std::fs::write(temp_dir.path().join("reference_prices.json"), "{}").unwrap();
        GeneratorConfig::default().save_to_file(&config_path).unwrap();

        let err = load_inputs(&config_path).err().unwrap();
        assert!(format!("{:#}", err).contains("empty"));
    }

    #[test]
    fn test_generate_writes_outputs() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config_path = temp_dir.path().join("pricing.toml");
        std::fs::write(
            temp_dir.path().join("reference_prices.json"),
            r#"{"Export_GradeC_GradeC_91-100%_None": 760}"#,
        )
        .unwrap();
        let config = GeneratorConfig {
            spot_checks: vec![tradein_engine::SpotCheck {
                key: "Export_GradeC_GradeC_91-100%_None".to_string(),
                expected: 760,
            }],
            ..Default::default()
        };
        config.save_to_file(&config_path).unwrap();

        run_generate(&config_path, true).unwrap();
        assert!(temp_dir.path().join("price_table.json").exists());
        assert!(temp_dir.path().join("price_table.csv").exists());
    }
}
