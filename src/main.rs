//! Bond Yields CLI
//!
//! Builds yield curves for a universe of bonds, or prints the cashflows of a
//! single bond for one evaluation date.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use bond_yields::bond::{load_bonds, load_prices, BondRecord};
use bond_yields::inflation::{load_cpi, DEFAULT_PRODUCT};
use bond_yields::{DayCount, UniverseRunner, ValuationConfig};

#[derive(Debug, Parser)]
#[command(name = "bond-yields", version, about = "Yield to maturity analytics for government bonds")]
struct Cli {
    /// JSON file with valuation settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Day count convention: act/365, act/360 or act/act
    #[arg(long, global = true)]
    day_count: Option<String>,

    /// Use clean prices (no accrued interest in the purchase cashflow)
    #[arg(long, global = true)]
    clean: bool,

    /// Assume par when no price is recorded for an evaluation date
    #[arg(long, global = true)]
    force: bool,

    #[command(subcommand)]
    command: Command,
}

/// Input files shared by all subcommands
#[derive(Debug, Args)]
struct Inputs {
    /// Bond static data CSV
    #[arg(long)]
    info: PathBuf,

    /// Wide price history CSV (DATE column plus one column per bond id)
    #[arg(long)]
    prices: PathBuf,

    /// CPI CSV; required to index inflation-linked bonds
    #[arg(long)]
    cpi: Option<PathBuf>,

    /// CPI product to index against
    #[arg(long, default_value = DEFAULT_PRODUCT)]
    product: String,

    /// Value inflation-linked bonds as nominal bonds
    #[arg(long)]
    ilbs_as_nominal: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Build yield curves for every bond and write them to CSV
    Curves {
        #[command(flatten)]
        inputs: Inputs,

        /// Output CSV path
        #[arg(long, default_value = "yield_curves.csv")]
        output: PathBuf,
    },
    /// Print the cashflows and yield of one bond on one date
    Cashflows {
        #[command(flatten)]
        inputs: Inputs,

        /// Bond identifier
        #[arg(long)]
        id: String,

        /// Evaluation date (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,

        /// Price to use instead of the recorded one
        #[arg(long)]
        price: Option<f64>,
    },
}

#[derive(Debug, Serialize)]
struct CurveRow<'a> {
    id: &'a str,
    date: NaiveDate,
    price: f64,
    ttm: f64,
    ytm: Option<f64>,
}

fn valuation_config(cli: &Cli) -> Result<ValuationConfig> {
    let mut config = match &cli.config {
        Some(path) => ValuationConfig::from_json_path(path)?,
        None => ValuationConfig::default(),
    };

    if let Some(tag) = &cli.day_count {
        config.day_count = tag.parse::<DayCount>()?;
    }
    if cli.clean {
        config.dirty = false;
    }
    if cli.force {
        config.force_par = true;
    }

    Ok(config)
}

fn runner_for(inputs: &Inputs, config: &ValuationConfig) -> Result<UniverseRunner> {
    let mut runner = UniverseRunner::new(config.clone()).ilbs_as_nominal(inputs.ilbs_as_nominal);

    if let Some(path) = &inputs.cpi {
        let loaded = load_cpi(path, &inputs.product)?;
        log::info!(
            "CPI '{}': {} months, {} - {} (products available: {})",
            inputs.product,
            loaded.series.len(),
            loaded.series.earliest(),
            loaded.series.latest(),
            loaded.available_products.len()
        );
        runner = runner.with_cpi_series(loaded.series);
    }

    Ok(runner)
}

fn load_inputs(inputs: &Inputs) -> Result<(Vec<BondRecord>, HashMap<String, bond_yields::PriceSeries>)> {
    let records = load_bonds(&inputs.info)?;
    let prices = load_prices(&inputs.prices)?;
    log::info!("Loaded {} bonds and {} price histories", records.len(), prices.len());
    Ok((records, prices))
}

fn write_curves(path: &Path, curves: &[bond_yields::YieldCurve]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;

    for curve in curves {
        for point in &curve.points {
            writer.serialize(CurveRow {
                id: &curve.bond_id,
                date: point.date,
                price: point.price,
                ttm: point.ttm,
                ytm: point.ytm,
            })?;
        }
    }

    writer.flush()?;
    Ok(())
}

fn run_curves(inputs: &Inputs, output: &Path, config: &ValuationConfig) -> Result<()> {
    let start = Instant::now();
    let (records, prices) = load_inputs(inputs)?;
    let runner = runner_for(inputs, config)?;

    let models = runner.build_models(records, &prices);
    let curves = runner.run(&models);

    let points: usize = curves.iter().map(|c| c.len()).sum();
    let failures: usize = curves.iter().map(|c| c.failures.len()).sum();
    write_curves(output, &curves)?;

    log::info!(
        "Wrote {} points for {} bonds ({} without yield) to {} in {:?}",
        points,
        curves.len(),
        failures,
        output.display(),
        start.elapsed()
    );
    Ok(())
}

fn run_cashflows(
    inputs: &Inputs,
    id: &str,
    date: NaiveDate,
    price: Option<f64>,
    config: &ValuationConfig,
) -> Result<()> {
    let (records, prices) = load_inputs(inputs)?;
    let runner = runner_for(inputs, config)?;

    let mut record = records
        .into_iter()
        .find(|r| r.bond.id == id)
        .ok_or_else(|| anyhow!("bond {} not found in {}", id, inputs.info.display()))?;
    if let Some(series) = prices.get(id) {
        record.bond = record.bond.with_prices(series.clone());
    }
    let model = runner
        .build_model(&record)
        .with_context(|| format!("modelling bond {}", id))?;

    let price = match price {
        Some(p) => p,
        None => model.price_on(date, config.force_par)?,
    };
    let result = model.cashflows(date, price, config)?;

    println!("{}", model.bond());
    println!("Evaluation date: {}  price: {:.4}  ({})", date, price, config.day_count);
    println!();
    println!("{:>12} {:>14} {:>10}", "Date", "Cashflow", "IndexRatio");
    for cf in result.cashflows.iter() {
        let ratio = result
            .index_ratios
            .as_ref()
            .and_then(|r| r.ratio_on(cf.date))
            .map(|r| format!("{:.5}", r))
            .unwrap_or_default();
        println!("{:>12} {:>14.6} {:>10}", cf.date, cf.amount, ratio);
    }
    println!();

    match model.ytm(date, price, config) {
        Ok(ytm) => println!("YTM: {:.6}", ytm),
        Err(err) => println!("YTM: n/a ({})", err),
    }
    println!(
        "Estimated YTM: {:.6}",
        model.estimate_ytm(date, price, config.day_count)
    );

    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let config = valuation_config(&cli)?;

    match &cli.command {
        Command::Curves { inputs, output } => run_curves(inputs, output, &config),
        Command::Cashflows { inputs, id, date, price } => {
            run_cashflows(inputs, id, *date, *price, &config)
        }
    }
}
