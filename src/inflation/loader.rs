//! Load monthly CPI observations from CSV
//!
//! Expects the Statistics Canada table layout: a `REF_DATE` column (`YYYY-MM`),
//! a product column and a `VALUE` column. Other columns are ignored.

use std::collections::BTreeSet;
use std::io::Read;
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use csv::Reader;

use super::CpiSeries;

/// Product used for real return bond indexation
pub const DEFAULT_PRODUCT: &str = "All-items";

#[derive(Debug, serde::Deserialize)]
struct CsvRow {
    #[serde(rename = "REF_DATE")]
    ref_date: String,
    #[serde(rename = "Products and product groups")]
    product: String,
    #[serde(rename = "VALUE")]
    value: Option<f64>,
}

/// CPI series for one product plus the products present in the file
#[derive(Debug, Clone)]
pub struct LoadedCpi {
    pub available_products: BTreeSet<String>,
    pub series: CpiSeries,
}

fn parse_ref_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(&format!("{}-01", value.trim()), "%Y-%m-%d")
        .with_context(|| format!("invalid REF_DATE '{}', expected YYYY-MM", value))
}

/// Load the CPI series for `product` from a CSV file
pub fn load_cpi<P: AsRef<Path>>(path: P, product: &str) -> Result<LoadedCpi> {
    let path = path.as_ref();
    let reader = Reader::from_path(path).with_context(|| format!("opening CPI {}", path.display()))?;
    read_cpi(reader, product)
}

/// Load the CPI series for `product` from any reader
pub fn load_cpi_from_reader<R: Read>(reader: R, product: &str) -> Result<LoadedCpi> {
    read_cpi(Reader::from_reader(reader), product)
}

fn read_cpi<R: Read>(mut reader: Reader<R>, product: &str) -> Result<LoadedCpi> {
    let mut available_products = BTreeSet::new();
    let mut observations = Vec::new();

    for result in reader.deserialize() {
        let row: CsvRow = result?;
        let is_selected = row.product == product;
        available_products.insert(row.product);

        if !is_selected {
            continue;
        }
        // Unpublished months are left out of the series
        if let Some(value) = row.value {
            observations.push((parse_ref_date(&row.ref_date)?, value));
        }
    }

    if observations.is_empty() {
        bail!(
            "no CPI observations for product '{}' (available: {})",
            product,
            available_products.iter().cloned().collect::<Vec<_>>().join(", ")
        );
    }

    let series = CpiSeries::new(observations)?;
    log::debug!(
        "Loaded {} CPI observations for {} ({} - {})",
        series.len(),
        product,
        series.earliest(),
        series.latest()
    );

    let missing = series.missing_months();
    if !missing.is_empty() {
        log::warn!(
            "CPI for {} has {} unpublished months, first {}",
            product,
            missing.len(),
            missing[0]
        );
    }

    Ok(LoadedCpi { available_products, series })
}
