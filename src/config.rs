//! Valuation settings shared by single evaluations and curve building

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::valuation::{DayCount, SolverConfig};

fn default_dirty() -> bool {
    true
}

fn default_cpi_lag_months() -> u32 {
    3
}

fn default_retry_with_estimate() -> bool {
    true
}

/// Configuration for a valuation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationConfig {
    /// Add accrued interest to the purchase cashflow
    #[serde(default = "default_dirty")]
    pub dirty: bool,

    /// Day count used for accrual, discounting and term to maturity
    #[serde(default)]
    pub day_count: DayCount,

    /// Assume par (100) when no price is recorded for the evaluation date
    #[serde(default)]
    pub force_par: bool,

    /// Months between a date and the CPI observation it references.
    ///
    /// Applied when a runner indexes a CPI series; an indexer built by the
    /// caller keeps its own lag.
    #[serde(default = "default_cpi_lag_months")]
    pub cpi_lag_months: u32,

    /// Newton-Raphson settings
    #[serde(default)]
    pub solver: SolverConfig,

    /// Re-run the solver from the approximate YTM when the first attempt fails
    #[serde(default = "default_retry_with_estimate")]
    pub retry_with_estimate: bool,
}

impl Default for ValuationConfig {
    fn default() -> Self {
        Self {
            dirty: default_dirty(),
            day_count: DayCount::default(),
            force_par: false,
            cpi_lag_months: default_cpi_lag_months(),
            solver: SolverConfig::default(),
            retry_with_estimate: default_retry_with_estimate(),
        }
    }
}

impl ValuationConfig {
    /// Load from a JSON file; missing fields take their defaults
    pub fn from_json_path(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_json_str(text: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Clean-price variant of this config
    pub fn clean(mut self) -> Self {
        self.dirty = false;
        self
    }

    pub fn with_day_count(mut self, day_count: DayCount) -> Self {
        self.day_count = day_count;
        self
    }

    pub fn forcing_par(mut self) -> Self {
        self.force_par = true;
        self
    }
}
