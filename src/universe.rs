//! Batch yield curves over a universe of bonds
//!
//! The CPI series is loaded once and shared read-only; every bond is valued
//! independently, so curves are built in parallel and a failing bond never
//! affects the others.

use std::collections::HashMap;
use std::sync::Arc;

use rayon::prelude::*;

use crate::bond::{BondRecord, InstrumentType, PriceSeries};
use crate::config::ValuationConfig;
use crate::error::{BondError, BondResult};
use crate::inflation::{CpiIndexer, CpiSeries};
use crate::valuation::{BondModel, YieldCurve};

/// Builds models and yield curves for many bonds with one configuration
#[derive(Debug, Clone)]
pub struct UniverseRunner {
    config: ValuationConfig,
    indexer: Option<Arc<CpiIndexer>>,
    ilbs_as_nominal: bool,
}

impl UniverseRunner {
    pub fn new(config: ValuationConfig) -> Self {
        Self {
            config,
            indexer: None,
            ilbs_as_nominal: false,
        }
    }

    /// Use `indexer`, with its own lag, for inflation-linked bonds
    pub fn with_cpi(mut self, indexer: Arc<CpiIndexer>) -> Self {
        self.indexer = Some(indexer);
        self
    }

    /// Index inflation-linked bonds against `series` with the configured CPI lag
    pub fn with_cpi_series(self, series: CpiSeries) -> Self {
        let indexer = CpiIndexer::with_lag(series, self.config.cpi_lag_months);
        self.with_cpi(Arc::new(indexer))
    }

    pub fn indexer(&self) -> Option<&CpiIndexer> {
        self.indexer.as_deref()
    }

    /// Value inflation-linked bonds as if they were nominal bonds
    pub fn ilbs_as_nominal(mut self, enabled: bool) -> Self {
        self.ilbs_as_nominal = enabled;
        self
    }

    pub fn config(&self) -> &ValuationConfig {
        &self.config
    }

    /// Model for a single static record
    pub fn build_model(&self, record: &BondRecord) -> BondResult<BondModel> {
        match (record.instrument_type, &self.indexer) {
            (InstrumentType::Nominal, _) => BondModel::nominal(record.bond.clone()),
            (InstrumentType::InflationLinked, _) if self.ilbs_as_nominal => {
                BondModel::nominal(record.bond.clone())
            }
            (InstrumentType::InflationLinked, Some(indexer)) => {
                BondModel::inflation_linked(record.bond.clone(), Arc::clone(indexer), None)
            }
            (InstrumentType::InflationLinked, None) => Err(BondError::invariant(format!(
                "bond {} is inflation-linked but no CPI series is loaded",
                record.bond.id
            ))),
        }
    }

    /// Attach price histories and build a model per record.
    ///
    /// Records that fail construction are logged and left out.
    pub fn build_models(
        &self,
        records: Vec<BondRecord>,
        prices: &HashMap<String, PriceSeries>,
    ) -> Vec<BondModel> {
        records
            .into_iter()
            .filter_map(|mut record| {
                if let Some(series) = prices.get(&record.bond.id) {
                    record.bond = record.bond.with_prices(series.clone());
                }
                match self.build_model(&record) {
                    Ok(model) => Some(model),
                    Err(err) => {
                        log::warn!("Skipping bond {}: {}", record.bond.id, err);
                        None
                    }
                }
            })
            .collect()
    }

    /// Yield curve for every model, in the same order
    pub fn run(&self, models: &[BondModel]) -> Vec<YieldCurve> {
        models
            .par_iter()
            .map(|model| {
                log::info!("Evaluating bond {}", model.bond().id);
                let curve = model.yield_curve(&self.config);
                log::info!(
                    "Bond {}: {} points, {} without yield",
                    curve.bond_id,
                    curve.len(),
                    curve.failures.len()
                );
                curve
            })
            .collect()
    }
}

impl Default for UniverseRunner {
    fn default() -> Self {
        Self::new(ValuationConfig::default())
    }
}
