//! Yield curve over a bond's observed price history

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::model::BondModel;
use crate::bond::PriceSeries;
use crate::config::ValuationConfig;
use crate::error::{BondError, SolverFailure};

/// One observation date of a yield curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct YieldCurvePoint {
    pub date: NaiveDate,
    pub price: f64,
    /// Term to maturity in years
    pub ttm: f64,
    /// Yield to maturity; `None` when it could not be solved
    pub ytm: Option<f64>,
}

/// Per-date (TTM, YTM) for a single bond
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YieldCurve {
    pub bond_id: String,
    pub points: Vec<YieldCurvePoint>,
    /// Diagnostics for every point without a yield
    pub failures: Vec<SolverFailure>,
}

impl YieldCurve {
    pub fn empty(bond_id: &str) -> Self {
        Self {
            bond_id: bond_id.to_string(),
            points: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Points with a solved yield
    pub fn valid_points(&self) -> impl Iterator<Item = &YieldCurvePoint> + '_ {
        self.points.iter().filter(|p| p.ytm.is_some())
    }

    pub fn point_on(&self, date: NaiveDate) -> Option<&YieldCurvePoint> {
        self.points
            .binary_search_by_key(&date, |p| p.date)
            .ok()
            .map(|idx| &self.points[idx])
    }
}

/// Solve the yield for every priced date within the bond's life.
///
/// Dates without a price produce no row. A date whose yield cannot be found
/// keeps its row with `ytm: None` and a diagnostic in `failures`.
pub fn build_yield_curve(model: &BondModel, prices: &PriceSeries, config: &ValuationConfig) -> YieldCurve {
    let bond = model.bond();
    let mut curve = YieldCurve::empty(&bond.id);

    for (date, price) in prices.between(bond.issue_date, bond.redemption_date) {
        let ttm = model.term_to_maturity(date, config.day_count);

        let ytm = match model.ytm(date, price, config) {
            Ok(rate) => Some(rate),
            Err(BondError::SolverNonConvergence(failure)) => {
                log::debug!("bond {}: {}", bond.id, failure);
                curve.failures.push(failure);
                None
            }
            Err(other) => {
                log::debug!("bond {}: {} on {}", bond.id, other, date);
                curve.failures.push(SolverFailure {
                    evaluation_date: date,
                    price,
                    reason: other.to_string(),
                });
                None
            }
        };

        curve.points.push(YieldCurvePoint { date, price, ttm, ytm });
    }

    curve
}
