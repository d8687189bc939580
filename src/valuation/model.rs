//! Bond valuation model for nominal and inflation-linked bonds

use std::sync::Arc;

use chrono::NaiveDate;

use super::cashflows::{CashflowEngine, CashflowSeries, PAR};
use super::curve::{build_yield_curve, YieldCurve};
use super::daycount::DayCount;
use super::schedule::coupon_dates;
use super::yield_solver::YieldSolver;
use crate::bond::Bond;
use crate::config::ValuationConfig;
use crate::error::{BondError, BondResult};
use crate::inflation::{adjust, CpiIndexer, IndexRatioSeries};

/// How nominal cashflows are turned into the bond's actual cashflows
#[derive(Debug, Clone)]
pub enum CashflowPolicy {
    /// Cashflows are paid as scheduled
    Nominal,
    /// Cashflows are scaled by the reference CPI relative to `cpi_base`
    InflationLinked {
        indexer: Arc<CpiIndexer>,
        cpi_base: f64,
    },
}

/// Cashflows for one evaluation, with index ratios for inflation-linked bonds
#[derive(Debug, Clone, PartialEq)]
pub struct BondCashflows {
    pub cashflows: CashflowSeries,
    pub index_ratios: Option<IndexRatioSeries>,
}

/// A bond together with its coupon schedule and cashflow policy
#[derive(Debug, Clone)]
pub struct BondModel {
    bond: Bond,
    schedule: Vec<NaiveDate>,
    policy: CashflowPolicy,
}

impl BondModel {
    /// Model a plain fixed or zero coupon bond
    pub fn nominal(bond: Bond) -> BondResult<Self> {
        Self::build(bond, CashflowPolicy::Nominal)
    }

    /// Model a CPI-linked bond.
    ///
    /// `cpi_base` defaults to the reference CPI at the issue date. The bond
    /// must redeem before the reference CPI runs out of data.
    pub fn inflation_linked(
        bond: Bond,
        indexer: Arc<CpiIndexer>,
        cpi_base: Option<f64>,
    ) -> BondResult<Self> {
        let max_redemption = indexer.latest_computable_date_exclusive();
        if bond.redemption_date >= max_redemption {
            return Err(BondError::invariant(format!(
                "bond {} redeems on {}, but reference CPI is only computable before {}",
                bond.id, bond.redemption_date, max_redemption
            )));
        }

        // Every cashflow after the purchase is indexed, so each one needs its reference CPI
        let schedule = coupon_dates(bond.issue_date, bond.redemption_date, &bond.coupon_anchors);
        let uncomputable = schedule
            .iter()
            .filter(|date| **date > bond.issue_date)
            .chain(std::iter::once(&bond.redemption_date))
            .find(|date| !indexer.is_computable(**date));
        if let Some(date) = uncomputable {
            let reason = match indexer.ref_cpi(*date) {
                Err(err) => err.to_string(),
                Ok(_) => "reference CPI is unavailable".to_string(),
            };
            return Err(BondError::invariant(format!(
                "bond {}: cashflow on {} cannot be indexed: {}",
                bond.id, date, reason
            )));
        }

        let cpi_base = match cpi_base {
            Some(base) if base.is_finite() && base > 0.0 => base,
            Some(base) => {
                return Err(BondError::invariant(format!(
                    "bond {}: CPI base {} is not a positive number",
                    bond.id, base
                )))
            }
            None => indexer.ref_cpi(bond.issue_date)?,
        };

        Self::build(bond, CashflowPolicy::InflationLinked { indexer, cpi_base })
    }

    fn build(bond: Bond, policy: CashflowPolicy) -> BondResult<Self> {
        if bond.issue_date >= bond.redemption_date {
            return Err(BondError::invariant(format!(
                "bond {}: issue date {} is not before redemption date {}",
                bond.id, bond.issue_date, bond.redemption_date
            )));
        }

        let schedule = coupon_dates(bond.issue_date, bond.redemption_date, &bond.coupon_anchors);
        Ok(Self { bond, schedule, policy })
    }

    pub fn bond(&self) -> &Bond {
        &self.bond
    }

    /// Coupon dates over the bond's life
    pub fn schedule(&self) -> &[NaiveDate] {
        &self.schedule
    }

    pub fn policy(&self) -> &CashflowPolicy {
        &self.policy
    }

    pub fn is_inflation_linked(&self) -> bool {
        matches!(self.policy, CashflowPolicy::InflationLinked { .. })
    }

    /// Reference CPI the index ratios are measured against
    pub fn cpi_base(&self) -> Option<f64> {
        match &self.policy {
            CashflowPolicy::Nominal => None,
            CashflowPolicy::InflationLinked { cpi_base, .. } => Some(*cpi_base),
        }
    }

    fn engine(&self) -> CashflowEngine<'_> {
        CashflowEngine {
            coupon_dates: &self.schedule,
            coupon_rate: self.bond.coupon_rate,
            frequency: self.bond.frequency(),
            issue_date: self.bond.issue_date,
            redemption_date: self.bond.redemption_date,
        }
    }

    /// Accrued interest for a purchase on `evaluation_date`
    pub fn accrued_interest(&self, evaluation_date: NaiveDate, day_count: DayCount) -> f64 {
        self.engine().accrued_interest(evaluation_date, day_count)
    }

    /// Cashflows for a purchase at `price` on `evaluation_date`
    pub fn cashflows(
        &self,
        evaluation_date: NaiveDate,
        price: f64,
        config: &ValuationConfig,
    ) -> BondResult<BondCashflows> {
        let nominal = self
            .engine()
            .build(evaluation_date, price, config.dirty, config.day_count)?;

        match &self.policy {
            CashflowPolicy::Nominal => Ok(BondCashflows { cashflows: nominal, index_ratios: None }),
            CashflowPolicy::InflationLinked { indexer, cpi_base } => {
                let (cashflows, ratios) = adjust(&nominal, *cpi_base, indexer)?;
                Ok(BondCashflows { cashflows, index_ratios: Some(ratios) })
            }
        }
    }

    /// Recorded price for `date`, or par when `force_par` is set
    pub fn price_on(&self, date: NaiveDate, force_par: bool) -> BondResult<f64> {
        match self.bond.price_on(date) {
            Some(price) => Ok(price),
            None if force_par => {
                log::warn!(
                    "No market price for bond {} on {}; assuming par value",
                    self.bond.id,
                    date
                );
                Ok(PAR)
            }
            None => Err(BondError::MissingMarketData { date }),
        }
    }

    /// Cashflows on `date` priced from the attached price history
    pub fn cashflows_on(&self, date: NaiveDate, config: &ValuationConfig) -> BondResult<BondCashflows> {
        let price = self.price_on(date, config.force_par)?;
        self.cashflows(date, price, config)
    }

    /// Newton-Raphson starting point: the coupon as a decimal, 0 for zero coupon bonds
    pub fn initial_guess(&self) -> f64 {
        if self.bond.is_zero_coupon() {
            0.0
        } else {
            self.bond.coupon_rate / 100.0
        }
    }

    /// Yield to maturity for a purchase at `price` on `evaluation_date`
    pub fn ytm(&self, evaluation_date: NaiveDate, price: f64, config: &ValuationConfig) -> BondResult<f64> {
        let cashflows = self.cashflows(evaluation_date, price, config)?.cashflows;
        let solver = YieldSolver::new(config.solver);

        let first = solver.solve(&cashflows, evaluation_date, config.day_count, self.initial_guess());
        let outcome = match first {
            Ok(result) => Ok(result),
            Err(failure) if config.retry_with_estimate => {
                let seed = self.estimate_ytm(evaluation_date, price, config.day_count);
                log::debug!(
                    "bond {}: {}; retrying from estimate {:.6}",
                    self.bond.id,
                    failure,
                    seed
                );
                if seed.is_finite() {
                    solver.solve(&cashflows, evaluation_date, config.day_count, seed)
                } else {
                    Err(failure)
                }
            }
            Err(failure) => Err(failure),
        };

        outcome.map(|result| result.rate).map_err(|mut failure| {
            failure.price = price;
            BondError::SolverNonConvergence(failure)
        })
    }

    /// Yield to maturity on `date` priced from the attached price history
    pub fn ytm_on(&self, date: NaiveDate, config: &ValuationConfig) -> BondResult<f64> {
        let price = self.price_on(date, config.force_par)?;
        self.ytm(date, price, config)
    }

    /// Approximate yield: `(c + (100 - p) / n) / ((100 + p) / 2)`, with
    /// `n` the number of remaining coupon periods.
    pub fn estimate_ytm(&self, evaluation_date: NaiveDate, price: f64, day_count: DayCount) -> f64 {
        let periods = self.term_to_maturity(evaluation_date, day_count) * self.bond.frequency().max(1) as f64;
        (self.bond.coupon_rate + (PAR - price) / periods) / ((PAR + price) / 2.0)
    }

    /// Years from `date` to redemption
    pub fn term_to_maturity(&self, date: NaiveDate, day_count: DayCount) -> f64 {
        (self.bond.redemption_date - date).num_days() as f64 / day_count.days_in_year(date)
    }

    /// Yield curve over the attached price history (empty when none is attached)
    pub fn yield_curve(&self, config: &ValuationConfig) -> YieldCurve {
        match &self.bond.price_series {
            Some(prices) => build_yield_curve(self, prices, config),
            None => YieldCurve::empty(&self.bond.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bond::{parse_coupon_anchors, PriceSeries};
    use crate::inflation::CpiSeries;
    use crate::valuation::yield_solver::{DiscountSchedule, SolverConfig};
    use approx::assert_abs_diff_eq;
    use chrono::Months;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn zero_bond() -> Bond {
        Bond::new("Z", "Zero 2025", date(2020, 1, 1), date(2025, 1, 1), 0.0, vec![]).unwrap()
    }

    fn annual_bond() -> Bond {
        let anchors = parse_coupon_anchors("01/01").unwrap();
        Bond::new("A", "6% 2022", date(2020, 1, 1), date(2022, 1, 1), 6.0, anchors).unwrap()
    }

    /// Monthly CPI rising 0.2 per month from 100 in January 2000
    fn cpi_indexer(last: NaiveDate) -> Arc<CpiIndexer> {
        let mut months = Vec::new();
        let mut month = date(2000, 1, 1);
        let mut value = 100.0;
        while month <= last {
            months.push((month, value));
            month = month.checked_add_months(Months::new(1)).unwrap();
            value += 0.2;
        }
        Arc::new(CpiIndexer::new(CpiSeries::new(months).unwrap()))
    }

    #[test]
    fn test_zero_coupon_scenario() {
        let model = BondModel::nominal(zero_bond()).unwrap();
        let config = ValuationConfig::default();

        let cfs = model.cashflows(date(2022, 1, 1), 90.0, &config).unwrap();
        assert!(cfs.index_ratios.is_none());
        assert_eq!(cfs.cashflows.len(), 2);
        assert_eq!(cfs.cashflows.amount_on(date(2022, 1, 1)), Some(-90.0));
        assert_eq!(cfs.cashflows.amount_on(date(2025, 1, 1)), Some(100.0));

        let ytm = model.ytm(date(2022, 1, 1), 90.0, &config).unwrap();
        assert_abs_diff_eq!(ytm, 0.035744, epsilon = 1e-3);
    }

    #[test]
    fn test_par_annual_coupon_scenario() {
        let model = BondModel::nominal(annual_bond()).unwrap();
        let config = ValuationConfig::default();

        let cfs = model.cashflows(date(2021, 1, 1), 100.0, &config).unwrap().cashflows;
        assert_eq!(cfs.amount_on(date(2021, 1, 1)), Some(-100.0));
        assert_eq!(cfs.amount_on(date(2022, 1, 1)), Some(106.0));

        let ytm = model.ytm(date(2021, 1, 1), 100.0, &config).unwrap();
        assert_abs_diff_eq!(ytm, 0.06, epsilon = 1e-10);
    }

    #[test]
    fn test_ytm_zeroes_pv() {
        let anchors = parse_coupon_anchors("01/06,01/12").unwrap();
        let bond = Bond::new("S", "4% 2030", date(2010, 6, 1), date(2030, 6, 1), 4.0, anchors).unwrap();
        let model = BondModel::nominal(bond).unwrap();

        for config in [
            ValuationConfig::default(),
            ValuationConfig::default().clean().with_day_count(DayCount::ActAct),
            ValuationConfig::default().with_day_count(DayCount::Act360),
        ] {
            let eval = date(2018, 7, 23);
            let rate = model.ytm(eval, 97.5, &config).unwrap();
            let cfs = model.cashflows(eval, 97.5, &config).unwrap().cashflows;
            let pv = DiscountSchedule::new(&cfs, eval, config.day_count).pv(rate);
            assert!(pv.abs() < 1e-6);
        }
    }

    #[test]
    fn test_missing_price_and_force_par() {
        let prices: PriceSeries = vec![(date(2021, 1, 1), 100.0)].into_iter().collect();
        let model = BondModel::nominal(annual_bond().with_prices(prices)).unwrap();

        let missing = date(2021, 3, 15);
        let err = model.cashflows_on(missing, &ValuationConfig::default()).unwrap_err();
        assert_eq!(err, BondError::MissingMarketData { date: missing });

        let forced = model
            .cashflows_on(missing, &ValuationConfig::default().clean().forcing_par())
            .unwrap();
        assert_eq!(forced.cashflows.purchase().unwrap().amount, -100.0);

        assert_abs_diff_eq!(
            model.ytm_on(date(2021, 1, 1), &ValuationConfig::default()).unwrap(),
            0.06,
            epsilon = 1e-10
        );
    }

    #[test]
    fn test_estimate_ytm() {
        let model = BondModel::nominal(annual_bond()).unwrap();
        // One year left, one period, price 98: (6 + 2) / 99
        let estimate = model.estimate_ytm(date(2021, 1, 1), 98.0, DayCount::Act365);
        assert_abs_diff_eq!(estimate, 8.0 / 99.0, epsilon = 1e-12);
    }

    #[test]
    fn test_inflation_linked_cashflows() {
        let anchors = parse_coupon_anchors("01/06,01/12").unwrap();
        let bond = Bond::new("R", "RRB 4.25%", date(2001, 12, 1), date(2005, 12, 1), 4.25, anchors).unwrap();
        let indexer = cpi_indexer(date(2006, 12, 1));
        let model = BondModel::inflation_linked(bond, indexer.clone(), None).unwrap();

        // Issue date December 2001 references September 2001: 100 + 20 * 0.2
        assert_abs_diff_eq!(model.cpi_base().unwrap(), 104.0, epsilon = 1e-9);

        let eval = date(2003, 6, 1);
        let config = ValuationConfig::default();
        let result = model.cashflows(eval, 110.0, &config).unwrap();
        let ratios = result.index_ratios.expect("inflation-linked bonds report index ratios");

        assert_eq!(ratios.len(), result.cashflows.len());
        assert_eq!(ratios.ratio_on(eval), Some(1.0));
        assert_eq!(result.cashflows.purchase().unwrap().amount, -110.0);

        let nominal = BondModel::nominal(model.bond().clone()).unwrap();
        let nominal_cfs = nominal.cashflows(eval, 110.0, &config).unwrap().cashflows;
        for (scaled, (plain, ratio)) in result
            .cashflows
            .iter()
            .zip(nominal_cfs.iter().zip(ratios.iter()))
        {
            assert_eq!(scaled.date, plain.date);
            assert_abs_diff_eq!(scaled.amount, plain.amount * ratio.ratio, epsilon = 1e-12);
            if scaled.date > eval {
                assert!(ratio.ratio > 1.0);
            }
        }

        assert!(model.ytm(eval, 110.0, &config).is_ok());
    }

    #[test]
    fn test_inflation_linked_rejects_redemption_beyond_cpi() {
        let bond = Bond::new("R", "RRB", date(2001, 12, 1), date(2007, 3, 1), 0.0, vec![]).unwrap();
        // Latest CPI December 2006: reference CPI computable before 2007-03-01
        let indexer = cpi_indexer(date(2006, 12, 1));

        let err = BondModel::inflation_linked(bond.clone(), indexer.clone(), None).unwrap_err();
        assert!(matches!(err, BondError::InvariantViolation { .. }));

        let earlier = Bond { redemption_date: date(2007, 2, 28), ..bond };
        assert!(BondModel::inflation_linked(earlier, indexer, None).is_ok());
    }

    #[test]
    fn test_inflation_linked_rejects_gap_in_cpi() {
        // Monthly CPI through 2006 with March 2003 unpublished
        let months = cpi_indexer(date(2006, 12, 1))
            .series()
            .iter()
            .filter(|(month, _)| *month != date(2003, 3, 1))
            .collect::<Vec<_>>();
        let indexer = Arc::new(CpiIndexer::new(CpiSeries::new(months).unwrap()));
        assert!(!indexer.is_computable(date(2003, 6, 1)));

        // The June 2003 coupon references March 2003
        let anchors = parse_coupon_anchors("01/06,01/12").unwrap();
        let bond = Bond::new("R", "RRB", date(2001, 12, 1), date(2005, 12, 1), 4.25, anchors).unwrap();
        let err = BondModel::inflation_linked(bond, indexer.clone(), None).unwrap_err();
        assert!(matches!(err, BondError::InvariantViolation { .. }));
        assert!(err.to_string().contains("2003-06-01"));

        // Redeemed before the gap matters
        let short = Bond::new("S", "RRB", date(2001, 12, 1), date(2002, 12, 1), 0.0, vec![]).unwrap();
        let model = BondModel::inflation_linked(short, indexer, None).unwrap();
        assert!(model.cashflows(date(2002, 1, 15), 100.0, &ValuationConfig::default()).is_ok());
    }

    /// Zero coupon bond one year from redemption on 2021-01-01
    fn one_year_zero() -> BondModel {
        let bond = Bond::new("Z1", "Zero 2022", date(2020, 1, 1), date(2022, 1, 1), 0.0, vec![]).unwrap();
        BondModel::nominal(bond).unwrap()
    }

    /// Loose enough that a Newton step from 0% stalls short of the root at 90
    fn loose_solver_config() -> ValuationConfig {
        ValuationConfig {
            solver: SolverConfig { tolerance: 1.0, ..SolverConfig::default() },
            ..ValuationConfig::default()
        }
    }

    #[test]
    fn test_ytm_retries_from_estimate() {
        let model = one_year_zero();
        let eval = date(2021, 1, 1);
        let config = loose_solver_config();

        let cfs = model.cashflows(eval, 90.0, &config).unwrap().cashflows;
        let first = YieldSolver::new(config.solver).solve(&cfs, eval, config.day_count, model.initial_guess());
        assert!(first.unwrap_err().reason.starts_with("stalled"));

        // (100 - 90) / ((100 + 90) / 2), accepted as soon as the PV is inside the tolerance
        let estimate = model.estimate_ytm(eval, 90.0, config.day_count);
        assert_abs_diff_eq!(estimate, 10.0 / 95.0, epsilon = 1e-12);

        let ytm = model.ytm(eval, 90.0, &config).unwrap();
        assert_abs_diff_eq!(ytm, estimate, epsilon = 1e-12);
    }

    #[test]
    fn test_ytm_without_retry_reports_quoted_price() {
        let model = one_year_zero();
        let eval = date(2021, 1, 1);
        let config = ValuationConfig { retry_with_estimate: false, ..loose_solver_config() };

        match model.ytm(eval, 90.0, &config).unwrap_err() {
            BondError::SolverNonConvergence(failure) => {
                assert_eq!(failure.evaluation_date, eval);
                assert_eq!(failure.price, 90.0);
                assert!(failure.reason.starts_with("stalled"));
            }
            other => panic!("expected a solver failure, got {:?}", other),
        }
    }

    #[test]
    fn test_inflation_linked_explicit_base() {
        let bond = Bond::new("R", "RRB", date(2001, 12, 1), date(2005, 12, 1), 0.0, vec![]).unwrap();
        let indexer = cpi_indexer(date(2006, 12, 1));

        let model = BondModel::inflation_linked(bond.clone(), indexer.clone(), Some(83.0)).unwrap();
        assert_eq!(model.cpi_base(), Some(83.0));

        assert!(BondModel::inflation_linked(bond, indexer, Some(0.0)).is_err());
    }

    #[test]
    fn test_schedule_is_derived_from_bond() {
        let model = BondModel::nominal(annual_bond()).unwrap();
        assert_eq!(model.schedule(), &[date(2020, 1, 1), date(2021, 1, 1), date(2022, 1, 1)]);
        assert_eq!(model.initial_guess(), 0.06);
        assert!(!model.is_inflation_linked());
    }
}
