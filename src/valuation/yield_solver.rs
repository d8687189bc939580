//! Yield to maturity via Newton-Raphson
//!
//! Solves for the flat annual rate `r` with
//! `sum cf_i / (1 + r)^(days_i / days_in_year_i) = 0`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::cashflows::CashflowSeries;
use super::daycount::DayCount;
use crate::error::SolverFailure;

/// Lower bound for a rate; `1 + r` must stay positive
const MIN_RATE: f64 = -0.99;
/// Upper bound for a rate during iteration
const MAX_RATE: f64 = 10.0;
/// A root is only accepted when the PV there is this close to zero
const PV_ACCEPTANCE: f64 = 1e-6;

fn default_tolerance() -> f64 {
    1e-10
}

fn default_max_iterations() -> u32 {
    100
}

/// Newton-Raphson settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Convergence threshold on PV and on the step size
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,

    /// Iteration bound before giving up
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            tolerance: default_tolerance(),
            max_iterations: default_max_iterations(),
        }
    }
}

/// A converged yield
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YieldResult {
    /// Annual yield as a decimal (0.05 = 5%)
    pub rate: f64,
    pub iterations: u32,
    /// PV at `rate`
    pub residual: f64,
}

/// Cashflows expressed as (year fraction from evaluation date, amount)
#[derive(Debug, Clone)]
pub struct DiscountSchedule {
    terms: Vec<(f64, f64)>,
}

impl DiscountSchedule {
    /// Year fractions use the days-in-year of each cashflow's own date
    pub fn new(cashflows: &CashflowSeries, evaluation_date: NaiveDate, day_count: DayCount) -> Self {
        let terms = cashflows
            .iter()
            .map(|cf| {
                let days = (cf.date - evaluation_date).num_days() as f64;
                (days / day_count.days_in_year(cf.date), cf.amount)
            })
            .collect();
        Self { terms }
    }

    /// Present value at annual rate `rate`
    pub fn pv(&self, rate: f64) -> f64 {
        self.terms
            .iter()
            .map(|(t, cf)| cf / (1.0 + rate).powf(*t))
            .sum()
    }

    /// PV and its derivative with respect to the rate
    fn pv_and_derivative(&self, rate: f64) -> (f64, f64) {
        let mut pv = 0.0;
        let mut dpv = 0.0;

        for (t, cf) in &self.terms {
            let discount = (1.0 + rate).powf(*t);
            pv += cf / discount;
            if *t != 0.0 {
                dpv -= t * cf / (discount * (1.0 + rate));
            }
        }

        (pv, dpv)
    }
}

/// Yield-to-maturity solver
#[derive(Debug, Clone, Default)]
pub struct YieldSolver {
    config: SolverConfig,
}

impl YieldSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Solve for the yield of `cashflows` starting from `initial_guess`.
    ///
    /// Failure is returned as a diagnostic rather than an error so that
    /// callers iterating over many dates can record it and move on. The
    /// reported price is the purchase outflow, i.e. including accrued interest.
    pub fn solve(
        &self,
        cashflows: &CashflowSeries,
        evaluation_date: NaiveDate,
        day_count: DayCount,
        initial_guess: f64,
    ) -> Result<YieldResult, SolverFailure> {
        let fail = |reason: String| SolverFailure {
            evaluation_date,
            price: cashflows.purchase().map(|cf| -cf.amount).unwrap_or(f64::NAN),
            reason,
        };

        let has_future = cashflows.iter().any(|cf| cf.date > evaluation_date && cf.amount != 0.0);
        if !has_future {
            return Err(fail("no cashflows after the evaluation date".to_string()));
        }

        // At least one sign change is required for a yield to exist
        let has_positive = cashflows.iter().any(|cf| cf.amount > 1e-10);
        let has_negative = cashflows.iter().any(|cf| cf.amount < -1e-10);
        if !has_positive || !has_negative {
            return Err(fail("cashflows do not change sign".to_string()));
        }

        let schedule = DiscountSchedule::new(cashflows, evaluation_date, day_count);
        let tolerance = self.config.tolerance;
        let mut rate = initial_guess.clamp(MIN_RATE, MAX_RATE);

        for iteration in 0..self.config.max_iterations {
            let (pv, dpv) = schedule.pv_and_derivative(rate);

            if pv.abs() < tolerance {
                return Ok(YieldResult { rate, iterations: iteration, residual: pv });
            }

            if dpv.abs() < 1e-20 || !dpv.is_finite() {
                return Err(fail(format!("derivative vanished at rate {:.6}", rate)));
            }

            let new_rate = (rate - pv / dpv).clamp(MIN_RATE, MAX_RATE);

            if (new_rate - rate).abs() < tolerance {
                let residual = schedule.pv(new_rate);
                if residual.abs() < PV_ACCEPTANCE {
                    return Ok(YieldResult { rate: new_rate, iterations: iteration + 1, residual });
                }
                return Err(fail(format!(
                    "stalled at rate {:.6} with PV {:.3e}",
                    new_rate, residual
                )));
            }

            rate = new_rate;
        }

        Err(fail(format!(
            "no convergence after {} iterations (last rate {:.6})",
            self.config.max_iterations, rate
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::valuation::cashflows::Cashflow;
    use approx::assert_abs_diff_eq;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn series(flows: &[(NaiveDate, f64)]) -> CashflowSeries {
        CashflowSeries::from_sorted(
            flows.iter().map(|(date, amount)| Cashflow { date: *date, amount: *amount }).collect(),
        )
    }

    #[test]
    fn test_zero_coupon_yield() {
        let eval = date(2022, 1, 1);
        let cfs = series(&[(eval, -90.0), (date(2025, 1, 1), 100.0)]);

        let result = YieldSolver::default().solve(&cfs, eval, DayCount::Act365, 0.0).unwrap();

        // 1096 days including the 2024 leap day
        let t = 1096.0 / 365.0;
        let expected = (100.0_f64 / 90.0).powf(1.0 / t) - 1.0;
        assert_abs_diff_eq!(result.rate, expected, epsilon = 1e-9);
        assert_abs_diff_eq!(result.rate, 0.035744, epsilon = 1e-3);
        assert!(result.residual.abs() < 1e-6);
    }

    #[test]
    fn test_par_bond_yields_coupon() {
        let eval = date(2021, 1, 1);
        let cfs = series(&[(eval, -100.0), (date(2022, 1, 1), 106.0)]);

        let result = YieldSolver::default().solve(&cfs, eval, DayCount::Act365, 0.06).unwrap();
        assert_abs_diff_eq!(result.rate, 0.06, epsilon = 1e-10);
    }

    #[test]
    fn test_solved_rate_zeroes_pv() {
        let eval = date(2018, 7, 23);
        let cfs = series(&[
            (eval, -101.2),
            (date(2018, 12, 1), 2.0),
            (date(2019, 6, 1), 2.0),
            (date(2019, 12, 1), 2.0),
            (date(2020, 6, 1), 102.0),
        ]);

        for dc in [DayCount::Act360, DayCount::Act365, DayCount::ActAct] {
            let result = YieldSolver::default().solve(&cfs, eval, dc, 0.04).unwrap();
            let pv = DiscountSchedule::new(&cfs, eval, dc).pv(result.rate);
            assert!(pv.abs() < 1e-6, "PV {} at {} for {}", pv, result.rate, dc);
        }
    }

    #[test]
    fn test_act_act_uses_cashflow_year() {
        let eval = date(2023, 1, 1);
        let cfs = series(&[(eval, -95.0), (date(2024, 12, 31), 100.0)]);

        let schedule = DiscountSchedule::new(&cfs, eval, DayCount::ActAct);
        // 730 days discounted over a 366 day year
        let expected = -95.0 + 100.0 / 1.05_f64.powf(730.0 / 366.0);
        assert_abs_diff_eq!(schedule.pv(0.05), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_failure_is_reported_not_raised() {
        let eval = date(2022, 1, 1);

        let only_purchase = series(&[(eval, -90.0)]);
        let failure = YieldSolver::default()
            .solve(&only_purchase, eval, DayCount::Act365, 0.0)
            .unwrap_err();
        assert_eq!(failure.evaluation_date, eval);
        assert_eq!(failure.price, 90.0);

        let no_sign_change = series(&[(eval, 10.0), (date(2025, 1, 1), 100.0)]);
        assert!(YieldSolver::default()
            .solve(&no_sign_change, eval, DayCount::Act365, 0.0)
            .is_err());
    }

    #[test]
    fn test_iteration_bound() {
        let eval = date(2022, 1, 1);
        let cfs = series(&[(eval, -50.0), (date(2052, 1, 1), 100.0)]);

        let solver = YieldSolver::new(SolverConfig { tolerance: 1e-12, max_iterations: 1 });
        let failure = solver.solve(&cfs, eval, DayCount::Act365, 0.5).unwrap_err();
        assert!(failure.reason.contains("1 iterations"));
    }
}
