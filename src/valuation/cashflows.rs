//! Cashflow series construction for a single evaluation date

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::daycount::DayCount;
use crate::error::{BondError, BondResult};

/// Redemption amount per 100 nominal
pub const PAR: f64 = 100.0;

/// A single dated cashflow (positive = inflow, negative = outflow)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cashflow {
    pub date: NaiveDate,
    pub amount: f64,
}

/// Chronological cashflows from the evaluation date to redemption.
///
/// The first entry is always the purchase at the evaluation date and the last
/// entry the redemption date. Dates are unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashflowSeries {
    flows: Vec<Cashflow>,
}

impl CashflowSeries {
    pub(crate) fn from_sorted(flows: Vec<Cashflow>) -> Self {
        debug_assert!(flows.windows(2).all(|w| w[0].date < w[1].date));
        Self { flows }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cashflow> + '_ {
        self.flows.iter()
    }

    pub fn as_slice(&self) -> &[Cashflow] {
        &self.flows
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.flows.iter().map(|cf| cf.date)
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    /// The purchase cashflow at the evaluation date
    pub fn purchase(&self) -> Option<&Cashflow> {
        self.flows.first()
    }

    /// The redemption cashflow
    pub fn redemption(&self) -> Option<&Cashflow> {
        self.flows.last()
    }

    pub fn amount_on(&self, date: NaiveDate) -> Option<f64> {
        self.flows
            .binary_search_by_key(&date, |cf| cf.date)
            .ok()
            .map(|idx| self.flows[idx].amount)
    }

    /// Sum of all signed cashflows
    pub fn total(&self) -> f64 {
        self.flows.iter().map(|cf| cf.amount).sum()
    }
}

impl<'a> IntoIterator for &'a CashflowSeries {
    type Item = &'a Cashflow;
    type IntoIter = std::slice::Iter<'a, Cashflow>;

    fn into_iter(self) -> Self::IntoIter {
        self.flows.iter()
    }
}

/// Contractual terms needed to lay out a bond's cashflows
#[derive(Debug, Clone, Copy)]
pub struct CashflowEngine<'a> {
    pub coupon_dates: &'a [NaiveDate],
    pub coupon_rate: f64,
    pub frequency: u32,
    pub issue_date: NaiveDate,
    pub redemption_date: NaiveDate,
}

impl<'a> CashflowEngine<'a> {
    fn coupon_per_period(&self) -> f64 {
        if self.frequency == 0 {
            0.0
        } else {
            self.coupon_rate / self.frequency as f64
        }
    }

    fn is_coupon_date(&self, date: NaiveDate) -> bool {
        self.coupon_dates.binary_search(&date).is_ok()
    }

    /// Coupon dates plus issue, evaluation and redemption dates, sorted and unique
    fn date_axis(&self, evaluation_date: NaiveDate) -> BTreeSet<NaiveDate> {
        let mut axis: BTreeSet<NaiveDate> = self.coupon_dates.iter().copied().collect();
        axis.insert(self.issue_date);
        axis.insert(evaluation_date);
        axis.insert(self.redemption_date);
        axis
    }

    /// Interest accrued since the previous date on the axis.
    ///
    /// A coupon period is taken as half of the convention's year, whatever
    /// the actual spacing of the coupons.
    pub fn accrued_interest(&self, evaluation_date: NaiveDate, day_count: DayCount) -> f64 {
        if self.frequency == 0
            || evaluation_date == self.issue_date
            || self.is_coupon_date(evaluation_date)
        {
            return 0.0;
        }

        let axis = self.date_axis(evaluation_date);
        let previous = match axis.range(..evaluation_date).next_back() {
            Some(date) => *date,
            None => return 0.0,
        };

        let days_since = (evaluation_date - previous).num_days() as f64;
        let half_year = day_count.days_in_year(evaluation_date) / 2.0;

        self.coupon_per_period() * (days_since / half_year)
    }

    /// Build the cashflow series for a purchase at `price` on `evaluation_date`
    pub fn build(
        &self,
        evaluation_date: NaiveDate,
        price: f64,
        dirty: bool,
        day_count: DayCount,
    ) -> BondResult<CashflowSeries> {
        if evaluation_date < self.issue_date || evaluation_date > self.redemption_date {
            return Err(BondError::invariant(format!(
                "evaluation date {} outside bond life {} - {}",
                evaluation_date, self.issue_date, self.redemption_date
            )));
        }

        let accrued = if dirty {
            self.accrued_interest(evaluation_date, day_count)
        } else {
            0.0
        };
        let coupon = self.coupon_per_period();

        let flows = self
            .date_axis(evaluation_date)
            .range(evaluation_date..)
            .map(|&date| {
                let mut amount = 0.0;
                if date == evaluation_date {
                    amount = -(price + accrued);
                } else if self.frequency > 0 && self.is_coupon_date(date) {
                    // Coupons overwrite the slot; only principal is added on top
                    amount = coupon;
                }
                if date == self.redemption_date {
                    amount += PAR;
                }
                Cashflow { date, amount }
            })
            .collect();

        Ok(CashflowSeries::from_sorted(flows))
    }
}
