//! Reference CPI per the Bank of Canada real return bond methodology
//!
//! The reference CPI for a date is interpolated linearly between the CPI
//! observations `lag` and `lag - 1` months earlier, weighted by the day of the
//! month, and rounded to five decimals.

use std::collections::BTreeMap;

use chrono::{Datelike, Months, NaiveDate};

use crate::error::{BondError, BondResult};

/// Default lag between a date and its reference CPI month
pub const DEFAULT_LAG_MONTHS: u32 = 3;

/// Round to the given number of decimals
pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Reference month and the month after it for `date` under `lag_months`
fn reference_months(date: NaiveDate, lag_months: u32) -> Option<(NaiveDate, NaiveDate)> {
    let ref_month = first_of_month(date).checked_sub_months(Months::new(lag_months))?;
    let next_month = ref_month.checked_add_months(Months::new(1))?;
    Some((ref_month, next_month))
}

fn days_in_month(date: NaiveDate) -> u32 {
    let first = first_of_month(date);
    first
        .checked_add_months(Months::new(1))
        .map(|next| (next - first).num_days() as u32)
        .unwrap_or(31)
}

/// Monthly CPI observations keyed by the first day of the month
#[derive(Debug, Clone, PartialEq)]
pub struct CpiSeries {
    values: BTreeMap<NaiveDate, f64>,
}

impl CpiSeries {
    /// Build from (month start, value) pairs
    pub fn new<I>(observations: I) -> BondResult<Self>
    where
        I: IntoIterator<Item = (NaiveDate, f64)>,
    {
        let mut values = BTreeMap::new();

        for (month, value) in observations {
            if month.day() != 1 {
                return Err(BondError::InvalidCpiSeries {
                    reason: format!("observation {} is not a month start", month),
                });
            }
            if !value.is_finite() || value <= 0.0 {
                return Err(BondError::InvalidCpiSeries {
                    reason: format!("value {} for {} is not a positive number", value, month),
                });
            }
            if values.insert(month, value).is_some() {
                return Err(BondError::InvalidCpiSeries {
                    reason: format!("duplicate observation for {}", month),
                });
            }
        }

        if values.is_empty() {
            return Err(BondError::InvalidCpiSeries { reason: "no observations".to_string() });
        }

        Ok(Self { values })
    }

    pub fn get(&self, month: NaiveDate) -> Option<f64> {
        self.values.get(&month).copied()
    }

    pub fn earliest(&self) -> NaiveDate {
        self.values.keys().next().copied().unwrap_or(NaiveDate::MIN)
    }

    pub fn latest(&self) -> NaiveDate {
        self.values.keys().next_back().copied().unwrap_or(NaiveDate::MIN)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.values.iter().map(|(d, v)| (*d, *v))
    }

    /// Months between the earliest and latest observation with no value
    pub fn missing_months(&self) -> Vec<NaiveDate> {
        let mut missing = Vec::new();
        let latest = self.latest();
        let mut month = self.earliest();
        while month < latest {
            if !self.values.contains_key(&month) {
                missing.push(month);
            }
            month = match month.checked_add_months(Months::new(1)) {
                Some(next) => next,
                None => break,
            };
        }
        missing
    }
}

/// Read-only reference CPI calculator over a loaded CPI series
#[derive(Debug, Clone)]
pub struct CpiIndexer {
    series: CpiSeries,
    lag_months: u32,
}

impl CpiIndexer {
    /// Indexer with the standard three month lag
    pub fn new(series: CpiSeries) -> Self {
        Self::with_lag(series, DEFAULT_LAG_MONTHS)
    }

    pub fn with_lag(series: CpiSeries, lag_months: u32) -> Self {
        Self { series, lag_months }
    }

    pub fn series(&self) -> &CpiSeries {
        &self.series
    }

    pub fn lag_months(&self) -> u32 {
        self.lag_months
    }

    fn lookup(&self, date: NaiveDate, month: NaiveDate) -> BondResult<f64> {
        self.series.get(month).ok_or(BondError::CpiRange { date, missing_month: month })
    }

    /// Reference CPI for `date` using the indexer's lag
    pub fn ref_cpi(&self, date: NaiveDate) -> BondResult<f64> {
        self.ref_cpi_with_lag(date, self.lag_months)
    }

    /// Reference CPI for `date` with an explicit lag
    pub fn ref_cpi_with_lag(&self, date: NaiveDate, lag_months: u32) -> BondResult<f64> {
        let (ref_month, next_month) = reference_months(date, lag_months).ok_or(BondError::CpiRange {
            date,
            missing_month: first_of_month(date),
        })?;

        let cpi_0 = self.lookup(date, ref_month)?;
        let cpi_1 = self.lookup(date, next_month)?;

        let weight = (date.day() - 1) as f64 / days_in_month(date) as f64;
        Ok(round_to(cpi_0 + weight * (cpi_1 - cpi_0), 5))
    }

    /// Ratio of the reference CPI at `date` to the one at `base`
    pub fn index_ratio(&self, date: NaiveDate, base: NaiveDate) -> BondResult<f64> {
        Ok(round_to(self.ref_cpi(date)? / self.ref_cpi(base)?, 5))
    }

    /// First date whose reference CPI can be computed
    pub fn earliest_computable_date(&self) -> NaiveDate {
        self.series
            .earliest()
            .checked_add_months(Months::new(self.lag_months))
            .unwrap_or(NaiveDate::MAX)
    }

    /// First date whose reference CPI can no longer be computed.
    ///
    /// This is the month start `lag` months after the latest observation;
    /// an inflation-linked bond must redeem strictly before it.
    pub fn latest_computable_date_exclusive(&self) -> NaiveDate {
        self.series
            .latest()
            .checked_add_months(Months::new(self.lag_months))
            .unwrap_or(NaiveDate::MAX)
    }

    /// Whether the reference CPI is available for `date`.
    ///
    /// Both bracketing months must be loaded, so a gap inside the series
    /// makes the dates that reference it uncomputable.
    pub fn is_computable(&self, date: NaiveDate) -> bool {
        reference_months(date, self.lag_months).is_some_and(|(ref_month, next_month)| {
            self.series.get(ref_month).is_some() && self.series.get(next_month).is_some()
        })
    }
}
