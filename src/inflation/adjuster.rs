//! Scaling nominal cashflows into CPI-linked cashflows

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::cpi::{round_to, CpiIndexer};
use crate::error::BondResult;
use crate::valuation::{Cashflow, CashflowSeries};

/// Index ratio per cashflow date, rounded to five decimals
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexRatio {
    pub date: NaiveDate,
    pub ratio: f64,
}

/// Index ratios paired with an inflation-linked cashflow series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRatioSeries {
    ratios: Vec<IndexRatio>,
}

impl IndexRatioSeries {
    pub fn iter(&self) -> impl Iterator<Item = &IndexRatio> + '_ {
        self.ratios.iter()
    }

    pub fn as_slice(&self) -> &[IndexRatio] {
        &self.ratios
    }

    pub fn len(&self) -> usize {
        self.ratios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ratios.is_empty()
    }

    pub fn ratio_on(&self, date: NaiveDate) -> Option<f64> {
        self.ratios
            .binary_search_by_key(&date, |r| r.date)
            .ok()
            .map(|idx| self.ratios[idx].ratio)
    }
}

/// Rescale `nominal` by the index ratio of each date against `cpi_base`.
///
/// The purchase at the evaluation date is never scaled: its ratio is
/// exactly 1.
pub fn adjust(
    nominal: &CashflowSeries,
    cpi_base: f64,
    indexer: &CpiIndexer,
) -> BondResult<(CashflowSeries, IndexRatioSeries)> {
    let mut flows = Vec::with_capacity(nominal.len());
    let mut ratios = Vec::with_capacity(nominal.len());

    for (idx, cf) in nominal.iter().enumerate() {
        let ratio = if idx == 0 {
            1.0
        } else {
            round_to(indexer.ref_cpi(cf.date)? / cpi_base, 5)
        };

        ratios.push(IndexRatio { date: cf.date, ratio });
        flows.push(Cashflow { date: cf.date, amount: cf.amount * ratio });
    }

    Ok((CashflowSeries::from_sorted(flows), IndexRatioSeries { ratios }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inflation::CpiSeries;
    use approx::assert_abs_diff_eq;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn indexer() -> CpiIndexer {
        let months = (1..=12).map(|m| (date(2019, m, 1), 130.0 + m as f64));
        CpiIndexer::new(CpiSeries::new(months).unwrap())
    }

    #[test]
    fn test_adjust_scales_all_but_purchase() {
        let cpi = indexer();
        let nominal = CashflowSeries::from_sorted(vec![
            Cashflow { date: date(2019, 6, 15), amount: -101.0 },
            Cashflow { date: date(2019, 9, 1), amount: 2.0 },
            Cashflow { date: date(2019, 12, 1), amount: 102.0 },
        ]);

        let base = 131.0;
        let (scaled, ratios) = adjust(&nominal, base, &cpi).unwrap();

        assert_eq!(ratios.len(), 3);
        assert_eq!(ratios.ratio_on(date(2019, 6, 15)), Some(1.0));
        assert_eq!(scaled.purchase().unwrap().amount, -101.0);

        // September references June (136), December references September (139)
        let sep = round_to(136.0 / base, 5);
        let dec = round_to(139.0 / base, 5);
        assert_eq!(ratios.ratio_on(date(2019, 9, 1)), Some(sep));
        assert_abs_diff_eq!(scaled.amount_on(date(2019, 9, 1)).unwrap(), 2.0 * sep, epsilon = 1e-12);
        assert_abs_diff_eq!(scaled.redemption().unwrap().amount, 102.0 * dec, epsilon = 1e-12);
    }

    #[test]
    fn test_adjust_fails_beyond_cpi_data() {
        let cpi = indexer();
        let nominal = CashflowSeries::from_sorted(vec![
            Cashflow { date: date(2019, 6, 15), amount: -101.0 },
            Cashflow { date: date(2020, 3, 1), amount: 100.0 },
        ]);

        assert!(adjust(&nominal, 131.0, &cpi).is_err());
    }
}
