//! Bond static data, coupon anchor rules and observed price histories

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{BondError, BondResult};

/// Type of instrument as recorded in the static data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstrumentType {
    /// Plain fixed or zero coupon bond
    Nominal,
    /// CPI-linked real return bond
    InflationLinked,
}

impl InstrumentType {
    /// Parse the TYPE column of the static data ("NOM" / "ILB")
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "NOM" => Some(InstrumentType::Nominal),
            "ILB" => Some(InstrumentType::InflationLinked),
            _ => None,
        }
    }

    pub fn as_code(&self) -> &'static str {
        match self {
            InstrumentType::Nominal => "NOM",
            InstrumentType::InflationLinked => "ILB",
        }
    }
}

/// Annual coupon anchor: a fixed day and month recurring every year
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AnchorRule {
    /// Month of year (1-12). Ordered first so rules sort chronologically.
    pub month: u32,
    /// Day of month
    pub day: u32,
}

impl AnchorRule {
    /// Create an anchor, rejecting day/month pairs that never occur
    pub fn new(day: u32, month: u32) -> BondResult<Self> {
        // 2000 is a leap year, so 29/02 is accepted and simply skipped in other years
        if NaiveDate::from_ymd_opt(2000, month, day).is_none() {
            return Err(BondError::InvalidAnchor {
                input: format!("{:02}/{:02}", day, month),
                reason: "day/month pair does not exist".to_string(),
            });
        }
        Ok(Self { month, day })
    }

    /// First of the given month
    pub fn first_of(month: u32) -> BondResult<Self> {
        Self::new(1, month)
    }

    /// The anchor's date in `year`, if that calendar date exists
    pub fn in_year(&self, year: i32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(year, self.month, self.day)
    }
}

impl fmt::Display for AnchorRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}/{:02}", self.day, self.month)
    }
}

/// Parse a coupon date list such as `"01/06,01/12"` (day/month pairs).
///
/// Blank input (or the `nan` placeholder spreadsheets export) yields an
/// empty set, i.e. a zero coupon bond. The result is sorted and unique.
pub fn parse_coupon_anchors(input: &str) -> BondResult<Vec<AnchorRule>> {
    let trimmed = input.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
        return Ok(Vec::new());
    }

    let mut anchors = Vec::new();
    for token in trimmed.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let invalid = |reason: &str| BondError::InvalidAnchor {
            input: token.to_string(),
            reason: reason.to_string(),
        };

        let (day, month) = token
            .split_once('/')
            .ok_or_else(|| invalid("expected day/month"))?;
        let day: u32 = day.trim().parse().map_err(|_| invalid("day is not a number"))?;
        let month: u32 = month.trim().parse().map_err(|_| invalid("month is not a number"))?;

        anchors.push(AnchorRule::new(day, month)?);
    }

    anchors.sort();
    anchors.dedup();
    Ok(anchors)
}

/// Observed market prices keyed by date. Missing observations are simply absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    prices: BTreeMap<NaiveDate, f64>,
}

impl PriceSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a price; NaN and infinite values are treated as gaps
    pub fn insert(&mut self, date: NaiveDate, price: f64) {
        if price.is_finite() {
            self.prices.insert(date, price);
        }
    }

    pub fn get(&self, date: NaiveDate) -> Option<f64> {
        self.prices.get(&date).copied()
    }

    /// Chronological iterator over (date, price)
    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.prices.iter().map(|(d, p)| (*d, *p))
    }

    /// Observations within `[start, end]`
    pub fn between(&self, start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.prices.range(start..=end).map(|(d, p)| (*d, *p))
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

impl FromIterator<(NaiveDate, f64)> for PriceSeries {
    fn from_iter<I: IntoIterator<Item = (NaiveDate, f64)>>(iter: I) -> Self {
        let mut series = PriceSeries::new();
        for (date, price) in iter {
            series.insert(date, price);
        }
        series
    }
}

/// A single government bond
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bond {
    /// Identifier from the static data (not used in computation)
    pub id: String,

    /// Descriptive name (not used in computation)
    pub name: String,

    /// Issue date
    pub issue_date: NaiveDate,

    /// Redemption (maturity) date
    pub redemption_date: NaiveDate,

    /// Annual nominal coupon in points of par 100 (4.0 = 4%)
    pub coupon_rate: f64,

    /// Annual coupon anchors; empty for a zero coupon bond
    pub coupon_anchors: Vec<AnchorRule>,

    /// Observed prices, attached for yield curve building
    #[serde(default)]
    pub price_series: Option<PriceSeries>,
}

impl Bond {
    /// Create a bond, enforcing `issue_date < redemption_date`
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        issue_date: NaiveDate,
        redemption_date: NaiveDate,
        coupon_rate: f64,
        mut coupon_anchors: Vec<AnchorRule>,
    ) -> BondResult<Self> {
        let id = id.into();
        if issue_date >= redemption_date {
            return Err(BondError::invariant(format!(
                "bond {}: issue date {} is not before redemption date {}",
                id, issue_date, redemption_date
            )));
        }
        if !coupon_rate.is_finite() {
            return Err(BondError::invariant(format!("bond {}: coupon rate is not finite", id)));
        }

        coupon_anchors.sort();
        coupon_anchors.dedup();

        Ok(Self {
            id,
            name: name.into(),
            issue_date,
            redemption_date,
            coupon_rate,
            coupon_anchors,
            price_series: None,
        })
    }

    /// Attach an observed price history
    pub fn with_prices(mut self, prices: PriceSeries) -> Self {
        self.price_series = Some(prices);
        self
    }

    /// Coupon payments per year
    pub fn frequency(&self) -> u32 {
        self.coupon_anchors.len() as u32
    }

    pub fn is_zero_coupon(&self) -> bool {
        self.coupon_anchors.is_empty() || self.coupon_rate == 0.0
    }

    /// Recorded price for `date`, if any
    pub fn price_on(&self, date: NaiveDate) -> Option<f64> {
        self.price_series.as_ref().and_then(|p| p.get(date))
    }
}

impl fmt::Display for Bond {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | {} | {}\n{} - {}",
            self.id,
            self.name,
            self.coupon_rate,
            self.issue_date.format("%d/%m/%y"),
            self.redemption_date.format("%d/%m/%y")
        )
    }
}
