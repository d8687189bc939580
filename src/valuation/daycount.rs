//! Day count conventions used for accrual and discounting

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::BondError;

/// Supported day count conventions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DayCount {
    /// Actual/360
    Act360,
    /// Actual/365 fixed
    #[default]
    Act365,
    /// Actual/actual: 366 days in leap years
    ActAct,
}

impl DayCount {
    /// Days in the year containing `date` under this convention
    pub fn days_in_year(&self, date: NaiveDate) -> f64 {
        match self {
            DayCount::Act360 => 360.0,
            DayCount::Act365 => 365.0,
            DayCount::ActAct => {
                if date.leap_year() {
                    366.0
                } else {
                    365.0
                }
            }
        }
    }

    /// Tag as used in configuration files
    pub fn as_str(&self) -> &'static str {
        match self {
            DayCount::Act360 => "act/360",
            DayCount::Act365 => "act/365",
            DayCount::ActAct => "act/act",
        }
    }
}

impl FromStr for DayCount {
    type Err = BondError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "act/360" => Ok(DayCount::Act360),
            "act/365" => Ok(DayCount::Act365),
            "act/act" => Ok(DayCount::ActAct),
            _ => Err(BondError::UnsupportedDayCount { convention: s.to_string() }),
        }
    }
}

impl TryFrom<String> for DayCount {
    type Error = BondError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DayCount> for String {
    fn from(value: DayCount) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for DayCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_days_in_year() {
        assert_eq!(DayCount::Act360.days_in_year(date(2024, 3, 1)), 360.0);
        assert_eq!(DayCount::Act365.days_in_year(date(2024, 3, 1)), 365.0);
        assert_eq!(DayCount::ActAct.days_in_year(date(2024, 3, 1)), 366.0);
        assert_eq!(DayCount::ActAct.days_in_year(date(2023, 3, 1)), 365.0);
    }

    #[test]
    fn test_parse_tags() {
        assert_eq!("act/365".parse::<DayCount>().unwrap(), DayCount::Act365);
        assert_eq!("ACT/360".parse::<DayCount>().unwrap(), DayCount::Act360);
        assert_eq!(" act/act ".parse::<DayCount>().unwrap(), DayCount::ActAct);

        let err = "30/360".parse::<DayCount>().unwrap_err();
        assert_eq!(err, BondError::UnsupportedDayCount { convention: "30/360".to_string() });
    }

    #[test]
    fn test_serde_uses_tags() {
        let json = serde_json::to_string(&DayCount::ActAct).unwrap();
        assert_eq!(json, "\"act/act\"");

        let parsed: DayCount = serde_json::from_str("\"act/360\"").unwrap();
        assert_eq!(parsed, DayCount::Act360);
        assert!(serde_json::from_str::<DayCount>("\"bus/252\"").is_err());
    }
}
