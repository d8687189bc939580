//! Bond Yields - cashflow and yield-to-maturity analytics for government bonds
//!
//! This library provides:
//! - Coupon schedules and cashflow series as of any settlement date, clean or dirty
//! - Yield to maturity via Newton-Raphson under act/360, act/365 and act/act
//! - Reference CPI interpolation and index ratios for inflation-linked bonds
//! - Yield curves over observed price histories, for one bond or a whole universe

pub mod error;
pub mod config;
pub mod bond;
pub mod valuation;
pub mod inflation;
pub mod universe;

// Re-export commonly used types
pub use error::{BondError, BondResult, SolverFailure};
pub use config::ValuationConfig;
pub use bond::{AnchorRule, Bond, InstrumentType, PriceSeries};
pub use valuation::{BondModel, CashflowSeries, DayCount, YieldCurve, YieldCurvePoint};
pub use inflation::{CpiIndexer, CpiSeries, IndexRatioSeries};
pub use universe::UniverseRunner;
