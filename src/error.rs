//! Error types for bond valuation

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result alias used throughout the valuation core
pub type BondResult<T> = Result<T, BondError>;

/// Diagnostic record for a yield that could not be solved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverFailure {
    /// Evaluation (settlement) date of the failed solve
    pub evaluation_date: NaiveDate,

    /// Market price used for the purchase cashflow
    pub price: f64,

    /// Why the solver gave up
    pub reason: String,
}

impl std::fmt::Display for SolverFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "no yield for {} at price {:.4}: {}",
            self.evaluation_date, self.price, self.reason
        )
    }
}

/// Errors raised by the valuation core
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BondError {
    /// Requested day count convention is not supported
    #[error("Day count convention {convention} not implemented")]
    UnsupportedDayCount {
        convention: String,
    },

    /// No market price recorded for the evaluation date
    #[error("No market price is reported for the evaluation date {date}")]
    MissingMarketData {
        date: NaiveDate,
    },

    /// Newton-Raphson did not find a root
    #[error("Solver did not converge: {0}")]
    SolverNonConvergence(SolverFailure),

    /// Reference CPI cannot be computed for a date
    #[error("Reference CPI for {date} needs the CPI value for {missing_month}, which is not loaded")]
    CpiRange {
        date: NaiveDate,
        missing_month: NaiveDate,
    },

    /// Construction-time invariant broken
    #[error("Invariant violation: {reason}")]
    InvariantViolation {
        reason: String,
    },

    /// Coupon anchor rule could not be parsed
    #[error("Invalid coupon anchor '{input}': {reason}")]
    InvalidAnchor {
        input: String,
        reason: String,
    },

    /// CPI observations are malformed
    #[error("Invalid CPI series: {reason}")]
    InvalidCpiSeries {
        reason: String,
    },
}

impl BondError {
    pub(crate) fn invariant(reason: impl Into<String>) -> Self {
        BondError::InvariantViolation { reason: reason.into() }
    }

    /// Whether a batch may skip this failure and carry on with the next date or bond
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            BondError::MissingMarketData { .. } | BondError::SolverNonConvergence(_)
        )
    }
}
