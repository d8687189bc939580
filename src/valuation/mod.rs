//! Cashflow generation, yield solving and yield curve building

mod daycount;
mod schedule;
mod cashflows;
mod yield_solver;
mod model;
mod curve;

pub use daycount::DayCount;
pub use schedule::coupon_dates;
pub use cashflows::{Cashflow, CashflowEngine, CashflowSeries, PAR};
pub use yield_solver::{DiscountSchedule, SolverConfig, YieldResult, YieldSolver};
pub use model::{BondCashflows, BondModel, CashflowPolicy};
pub use curve::{build_yield_curve, YieldCurve, YieldCurvePoint};
