//! CPI indexation for inflation-linked bonds

mod cpi;
mod adjuster;
pub mod loader;

pub use cpi::{CpiIndexer, CpiSeries, DEFAULT_LAG_MONTHS};
pub use adjuster::{adjust, IndexRatio, IndexRatioSeries};
pub use loader::{load_cpi, load_cpi_from_reader, LoadedCpi, DEFAULT_PRODUCT};
