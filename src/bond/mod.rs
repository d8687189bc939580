//! Bond static data and loaders

mod data;
pub mod loader;

pub use data::{parse_coupon_anchors, AnchorRule, Bond, InstrumentType, PriceSeries};
pub use loader::{load_bonds, load_bonds_from_reader, load_prices, load_prices_from_reader, BondRecord};
