//! Source price bars and asset profiles.

mod bars_model;
mod bars_traits;

pub use bars_model::{AssetProfile, BarBounds, PriceBar};
pub use bars_traits::BarStore;
