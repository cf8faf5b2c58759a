mod model;
mod repository;

pub use model::{AssetProfileDB, PriceBarDB};
pub use repository::BarRepository;
