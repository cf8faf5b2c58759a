mod model;
mod repository;

pub use model::TimeframeDB;
pub use repository::TimeframeRepository;
