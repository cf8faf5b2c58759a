mod model;
mod repository;

pub use model::RefreshStateDB;
pub use repository::RefreshStateRepository;
