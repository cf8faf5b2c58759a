mod model;
mod repository;

pub use model::{table_for, EmaRowDB, EMA_COLUMNS};
pub use repository::EmaRepository;
