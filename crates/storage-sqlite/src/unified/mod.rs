mod model;
mod repository;

pub use model::{MergeWatermarkDB, UnifiedEmaRowDB};
pub use repository::UnifiedEmaRepository;
