mod model;
mod repository;

pub use model::{NewValidationAuditDB, ValidationAuditDB};
pub use repository::ValidationAuditRepository;
