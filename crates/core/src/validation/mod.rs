//! Row-count validation of the unified table.

mod validation_model;
mod validation_service;
mod validation_traits;

#[cfg(test)]
mod validation_service_tests;

pub use validation_model::{
    expected_count, ValidationReport, ValidationResult, ValidationStatus,
};
pub use validation_service::ValidationService;
pub use validation_traits::ValidationAuditStore;
