use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::validation_model::ValidationResult;
use crate::errors::Result;

/// Append-only audit log of validation results.
#[async_trait]
pub trait ValidationAuditStore: Send + Sync {
    async fn append_results(
        &self,
        run_id: &str,
        checked_at: DateTime<Utc>,
        results: Vec<ValidationResult>,
    ) -> Result<usize>;

    fn list_results(&self, run_id: &str) -> Result<Vec<ValidationResult>>;
}
