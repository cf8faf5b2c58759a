//! Refresh pipeline - one run over producers, merger and validation.

mod pipeline_model;
mod pipeline_service;

pub use pipeline_model::{RefreshRequest, RunSummary};
pub use pipeline_service::RefreshPipeline;
