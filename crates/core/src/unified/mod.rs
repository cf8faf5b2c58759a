//! Unification merger - folds the per-strategy tables into one.

mod unified_model;
mod unified_service;
mod unified_traits;

#[cfg(test)]
mod unified_service_tests;

pub use unified_model::{CanonicalCount, MergeWatermark, UnifiedEmaRow};
pub use unified_service::UnificationMerger;
pub use unified_traits::UnifiedEmaStore;
