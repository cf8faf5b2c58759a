//! Refresh state tracker - per-series watermarks and dirty windows.

mod refresh_state_model;
mod refresh_state_service;
mod refresh_state_traits;

pub use refresh_state_model::{DirtyReason, DirtyWindow, RefreshKey, RefreshState};
pub use refresh_state_service::{compute_dirty_window, RefreshStateTracker};
pub use refresh_state_traits::RefreshStateStore;
