pub mod alerts;
pub mod config;
pub mod scheduler;
mod main_lib;

pub use main_lib::{build_alert_sink, build_state, init_tracing, AppState};
