//! EMA producers: alignment strategies, the shared recurrence, and the
//! incremental refresh service that persists their output.

mod alignment;
mod ema_model;
mod ema_service;
mod ema_traits;
mod producer;


pub use alignment::{AlignmentStrategy, CalendarRule, CloseContext};
pub use ema_model::{
    CanonicalClose, CloseSeries, DailyClose, EmaRow, EmaSeed, ExcludedWindow, WindowWrite,
};
pub use ema_service::{
    to_daily_closes, AssetPlan, AssetRefreshResult, EmaRefreshService, ProducerConfig,
    RefreshStatus,
};
pub use ema_traits::EmaStore;
pub use producer::{alpha, compute_ema};
