//! Timeframe dimension - registry of rolling and calendar timeframes.

mod timeframes_constants;
mod timeframes_model;
mod timeframes_service;
mod timeframes_traits;

pub use timeframes_constants::default_timeframes;
pub use timeframes_model::{
    AlignmentType, BaseUnit, CalendarAnchor, CalendarScheme, TimeframeDefinition,
};
pub use timeframes_service::TimeframeService;
pub use timeframes_traits::{TimeframeRepositoryTrait, TimeframeServiceTrait};
