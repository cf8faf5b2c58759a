//! Session dimension - trading sessions with IANA timezone semantics.

mod sessions_constants;
mod sessions_model;
mod sessions_service;
mod sessions_service_tests;
mod sessions_traits;

pub use sessions_constants::default_sessions;
pub use sessions_model::{
    local_to_utc, parse_timezone, SessionDefinition, SessionKey, SessionWindow, TradingCalendar,
};
pub use sessions_service::SessionService;
pub use sessions_traits::{SessionRepositoryTrait, SessionServiceTrait};
