//! Default trading sessions.

use chrono::NaiveTime;

use super::sessions_model::{SessionDefinition, SessionKey};
use crate::constants::{DEFAULT_SESSION_TYPE, VENUE_DEFAULT_KEY, VENUE_DEFAULT_KEY_TYPE};

/// (asset_class, region, venue, timezone, open, close, is_24h, weekdays_only)
type SessionSeed = (
    &'static str,
    &'static str,
    &'static str,
    &'static str,
    (u32, u32),
    (u32, u32),
    bool,
    bool,
);

const SEEDS: &[SessionSeed] = &[
    ("crypto", "GLOBAL", "ANY", "UTC", (0, 0), (0, 0), true, false),
    ("equity", "US", "NYSE", "America/New_York", (9, 30), (16, 0), false, true),
    ("equity", "US", "NASDAQ", "America/New_York", (9, 30), (16, 0), false, true),
    ("equity", "CA", "TSX", "America/Toronto", (9, 30), (16, 0), false, true),
    ("equity", "UK", "LSE", "Europe/London", (8, 0), (16, 30), false, true),
    ("equity", "DE", "XETRA", "Europe/Berlin", (9, 0), (17, 30), false, true),
    ("equity", "JP", "TSE", "Asia/Tokyo", (9, 0), (15, 0), false, true),
    ("futures", "US", "CME", "America/Chicago", (17, 0), (16, 0), false, true),
    ("fx", "GLOBAL", "OTC", "America/New_York", (17, 0), (17, 0), true, true),
];

/// Venue-wide default sessions seeded on first start.
pub fn default_sessions() -> Vec<SessionDefinition> {
    SEEDS
        .iter()
        .filter_map(
            |(asset_class, region, venue, timezone, open, close, is_24h, weekdays_only)| {
                Some(SessionDefinition {
                    key: SessionKey::new(
                        *asset_class,
                        *region,
                        *venue,
                        VENUE_DEFAULT_KEY_TYPE,
                        VENUE_DEFAULT_KEY,
                        DEFAULT_SESSION_TYPE,
                    ),
                    timezone: timezone.to_string(),
                    open_local: NaiveTime::from_hms_opt(open.0, open.1, 0)?,
                    close_local: NaiveTime::from_hms_opt(close.0, close.1, 0)?,
                    is_24h: *is_24h,
                    weekdays_only: *weekdays_only,
                })
            },
        )
        .collect()
}
