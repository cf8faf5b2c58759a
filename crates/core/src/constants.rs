//! Engine-wide defaults.

/// Minimum dirty-window lookback regardless of timeframe.
pub const MIN_LOOKBACK_DAYS: i64 = 7;

/// Lookback is this many nominal periods when that exceeds the minimum.
/// Two periods guarantee the window containing the watermark and the one
/// before it are always recomputed.
pub const LOOKBACK_NOMINAL_MULTIPLIER: i64 = 2;

/// Default tolerance for missing trading days inside one window.
/// Four consecutive missing sessions covers a long holiday weekend
/// without letting a real outage through.
pub const DEFAULT_MAX_GAP_DAYS: i64 = 4;

/// Default number of assets refreshed concurrently.
pub const DEFAULT_MAX_WORKERS: usize = 4;

/// Default EMA periods used when a request names none.
pub const DEFAULT_EMA_PERIODS: [u32; 3] = [10, 20, 50];

/// Session type used to resolve an asset's trading calendar.
pub const DEFAULT_SESSION_TYPE: &str = "regular";

/// Asset key type and asset key of a venue-wide default session.
pub const VENUE_DEFAULT_KEY_TYPE: &str = "default";
pub const VENUE_DEFAULT_KEY: &str = "*";

/// Maximum offending keys listed in an alert body.
pub const ALERT_MAX_LISTED_ISSUES: usize = 20;

/// Source rows read per merge round trip.
pub const MERGE_BATCH_SIZE: usize = 5_000;
