//! Session dimension models.

use chrono::{
    DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc,
    Weekday,
};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::{VENUE_DEFAULT_KEY, VENUE_DEFAULT_KEY_TYPE};
use crate::errors::{ConfigurationError, Error, Result};
use crate::utils::time_utils::trading_date_from_utc;

/// Composite key of a trading session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionKey {
    pub asset_class: String,
    pub region: String,
    pub venue: String,
    pub asset_key_type: String,
    pub asset_key: String,
    pub session_type: String,
}

impl SessionKey {
    pub fn new(
        asset_class: impl Into<String>,
        region: impl Into<String>,
        venue: impl Into<String>,
        asset_key_type: impl Into<String>,
        asset_key: impl Into<String>,
        session_type: impl Into<String>,
    ) -> Self {
        Self {
            asset_class: asset_class.into(),
            region: region.into(),
            venue: venue.into(),
            asset_key_type: asset_key_type.into(),
            asset_key: asset_key.into(),
            session_type: session_type.into(),
        }
    }

    /// Venue-wide default for this key's venue and session type.
    pub fn venue_default(&self) -> SessionKey {
        SessionKey {
            asset_key_type: VENUE_DEFAULT_KEY_TYPE.to_string(),
            asset_key: VENUE_DEFAULT_KEY.to_string(),
            ..self.clone()
        }
    }

    pub fn is_venue_default(&self) -> bool {
        self.asset_key_type == VENUE_DEFAULT_KEY_TYPE && self.asset_key == VENUE_DEFAULT_KEY
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}:{}/{}",
            self.asset_class,
            self.region,
            self.venue,
            self.asset_key_type,
            self.asset_key,
            self.session_type
        )
    }
}

/// A trading session expressed in local wall-clock time of an IANA zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDefinition {
    pub key: SessionKey,
    pub timezone: String,
    pub open_local: NaiveTime,
    pub close_local: NaiveTime,
    pub is_24h: bool,
    pub weekdays_only: bool,
}

impl SessionDefinition {
    pub fn validate(&self) -> Result<()> {
        parse_timezone(&self.timezone)?;
        if !self.is_24h && self.open_local == self.close_local {
            return Err(ConfigurationError::InvalidSession {
                key: self.key.to_string(),
                reason: "open and close times are equal on a non-24h session".to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Resolves the zone once for repeated date arithmetic.
    pub fn calendar(&self) -> Result<TradingCalendar> {
        Ok(TradingCalendar {
            tz: parse_timezone(&self.timezone)?,
            weekdays_only: self.weekdays_only,
        })
    }

    /// Session window on one local date, or None on a non-trading day.
    pub fn window_on(&self, tz: Tz, date: NaiveDate) -> Result<Option<SessionWindow>> {
        if self.weekdays_only && is_weekend(date) {
            return Ok(None);
        }
        let next_date = date
            .succ_opt()
            .ok_or_else(|| Error::Unexpected(format!("date overflow after {}", date)))?;

        let (open_at, close_at) = if self.is_24h {
            (date.and_time(NaiveTime::MIN), next_date.and_time(NaiveTime::MIN))
        } else if self.close_local <= self.open_local {
            (date.and_time(self.open_local), next_date.and_time(self.close_local))
        } else {
            (date.and_time(self.open_local), date.and_time(self.close_local))
        };

        let open_utc = local_to_utc(tz, open_at).ok_or_else(|| {
            Error::Unexpected(format!("cannot resolve {} in {}", open_at, self.timezone))
        })?;
        let close_utc = local_to_utc(tz, close_at).ok_or_else(|| {
            Error::Unexpected(format!("cannot resolve {} in {}", close_at, self.timezone))
        })?;

        Ok(Some(SessionWindow {
            date,
            open_utc,
            close_utc,
        }))
    }
}

/// One session occurrence in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionWindow {
    pub date: NaiveDate,
    pub open_utc: DateTime<Utc>,
    pub close_utc: DateTime<Utc>,
}

/// Resolved calendar of an asset: which dates trade and how instants map to dates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradingCalendar {
    pub tz: Tz,
    pub weekdays_only: bool,
}

impl TradingCalendar {
    /// Every day trades, dates in UTC.
    pub fn always_on() -> Self {
        Self {
            tz: chrono_tz::UTC,
            weekdays_only: false,
        }
    }

    pub fn is_trading_day(&self, date: NaiveDate) -> bool {
        !(self.weekdays_only && is_weekend(date))
    }

    pub fn trading_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        trading_date_from_utc(instant, self.tz)
    }

    /// Trading days strictly between two dates.
    pub fn trading_days_between(&self, after: NaiveDate, before: NaiveDate) -> i64 {
        let mut count = 0;
        let mut day = after + Duration::days(1);
        while day < before {
            if self.is_trading_day(day) {
                count += 1;
            }
            day += Duration::days(1);
        }
        count
    }
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Parses an IANA zone name, rejecting anything that is a fixed numeric offset.
pub fn parse_timezone(name: &str) -> Result<Tz> {
    let trimmed = name.trim();
    let upper = trimmed.to_ascii_uppercase();
    let fixed_offset = trimmed.is_empty()
        || trimmed.starts_with('+')
        || trimmed.starts_with('-')
        || trimmed.chars().next().is_some_and(|c| c.is_ascii_digit())
        || ["UTC+", "UTC-", "GMT+", "GMT-", "ETC/GMT+", "ETC/GMT-"]
            .iter()
            .any(|prefix| upper.starts_with(prefix));
    if fixed_offset {
        return Err(ConfigurationError::InvalidTimezone(
            name.to_string(),
            "a zone name is required, not a fixed offset".to_string(),
        )
        .into());
    }
    trimmed
        .parse::<Tz>()
        .map_err(|e| ConfigurationError::InvalidTimezone(name.to_string(), e.to_string()).into())
}

/// Maps a local wall-clock time to UTC.
///
/// Ambiguous times (clocks falling back) take the earlier instant; times inside
/// a spring-forward gap move to the first valid minute after the gap.
pub fn local_to_utc(tz: Tz, local: NaiveDateTime) -> Option<DateTime<Utc>> {
    let mut probe = local;
    // DST gaps are at most a couple of hours.
    for _ in 0..=180 {
        match tz.from_local_datetime(&probe) {
            LocalResult::Single(t) => return Some(t.with_timezone(&Utc)),
            LocalResult::Ambiguous(earliest, _) => return Some(earliest.with_timezone(&Utc)),
            LocalResult::None => probe += Duration::minutes(1),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timezone_accepts_zone_names() {
        assert_eq!(parse_timezone("America/New_York").unwrap(), chrono_tz::America::New_York);
        assert_eq!(parse_timezone("UTC").unwrap(), chrono_tz::UTC);
    }

    #[test]
    fn test_parse_timezone_rejects_fixed_offsets() {
        for bad in ["+05:00", "-04:00", "UTC+5", "GMT-3", "Etc/GMT+5", "0500", ""] {
            let err = parse_timezone(bad).unwrap_err();
            assert!(err.is_fatal(), "{} should be a configuration error", bad);
        }
        assert!(parse_timezone("Mars/Olympus").is_err());
    }

    #[test]
    fn test_local_to_utc_spring_forward_gap() {
        let tz = chrono_tz::America::New_York;
        // 02:30 does not exist on 2024-03-10; the first valid instant is 03:00 EDT.
        let local = NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(2, 30, 0)
            .unwrap();
        let utc = local_to_utc(tz, local).unwrap();
        assert_eq!(utc, Utc.with_ymd_and_hms(2024, 3, 10, 7, 0, 0).unwrap());
    }

    #[test]
    fn test_local_to_utc_fall_back_takes_earlier() {
        let tz = chrono_tz::America::New_York;
        let local = NaiveDate::from_ymd_opt(2024, 11, 3)
            .unwrap()
            .and_hms_opt(1, 30, 0)
            .unwrap();
        let utc = local_to_utc(tz, local).unwrap();
        assert_eq!(utc, Utc.with_ymd_and_hms(2024, 11, 3, 5, 30, 0).unwrap());
    }

    #[test]
    fn test_trading_days_between_skips_weekends() {
        let cal = TradingCalendar {
            tz: chrono_tz::America::New_York,
            weekdays_only: true,
        };
        // Friday 2024-03-08 to Monday 2024-03-11: nothing trades in between.
        let fri = NaiveDate::from_ymd_opt(2024, 3, 8).unwrap();
        let mon = NaiveDate::from_ymd_opt(2024, 3, 11).unwrap();
        assert_eq!(cal.trading_days_between(fri, mon), 0);
        assert_eq!(TradingCalendar::always_on().trading_days_between(fri, mon), 2);
    }
}
