use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;

use crate::timeframes::{CalendarAnchor, CalendarScheme};

/// Converts a UTC instant to the trading date in the given timezone.
///
/// This is the single source of truth for turning bar timestamps into
/// domain dates.
pub fn trading_date_from_utc(instant: DateTime<Utc>, tz: Tz) -> NaiveDate {
    instant.with_timezone(&tz).date_naive()
}

/// Midnight UTC of a date. Row timestamps are always expressed this way.
pub fn date_to_utc(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

pub fn get_days_between(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    if start > end {
        return Vec::new();
    }
    let mut days = Vec::new();
    let mut current = start;
    while current <= end {
        days.push(current);
        match current.succ_opt() {
            Some(next) => current = next,
            None => break,
        }
    }
    days
}

/// Number of days in `[start, end]`, both inclusive.
pub fn inclusive_days(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days() + 1
}

fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)?.pred_opt()
}

fn week_end_day(scheme: CalendarScheme) -> Weekday {
    match scheme {
        CalendarScheme::Us => Weekday::Sat,
        CalendarScheme::Iso | CalendarScheme::None => Weekday::Sun,
    }
}

/// A fixed week end used to count week ordinals for multi-week periods.
fn reference_week_end(scheme: CalendarScheme) -> Option<NaiveDate> {
    match week_end_day(scheme) {
        Weekday::Sat => NaiveDate::from_ymd_opt(1970, 1, 3),
        _ => NaiveDate::from_ymd_opt(1970, 1, 4),
    }
}

/// Months per period for the month-based anchors.
fn months_per_period(anchor: CalendarAnchor, quantity: u32) -> i64 {
    let quantity = i64::from(quantity.max(1));
    match anchor {
        CalendarAnchor::MonthEnd => quantity,
        CalendarAnchor::QuarterEnd => 3 * quantity,
        CalendarAnchor::YearEnd => 12 * quantity,
        CalendarAnchor::WeekEnd => 0,
    }
}

fn month_index(date: NaiveDate) -> i64 {
    i64::from(date.year()) * 12 + i64::from(date.month0())
}

fn month_end_from_index(index: i64) -> Option<NaiveDate> {
    let year = i32::try_from(index.div_euclid(12)).ok()?;
    let month = u32::try_from(index.rem_euclid(12)).ok()? + 1;
    last_day_of_month(year, month)
}

/// First period boundary on or after `date`.
///
/// Week periods end on the scheme's week-end day; `quantity` weeks are grouped
/// by ordinal from a fixed reference week. Month-based periods end on the last
/// day of a month whose absolute index is a multiple of the period length, so
/// quarters end in March/June/September/December and half-years in
/// June/December.
pub fn period_end_on_or_after(
    date: NaiveDate,
    anchor: CalendarAnchor,
    scheme: CalendarScheme,
    quantity: u32,
) -> Option<NaiveDate> {
    match anchor {
        CalendarAnchor::WeekEnd => {
            let target = week_end_day(scheme).num_days_from_monday() as i64;
            let current = date.weekday().num_days_from_monday() as i64;
            let mut candidate = date + Duration::days((target - current).rem_euclid(7));
            if quantity > 1 {
                let reference = reference_week_end(scheme)?;
                let ordinal = (candidate - reference).num_days().div_euclid(7);
                let remainder = ordinal.rem_euclid(i64::from(quantity));
                if remainder != 0 {
                    candidate += Duration::weeks(i64::from(quantity) - remainder);
                }
            }
            Some(candidate)
        }
        _ => {
            let period = months_per_period(anchor, quantity);
            let index = month_index(date);
            let remainder = (index + 1).rem_euclid(period);
            let end_index = if remainder == 0 {
                index
            } else {
                index + period - remainder
            };
            month_end_from_index(end_index)
        }
    }
}

/// Boundary immediately before the boundary `end`.
pub fn previous_period_end(
    end: NaiveDate,
    anchor: CalendarAnchor,
    quantity: u32,
) -> Option<NaiveDate> {
    match anchor {
        CalendarAnchor::WeekEnd => Some(end - Duration::weeks(i64::from(quantity.max(1)))),
        _ => month_end_from_index(month_index(end) - months_per_period(anchor, quantity)),
    }
}

/// First day of the period that ends on the boundary `end`.
pub fn period_start(end: NaiveDate, anchor: CalendarAnchor, quantity: u32) -> Option<NaiveDate> {
    previous_period_end(end, anchor, quantity)?.succ_opt()
}
