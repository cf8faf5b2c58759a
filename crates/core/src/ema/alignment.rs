//! Alignment strategies: where period boundaries fall and which windows close.

use chrono::{Duration, NaiveDate};

use super::ema_model::{CanonicalClose, CloseSeries, DailyClose, ExcludedWindow};
use crate::errors::{ConfigurationError, Error, Result};
use crate::sessions::TradingCalendar;
use crate::timeframes::{AlignmentType, CalendarAnchor, CalendarScheme, TimeframeDefinition};
use crate::utils::time_utils::{inclusive_days, period_end_on_or_after, period_start};

/// Boundary rules of a calendar-aligned timeframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarRule {
    pub anchor: CalendarAnchor,
    pub scheme: CalendarScheme,
    pub quantity: u32,
    pub allow_partial_start: bool,
    pub allow_partial_end: bool,
    pub min_days: Option<i64>,
    pub max_days: Option<i64>,
}

impl CalendarRule {
    /// Partial periods must reach `min_days`; full periods must not exceed `max_days`.
    pub fn check_realized_days(
        &self,
        realized_days: i64,
        partial: bool,
    ) -> std::result::Result<(), String> {
        if partial && self.min_days.is_some_and(|min| realized_days < min) {
            return Err(format!(
                "partial period of {} days is below minimum",
                realized_days
            ));
        }
        if !partial && self.max_days.is_some_and(|max| realized_days > max) {
            return Err(format!("period of {} days exceeds maximum", realized_days));
        }
        Ok(())
    }
}

/// The three producer variants, selected by `alignment_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignmentStrategy {
    Rolling { nominal_days: i64 },
    Calendar(CalendarRule),
    CalendarAnchored(CalendarRule),
}

/// Inputs shared by every strategy for one asset.
#[derive(Debug, Clone, Copy)]
pub struct CloseContext<'a> {
    pub calendar: &'a TradingCalendar,
    /// Trading date of the asset's first bar.
    pub history_start: NaiveDate,
    /// Tolerated run of consecutive missing trading days inside a window.
    pub max_gap_days: i64,
}

impl AlignmentStrategy {
    /// Factory keyed on the timeframe's alignment type.
    pub fn for_timeframe(timeframe: &TimeframeDefinition) -> Result<Self> {
        if timeframe.alignment_type == AlignmentType::Rolling {
            return Ok(AlignmentStrategy::Rolling {
                nominal_days: timeframe.nominal_length_days,
            });
        }
        let anchor = timeframe.calendar_anchor.ok_or_else(|| {
            Error::from(ConfigurationError::InvalidTimeframe {
                code: timeframe.code.clone(),
                reason: "calendar timeframe without anchor".to_string(),
            })
        })?;
        let rule = CalendarRule {
            anchor,
            scheme: timeframe.calendar_scheme,
            quantity: timeframe.quantity,
            allow_partial_start: timeframe.allow_partial_start,
            allow_partial_end: timeframe.allow_partial_end,
            min_days: timeframe.tf_days_min,
            max_days: timeframe.tf_days_max,
        };
        Ok(match timeframe.alignment_type {
            AlignmentType::CalendarAnchored => AlignmentStrategy::CalendarAnchored(rule),
            _ => AlignmentStrategy::Calendar(rule),
        })
    }

    pub fn alignment_type(&self) -> AlignmentType {
        match self {
            AlignmentStrategy::Rolling { .. } => AlignmentType::Rolling,
            AlignmentStrategy::Calendar(_) => AlignmentType::Calendar,
            AlignmentStrategy::CalendarAnchored(_) => AlignmentType::CalendarAnchored,
        }
    }

    /// Longest possible window, in days. Bars are loaded this far before the
    /// dirty-window start so the first recomputed window is whole.
    pub fn max_window_days(&self, timeframe: &TimeframeDefinition) -> i64 {
        let bound = timeframe.tf_days_max.unwrap_or(timeframe.nominal_length_days);
        bound.max(timeframe.nominal_length_days)
    }

    /// Canonical closes whose boundary is on or after `from`.
    ///
    /// `days` must be sorted by date without duplicates and must cover every
    /// window that ends on or after `from`.
    pub fn compute_canonical_closes(
        &self,
        days: &[DailyClose],
        ctx: &CloseContext<'_>,
        from: NaiveDate,
    ) -> Result<CloseSeries> {
        let Some(last) = days.last() else {
            return Ok(CloseSeries::default());
        };
        match self {
            AlignmentStrategy::Rolling { nominal_days } => Ok(rolling_closes(
                *nominal_days,
                days,
                ctx,
                from,
                last.date,
            )),
            AlignmentStrategy::Calendar(rule) | AlignmentStrategy::CalendarAnchored(rule) => {
                calendar_closes(rule, days, ctx, from, last.date)
            }
        }
    }
}

/// Bars with `start <= date <= end`.
fn window_slice(days: &[DailyClose], start: NaiveDate, end: NaiveDate) -> &[DailyClose] {
    let lo = days.partition_point(|d| d.date < start);
    let hi = days.partition_point(|d| d.date <= end);
    &days[lo..hi.max(lo)]
}

/// Longest run of missing trading days inside `[start, end]`.
fn longest_gap(
    window: &[DailyClose],
    start: NaiveDate,
    end: NaiveDate,
    calendar: &TradingCalendar,
) -> i64 {
    let mut previous = start - Duration::days(1);
    let mut longest = 0;
    for day in window {
        longest = longest.max(calendar.trading_days_between(previous, day.date));
        previous = day.date;
    }
    longest.max(calendar.trading_days_between(previous, end + Duration::days(1)))
}

/// A period is over once no trading day remains between the last bar and its boundary.
fn is_complete(boundary: NaiveDate, last_date: NaiveDate, calendar: &TradingCalendar) -> bool {
    last_date >= boundary
        || calendar.trading_days_between(last_date, boundary + Duration::days(1)) == 0
}

/// Close of a window, or the reason it is excluded.
fn close_window(
    days: &[DailyClose],
    start: NaiveDate,
    end: NaiveDate,
    ctx: &CloseContext<'_>,
) -> std::result::Result<f64, String> {
    let window = window_slice(days, start, end);
    let Some(last) = window.last() else {
        return Err("no bars in window".to_string());
    };
    let gap = longest_gap(window, start, end, ctx.calendar);
    if gap > ctx.max_gap_days {
        return Err(format!(
            "{} consecutive missing trading days exceeds threshold {}",
            gap, ctx.max_gap_days
        ));
    }
    Ok(last.close)
}

fn rolling_closes(
    nominal_days: i64,
    days: &[DailyClose],
    ctx: &CloseContext<'_>,
    from: NaiveDate,
    last_date: NaiveDate,
) -> CloseSeries {
    let n = nominal_days.max(1);
    let anchor = ctx.history_start;
    // Smallest k >= 1 with anchor + k*n - 1 >= from.
    let offset = (from - anchor).num_days() + 1;
    let mut k = if offset <= n { 1 } else { (offset + n - 1) / n };

    let mut series = CloseSeries::default();
    loop {
        let boundary = anchor + Duration::days(k * n - 1);
        if !is_complete(boundary, last_date, ctx.calendar) {
            break;
        }
        let start = boundary - Duration::days(n - 1);
        match close_window(days, start, boundary, ctx) {
            Ok(close) => series.closes.push(CanonicalClose {
                date: boundary,
                window_start: start,
                close,
                realized_days: n,
                is_partial_start: false,
                is_partial_end: false,
            }),
            Err(reason) => series.excluded.push(ExcludedWindow { boundary, reason }),
        }
        k += 1;
    }
    series
}

fn calendar_closes(
    rule: &CalendarRule,
    days: &[DailyClose],
    ctx: &CloseContext<'_>,
    from: NaiveDate,
    last_date: NaiveDate,
) -> Result<CloseSeries> {
    let out_of_range =
        || Error::Unexpected(format!("calendar boundary out of range near {}", from));
    let first_from = from.max(ctx.history_start);
    let mut boundary = period_end_on_or_after(first_from, rule.anchor, rule.scheme, rule.quantity)
        .ok_or_else(out_of_range)?;

    let mut series = CloseSeries::default();
    loop {
        let start = period_start(boundary, rule.anchor, rule.quantity).ok_or_else(out_of_range)?;
        if start > last_date {
            break;
        }
        let complete = is_complete(boundary, last_date, ctx.calendar);
        let partial_start = start < ctx.history_start;
        let partial_end = !complete;

        if partial_end && !rule.allow_partial_end {
            break;
        }

        let realized_start = start.max(ctx.history_start);
        let realized_end = if complete { boundary } else { last_date };
        let realized_days = inclusive_days(realized_start, realized_end);

        let verdict = if partial_start && !rule.allow_partial_start {
            Err("period starts before history".to_string())
        } else {
            rule.check_realized_days(realized_days, partial_start || partial_end)
                .and_then(|_| close_window(days, realized_start, realized_end, ctx))
        };

        match verdict {
            Ok(close) => series.closes.push(CanonicalClose {
                date: boundary,
                window_start: realized_start,
                close,
                realized_days,
                is_partial_start: partial_start,
                is_partial_end: partial_end,
            }),
            Err(reason) => series.excluded.push(ExcludedWindow { boundary, reason }),
        }

        if partial_end {
            break;
        }
        let next = boundary.succ_opt().ok_or_else(out_of_range)?;
        boundary = period_end_on_or_after(next, rule.anchor, rule.scheme, rule.quantity)
            .ok_or_else(out_of_range)?;
    }
    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeframes::default_timeframes;
    use crate::utils::time_utils::get_days_between;
    use chrono::{Datelike, Weekday};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn strategy(code: &str) -> AlignmentStrategy {
        let tf = default_timeframes().into_iter().find(|t| t.code == code).unwrap();
        AlignmentStrategy::for_timeframe(&tf).unwrap()
    }

    fn daily(start: NaiveDate, end: NaiveDate) -> Vec<DailyClose> {
        get_days_between(start, end)
            .into_iter()
            .enumerate()
            .map(|(i, date)| DailyClose {
                date,
                close: 100.0 + i as f64,
            })
            .collect()
    }

    fn ctx<'a>(calendar: &'a TradingCalendar, history_start: NaiveDate) -> CloseContext<'a> {
        CloseContext {
            calendar,
            history_start,
            max_gap_days: 4,
        }
    }

    #[test]
    fn test_factory_selects_variant_by_alignment_type() {
        assert!(matches!(strategy("7D"), AlignmentStrategy::Rolling { nominal_days: 7 }));
        assert!(matches!(strategy("1M_CAL"), AlignmentStrategy::Calendar(_)));
        assert!(matches!(
            strategy("1M_CAL_ANCHOR_US"),
            AlignmentStrategy::CalendarAnchored(_)
        ));
    }

    #[test]
    fn test_rolling_hundred_days_gives_fourteen_closes() {
        let cal = TradingCalendar::always_on();
        let start = d(2024, 1, 1);
        let days = daily(start, start + Duration::days(99));
        let series = strategy("7D")
            .compute_canonical_closes(&days, &ctx(&cal, start), start)
            .unwrap();
        assert_eq!(series.closes.len(), 14);
        assert!(series.excluded.is_empty());
        // Spacing is exactly the nominal length.
        for pair in series.closes.windows(2) {
            assert_eq!((pair[1].date - pair[0].date).num_days(), 7);
        }
        assert_eq!(series.closes[0].date, d(2024, 1, 7));
        assert_eq!(series.closes[0].close, 106.0);
    }

    #[test]
    fn test_rolling_from_skips_earlier_boundaries() {
        let cal = TradingCalendar::always_on();
        let start = d(2024, 1, 1);
        let days = daily(start, start + Duration::days(109));
        let series = strategy("7D")
            .compute_canonical_closes(&days, &ctx(&cal, start), start + Duration::days(83))
            .unwrap();
        let offsets: Vec<i64> = series
            .closes
            .iter()
            .map(|c| (c.date - start).num_days())
            .collect();
        assert_eq!(offsets, vec![83, 90, 97, 104]);
    }

    #[test]
    fn test_gap_beyond_threshold_excludes_window() {
        let cal = TradingCalendar::always_on();
        let start = d(2024, 1, 1);
        let mut days = daily(start, start + Duration::days(27));
        // Remove five consecutive days from the second week.
        days.retain(|b| !(8..=12).contains(&(b.date - start).num_days()));
        let series = strategy("7D")
            .compute_canonical_closes(&days, &ctx(&cal, start), start)
            .unwrap();
        assert_eq!(series.closes.len(), 3);
        assert_eq!(series.excluded.len(), 1);
        assert_eq!(series.excluded[0].boundary, d(2024, 1, 14));
    }

    #[test]
    fn test_weekends_are_not_gaps_for_weekday_sessions() {
        let cal = TradingCalendar {
            tz: chrono_tz::America::New_York,
            weekdays_only: true,
        };
        let start = d(2024, 1, 1);
        let days: Vec<DailyClose> = daily(start, d(2024, 3, 31))
            .into_iter()
            .filter(|b| !matches!(b.date.weekday(), Weekday::Sat | Weekday::Sun))
            .collect();
        let series = strategy("1M_CAL")
            .compute_canonical_closes(&days, &ctx(&cal, start), start)
            .unwrap();
        assert_eq!(series.closes.len(), 3);
        // March 31 2024 is a Sunday: the close is Friday's bar.
        let march = &series.closes[2];
        assert_eq!(march.date, d(2024, 3, 31));
        assert_eq!(march.realized_days, 31);
    }

    #[test]
    fn test_calendar_closes_land_on_month_ends_and_skip_partials() {
        let cal = TradingCalendar::always_on();
        let history = d(2024, 1, 15);
        let days = daily(history, d(2024, 5, 10));
        let series = strategy("1M_CAL")
            .compute_canonical_closes(&days, &ctx(&cal, history), history)
            .unwrap();
        let dates: Vec<NaiveDate> = series.closes.iter().map(|c| c.date).collect();
        assert_eq!(dates, vec![d(2024, 2, 29), d(2024, 3, 31), d(2024, 4, 30)]);
        assert!(series
            .closes
            .iter()
            .all(|c| !c.is_partial_start && !c.is_partial_end));
        // January starts before history and is excluded; May is still open.
        assert_eq!(series.excluded.len(), 1);
        assert_eq!(series.excluded[0].boundary, d(2024, 1, 31));
    }

    #[test]
    fn test_anchored_allows_partial_edges() {
        let cal = TradingCalendar::always_on();
        let history = d(2024, 1, 15);
        let days = daily(history, d(2024, 5, 10));
        let series = strategy("1M_CAL_ANCHOR_US")
            .compute_canonical_closes(&days, &ctx(&cal, history), history)
            .unwrap();
        assert_eq!(series.closes.len(), 5);

        let first = &series.closes[0];
        assert_eq!(first.date, d(2024, 1, 31));
        assert!(first.is_partial_start);
        assert_eq!(first.realized_days, 17);

        let last = series.closes.last().unwrap();
        assert_eq!(last.date, d(2024, 5, 31));
        assert!(last.is_partial_end);
        assert_eq!(last.realized_days, 10);

        // Only the final close may be partial at its end.
        assert_eq!(series.closes.iter().filter(|c| c.is_partial_end).count(), 1);
    }

    fn bounded(code: &str, min: Option<i64>, max: Option<i64>) -> AlignmentStrategy {
        let mut tf = default_timeframes().into_iter().find(|t| t.code == code).unwrap();
        tf.tf_days_min = min;
        tf.tf_days_max = max;
        AlignmentStrategy::for_timeframe(&tf).unwrap()
    }

    #[test]
    fn test_short_partial_periods_are_excluded() {
        let cal = TradingCalendar::always_on();
        let history = d(2024, 1, 29);
        let strategy = bounded("1M_CAL_ANCHOR_US", Some(5), Some(31));

        let days = daily(history, d(2024, 4, 3));
        let series = strategy
            .compute_canonical_closes(&days, &ctx(&cal, history), history)
            .unwrap();
        let dates: Vec<NaiveDate> = series.closes.iter().map(|c| c.date).collect();
        assert_eq!(dates, vec![d(2024, 2, 29), d(2024, 3, 31)]);
        let excluded: Vec<NaiveDate> = series.excluded.iter().map(|e| e.boundary).collect();
        assert_eq!(excluded, vec![d(2024, 1, 31), d(2024, 4, 30)]);
        assert!(series.excluded.iter().all(|e| e.reason.contains("below minimum")));

        // Five realized days reach the minimum.
        let days = daily(history, d(2024, 4, 5));
        let series = strategy
            .compute_canonical_closes(&days, &ctx(&cal, history), history)
            .unwrap();
        let last = series.closes.last().unwrap();
        assert_eq!(last.date, d(2024, 4, 30));
        assert!(last.is_partial_end);
        assert_eq!(last.realized_days, 5);
        assert_eq!(series.excluded.len(), 1);
    }

    #[test]
    fn test_full_periods_above_maximum_are_excluded() {
        let cal = TradingCalendar::always_on();
        let history = d(2024, 1, 1);
        let days = daily(history, d(2024, 3, 31));
        let series = bounded("1M_CAL", Some(28), Some(30))
            .compute_canonical_closes(&days, &ctx(&cal, history), history)
            .unwrap();

        assert_eq!(series.closes.len(), 1);
        assert_eq!(series.closes[0].date, d(2024, 2, 29));
        assert_eq!(series.closes[0].realized_days, 29);
        let excluded: Vec<NaiveDate> = series.excluded.iter().map(|e| e.boundary).collect();
        assert_eq!(excluded, vec![d(2024, 1, 31), d(2024, 3, 31)]);
        assert!(series.excluded[0].reason.contains("exceeds maximum"));
    }

    #[test]
    fn test_iso_week_boundaries() {
        let cal = TradingCalendar::always_on();
        let history = d(2024, 3, 4); // Monday
        let days = daily(history, d(2024, 3, 24));
        let series = strategy("1W_CAL_ISO")
            .compute_canonical_closes(&days, &ctx(&cal, history), history)
            .unwrap();
        assert_eq!(series.closes.len(), 3);
        assert!(series.closes.iter().all(|c| c.date.weekday() == Weekday::Sun));
        assert!(series.closes.iter().all(|c| c.realized_days == 7));
    }

    #[test]
    fn test_empty_input_yields_no_closes() {
        let cal = TradingCalendar::always_on();
        let series = strategy("7D")
            .compute_canonical_closes(&[], &ctx(&cal, d(2024, 1, 1)), d(2024, 1, 1))
            .unwrap();
        assert_eq!(series, CloseSeries::default());
    }
}
