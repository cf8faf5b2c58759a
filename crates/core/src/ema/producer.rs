//! EMA recurrence shared by every alignment strategy.

use chrono::{DateTime, NaiveDate, Utc};

use super::ema_model::{CanonicalClose, CloseSeries, DailyClose, EmaRow, EmaSeed};
use crate::refresh_state::RefreshKey;
use crate::utils::time_utils::date_to_utc;

/// Smoothing factor for an EMA of `period` observations.
pub fn alpha(period: u32) -> f64 {
    2.0 / (f64::from(period.max(1)) + 1.0)
}

#[derive(Debug, Clone, Copy)]
struct Last {
    date: NaiveDate,
    ema: f64,
    derivative_1: Option<f64>,
}

/// Builds the rows of one series from its canonical closes.
///
/// Canonical closes advance the recurrence. Every bar on or after `from` that
/// is not itself a canonical close yields an interim row measured against the
/// latest canonical observation before it; interim rows never feed back into
/// the recurrence. Output is ordered by timestamp.
pub fn compute_ema(
    key: &RefreshKey,
    series: &CloseSeries,
    days: &[DailyClose],
    seed: Option<EmaSeed>,
    from: NaiveDate,
    computed_at: DateTime<Utc>,
) -> Vec<EmaRow> {
    let a = alpha(key.period);
    let mut last = seed.map(|s| Last {
        date: s.timestamp.date_naive(),
        ema: s.ema_value,
        derivative_1: s.derivative_1,
    });

    let row = |timestamp: NaiveDate,
               ema: f64,
               d1: Option<f64>,
               d2: Option<f64>,
               close: f64,
               canonical: Option<&CanonicalClose>| EmaRow {
        asset_id: key.asset_id.clone(),
        timestamp: date_to_utc(timestamp),
        timeframe_code: key.timeframe_code.clone(),
        period: key.period,
        alignment_source: key.alignment_source,
        ema_value: ema,
        derivative_1: d1,
        derivative_2: d2,
        close_value: close,
        is_canonical_close: canonical.is_some(),
        window_start: canonical.map(|c| c.window_start),
        realized_days: canonical.map(|c| c.realized_days),
        is_partial_start: canonical.is_some_and(|c| c.is_partial_start),
        is_partial_end: canonical.is_some_and(|c| c.is_partial_end),
        write_seq: 0,
        computed_at,
    };

    let mut rows = Vec::with_capacity(days.len() + series.closes.len());
    let emit_canonical = |close: &CanonicalClose, last: &mut Option<Last>, rows: &mut Vec<EmaRow>| {
        let (ema, d1, d2) = match last {
            None => (close.close, None, None),
            Some(prev) => {
                let ema = a * close.close + (1.0 - a) * prev.ema;
                let d1 = ema - prev.ema;
                let d2 = prev.derivative_1.map(|p| d1 - p);
                (ema, Some(d1), d2)
            }
        };
        rows.push(row(close.date, ema, d1, d2, close.close, Some(close)));
        *last = Some(Last {
            date: close.date,
            ema,
            derivative_1: d1,
        });
    };

    let mut pending = series.closes.iter().peekable();
    for day in days.iter().filter(|d| d.date >= from) {
        while let Some(close) = pending.next_if(|c| c.date <= day.date) {
            emit_canonical(close, &mut last, &mut rows);
        }
        let Some(prev) = last else {
            continue;
        };
        if prev.date == day.date {
            continue;
        }
        let ema = a * day.close + (1.0 - a) * prev.ema;
        let d1 = ema - prev.ema;
        let d2 = prev.derivative_1.map(|p| d1 - p);
        rows.push(row(day.date, ema, Some(d1), d2, day.close, None));
    }
    for close in pending {
        emit_canonical(close, &mut last, &mut rows);
    }

    rows
}
