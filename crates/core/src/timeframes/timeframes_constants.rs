//! Static timeframe registry used to seed the dimension table.

use super::timeframes_model::BaseUnit::{Month, Quarter, Week, Year};
use super::timeframes_model::CalendarScheme::{Iso, None as NoScheme, Us};
use super::timeframes_model::{
    AlignmentType, BaseUnit, CalendarAnchor, CalendarScheme, TimeframeDefinition,
};

/// Rolling timeframes: (code, days, canonical).
const ROLLING: &[(&str, i64, bool)] = &[
    ("1D", 1, true),
    ("2D", 2, false),
    ("3D", 3, false),
    ("5D", 5, false),
    ("7D", 7, true),
    ("10D", 10, false),
    ("14D", 14, true),
    ("21D", 21, true),
    ("30D", 30, true),
    ("60D", 60, false),
    ("90D", 90, true),
    ("180D", 180, false),
    ("365D", 365, true),
];

fn rolling(code: &str, days: i64, canonical: bool, sort_order: i32) -> TimeframeDefinition {
    TimeframeDefinition {
        code: code.to_string(),
        base_unit: BaseUnit::Day,
        quantity: days as u32,
        nominal_length_days: days,
        alignment_type: AlignmentType::Rolling,
        calendar_anchor: None,
        calendar_scheme: CalendarScheme::None,
        canonical,
        allow_partial_start: false,
        allow_partial_end: false,
        tf_days_min: Some(days),
        tf_days_max: Some(days),
        is_intraday: false,
        sort_order,
        description: format!("Rolling {}-day window", days),
    }
}

/// Calendar timeframes: (code, unit, quantity, scheme, nominal days, day bounds,
/// canonical, sort order, description).
type CalendarRow = (
    &'static str,
    BaseUnit,
    u32,
    CalendarScheme,
    i64,
    (i64, i64),
    bool,
    i32,
    &'static str,
);

const CALENDAR: &[CalendarRow] = &[
    ("1W_CAL_US", Week, 1, Us, 7, (7, 7), true, 100, "Calendar week ending Saturday"),
    ("1W_CAL_ISO", Week, 1, Iso, 7, (7, 7), false, 101, "ISO calendar week ending Sunday"),
    ("2W_CAL_ISO", Week, 2, Iso, 14, (14, 14), false, 102, "Two ISO weeks ending Sunday"),
    ("1M_CAL", Month, 1, NoScheme, 30, (28, 31), true, 110, "Calendar month"),
    ("3M_CAL", Quarter, 1, NoScheme, 91, (89, 92), true, 111, "Calendar quarter"),
    ("6M_CAL", Month, 6, NoScheme, 182, (181, 184), false, 112, "Calendar half-year"),
    ("12M_CAL", Year, 1, NoScheme, 365, (365, 366), true, 113, "Calendar year"),
];

/// Anchored timeframes keep partial first and last periods.
const ANCHORED: &[CalendarRow] = &[
    ("1W_CAL_ANCHOR_US", Week, 1, Us, 7, (1, 7), true, 200, "Anchored US week"),
    ("1W_CAL_ANCHOR_ISO", Week, 1, Iso, 7, (1, 7), false, 201, "Anchored ISO week"),
    ("1M_CAL_ANCHOR_US", Month, 1, Us, 30, (1, 31), true, 210, "Anchored month"),
    ("3M_CAL_ANCHOR_US", Quarter, 1, Us, 91, (1, 92), false, 211, "Anchored quarter"),
    ("12M_CAL_ANCHOR_US", Year, 1, Us, 365, (1, 366), false, 213, "Anchored year"),
];

fn anchor_for(unit: BaseUnit) -> Option<CalendarAnchor> {
    match unit {
        BaseUnit::Minute | BaseUnit::Hour | BaseUnit::Day => None,
        Week => Some(CalendarAnchor::WeekEnd),
        Month => Some(CalendarAnchor::MonthEnd),
        Quarter => Some(CalendarAnchor::QuarterEnd),
        Year => Some(CalendarAnchor::YearEnd),
    }
}

fn calendar(alignment_type: AlignmentType, row: &CalendarRow) -> TimeframeDefinition {
    let &(code, base_unit, quantity, scheme, nominal, bounds, canonical, sort_order, description) =
        row;
    let partial = alignment_type == AlignmentType::CalendarAnchored;
    TimeframeDefinition {
        code: code.to_string(),
        base_unit,
        quantity,
        nominal_length_days: nominal,
        alignment_type,
        calendar_anchor: anchor_for(base_unit),
        calendar_scheme: scheme,
        canonical,
        allow_partial_start: partial,
        allow_partial_end: partial,
        tf_days_min: Some(bounds.0),
        tf_days_max: Some(bounds.1),
        is_intraday: false,
        sort_order,
        description: description.to_string(),
    }
}

/// Returns the default timeframe registry.
pub fn default_timeframes() -> Vec<TimeframeDefinition> {
    let mut defs: Vec<TimeframeDefinition> = ROLLING
        .iter()
        .enumerate()
        .map(|(i, (code, days, canonical))| rolling(code, *days, *canonical, 10 + i as i32))
        .collect();

    defs.extend(CALENDAR.iter().map(|row| calendar(AlignmentType::Calendar, row)));
    defs.extend(ANCHORED.iter().map(|row| calendar(AlignmentType::CalendarAnchored, row)));
    defs
}
