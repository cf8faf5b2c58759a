//! Timeframe dimension models.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::constants::{LOOKBACK_NOMINAL_MULTIPLIER, MIN_LOOKBACK_DAYS};
use crate::errors::{ConfigurationError, Error, Result, ValidationError};

/// How the period boundaries of a timeframe are placed.
///
/// The same value is written to the `alignment_source` discriminator column of
/// every EMA row, so it doubles as the producer identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignmentType {
    Rolling,
    Calendar,
    CalendarAnchored,
}

impl AlignmentType {
    pub const ALL: [AlignmentType; 3] = [
        AlignmentType::Rolling,
        AlignmentType::Calendar,
        AlignmentType::CalendarAnchored,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AlignmentType::Rolling => "rolling",
            AlignmentType::Calendar => "calendar",
            AlignmentType::CalendarAnchored => "calendar_anchored",
        }
    }
}

impl fmt::Display for AlignmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlignmentType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "rolling" => Ok(AlignmentType::Rolling),
            "calendar" => Ok(AlignmentType::Calendar),
            "calendar_anchored" => Ok(AlignmentType::CalendarAnchored),
            other => Err(ValidationError::InvalidInput(format!(
                "unknown alignment type '{}'",
                other
            ))
            .into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaseUnit {
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

impl BaseUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            BaseUnit::Minute => "minute",
            BaseUnit::Hour => "hour",
            BaseUnit::Day => "day",
            BaseUnit::Week => "week",
            BaseUnit::Month => "month",
            BaseUnit::Quarter => "quarter",
            BaseUnit::Year => "year",
        }
    }
}

impl FromStr for BaseUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "minute" => Ok(BaseUnit::Minute),
            "hour" => Ok(BaseUnit::Hour),
            "day" => Ok(BaseUnit::Day),
            "week" => Ok(BaseUnit::Week),
            "month" => Ok(BaseUnit::Month),
            "quarter" => Ok(BaseUnit::Quarter),
            "year" => Ok(BaseUnit::Year),
            other => {
                Err(ValidationError::InvalidInput(format!("unknown base unit '{}'", other)).into())
            }
        }
    }
}

/// Calendar boundary a calendar-aligned timeframe closes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalendarAnchor {
    WeekEnd,
    MonthEnd,
    QuarterEnd,
    YearEnd,
}

impl CalendarAnchor {
    pub fn as_str(&self) -> &'static str {
        match self {
            CalendarAnchor::WeekEnd => "week_end",
            CalendarAnchor::MonthEnd => "month_end",
            CalendarAnchor::QuarterEnd => "quarter_end",
            CalendarAnchor::YearEnd => "year_end",
        }
    }
}

impl FromStr for CalendarAnchor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "week_end" => Ok(CalendarAnchor::WeekEnd),
            "month_end" => Ok(CalendarAnchor::MonthEnd),
            "quarter_end" => Ok(CalendarAnchor::QuarterEnd),
            "year_end" => Ok(CalendarAnchor::YearEnd),
            other => Err(ValidationError::InvalidInput(format!(
                "unknown calendar anchor '{}'",
                other
            ))
            .into()),
        }
    }
}

/// Week convention. US weeks end on Saturday, ISO weeks on Sunday.
/// Month, quarter and year boundaries are the same under every scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CalendarScheme {
    #[serde(rename = "US")]
    Us,
    #[serde(rename = "ISO")]
    Iso,
    #[default]
    #[serde(rename = "none")]
    None,
}

impl CalendarScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            CalendarScheme::Us => "US",
            CalendarScheme::Iso => "ISO",
            CalendarScheme::None => "none",
        }
    }
}

impl FromStr for CalendarScheme {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "US" => Ok(CalendarScheme::Us),
            "ISO" => Ok(CalendarScheme::Iso),
            "none" | "" => Ok(CalendarScheme::None),
            other => Err(ValidationError::InvalidInput(format!(
                "unknown calendar scheme '{}'",
                other
            ))
            .into()),
        }
    }
}

/// One entry of the timeframe registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeframeDefinition {
    pub code: String,
    pub base_unit: BaseUnit,
    pub quantity: u32,
    pub nominal_length_days: i64,
    pub alignment_type: AlignmentType,
    pub calendar_anchor: Option<CalendarAnchor>,
    pub calendar_scheme: CalendarScheme,
    pub canonical: bool,
    pub allow_partial_start: bool,
    pub allow_partial_end: bool,
    pub tf_days_min: Option<i64>,
    pub tf_days_max: Option<i64>,
    pub is_intraday: bool,
    pub sort_order: i32,
    pub description: String,
}

impl TimeframeDefinition {
    /// Checks the structural invariants of a definition.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| -> Error {
            ConfigurationError::InvalidTimeframe {
                code: self.code.clone(),
                reason,
            }
            .into()
        };

        if self.code.trim().is_empty() {
            return Err(invalid("code must not be empty".to_string()));
        }
        if self.quantity == 0 {
            return Err(invalid("quantity must be at least 1".to_string()));
        }
        if self.nominal_length_days < 1 {
            return Err(invalid("nominal_length_days must be at least 1".to_string()));
        }
        if let Some(min) = self.tf_days_min {
            if min < 1 || self.nominal_length_days < min {
                return Err(invalid(format!(
                    "nominal length {} is below tf_days_min {}",
                    self.nominal_length_days, min
                )));
            }
        }
        if let Some(max) = self.tf_days_max {
            if self.nominal_length_days > max {
                return Err(invalid(format!(
                    "nominal length {} exceeds tf_days_max {}",
                    self.nominal_length_days, max
                )));
            }
        }

        match (self.alignment_type, self.calendar_anchor) {
            (AlignmentType::Rolling, Some(_)) => {
                return Err(invalid("rolling timeframes take no calendar anchor".to_string()))
            }
            (AlignmentType::Calendar | AlignmentType::CalendarAnchored, None) => {
                return Err(invalid("calendar timeframes require a calendar anchor".to_string()))
            }
            (_, Some(CalendarAnchor::MonthEnd)) if 12 % self.quantity != 0 => {
                return Err(invalid(format!(
                    "{} months do not divide a year",
                    self.quantity
                )))
            }
            (_, Some(CalendarAnchor::QuarterEnd)) if 4 % self.quantity != 0 => {
                return Err(invalid(format!(
                    "{} quarters do not divide a year",
                    self.quantity
                )))
            }
            _ => {}
        }

        Ok(())
    }

    /// Default dirty-window lookback for this timeframe, in days.
    pub fn default_lookback_days(&self) -> i64 {
        (LOOKBACK_NOMINAL_MULTIPLIER * self.nominal_length_days).max(MIN_LOOKBACK_DAYS)
    }
}
