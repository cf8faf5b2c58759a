//! Row-count validation models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::{Error, ValidationError};
use crate::timeframes::AlignmentType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationStatus {
    Ok,
    Gap,
    Duplicate,
}

impl ValidationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationStatus::Ok => "OK",
            ValidationStatus::Gap => "GAP",
            ValidationStatus::Duplicate => "DUPLICATE",
        }
    }

    pub fn classify(expected: i64, actual: i64) -> Self {
        match actual.cmp(&expected) {
            std::cmp::Ordering::Equal => ValidationStatus::Ok,
            std::cmp::Ordering::Less => ValidationStatus::Gap,
            std::cmp::Ordering::Greater => ValidationStatus::Duplicate,
        }
    }
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValidationStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OK" => Ok(ValidationStatus::Ok),
            "GAP" => Ok(ValidationStatus::Gap),
            "DUPLICATE" => Ok(ValidationStatus::Duplicate),
            other => Err(ValidationError::InvalidInput(format!(
                "unknown validation status '{}'",
                other
            ))
            .into()),
        }
    }
}

/// Number of full nominal periods between two instants.
pub fn expected_count(start: DateTime<Utc>, end: DateTime<Utc>, nominal_length_days: i64) -> i64 {
    if nominal_length_days <= 0 {
        return 0;
    }
    ((end - start).num_days() / nominal_length_days).max(0)
}

/// Outcome of checking one series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub asset_id: String,
    pub timeframe_code: String,
    pub period: u32,
    pub alignment_source: AlignmentType,
    pub expected_count: i64,
    pub actual_count: i64,
    pub status: ValidationStatus,
}

impl ValidationResult {
    pub fn is_ok(&self) -> bool {
        self.status == ValidationStatus::Ok
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}/p{} ({}): expected {}, found {}",
            self.status,
            self.asset_id,
            self.period,
            self.timeframe_code,
            self.expected_count,
            self.actual_count
        )
    }
}

/// Results of one validation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub run_id: String,
    pub checked_at: DateTime<Utc>,
    pub results: Vec<ValidationResult>,
}

impl ValidationReport {
    pub fn mismatches(&self) -> impl Iterator<Item = &ValidationResult> {
        self.results.iter().filter(|r| !r.is_ok())
    }

    pub fn count(&self, status: ValidationStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    pub fn is_clean(&self) -> bool {
        self.results.iter().all(ValidationResult::is_ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_expected_count() {
        // 99 days between the first and the hundredth daily bar.
        assert_eq!(expected_count(ts(2024, 1, 1), ts(2024, 4, 9), 7), 14);
        assert_eq!(expected_count(ts(2024, 1, 1), ts(2024, 1, 7), 7), 0);
        assert_eq!(expected_count(ts(2024, 1, 1), ts(2024, 1, 8), 7), 1);
        assert_eq!(expected_count(ts(2024, 1, 1), ts(2024, 12, 31), 30), 12);
    }

    #[test]
    fn test_expected_count_degenerate_ranges() {
        assert_eq!(expected_count(ts(2024, 2, 1), ts(2024, 1, 1), 7), 0);
        assert_eq!(expected_count(ts(2024, 1, 1), ts(2024, 2, 1), 0), 0);
    }

    #[test]
    fn test_classify() {
        assert_eq!(ValidationStatus::classify(14, 14), ValidationStatus::Ok);
        assert_eq!(ValidationStatus::classify(14, 13), ValidationStatus::Gap);
        assert_eq!(ValidationStatus::classify(14, 15), ValidationStatus::Duplicate);
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            ValidationStatus::Ok,
            ValidationStatus::Gap,
            ValidationStatus::Duplicate,
        ] {
            assert_eq!(status.as_str().parse::<ValidationStatus>().unwrap(), status);
        }
        assert!("MISSING".parse::<ValidationStatus>().is_err());
    }
}
