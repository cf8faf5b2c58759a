//! Alert severity and run-level alert composition.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::ALERT_MAX_LISTED_ISSUES;
use crate::validation::ValidationReport;

/// Ordered from lowest to highest: Info < Warning < Error < Critical.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    #[default]
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single aggregated notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub severity: Severity,
    pub message: String,
}

/// An asset that failed during a run, with the error text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedAsset {
    pub asset_id: String,
    pub error_kind: String,
    pub error: String,
}

/// Builds the one alert of a run, or None when there is nothing to report.
///
/// Failed assets raise the severity to `Error`; validation mismatches alone
/// are a `Warning`.
pub fn compose_run_alert(
    run_id: &str,
    report: Option<&ValidationReport>,
    failures: &[FailedAsset],
) -> Option<Alert> {
    let mismatches: Vec<_> = report
        .map(|r| r.mismatches().collect())
        .unwrap_or_default();
    if mismatches.is_empty() && failures.is_empty() {
        return None;
    }

    let severity = if failures.is_empty() {
        Severity::Warning
    } else {
        Severity::Error
    };

    let mut lines = vec![format!(
        "EMA refresh run {}: {} failed asset(s), {} validation mismatch(es)",
        run_id,
        failures.len(),
        mismatches.len()
    )];
    for failure in failures.iter().take(ALERT_MAX_LISTED_ISSUES) {
        lines.push(format!(
            "  FAILED {} [{}]: {}",
            failure.asset_id, failure.error_kind, failure.error
        ));
    }
    for mismatch in mismatches.iter().take(ALERT_MAX_LISTED_ISSUES) {
        lines.push(format!("  {}", mismatch));
    }
    let listed = failures.len().min(ALERT_MAX_LISTED_ISSUES)
        + mismatches.len().min(ALERT_MAX_LISTED_ISSUES);
    let total = failures.len() + mismatches.len();
    if total > listed {
        lines.push(format!("  ... and {} more", total - listed));
    }

    Some(Alert {
        severity,
        message: lines.join("\n"),
    })
}
