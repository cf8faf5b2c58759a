use chrono::{Duration, Utc};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::Arc;

use super::validation_model::{expected_count, ValidationReport, ValidationResult, ValidationStatus};
use super::validation_traits::ValidationAuditStore;
use crate::alerts::{compose_run_alert, AlertSink, FailedAsset};
use crate::bars::BarStore;
use crate::errors::Result;
use crate::timeframes::TimeframeServiceTrait;
use crate::unified::UnifiedEmaStore;

/// Row-count checks over the unified table, plus the run alert.
///
/// Purely observational: nothing here blocks or undoes a refresh.
pub struct ValidationService {
    bar_store: Arc<dyn BarStore>,
    unified_store: Arc<dyn UnifiedEmaStore>,
    timeframe_service: Arc<dyn TimeframeServiceTrait>,
    audit_store: Option<Arc<dyn ValidationAuditStore>>,
    alert_sink: Arc<dyn AlertSink>,
}

impl ValidationService {
    pub fn new(
        bar_store: Arc<dyn BarStore>,
        unified_store: Arc<dyn UnifiedEmaStore>,
        timeframe_service: Arc<dyn TimeframeServiceTrait>,
        alert_sink: Arc<dyn AlertSink>,
    ) -> Self {
        Self {
            bar_store,
            unified_store,
            timeframe_service,
            audit_store: None,
            alert_sink,
        }
    }

    pub fn with_audit_store(mut self, audit_store: Arc<dyn ValidationAuditStore>) -> Self {
        self.audit_store = Some(audit_store);
        self
    }

    /// Compares canonical row counts against the expected number of periods
    /// for every series of the given assets (all unified assets when empty).
    pub fn validate(&self, run_id: &str, asset_ids: &[String]) -> Result<ValidationReport> {
        let asset_ids = if asset_ids.is_empty() {
            self.unified_store.list_asset_ids()?
        } else {
            asset_ids.to_vec()
        };

        let mut nominal_days: HashMap<String, Option<i64>> = HashMap::new();
        let mut results = Vec::new();

        for asset_id in &asset_ids {
            let Some(bounds) = self.bar_store.get_bar_bounds(asset_id)? else {
                debug!("No source bars for {}, nothing to validate", asset_id);
                continue;
            };
            // Through the end of the last bar's day: a window closing on that
            // day is complete.
            let end = bounds.last + Duration::days(1);
            for count in self
                .unified_store
                .count_canonical(asset_id, bounds.first, end)?
            {
                let nominal = match nominal_days.get(&count.timeframe_code) {
                    Some(n) => *n,
                    None => {
                        let n = match self
                            .timeframe_service
                            .get_nominal_days(&count.timeframe_code)
                        {
                            Ok(n) => Some(n),
                            Err(e) => {
                                warn!("Skipping validation of {}: {}", count.timeframe_code, e);
                                None
                            }
                        };
                        nominal_days.insert(count.timeframe_code.clone(), n);
                        n
                    }
                };
                let Some(nominal) = nominal else {
                    continue;
                };
                let expected = expected_count(bounds.first, end, nominal);
                results.push(ValidationResult {
                    asset_id: count.asset_id,
                    timeframe_code: count.timeframe_code,
                    period: count.period,
                    alignment_source: count.alignment_source,
                    expected_count: expected,
                    actual_count: count.count,
                    status: ValidationStatus::classify(expected, count.count),
                });
            }
        }

        let report = ValidationReport {
            run_id: run_id.to_string(),
            checked_at: Utc::now(),
            results,
        };
        info!(
            "Validated {} series: {} OK, {} GAP, {} DUPLICATE",
            report.results.len(),
            report.count(ValidationStatus::Ok),
            report.count(ValidationStatus::Gap),
            report.count(ValidationStatus::Duplicate)
        );
        Ok(report)
    }

    /// Appends a report to the audit log when one is configured.
    pub async fn record(&self, report: &ValidationReport) -> Result<usize> {
        match &self.audit_store {
            Some(store) => {
                store
                    .append_results(&report.run_id, report.checked_at, report.results.clone())
                    .await
            }
            None => Ok(0),
        }
    }

    /// Validates, audits and alerts. Failures are logged, never returned.
    pub async fn validate_and_alert(
        &self,
        run_id: &str,
        asset_ids: &[String],
        failures: &[FailedAsset],
        validate: bool,
        alert: bool,
    ) -> Option<ValidationReport> {
        let report = if validate {
            match self.validate(run_id, asset_ids) {
                Ok(report) => Some(report),
                Err(e) => {
                    warn!("Validation of run {} failed: {}", run_id, e);
                    None
                }
            }
        } else {
            None
        };

        if let Some(report) = &report {
            if let Err(e) = self.record(report).await {
                warn!("Could not append validation audit for run {}: {}", run_id, e);
            }
        }

        if alert {
            if let Some(run_alert) = compose_run_alert(run_id, report.as_ref(), failures) {
                if let Err(e) = self
                    .alert_sink
                    .send_alert(run_alert.severity, &run_alert.message)
                    .await
                {
                    warn!("Alert for run {} not delivered: {}", run_id, e);
                }
            }
        }

        report
    }
}
