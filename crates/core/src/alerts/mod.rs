//! Alerting collaborator used after validation.

mod alerts_model;
mod sink;

pub use alerts_model::{compose_run_alert, Alert, FailedAsset, Severity};
pub use sink::{AlertSink, LogAlertSink, MockAlertSink, NoOpAlertSink};
