//! Alert sink trait and in-process implementations.

use async_trait::async_trait;
use log::{error, info, warn};
use std::sync::{Arc, Mutex};

use super::alerts_model::{Alert, Severity};
use crate::errors::{Error, Result};

/// Receives the aggregated alert of a run.
///
/// Delivery is best-effort: callers log a returned error and move on.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn send_alert(&self, severity: Severity, message: &str) -> Result<()>;
}

/// Discards every alert.
#[derive(Clone, Default)]
pub struct NoOpAlertSink;

#[async_trait]
impl AlertSink for NoOpAlertSink {
    async fn send_alert(&self, _severity: Severity, _message: &str) -> Result<()> {
        Ok(())
    }
}

/// Writes alerts to the log at a level matching their severity.
#[derive(Clone, Default)]
pub struct LogAlertSink;

#[async_trait]
impl AlertSink for LogAlertSink {
    async fn send_alert(&self, severity: Severity, message: &str) -> Result<()> {
        match severity {
            Severity::Info => info!("[ALERT {}] {}", severity, message),
            Severity::Warning => warn!("[ALERT {}] {}", severity, message),
            Severity::Error | Severity::Critical => error!("[ALERT {}] {}", severity, message),
        }
        Ok(())
    }
}

/// Mock sink for testing - collects alerts, optionally failing every call.
#[derive(Clone, Default)]
pub struct MockAlertSink {
    alerts: Arc<Mutex<Vec<Alert>>>,
    fail: bool,
}

impl MockAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that records nothing and reports every delivery as failed.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn len(&self) -> usize {
        self.alerts.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.lock().unwrap_or_else(|e| e.into_inner()).is_empty()
    }
}

#[async_trait]
impl AlertSink for MockAlertSink {
    async fn send_alert(&self, severity: Severity, message: &str) -> Result<()> {
        if self.fail {
            return Err(Error::Alert("mock sink configured to fail".to_string()));
        }
        self.alerts.lock().unwrap_or_else(|e| e.into_inner()).push(Alert {
            severity,
            message: message.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_and_log_sinks_accept_alerts() {
        NoOpAlertSink
            .send_alert(Severity::Warning, "gap")
            .await
            .unwrap();
        LogAlertSink
            .send_alert(Severity::Error, "asset failed")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_mock_sink_collects_alerts() {
        let sink = MockAlertSink::new();
        assert!(sink.is_empty());
        sink.send_alert(Severity::Warning, "one").await.unwrap();
        sink.send_alert(Severity::Error, "two").await.unwrap();
        assert_eq!(sink.len(), 2);
        assert_eq!(sink.alerts()[1].severity, Severity::Error);
    }

    #[tokio::test]
    async fn test_failing_mock_sink() {
        let sink = MockAlertSink::failing();
        assert!(sink.send_alert(Severity::Warning, "x").await.is_err());
        assert!(sink.is_empty());
    }
}
