//! Webhook delivery of run alerts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

use emaflow_core::alerts::{AlertSink, Severity};
use emaflow_core::errors::{Error, Result};

const WEBHOOK_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload<'a> {
    pub source: &'static str,
    pub severity: Severity,
    pub message: &'a str,
    pub sent_at: DateTime<Utc>,
}

/// Posts each alert as JSON to a fixed URL.
pub struct WebhookAlertSink {
    client: reqwest::Client,
    url: String,
}

impl WebhookAlertSink {
    pub fn new(url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(WEBHOOK_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::Alert(format!("Failed to initialize HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl AlertSink for WebhookAlertSink {
    async fn send_alert(&self, severity: Severity, message: &str) -> Result<()> {
        let payload = WebhookPayload {
            source: "emaflow",
            severity,
            message,
            sent_at: Utc::now(),
        };

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::Alert(format!("Failed to post alert: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Alert(format!("Webhook rejected alert: {} - {}", status, body)));
        }
        tracing::debug!("Alert delivered to webhook ({})", severity);
        Ok(())
    }
}
