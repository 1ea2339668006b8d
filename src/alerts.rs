//! Alert-delivery collaborator. The pipeline hands every accepted signal to
//! an `AlertSink`; rendering (HTML, subject lines) is the receiver's concern.

use crate::types::SignalAlert;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn deliver(&self, alert: &SignalAlert) -> Result<()>;
}

/// POSTs the serialized alert to a configured webhook endpoint.
pub struct WebhookSink {
    client: reqwest::Client,
    url: String,
}

impl WebhookSink {
    pub fn new(url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(WebhookSink {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl AlertSink for WebhookSink {
    async fn deliver(&self, alert: &SignalAlert) -> Result<()> {
        let response = self.client.post(&self.url).json(alert).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("webhook returned status {status}"));
        }
        info!(
            symbol = %alert.symbol,
            signal_type = alert.signal_type.label(),
            confidence = alert.confidence,
            "alert delivered"
        );
        Ok(())
    }
}

/// Fallback when no delivery endpoint is configured: signals are still
/// detected and recorded in the log, delivery is simply disabled.
pub struct LogSink;

#[async_trait]
impl AlertSink for LogSink {
    async fn deliver(&self, alert: &SignalAlert) -> Result<()> {
        info!(
            symbol = %alert.symbol,
            signal_type = alert.signal_type.label(),
            direction = ?alert.direction,
            confidence = alert.confidence,
            level = ?alert.level,
            price = alert.last_price,
            factors = %alert.factors.join("; "),
            "signal (delivery disabled)"
        );
        Ok(())
    }
}

pub fn sink_from_config(webhook_url: Option<&str>) -> Result<Arc<dyn AlertSink>> {
    match webhook_url {
        Some(url) if !url.is_empty() => Ok(Arc::new(WebhookSink::new(url)?)),
        _ => {
            warn!("ALERT_WEBHOOK_URL not set, alert delivery disabled");
            Ok(Arc::new(LogSink))
        }
    }
}
