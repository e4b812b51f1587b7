//! Write-only analytics sinks
//!
//! The collector that stores data points is external; this module only
//! defines the seam and a JSON-over-HTTP client for it.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use thiserror::Error;

use crate::analytics::models::AnalyticsRecord;
use crate::config::AnalyticsConfig;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("analytics collector unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("analytics collector returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type SinkResult<T> = Result<T, SinkError>;

#[async_trait]
pub trait AnalyticsSink: Send + Sync {
    /// Submit one data point. Resolves once the collector has accepted or rejected it.
    async fn write_data_point(&self, record: AnalyticsRecord) -> SinkResult<()>;
}

/// Posts each data point as JSON to a collector endpoint
#[derive(Clone)]
pub struct HttpSink {
    endpoint: String,
    token: Option<String>,
    client: Client,
}

impl HttpSink {
    pub fn new(
        endpoint: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("icstrack/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client for analytics collector")?;

        Ok(Self {
            endpoint: endpoint.into(),
            token,
            client,
        })
    }

    /// Build a sink from configuration, or `None` when no endpoint is configured
    pub fn from_config(config: &AnalyticsConfig) -> anyhow::Result<Option<Self>> {
        config
            .endpoint
            .as_deref()
            .map(|endpoint| {
                Self::new(
                    endpoint,
                    config.token.clone(),
                    Duration::from_secs(config.timeout_secs),
                )
            })
            .transpose()
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl AnalyticsSink for HttpSink {
    async fn write_data_point(&self, record: AnalyticsRecord) -> SinkResult<()> {
        let mut request = self.client.post(&self.endpoint).json(&record);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SinkError::Status { status, body });
        }

        Ok(())
    }
}
