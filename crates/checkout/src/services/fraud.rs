//! Fraud-score service client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use domain::{FraudReport, FraudSnapshot};
use reqwest::Client;
use serde_json::{Value, json};
use tokio::sync::RwLock;

use super::snippet;
use crate::error::CheckoutError;

/// Looks up a phone number's courier delivery history.
#[async_trait]
pub trait FraudScoreService: Send + Sync {
    /// Returns the normalized snapshot for a phone number.
    async fn lookup(&self, phone: &str) -> Result<FraudSnapshot, CheckoutError>;
}

/// HTTP client for the remote fraud-score API.
#[derive(Debug, Clone)]
pub struct HttpFraudScoreService {
    client: Client,
    url: String,
    api_key: Option<String>,
}

impl HttpFraudScoreService {
    /// Creates a client; `timeout` bounds each lookup.
    pub fn new(
        url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, CheckoutError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CheckoutError::FraudService(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
            api_key,
        })
    }
}

#[async_trait]
impl FraudScoreService for HttpFraudScoreService {
    #[tracing::instrument(skip(self, phone))]
    async fn lookup(&self, phone: &str) -> Result<FraudSnapshot, CheckoutError> {
        let mut request = self.client.post(&self.url).json(&json!({ "phone": phone }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| CheckoutError::FraudService(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CheckoutError::FraudService(format!(
                "status {}: {}",
                status.as_u16(),
                snippet(&body)
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| CheckoutError::FraudService(e.to_string()))?;
        // Some deployments wrap the report in `data`.
        let body = match body {
            Value::Object(mut map) if map.contains_key("data") => {
                map.remove("data").unwrap_or(Value::Null)
            }
            other => other,
        };
        let report = FraudReport::from_value(body)
            .map_err(|e| CheckoutError::FraudService(format!("unrecognized report: {e}")))?;

        Ok(report.normalize(Utc::now()))
    }
}

#[derive(Debug, Default)]
struct InMemoryFraudState {
    report: Option<Value>,
    fail: bool,
    lookups: Vec<String>,
}

/// In-memory fraud-score service for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryFraudScoreService {
    state: Arc<RwLock<InMemoryFraudState>>,
}

impl InMemoryFraudScoreService {
    /// Creates a service answering with an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the raw report returned for every lookup.
    pub async fn set_report(&self, report: Value) {
        self.state.write().await.report = Some(report);
    }

    /// Configures lookups to fail.
    pub async fn set_fail(&self, fail: bool) {
        self.state.write().await.fail = fail;
    }

    /// Returns every phone number looked up so far.
    pub async fn lookups(&self) -> Vec<String> {
        self.state.read().await.lookups.clone()
    }
}

#[async_trait]
impl FraudScoreService for InMemoryFraudScoreService {
    async fn lookup(&self, phone: &str) -> Result<FraudSnapshot, CheckoutError> {
        let mut state = self.state.write().await;
        state.lookups.push(phone.to_string());
        if state.fail {
            return Err(CheckoutError::FraudService("simulated failure".into()));
        }

        let report = state
            .report
            .clone()
            .unwrap_or_else(|| json!({ "totalParcels": 0 }));
        let report = FraudReport::from_value(report)?;
        Ok(report.normalize(Utc::now()))
    }
}
