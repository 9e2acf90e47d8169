//! services/evaluator/src/adapters/openrouter.rs
//!
//! This module contains the adapter for the grading oracle, an OpenAI-compatible
//! chat-completions endpoint served by OpenRouter. It implements the
//! `GradingOracle` and `OracleBudget` ports from the `core` crate.

use async_trait::async_trait;
use grading_core::{
    evaluation::{OracleRequest, OracleResponse},
    ports::{BudgetStatus, GradingOracle, OracleBudget, PortError, PortResult},
};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::Config;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that talks to OpenRouter over plain HTTPS.
#[derive(Clone)]
pub struct OpenRouterOracle {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    referer: String,
    title: String,
    daily_budget_usd: f64,
}

impl OpenRouterOracle {
    /// Creates a new `OpenRouterOracle`. `timeout` bounds every HTTP exchange.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> PortResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PortError::Unexpected(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            referer: String::new(),
            title: String::new(),
            daily_budget_usd: 20.0,
        })
    }

    /// Builds the adapter from the loaded service configuration.
    pub fn from_config(config: &Config) -> Result<Self, crate::error::EvaluatorError> {
        let api_key = config.require_api_key()?;
        Ok(Self::new(&config.openrouter_base_url, api_key, config.oracle_timeout)?
            .with_attribution(&config.app_referer, &config.app_title)
            .with_daily_budget(config.daily_budget_usd))
    }

    /// Sets the `HTTP-Referer` and `X-Title` headers OpenRouter uses for attribution.
    pub fn with_attribution(
        mut self,
        referer: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        self.referer = referer.into();
        self.title = title.into();
        self
    }

    pub fn with_daily_budget(mut self, limit_usd: f64) -> Self {
        self.daily_budget_usd = limit_usd;
        self
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let builder = builder.bearer_auth(&self.api_key);
        let builder = if self.referer.is_empty() {
            builder
        } else {
            builder.header("HTTP-Referer", &self.referer)
        };
        if self.title.is_empty() {
            builder
        } else {
            builder.header("X-Title", &self.title)
        }
    }

    async fn fetch_daily_usage(&self) -> PortResult<f64> {
        let url = format!("{}/auth/key", self.base_url);
        let response = self
            .authorized(self.client.get(&url))
            .send()
            .await
            .map_err(map_send_error)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PortError::Unavailable {
                status: Some(status.as_u16()),
                body,
            });
        }
        let body: Value = response
            .json()
            .await
            .map_err(|e| PortError::Malformed(e.to_string()))?;
        Ok(body
            .pointer("/data/usage_daily")
            .and_then(Value::as_f64)
            .unwrap_or(0.0))
    }
}

fn map_send_error(err: reqwest::Error) -> PortError {
    if err.is_timeout() {
        PortError::Timeout
    } else {
        PortError::Unavailable {
            status: None,
            body: err.to_string(),
        }
    }
}

//=========================================================================================
// `GradingOracle` Trait Implementation
//=========================================================================================

#[async_trait]
impl GradingOracle for OpenRouterOracle {
    async fn invoke(&self, request: &OracleRequest) -> PortResult<OracleResponse> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(model = %request.model, %url, "Sending chat completion request.");

        let response = self
            .authorized(self.client.post(&url))
            .json(request)
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Grading oracle returned an error status.");
            return Err(PortError::Unavailable {
                status: Some(status.as_u16()),
                body,
            });
        }

        let text = response.text().await.map_err(map_send_error)?;
        serde_json::from_str::<OracleResponse>(&text)
            .map_err(|e| PortError::Malformed(format!("Unreadable completion envelope: {e}")))
    }
}

//=========================================================================================
// `OracleBudget` Trait Implementation
//=========================================================================================

#[async_trait]
impl OracleBudget for OpenRouterOracle {
    /// Fails open: any error reading usage reports the budget as not exceeded.
    async fn check_daily_budget(&self) -> BudgetStatus {
        match self.fetch_daily_usage().await {
            Ok(used_usd) => BudgetStatus {
                exceeded: used_usd >= self.daily_budget_usd,
                used_usd,
                limit_usd: self.daily_budget_usd,
            },
            Err(err) => {
                warn!(error = %err, "Daily budget check failed; allowing request.");
                BudgetStatus {
                    exceeded: false,
                    used_usd: 0.0,
                    limit_usd: self.daily_budget_usd,
                }
            }
        }
    }
}
