use super::chat::{first_choice_content, ChatRequest};
use super::{LlmProvider, Prompt};
use crate::common::config::{api_key, Config, PERPLEXITY_API_KEY_ENV};
use crate::common::constants::PERPLEXITY_BASE_URL;
use crate::common::error::{Result, ScraperError};
use crate::rate_limiter::{Limits, RateLimiter};
use reqwest::header;
use std::time::Duration;
use tracing::debug;

const PROVIDER: &str = "perplexity";

pub const SYSTEM_MESSAGE: &str = "You are an AI assistant that provides structured JSON data.";

/// Search-backed completions. Every request carries the fixed system
/// message unless the prompt brings its own.
pub struct PerplexityProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    limiter: RateLimiter,
}

impl PerplexityProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: PERPLEXITY_BASE_URL.to_string(),
            model: model.into(),
            limiter: RateLimiter::unlimited(),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.rate_limits.request_timeout_seconds))
            .build()?;
        Ok(Self {
            client,
            limiter: RateLimiter::new(Limits::per_minute(config.rate_limits.llm_requests_per_min)),
            ..Self::new(api_key(PERPLEXITY_API_KEY_ENV)?, config.llm.perplexity_model.clone())
        })
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[async_trait::async_trait]
impl LlmProvider for PerplexityProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn model(&self) -> String {
        self.model.clone()
    }

    async fn complete(&self, prompt: &Prompt) -> Result<String> {
        let _permit = self.limiter.acquire().await;
        let mut prompt = prompt.clone();
        if prompt.system.is_none() {
            prompt.system = Some(SYSTEM_MESSAGE.to_string());
        }
        let request = ChatRequest::new(&self.model, &prompt, None);
        debug!(model = %self.model, "sending chat completion");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header(header::ACCEPT, "application/json")
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ScraperError::llm(PROVIDER, format!("{}: {}", status, body)));
        }
        first_choice_content(PROVIDER, &body)
    }
}
