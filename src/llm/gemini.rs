use super::{LlmProvider, Prompt};
use crate::common::config::{api_key, Config, GEMINI_API_KEY_ENV};
use crate::common::constants::GEMINI_BASE_URL;
use crate::common::error::{Result, ScraperError};
use crate::rate_limiter::{Limits, RateLimiter};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

const PROVIDER: &str = "gemini";
const TEMPERATURE: f32 = 0.2;

pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_output_tokens: u32,
    limiter: RateLimiter,
}

impl GeminiProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, max_output_tokens: u32) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: GEMINI_BASE_URL.to_string(),
            model: model.into(),
            max_output_tokens,
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
            ..Self::new(
                api_key(GEMINI_API_KEY_ENV)?,
                config.llm.gemini_model.clone(),
                config.llm.gemini_max_output_tokens,
            )
        })
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// `generateContent` body. Gemini has no system role on `v1`, so a
    /// system text is prepended to the user turn.
    pub fn request_body(&self, prompt: &Prompt) -> Value {
        let text = match &prompt.system {
            Some(system) => format!("{}\n\n{}", system, prompt.user),
            None => prompt.user.clone(),
        };
        json!({
            "contents": [{"role": "user", "parts": [{"text": text}]}],
            "generationConfig": {
                "temperature": TEMPERATURE,
                "maxOutputTokens": self.max_output_tokens,
            }
        })
    }
}

/// Text of the first candidate's first part.
pub fn candidate_text(response: &Value) -> Result<String> {
    response
        .pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ScraperError::llm(PROVIDER, "invalid response structure"))
}

#[async_trait::async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn model(&self) -> String {
        self.model.clone()
    }

    async fn complete(&self, prompt: &Prompt) -> Result<String> {
        let _permit = self.limiter.acquire().await;
        debug!(model = %self.model, "sending generateContent");
        let response = self
            .client
            .post(format!("{}/models/{}:generateContent", self.base_url, self.model))
            .query(&[("key", self.api_key.as_str())])
            .json(&self.request_body(prompt))
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            let preview: String = body.chars().take(100).collect();
            return Err(ScraperError::llm(
                PROVIDER,
                format!("API request failed with status code {}: {}", status, preview),
            ));
        }
        let data: Value = serde_json::from_str(&body)
            .map_err(|e| ScraperError::llm(PROVIDER, format!("invalid JSON in API response: {}", e)))?;
        candidate_text(&data)
    }
}
