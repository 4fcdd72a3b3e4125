use super::chat::{first_choice_content, ChatRequest};
use super::{LlmProvider, Prompt};
use crate::common::config::{api_key, Config, CEREBRAS_API_KEY_ENV};
use crate::common::constants::CEREBRAS_BASE_URL;
use crate::common::error::{Result, ScraperError};
use crate::rate_limiter::{Limits, RateLimiter};
use reqwest::header;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, error, info, warn};

const PROVIDER: &str = "cerebras";

/// Round-robin over a model list. The position survives across requests so
/// a model that ran out of quota is not retried first on the next item.
#[derive(Debug)]
pub struct ModelRotation {
    models: Vec<String>,
    current: AtomicUsize,
}

impl ModelRotation {
    pub fn new(models: Vec<String>) -> Result<Self> {
        if models.is_empty() {
            return Err(ScraperError::Config("model rotation needs at least one model".into()));
        }
        Ok(Self {
            models,
            current: AtomicUsize::new(0),
        })
    }

    pub fn index(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }

    pub fn current(&self) -> &str {
        &self.models[self.index() % self.models.len()]
    }

    /// Moves to the next model. Returns `None` once the rotation is back at
    /// `started_at`, meaning every model has been tried.
    pub fn advance(&self, started_at: usize) -> Option<&str> {
        let next = (self.index() + 1) % self.models.len();
        self.current.store(next, Ordering::SeqCst);
        if next == started_at {
            None
        } else {
            Some(&self.models[next])
        }
    }
}

pub fn is_quota_exceeded(status: reqwest::StatusCode, body: &str) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS && body.contains("token_quota_exceeded")
}

pub struct CerebrasProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    temperature: f32,
    rotation: ModelRotation,
    rotation_pause: Duration,
    limiter: RateLimiter,
}

impl CerebrasProvider {
    pub fn new(api_key: impl Into<String>, models: Vec<String>, temperature: f32) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: CEREBRAS_BASE_URL.to_string(),
            temperature,
            rotation: ModelRotation::new(models)?,
            rotation_pause: Duration::from_secs(2),
            limiter: RateLimiter::unlimited(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let provider = Self::new(
            api_key(CEREBRAS_API_KEY_ENV)?,
            config.llm.cerebras_models.clone(),
            config.llm.temperature,
        )?
        .with_limiter(RateLimiter::new(Limits::per_minute(
            config.rate_limits.llm_requests_per_min,
        )));
        let timeout = Duration::from_secs(config.rate_limits.request_timeout_seconds);
        Ok(Self {
            client: reqwest::Client::builder().timeout(timeout).build()?,
            ..provider
        })
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn with_rotation_pause(mut self, pause: Duration) -> Self {
        self.rotation_pause = pause;
        self
    }

    async fn send(&self, model: &str, prompt: &Prompt) -> Result<String> {
        let _permit = self.limiter.acquire().await;
        let request = ChatRequest::new(model, prompt, Some(self.temperature));
        debug!(model, "sending chat completion");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;

        if is_quota_exceeded(status, &body) {
            return Err(ScraperError::QuotaExceeded {
                model: model.to_string(),
            });
        }
        if !status.is_success() {
            return Err(ScraperError::llm(PROVIDER, format!("{}: {}", status, body)));
        }
        first_choice_content(PROVIDER, &body)
    }
}

#[async_trait::async_trait]
impl LlmProvider for CerebrasProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn model(&self) -> String {
        self.rotation.current().to_string()
    }

    async fn complete(&self, prompt: &Prompt) -> Result<String> {
        let started_at = self.rotation.index();
        loop {
            let model = self.rotation.current().to_string();
            info!("Attempting to use model: {}", model);
            match self.send(&model, prompt).await {
                Err(ScraperError::QuotaExceeded { .. }) => {
                    warn!("Token quota exceeded for model {}. Rotating to the next model.", model);
                    if self.rotation.advance(started_at).is_none() {
                        error!("All models have exceeded their token quotas");
                        return Err(ScraperError::QuotaExceeded { model });
                    }
                    if !self.rotation_pause.is_zero() {
                        tokio::time::sleep(self.rotation_pause).await;
                    }
                }
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn models() -> Vec<String> {
        vec!["a".into(), "b".into(), "c".into()]
    }

    #[test]
    fn rotation_stops_after_full_cycle() {
        let rotation = ModelRotation::new(models()).unwrap();
        let start = rotation.index();
        assert_eq!(rotation.current(), "a");
        assert_eq!(rotation.advance(start), Some("b"));
        assert_eq!(rotation.advance(start), Some("c"));
        assert_eq!(rotation.advance(start), None);
        assert_eq!(rotation.current(), "a");
    }

    #[test]
    fn rotation_position_is_kept_between_items() {
        let rotation = ModelRotation::new(models()).unwrap();
        rotation.advance(0);
        let start = rotation.index();
        assert_eq!(rotation.current(), "b");
        assert_eq!(rotation.advance(start), Some("c"));
        assert_eq!(rotation.advance(start), Some("a"));
        assert_eq!(rotation.advance(start), None);
    }

    #[test]
    fn empty_model_list_is_a_config_error() {
        assert!(matches!(
            ModelRotation::new(Vec::new()),
            Err(ScraperError::Config(_))
        ));
    }

    #[test]
    fn only_token_quota_429s_rotate() {
        let body = r#"{"message":"Tokens per day limit exceeded","code":"token_quota_exceeded"}"#;
        assert!(is_quota_exceeded(reqwest::StatusCode::TOO_MANY_REQUESTS, body));
        assert!(!is_quota_exceeded(reqwest::StatusCode::TOO_MANY_REQUESTS, "rate limited"));
        assert!(!is_quota_exceeded(reqwest::StatusCode::BAD_REQUEST, body));
    }
}
