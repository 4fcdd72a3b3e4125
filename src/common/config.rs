use crate::common::constants::{
    DEFAULT_CEREBRAS_MODELS, DEFAULT_GEMINI_MODEL, DEFAULT_PERPLEXITY_MODEL,
};
use crate::common::error::{Result, ScraperError};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub rate_limits: RateLimitsConfig,
    pub llm: LlmConfig,
    pub proxy: ProxyConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub output_dir: PathBuf,
    pub debug_dir: PathBuf,
    pub unparsable_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            debug_dir: PathBuf::from("debug"),
            unparsable_dir: PathBuf::from("enrichment_output/unparsable_enrichment_results"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitsConfig {
    pub scrape_requests_per_min: Option<u64>,
    pub scrape_delay_ms: u64,
    pub llm_requests_per_min: Option<u64>,
    pub llm_delay_ms: u64,
    pub request_timeout_seconds: u64,
}

impl Default for RateLimitsConfig {
    fn default() -> Self {
        Self {
            scrape_requests_per_min: Some(60),
            scrape_delay_ms: 1000,
            llm_requests_per_min: Some(30),
            llm_delay_ms: 1000,
            request_timeout_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub cerebras_models: Vec<String>,
    pub temperature: f32,
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
    pub perplexity_model: String,
    pub gemini_model: String,
    pub gemini_max_output_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            cerebras_models: DEFAULT_CEREBRAS_MODELS.iter().map(|m| m.to_string()).collect(),
            temperature: 0.1,
            max_attempts: 3,
            retry_delay_ms: 2000,
            perplexity_model: DEFAULT_PERPLEXITY_MODEL.to_string(),
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            gemini_max_output_tokens: 1024,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProxyProvider {
    #[default]
    None,
    ScraperApi,
    ScrapingBee,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub provider: ProxyProvider,
    pub wait_ms: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            provider: ProxyProvider::None,
            wait_ms: 10_000,
        }
    }
}

impl Config {
    /// Loads `config.toml` from the working directory, falling back to
    /// defaults when the file does not exist.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(DEFAULT_CONFIG_PATH))
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::default());
        }
        let config_content = fs::read_to_string(config_path).map_err(|e| {
            ScraperError::Config(format!(
                "Failed to read config file '{}': {}",
                config_path.display(),
                e
            ))
        })?;

        let config: Config = toml::from_str(&config_content)?;
        if config.llm.cerebras_models.is_empty() {
            return Err(ScraperError::Config(
                "llm.cerebras_models must list at least one model".into(),
            ));
        }
        Ok(config)
    }
}

/// Reads a secret from the environment (after `.env` has been loaded).
pub fn api_key(var: &str) -> Result<String> {
    match std::env::var(var) {
        Ok(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(ScraperError::Config(format!("{} is not set", var))),
    }
}

pub const CEREBRAS_API_KEY_ENV: &str = "CEREBRAS_API_KEY";
pub const PERPLEXITY_API_KEY_ENV: &str = "PERPLEXITY_API_KEY";
pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";
pub const SCRAPERAPI_KEY_ENV: &str = "SCRAPERAPI_KEY";
pub const SCRAPINGBEE_KEY_ENV: &str = "SCRAPINGBEE_KEY";
