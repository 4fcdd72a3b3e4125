use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("API error: {message}")]
    Api { message: String },

    #[error("Environment variable error: {0}")]
    Env(#[from] std::env::VarError),

    #[error("{provider} request failed: {message}")]
    Llm { provider: String, message: String },

    #[error("Token quota exceeded for every model (last tried: {model})")]
    QuotaExceeded { model: String },

    #[error("JSON repair failed: {0}")]
    Repair(String),

    #[error("Validation failed: {0}")]
    Validation(String),
}

impl ScraperError {
    pub fn llm(provider: &str, message: impl Into<String>) -> Self {
        ScraperError::Llm {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    /// Whether the pipeline may try the same item again after this error.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            ScraperError::QuotaExceeded { .. } | ScraperError::Config(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ScraperError>;
