//! LLM providers behind one async trait.

pub mod cerebras;
pub mod chat;
pub mod gemini;
pub mod perplexity;

use crate::common::error::Result;

pub use cerebras::CerebrasProvider;
pub use gemini::GeminiProvider;
pub use perplexity::PerplexityProvider;

/// A single-turn request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Prompt {
    pub system: Option<String>,
    pub user: String,
}

impl Prompt {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            system: None,
            user: text.into(),
        }
    }

    pub fn with_system(mut self, text: impl Into<String>) -> Self {
        self.system = Some(text.into());
        self
    }
}

#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Model the next request will go to.
    fn model(&self) -> String;

    /// Sends the prompt and returns the model's text answer.
    async fn complete(&self, prompt: &Prompt) -> Result<String>;
}
