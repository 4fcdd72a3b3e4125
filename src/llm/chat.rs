//! OpenAI-compatible chat completion wire types, shared by the Cerebras
//! and Perplexity providers.

use super::Prompt;
use crate::common::error::{Result, ScraperError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl ChatRequest {
    pub fn new(model: &str, prompt: &Prompt, temperature: Option<f32>) -> Self {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &prompt.system {
            messages.push(ChatMessage::system(system.clone()));
        }
        messages.push(ChatMessage::user(prompt.user.clone()));
        Self {
            model: model.to_string(),
            messages,
            temperature,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ChatMessage,
}

/// Content of the first choice.
pub fn first_choice_content(provider: &str, body: &str) -> Result<String> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| ScraperError::llm(provider, format!("unexpected response body: {}", e)))?;
    response
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content)
        .ok_or_else(|| ScraperError::llm(provider, "response contained no choices"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_puts_system_message_first() {
        let prompt = Prompt::user("hi").with_system("be terse");
        let request = ChatRequest::new("sonar", &prompt, None);
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(
            body,
            json!({
                "model": "sonar",
                "messages": [
                    {"role": "system", "content": "be terse"},
                    {"role": "user", "content": "hi"}
                ]
            })
        );
    }

    #[test]
    fn first_choice_is_read() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"{\"a\":1}"}}]}"#;
        assert_eq!(first_choice_content("cerebras", body).unwrap(), r#"{"a":1}"#);
        let err = first_choice_content("cerebras", r#"{"choices":[]}"#).unwrap_err();
        assert!(matches!(err, ScraperError::Llm { .. }));
    }
}
