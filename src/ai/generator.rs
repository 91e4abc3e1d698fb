use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{truncate, AppError, Result};

const CLAUDE_API_URL: &str = "https://api.anthropic.com/v1/messages";
const CLAUDE_MODEL: &str = "claude-3-5-haiku-20241022";
const MAX_TOKENS: u32 = 4096;

/// Black-box text generator used by the generative content builder.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String>;

    fn model_version(&self) -> &str;
}

#[derive(Debug, Serialize)]
struct MessageRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<Message>,
    system: Option<String>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

pub struct ClaudeGenerator {
    client: Client,
    api_key: String,
}

impl ClaudeGenerator {
    pub fn new(api_key: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, api_key })
    }
}

#[async_trait]
impl TextGenerator for ClaudeGenerator {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        let request = MessageRequest {
            model: CLAUDE_MODEL.to_string(),
            max_tokens: MAX_TOKENS,
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            system: Some(system.to_string()),
        };

        let response = self
            .client
            .post(CLAUDE_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Generation(format!("generator request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Generation(format!(
                "generator API error {}: {}",
                status,
                truncate(&error_text, 500)
            )));
        }

        let message_response: MessageResponse = response
            .json()
            .await
            .map_err(|e| AppError::Generation(format!("unreadable generator response: {}", e)))?;

        let text = message_response
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("\n");

        tracing::debug!(model = CLAUDE_MODEL, chars = text.len(), "Generator answered");
        Ok(text)
    }

    fn model_version(&self) -> &str {
        CLAUDE_MODEL
    }
}
