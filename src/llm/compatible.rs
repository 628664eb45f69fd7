//! Summarizer backed by any OpenAI-compatible `/chat/completions` endpoint.

use super::scrub::api_error;
use super::traits::{Summarizer, Summary};
use crate::error::LlmError;
use crate::memory::tokens::estimate_tokens;
use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

pub struct OpenAiCompatibleSummarizer {
    name: String,
    model: String,
    temperature: f64,
    /// Pre-computed `Authorization` header value.
    cached_auth: Option<String>,
    /// Pre-computed chat completions URL.
    cached_chat_url: String,
    client: Client,
}

impl OpenAiCompatibleSummarizer {
    pub fn new(
        name: &str,
        base_url: &str,
        api_key: Option<&str>,
        model: &str,
        temperature: f64,
        timeout_secs: u64,
    ) -> Self {
        let base_url = base_url.trim_end_matches('/');
        let cached_chat_url = if base_url.ends_with("chat/completions") {
            base_url.to_string()
        } else {
            format!("{base_url}/chat/completions")
        };

        Self {
            name: name.to_string(),
            model: model.to_string(),
            temperature,
            cached_auth: api_key.map(|k| format!("Bearer {k}")),
            cached_chat_url,
            client: super::build_client_with_timeout(timeout_secs),
        }
    }

    pub fn chat_completions_url(&self) -> &str {
        &self.cached_chat_url
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl Summarizer for OpenAiCompatibleSummarizer {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn summarize(&self, instruction: &str, source: &str) -> anyhow::Result<Summary> {
        let Some(auth) = &self.cached_auth else {
            return Err(LlmError::Auth {
                provider: self.name.clone(),
            }
            .into());
        };

        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                Message {
                    role: "system",
                    content: instruction,
                },
                Message {
                    role: "user",
                    content: source,
                },
            ],
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(&self.cached_chat_url)
            .header("Authorization", auth)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("{} chat completions request failed", self.name))?;

        if !response.status().is_success() {
            return Err(api_error(&self.name, response).await);
        }

        let chat: ChatResponse = response
            .json()
            .await
            .with_context(|| format!("{} chat completions JSON decode failed", self.name))?;

        let text = chat
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| LlmError::EmptyResponse {
                provider: self.name.clone(),
            })?;

        let (input_tokens, output_tokens) = match chat.usage {
            Some(usage) => (usage.prompt_tokens, usage.completion_tokens),
            None => (
                (estimate_tokens(instruction) + estimate_tokens(source)) as u64,
                estimate_tokens(&text) as u64,
            ),
        };
        Ok(Summary::new(text, input_tokens, output_tokens))
    }
}
