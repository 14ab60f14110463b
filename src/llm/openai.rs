//! OpenAI Chat Completions backend.

use super::ScriptGenerator;
use crate::config::LlmConfig;
use crate::error::{Error, Result};
use reqwest::blocking::Client;
use tracing::debug;

pub struct OpenAiGenerator {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, serde::Serialize)]
pub(crate) struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, serde::Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, serde::Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, serde::Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, serde::Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl OpenAiGenerator {
    pub fn new(client: Client, config: &LlmConfig, api_key: String) -> Self {
        OpenAiGenerator {
            client,
            endpoint: format!("{}/chat/completions", config.effective_base_url()),
            api_key,
            model: config.effective_model(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    pub(crate) fn request<'a>(&'a self, prompt: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

/// Extracts the first choice's text from a Chat Completions response body.
pub fn parse_response(body: &str) -> Result<String> {
    let response: ChatResponse =
        serde_json::from_str(body).map_err(|source| Error::ResponseParse {
            provider: "openai".to_string(),
            source,
        })?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|text| !text.trim().is_empty())
        .ok_or_else(|| Error::EmptyResponse("openai".to_string()))
}

impl ScriptGenerator for OpenAiGenerator {
    fn provider(&self) -> &'static str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn generate(&self, prompt: &str) -> Result<String> {
        debug!("POST {} ({} chars)", self.endpoint, prompt.len());
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.request(prompt))
            .send()?;

        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(Error::Api {
                provider: self.provider().to_string(),
                status: status.as_u16(),
                body,
            });
        }
        parse_response(&body)
    }
}
