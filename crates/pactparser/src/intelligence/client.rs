use std::time::Instant;

use reqwest::blocking::Client;
use reqwest::header;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::IntelligenceConfig;
use crate::error::IntelligenceError;
use crate::intelligence::prompt::{build_prompt, extract_json_payload, SYSTEM_PROMPT};
use crate::intelligence::IntelligenceClient;
use crate::sanitize::{excerpt, redact_url};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Client for OpenAI-compatible `/chat/completions` endpoints (Groq,
/// OpenAI, local servers).
pub struct ChatCompletionsClient {
    http: Client,
    base_url: String,
    model: String,
    temperature: f32,
    api_key: SecretString,
}

impl ChatCompletionsClient {
    pub fn from_config(
        config: &IntelligenceConfig,
        api_key: SecretString,
    ) -> Result<Self, IntelligenceError> {
        // `None` lifts the blocking client's default 30s deadline.
        let http = Client::builder().timeout(config.request_timeout()).build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            api_key,
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn complete(&self, prompt: &str) -> Result<String, IntelligenceError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: self.temperature,
        };

        let response = self
            .http
            .post(self.endpoint())
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .json(&request)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            tracing::warn!(status = %status, "Intelligence service returned an error");
            return Err(IntelligenceError::Service {
                status: status.as_u16(),
                body: excerpt(&body),
            });
        }

        let chat: ChatResponse = response.json()?;
        chat.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(IntelligenceError::EmptyResponse)
    }
}

impl IntelligenceClient for ChatCompletionsClient {
    fn extract_structured(&self, text: &str) -> Result<Value, IntelligenceError> {
        let _span = tracing::info_span!(
            "intelligence.extract",
            endpoint = %redact_url(&self.base_url),
            model = %self.model,
            text_len = text.len(),
        )
        .entered();

        let start = Instant::now();
        let reply = self.complete(&build_prompt(text))?;
        tracing::debug!(
            duration_ms = start.elapsed().as_millis() as u64,
            reply_len = reply.len(),
            "Chat completion received"
        );

        extract_json_payload(&reply)
    }
}
