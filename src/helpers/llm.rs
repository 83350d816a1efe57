use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info};

use crate::error::LlmError;

const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "google/gemini-2.5-flash-lite";

/// Turns a prompt template plus the month's message history into the raw JSON
/// text of a candidate report.
#[async_trait]
pub trait LlmInvoker: Send + Sync {
    async fn generate(
        &self,
        prompt_template: &str,
        history: &serde_json::Value,
    ) -> Result<String, LlmError>;
}

pub fn build_prompt(prompt_template: &str, history: &serde_json::Value) -> Result<String, LlmError> {
    let history = serde_json::to_string_pretty(history)?;
    Ok(format!("{}\n\n{}", prompt_template.trim_end(), history))
}

/// The reply text between the first `{` and the last `}`. Models like to wrap
/// JSON in prose or code fences.
pub fn extract_json(content: &str) -> Result<&str, LlmError> {
    match (content.find('{'), content.rfind('}')) {
        (Some(start), Some(end)) if start < end => Ok(&content[start..=end]),
        _ => Err(LlmError::NoJson),
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatRequestMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatRequestMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

pub fn openrouter_client_init(key: &str) -> anyhow::Result<Client> {
    info!("Initializing OpenRouter client");

    let mut auth = header::HeaderValue::from_str(&format!("Bearer {}", key)).map_err(|e| {
        error!("Failed to create Authorization header value: {}", e);
        e
    })?;
    auth.set_sensitive(true);

    let mut headers = header::HeaderMap::new();
    headers.insert(header::AUTHORIZATION, auth);
    headers.insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/json"),
    );

    let client = Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(60))
        .build()
        .map_err(|e| {
            error!("Failed to build OpenRouter client: {}", e);
            e
        })?;

    info!("OpenRouter client initialized successfully");
    Ok(client)
}

#[derive(Clone)]
pub struct OpenRouterClient {
    client: Client,
    model: String,
    temperature: f32,
}

impl OpenRouterClient {
    pub fn new(client: Client, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            temperature: 0.1,
        }
    }

    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let body = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            messages: vec![ChatRequestMessage {
                role: "user",
                content: prompt,
            }],
        };

        info!(
            "Calling {} with a {} char prompt",
            self.model,
            prompt.chars().count()
        );

        let response = self.client.post(OPENROUTER_URL).json(&body).send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!("OpenRouter returned error status {}: {}", status, message);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let text = response.text().await?;
        let parsed: ChatResponse = serde_json::from_str(&text).map_err(|e| {
            error!("Failed to parse OpenRouter response: {}", e);
            debug!("Raw response: {}", text);
            e
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(LlmError::NoJson)
    }
}

#[async_trait]
impl LlmInvoker for OpenRouterClient {
    async fn generate(
        &self,
        prompt_template: &str,
        history: &serde_json::Value,
    ) -> Result<String, LlmError> {
        let prompt = build_prompt(prompt_template, history)?;
        let content = self.complete(&prompt).await?;
        let json = extract_json(&content)?;

        info!("Received {} chars of report JSON", json.len());
        Ok(json.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_json_from_fenced_reply() {
        let reply = "Here you go:\n```json\n{\"days\": [{\"date\": \"2025-06-02\"}]}\n```\nBye";
        assert_eq!(
            extract_json(reply).unwrap(),
            "{\"days\": [{\"date\": \"2025-06-02\"}]}"
        );
    }

    #[test]
    fn reply_without_object_is_rejected() {
        assert!(matches!(extract_json("no report today"), Err(LlmError::NoJson)));
        assert!(matches!(extract_json("} backwards {"), Err(LlmError::NoJson)));
    }

    #[test]
    fn prompt_is_template_then_history() {
        let history = json!([{"id": 1, "text": "abrau: tests"}]);
        let prompt = build_prompt("Build the report.\n", &history).unwrap();
        assert!(prompt.starts_with("Build the report.\n\n["));
        assert!(prompt.contains("\"text\": \"abrau: tests\""));
    }

    #[test]
    fn client_builds_with_bearer_key() {
        assert!(openrouter_client_init("sk-test").is_ok());
        assert!(openrouter_client_init("bad\nkey").is_err());
    }
}
