//! Oracle backends
//!
//! The pipeline only needs a one-shot prompt/answer exchange, so a provider
//! is a single `generate` call. Ollama goes through `ollama-rs`; anything that
//! speaks the OpenAI chat-completions wire format goes through `reqwest`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use ollama_rs::generation::chat::{request::ChatMessageRequest, ChatMessage};
use ollama_rs::models::ModelOptions;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::config::{OracleConfig, ProviderKind};

/// One-shot text exchange with a language model
#[async_trait]
pub trait LLMProvider: Send + Sync {
    async fn generate(&self, model: &str, prompt: String, system: Option<String>) -> Result<String>;
}

pub struct OllamaProvider {
    client: ollama_rs::Ollama,
    temperature: Option<f32>,
}

impl OllamaProvider {
    pub fn new(client: ollama_rs::Ollama) -> Self {
        Self { client, temperature: None }
    }

    pub fn from_url(base_url: &str) -> Result<Self> {
        let client = ollama_rs::Ollama::try_new(base_url)
            .with_context(|| format!("Invalid Ollama URL '{}'", base_url))?;
        Ok(Self::new(client))
    }

    pub fn from_config(config: &OracleConfig) -> Result<Self> {
        Ok(Self::from_url(&config.base_url)?.with_temperature(config.temperature))
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    fn request(&self, model: &str, prompt: String, system: Option<String>) -> ChatMessageRequest {
        let messages: Vec<ChatMessage> = system
            .map(ChatMessage::system)
            .into_iter()
            .chain(std::iter::once(ChatMessage::user(prompt)))
            .collect();
        let request = ChatMessageRequest::new(model.to_string(), messages);
        match self.temperature {
            Some(t) => request.options(ModelOptions::default().temperature(t)),
            None => request,
        }
    }
}

#[async_trait]
impl LLMProvider for OllamaProvider {
    async fn generate(&self, model: &str, prompt: String, system: Option<String>) -> Result<String> {
        let reply = self
            .client
            .send_chat_messages(self.request(model, prompt, system))
            .await
            .with_context(|| format!("Ollama chat request for '{}' failed", model))?;
        Ok(reply.message.content)
    }
}

#[derive(Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// First choice's text, if the completion carries any
fn completion_text(body: &str) -> Result<String> {
    let completion: ChatCompletion =
        serde_json::from_str(body).context("Unexpected chat-completions response body")?;
    completion
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .context("Chat-completions response has no message content")
}

/// Any server implementing `POST {base_url}/chat/completions`
pub struct OpenAICompatibleProvider {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    temperature: f32,
}

impl OpenAICompatibleProvider {
    pub fn new(base_url: &str, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key,
            temperature: 0.2,
        }
    }

    pub fn from_config(config: &OracleConfig) -> Self {
        Self::new(&config.base_url, config.api_key.clone()).with_temperature(config.temperature)
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl LLMProvider for OpenAICompatibleProvider {
    async fn generate(&self, model: &str, prompt: String, system: Option<String>) -> Result<String> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system {
            messages.push(json!({ "role": "system", "content": system }));
        }
        messages.push(json!({ "role": "user", "content": prompt }));

        let mut request = self.client.post(&self.endpoint).json(&json!({
            "model": model,
            "messages": messages,
            "temperature": self.temperature,
        }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let body = request
            .send()
            .await
            .with_context(|| format!("Request to {} failed", self.endpoint))?
            .error_for_status()?
            .text()
            .await?;
        completion_text(&body)
    }
}

/// Builds the provider selected by `config.provider`.
pub fn build_provider(config: &OracleConfig) -> Result<Arc<dyn LLMProvider>> {
    Ok(match config.provider {
        ProviderKind::Ollama => Arc::new(OllamaProvider::from_config(config)?),
        ProviderKind::OpenaiCompatible => Arc::new(OpenAICompatibleProvider::from_config(config)),
    })
}
