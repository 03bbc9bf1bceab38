use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

use pumi_core::config::{LlmConfig, LlmProvider};

use crate::prompts::PromptMode;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const ANTHROPIC_MAX_TOKENS: u32 = 1024;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LlmError {
    #[error("llm client configuration is invalid: {0}")]
    Config(String),
    #[error("llm request failed: {0}")]
    Transport(String),
    #[error("llm provider returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("llm response could not be decoded: {0}")]
    Decode(String),
}

/// Single-turn completion: one fixed instruction plus one user text.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, mode: PromptMode, input: &str) -> Result<String, LlmError>;
}

#[derive(Clone)]
pub struct HttpLlmClient {
    client: reqwest::Client,
    provider: LlmProvider,
    api_key: Option<SecretString>,
    base_url: String,
    model: String,
    temperature: f32,
}

impl std::fmt::Debug for HttpLlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpLlmClient")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl HttpLlmClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        if config.provider != LlmProvider::Ollama && config.api_key.is_none() {
            return Err(LlmError::Config(format!(
                "provider {:?} requires an api key",
                config.provider
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| LlmError::Config(format!("failed to build http client: {error}")))?;

        Ok(Self {
            client,
            provider: config.provider,
            api_key: config.api_key.clone(),
            base_url: config.effective_base_url().trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    pub fn endpoint(&self) -> String {
        match self.provider {
            LlmProvider::Anthropic => format!("{}/messages", self.base_url),
            LlmProvider::OpenAi | LlmProvider::Ollama => {
                format!("{}/chat/completions", self.base_url)
            }
        }
    }

    pub fn request_body(&self, mode: PromptMode, input: &str) -> Value {
        let temperature = mode.temperature_override().unwrap_or(self.temperature);
        match self.provider {
            LlmProvider::Anthropic => json!({
                "model": self.model,
                "max_tokens": ANTHROPIC_MAX_TOKENS,
                "temperature": temperature,
                "system": mode.system_prompt(),
                "messages": [{ "role": "user", "content": input }],
            }),
            LlmProvider::OpenAi | LlmProvider::Ollama => json!({
                "model": self.model,
                "temperature": temperature,
                "messages": [
                    { "role": "system", "content": mode.system_prompt() },
                    { "role": "user", "content": input },
                ],
            }),
        }
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, mode: PromptMode, input: &str) -> Result<String, LlmError> {
        let mut request = self.client.post(self.endpoint()).json(&self.request_body(mode, input));
        request = match (self.provider, &self.api_key) {
            (LlmProvider::Anthropic, Some(key)) => request
                .header("x-api-key", key.expose_secret())
                .header("anthropic-version", ANTHROPIC_VERSION),
            (_, Some(key)) => request.bearer_auth(key.expose_secret()),
            (_, None) => request,
        };

        let response =
            request.send().await.map_err(|error| LlmError::Transport(error.to_string()))?;
        let status = response.status();
        debug!(
            event_name = "llm.completion.response",
            mode = mode.as_str(),
            status = status.as_u16(),
            "llm provider answered"
        );

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status { status: status.as_u16(), body });
        }

        let payload: Value =
            response.json().await.map_err(|error| LlmError::Decode(error.to_string()))?;
        completion_text(self.provider, &payload)
    }
}

/// Pulls the assistant text out of a provider response.
pub fn completion_text(provider: LlmProvider, payload: &Value) -> Result<String, LlmError> {
    let text = match provider {
        LlmProvider::Anthropic => payload
            .get("content")
            .and_then(Value::as_array)
            .map(|blocks| {
                blocks
                    .iter()
                    .filter(|block| block.get("type").and_then(Value::as_str) == Some("text"))
                    .filter_map(|block| block.get("text").and_then(Value::as_str))
                    .collect::<Vec<_>>()
                    .join("")
            }),
        LlmProvider::OpenAi | LlmProvider::Ollama => payload
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(str::to_owned),
    };

    text.ok_or_else(|| LlmError::Decode("response carries no completion text".to_string()))
}

/// Scripted client for tests: answers from a queue and remembers what it was asked.
#[derive(Default)]
pub struct CannedLlmClient {
    responses: Mutex<VecDeque<Result<String, LlmError>>>,
    calls: Mutex<Vec<(PromptMode, String)>>,
}

impl CannedLlmClient {
    pub fn with_responses<I>(responses: I) -> Self
    where
        I: IntoIterator<Item = Result<String, LlmError>>,
    {
        Self { responses: Mutex::new(responses.into_iter().collect()), calls: Mutex::default() }
    }

    pub async fn push(&self, response: Result<String, LlmError>) {
        self.responses.lock().await.push_back(response);
    }

    pub async fn calls(&self) -> Vec<(PromptMode, String)> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl LlmClient for CannedLlmClient {
    async fn complete(&self, mode: PromptMode, input: &str) -> Result<String, LlmError> {
        self.calls.lock().await.push((mode, input.to_string()));
        self.responses
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::Transport("no canned response queued".to_string())))
    }
}
