//! Chat-completion client seam and the OpenAI-compatible HTTP client.

use crate::config::ExtractionConfig;
use crate::error::ExtractError;
use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    CreateChatCompletionResponse,
};
use async_openai::Client;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument, trace};

/// Default API endpoint when neither the config nor `OPENAI_BASE_URL` sets one.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Environment variable overriding the API base URL.
pub const BASE_URL_ENV: &str = "OPENAI_BASE_URL";

/// One single-turn chat request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: f32,
    pub max_completion_tokens: u32,
    pub reasoning_effort: Option<String>,
}

impl CompletionRequest {
    /// Request for one cell's prompt with the run's model settings.
    pub fn for_prompt(config: &ExtractionConfig, user_prompt: impl Into<String>) -> Self {
        Self {
            model: config.model.clone(),
            system_prompt: config.system_prompt.clone(),
            user_prompt: user_prompt.into(),
            temperature: config.temperature,
            max_completion_tokens: config.max_completion_tokens,
            reasoning_effort: config.reasoning_effort.clone(),
        }
    }
}

/// Why a completion call failed. Rendered into the cell as `ERROR: ...`.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("request failed: {0}")]
    Http(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("invalid request: {0}")]
    Request(String),

    #[error("could not decode response: {0}")]
    Decode(String),
}

impl From<OpenAIError> for CompletionError {
    fn from(e: OpenAIError) -> Self {
        match e {
            OpenAIError::Reqwest(e) => Self::Http(e.to_string()),
            OpenAIError::ApiError(e) => Self::Api(e.to_string()),
            OpenAIError::JSONDeserialize(e) => Self::Decode(e.to_string()),
            other => Self::Request(other.to_string()),
        }
    }
}

/// Anything that can answer a [`CompletionRequest`] with text.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// The first choice's message text. A null message content is `""`.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError>;
}

// ── OpenAI-compatible client ─────────────────────────────────────────────

/// Client for `POST {base_url}/chat/completions`.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    base_url: String,
}

impl OpenAiClient {
    /// Client with an explicit key and base URL.
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, ExtractError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let config = OpenAIConfig::new()
            .with_api_key(api_key.into())
            .with_api_base(base_url.clone());

        let mut http = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            http = http.timeout(timeout);
        }
        let http = http
            .build()
            .map_err(|e| ExtractError::Client(e.to_string()))?;

        Ok(Self {
            client: Client::with_config(config).with_http_client(http),
            base_url,
        })
    }

    /// Client configured from the environment.
    ///
    /// Loads `.env` first. The key comes from `config.api_key_env`; the base
    /// URL from `config.base_url`, then `OPENAI_BASE_URL`, then the default.
    pub fn from_env(config: &ExtractionConfig) -> Result<Self, ExtractError> {
        dotenvy::dotenv().ok();

        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ExtractError::MissingApiKey {
                var: config.api_key_env.clone(),
            })?;

        let base_url = config
            .base_url
            .clone()
            .or_else(|| std::env::var(BASE_URL_ENV).ok().filter(|u| !u.is_empty()))
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        debug!("Using completion endpoint {}", base_url);
        Self::new(api_key, base_url, config.request_timeout_secs.map(Duration::from_secs))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Chat request body: system message, user message, sampling settings.
fn request_body(request: &CompletionRequest) -> Result<Value, CompletionError> {
    let messages: Vec<ChatCompletionRequestMessage> = vec![
        ChatCompletionRequestSystemMessageArgs::default()
            .content(request.system_prompt.as_str())
            .build()?
            .into(),
        ChatCompletionRequestUserMessageArgs::default()
            .content(request.user_prompt.as_str())
            .build()?
            .into(),
    ];
    let built = CreateChatCompletionRequestArgs::default()
        .model(request.model.clone())
        .messages(messages)
        .temperature(request.temperature)
        .max_completion_tokens(request.max_completion_tokens)
        .build()?;

    let mut body = serde_json::to_value(built).map_err(|e| CompletionError::Request(e.to_string()))?;
    // `ReasoningEffort` in async-openai has no `minimal`, so the effort is
    // passed through as the raw string.
    if let (Some(effort), Some(fields)) = (&request.reasoning_effort, body.as_object_mut()) {
        fields.insert("reasoning_effort".into(), Value::String(effort.clone()));
    }
    Ok(body)
}

/// First choice's content; null content becomes `""`.
fn first_choice_text(raw: Value) -> Result<String, CompletionError> {
    let response: CreateChatCompletionResponse =
        serde_json::from_value(raw).map_err(|e| CompletionError::Decode(e.to_string()))?;
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| CompletionError::Decode("response has no choices".into()))?;
    Ok(choice.message.content.unwrap_or_default())
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    #[instrument(level = "debug", skip_all, fields(model = %request.model))]
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let body = request_body(request)?;
        trace!(%body, "Request");
        let raw: Value = self.client.chat().create_byot(body).await?;
        trace!(%raw, "Response");
        first_choice_text(raw)
    }
}
