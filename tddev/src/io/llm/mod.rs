//! Text completion gateway for the hosted model providers.
//!
//! The [`CompletionClient`] trait is the seam every agent talks through.
//! [`HttpCompletionClient`] implements it over blocking HTTP; tests use the
//! scripted client from `test_support`, which never touches the network.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::io::config::LlmConfig;

pub mod anthropic;
pub mod openai;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("llm configuration: {0}")]
    Configuration(String),

    #[error("unsupported provider {0:?} (use anthropic, openai, or claude-agent-sdk)")]
    UnsupportedProvider(String),

    #[error("{provider} request failed: {message}")]
    Provider {
        provider: Provider,
        message: String,
        #[source]
        source: Option<BoxError>,
    },
}

impl LlmError {
    pub(crate) fn provider(provider: Provider, message: impl Into<String>) -> Self {
        LlmError::Provider {
            provider,
            message: message.into(),
            source: None,
        }
    }

    pub(crate) fn provider_with_source(
        provider: Provider,
        message: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        LlmError::Provider {
            provider,
            message: message.into(),
            source: Some(source.into()),
        }
    }
}

/// Hosted model vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Anthropic,
    #[serde(rename = "openai")]
    OpenAi,
}

impl Provider {
    pub fn parse(name: &str) -> Result<Self, LlmError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "anthropic" | "claude-agent-sdk" => Ok(Provider::Anthropic),
            "openai" => Ok(Provider::OpenAi),
            _ => Err(LlmError::UnsupportedProvider(name.to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Anthropic => "anthropic",
            Provider::OpenAi => "openai",
        }
    }

    /// Environment variable holding the API key.
    pub fn credential_var(self) -> &'static str {
        match self {
            Provider::Anthropic => "ANTHROPIC_API_KEY",
            Provider::OpenAi => "OPENAI_API_KEY",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            Provider::Anthropic => "claude-sonnet-4-5-20250929",
            Provider::OpenAi => "gpt-4.1",
        }
    }

    pub fn endpoint(self) -> &'static str {
        match self {
            Provider::Anthropic => anthropic::MESSAGES_URL,
            Provider::OpenAi => openai::CHAT_COMPLETIONS_URL,
        }
    }
}

impl FromStr for Provider {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Provider::parse(s)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Per-call overrides of the client's sampling defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CompletionOptions {
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
}

/// Stateless request/response access to a text model.
pub trait CompletionClient {
    /// Send a conversation and return the assistant's text.
    fn complete(
        &self,
        messages: &[ChatMessage],
        system: Option<&str>,
        options: CompletionOptions,
    ) -> Result<String, LlmError>;

    /// Send one user turn made of `text` plus images (local paths or URLs).
    fn complete_with_images(
        &self,
        text: &str,
        images: &[PathBuf],
        system: Option<&str>,
    ) -> Result<String, LlmError>;

    /// Single user prompt with default options.
    fn prompt(&self, text: &str) -> Result<String, LlmError> {
        self.complete(&[ChatMessage::user(text)], None, CompletionOptions::default())
    }
}

/// Resolved sampling settings for one client.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientSettings {
    pub provider: Provider,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub request_timeout: Duration,
}

impl ClientSettings {
    /// Resolve provider and model from config, filling the provider's default model.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let provider = Provider::parse(&config.provider)?;
        let model = config
            .model
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(provider.default_model())
            .to_string();
        Ok(Self {
            provider,
            model,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        })
    }
}

/// [`CompletionClient`] backed by the provider's HTTP API.
pub struct HttpCompletionClient {
    settings: ClientSettings,
    api_key: String,
    http: reqwest::blocking::Client,
}

impl fmt::Debug for HttpCompletionClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpCompletionClient")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl HttpCompletionClient {
    /// Build a client, reading the provider's API key from the environment.
    pub fn from_env(settings: ClientSettings) -> Result<Self, LlmError> {
        let var = settings.provider.credential_var();
        let api_key = std::env::var(var)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                LlmError::Configuration(format!(
                    "{var} not set; export it before running with provider {}",
                    settings.provider
                ))
            })?;
        Self::new(settings, api_key)
    }

    pub fn new(settings: ClientSettings, api_key: String) -> Result<Self, LlmError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| {
                LlmError::provider_with_source(settings.provider, "build http client", e)
            })?;
        info!(provider = %settings.provider, model = %settings.model, "initialized completion client");
        Ok(Self {
            settings,
            api_key,
            http,
        })
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }
}

impl CompletionClient for HttpCompletionClient {
    #[instrument(skip_all, fields(provider = %self.settings.provider, messages = messages.len()))]
    fn complete(
        &self,
        messages: &[ChatMessage],
        system: Option<&str>,
        options: CompletionOptions,
    ) -> Result<String, LlmError> {
        let temperature = options.temperature.unwrap_or(self.settings.temperature);
        let max_tokens = options.max_tokens.unwrap_or(self.settings.max_tokens);
        let prompt_chars: usize = messages.iter().map(|m| m.content.len()).sum();
        debug!(prompt_chars, "sending completion request");

        let reply = match self.settings.provider {
            Provider::Anthropic => {
                let turns = messages
                    .iter()
                    .map(|m| anthropic::Turn::text(m.role, &m.content))
                    .collect();
                anthropic::send(
                    &self.http,
                    &self.api_key,
                    &anthropic::Request {
                        model: &self.settings.model,
                        messages: turns,
                        system,
                        temperature,
                        max_tokens,
                    },
                )?
            }
            Provider::OpenAi => {
                let turns = openai::with_system(system, messages);
                openai::send(
                    &self.http,
                    &self.api_key,
                    &openai::Request {
                        model: &self.settings.model,
                        messages: turns,
                        temperature,
                        max_tokens,
                    },
                )?
            }
        };
        debug!(reply_chars = reply.len(), "received completion");
        Ok(reply)
    }

    #[instrument(skip_all, fields(provider = %self.settings.provider, images = images.len()))]
    fn complete_with_images(
        &self,
        text: &str,
        images: &[PathBuf],
        system: Option<&str>,
    ) -> Result<String, LlmError> {
        let temperature = self.settings.temperature;
        let max_tokens = self.settings.max_tokens;
        match self.settings.provider {
            Provider::Anthropic => anthropic::send(
                &self.http,
                &self.api_key,
                &anthropic::Request {
                    model: &self.settings.model,
                    messages: vec![anthropic::Turn::with_images(text, images)?],
                    system,
                    temperature,
                    max_tokens,
                },
            ),
            Provider::OpenAi => {
                let mut turns = openai::with_system(system, &[]);
                turns.push(openai::Turn::with_images(text, images)?);
                openai::send(
                    &self.http,
                    &self.api_key,
                    &openai::Request {
                        model: &self.settings.model,
                        messages: turns,
                        temperature,
                        max_tokens,
                    },
                )
            }
        }
    }
}

const ERROR_EXCERPT_CHARS: usize = 500;

/// POST `body` as JSON and return the raw response text of a 2xx reply.
pub(crate) fn post_json<T: Serialize>(
    provider: Provider,
    request: reqwest::blocking::RequestBuilder,
    body: &T,
) -> Result<String, LlmError> {
    let response = request
        .json(body)
        .send()
        .map_err(|e| LlmError::provider_with_source(provider, "send request", e))?;
    let status = response.status();
    let text = response
        .text()
        .map_err(|e| LlmError::provider_with_source(provider, "read response body", e))?;
    if !status.is_success() {
        let excerpt: String = text.chars().take(ERROR_EXCERPT_CHARS).collect();
        return Err(LlmError::provider(
            provider,
            format!("http {status}: {excerpt}"),
        ));
    }
    Ok(text)
}

/// MIME type inferred from the image file extension (JPEG when unknown).
pub fn image_media_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "image/jpeg",
    }
}

/// Read a local image and return its base64 payload.
pub(crate) fn encode_image(provider: Provider, path: &Path) -> Result<String, LlmError> {
    let bytes = std::fs::read(path).map_err(|e| {
        LlmError::provider_with_source(provider, format!("read image {}", path.display()), e)
    })?;
    Ok(BASE64.encode(bytes))
}
