//! Remote model transport.
//!
//! The chat session never talks to a model endpoint directly. It hands the
//! conversation to a [`ChatTransport`] and consumes the resulting stream of
//! [`NormalizedEvent`]s.
//!
//! # Layers
//!
//! - [`LlmDriver`]: one wire protocol, one HTTP endpoint
//!   ([`ChatCompletionsDriver`] for `/v1/chat/completions`).
//! - [`Orchestrator`]: the production [`ChatTransport`]; adds the system prompt,
//!   maps history into wire messages and frames the stream.
//!
//! # Example
//!
//! ```rust,ignore
//! use skinai_chat::llm::{LlmSettings, Orchestrator, Provider};
//!
//! let settings = LlmSettings {
//!     base_url: "https://api.openai.com".to_string(),
//!     api_key: Some("sk-...".to_string()),
//!     model: "gpt-4o-mini".to_string(),
//!     provider: Provider::OpenAI,
//! };
//! let transport = Orchestrator::new(settings, "You are a skincare consultant.");
//! ```

pub mod chat_completions;
pub mod orchestrator;
pub mod provider;

pub use chat_completions::ChatCompletionsDriver;
pub use orchestrator::Orchestrator;
pub use provider::Provider;

use std::pin::Pin;

use futures::Stream;

use crate::normalized::NormalizedEvent;
use crate::session::UiMessage;

/// Boxed stream of transport events.
pub type EventStream = Pin<Box<dyn Stream<Item = anyhow::Result<NormalizedEvent>> + Send>>;

/// LLM connection and model settings.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    /// Base URL for the LLM API (e.g., `https://api.openai.com`).
    pub base_url: String,
    /// Optional API key for authentication.
    pub api_key: Option<String>,
    /// Model identifier (e.g., `gpt-4o-mini`).
    pub model: String,
    /// Provider type (auto-detected from `base_url` if not specified).
    pub provider: Provider,
}

/// A message in the wire conversation sent to the model.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct WireMessage {
    /// `system`, `user` or `assistant`.
    pub role: String,
    /// Plain text content.
    pub content: String,
}

impl WireMessage {
    /// System prompt message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }
}

impl From<&UiMessage> for WireMessage {
    fn from(msg: &UiMessage) -> Self {
        Self {
            role: msg.role.as_str().to_string(),
            content: msg.text(),
        }
    }
}

/// Request to an LLM driver.
#[derive(Debug)]
pub struct LlmRequest {
    /// Conversation messages, system prompt first.
    pub messages: Vec<WireMessage>,
}

/// Trait for LLM streaming drivers.
///
/// Implementations of this trait provide streaming access to LLM responses,
/// emitting [`NormalizedEvent`]s as the model generates output.
#[async_trait::async_trait]
pub trait LlmDriver: Send + Sync {
    /// Stream a response from the LLM.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the connection is interrupted.
    async fn stream(&self, req: LlmRequest) -> anyhow::Result<EventStream>;
}

/// The remote exchange collaborator consumed by the chat controller.
///
/// A returned stream is expected to start with
/// [`NormalizedEvent::StreamStart`] and end with [`NormalizedEvent::Done`] or
/// [`NormalizedEvent::Error`]. Dropping the stream abandons the exchange.
#[async_trait::async_trait]
pub trait ChatTransport: Send + Sync {
    /// Begin a streaming exchange for the given history (latest user message last).
    async fn send(&self, history: Vec<UiMessage>) -> anyhow::Result<EventStream>;
}
