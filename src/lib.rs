//! Skincare advice chat
//!
//! A single-page chat with a skincare consultant assistant. The server hosts
//! one conversation: it is restored from local storage on start-up, streamed
//! from an OpenAI-compatible model endpoint, and saved back as it changes.
//!
//! # Architecture
//!
//! - **Session**: the chat controller state machine and snapshot persistence
//! - **LLM**: the streaming transport to the model endpoint
//! - **Server**: Axum routes, SSE event feed and the update pump
//! - **UI**: the HTML page and the message-wall duration tracker
//!
//! # Modules
//!
//! - [`session`]: controller, messages, snapshot stores
//! - [`llm`]: transport trait, Chat Completions driver, provider detection
//! - [`normalized`]: unified streaming event model
//! - [`prompts`]: welcome text and system prompt
//! - [`config`]: layered configuration

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::unused_async)]

pub mod config;
pub mod llm;
pub mod normalized;
pub mod prompts;
pub mod server;
pub mod session;
pub mod ui;

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::AppConfig;
use crate::session::ChatController;

/// Application state shared across all handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// The one live conversation.
    pub chat: Arc<Mutex<ChatController>>,
    /// Global Configuration
    pub config: Arc<AppConfig>,
}
