//! Production chat transport.
//!
//! The orchestrator owns the system prompt and a driver. For every exchange it:
//! 1. Prepends the system prompt to the conversation
//! 2. Maps [`UiMessage`]s to wire messages (text parts only)
//! 3. Streams the driver output, framed by `stream.start` and a terminal event
//!
//! # Example
//!
//! ```rust,ignore
//! use skinai_chat::llm::{ChatTransport, Orchestrator};
//!
//! let orchestrator = Orchestrator::new(settings, system_prompt);
//! let stream = orchestrator.send(history).await?;
//! ```

use std::sync::Arc;

use futures::StreamExt;
use uuid::Uuid;

use crate::normalized::NormalizedEvent;
use crate::session::UiMessage;

use super::{
    ChatCompletionsDriver, ChatTransport, EventStream, LlmDriver, LlmRequest, LlmSettings,
    WireMessage,
};

/// Chat transport backed by an [`LlmDriver`].
#[derive(Clone)]
pub struct Orchestrator {
    system_prompt: String,
    driver: Arc<dyn LlmDriver>,
}

#[allow(clippy::missing_fields_in_debug)]
impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("system_prompt_len", &self.system_prompt.len())
            .field("driver", &"LlmDriver")
            .finish()
    }
}

impl Orchestrator {
    /// Create an orchestrator talking Chat Completions with the given settings.
    pub fn new(settings: LlmSettings, system_prompt: impl Into<String>) -> Self {
        Self::with_driver(Arc::new(ChatCompletionsDriver::new(settings)), system_prompt)
    }

    /// Create an orchestrator over an arbitrary driver.
    pub fn with_driver(driver: Arc<dyn LlmDriver>, system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            driver,
        }
    }

    /// Build the driver request for a conversation.
    #[must_use]
    pub fn build_request(&self, history: &[UiMessage]) -> LlmRequest {
        let mut messages = Vec::with_capacity(history.len() + 1);
        if !self.system_prompt.trim().is_empty() {
            messages.push(WireMessage::system(self.system_prompt.clone()));
        }
        messages.extend(
            history
                .iter()
                .map(WireMessage::from)
                .filter(|m| !m.content.is_empty()),
        );
        LlmRequest { messages }
    }
}

#[async_trait::async_trait]
impl ChatTransport for Orchestrator {
    async fn send(&self, history: Vec<UiMessage>) -> anyhow::Result<EventStream> {
        let request_id = Uuid::new_v4().to_string();
        let request = self.build_request(&history);

        tracing::info!(
            name: "llm.request.started",
            request_id = %request_id,
            message_count = request.messages.len(),
            "Starting model exchange"
        );

        let inner = self.driver.stream(request).await?;

        let out = async_stream::stream! {
            yield Ok(NormalizedEvent::StreamStart { request_id: request_id.clone() });

            futures::pin_mut!(inner);
            let mut finished = false;
            while let Some(item) = inner.next().await {
                let terminal = match &item {
                    Ok(event) => event.is_terminal(),
                    Err(_) => true,
                };
                yield item;
                if terminal {
                    finished = true;
                    break;
                }
            }

            // Some servers close the connection without a [DONE] sentinel.
            if !finished {
                tracing::debug!(request_id = %request_id, "Stream closed without done marker");
                yield Ok(NormalizedEvent::Done);
            }
        };

        Ok(Box::pin(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Role;

    struct CannedDriver {
        events: Vec<NormalizedEvent>,
    }

    #[async_trait::async_trait]
    impl LlmDriver for CannedDriver {
        async fn stream(&self, _req: LlmRequest) -> anyhow::Result<EventStream> {
            let items: Vec<anyhow::Result<NormalizedEvent>> =
                self.events.iter().cloned().map(Ok).collect();
            Ok(Box::pin(futures::stream::iter(items)))
        }
    }

    fn orchestrator(events: Vec<NormalizedEvent>) -> Orchestrator {
        Orchestrator::with_driver(Arc::new(CannedDriver { events }), "Be kind.")
    }

    async fn collect(orchestrator: &Orchestrator) -> Vec<NormalizedEvent> {
        let history = vec![UiMessage::user("hello")];
        let stream = orchestrator.send(history).await.unwrap();
        stream.map(|e| e.unwrap()).collect().await
    }

    #[test]
    fn test_build_request_prepends_system_prompt() {
        let orchestrator = orchestrator(Vec::new());
        let history = vec![
            UiMessage::new("w", Role::Assistant, "Welcome!"),
            UiMessage {
                id: "blank".to_string(),
                role: Role::Assistant,
                parts: Vec::new(),
            },
            UiMessage::new("u", Role::User, "Dry skin help"),
        ];

        let req = orchestrator.build_request(&history);
        let roles: Vec<&str> = req.messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["system", "assistant", "user"]);
        assert_eq!(req.messages[0].content, "Be kind.");
        assert_eq!(req.messages[2].content, "Dry skin help");
    }

    #[tokio::test]
    async fn test_stream_is_framed() {
        let events = collect(&orchestrator(vec![
            NormalizedEvent::MessageDelta {
                text: "Hi".to_string(),
            },
            NormalizedEvent::Done,
        ]))
        .await;

        assert!(matches!(events[0], NormalizedEvent::StreamStart { .. }));
        assert_eq!(events.len(), 3);
        assert_eq!(events[2], NormalizedEvent::Done);
    }

    #[tokio::test]
    async fn test_missing_done_is_synthesized() {
        let events = collect(&orchestrator(vec![NormalizedEvent::MessageDelta {
            text: "partial".to_string(),
        }]))
        .await;

        assert_eq!(events.last(), Some(&NormalizedEvent::Done));
    }

    #[tokio::test]
    async fn test_error_ends_stream() {
        let events = collect(&orchestrator(vec![
            NormalizedEvent::Error {
                message: "quota".to_string(),
                code: None,
            },
            NormalizedEvent::MessageDelta {
                text: "never".to_string(),
            },
        ]))
        .await;

        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], NormalizedEvent::Error { .. }));
    }
}
