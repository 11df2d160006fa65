//! Conversation records and the persisted session snapshot.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Elapsed streaming time per assistant message, in milliseconds.
pub type DurationMap = BTreeMap<String, u64>;

/// Role of a message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Message typed into the composer.
    User,
    /// Reply produced by the assistant (or the synthesized welcome).
    Assistant,
}

impl Role {
    /// Wire name used by Chat Completions style endpoints.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A typed piece of message content.
///
/// Only plain text parts are interpreted. Anything else (reasoning, step
/// markers, tool calls written by other clients) is kept verbatim so saving
/// the conversation never rewrites it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "serde_json::Value", into = "serde_json::Value")]
pub enum MessagePart {
    /// Plain (markdown) text.
    Text {
        /// The text content.
        text: String,
    },
    /// A part this build does not interpret, stored as read.
    Other(serde_json::Value),
}

impl MessagePart {
    /// Create a text part.
    #[must_use]
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text { text: s.into() }
    }

    /// Displayable text carried by this part, if any.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            Self::Other(raw) if raw.get("type").and_then(|t| t.as_str()) == Some("text") => {
                raw.get("text").and_then(|t| t.as_str())
            }
            Self::Other(_) => None,
        }
    }
}

impl From<serde_json::Value> for MessagePart {
    fn from(raw: serde_json::Value) -> Self {
        // Text parts with extra metadata stay raw so the metadata survives.
        if let Some(obj) = raw.as_object()
            && obj.len() == 2
            && obj.get("type").and_then(|t| t.as_str()) == Some("text")
            && let Some(text) = obj.get("text").and_then(|t| t.as_str())
        {
            return Self::text(text);
        }
        Self::Other(raw)
    }
}

impl From<MessagePart> for serde_json::Value {
    fn from(part: MessagePart) -> Self {
        match part {
            MessagePart::Text { text } => serde_json::json!({ "type": "text", "text": text }),
            MessagePart::Other(raw) => raw,
        }
    }
}

/// A single entry in the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiMessage {
    /// Unique message identifier.
    pub id: String,
    /// Author of the message.
    pub role: Role,
    /// Ordered content parts.
    pub parts: Vec<MessagePart>,
}

impl UiMessage {
    /// Create a message with a single text part.
    #[must_use]
    pub fn new(id: impl Into<String>, role: Role, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role,
            parts: vec![MessagePart::text(text)],
        }
    }

    /// Create a user message with a fresh identifier.
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Uuid::new_v4().to_string(), Role::User, text)
    }

    /// Concatenated text of every text part.
    #[must_use]
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(MessagePart::as_text)
            .collect()
    }

    /// Append streamed text to the trailing text part.
    pub(crate) fn push_text(&mut self, delta: &str) {
        if let Some(MessagePart::Text { text }) = self.parts.last_mut() {
            text.push_str(delta);
        } else {
            self.parts.push(MessagePart::text(delta));
        }
    }
}

/// The persisted unit: the message sequence plus recorded durations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    /// Conversation order.
    pub messages: Vec<UiMessage>,
    /// Streaming time per assistant message.
    pub durations: DurationMap,
}

/// On-disk document. Each field may be missing or `null` on its own.
#[derive(Deserialize)]
struct StoredSnapshot {
    #[serde(default)]
    messages: Option<Vec<UiMessage>>,
    #[serde(default)]
    durations: Option<DurationMap>,
}

impl<'de> Deserialize<'de> for SessionSnapshot {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let stored = StoredSnapshot::deserialize(deserializer)?;
        Ok(Self {
            messages: stored.messages.unwrap_or_default(),
            durations: stored.durations.unwrap_or_default(),
        })
    }
}

impl SessionSnapshot {
    /// True when there is neither history nor timing data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty() && self.durations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_wire_shape() {
        let msg = UiMessage::new("m1", Role::Assistant, "Hello");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": "m1",
                "role": "assistant",
                "parts": [{ "type": "text", "text": "Hello" }]
            })
        );
    }

    #[test]
    fn test_unknown_part_is_tolerated() {
        let raw = r#"{"id":"a","role":"assistant","parts":[{"type":"step-start"},{"type":"text","text":"ok"}]}"#;
        let msg: UiMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(
            msg.parts[0],
            MessagePart::Other(serde_json::json!({ "type": "step-start" }))
        );
        assert_eq!(msg.text(), "ok");
    }

    #[test]
    fn test_foreign_parts_survive_a_save() {
        let raw = serde_json::json!({
            "messages": [{
                "id": "a1",
                "role": "assistant",
                "parts": [
                    { "type": "step-start" },
                    { "type": "reasoning", "text": "skin barrier first", "state": "done" },
                    { "type": "text", "text": "Use ceramides.", "state": "done" },
                    { "type": "text", "text": " Daily." }
                ]
            }],
            "durations": { "a1": 901 }
        });

        let snapshot: SessionSnapshot = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(snapshot.messages[0].text(), "Use ceramides. Daily.");
        assert_eq!(serde_json::to_value(&snapshot).unwrap(), raw);
    }

    #[test]
    fn test_push_text_extends_last_part() {
        let mut msg = UiMessage::new("a", Role::Assistant, "Hel");
        msg.push_text("lo");
        assert_eq!(msg.parts.len(), 1);
        assert_eq!(msg.text(), "Hello");

        let mut empty = UiMessage {
            id: "b".to_string(),
            role: Role::Assistant,
            parts: Vec::new(),
        };
        empty.push_text("x");
        assert_eq!(empty.parts, vec![MessagePart::text("x")]);
    }

    #[test]
    fn test_snapshot_partial_document() {
        let only_messages: SessionSnapshot = serde_json::from_str(
            r#"{"messages":[{"id":"u","role":"user","parts":[{"type":"text","text":"hi"}]}]}"#,
        )
        .unwrap();
        assert_eq!(only_messages.messages.len(), 1);
        assert!(only_messages.durations.is_empty());

        let nulls: SessionSnapshot =
            serde_json::from_str(r#"{"messages":null,"durations":{"x":5}}"#).unwrap();
        assert!(nulls.messages.is_empty());
        assert_eq!(nulls.durations.get("x"), Some(&5));

        let empty: SessionSnapshot = serde_json::from_str("{}").unwrap();
        assert!(empty.is_empty());
    }
}
