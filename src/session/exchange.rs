//! In-flight exchange with the transport.
//!
//! Each user turn spawns one exchange task. The task owns the transport stream
//! and reports progress as [`ExchangeUpdate`]s over an unbounded channel; it
//! never touches controller state itself.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::message::UiMessage;
use crate::llm::ChatTransport;
use crate::normalized::NormalizedEvent;

/// Progress report from an in-flight exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeUpdate {
    /// The transport accepted the request and began streaming.
    Streaming {
        /// Exchange sequence number.
        exchange: u64,
    },
    /// Assistant text arrived for `message_id`.
    Delta {
        /// Exchange sequence number.
        exchange: u64,
        /// Assistant message the text belongs to.
        message_id: String,
        /// Text fragment to append.
        text: String,
    },
    /// The exchange ended normally, or acknowledged a stop request.
    Finished {
        /// Exchange sequence number.
        exchange: u64,
        /// True when the end was caused by cancellation.
        cancelled: bool,
    },
    /// The exchange failed.
    Failed {
        /// Exchange sequence number.
        exchange: u64,
        /// Human-readable failure.
        error: String,
    },
}

impl ExchangeUpdate {
    /// Exchange this update belongs to.
    #[must_use]
    pub fn exchange(&self) -> u64 {
        match self {
            Self::Streaming { exchange }
            | Self::Delta { exchange, .. }
            | Self::Finished { exchange, .. }
            | Self::Failed { exchange, .. } => *exchange,
        }
    }
}

/// Drive one exchange to completion, cancellation or failure.
pub(crate) async fn drive(
    transport: Arc<dyn ChatTransport>,
    history: Vec<UiMessage>,
    exchange: u64,
    cancel: CancellationToken,
    tx: mpsc::UnboundedSender<ExchangeUpdate>,
) {
    // A closed channel means the controller is gone; nothing left to report to.
    let report = |update: ExchangeUpdate| {
        let _ = tx.send(update);
    };

    let stream = tokio::select! {
        () = cancel.cancelled() => {
            tracing::debug!(exchange, "Exchange cancelled before the transport answered");
            report(ExchangeUpdate::Finished { exchange, cancelled: true });
            return;
        }
        started = transport.send(history) => match started {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(name: "exchange.failed", exchange, error = %e, "Transport refused exchange");
                report(ExchangeUpdate::Failed { exchange, error: e.to_string() });
                return;
            }
        },
    };

    let message_id = Uuid::new_v4().to_string();
    futures::pin_mut!(stream);

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                tracing::info!(name: "exchange.stopped", exchange, "Exchange stopped on request");
                report(ExchangeUpdate::Finished { exchange, cancelled: true });
                return;
            }
            next = stream.next() => match next {
                Some(Ok(NormalizedEvent::StreamStart { request_id })) => {
                    tracing::debug!(exchange, request_id = %request_id, "Exchange streaming");
                    report(ExchangeUpdate::Streaming { exchange });
                }
                Some(Ok(NormalizedEvent::MessageDelta { text })) => {
                    report(ExchangeUpdate::Delta {
                        exchange,
                        message_id: message_id.clone(),
                        text,
                    });
                }
                Some(Ok(NormalizedEvent::Error { message, code })) => {
                    tracing::warn!(name: "exchange.failed", exchange, error = %message, code = ?code, "Transport reported error");
                    report(ExchangeUpdate::Failed { exchange, error: message });
                    return;
                }
                Some(Ok(NormalizedEvent::Done)) | None => {
                    tracing::info!(name: "exchange.finished", exchange, "Exchange complete");
                    report(ExchangeUpdate::Finished { exchange, cancelled: false });
                    return;
                }
                Some(Err(e)) => {
                    tracing::warn!(name: "exchange.failed", exchange, error = %e, "Stream interrupted");
                    report(ExchangeUpdate::Failed { exchange, error: e.to_string() });
                    return;
                }
            },
        }
    }
}
