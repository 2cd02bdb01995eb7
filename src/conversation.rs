//! Conversation state for a single chat session.
//!
//! Holds the ordered message list and reconciles it with the outcome of
//! each request. Nothing here performs I/O: `submit` and `reload` hand back a
//! [`Dispatch`] for the caller to send, and the caller reports the result
//! through [`Conversation::on_success`] or [`Conversation::on_error`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::chat::ChatPayload;
use crate::client::{ApiResponse, TransportError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub sender: Sender,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            text: text.into(),
            error: None,
        }
    }

    pub fn bot(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::Bot,
            text: text.into(),
            error: None,
        }
    }
}

/// How a failed exchange shows up in the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorDisplay {
    /// Attach the error to the user message that failed.
    #[default]
    Annotate,
    /// Append a bot message carrying the error text.
    Reply,
}

impl ErrorDisplay {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "annotate" => Some(ErrorDisplay::Annotate),
            "reply" => Some(ErrorDisplay::Reply),
            _ => None,
        }
    }
}

/// Identity of one request/response exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExchangeId(pub u64);

/// A request that should be sent on behalf of the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub id: ExchangeId,
    pub payload: ChatPayload,
}

/// Pulls the reply text out of a chat response body.
///
/// The server answers `{"response": "..."}`; a body wrapped one level deeper
/// in `data` is accepted as well.
pub fn reply_text(response: &ApiResponse) -> Option<&str> {
    let body = &response.data;
    body.get("response")
        .or_else(|| body.get("data").and_then(|data| data.get("response")))
        .and_then(Value::as_str)
}

#[derive(Debug)]
pub struct Conversation {
    messages: Vec<Message>,
    thread_id: Option<String>,
    error_message: Option<String>,
    error_display: ErrorDisplay,
    send_thread_id: bool,
    next_exchange: u64,
    // exchange -> index of the user message it was sent for
    targets: HashMap<ExchangeId, usize>,
    // index of the user message whose latest exchange failed
    failed: Option<usize>,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new(ErrorDisplay::default(), true)
    }
}

impl Conversation {
    pub fn new(error_display: ErrorDisplay, send_thread_id: bool) -> Self {
        Self {
            messages: Vec::new(),
            thread_id: None,
            error_message: None,
            error_display,
            send_thread_id,
            next_exchange: 0,
            targets: HashMap::new(),
            failed: None,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn thread_id(&self) -> Option<&str> {
        self.thread_id.as_deref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Returns the session's thread id, generating it the first time.
    pub fn ensure_thread_id(&mut self) -> &str {
        self.thread_id
            .get_or_insert_with(|| Uuid::new_v4().to_string())
            .as_str()
    }

    /// Handles a user submission.
    ///
    /// Whitespace-only text is ignored. Otherwise the page error is cleared,
    /// a user message is appended unless one with identical text already
    /// exists, and a dispatch for `text` is returned.
    pub fn submit(&mut self, text: &str) -> Option<Dispatch> {
        if text.trim().is_empty() {
            return None;
        }

        self.error_message = None;

        let target = match self
            .messages
            .iter()
            .rposition(|m| m.sender == Sender::User && m.text == text)
        {
            Some(existing) => {
                tracing::debug!(index = existing, "suppressed duplicate user message");
                existing
            }
            None => {
                self.messages.push(Message::user(text));
                self.messages.len() - 1
            }
        };

        let payload = if self.send_thread_id {
            let thread_id = self.ensure_thread_id().to_string();
            ChatPayload::with_thread(text, thread_id)
        } else {
            ChatPayload::new(text)
        };

        let id = ExchangeId(self.next_exchange);
        self.next_exchange += 1;
        self.targets.insert(id, target);

        Some(Dispatch { id, payload })
    }

    pub fn on_success(&mut self, id: ExchangeId, response: &ApiResponse) {
        if let Some(target) = self.targets.remove(&id) {
            if let Some(msg) = self.messages.get_mut(target) {
                msg.error = None;
            }
            if self.failed == Some(target) {
                self.failed = None;
            }
        }

        let text = match reply_text(response) {
            Some(text) => text.to_string(),
            None => {
                tracing::warn!(exchange = id.0, "chat response has no response field");
                String::new()
            }
        };
        self.messages.push(Message::bot(text));
    }

    pub fn on_error(&mut self, id: ExchangeId, error: &TransportError) {
        let message = error.user_message();
        let target = self.targets.remove(&id).or_else(|| {
            self.messages
                .iter()
                .rposition(|m| m.sender == Sender::User)
        });

        match self.error_display {
            ErrorDisplay::Annotate => {
                if let Some(msg) = target.and_then(|i| self.messages.get_mut(i)) {
                    msg.error = Some(message.clone());
                }
            }
            ErrorDisplay::Reply => {
                self.messages.push(Message::bot(message.clone()));
            }
        }

        self.failed = target;
        self.error_message = Some(message);
    }

    /// Drops bookkeeping for an exchange whose outcome will never be applied.
    pub fn forget(&mut self, id: ExchangeId) {
        self.targets.remove(&id);
    }

    /// The most recent user message whose exchange failed.
    pub fn failed_message(&self) -> Option<&Message> {
        self.failed.and_then(|i| self.messages.get(i))
    }

    /// Re-sends the most recent failed message with its original text.
    pub fn reload(&mut self) -> Option<Dispatch> {
        let index = self.failed.take()?;
        let msg = self.messages.get_mut(index)?;

        msg.error = None;
        let text = msg.text.clone();
        self.error_message = None;

        self.submit(&text)
    }

    #[cfg(test)]
    pub(crate) fn pending_exchanges(&self) -> usize {
        self.targets.len()
    }
}
