use serde::Serialize;

use crate::client::{ApiClient, ApiResponse, TransportError};

pub const CHAT_PATH: &str = "/chat";

/// Body of `POST /chat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatPayload {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
}

impl ChatPayload {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            thread_id: None,
        }
    }

    pub fn with_thread(message: impl Into<String>, thread_id: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            thread_id: Some(thread_id.into()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ChatService {
    client: ApiClient,
}

impl ChatService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Sends one chat message. The response is returned as-is; interpreting
    /// the reply field is left to the caller.
    pub async fn send(&self, payload: &ChatPayload) -> Result<ApiResponse, TransportError> {
        self.client.post(CHAT_PATH, payload).await
    }
}
