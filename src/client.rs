use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Request timeout used when the configuration does not override it.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Message carried by every timeout error.
pub const TIMEOUT_MESSAGE: &str = "Connection Timeout";

/// Last-resort text shown to the user when an error says nothing useful.
pub const FALLBACK_ERROR_MESSAGE: &str = "Something went wrong";

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("{}", TIMEOUT_MESSAGE)]
    Timeout,

    /// Non-2xx response. `body` is the parsed error body, or the raw text as a JSON string.
    #[error("Request failed with status code {status}")]
    Http { status: u16, body: Value },

    #[error("{message}")]
    Network { message: String },
}

impl TransportError {
    /// Text suitable for showing next to a failed message.
    ///
    /// Prefers a `message` field sent by the server, then this error's own
    /// description, then a fixed fallback.
    pub fn user_message(&self) -> String {
        if let TransportError::Http { body, .. } = self {
            if let Some(message) = body.get("message").and_then(Value::as_str) {
                if !message.trim().is_empty() {
                    return message.to_string();
                }
            }
        }

        let own = self.to_string();
        if own.trim().is_empty() {
            FALLBACK_ERROR_MESSAGE.to_string()
        } else {
            own
        }
    }

    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else {
            TransportError::Network {
                message: err.to_string(),
            }
        }
    }
}

/// A successful (2xx) response with its JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub data: Value,
}

/// HTTP client bound to one API host.
///
/// Built once per process; cloning shares the underlying connection pool.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(TransportError::from_reqwest)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse, TransportError> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(TransportError::from_reqwest)?;

        let status = response.status();
        let text = response.text().await.map_err(TransportError::from_reqwest)?;
        let data = parse_body(&text);

        if !status.is_success() {
            return Err(TransportError::Http {
                status: status.as_u16(),
                body: data,
            });
        }

        Ok(ApiResponse {
            status: status.as_u16(),
            data,
        })
    }
}

fn parse_body(text: &str) -> Value {
    if text.is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}
