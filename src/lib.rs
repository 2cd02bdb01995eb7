pub mod app;
pub mod chat;
pub mod client;
pub mod config;
pub mod conversation;
pub mod handler;
pub mod logging;
pub mod mutation;
pub mod tui;
pub mod ui;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export main types for convenience
pub use chat::{ChatPayload, ChatService};
pub use client::{ApiClient, ApiResponse, TransportError};
pub use config::Config;
pub use conversation::{Conversation, ErrorDisplay, Message, Sender};
