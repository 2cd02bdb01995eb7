use tokio::sync::mpsc;

use crate::chat::ChatService;
use crate::client::{ApiResponse, TransportError};
use crate::conversation::{Dispatch, ExchangeId};
use crate::tui::AppEvent;

/// Result of one exchange, delivered back to the event loop.
#[derive(Debug)]
pub struct Settlement {
    pub id: ExchangeId,
    pub outcome: Result<ApiResponse, TransportError>,
}

/// Runs chat requests in the background and tracks which one is current.
///
/// Only the most recently triggered exchange counts as pending; a settlement
/// for an older exchange is discarded by [`Mutation::settle`].
pub struct Mutation {
    latest: Option<ExchangeId>,
    events: mpsc::UnboundedSender<AppEvent>,
}

impl Mutation {
    pub fn new(events: mpsc::UnboundedSender<AppEvent>) -> Self {
        Self {
            latest: None,
            events,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.latest.is_some()
    }

    pub fn trigger(&mut self, service: &ChatService, dispatch: Dispatch) {
        let Dispatch { id, payload } = dispatch;
        let service = service.clone();
        let events = self.events.clone();

        tracing::info!(exchange = id.0, chars = payload.message.chars().count(), "sending chat message");
        self.latest = Some(id);

        tokio::spawn(async move {
            let outcome = service.send(&payload).await;
            // Receiver is gone only when the app is shutting down.
            let _ = events.send(AppEvent::Settled(Settlement { id, outcome }));
        });
    }

    /// Accepts a settlement. Returns it back if it belongs to the latest
    /// exchange, which also ends the pending state.
    pub fn settle(&mut self, settlement: Settlement) -> Option<Settlement> {
        if self.latest != Some(settlement.id) {
            tracing::warn!(exchange = settlement.id.0, "dropping settlement for superseded exchange");
            return None;
        }

        self.latest = None;
        match &settlement.outcome {
            Ok(response) => {
                tracing::info!(exchange = settlement.id.0, status = response.status, "chat reply received")
            }
            Err(err) => tracing::warn!(exchange = settlement.id.0, error = %err, "chat request failed"),
        }
        Some(settlement)
    }
}
