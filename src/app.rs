use ratatui::layout::Rect;
use tokio::sync::mpsc;

use crate::chat::ChatService;
use crate::client::ApiClient;
use crate::config::Config;
use crate::conversation::{Conversation, Dispatch, Sender};
use crate::mutation::{Mutation, Settlement};
use crate::tui::AppEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,

    // Input state
    pub input: String,
    pub input_cursor: usize, // cursor position in input, in chars

    // Chat state
    pub conversation: Conversation,
    pub mutation: Mutation,
    pub service: ChatService,
    pub bot_name: String,

    // Chat view state
    pub chat_scroll: u16,
    pub chat_height: u16, // Height of chat area for scroll calculations
    pub chat_width: u16,  // Width of chat area for wrap calculations
    pub chat_area: Option<Rect>,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation
}

impl App {
    /// Builds the app around a single API client shared for the whole session.
    pub fn new(config: &Config, events: mpsc::UnboundedSender<AppEvent>) -> anyhow::Result<Self> {
        let client = ApiClient::new(config.api_url()?, config.timeout())?;
        tracing::info!(base_url = client.base_url(), timeout_secs = config.timeout_secs, "chat client ready");

        let mut conversation = Conversation::new(config.error_display, config.thread_ids);
        if config.thread_ids {
            let thread_id = conversation.ensure_thread_id();
            tracing::info!(thread_id, "started chat thread");
        }

        Ok(Self {
            should_quit: false,
            input_mode: InputMode::Editing,

            input: String::new(),
            input_cursor: 0,

            conversation,
            mutation: Mutation::new(events),
            service: ChatService::new(client),
            bot_name: config.bot_name.clone(),

            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            chat_area: None,

            animation_frame: 0,
        })
    }

    pub fn is_pending(&self) -> bool {
        self.mutation.is_pending()
    }

    /// Sends whatever is in the input box. Ignored while a reply is pending.
    pub fn send_input(&mut self) {
        if self.is_pending() {
            return;
        }

        let text = self.input.clone();
        if let Some(dispatch) = self.conversation.submit(&text) {
            self.input.clear();
            self.input_cursor = 0;
            self.dispatch(dispatch);
        }
    }

    /// Retries the most recent failed message.
    pub fn reload(&mut self) {
        if self.is_pending() {
            return;
        }

        if let Some(dispatch) = self.conversation.reload() {
            self.dispatch(dispatch);
        }
    }

    fn dispatch(&mut self, dispatch: Dispatch) {
        self.mutation.trigger(&self.service, dispatch);
        self.animation_frame = 0;
        self.scroll_to_bottom();
    }

    pub fn apply_settlement(&mut self, settlement: Settlement) {
        let id = settlement.id;
        let Some(Settlement { outcome, .. }) = self.mutation.settle(settlement) else {
            self.conversation.forget(id);
            return;
        };

        match outcome {
            Ok(response) => self.conversation.on_success(id, &response),
            Err(err) => self.conversation.on_error(id, &err),
        }
        self.scroll_to_bottom();
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.is_pending() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    // Chat scrolling
    pub fn scroll_down(&mut self, lines: u16) {
        let max_scroll = self.max_scroll();
        self.chat_scroll = self.chat_scroll.saturating_add(lines).min(max_scroll);
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
    }

    pub fn scroll_page_down(&mut self) {
        let page = (self.visible_height() / 2).max(1);
        self.scroll_down(page);
    }

    pub fn scroll_page_up(&mut self) {
        let page = (self.visible_height() / 2).max(1);
        self.scroll_up(page);
    }

    /// Scroll chat to bottom so the newest message (or typing indicator) is visible
    pub fn scroll_to_bottom(&mut self) {
        self.chat_scroll = self.max_scroll();
    }

    /// Largest usable scroll offset. The paragraph offset is a u16, so very
    /// long conversations pin to `u16::MAX`.
    fn max_scroll(&self) -> u16 {
        let max = self
            .total_chat_lines()
            .saturating_sub(self.visible_height() as usize);
        u16::try_from(max).unwrap_or(u16::MAX)
    }

    fn visible_height(&self) -> u16 {
        if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        }
    }

    /// Line count of the rendered chat, matching the layout in `ui.rs`.
    fn total_chat_lines(&self) -> usize {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: usize = 0;

        for msg in self.conversation.messages() {
            let mut lines = 2; // Sender line ("You:" or bot name) + blank line after
            lines += wrapped_lines(&msg.text, wrap_width);
            if msg.sender == Sender::User && msg.error.is_some() {
                lines += 1; // Error + reload hint
            }
            total_lines = total_lines.saturating_add(lines);
        }

        if self.is_pending() {
            total_lines = total_lines.saturating_add(2); // Bot name + "is typing..."
        }

        total_lines
    }
}

fn wrapped_lines(text: &str, wrap_width: usize) -> usize {
    if text.is_empty() {
        return 1;
    }
    text.lines()
        .map(|line| {
            // Use character count, not byte length, for proper UTF-8 handling
            let char_count = line.chars().count();
            if char_count == 0 {
                1
            } else {
                (char_count / wrap_width) + 1
            }
        })
        .sum()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::client::{ApiResponse, TransportError};
    use crate::conversation::{ExchangeId, Message};
    use serde_json::json;

    /// App pointed at an address nothing listens on; sends fail fast.
    pub(crate) fn test_app() -> (App, mpsc::UnboundedReceiver<AppEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let config = Config {
            api_url: Some("http://127.0.0.1:9".to_string()),
            ..Config::default()
        };
        (App::new(&config, tx).unwrap(), rx)
    }

    fn ok(id: u64, text: &str) -> Settlement {
        Settlement {
            id: ExchangeId(id),
            outcome: Ok(ApiResponse {
                status: 200,
                data: json!({ "response": text }),
            }),
        }
    }

    #[test]
    fn test_missing_api_url_fails() {
        let (tx, _rx) = mpsc::unbounded_channel();
        assert!(App::new(&Config::default(), tx).is_err());
    }

    #[tokio::test]
    async fn test_thread_id_generated_on_start() {
        let (app, _rx) = test_app();
        assert!(app.conversation.thread_id().is_some());
    }

    #[tokio::test]
    async fn test_send_input_round_trip() {
        let (mut app, _rx) = test_app();
        app.input = "hello".to_string();
        app.input_cursor = 5;

        app.send_input();
        assert!(app.input.is_empty());
        assert_eq!(app.input_cursor, 0);
        assert!(app.is_pending());

        app.apply_settlement(ok(0, "hi there"));
        assert!(!app.is_pending());
        assert_eq!(
            app.conversation.messages(),
            &[Message::user("hello"), Message::bot("hi there")]
        );
    }

    #[tokio::test]
    async fn test_send_ignored_while_pending() {
        let (mut app, _rx) = test_app();
        app.input = "hello".to_string();
        app.send_input();

        app.input = "again".to_string();
        app.send_input();
        assert_eq!(app.input, "again");
        assert_eq!(app.conversation.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_blank_input_does_not_dispatch() {
        let (mut app, _rx) = test_app();
        app.input = "   ".to_string();
        app.send_input();
        assert!(!app.is_pending());
        assert!(app.conversation.is_empty());
        assert_eq!(app.input, "   ");
    }

    #[tokio::test]
    async fn test_failure_then_reload() {
        let (mut app, _rx) = test_app();
        app.input = "ping".to_string();
        app.send_input();
        app.apply_settlement(Settlement {
            id: ExchangeId(0),
            outcome: Err(TransportError::Timeout),
        });

        assert!(!app.is_pending());
        assert_eq!(app.conversation.messages().len(), 1);
        assert_eq!(
            app.conversation.messages()[0].error.as_deref(),
            Some("Connection Timeout")
        );

        app.reload();
        assert!(app.is_pending());
        assert!(app.conversation.error_message().is_none());
        assert_eq!(app.conversation.messages()[0].error, None);

        app.apply_settlement(ok(1, "pong"));
        assert_eq!(app.conversation.messages()[1], Message::bot("pong"));
    }

    #[tokio::test]
    async fn test_real_settlement_arrives_on_channel() {
        let (mut app, mut rx) = test_app();
        app.input = "hello".to_string();
        app.send_input();

        let settlement = loop {
            match rx.recv().await {
                Some(AppEvent::Settled(s)) => break s,
                Some(_) => continue,
                None => panic!("event channel closed"),
            }
        };
        app.apply_settlement(settlement);

        assert!(!app.is_pending());
        assert!(app.conversation.messages()[0].error.is_some());
    }

    #[test]
    fn test_wrapped_lines() {
        assert_eq!(wrapped_lines("", 10), 1);
        assert_eq!(wrapped_lines("short", 10), 1);
        assert_eq!(wrapped_lines("a\n\nb", 10), 3);
        assert_eq!(wrapped_lines(&"x".repeat(25), 10), 3);
        assert_eq!(wrapped_lines(&"x\n".repeat(70_000), 10), 70_000);
    }

    #[tokio::test]
    async fn test_huge_reply_pins_scroll_to_max() {
        let (mut app, _rx) = test_app();
        app.input = "hello".to_string();
        app.send_input();

        app.apply_settlement(ok(0, &"x\n".repeat(70_000)));
        assert!(!app.is_pending());
        assert_eq!(app.chat_scroll, u16::MAX);

        app.scroll_up(10);
        app.scroll_down(20);
        assert_eq!(app.chat_scroll, u16::MAX);
    }

    #[tokio::test]
    async fn test_superseded_settlement_releases_exchange() {
        let (mut app, _rx) = test_app();
        app.input = "hello".to_string();
        app.send_input();
        // a second exchange that never became the pending one
        let orphan = app.conversation.submit("other").unwrap();
        assert_eq!(app.conversation.pending_exchanges(), 2);

        app.apply_settlement(Settlement {
            id: orphan.id,
            outcome: Err(TransportError::Timeout),
        });
        assert!(app.is_pending());
        assert_eq!(app.conversation.pending_exchanges(), 1);
        assert!(app.conversation.error_message().is_none());

        app.apply_settlement(ok(0, "hi there"));
        assert_eq!(app.conversation.pending_exchanges(), 0);
    }
}
