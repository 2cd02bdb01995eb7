use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use colored::*;

use kira_chat::app::App;
use kira_chat::config::{Config, Overrides};
use kira_chat::conversation::{reply_text, Conversation, ErrorDisplay};
use kira_chat::tui::{self, EventHandler, Tui};
use kira_chat::{handler, logging, ui, ApiClient, ChatService};

#[derive(Parser)]
#[command(name = "kira", version)]
#[command(about = "Terminal chat client for the KIRA assistant")]
struct Cli {
    /// Base URL of the chat API
    #[arg(long, env = "KIRA_API_URL")]
    api_url: Option<String>,
    /// Request timeout in seconds
    #[arg(long, env = "KIRA_TIMEOUT_SECS")]
    timeout: Option<u64>,
    /// Send messages without a thread id
    #[arg(long)]
    no_thread_id: bool,
    /// How failed requests are shown: annotate or reply
    #[arg(long, value_parser = parse_error_display)]
    error_display: Option<ErrorDisplay>,
    /// Write logs here instead of the default data directory
    #[arg(long)]
    log_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a single message and print the reply
    Send {
        /// The message to send
        message: String,
    },
}

fn parse_error_display(s: &str) -> Result<ErrorDisplay, String> {
    ErrorDisplay::from_str(s).ok_or_else(|| format!("expected 'annotate' or 'reply', got '{}'", s))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_path = match &cli.log_file {
        Some(path) => path.clone(),
        None => logging::default_log_path()?,
    };
    logging::init(&log_path)?;

    let config = Config::load()?.apply(Overrides {
        api_url: cli.api_url,
        timeout_secs: cli.timeout,
        no_thread_id: cli.no_thread_id,
        error_display: cli.error_display,
    });

    match cli.command {
        Some(Commands::Send { message }) => send_once(&config, &message).await,
        None => run_tui(&config).await,
    }
}

async fn send_once(config: &Config, message: &str) -> Result<()> {
    let service = ChatService::new(ApiClient::new(config.api_url()?, config.timeout())?);
    let mut conversation = Conversation::new(config.error_display, config.thread_ids);

    let Some(dispatch) = conversation.submit(message) else {
        println!("{}", "Nothing to send".yellow());
        return Ok(());
    };

    match service.send(&dispatch.payload).await {
        Ok(response) => {
            println!("{}", format!("{}:", config.bot_name).bold().yellow());
            println!("{}", reply_text(&response).unwrap_or_default());
            Ok(())
        }
        Err(e) => {
            tracing::warn!(error = %e, "one-shot send failed");
            Err(anyhow!(e.user_message()))
        }
    }
}

async fn run_tui(config: &Config) -> Result<()> {
    let mut events = EventHandler::new();
    // Built before touching the terminal so config errors print normally
    let mut app = App::new(config, events.sender())?;

    tui::install_panic_hook();
    let mut terminal = tui::init()?;

    let result = run_loop(&mut terminal, &mut app, &mut events).await;

    tui::restore()?;
    result
}

async fn run_loop(terminal: &mut Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event).await?,
            None => break,
        }
    }
    tracing::info!("shutting down");
    Ok(())
}
