use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{error, info, warn};

mod app;
mod browser;
mod client;
mod config;
mod handler;
mod lines;
mod logging;
mod session;
mod stream;
mod tui;
mod ui;

use app::App;
use browser::Browser;
use client::ChatClient;
use config::{Config, DEFAULT_MODEL, DEFAULT_PROMPT};
use lines::LineHistory;
use session::ChatSession;
use tui::{AppEvent, EventHandler};

#[derive(Parser)]
#[command(name = "charla")]
#[command(about = "Terminal chat client with streaming replies and browsable history")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the assistant (default)
    Chat {
        /// A prompt, or the name of a configured prompt template
        #[arg(short, long)]
        prompt: Option<String>,
        /// Shorthand for a personality to use as the speaking style for the prompt
        #[arg(long)]
        personality: Option<String>,
        /// The model to use for chat completion
        #[arg(short, long)]
        model: Option<String>,
        /// The temperature to use for chat completion
        #[arg(short, long)]
        temp: Option<f64>,
    },
    /// Browse saved chat sessions
    History,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = match Config::load() {
        Ok(config) => config,
        Err(err) => {
            // Logging is not up yet; the terminal is still in cooked mode.
            eprintln!("warning: ignoring unreadable config: {:#}", err);
            Config::default()
        }
    };

    let history_dir = config.history_dir()?;
    fs::create_dir_all(&history_dir).with_context(|| {
        format!(
            "could not create history directory {}",
            history_dir.display()
        )
    })?;
    logging::init(&history_dir)?;

    let command = cli.command.unwrap_or(Commands::Chat {
        prompt: None,
        personality: None,
        model: None,
        temp: None,
    });

    match command {
        Commands::Chat {
            prompt,
            personality,
            model,
            temp,
        } => run_chat(config, history_dir, prompt, personality, model, temp).await,
        Commands::History => run_history(history_dir).await,
    }
}

async fn run_chat(
    config: Config,
    history_dir: PathBuf,
    prompt: Option<String>,
    personality: Option<String>,
    model: Option<String>,
    temp: Option<f64>,
) -> Result<()> {
    let mut prompt_text = DEFAULT_PROMPT.to_string();
    if let Some(personality) = personality {
        prompt_text = format!("You answer in the speaking style of {}.", personality);
    }
    if let Some(prompt) = prompt {
        prompt_text = prompt;
    }
    // A prompt naming a configured template expands to the stored text.
    if let Some(template) = config.prompts.get(&prompt_text) {
        prompt_text = template.clone();
    }

    let client = ChatClient::new(&config.api_base_url(), config.api_key());
    let fallback = config
        .default_model
        .clone()
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());
    let requested = model.unwrap_or_else(|| fallback.clone());
    let model = resolve_model(&client, requested, fallback).await;
    let temperature = temp.or(config.default_temperature).unwrap_or(0.0);

    let session = ChatSession::new(&prompt_text, model, temperature);
    let lines = LineHistory::open(&history_dir.join("lines.txt"))?;
    let mut app = App::new(session, lines, client);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new();
    let sender = events.sender();
    let result = chat_loop(&mut terminal, &mut app, &mut events, &sender).await;
    tui::restore()?;
    if let Err(err) = &result {
        error!(%err, "chat loop failed");
    }
    result?;

    // Persist only at clean exit, and only if the user actually chatted.
    if let Some(path) = session::encode(&app.session, &history_dir)? {
        info!(path = %path.display(), "session saved");
    }
    Ok(())
}

/// Use the requested model if the endpoint offers it, otherwise fall back.
async fn resolve_model(client: &ChatClient, requested: String, fallback: String) -> String {
    choose_model(client.list_models().await, requested, fallback)
}

/// An unavailable model falls back to the configured default. When the model
/// list itself cannot be fetched, availability is unknown and the requested
/// model is kept unchecked, so endpoints without a model listing still work.
fn choose_model(available: Result<Vec<String>>, requested: String, fallback: String) -> String {
    match available {
        Ok(models) if models.iter().any(|m| m == &requested) => requested,
        Ok(_) => {
            warn!(model = %requested, %fallback, "model not available");
            fallback
        }
        Err(err) => {
            warn!(%err, "could not list models, using requested model unchecked");
            requested
        }
    }
}

async fn chat_loop(
    terminal: &mut tui::Tui,
    app: &mut App,
    events: &mut EventHandler,
    sender: &UnboundedSender<AppEvent>,
) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render_chat(app, frame))?;
        let Some(event) = events.next().await else {
            break;
        };
        handler::handle_event(app, event, sender)?;
    }

    // Make sure the bridge task is gone before the terminal is restored.
    if let Some(stream) = app.stream.take() {
        stream.shutdown().await;
    }
    Ok(())
}

async fn run_history(history_dir: PathBuf) -> Result<()> {
    let mut browser = Browser::new(history_dir)?;
    let theme = ui::Theme::default();

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new();
    let result = history_loop(&mut terminal, &mut browser, &mut events, &theme).await;
    tui::restore()?;
    result
}

async fn history_loop(
    terminal: &mut tui::Tui,
    browser: &mut Browser,
    events: &mut EventHandler,
    theme: &ui::Theme,
) -> Result<()> {
    while !browser.should_quit {
        terminal.draw(|frame| ui::render_browser(browser, frame, theme))?;
        let Some(event) = events.next().await else {
            break;
        };
        match event {
            AppEvent::Key(key) => browser.handle_key(key),
            AppEvent::Resize(_, _) | AppEvent::Tick => {}
            // No stream ever runs in the browser.
            AppEvent::StreamDelta(_) | AppEvent::StreamComplete | AppEvent::StreamError(_) => {}
        }
    }
    Ok(())
}
