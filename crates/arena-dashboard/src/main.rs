mod app;
mod channel;
mod config;
mod prefs;
mod rest;
mod theme;
mod ui;

use anyhow::{Context, Result};
use app::{handle_input, App, Requests};
use arena_core::ArenaState;
use channel::{channel_loop, ChannelConfig};
use chrono::Utc;
use clap::Parser;
use config::{initial_range, Args, Config};
use crossterm::{
    event::EventStream,
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures_util::StreamExt;
use prefs::{default_prefs_path, Prefs};
use ratatui::{backend::CrosstermBackend, Terminal};
use rest::{brain_poll_loop, spawn_brain_poll, spawn_panel_fetch, spawn_state_fetch, RestClient, RestUpdate};
use std::{
    fs::OpenOptions,
    io,
    path::{Path, PathBuf},
    sync::Mutex,
    time::Duration,
};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const TICK: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::from_args(&args)?;
    init_logging(config.log_file.as_deref())?;

    let prefs_path = config.prefs_path.clone().or_else(default_prefs_path);
    let saved = load_prefs(prefs_path.as_deref());
    let range = initial_range(args.range.as_deref(), saved.range.as_deref());
    info!("arena_start: server={} range={range}", config.base_url);

    let mut app = App::new(
        ArenaState::new(range, Utc::now()),
        config.start_page,
        config.expand_instance.clone(),
    );

    let client = RestClient::new(config.base_url.clone());
    let (channel_tx, channel_rx) = mpsc::channel(256);
    let (rest_tx, rest_rx) = mpsc::channel(64);
    tokio::spawn(channel_loop(
        ChannelConfig {
            url: config.ws_url.clone(),
            reconnect: config.reconnect,
            ping_interval: config.ping_interval,
        },
        channel_tx,
    ));
    tokio::spawn(brain_poll_loop(client.clone(), config.brain_poll, rest_tx.clone()));
    spawn_state_fetch(client.clone(), range, rest_tx.clone());
    spawn_panel_fetch(client.clone(), rest_tx.clone());

    let mut terminal = setup_terminal()?;
    let result = run_app(
        &mut terminal,
        &mut app,
        Runtime {
            client,
            rest_tx,
            prefs_path,
        },
        channel_rx,
        rest_rx,
    )
    .await;
    restore_terminal(&mut terminal)?;
    result
}

struct Runtime {
    client: RestClient,
    rest_tx: mpsc::Sender<RestUpdate>,
    prefs_path: Option<PathBuf>,
}

impl Runtime {
    fn dispatch(&self, app: &App, requests: Requests) {
        if requests.refetch_state {
            spawn_state_fetch(self.client.clone(), app.state.range, self.rest_tx.clone());
        }
        if requests.refresh_all {
            spawn_panel_fetch(self.client.clone(), self.rest_tx.clone());
            spawn_brain_poll(self.client.clone(), self.rest_tx.clone());
        }
        if requests.persist_range {
            let Some(path) = self.prefs_path.as_deref() else {
                return;
            };
            let prefs = Prefs {
                range: Some(app.state.range.as_str().to_string()),
            };
            if let Err(err) = prefs::save(path, &prefs) {
                warn!("prefs_save_error: {err}");
            }
        }
    }
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    runtime: Runtime,
    mut channel_rx: mpsc::Receiver<channel::ChannelEvent>,
    mut rest_rx: mpsc::Receiver<RestUpdate>,
) -> Result<()> {
    let mut events = EventStream::new();
    let mut ticker = tokio::time::interval(TICK);

    loop {
        terminal.draw(|frame| ui::render_ui(frame, app, Utc::now()))?;
        let mut requests = Requests::default();
        tokio::select! {
            _ = ticker.tick() => {}
            Some(event) = channel_rx.recv() => {
                app.apply_channel_event(event, Utc::now(), &mut requests);
            }
            Some(update) = rest_rx.recv() => {
                app.apply_rest_update(update, Utc::now());
            }
            maybe_event = events.next() => {
                match maybe_event {
                    Some(Ok(event)) => {
                        if handle_input(event, app, &mut requests) {
                            break;
                        }
                    }
                    Some(Err(err)) => warn!("input_error: {err}"),
                    None => break,
                }
            }
        }
        runtime.dispatch(app, requests);
    }
    Ok(())
}

fn load_prefs(path: Option<&Path>) -> Prefs {
    let Some(path) = path else {
        return Prefs::default();
    };
    prefs::load(path).unwrap_or_else(|err| {
        warn!("prefs_load_error: {err}");
        Prefs::default()
    })
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

/// The alternate screen owns stdout, so logs go to a file or nowhere unless
/// `ARENA_LOG_STDOUT` is set.
fn init_logging(log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if let Some(path) = log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .try_init();
        return Ok(());
    }
    let stdout_enabled = matches!(
        std::env::var("ARENA_LOG_STDOUT").ok().as_deref(),
        Some("1") | Some("true") | Some("TRUE") | Some("yes") | Some("YES")
    );
    if stdout_enabled {
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    } else {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::sink)
            .try_init();
    }
    Ok(())
}
