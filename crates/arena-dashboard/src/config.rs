use arena_core::TimeRange;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Parser, Debug, Clone)]
#[command(name = "crimson-arena", about = "Terminal dashboard for the agent pipeline")]
pub struct Args {
    /// Base URL of the arena server (REST and push channel).
    #[arg(long, env = "ARENA_SERVER_URL", default_value = "http://127.0.0.1:8000")]
    pub server_url: String,
    /// Starting range; overrides the saved preference.
    #[arg(long, env = "ARENA_RANGE")]
    pub range: Option<String>,
    #[arg(long, value_enum, default_value_t = Page::Home)]
    pub page: Page,
    /// Instance id to expand on the instances page.
    #[arg(long)]
    pub instance: Option<String>,
    #[arg(long, env = "ARENA_BRAIN_POLL_SECS", default_value_t = 60)]
    pub brain_poll_secs: u64,
    #[arg(long, env = "ARENA_RECONNECT_MS", default_value_t = 3_000)]
    pub reconnect_ms: u64,
    #[arg(long, default_value_t = 30)]
    pub ping_secs: u64,
    #[arg(long, env = "ARENA_PREFS_PATH")]
    pub prefs_path: Option<PathBuf>,
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Page {
    Home,
    Instances,
}

impl Page {
    pub fn title(&self) -> &'static str {
        match self {
            Page::Home => "HOME",
            Page::Instances => "INSTANCES",
        }
    }

    pub fn next(&self) -> Self {
        match self {
            Page::Home => Page::Instances,
            Page::Instances => Page::Home,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid server url {0:?}: {1}")]
    Url(String, url::ParseError),
    #[error("unsupported server scheme {0:?}")]
    Scheme(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: Url,
    pub ws_url: Url,
    pub start_page: Page,
    pub expand_instance: Option<String>,
    pub brain_poll: Duration,
    pub reconnect: Duration,
    pub ping_interval: Duration,
    pub prefs_path: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
}

impl Config {
    pub fn from_args(args: &Args) -> Result<Self, ConfigError> {
        let base_url = Url::parse(args.server_url.trim())
            .map_err(|err| ConfigError::Url(args.server_url.clone(), err))?;
        let ws_url = ws_url_for(&base_url)?;
        Ok(Self {
            base_url,
            ws_url,
            start_page: args.page,
            expand_instance: args.instance.clone().filter(|id| !id.trim().is_empty()),
            brain_poll: Duration::from_secs(args.brain_poll_secs.max(1)),
            reconnect: Duration::from_millis(args.reconnect_ms.max(100)),
            ping_interval: Duration::from_secs(args.ping_secs.max(1)),
            prefs_path: args.prefs_path.clone(),
            log_file: args.log_file.clone(),
        })
    }
}

/// `http` maps to `ws`, `https` to `wss`; the channel lives at `/ws`.
pub fn ws_url_for(base: &Url) -> Result<Url, ConfigError> {
    let scheme = match base.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(ConfigError::Scheme(other.to_string())),
    };
    let mut url = base.clone();
    url.set_scheme(scheme)
        .map_err(|_| ConfigError::Scheme(scheme.to_string()))?;
    url.set_path("/ws");
    url.set_query(None);
    Ok(url)
}

/// CLI flag first, then the saved preference, then `today`.
pub fn initial_range(flag: Option<&str>, saved: Option<&str>) -> TimeRange {
    flag.or(saved)
        .map(TimeRange::parse_lenient)
        .unwrap_or_default()
}
