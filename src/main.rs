mod event;
mod progress;
mod sse;
mod state;
mod ui;
mod watcher;

use crate::sse::{SourceError, SourceOptions};
use crate::ui::page::{BAR_ID, ETA_ID, Page};
use clap::Parser;
use reqwest::Url;
use std::error::Error;
use tracing_subscriber::EnvFilter;

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";
const DEFAULT_STREAM_PATH: &str = "/progreso";

/// Application configuration from CLI
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Follow a server-sent progress stream in the terminal")]
pub struct Config {
    /// Base URL of the server publishing progress.
    /// If omitted, the PROGRESS_URL env var is used, then http://127.0.0.1:5000.
    #[arg(long)]
    pub url: Option<String>,
    /// Path of the event stream on that server
    #[arg(long, default_value = DEFAULT_STREAM_PATH)]
    pub path: String,
    /// Id of the progress bar element
    #[arg(long, default_value = BAR_ID)]
    pub bar_id: String,
    /// Id of the remaining-time element
    #[arg(long, default_value = ETA_ID)]
    pub eta_id: String,
    /// Print "<percent>\t<eta>" lines to stdout instead of the full-screen UI
    #[arg(long)]
    pub pipe: bool,
    /// Leave the full-screen UI as soon as progress completes
    #[arg(long)]
    pub exit_on_done: bool,
    /// Give up after this many consecutive failed reconnects (default: retry forever)
    #[arg(long)]
    pub max_retries: Option<u32>,
    /// Enable backend logging to stderr (filter with RUST_LOG)
    #[arg(long)]
    pub debug_log: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: None,
            path: DEFAULT_STREAM_PATH.to_string(),
            bar_id: BAR_ID.to_string(),
            eta_id: ETA_ID.to_string(),
            pipe: false,
            exit_on_done: false,
            max_retries: None,
            debug_log: false,
        }
    }
}

impl Config {
    /// Full URL of the event stream: base URL joined with the stream path.
    pub fn stream_url(&self) -> Result<String, SourceError> {
        let base = self.url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        let base = Url::parse(base).map_err(|e| SourceError::InvalidUrl(format!("{base}: {e}")))?;
        let joined = base
            .join(&self.path)
            .map_err(|e| SourceError::InvalidUrl(format!("{}: {e}", self.path)))?;
        Ok(joined.to_string())
    }

    /// Page holding the bar and eta elements under the configured ids.
    pub fn page(&self) -> Page {
        Page::with_elements([self.bar_id.as_str(), self.eta_id.as_str()])
    }

    pub fn source_options(&self) -> SourceOptions {
        SourceOptions {
            max_retries: self.max_retries,
            ..Default::default()
        }
    }
}

fn url_from_env_if_empty(cli: &mut Config) {
    if cli.url.is_none()
        && let Ok(s) = std::env::var("PROGRESS_URL")
    {
        let s = s.trim();
        if !s.is_empty() {
            cli.url = Some(s.to_string());
        }
    }
}

fn init_logging(cfg: &Config) {
    if !cfg.debug_log {
        return;
    }
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let mut cfg = Config::parse();
    url_from_env_if_empty(&mut cfg);
    init_logging(&cfg);

    let result = if cfg.pipe {
        crate::ui::pipe::display_progress_pipe(cfg.clone()).await
    } else {
        crate::ui::modern::display_progress_modern(cfg.clone()).await
    };

    // Print error if any, for better diagnostics
    if let Err(e) = result {
        eprintln!("Error: {}", e);
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_url_defaults_to_local_progreso() {
        assert_eq!(Config::default().stream_url().unwrap(), "http://127.0.0.1:5000/progreso");
    }

    #[test]
    fn stream_url_joins_base_and_path() {
        let cfg = Config {
            url: Some("https://example.com/app/".into()),
            path: "/progreso".into(),
            ..Default::default()
        };
        assert_eq!(cfg.stream_url().unwrap(), "https://example.com/progreso");

        let cfg = Config {
            url: Some("https://example.com/app/".into()),
            path: "events".into(),
            ..Default::default()
        };
        assert_eq!(cfg.stream_url().unwrap(), "https://example.com/app/events");
    }

    #[test]
    fn stream_url_rejects_garbage() {
        let cfg = Config {
            url: Some("::nope".into()),
            ..Default::default()
        };
        assert!(matches!(cfg.stream_url(), Err(SourceError::InvalidUrl(_))));
    }

    #[test]
    fn cli_flags_parse() {
        let cfg = Config::try_parse_from([
            "progress-watch",
            "--url",
            "http://host:8000",
            "--pipe",
            "--max-retries",
            "4",
            "--bar-id",
            "bar",
        ])
        .unwrap();
        assert!(cfg.pipe);
        assert_eq!(cfg.max_retries, Some(4));
        assert_eq!(cfg.bar_id, "bar");
        assert_eq!(cfg.eta_id, ETA_ID);
        assert_eq!(cfg.path, DEFAULT_STREAM_PATH);
        assert_eq!(cfg.source_options().max_retries, Some(4));
        assert!(cfg.page().resolve("bar").is_some());
        assert!(cfg.page().resolve(ETA_ID).is_some());
    }
}
