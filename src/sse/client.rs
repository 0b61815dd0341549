//! `EventSource`: a long-lived `text/event-stream` subscription.
//!
//! Behaves like the browser primitive: it connects in the background,
//! reconnects after network errors or a clean EOF (resuming with
//! `Last-Event-ID`), honours the server's `retry:` field and gives up for good
//! on an HTTP error status or a non event-stream content type.

use crate::sse::parse::{EventDecoder, SseEvent};
use futures_util::StreamExt;
use once_cell::sync::Lazy;
use rand::Rng;
use reqwest::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE};
use reqwest::{Client, StatusCode, Url};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

// No overall request timeout: the response body never ends on its own.
static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .user_agent(concat!("progress-watch/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(10))
        .build()
        .expect("failed to build HTTP client")
});

const MAX_BACKOFF: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Invalid stream URL: {0}")]
    InvalidUrl(String),
    #[error("Event stream answered HTTP {0}")]
    Status(u16),
    #[error("Unexpected content type: {0:?}")]
    ContentType(String),
    #[error("Gave up after {0} reconnect attempts")]
    RetriesExhausted(u32),
}

impl SourceError {
    /// Fatal errors close the source instead of scheduling a reconnect.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SourceError::Network(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadyState {
    #[default]
    Connecting,
    Open,
    Closed,
}

impl ReadyState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => ReadyState::Connecting,
            1 => ReadyState::Open,
            _ => ReadyState::Closed,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            ReadyState::Connecting => 0,
            ReadyState::Open => 1,
            ReadyState::Closed => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEvent {
    Open,
    Message(SseEvent),
    Error(String),
}

#[derive(Debug, Clone)]
pub struct SourceOptions {
    /// Initial reconnection time; the server may change it with `retry:`.
    pub reconnect: Duration,
    /// Consecutive failed attempts tolerated before closing. `None` retries forever.
    pub max_retries: Option<u32>,
    pub channel_capacity: usize,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            reconnect: Duration::from_millis(3000),
            max_retries: None,
            channel_capacity: 32,
        }
    }
}

#[derive(Clone)]
struct SharedState(Arc<AtomicU8>);

impl SharedState {
    fn get(&self) -> ReadyState {
        ReadyState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn set(&self, state: ReadyState) {
        self.0.store(state.as_u8(), Ordering::Release);
    }
}

pub struct EventSource {
    url: Url,
    rx: mpsc::Receiver<SourceEvent>,
    state: SharedState,
    closed: bool,
    task: JoinHandle<()>,
}

impl EventSource {
    /// Start connecting to `url` in the background. Returns immediately.
    pub fn connect(url: &str, options: SourceOptions) -> Result<Self, SourceError> {
        let url = Url::parse(url).map_err(|e| SourceError::InvalidUrl(format!("{url}: {e}")))?;
        let (tx, rx) = mpsc::channel(options.channel_capacity.max(1));
        let state = SharedState(Arc::new(AtomicU8::new(ReadyState::Connecting.as_u8())));
        let task = tokio::spawn(run(url.clone(), options, tx, state.clone()));
        Ok(Self {
            url,
            rx,
            state,
            closed: false,
            task,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn ready_state(&self) -> ReadyState {
        if self.closed {
            ReadyState::Closed
        } else {
            self.state.get()
        }
    }

    /// Next event in delivery order. `None` once the source is closed.
    pub async fn next(&mut self) -> Option<SourceEvent> {
        if self.closed {
            return None;
        }
        self.rx.recv().await
    }

    /// Close the subscription. Buffered events are dropped.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.task.abort();
        self.rx.close();
        self.state.set(ReadyState::Closed);
        tracing::debug!(url = %self.url, "event source closed");
    }
}

impl Drop for EventSource {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn open_stream(url: &Url, last_event_id: Option<&str>) -> Result<reqwest::Response, SourceError> {
    let mut req = HTTP_CLIENT
        .get(url.clone())
        .header(ACCEPT, "text/event-stream")
        .header(CACHE_CONTROL, "no-cache");
    if let Some(id) = last_event_id {
        req = req.header("Last-Event-ID", id);
    }
    let resp = req.send().await?;

    let status = resp.status();
    if !status.is_success() || status == StatusCode::NO_CONTENT {
        return Err(SourceError::Status(status.as_u16()));
    }

    let content_type = resp
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    if !content_type.to_ascii_lowercase().starts_with("text/event-stream") {
        return Err(SourceError::ContentType(content_type));
    }
    Ok(resp)
}

/// Delay before the next attempt: the reconnection time, doubled for each
/// consecutive failure, capped, with +-10% jitter.
pub(crate) fn reconnect_delay(base: Duration, failures: u32) -> Duration {
    let factor = 1u32 << failures.saturating_sub(1).min(16);
    let delay = base.saturating_mul(factor).min(MAX_BACKOFF);
    let jitter: f64 = rand::rng().random_range(0.9_f64..=1.1_f64);
    let ms = ((delay.as_millis() as f64) * jitter).round() as u64;
    Duration::from_millis(ms.max(10))
}

async fn run(url: Url, options: SourceOptions, tx: mpsc::Sender<SourceEvent>, state: SharedState) {
    let mut decoder = EventDecoder::new();
    let mut reconnect = options.reconnect;
    let mut failures: u32 = 0;

    loop {
        state.set(ReadyState::Connecting);
        match open_stream(&url, decoder.last_event_id()).await {
            Ok(resp) => {
                state.set(ReadyState::Open);
                tracing::info!(url = %url, "event stream open");
                if tx.send(SourceEvent::Open).await.is_err() {
                    return;
                }
                decoder.reset_stream();
                let mut delivered = false;
                let mut interrupted = false;
                let mut body = resp.bytes_stream();
                while let Some(chunk) = body.next().await {
                    match chunk {
                        Ok(bytes) => {
                            for ev in decoder.feed(&bytes) {
                                if !delivered {
                                    delivered = true;
                                    failures = 0;
                                }
                                if tx.send(SourceEvent::Message(ev)).await.is_err() {
                                    return;
                                }
                            }
                            if let Some(r) = decoder.take_retry() {
                                reconnect = r;
                            }
                        }
                        Err(e) => {
                            tracing::warn!(url = %url, error = %e, "event stream interrupted");
                            if tx.send(SourceEvent::Error(e.to_string())).await.is_err() {
                                return;
                            }
                            interrupted = true;
                            break;
                        }
                    }
                }
                // A connection that dropped or never produced an event counts
                // against the retry budget.
                if interrupted || !delivered {
                    failures += 1;
                }
                tracing::debug!(url = %url, failures, "event stream ended, reconnecting");
            }
            Err(e) if e.is_fatal() => {
                tracing::error!(url = %url, error = %e, "event stream failed");
                state.set(ReadyState::Closed);
                let _ = tx.send(SourceEvent::Error(e.to_string())).await;
                return;
            }
            Err(e) => {
                failures += 1;
                tracing::warn!(url = %url, error = %e, failures, "event stream connect failed");
                if tx.send(SourceEvent::Error(e.to_string())).await.is_err() {
                    return;
                }
            }
        }

        if let Some(max) = options.max_retries
            && failures > max
        {
            let e = SourceError::RetriesExhausted(max);
            tracing::error!(url = %url, error = %e, "event stream failed");
            state.set(ReadyState::Closed);
            let _ = tx.send(SourceEvent::Error(e.to_string())).await;
            return;
        }

        state.set(ReadyState::Connecting);
        let delay = reconnect_delay(reconnect, failures);
        tracing::debug!(url = %url, delay_ms = delay.as_millis() as u64, "scheduling reconnect");
        tokio::time::sleep(delay).await;
    }
}
