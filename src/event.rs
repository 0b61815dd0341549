use crate::sse::{EventSource, ReadyState, SourceEvent, parse::DEFAULT_EVENT_TYPE};
use crate::state::{StatusBundle, Update, WatchState};
use crate::watcher::ProgressWatcher;
use tokio::sync::mpsc;

#[derive(Debug)]
pub enum Event {
    Source(SourceEvent),
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// Sends snapshots to the renderer, skipping ones it has already seen.
pub struct UpdateSink {
    tx: mpsc::Sender<Update>,
    last_sent: Option<u64>,
}

impl UpdateSink {
    pub fn new(tx: mpsc::Sender<Update>) -> Self {
        Self { tx, last_sent: None }
    }

    pub async fn send_update(&mut self, watcher: &ProgressWatcher, status: &StatusBundle, force: bool) {
        if !force && self.last_sent == Some(status.version) {
            return;
        }
        if self.tx.send(watcher.snapshot(status)).await.is_ok() {
            self.last_sent = Some(status.version);
        }
    }
}

pub async fn process_event(
    event: Event,
    watcher: &mut ProgressWatcher,
    source: &mut EventSource,
    status: &mut StatusBundle,
    sink: &mut UpdateSink,
) -> Flow {
    match event {
        Event::Source(ev) => handle_source_event(ev, watcher, source, status, sink).await,
        Event::Shutdown => {
            source.close();
            status.set_connection(ReadyState::Closed);
            sink.send_update(watcher, status, true).await;
            Flow::Stop
        }
    }
}

async fn handle_source_event(
    event: SourceEvent,
    watcher: &mut ProgressWatcher,
    source: &mut EventSource,
    status: &mut StatusBundle,
    sink: &mut UpdateSink,
) -> Flow {
    match event {
        SourceEvent::Open => {
            status.set_connection(ReadyState::Open);
        }
        SourceEvent::Error(msg) => {
            status.set_connection(source.ready_state());
            status.set_error(Some(msg));
        }
        SourceEvent::Message(msg) => {
            // Only unnamed events carry progress reports.
            if msg.event != DEFAULT_EVENT_TYPE {
                tracing::debug!(event = %msg.event, "ignoring named event");
                return Flow::Continue;
            }
            match watcher.handle_message(&msg.data) {
                Ok(changed) => {
                    if changed {
                        status.bump();
                    }
                    status.set_error(None);
                }
                Err(e) => {
                    tracing::warn!(error = %e, id = ?msg.id, data = %msg.data, "skipping malformed progress message");
                    status.set_error(Some(e.to_string()));
                }
            }
            if watcher.state() == WatchState::Done {
                source.close();
                status.set_connection(ReadyState::Closed);
                status.bump();
                tracing::info!(url = %source.url(), "progress complete, stream closed");
                sink.send_update(watcher, status, true).await;
                return Flow::Stop;
            }
        }
    }
    sink.send_update(watcher, status, false).await;
    Flow::Continue
}

/// Drive a watcher from its event source until completion, a fatal stream
/// error or a shutdown request. Returns the final watch state.
pub async fn listen(
    mut watcher: ProgressWatcher,
    mut source: EventSource,
    update_tx: mpsc::Sender<Update>,
    mut shutdown_rx: mpsc::Receiver<()>,
) -> WatchState {
    let mut status = StatusBundle::new();
    let mut sink = UpdateSink::new(update_tx);
    sink.send_update(&watcher, &status, true).await;

    loop {
        let event = tokio::select! {
            biased;
            Some(()) = shutdown_rx.recv() => Event::Shutdown,
            ev = source.next() => match ev {
                Some(ev) => Event::Source(ev),
                None => {
                    // The source gave up on its own.
                    status.set_connection(ReadyState::Closed);
                    sink.send_update(&watcher, &status, false).await;
                    break;
                }
            },
        };
        if process_event(event, &mut watcher, &mut source, &mut status, &mut sink).await == Flow::Stop {
            break;
        }
    }
    watcher.state()
}
