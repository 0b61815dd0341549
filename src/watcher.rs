//! Progress watcher: binds a progress event stream to a bar and an eta label.
//!
//! `ProgressWatcher::start` resolves both elements, opens the stream and
//! hands everything to a background task (see `event::listen`). Each
//! message sets the bar's width and text to the percentage and the eta
//! label to the server's estimate. A message with `progreso >= 100` closes
//! the stream for good.

use crate::event;
use crate::progress::ProgressUpdate;
use crate::sse::{EventSource, SourceError, SourceOptions};
use crate::state::{StatusBundle, Update, WatchState};
use crate::ui::page::{ElementId, Page};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Element not found: {0}")]
    ElementNotFound(String),
    #[error("Malformed progress payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("Watcher task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Debug)]
pub struct ProgressWatcher {
    page: Page,
    bar: ElementId,
    eta: ElementId,
    state: WatchState,
}

impl ProgressWatcher {
    /// Bind to the bar and eta elements of `page`. Fails if either is absent.
    pub fn new(page: Page, bar_id: &str, eta_id: &str) -> Result<Self, WatchError> {
        let bar = page
            .resolve(bar_id)
            .ok_or_else(|| WatchError::ElementNotFound(bar_id.to_string()))?;
        let eta = page
            .resolve(eta_id)
            .ok_or_else(|| WatchError::ElementNotFound(eta_id.to_string()))?;
        Ok(Self {
            page,
            bar,
            eta,
            state: WatchState::Watching,
        })
    }

    /// Bind the elements, open the stream at `url` and process it in the
    /// background. Snapshots go to `update_tx` whenever the page changes.
    pub fn start(
        url: &str,
        options: SourceOptions,
        page: Page,
        bar_id: &str,
        eta_id: &str,
        update_tx: mpsc::Sender<Update>,
    ) -> Result<WatchHandle, WatchError> {
        let watcher = Self::new(page, bar_id, eta_id)?;
        let source = EventSource::connect(url, options)?;
        tracing::info!(url = %source.url(), bar = bar_id, eta = eta_id, "watching progress");
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let task = tokio::spawn(event::listen(watcher, source, update_tx, shutdown_rx));
        Ok(WatchHandle { shutdown_tx, task })
    }

    pub fn state(&self) -> WatchState {
        self.state
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Apply one message payload. Returns whether the page changed.
    ///
    /// Once `Done`, payloads are ignored without being parsed.
    pub fn handle_message(&mut self, data: &str) -> Result<bool, WatchError> {
        if self.state == WatchState::Done {
            return Ok(false);
        }
        let update = ProgressUpdate::parse(data)?;
        let changed = self.apply(&update);
        if update.is_complete() {
            self.state = WatchState::Done;
        }
        Ok(changed)
    }

    fn apply(&mut self, update: &ProgressUpdate) -> bool {
        let label = update.percent_label();
        let mut changed = self.page.set_width(&self.bar, &label);
        changed |= self.page.set_text(&self.bar, &label);
        changed |= self.page.set_text(&self.eta, &update.eta);
        changed
    }

    pub fn snapshot(&self, status: &StatusBundle) -> Update {
        Update {
            bar: self.page.element(&self.bar).cloned().unwrap_or_default(),
            eta: self.page.element(&self.eta).cloned().unwrap_or_default(),
            state: self.state,
            connection: status.connection,
            err: status.err.clone(),
            version: status.version,
        }
    }
}

/// Handle to a running watcher.
pub struct WatchHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<WatchState>,
}

impl WatchHandle {
    /// Close the stream and end the watcher task.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.try_send(());
    }

    /// Wait for the task to end and return the final state.
    pub async fn wait(self) -> Result<WatchState, WatchError> {
        Ok(self.task.await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::page::{BAR_ID, ETA_ID};

    fn watcher() -> ProgressWatcher {
        ProgressWatcher::new(Page::progress_page(), BAR_ID, ETA_ID).unwrap()
    }

    fn rendered(w: &ProgressWatcher) -> (Option<String>, String, String) {
        let bar = w.page().get(BAR_ID).cloned().unwrap_or_default();
        let eta = w.page().get(ETA_ID).cloned().unwrap_or_default();
        (bar.width, bar.text, eta.text)
    }

    #[test]
    fn missing_elements_fail_at_construction() {
        let err = ProgressWatcher::new(Page::with_elements([BAR_ID]), BAR_ID, ETA_ID).unwrap_err();
        assert!(matches!(err, WatchError::ElementNotFound(ref id) if id == ETA_ID));
        let err = ProgressWatcher::new(Page::progress_page(), "bar", ETA_ID).unwrap_err();
        assert!(matches!(err, WatchError::ElementNotFound(ref id) if id == "bar"));
    }

    #[test]
    fn renders_first_report() {
        let mut w = watcher();
        assert!(w.handle_message(r#"{"progreso": 0, "eta": "estimating…"}"#).unwrap());
        assert_eq!(rendered(&w), (Some("0%".into()), "0%".into(), "estimating…".into()));
        assert_eq!(w.state(), WatchState::Watching);
    }

    #[test]
    fn renders_midway_report() {
        let mut w = watcher();
        w.handle_message(r#"{"progreso": 57, "eta": "2m 10s"}"#).unwrap();
        assert_eq!(rendered(&w), (Some("57%".into()), "57%".into(), "2m 10s".into()));
        assert_eq!(w.state(), WatchState::Watching);
    }

    #[test]
    fn every_value_below_hundred_keeps_watching() {
        let mut w = watcher();
        for p in [0.0, 1.0, 33.3, 50.0, 99.0, 99.99] {
            let payload = serde_json::json!({ "progreso": p, "eta": format!("{p}s") }).to_string();
            w.handle_message(&payload).unwrap();
            let label = crate::progress::percent_label(p);
            assert_eq!(rendered(&w), (Some(label.clone()), label, format!("{p}s")));
            assert_eq!(w.state(), WatchState::Watching);
        }
    }

    #[test]
    fn hundred_completes_and_freezes_page() {
        let mut w = watcher();
        w.handle_message(r#"{"progreso": 100, "eta": "done"}"#).unwrap();
        assert_eq!(rendered(&w), (Some("100%".into()), "100%".into(), "done".into()));
        assert_eq!(w.state(), WatchState::Done);

        assert!(!w.handle_message(r#"{"progreso": 20, "eta": "again"}"#).unwrap());
        assert!(!w.handle_message("garbage").unwrap());
        assert_eq!(rendered(&w), (Some("100%".into()), "100%".into(), "done".into()));
    }

    #[test]
    fn overshoot_renders_literally_and_completes() {
        let mut w = watcher();
        w.handle_message(r#"{"progreso": 150, "eta": ""}"#).unwrap();
        assert_eq!(rendered(&w), (Some("150%".into()), "150%".into(), String::new()));
        assert_eq!(w.state(), WatchState::Done);
    }

    #[test]
    fn repeated_report_is_stable() {
        let mut w = watcher();
        let msg = r#"{"progreso": 40, "eta": "1m"}"#;
        assert!(w.handle_message(msg).unwrap());
        let first = rendered(&w);
        assert!(!w.handle_message(msg).unwrap());
        assert_eq!(rendered(&w), first);
    }

    #[test]
    fn malformed_payload_leaves_page_alone() {
        let mut w = watcher();
        w.handle_message(r#"{"progreso": 12, "eta": "5m"}"#).unwrap();
        let err = w.handle_message(r#"{"progress": 13}"#).unwrap_err();
        assert!(matches!(err, WatchError::MalformedPayload(_)));
        assert_eq!(rendered(&w), (Some("12%".into()), "12%".into(), "5m".into()));
        assert_eq!(w.state(), WatchState::Watching);
    }

    #[test]
    fn snapshot_copies_page_and_status() {
        let mut w = watcher();
        w.handle_message(r#"{"progreso": 5, "eta": "9m"}"#).unwrap();
        let mut status = StatusBundle::new();
        status.set_error(Some("hiccup".into()));
        let upd = w.snapshot(&status);
        assert_eq!(upd.bar.text, "5%");
        assert_eq!(upd.eta.text, "9m");
        assert_eq!(upd.err.as_deref(), Some("hiccup"));
        assert_eq!(upd.version, 1);
    }
}
