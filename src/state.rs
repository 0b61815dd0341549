// state.rs: Watch state and the snapshots handed to renderers

use crate::sse::ReadyState;
use crate::ui::page::Element;

/// Lifecycle of a progress subscription. `Done` is terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WatchState {
    #[default]
    Watching,
    Done,
}

/// Represents a UI update for the progress page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    pub bar: Element,
    pub eta: Element,
    pub state: WatchState,
    pub connection: ReadyState,
    pub err: Option<String>,
    pub version: u64, // Incremented on any state change
}

/// Connection and error status tracked next to the page, plus versioning.
#[derive(Debug, Default)]
pub struct StatusBundle {
    pub connection: ReadyState,
    pub err: Option<String>,
    pub version: u64,
}

impl StatusBundle {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_connection(&mut self, connection: ReadyState) {
        if self.connection != connection {
            self.connection = connection;
            self.version += 1;
        }
    }
    pub fn set_error(&mut self, err: Option<String>) {
        if self.err != err {
            self.err = err;
            self.version += 1;
        }
    }
    pub fn bump(&mut self) {
        self.version += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_moves_only_on_change() {
        let mut status = StatusBundle::new();
        status.set_connection(ReadyState::Connecting);
        assert_eq!(status.version, 0);
        status.set_connection(ReadyState::Open);
        status.set_error(Some("boom".into()));
        status.set_error(Some("boom".into()));
        assert_eq!(status.version, 2);
        status.set_error(None);
        assert_eq!(status.version, 3);
    }
}
