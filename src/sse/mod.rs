//! Server-sent events: wire framing plus a reconnecting `EventSource` client.

pub mod client;
pub mod parse;

pub use client::{EventSource, ReadyState, SourceError, SourceEvent, SourceOptions};
pub use parse::{EventDecoder, SseEvent};
