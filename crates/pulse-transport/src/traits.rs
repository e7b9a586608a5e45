//! Adapter contract shared by every Pulse transport.
//!
//! A transport is split in two halves: a [`Connector`] that knows how to open
//! the transport against a URL, and the [`Adapter`] it returns, which owns the
//! underlying resource for exactly one connection attempt. Adapters report
//! what happens to them as [`AdapterEvent`]s through an [`EventSink`], so the
//! stream supervisor never has to know which transport it is talking to.

use bytes::Bytes;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use url::Url;

/// Lifecycle state of an adapter or a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ReadyState {
    /// Handshake in progress.
    Connecting = 0,
    /// Ready to exchange messages.
    Open = 1,
    /// Close requested, waiting for the close event.
    Closing = 2,
    /// Terminal.
    Closed = 3,
}

impl ReadyState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Connecting,
            1 => Self::Open,
            2 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

impl fmt::Display for ReadyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// A [`ReadyState`] shared between an adapter handle and its I/O tasks.
#[derive(Debug, Clone)]
pub struct SharedReadyState(Arc<AtomicU8>);

impl SharedReadyState {
    /// Create a shared state starting in `Connecting`.
    #[must_use]
    pub fn new() -> Self {
        Self(Arc::new(AtomicU8::new(ReadyState::Connecting as u8)))
    }

    /// Current state.
    #[must_use]
    pub fn get(&self) -> ReadyState {
        ReadyState::from_u8(self.0.load(Ordering::SeqCst))
    }

    /// Replace the state, returning the previous one.
    pub fn swap(&self, state: ReadyState) -> ReadyState {
        ReadyState::from_u8(self.0.swap(state as u8, Ordering::SeqCst))
    }

    /// Move from `from` to `to`; returns `false` if the state was not `from`.
    pub fn transition(&self, from: ReadyState, to: ReadyState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

impl Default for SharedReadyState {
    fn default() -> Self {
        Self::new()
    }
}

/// An opaque application message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// UTF-8 text.
    Text(String),
    /// Raw bytes.
    Binary(Bytes),
}

impl Payload {
    /// Borrow the payload as bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Binary(data) => data,
        }
    }

    /// Length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// Whether the payload carries no data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The payload as text, if it is text.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Binary(_) => None,
        }
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<Bytes> for Payload {
    fn from(data: Bytes) -> Self {
        Self::Binary(data)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(data: Vec<u8>) -> Self {
        Self::Binary(Bytes::from(data))
    }
}

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection was closed.
    #[error("Connection closed")]
    ConnectionClosed,

    /// The transport could not be opened.
    #[error("Connect failed: {0}")]
    ConnectFailed(String),

    /// Failed to send data.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Failed to receive data.
    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Whether this error came from the send path.
    #[must_use]
    pub fn is_send_failure(&self) -> bool {
        matches!(self, Self::SendFailed(_))
    }
}

/// Something that happened to an adapter.
#[derive(Debug)]
pub enum AdapterEvent {
    /// The transport is ready.
    Open,
    /// A message arrived.
    Message(Payload),
    /// The transport failed.
    Error(TransportError),
    /// The transport closed.
    Close,
}

/// Identifies one adapter instance within a stream.
pub type AdapterId = u64;

/// Delivers adapter events to the supervisor, tagged with the adapter's id.
#[derive(Debug, Clone)]
pub struct EventSink {
    id: AdapterId,
    tx: mpsc::UnboundedSender<(AdapterId, AdapterEvent)>,
}

impl EventSink {
    /// Create a sink for adapter `id`.
    #[must_use]
    pub fn new(id: AdapterId, tx: mpsc::UnboundedSender<(AdapterId, AdapterEvent)>) -> Self {
        Self { id, tx }
    }

    /// Create a sink together with its receiving end.
    #[must_use]
    pub fn channel(
        id: AdapterId,
    ) -> (Self, mpsc::UnboundedReceiver<(AdapterId, AdapterEvent)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(id, tx), rx)
    }

    /// The adapter id events are tagged with.
    #[must_use]
    pub fn id(&self) -> AdapterId {
        self.id
    }

    /// Deliver an event. Returns `false` once the receiver is gone.
    pub fn emit(&self, event: AdapterEvent) -> bool {
        self.tx.send((self.id, event)).is_ok()
    }
}

/// One live connection attempt over a concrete transport.
///
/// Adapters are driven by background tasks and never block the caller.
/// Dropping an adapter must release its resources and cancel its timers.
pub trait Adapter: Send {
    /// Name of the transport behind this adapter.
    fn name(&self) -> &'static str;

    /// Current lifecycle state.
    fn ready_state(&self) -> ReadyState;

    /// Send a payload. Failures are reported as [`AdapterEvent::Error`].
    fn send(&mut self, payload: Payload);

    /// Close the adapter and emit [`AdapterEvent::Close`].
    ///
    /// Safe to call more than once; only the first call emits the event.
    fn close(&mut self);
}

/// Opens adapters for one transport.
pub trait Connector: Send + Sync {
    /// Transport name (e.g., "websocket", "polling").
    fn name(&self) -> &'static str;

    /// Start connecting to `url`; events for the new adapter go to `events`.
    ///
    /// Must be called from within a tokio runtime.
    fn connect(&self, url: &Url, events: EventSink) -> Box<dyn Adapter>;
}
