//! The consumer-facing stream handle.
//!
//! A [`Stream`] is a cheap, cloneable handle to a supervisor task that owns
//! the actual connection. Sends and closes are queued to that task; callbacks
//! come back through the [`StreamHandler`] given at construction.

use crate::config::StreamConfig;
use crate::handler::StreamHandler;
use crate::supervisor::Supervisor;
use std::fmt;
use tenvis_pulse_transport::{Payload, ReadyState, TransportCatalog, TransportError};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use url::Url;

/// Public lifecycle state of a stream.
pub type ConnectionState = ReadyState;

/// Unique identifier for a stream, used in logs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamId(pub String);

impl StreamId {
    /// Create a new stream ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a stream ID from the current time.
    #[must_use]
    pub fn generate() -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        Self(format!("stream_{:x}", timestamp))
    }

    /// Get the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stream errors.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The endpoint URL could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The configuration cannot drive a stream.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Send attempted while no transport is connected.
    #[error("Not connected")]
    NotConnected,

    /// The transport failed while sending.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// No usable transport is left in the catalog.
    #[error("No usable transport at or after catalog position {position}")]
    Exhausted {
        /// Cursor position when the search failed.
        position: usize,
    },

    /// The stream has already shut down.
    #[error("Stream closed")]
    Closed,
}

pub(crate) enum Command {
    Send(Payload),
    Close,
}

/// Handle to a running stream.
#[derive(Clone)]
pub struct Stream {
    id: StreamId,
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
}

impl fmt::Debug for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}

impl Stream {
    /// The stream's identifier.
    #[must_use]
    pub fn id(&self) -> &StreamId {
        &self.id
    }

    /// Send a payload over whichever transport is current.
    ///
    /// If no transport is connected the handler's `on_error` receives
    /// [`StreamError::NotConnected`]; nothing is queued for later.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Closed`] if the stream has already shut down.
    pub fn send(&self, payload: impl Into<Payload>) -> Result<(), StreamError> {
        self.commands
            .send(Command::Send(payload.into()))
            .map_err(|_| StreamError::Closed)
    }

    /// Close the stream. The handler's `on_close` fires once it is done.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Closed`] if the stream has already shut down.
    pub fn close(&self) -> Result<(), StreamError> {
        self.commands
            .send(Command::Close)
            .map_err(|_| StreamError::Closed)
    }

    /// Current public state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Wait until the stream reaches [`ConnectionState::Closed`].
    pub async fn closed(&self) {
        let mut state = self.state.clone();
        let _ = state.wait_for(|s| *s == ConnectionState::Closed).await;
    }
}

/// Builds a [`Stream`] with custom configuration or transports.
#[derive(Debug, Clone, Default)]
pub struct StreamBuilder {
    config: StreamConfig,
    catalog: Option<TransportCatalog>,
}

impl StreamBuilder {
    /// Start from the default configuration and the standard catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `config`.
    #[must_use]
    pub fn config(mut self, config: StreamConfig) -> Self {
        self.config = config;
        self
    }

    /// Use `catalog` instead of the one derived from the configuration.
    #[must_use]
    pub fn catalog(mut self, catalog: TransportCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Start the stream.
    ///
    /// The first transport that probes usable must be able to make progress:
    /// a catalog with no usable entry ends the stream with
    /// [`StreamError::Exhausted`].
    ///
    /// # Errors
    ///
    /// Returns an error if `url` is not a valid URL or the configuration is
    /// rejected by [`StreamConfig::validate`].
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn connect<H: StreamHandler>(self, url: &str, handler: H) -> Result<Stream, StreamError> {
        self.config.validate().map_err(StreamError::InvalidConfig)?;
        let url = Url::parse(url)?;
        let catalog = self.catalog.unwrap_or_else(|| self.config.catalog());

        let id = StreamId::generate();
        let (commands, commands_rx) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(ConnectionState::Connecting);

        let supervisor = Supervisor::new(
            id.clone(),
            url,
            catalog,
            &self.config,
            handler,
            commands_rx,
            state_tx,
        );
        tokio::spawn(supervisor.run());

        Ok(Stream {
            id,
            commands,
            state,
        })
    }
}

/// Open a stream to `url` with the default configuration.
///
/// # Errors
///
/// Returns an error if `url` is not a valid URL.
pub fn create_stream<H: StreamHandler>(url: &str, handler: H) -> Result<Stream, StreamError> {
    StreamBuilder::new().connect(url, handler)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_id_generation() {
        let id = StreamId::generate();
        assert!(id.as_str().starts_with("stream_"));
        assert_eq!(StreamId::new("s-1").to_string(), "s-1");
    }

    #[tokio::test]
    async fn test_create_stream_rejects_invalid_url() {
        assert!(matches!(
            create_stream("not a url", ()),
            Err(StreamError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_connect_rejects_zero_heartbeat_interval() {
        let config = StreamConfig {
            heartbeat_interval_ms: 0,
            ..Default::default()
        };

        let result = StreamBuilder::new()
            .config(config)
            .connect("ws://127.0.0.1:8080/ws", ());
        assert!(matches!(result, Err(StreamError::InvalidConfig(_))));
    }

    /// An HTTP-only endpoint: the WebSocket handshake gets a plain 200, polls
    /// get one queued message.
    #[cfg(all(feature = "websocket", feature = "polling"))]
    #[tokio::test]
    async fn test_stream_falls_back_to_polling_on_http_only_server() {
        use crate::handler::StreamEvent;
        use axum::{http::HeaderMap, routing::get, Router};
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::Arc;
        use std::time::Duration;
        use tenvis_pulse_transport::polling::{TRANSPORT_HEADER, TRANSPORT_HEADER_VALUE};
        use tokio::net::TcpListener;

        let delivered = Arc::new(AtomicBool::new(false));
        let poll = move |headers: HeaderMap| {
            let delivered = Arc::clone(&delivered);
            async move {
                let polling = headers
                    .get(TRANSPORT_HEADER)
                    .is_some_and(|v| v == TRANSPORT_HEADER_VALUE);
                if polling && !delivered.swap(true, Ordering::SeqCst) {
                    "hello".to_string()
                } else {
                    String::new()
                }
            }
        };
        let app = Router::new().route("/stream", get(poll).post(|| async { String::new() }));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let config = StreamConfig {
            backoff_base_ms: 10,
            heartbeat_interval_ms: 20_000,
            ..Default::default()
        };
        let (tx, mut events) = mpsc::unbounded_channel();
        let stream = StreamBuilder::new()
            .config(config)
            .connect(&format!("ws://{}/stream", addr), tx)
            .unwrap();

        let mut before_message = Vec::new();
        let payload = tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                match events.recv().await {
                    Some(StreamEvent::Message(payload)) => break payload,
                    Some(event) => before_message.push(event),
                    None => panic!("stream ended before a message arrived"),
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(payload.as_text(), Some("hello"));
        assert_eq!(before_message.len(), 1, "{:?}", before_message);
        assert!(matches!(before_message[0], StreamEvent::Open));
        assert_eq!(stream.state(), ConnectionState::Open);

        stream.close().unwrap();
        tokio::time::timeout(Duration::from_secs(5), stream.closed())
            .await
            .unwrap();
        assert_eq!(stream.state(), ConnectionState::Closed);
    }
}
