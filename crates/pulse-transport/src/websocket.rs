//! WebSocket transport implementation.
//!
//! This module provides a client-side WebSocket adapter using tokio-tungstenite.
//! It is a thin pass-through: frames in, frames out.

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{Error as WsError, Message},
};
use tracing::{debug, warn};
use url::Url;

use crate::traits::{
    Adapter, AdapterEvent, Connector, EventSink, Payload, ReadyState, SharedReadyState,
    TransportError,
};

/// Opens [`WebSocketAdapter`]s.
#[derive(Debug, Clone, Default)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    /// Create a new WebSocket connector.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Connector for WebSocketConnector {
    fn name(&self) -> &'static str {
        "websocket"
    }

    fn connect(&self, url: &Url, events: EventSink) -> Box<dyn Adapter> {
        Box::new(WebSocketAdapter::spawn(url.clone(), events))
    }
}

enum Outbound {
    Send(Payload),
    Close,
}

/// A WebSocket connection attempt.
pub struct WebSocketAdapter {
    state: SharedReadyState,
    events: EventSink,
    outbound: mpsc::UnboundedSender<Outbound>,
    task: JoinHandle<()>,
}

impl WebSocketAdapter {
    /// Start connecting to `url` in the background.
    pub fn spawn(url: Url, events: EventSink) -> Self {
        let state = SharedReadyState::new();
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(drive(url, state.clone(), events.clone(), outbound_rx));

        Self {
            state,
            events,
            outbound,
            task,
        }
    }
}

impl Adapter for WebSocketAdapter {
    fn name(&self) -> &'static str {
        "websocket"
    }

    fn ready_state(&self) -> ReadyState {
        self.state.get()
    }

    fn send(&mut self, payload: Payload) {
        if self.state.get() != ReadyState::Open {
            self.events.emit(AdapterEvent::Error(TransportError::SendFailed(
                "WebSocket is not open".into(),
            )));
            return;
        }

        if self.outbound.send(Outbound::Send(payload)).is_err() {
            self.events.emit(AdapterEvent::Error(TransportError::SendFailed(
                "WebSocket writer has stopped".into(),
            )));
        }
    }

    fn close(&mut self) {
        match self.state.swap(ReadyState::Closed) {
            ReadyState::Closed => return,
            // Still handshaking: nothing to close gracefully.
            ReadyState::Connecting => self.task.abort(),
            _ => {
                let _ = self.outbound.send(Outbound::Close);
            }
        }

        self.events.emit(AdapterEvent::Close);
    }
}

impl Drop for WebSocketAdapter {
    fn drop(&mut self) {
        // An open connection winds down on its own once `outbound` is dropped.
        if self.state.get() == ReadyState::Connecting {
            self.task.abort();
        }
    }
}

fn into_message(payload: Payload) -> Message {
    match payload {
        Payload::Text(text) => Message::Text(text),
        Payload::Binary(data) => Message::Binary(data.to_vec()),
    }
}

fn fail(state: &SharedReadyState, events: &EventSink, error: TransportError) {
    if state.swap(ReadyState::Closed) != ReadyState::Closed {
        events.emit(AdapterEvent::Error(error));
    }
}

fn finish(state: &SharedReadyState, events: &EventSink) {
    if state.swap(ReadyState::Closed) != ReadyState::Closed {
        events.emit(AdapterEvent::Close);
    }
}

async fn drive(
    url: Url,
    state: SharedReadyState,
    events: EventSink,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
) {
    let ws_stream = match connect_async(url.as_str()).await {
        Ok((ws_stream, _response)) => ws_stream,
        Err(e) => {
            debug!(url = %url, error = %e, "WebSocket handshake failed");
            fail(
                &state,
                &events,
                TransportError::ConnectFailed(format!("WebSocket handshake failed: {}", e)),
            );
            return;
        }
    };

    // Closed while the handshake was in flight
    if !state.transition(ReadyState::Connecting, ReadyState::Open) {
        return;
    }

    debug!(url = %url, "WebSocket handshake completed");
    events.emit(AdapterEvent::Open);

    let (mut sink, mut stream) = ws_stream.split();

    loop {
        tokio::select! {
            command = outbound.recv() => match command {
                Some(Outbound::Send(payload)) => {
                    if let Err(e) = sink.send(into_message(payload)).await {
                        fail(&state, &events, TransportError::SendFailed(e.to_string()));
                        return;
                    }
                }
                Some(Outbound::Close) | None => {
                    if let Err(e) = sink.close().await {
                        debug!(error = %e, "WebSocket close handshake failed");
                    }
                    return;
                }
            },

            inbound = stream.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    events.emit(AdapterEvent::Message(Payload::Text(text)));
                }
                Some(Ok(Message::Binary(data))) => {
                    events.emit(AdapterEvent::Message(Payload::Binary(Bytes::from(data))));
                }
                Some(Ok(Message::Ping(data))) => {
                    if let Err(e) = sink.send(Message::Pong(data)).await {
                        warn!("Failed to send pong: {}", e);
                    }
                }
                Some(Ok(Message::Pong(_) | Message::Frame(_))) => {}
                Some(Ok(Message::Close(_))) | Some(Err(WsError::ConnectionClosed)) | None => {
                    debug!(url = %url, "WebSocket closed by peer");
                    finish(&state, &events);
                    return;
                }
                Some(Err(e)) => {
                    debug!(url = %url, error = %e, "WebSocket error");
                    fail(&state, &events, TransportError::ReceiveFailed(e.to_string()));
                    return;
                }
            },
        }
    }
}
