//! Consumer callbacks.

use crate::stream::StreamError;
use tenvis_pulse_transport::Payload;
use tokio::sync::mpsc;

/// Callbacks a stream consumer registers.
///
/// All methods run on the stream's supervisor task, one at a time, and
/// default to doing nothing.
pub trait StreamHandler: Send + 'static {
    /// The stream opened. Called at most once per stream.
    fn on_open(&mut self) {}

    /// A message arrived.
    fn on_message(&mut self, _payload: Payload) {}

    /// The stream closed after [`Stream::close`](crate::Stream::close).
    fn on_close(&mut self) {}

    /// Periodic tick while connected.
    fn on_heartbeat(&mut self) {}

    /// A send could not be delivered, or the stream gave up.
    fn on_error(&mut self, _error: StreamError) {}
}

/// A callback, as a value.
#[derive(Debug)]
pub enum StreamEvent {
    /// See [`StreamHandler::on_open`].
    Open,
    /// See [`StreamHandler::on_message`].
    Message(Payload),
    /// See [`StreamHandler::on_close`].
    Close,
    /// See [`StreamHandler::on_heartbeat`].
    Heartbeat,
    /// See [`StreamHandler::on_error`].
    Error(StreamError),
}

/// Forward callbacks into a channel.
impl StreamHandler for mpsc::UnboundedSender<StreamEvent> {
    fn on_open(&mut self) {
        let _ = self.send(StreamEvent::Open);
    }

    fn on_message(&mut self, payload: Payload) {
        let _ = self.send(StreamEvent::Message(payload));
    }

    fn on_close(&mut self) {
        let _ = self.send(StreamEvent::Close);
    }

    fn on_heartbeat(&mut self) {
        let _ = self.send(StreamEvent::Heartbeat);
    }

    fn on_error(&mut self, error: StreamError) {
        let _ = self.send(StreamEvent::Error(error));
    }
}

/// Ignore every callback.
impl StreamHandler for () {}
