//! # pulse-core
//!
//! A single logical message stream over whichever transport works.
//!
//! This crate provides the client side of a Pulse connection:
//!
//! - **Stream** - Handle the consumer sends and closes through
//! - **Supervisor** - Transport selection, fallback and reconnection
//! - **Cursor** - Position in the transport catalog
//! - **Backoff** - Growing delay between reconnect attempts
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Stream    │────▶│ Supervisor  │────▶│   Adapter   │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!        ▲                   │                   ▲
//!        │                   ▼                   │
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Handler    │◀────│   Cursor    │────▶│  Catalog    │
//! └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use tenvis_pulse_core::{create_stream, StreamEvent};
//!
//! # async fn run() -> Result<(), tenvis_pulse_core::StreamError> {
//! let (tx, mut events) = tokio::sync::mpsc::unbounded_channel();
//! let stream = create_stream("ws://127.0.0.1:8080/stream", tx)?;
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         StreamEvent::Open => stream.send("hello")?,
//!         StreamEvent::Message(payload) => println!("{:?}", payload),
//!         StreamEvent::Close => break,
//!         _ => {}
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod backoff;
pub mod config;
pub mod cursor;
pub mod handler;
pub mod metrics;
pub mod stream;
mod supervisor;

#[cfg(test)]
mod testing;

pub use backoff::Backoff;
pub use config::{StreamConfig, TransportConfig};
pub use cursor::{Cursor, Selection};
pub use handler::{StreamEvent, StreamHandler};
pub use stream::{create_stream, ConnectionState, Stream, StreamBuilder, StreamError, StreamId};
pub use tenvis_pulse_transport::{Payload, TransportCatalog};
