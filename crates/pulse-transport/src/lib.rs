//! # pulse-transport
//!
//! Transport adapters for Pulse streams.
//!
//! This crate provides a unified interface over the ways a client can reach
//! a Pulse endpoint:
//!
//! - **WebSocket** - Native bidirectional socket, preferred
//! - **Polling** - Socket emulation over HTTP GET/POST, works through anything
//!
//! ## Transport Abstraction
//!
//! Every transport implements [`Connector`], which opens an [`Adapter`]
//! reporting [`AdapterEvent`]s through an [`EventSink`]. The
//! [`TransportCatalog`] lists transports in preference order together with a
//! capability probe for each.
//!
//! ```rust,ignore
//! use tenvis_pulse_transport::{EventSink, StandardTransports, TransportCatalog};
//!
//! let catalog = TransportCatalog::standard(&StandardTransports::default());
//! let (sink, mut events) = EventSink::channel(1);
//! if let Some(connector) = catalog.probe("websocket").connector() {
//!     let adapter = connector.connect(&url, sink);
//! }
//! ```

pub mod catalog;
pub mod traits;

#[cfg(feature = "websocket")]
pub mod websocket;

#[cfg(feature = "polling")]
pub mod polling;

pub use catalog::{Capability, PollingOptions, StandardTransports, TransportCatalog, TransportEntry};
pub use traits::{
    Adapter, AdapterEvent, AdapterId, Connector, EventSink, Payload, ReadyState,
    SharedReadyState, TransportError,
};

#[cfg(feature = "websocket")]
pub use websocket::WebSocketConnector;

#[cfg(feature = "polling")]
pub use polling::{polling_url, PollingConnector};
