//! Transport catalog.
//!
//! An ordered list of candidate transports. Each entry carries a capability
//! probe that either hands back a [`Connector`] or explains why the transport
//! cannot be used here. Order is preference: the first usable entry wins.

use crate::traits::Connector;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Result of probing a transport.
#[derive(Clone)]
pub enum Capability {
    /// The transport can be used.
    Usable(Arc<dyn Connector>),
    /// The transport is not constructible in this build or environment.
    Unavailable,
    /// The transport is present but excluded by policy.
    Excluded {
        /// Why it was excluded.
        reason: String,
    },
}

impl Capability {
    /// The connector, if usable.
    #[must_use]
    pub fn connector(&self) -> Option<&Arc<dyn Connector>> {
        match self {
            Self::Usable(connector) => Some(connector),
            _ => None,
        }
    }

    /// Whether the transport can be used.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        matches!(self, Self::Usable(_))
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Usable(connector) => write!(f, "Usable({})", connector.name()),
            Self::Unavailable => f.write_str("Unavailable"),
            Self::Excluded { reason } => write!(f, "Excluded({reason})"),
        }
    }
}

type Probe = Arc<dyn Fn() -> Capability + Send + Sync>;

/// A named transport and its capability probe.
#[derive(Clone)]
pub struct TransportEntry {
    name: &'static str,
    probe: Probe,
}

impl TransportEntry {
    /// Create an entry from a probe function.
    pub fn new<F>(name: &'static str, probe: F) -> Self
    where
        F: Fn() -> Capability + Send + Sync + 'static,
    {
        Self {
            name,
            probe: Arc::new(probe),
        }
    }

    /// An entry that is always usable through `connector`.
    pub fn always(connector: Arc<dyn Connector>) -> Self {
        let name = connector.name();
        Self::new(name, move || Capability::Usable(Arc::clone(&connector)))
    }

    /// Transport name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Run the capability probe.
    #[must_use]
    pub fn probe(&self) -> Capability {
        (self.probe)()
    }
}

impl fmt::Debug for TransportEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportEntry")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Ordered transports, most preferred first.
#[derive(Debug, Clone, Default)]
pub struct TransportCatalog {
    entries: Vec<TransportEntry>,
}

impl TransportCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry, builder style.
    #[must_use]
    pub fn with_entry(mut self, entry: TransportEntry) -> Self {
        self.entries.push(entry);
        self
    }

    /// Append an entry.
    pub fn push(&mut self, entry: TransportEntry) {
        self.entries.push(entry);
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&TransportEntry> {
        self.entries.get(index)
    }

    /// Transport names in preference order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(TransportEntry::name).collect()
    }

    /// Probe the transport called `name`.
    ///
    /// Unknown names probe as [`Capability::Unavailable`].
    #[must_use]
    pub fn probe(&self, name: &str) -> Capability {
        self.entries
            .iter()
            .find(|entry| entry.name == name)
            .map_or(Capability::Unavailable, TransportEntry::probe)
    }

    /// The standard catalog: WebSocket, then HTTP polling.
    #[must_use]
    pub fn standard(transports: &StandardTransports) -> Self {
        Self::new()
            .with_entry(websocket_entry(transports.websocket))
            .with_entry(polling_entry(transports.polling, transports.polling_options.clone()))
    }
}

/// Timing of the polling emulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollingOptions {
    /// Delay before the synthetic open event.
    pub open_delay: Duration,
    /// Delay between one poll response and the next request.
    pub poll_interval: Duration,
}

impl Default for PollingOptions {
    fn default() -> Self {
        Self {
            open_delay: Duration::from_millis(100),
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// Which standard transports are enabled.
#[derive(Debug, Clone)]
pub struct StandardTransports {
    /// Enable the WebSocket transport.
    pub websocket: bool,
    /// Enable the HTTP polling transport.
    pub polling: bool,
    /// Polling timing.
    pub polling_options: PollingOptions,
}

impl Default for StandardTransports {
    fn default() -> Self {
        Self {
            websocket: true,
            polling: true,
            polling_options: PollingOptions::default(),
        }
    }
}

fn disabled() -> Capability {
    Capability::Excluded {
        reason: "disabled by configuration".to_string(),
    }
}

#[cfg(feature = "websocket")]
fn websocket_entry(enabled: bool) -> TransportEntry {
    let connector: Arc<dyn Connector> = Arc::new(crate::websocket::WebSocketConnector::new());
    TransportEntry::new("websocket", move || {
        if enabled {
            Capability::Usable(Arc::clone(&connector))
        } else {
            disabled()
        }
    })
}

#[cfg(not(feature = "websocket"))]
fn websocket_entry(enabled: bool) -> TransportEntry {
    TransportEntry::new("websocket", move || {
        if enabled {
            Capability::Unavailable
        } else {
            disabled()
        }
    })
}

#[cfg(feature = "polling")]
fn polling_entry(enabled: bool, options: PollingOptions) -> TransportEntry {
    let connector: Arc<dyn Connector> = Arc::new(crate::polling::PollingConnector::new(options));
    TransportEntry::new("polling", move || {
        if enabled {
            Capability::Usable(Arc::clone(&connector))
        } else {
            disabled()
        }
    })
}

#[cfg(not(feature = "polling"))]
fn polling_entry(enabled: bool, _options: PollingOptions) -> TransportEntry {
    TransportEntry::new("polling", move || {
        if enabled {
            Capability::Unavailable
        } else {
            disabled()
        }
    })
}
