//! Connection supervisor.
//!
//! One supervisor task runs per stream. It owns the current adapter, the
//! cursor, the backoff and the heartbeat, and is the only place the public
//! state changes.
//!
//! ```text
//!              open                      close()
//! Connecting ────────▶ Open ─────────────────────▶ Closing ──▶ Closed
//!   │   ▲               │  ▲                           ▲
//!   │   │ fallback      │  │ silent reconnect          │
//!   └───┘ (cursor+1)    └──┘ (same cursor)             └── adapter close
//! ```
//!
//! Failures before the first open move on to the next transport; failures
//! after it reconnect quietly. Both wait out the backoff first.

use crate::backoff::Backoff;
use crate::config::StreamConfig;
use crate::cursor::Cursor;
use crate::handler::StreamHandler;
use crate::metrics::{self, ConnectedGauge};
use crate::stream::{Command, ConnectionState, StreamError, StreamId};
use std::future::pending;
use std::pin::Pin;
use std::time::Duration;
use tenvis_pulse_transport::{
    Adapter, AdapterEvent, AdapterId, EventSink, Payload, TransportCatalog,
};
use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior, Sleep};
use tracing::{debug, error, info, warn};
use url::Url;

struct Current {
    id: AdapterId,
    name: &'static str,
    adapter: Box<dyn Adapter>,
}

pub(crate) struct Supervisor<H> {
    id: StreamId,
    url: Url,
    catalog: TransportCatalog,
    handler: H,

    state: ConnectionState,
    state_tx: watch::Sender<ConnectionState>,
    connected: bool,
    gauge: ConnectedGauge,

    cursor: Cursor,
    backoff: Backoff,
    heartbeat_interval: Duration,
    heartbeat: Option<Interval>,
    reconnect: Option<Pin<Box<Sleep>>>,

    current: Option<Current>,
    next_adapter_id: AdapterId,
    events_tx: mpsc::UnboundedSender<(AdapterId, AdapterEvent)>,
    events_rx: mpsc::UnboundedReceiver<(AdapterId, AdapterEvent)>,

    commands: mpsc::UnboundedReceiver<Command>,
    commands_open: bool,
}

impl<H: StreamHandler> Supervisor<H> {
    pub(crate) fn new(
        id: StreamId,
        url: Url,
        catalog: TransportCatalog,
        config: &StreamConfig,
        handler: H,
        commands: mpsc::UnboundedReceiver<Command>,
        state_tx: watch::Sender<ConnectionState>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        Self {
            id,
            url,
            catalog,
            handler,
            state: ConnectionState::Connecting,
            state_tx,
            connected: false,
            gauge: ConnectedGauge::default(),
            cursor: Cursor::new(),
            backoff: Backoff::new(config.backoff_base()).with_ceiling(config.max_backoff()),
            heartbeat_interval: config.heartbeat_interval(),
            heartbeat: None,
            reconnect: None,
            current: None,
            next_adapter_id: 0,
            events_tx,
            events_rx,
            commands,
            commands_open: true,
        }
    }

    /// Drive the stream until it reaches `Closed`.
    pub(crate) async fn run(mut self) {
        info!(
            stream = %self.id,
            url = %self.url,
            transports = ?self.catalog.names(),
            "Stream starting"
        );

        self.connect_next();

        while self.state != ConnectionState::Closed {
            tokio::select! {
                biased;

                Some((adapter_id, event)) = self.events_rx.recv() => {
                    self.on_adapter_event(adapter_id, event);
                }

                command = self.commands.recv(), if self.commands_open => match command {
                    Some(Command::Send(payload)) => self.send(payload),
                    Some(Command::Close) => self.close(),
                    None => {
                        debug!(stream = %self.id, "All stream handles dropped");
                        self.commands_open = false;
                        self.close();
                    }
                },

                () = wait_reconnect(&mut self.reconnect) => {
                    self.reconnect = None;
                    self.connect_next();
                }

                () = tick_heartbeat(&mut self.heartbeat) => self.on_heartbeat(),
            }
        }

        info!(stream = %self.id, "Stream closed");
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            debug!(stream = %self.id, from = %self.state, to = %state, "State change");
            self.state = state;
            self.state_tx.send_replace(state);
        }
    }

    fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
        self.gauge.set(connected);

        if connected {
            let period = self.heartbeat_interval;
            let mut heartbeat = interval_at(Instant::now() + period, period);
            heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
            self.heartbeat = Some(heartbeat);
        } else {
            self.heartbeat = None;
        }
    }

    /// Select the next usable transport and start an adapter on it.
    fn connect_next(&mut self) {
        let Some(selection) = self.cursor.select(&self.catalog) else {
            let position = self.cursor.position();
            error!(
                stream = %self.id,
                position,
                "No usable transport left in the catalog"
            );
            self.handler.on_error(StreamError::Exhausted { position });
            self.set_state(ConnectionState::Closed);
            return;
        };

        self.next_adapter_id += 1;
        let adapter_id = self.next_adapter_id;
        let sink = EventSink::new(adapter_id, self.events_tx.clone());

        debug!(
            stream = %self.id,
            transport = selection.name,
            cursor = selection.index,
            adapter = adapter_id,
            "Connecting"
        );
        metrics::record_attempt(selection.name);

        let adapter = selection.connector.connect(&self.url, sink);
        self.current = Some(Current {
            id: adapter_id,
            name: selection.name,
            adapter,
        });
    }

    fn on_adapter_event(&mut self, adapter_id: AdapterId, event: AdapterEvent) {
        let Some(current) = self.current.as_ref().filter(|c| c.id == adapter_id) else {
            debug!(stream = %self.id, adapter = adapter_id, "Ignoring event from stale adapter");
            return;
        };
        let transport = current.name;

        match event {
            AdapterEvent::Open => self.on_open(transport),
            AdapterEvent::Message(payload) => {
                if self.state != ConnectionState::Closing {
                    self.handler.on_message(payload);
                }
            }
            AdapterEvent::Error(error) => {
                debug!(stream = %self.id, transport, error = %error, "Transport error");
                if error.is_send_failure() {
                    metrics::record_send_error();
                    self.handler.on_error(StreamError::Transport(error));
                }
                self.on_failure(transport);
            }
            AdapterEvent::Close => {
                debug!(stream = %self.id, transport, "Transport closed");
                self.on_failure(transport);
            }
        }
    }

    fn on_open(&mut self, transport: &'static str) {
        if self.state == ConnectionState::Closing {
            return;
        }

        self.set_connected(true);
        self.backoff.reset();

        if self.state == ConnectionState::Connecting {
            info!(stream = %self.id, transport, "Stream open");
            self.set_state(ConnectionState::Open);
            self.handler.on_open();
        } else {
            info!(stream = %self.id, transport, "Stream reconnected");
        }
    }

    /// The current adapter closed or failed.
    fn on_failure(&mut self, transport: &'static str) {
        self.current = None;
        self.set_connected(false);
        let delay = self.backoff.fail();

        match self.state {
            ConnectionState::Closing => self.finish(),
            ConnectionState::Connecting => {
                self.cursor.advance();
                metrics::record_fallback(transport);
                debug!(
                    stream = %self.id,
                    transport,
                    cursor = self.cursor.position(),
                    delay_ms = millis(delay),
                    "Transport failed before opening, falling back"
                );
                self.schedule_reconnect(delay);
            }
            ConnectionState::Open => {
                metrics::record_reconnect();
                warn!(
                    stream = %self.id,
                    transport,
                    delay_ms = millis(delay),
                    "Connection lost, reconnecting"
                );
                self.schedule_reconnect(delay);
            }
            ConnectionState::Closed => {}
        }
    }

    fn schedule_reconnect(&mut self, delay: Duration) {
        self.reconnect = Some(Box::pin(tokio::time::sleep(delay)));
    }

    fn on_heartbeat(&mut self) {
        if self.connected {
            metrics::record_heartbeat();
            self.handler.on_heartbeat();
        }
    }

    fn send(&mut self, payload: Payload) {
        match self.current.as_mut() {
            Some(current) if self.connected => current.adapter.send(payload),
            _ => {
                debug!(stream = %self.id, "Send while disconnected");
                metrics::record_send_error();
                self.handler.on_error(StreamError::NotConnected);
            }
        }
    }

    fn close(&mut self) {
        if self.state == ConnectionState::Closed {
            return;
        }

        debug!(stream = %self.id, "Close requested");
        self.set_state(ConnectionState::Closing);
        self.reconnect = None;

        match self.current.as_mut() {
            // The adapter's close event finishes the job.
            Some(current) => current.adapter.close(),
            // Between attempts: nothing left to wait for.
            None => self.finish(),
        }
    }

    fn finish(&mut self) {
        self.current = None;
        self.reconnect = None;
        self.set_connected(false);
        self.set_state(ConnectionState::Closed);
        self.handler.on_close();
    }
}

/// Whole milliseconds, saturating for the unbounded backoff.
fn millis(delay: Duration) -> u64 {
    u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)
}

async fn wait_reconnect(reconnect: &mut Option<Pin<Box<Sleep>>>) {
    match reconnect {
        Some(sleep) => sleep.as_mut().await,
        None => pending().await,
    }
}

async fn tick_heartbeat(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(interval) => {
            interval.tick().await;
        }
        None => pending().await,
    }
}
