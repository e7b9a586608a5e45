//! Stream metrics.
//!
//! Recorded through the `metrics` facade; nothing is exported unless the
//! application installs a recorder.

use metrics::{counter, gauge};

/// Metric names.
pub mod names {
    pub const TRANSPORT_ATTEMPTS_TOTAL: &str = "pulse_stream_transport_attempts_total";
    pub const FALLBACKS_TOTAL: &str = "pulse_stream_fallbacks_total";
    pub const RECONNECTS_TOTAL: &str = "pulse_stream_reconnects_total";
    pub const HEARTBEATS_TOTAL: &str = "pulse_stream_heartbeats_total";
    pub const SEND_ERRORS_TOTAL: &str = "pulse_stream_send_errors_total";
    pub const CONNECTED: &str = "pulse_stream_connected";
}

/// Describe the stream metrics to the installed recorder.
pub fn describe_metrics() {
    metrics::describe_counter!(
        names::TRANSPORT_ATTEMPTS_TOTAL,
        "Adapters constructed, by transport"
    );
    metrics::describe_counter!(
        names::FALLBACKS_TOTAL,
        "Transports abandoned after failing before open"
    );
    metrics::describe_counter!(
        names::RECONNECTS_TOTAL,
        "Reconnects scheduled after an established session dropped"
    );
    metrics::describe_counter!(names::HEARTBEATS_TOTAL, "Heartbeats delivered");
    metrics::describe_counter!(names::SEND_ERRORS_TOTAL, "Sends reported as failed");
    metrics::describe_gauge!(names::CONNECTED, "Streams with a connected transport");
}

pub(crate) fn record_attempt(transport: &'static str) {
    counter!(names::TRANSPORT_ATTEMPTS_TOTAL, "transport" => transport).increment(1);
}

pub(crate) fn record_fallback(transport: &'static str) {
    counter!(names::FALLBACKS_TOTAL, "transport" => transport).increment(1);
}

pub(crate) fn record_reconnect() {
    counter!(names::RECONNECTS_TOTAL).increment(1);
}

pub(crate) fn record_heartbeat() {
    counter!(names::HEARTBEATS_TOTAL).increment(1);
}

pub(crate) fn record_send_error() {
    counter!(names::SEND_ERRORS_TOTAL).increment(1);
}

/// Tracks one stream's contribution to the connected gauge.
#[derive(Debug, Default)]
pub(crate) struct ConnectedGauge {
    connected: bool,
}

impl ConnectedGauge {
    pub(crate) fn set(&mut self, connected: bool) {
        if self.connected == connected {
            return;
        }
        self.connected = connected;
        if connected {
            gauge!(names::CONNECTED).increment(1.0);
        } else {
            gauge!(names::CONNECTED).decrement(1.0);
        }
    }
}

impl Drop for ConnectedGauge {
    fn drop(&mut self) {
        self.set(false);
    }
}
