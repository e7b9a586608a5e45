//! HTTP polling transport.
//!
//! Emulates a bidirectional socket over plain request/response HTTP. The
//! adapter opens after a short synthetic handshake delay, then keeps one GET
//! outstanding at a time for inbound messages; each outbound payload is its
//! own POST.

use bytes::Bytes;
use reqwest::{header, Client};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use url::Url;

use crate::catalog::PollingOptions;
use crate::traits::{
    Adapter, AdapterEvent, Connector, EventSink, Payload, ReadyState, SharedReadyState,
    TransportError,
};

/// Header marking poll requests for the server.
pub const TRANSPORT_HEADER: &str = "X-Socket-Transport";

/// Value of [`TRANSPORT_HEADER`] on poll requests.
pub const TRANSPORT_HEADER_VALUE: &str = "AJAX long polling";

/// Content type of outbound POST bodies.
pub const SEND_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=utf-8";

/// Translate a socket URL into the HTTP URL the polling transport talks to.
///
/// `ws` becomes `http` and `wss` becomes `https`; other schemes are kept.
#[must_use]
pub fn polling_url(url: &Url) -> Url {
    let scheme = match url.scheme() {
        "ws" => "http",
        "wss" => "https",
        _ => return url.clone(),
    };

    let mut http = url.clone();
    match http.set_scheme(scheme) {
        Ok(()) => http,
        Err(()) => url.clone(),
    }
}

/// Opens [`PollingAdapter`]s.
#[derive(Debug, Clone)]
pub struct PollingConnector {
    client: Client,
    options: PollingOptions,
}

impl PollingConnector {
    /// Create a connector with its own HTTP client.
    #[must_use]
    pub fn new(options: PollingOptions) -> Self {
        Self::with_client(Client::new(), options)
    }

    /// Create a connector sharing an existing HTTP client.
    #[must_use]
    pub fn with_client(client: Client, options: PollingOptions) -> Self {
        Self { client, options }
    }
}

impl Connector for PollingConnector {
    fn name(&self) -> &'static str {
        "polling"
    }

    fn connect(&self, url: &Url, events: EventSink) -> Box<dyn Adapter> {
        Box::new(PollingAdapter::spawn(
            self.client.clone(),
            polling_url(url),
            self.options.clone(),
            events,
        ))
    }
}

/// An emulated socket over HTTP polling.
pub struct PollingAdapter {
    state: SharedReadyState,
    events: EventSink,
    outbound: mpsc::UnboundedSender<Payload>,
    poller: JoinHandle<()>,
    sender: JoinHandle<()>,
}

impl PollingAdapter {
    /// Schedule the synthetic open and start polling `url`.
    pub fn spawn(client: Client, url: Url, options: PollingOptions, events: EventSink) -> Self {
        let state = SharedReadyState::new();
        let (outbound, outbound_rx) = mpsc::unbounded_channel();

        let poller = tokio::spawn(poll_loop(
            client.clone(),
            url.clone(),
            options,
            state.clone(),
            events.clone(),
        ));
        let sender = tokio::spawn(send_loop(client, url, events.clone(), outbound_rx));

        Self {
            state,
            events,
            outbound,
            poller,
            sender,
        }
    }
}

impl Adapter for PollingAdapter {
    fn name(&self) -> &'static str {
        "polling"
    }

    fn ready_state(&self) -> ReadyState {
        self.state.get()
    }

    fn send(&mut self, payload: Payload) {
        if self.outbound.send(payload).is_err() {
            self.events.emit(AdapterEvent::Error(TransportError::SendFailed(
                "polling sender has stopped".into(),
            )));
        }
    }

    fn close(&mut self) {
        self.poller.abort();
        self.sender.abort();

        if self.state.swap(ReadyState::Closed) != ReadyState::Closed {
            self.events.emit(AdapterEvent::Close);
        }
    }
}

impl Drop for PollingAdapter {
    fn drop(&mut self) {
        self.poller.abort();
        self.sender.abort();
    }
}

async fn poll_loop(
    client: Client,
    url: Url,
    options: PollingOptions,
    state: SharedReadyState,
    events: EventSink,
) {
    tokio::time::sleep(options.open_delay).await;
    if !state.transition(ReadyState::Connecting, ReadyState::Open) {
        return;
    }
    debug!(url = %url, "Polling transport open");
    events.emit(AdapterEvent::Open);

    loop {
        tokio::time::sleep(options.poll_interval).await;
        if state.get() != ReadyState::Open {
            break;
        }

        match poll(&client, &url).await {
            Ok(Some(payload)) => {
                events.emit(AdapterEvent::Message(payload));
            }
            Ok(None) => {}
            Err(e) => {
                debug!(url = %url, error = %e, "Poll failed");
                if state.swap(ReadyState::Closed) != ReadyState::Closed {
                    events.emit(AdapterEvent::Error(e));
                }
                break;
            }
        }
    }
}

/// One GET against the endpoint.
///
/// An empty body means nothing was queued and yields `None`, so it never
/// reaches the stream as a message.
async fn poll(client: &Client, url: &Url) -> Result<Option<Payload>, TransportError> {
    let response = client
        .get(url.clone())
        .header(TRANSPORT_HEADER, TRANSPORT_HEADER_VALUE)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(|e| TransportError::ReceiveFailed(e.to_string()))?;

    let body = response
        .text()
        .await
        .map_err(|e| TransportError::ReceiveFailed(e.to_string()))?;

    Ok((!body.is_empty()).then_some(Payload::Text(body)))
}

async fn send_loop(
    client: Client,
    url: Url,
    events: EventSink,
    mut outbound: mpsc::UnboundedReceiver<Payload>,
) {
    while let Some(payload) = outbound.recv().await {
        let body = match payload {
            Payload::Text(text) => Bytes::from(text),
            Payload::Binary(data) => data,
        };

        let result = client
            .post(url.clone())
            .header(header::CONTENT_TYPE, SEND_CONTENT_TYPE)
            .body(body)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status);

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                // Not retried: the failure is reported and the payload is gone.
                warn!(url = %url, error = %e, "Polling send failed");
                events.emit(AdapterEvent::Error(TransportError::SendFailed(e.to_string())));
                continue;
            }
        };

        match response.text().await {
            Ok(reply) if !reply.is_empty() => {
                events.emit(AdapterEvent::Message(Payload::Text(reply)));
            }
            Ok(_) => {}
            Err(e) => {
                events.emit(AdapterEvent::Error(TransportError::SendFailed(e.to_string())));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::State, http::HeaderMap, http::StatusCode, routing::get, Router};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio::sync::mpsc::UnboundedReceiver;

    type Events = UnboundedReceiver<(u64, AdapterEvent)>;

    #[derive(Default)]
    struct Backend {
        inbox: Mutex<VecDeque<String>>,
        posted: Mutex<Vec<String>>,
        polls: AtomicUsize,
        fail_polls: bool,
    }

    async fn poll_handler(
        State(backend): State<Arc<Backend>>,
        headers: HeaderMap,
    ) -> Result<String, StatusCode> {
        assert_eq!(
            headers.get(TRANSPORT_HEADER).unwrap(),
            TRANSPORT_HEADER_VALUE
        );
        backend.polls.fetch_add(1, Ordering::SeqCst);
        if backend.fail_polls {
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
        Ok(backend.inbox.lock().unwrap().pop_front().unwrap_or_default())
    }

    async fn send_handler(State(backend): State<Arc<Backend>>, body: String) -> String {
        backend.posted.lock().unwrap().push(body.clone());
        format!("echo:{}", body)
    }

    async fn serve(backend: Arc<Backend>) -> Url {
        let app = Router::new()
            .route("/stream", get(poll_handler).post(send_handler))
            .with_state(backend);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Url::parse(&format!("ws://{}/stream", addr)).unwrap()
    }

    async fn next_event(rx: &mut Events) -> AdapterEvent {
        let (_, event) = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for adapter event")
            .expect("event channel closed");
        event
    }

    #[test]
    fn test_polling_url_rewrites_scheme() {
        let ws = Url::parse("ws://example.com:8080/bullet?x=1").unwrap();
        assert_eq!(
            polling_url(&ws).as_str(),
            "http://example.com:8080/bullet?x=1"
        );

        let wss = Url::parse("wss://example.com/bullet").unwrap();
        assert_eq!(polling_url(&wss).as_str(), "https://example.com/bullet");

        let http = Url::parse("http://example.com/bullet").unwrap();
        assert_eq!(polling_url(&http), http);
    }

    #[tokio::test]
    async fn test_polling_opens_then_delivers_polled_messages() {
        let backend = Arc::new(Backend::default());
        backend.inbox.lock().unwrap().push_back("first".into());
        let url = serve(backend.clone()).await;

        let (sink, mut rx) = EventSink::channel(1);
        let adapter = PollingConnector::new(PollingOptions::default()).connect(&url, sink);
        assert_eq!(adapter.ready_state(), ReadyState::Connecting);

        assert!(matches!(next_event(&mut rx).await, AdapterEvent::Open));
        assert_eq!(adapter.ready_state(), ReadyState::Open);

        match next_event(&mut rx).await {
            AdapterEvent::Message(payload) => assert_eq!(payload.as_text(), Some("first")),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_polling_send_posts_and_delivers_reply() {
        let backend = Arc::new(Backend::default());
        let url = serve(backend.clone()).await;

        let (sink, mut rx) = EventSink::channel(1);
        let mut adapter = PollingConnector::new(PollingOptions::default()).connect(&url, sink);
        assert!(matches!(next_event(&mut rx).await, AdapterEvent::Open));

        adapter.send(Payload::from("hello"));

        match next_event(&mut rx).await {
            AdapterEvent::Message(payload) => assert_eq!(payload.as_text(), Some("echo:hello")),
            other => panic!("unexpected event: {:?}", other),
        }
        assert_eq!(*backend.posted.lock().unwrap(), vec!["hello".to_string()]);
    }

    #[tokio::test]
    async fn test_polling_close_stops_polling() {
        let backend = Arc::new(Backend::default());
        let url = serve(backend.clone()).await;

        let (sink, mut rx) = EventSink::channel(1);
        let mut adapter = PollingConnector::new(PollingOptions::default()).connect(&url, sink);
        assert!(matches!(next_event(&mut rx).await, AdapterEvent::Open));

        tokio::time::sleep(Duration::from_millis(350)).await;
        adapter.close();
        adapter.close();
        assert!(matches!(next_event(&mut rx).await, AdapterEvent::Close));
        assert_eq!(adapter.ready_state(), ReadyState::Closed);

        // Let a request that was already on the wire land first.
        tokio::time::sleep(Duration::from_millis(100)).await;
        let polls = backend.polls.load(Ordering::SeqCst);
        assert!(polls >= 1);
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(backend.polls.load(Ordering::SeqCst), polls);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_polling_close_before_open_cancels_open() {
        let backend = Arc::new(Backend::default());
        let url = serve(backend.clone()).await;

        let (sink, mut rx) = EventSink::channel(1);
        let mut adapter = PollingConnector::new(PollingOptions::default()).connect(&url, sink);
        adapter.close();

        assert!(matches!(next_event(&mut rx).await, AdapterEvent::Close));
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(backend.polls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_polling_failed_poll_reports_error() {
        let backend = Arc::new(Backend {
            fail_polls: true,
            ..Default::default()
        });
        let url = serve(backend).await;

        let (sink, mut rx) = EventSink::channel(1);
        let adapter = PollingConnector::new(PollingOptions::default()).connect(&url, sink);
        assert!(matches!(next_event(&mut rx).await, AdapterEvent::Open));

        match next_event(&mut rx).await {
            AdapterEvent::Error(TransportError::ReceiveFailed(_)) => {}
            other => panic!("unexpected event: {:?}", other),
        }
        assert_eq!(adapter.ready_state(), ReadyState::Closed);
    }
}
