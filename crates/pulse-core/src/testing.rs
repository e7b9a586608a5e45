//! In-memory transport for exercising the supervisor under a paused clock.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tenvis_pulse_transport::{
    Adapter, AdapterEvent, Connector, EventSink, Payload, ReadyState, SharedReadyState,
    TransportError,
};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use url::Url;

/// One step of a scripted connection.
#[derive(Debug, Clone)]
pub(crate) enum Step {
    Wait(u64),
    Open,
    Message(&'static str),
    /// Fail with an error event.
    Fail,
    /// Drop with a close event.
    Drop,
}

#[derive(Default)]
struct Shared {
    scripts: VecDeque<Vec<Step>>,
    connects: Vec<Instant>,
    sent: Vec<Payload>,
}

/// A connector whose adapters replay scripts, one script per connect.
///
/// Once the queued scripts run out every further connect replays the last one.
#[derive(Clone)]
pub(crate) struct ScriptedConnector {
    name: &'static str,
    shared: Arc<Mutex<Shared>>,
    fail_sends: bool,
}

impl ScriptedConnector {
    pub(crate) fn new(name: &'static str) -> Self {
        Self {
            name,
            shared: Arc::default(),
            fail_sends: false,
        }
    }

    pub(crate) fn script(self, steps: Vec<Step>) -> Self {
        self.shared.lock().unwrap().scripts.push_back(steps);
        self
    }

    pub(crate) fn failing_sends(mut self) -> Self {
        self.fail_sends = true;
        self
    }

    pub(crate) fn into_connector(self) -> Arc<dyn Connector> {
        Arc::new(self)
    }

    /// When each adapter was constructed.
    pub(crate) fn connects(&self) -> Vec<Instant> {
        self.shared.lock().unwrap().connects.clone()
    }

    pub(crate) fn sent(&self) -> Vec<Payload> {
        self.shared.lock().unwrap().sent.clone()
    }
}

impl Connector for ScriptedConnector {
    fn name(&self) -> &'static str {
        self.name
    }

    fn connect(&self, _url: &Url, events: EventSink) -> Box<dyn Adapter> {
        let steps = {
            let mut shared = self.shared.lock().unwrap();
            shared.connects.push(Instant::now());
            if shared.scripts.len() > 1 {
                shared.scripts.pop_front().unwrap_or_default()
            } else {
                shared.scripts.front().cloned().unwrap_or_default()
            }
        };

        let state = SharedReadyState::new();
        let task = tokio::spawn(play(steps, state.clone(), events.clone()));

        Box::new(ScriptedAdapter {
            name: self.name,
            state,
            events,
            task,
            shared: Arc::clone(&self.shared),
            fail_sends: self.fail_sends,
        })
    }
}

async fn play(steps: Vec<Step>, state: SharedReadyState, events: EventSink) {
    for step in steps {
        match step {
            Step::Wait(ms) => tokio::time::sleep(Duration::from_millis(ms)).await,
            Step::Open => {
                state.transition(ReadyState::Connecting, ReadyState::Open);
                events.emit(AdapterEvent::Open);
            }
            Step::Message(text) => {
                events.emit(AdapterEvent::Message(Payload::from(text)));
            }
            Step::Fail => {
                state.swap(ReadyState::Closed);
                events.emit(AdapterEvent::Error(TransportError::ConnectFailed(
                    "scripted failure".into(),
                )));
                return;
            }
            Step::Drop => {
                state.swap(ReadyState::Closed);
                events.emit(AdapterEvent::Close);
                return;
            }
        }
    }
}

struct ScriptedAdapter {
    name: &'static str,
    state: SharedReadyState,
    events: EventSink,
    task: JoinHandle<()>,
    shared: Arc<Mutex<Shared>>,
    fail_sends: bool,
}

impl Adapter for ScriptedAdapter {
    fn name(&self) -> &'static str {
        self.name
    }

    fn ready_state(&self) -> ReadyState {
        self.state.get()
    }

    fn send(&mut self, payload: Payload) {
        self.shared.lock().unwrap().sent.push(payload);
        if self.fail_sends {
            self.events.emit(AdapterEvent::Error(TransportError::SendFailed(
                "scripted send failure".into(),
            )));
        }
    }

    fn close(&mut self) {
        self.task.abort();
        if self.state.swap(ReadyState::Closed) != ReadyState::Closed {
            self.events.emit(AdapterEvent::Close);
        }
    }
}

impl Drop for ScriptedAdapter {
    fn drop(&mut self) {
        self.task.abort();
    }
}
