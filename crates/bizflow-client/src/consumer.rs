//! # Event Stream Consumer
//!
//! Owns the push channel for the logged-in session and feeds decoded
//! events to the [`InvalidationRouter`] one at a time, in arrival order.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   ┌──────────────┐  token + owner id   ┌────────────┐   Opened          │
//! │   │ DISCONNECTED │ ──────────────────► │ CONNECTING │ ─────────┐        │
//! │   └──────────────┘                     └────────────┘          ▼        │
//! │          ▲                                               ┌───────────┐  │
//! │          │            disconnect() / logout              │ CONNECTED │  │
//! │          └───────────────────────────────────────────────┴───────────┘  │
//! │                                                                         │
//! │   Transport failures change nothing here: the transport reconnects     │
//! │   on its own and the consumer keeps reading when frames resume.        │
//! │                                                                         │
//! │   FRAMES                                                                │
//! │   ──────                                                                │
//! │   "ping"    → reset inactivity deadline                                 │
//! │   "update"  → StreamEvent::decode → router.route                        │
//! │               (bad JSON / unknown type → warn! and discard)             │
//! │   other     → ignored                                                   │
//! │                                                                         │
//! │   No frame for heartbeat_timeout while CONNECTED → ask for reconnect   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use bizflow_core::events::{HEARTBEAT_FRAME, UPDATE_FRAME};
use bizflow_core::{EventKind, StreamEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::ClientResult;
use crate::router::InvalidationRouter;
use crate::session::SessionState;
use crate::transport::{Frame, StreamConnector, TransportEvent, TransportHandle};

/// Push channel state as seen by the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// What happened to one inbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Heartbeat,
    Routed(EventKind),
    /// Update frame that failed to decode.
    Discarded,
    /// Frame name nobody listens to.
    Ignored,
}

/// Stream endpoint with the session token as a query parameter.
pub fn stream_url(endpoint: &Url, token: &str) -> Url {
    let mut url = endpoint.clone();
    url.query_pairs_mut().append_pair("token", token);
    url
}

/// Handles one frame. Never fails: bad input is logged and dropped.
pub fn dispatch_frame(router: &InvalidationRouter, frame: &Frame) -> FrameOutcome {
    match frame.event.as_str() {
        HEARTBEAT_FRAME => FrameOutcome::Heartbeat,
        UPDATE_FRAME => match StreamEvent::decode(&frame.data) {
            Ok(event) => {
                router.route(&event);
                FrameOutcome::Routed(event.kind())
            }
            Err(e) => {
                warn!(error = %e, data = %frame.data, "Discarding stream frame");
                FrameOutcome::Discarded
            }
        },
        other => {
            debug!(event = other, "Ignoring stream frame");
            FrameOutcome::Ignored
        }
    }
}

struct ActiveStream {
    handle: TransportHandle,
    task: JoinHandle<()>,
}

pub struct EventStreamConsumer {
    connector: Arc<dyn StreamConnector>,
    router: InvalidationRouter,
    endpoint: Url,
    heartbeat_timeout: Duration,
    state: Arc<RwLock<StreamState>>,
    active: Mutex<Option<ActiveStream>>,
}

impl EventStreamConsumer {
    /// `endpoint` is the stream URL without the token.
    pub fn new(
        connector: Arc<dyn StreamConnector>,
        router: InvalidationRouter,
        endpoint: Url,
        heartbeat_timeout: Duration,
    ) -> Self {
        EventStreamConsumer {
            connector,
            router,
            endpoint,
            heartbeat_timeout,
            state: Arc::new(RwLock::new(StreamState::Disconnected)),
            active: Mutex::new(None),
        }
    }

    pub async fn state(&self) -> StreamState {
        *self.state.read().await
    }

    /// Opens the push channel for `session`.
    ///
    /// Returns `Ok(false)` and stays `Disconnected` when the session lacks a
    /// token or an owner id. An existing channel is closed first.
    pub async fn connect(&self, session: &SessionState) -> ClientResult<bool> {
        let mut active = self.active.lock().await;
        if let Some(previous) = active.take() {
            close_stream(previous).await;
        }

        let Some((token, owner_id)) = session.stream_credentials() else {
            debug!("No stream credentials, staying disconnected");
            *self.state.write().await = StreamState::Disconnected;
            return Ok(false);
        };

        *self.state.write().await = StreamState::Connecting;
        info!(owner_id, path = %self.endpoint.path(), "Connecting to event stream");

        let (handle, events) = match self.connector.connect(stream_url(&self.endpoint, token)).await {
            Ok(pair) => pair,
            Err(e) => {
                *self.state.write().await = StreamState::Disconnected;
                return Err(e);
            }
        };

        let task = tokio::spawn(run_stream(
            events,
            handle.clone(),
            self.router.clone(),
            Arc::clone(&self.state),
            self.heartbeat_timeout,
        ));

        *active = Some(ActiveStream { handle, task });
        Ok(true)
    }

    /// Closes the channel and returns to `Disconnected`. Idempotent.
    pub async fn disconnect(&self) {
        if let Some(stream) = self.active.lock().await.take() {
            info!("Closing event stream");
            close_stream(stream).await;
        }
        *self.state.write().await = StreamState::Disconnected;
    }
}

async fn close_stream(stream: ActiveStream) {
    if let Err(e) = stream.handle.close().await {
        debug!(error = %e, "Transport already stopped");
    }
    stream.task.abort();
}

/// Consumes transport events until the transport stops.
async fn run_stream(
    mut events: mpsc::Receiver<TransportEvent>,
    handle: TransportHandle,
    router: InvalidationRouter,
    state: Arc<RwLock<StreamState>>,
    heartbeat_timeout: Duration,
) {
    let mut connected = false;
    let mut deadline = Instant::now() + heartbeat_timeout;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(TransportEvent::Opened) => {
                    info!("Event stream connected");
                    connected = true;
                    deadline = Instant::now() + heartbeat_timeout;
                    *state.write().await = StreamState::Connected;
                }
                Some(TransportEvent::Frame(frame)) => {
                    deadline = Instant::now() + heartbeat_timeout;
                    dispatch_frame(&router, &frame);
                }
                Some(TransportEvent::Failed { reason, will_retry }) => {
                    connected = false;
                    if will_retry {
                        debug!(%reason, "Event stream interrupted");
                    } else {
                        warn!(%reason, "Event stream gave up reconnecting");
                    }
                }
                None => break,
            },

            _ = tokio::time::sleep_until(deadline), if connected => {
                warn!(timeout = ?heartbeat_timeout, "No heartbeat from event stream, reconnecting");
                connected = false;
                if handle.reconnect().await.is_err() {
                    break;
                }
            }
        }
    }

    debug!("Event stream consumer finished");
    *state.write().await = StreamState::Disconnected;
}
