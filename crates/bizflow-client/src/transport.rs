//! # Push Channel Transport
//!
//! Server-sent events over a streaming `reqwest` body, with reconnection.
//!
//! ## Connection Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      SSE Transport Loop                                 │
//! │                                                                         │
//! │   ┌──────────┐   GET text/event-stream   ┌──────────┐                   │
//! │   │  Start   │ ────────────────────────► │ Opening  │                   │
//! │   └──────────┘                           └────┬─────┘                   │
//! │        ▲                           200 OK     │    error / non-2xx      │
//! │        │                         ┌────────────┴──────────┐              │
//! │        │                         ▼                       ▼              │
//! │        │                  ┌────────────┐          ┌────────────┐        │
//! │        │                  │   Open     │ ───────► │  Waiting   │        │
//! │        │                  │ (frames →) │  ended   │ (delay)    │        │
//! │        │                  └─────┬──────┘          └─────┬──────┘        │
//! │        │          Reconnect     │                       │ timer         │
//! │        └────────────────────────┴───────────────────────┘               │
//! │                                                                         │
//! │   Close (or handle dropped) ends the loop from any state.               │
//! │                                                                         │
//! │  RECONNECT DELAY                                                        │
//! │  ───────────────                                                        │
//! │  transport:   server `retry:` hint, else fixed retry_ms                 │
//! │  exponential: backoff crate curve, reset after each successful open    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The transport knows nothing about event types: it yields raw [`Frame`]s
//! and leaves decoding to the consumer.

use async_trait::async_trait;
use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use futures_util::StreamExt;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::{ClientConfig, ReconnectPolicy};
use crate::error::{ClientError, ClientResult};

// =============================================================================
// Frames
// =============================================================================

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Event name; `message` when the server sent none.
    pub event: String,
    pub data: String,
}

impl Frame {
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        Frame {
            event: event.into(),
            data: data.into(),
        }
    }
}

/// Incremental `text/event-stream` parser.
///
/// Accepts arbitrary byte chunks; a frame is emitted when its terminating
/// blank line arrives. Lines end in `\n` or `\r\n`. `id` fields are
/// ignored: the server does not replay missed events.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
    event: String,
    data: String,
    has_data: bool,
    retry: Option<Duration>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk and returns every frame it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.buf.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line);
            if let Some(frame) = self.process_line(&line) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Drops any partial frame. The retry hint survives.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.event.clear();
        self.data.clear();
        self.has_data = false;
    }

    /// Reconnect delay requested by the server via `retry:`.
    pub fn retry_hint(&self) -> Option<Duration> {
        self.retry
    }

    fn process_line(&mut self, line: &str) -> Option<Frame> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = value.to_string(),
            "data" => {
                if self.has_data {
                    self.data.push('\n');
                }
                self.data.push_str(value);
                self.has_data = true;
            }
            "retry" => {
                if let Ok(ms) = value.parse::<u64>() {
                    self.retry = Some(Duration::from_millis(ms));
                }
            }
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<Frame> {
        let event = std::mem::take(&mut self.event);
        if !self.has_data {
            return None;
        }
        self.has_data = false;

        let event = if event.is_empty() { "message".to_string() } else { event };
        Some(Frame::new(event, std::mem::take(&mut self.data)))
    }
}

// =============================================================================
// Reconnect Schedule
// =============================================================================

/// Delay before each reconnect attempt under a [`ReconnectPolicy`].
pub struct ReconnectSchedule {
    policy: ReconnectPolicy,
    backoff: Option<ExponentialBackoff>,
    attempts: u32,
}

impl ReconnectSchedule {
    pub fn new(policy: ReconnectPolicy) -> Self {
        let backoff = policy.create_backoff();
        ReconnectSchedule {
            policy,
            backoff,
            attempts: 0,
        }
    }

    /// Next delay, or `None` once the attempt cap is reached.
    pub fn next_delay(&mut self, retry_hint: Option<Duration>) -> Option<Duration> {
        self.attempts += 1;
        if let Some(max) = self.policy.max_attempts() {
            if self.attempts > max {
                return None;
            }
        }

        match (&self.policy, self.backoff.as_mut()) {
            (ReconnectPolicy::Transport { retry_ms }, _) => {
                Some(retry_hint.unwrap_or(Duration::from_millis(*retry_ms)))
            }
            (ReconnectPolicy::Exponential { .. }, Some(backoff)) => backoff.next_backoff(),
            (ReconnectPolicy::Exponential { .. }, None) => None,
        }
    }

    /// Called after a successful open.
    pub fn reset(&mut self) {
        self.attempts = 0;
        if let Some(backoff) = self.backoff.as_mut() {
            backoff.reset();
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

// =============================================================================
// Transport Channels
// =============================================================================

/// What the transport reports to its consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A connection opened (first time or after a reconnect).
    Opened,
    Frame(Frame),
    /// A connection attempt failed or an open connection dropped.
    /// `will_retry` is false when the transport has given up.
    Failed { reason: String, will_retry: bool },
}

/// Requests from the consumer to the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportControl {
    /// Drop the current connection and open a new one now.
    Reconnect,
    /// Stop for good.
    Close,
}

/// Handle for steering a running transport. Dropping every clone closes it.
#[derive(Debug, Clone)]
pub struct TransportHandle {
    control_tx: mpsc::Sender<TransportControl>,
}

impl TransportHandle {
    /// Builds a handle plus the transport's end of both channels.
    pub fn pair(
        capacity: usize,
    ) -> (
        TransportHandle,
        mpsc::Receiver<TransportControl>,
        mpsc::Sender<TransportEvent>,
        mpsc::Receiver<TransportEvent>,
    ) {
        let (control_tx, control_rx) = mpsc::channel(4);
        let (event_tx, event_rx) = mpsc::channel(capacity);
        (TransportHandle { control_tx }, control_rx, event_tx, event_rx)
    }

    pub async fn reconnect(&self) -> ClientResult<()> {
        self.control_tx
            .send(TransportControl::Reconnect)
            .await
            .map_err(|_| ClientError::ChannelError("Transport already stopped".into()))
    }

    pub async fn close(&self) -> ClientResult<()> {
        self.control_tx
            .send(TransportControl::Close)
            .await
            .map_err(|_| ClientError::ChannelError("Transport already stopped".into()))
    }
}

/// Opens push channels. The seam the consumer is tested through.
#[async_trait]
pub trait StreamConnector: Send + Sync {
    /// Starts a transport for `url` and returns its handle and event stream.
    async fn connect(&self, url: Url) -> ClientResult<(TransportHandle, mpsc::Receiver<TransportEvent>)>;
}

// =============================================================================
// SSE Transport
// =============================================================================

/// Settings for one SSE transport.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub connect_timeout: Duration,
    pub reconnect: ReconnectPolicy,
    pub channel_capacity: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig {
            connect_timeout: Duration::from_secs(10),
            reconnect: ReconnectPolicy::default(),
            channel_capacity: 64,
        }
    }
}

impl From<&ClientConfig> for TransportConfig {
    fn from(config: &ClientConfig) -> Self {
        TransportConfig {
            connect_timeout: Duration::from_secs(config.stream.connect_timeout_secs),
            reconnect: config.stream.reconnect.clone(),
            channel_capacity: config.stream.channel_capacity,
        }
    }
}

/// [`StreamConnector`] that spawns an [`SseTransport`] task per connection.
#[derive(Clone)]
pub struct SseConnector {
    client: reqwest::Client,
    config: TransportConfig,
}

impl SseConnector {
    pub fn new(config: TransportConfig) -> ClientResult<Self> {
        // No overall request timeout: the body is meant to stay open.
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()?;
        Ok(SseConnector { client, config })
    }
}

#[async_trait]
impl StreamConnector for SseConnector {
    async fn connect(&self, url: Url) -> ClientResult<(TransportHandle, mpsc::Receiver<TransportEvent>)> {
        let (handle, control_rx, event_tx, event_rx) =
            TransportHandle::pair(self.config.channel_capacity);

        let transport = SseTransport {
            client: self.client.clone(),
            url,
            config: self.config.clone(),
            control_rx,
            event_tx,
            decoder: SseDecoder::new(),
        };
        tokio::spawn(transport.run());

        Ok((handle, event_rx))
    }
}

/// Why a connection ended.
enum Ended {
    /// Dropped or failed; wait, then retry.
    Lost(String),
    /// The consumer asked for an immediate reconnect.
    Reconnect,
    /// The consumer closed the channel.
    Closed,
}

/// Background task owning one logical push channel.
pub struct SseTransport {
    client: reqwest::Client,
    url: Url,
    config: TransportConfig,
    control_rx: mpsc::Receiver<TransportControl>,
    event_tx: mpsc::Sender<TransportEvent>,
    decoder: SseDecoder,
}

impl SseTransport {
    /// Main transport loop.
    async fn run(mut self) {
        info!(path = %self.url.path(), "Event stream transport starting");
        let mut schedule = ReconnectSchedule::new(self.config.reconnect.clone());

        loop {
            let reason = match self.open().await {
                Ok(response) => {
                    schedule.reset();
                    if self.emit(TransportEvent::Opened).await.is_err() {
                        break;
                    }
                    match self.read(response).await {
                        Ended::Lost(reason) => reason,
                        Ended::Reconnect => {
                            debug!("Reconnecting on request");
                            continue;
                        }
                        Ended::Closed => break,
                    }
                }
                Err(e) => e.to_string(),
            };

            let delay = schedule.next_delay(self.decoder.retry_hint());
            let failed = TransportEvent::Failed {
                reason: reason.clone(),
                will_retry: delay.is_some(),
            };
            if self.emit(failed).await.is_err() {
                break;
            }

            let Some(delay) = delay else {
                warn!(attempts = schedule.attempts(), %reason, "Giving up on event stream");
                break;
            };
            debug!(?delay, attempt = schedule.attempts(), %reason, "Waiting before reconnect");

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                control = self.control_rx.recv() => match control {
                    Some(TransportControl::Reconnect) => {}
                    Some(TransportControl::Close) | None => break,
                }
            }
        }

        info!("Event stream transport stopped");
    }

    /// Sends the stream request and checks the response.
    async fn open(&mut self) -> ClientResult<reqwest::Response> {
        self.decoder.reset();

        let request = self
            .client
            .get(self.url.clone())
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .header(reqwest::header::CACHE_CONTROL, "no-cache");

        let response = match timeout(self.config.connect_timeout, request.send()).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(ClientError::Timeout(format!(
                    "no response within {:?}",
                    self.config.connect_timeout
                )))
            }
        };

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Http {
                status: status.as_u16(),
                message: "event stream rejected".into(),
            });
        }

        debug!(status = %status, "Event stream opened");
        Ok(response)
    }

    /// Pumps frames until the body ends or the consumer intervenes.
    async fn read(&mut self, response: reqwest::Response) -> Ended {
        let mut body = response.bytes_stream();

        loop {
            tokio::select! {
                chunk = body.next() => match chunk {
                    Some(Ok(bytes)) => {
                        for frame in self.decoder.push(&bytes) {
                            if self.emit(TransportEvent::Frame(frame)).await.is_err() {
                                return Ended::Closed;
                            }
                        }
                    }
                    Some(Err(e)) => return Ended::Lost(ClientError::from(e).to_string()),
                    None => return Ended::Lost(ClientError::Disconnected.to_string()),
                },

                control = self.control_rx.recv() => match control {
                    Some(TransportControl::Reconnect) => return Ended::Reconnect,
                    Some(TransportControl::Close) | None => return Ended::Closed,
                },
            }
        }
    }

    async fn emit(&self, event: TransportEvent) -> Result<(), ()> {
        self.event_tx.send(event).await.map_err(|_| {
            debug!("Transport event receiver dropped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decoder_update_and_ping_frames() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(
            b"event: update\ndata: {\"type\":\"STOCK_ADJUSTED\",\"payload\":{}}\n\nevent: ping\ndata: keep-alive\n\n",
        );

        assert_eq!(
            frames,
            vec![
                Frame::new("update", r#"{"type":"STOCK_ADJUSTED","payload":{}}"#),
                Frame::new("ping", "keep-alive"),
            ]
        );
    }

    #[test]
    fn test_decoder_handles_split_chunks_and_crlf() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"event: upd").is_empty());
        assert!(decoder.push(b"ate\r\ndata: {\"a\"").is_empty());
        assert!(decoder.push(b":1}\r\n").is_empty());

        let frames = decoder.push(b"\r\n");
        assert_eq!(frames, vec![Frame::new("update", r#"{"a":1}"#)]);
    }

    #[test]
    fn test_decoder_multiline_data_comments_and_defaults() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b": keep-alive comment\ndata: line one\ndata:line two\n\n\n");

        assert_eq!(frames, vec![Frame::new("message", "line one\nline two")]);
    }

    #[test]
    fn test_decoder_event_without_data_is_not_dispatched() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"event: update\n\n").is_empty());
        // The event name does not leak into the next frame
        let frames = decoder.push(b"data: x\n\n");
        assert_eq!(frames[0].event, "message");
    }

    #[test]
    fn test_decoder_retry_hint_survives_reset() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b"retry: 1500\nid: 42\nevent: update\ndata: {}\n\nretry: soon\n");

        assert_eq!(decoder.retry_hint(), Some(Duration::from_millis(1500)));
        assert_eq!(frames, vec![Frame::new("update", "{}")]);

        decoder.push(b"event: half");
        decoder.reset();
        assert_eq!(decoder.retry_hint(), Some(Duration::from_millis(1500)));
        assert!(decoder.push(b"\n").is_empty());
    }

    #[test]
    fn test_transport_schedule_prefers_server_hint() {
        let mut schedule = ReconnectSchedule::new(ReconnectPolicy::Transport { retry_ms: 3000 });
        assert_eq!(schedule.next_delay(None), Some(Duration::from_millis(3000)));
        assert_eq!(
            schedule.next_delay(Some(Duration::from_millis(250))),
            Some(Duration::from_millis(250))
        );
        // Never gives up
        for _ in 0..1000 {
            assert!(schedule.next_delay(None).is_some());
        }
    }

    #[test]
    fn test_exponential_schedule_caps_attempts_and_resets() {
        let policy = ReconnectPolicy::Exponential {
            initial_interval_ms: 100,
            max_interval_secs: 1,
            multiplier: 2.0,
            max_attempts: Some(3),
        };
        let mut schedule = ReconnectSchedule::new(policy);

        for _ in 0..3 {
            let delay = schedule.next_delay(None).unwrap();
            assert!(delay <= Duration::from_secs(2));
        }
        assert_eq!(schedule.next_delay(None), None);

        schedule.reset();
        assert!(schedule.next_delay(None).is_some());
    }

    #[tokio::test]
    async fn test_handle_reports_stopped_transport() {
        let (handle, control_rx, _event_tx, _event_rx) = TransportHandle::pair(4);
        drop(control_rx);
        assert!(handle.close().await.is_err());
    }
}
