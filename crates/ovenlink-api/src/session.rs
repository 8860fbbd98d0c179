//! Realtime relay session.
//!
//! Owns one websocket connection to the cloud relay at a time, decodes
//! inbound frames and fans them out through a [`tokio::sync::broadcast`]
//! channel, and serializes outbound commands onto the same transport.
//! Consumers that must not miss an event (the device registry) take an
//! unbounded queue from [`RealtimeSession::queue`] instead.
//!
//! The session never reconnects on its own: when the transport drops it
//! returns to [`SessionState::Idle`] and publishes
//! [`SessionEvent::Disconnected`]. The caller decides when to call
//! [`RealtimeSession::connect`] again.
//!
//! # Example
//!
//! ```rust,ignore
//! use ovenlink_api::session::{RealtimeSession, RelayConfig, SessionEvent};
//!
//! let session = RealtimeSession::new(RelayConfig::default());
//! let mut rx = session.subscribe();
//! session.connect(&id_token).await?;
//!
//! while let Ok(event) = rx.recv().await {
//!     if let SessionEvent::Telemetry(payload) = event {
//!         println!("{}: {}", payload.cooker_id, payload.state.mode());
//!     }
//! }
//! ```

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{self, Utf8Bytes};
use tokio_util::sync::CancellationToken;
use url::Url;
use uuid::Uuid;

use crate::debug_log::{DebugEventKind, DebugLog};
use crate::error::Error;
use crate::protocol::{self, Inbound, OutboundCommand, StatePayload, WireDevice};

// ── Constants ────────────────────────────────────────────────────────

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Received frames are truncated to this many characters in the debug log.
const DEBUG_FRAME_PREVIEW: usize = 512;

pub const DEFAULT_RELAY_URL: &str = "wss://devices.anovaculinary.io/";

// ── RelayConfig ──────────────────────────────────────────────────────

/// Where and how to reach the relay.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub url: String,
    /// Sent as the `platform` query parameter.
    pub platform: String,
    /// Sent as the `supportedAccessories` query parameter.
    pub supported_accessories: String,
    pub connect_timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_RELAY_URL.into(),
            platform: "ios".into(),
            supported_accessories: "APO".into(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl RelayConfig {
    /// Connection URL carrying the bearer token and capability tags.
    fn endpoint(&self, token: &SecretString) -> Result<Url, Error> {
        let mut url = Url::parse(&self.url)?;
        url.query_pairs_mut()
            .append_pair("token", token.expose_secret())
            .append_pair("supportedAccessories", &self.supported_accessories)
            .append_pair("platform", &self.platform);
        Ok(url)
    }
}

// ── Session state and events ─────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum SessionState {
    Idle,
    Connecting,
    Open,
    Closing,
}

/// Everything the session publishes to subscribers, in arrival order.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Connected,
    /// The relay's full paired-device list. Replaces any previous list.
    DeviceList(Arc<Vec<WireDevice>>),
    Telemetry(Arc<StatePayload>),
    Disconnected { reason: String },
}

// ── RealtimeSession ──────────────────────────────────────────────────

/// Handle to the relay session. Cheaply cloneable.
#[derive(Clone)]
pub struct RealtimeSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    config: RelayConfig,
    shared: Arc<Shared>,
    /// Serializes connect/disconnect so only one transport exists.
    connection: tokio::sync::Mutex<Option<Connection>>,
}

/// State touched by both the handle and the connection task.
struct Shared {
    state_tx: watch::Sender<SessionState>,
    event_tx: broadcast::Sender<SessionEvent>,
    /// Lossless per-consumer queues, fed next to the broadcast.
    queues: Mutex<Vec<mpsc::UnboundedSender<SessionEvent>>>,
    writer: Mutex<Option<mpsc::UnboundedSender<tungstenite::Message>>>,
    debug_log: DebugLog,
}

impl Shared {
    fn publish(&self, event: SessionEvent) {
        self.queues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|tx| tx.send(event.clone()).is_ok());
        let _ = self.event_tx.send(event);
    }
}

struct Connection {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl RealtimeSession {
    pub fn new(config: RelayConfig) -> Self {
        Self::with_debug_log(config, DebugLog::default())
    }

    pub fn with_debug_log(config: RelayConfig, debug_log: DebugLog) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Idle);
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(SessionInner {
                config,
                shared: Arc::new(Shared {
                    state_tx,
                    event_tx,
                    queues: Mutex::new(Vec::new()),
                    writer: Mutex::new(None),
                    debug_log,
                }),
                connection: tokio::sync::Mutex::new(None),
            }),
        }
    }

    // ── Observation ──────────────────────────────────────────────────

    pub fn state(&self) -> SessionState {
        *self.inner.shared.state_tx.borrow()
    }

    pub fn state_watch(&self) -> watch::Receiver<SessionState> {
        self.inner.shared.state_tx.subscribe()
    }

    pub fn is_open(&self) -> bool {
        self.state() == SessionState::Open
    }

    /// Subscribe to session events. Slow consumers see
    /// [`broadcast::error::RecvError::Lagged`].
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.shared.event_tx.subscribe()
    }

    /// Subscribe through an unbounded queue that never drops events.
    /// The queue is pruned once its receiver is dropped.
    pub fn queue(&self) -> mpsc::UnboundedReceiver<SessionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .shared
            .queues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    pub fn debug_log(&self) -> &DebugLog {
        &self.inner.shared.debug_log
    }

    pub fn config(&self) -> &RelayConfig {
        &self.inner.config
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Open the relay transport. A no-op while a connection is already
    /// open or being established.
    pub async fn connect(&self, token: &SecretString) -> Result<(), Error> {
        let mut slot = self.inner.connection.lock().await;
        let shared = &self.inner.shared;

        if matches!(self.state(), SessionState::Open | SessionState::Connecting) {
            tracing::debug!("relay session already connected");
            return Ok(());
        }

        // A previous transport that dropped on its own leaves a finished
        // task behind; reap it before replacing it.
        if let Some(stale) = slot.take() {
            stale.cancel.cancel();
            let _ = stale.task.await;
        }

        let url = self.inner.config.endpoint(token)?;
        let host = url.host_str().unwrap_or_default().to_owned();
        shared.state_tx.send_replace(SessionState::Connecting);
        tracing::info!(host = %host, "Connecting to relay");

        let attempt = tokio::time::timeout(
            self.inner.config.connect_timeout,
            tokio_tungstenite::connect_async(url.as_str()),
        )
        .await;

        let ws_stream = match attempt {
            Ok(Ok((stream, _response))) => stream,
            Ok(Err(e)) => return Err(self.connect_failed(e.to_string())),
            Err(_) => return Err(self.connect_failed("connection timed out".into())),
        };

        let (write_tx, write_rx) = mpsc::unbounded_channel();
        *shared.writer.lock().unwrap_or_else(PoisonError::into_inner) = Some(write_tx);
        shared.state_tx.send_replace(SessionState::Open);
        shared
            .debug_log
            .record(DebugEventKind::Connect, format!("Connected to {host}"));
        tracing::info!(host = %host, "Relay connected");
        shared.publish(SessionEvent::Connected);

        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_connection(
            ws_stream,
            write_rx,
            Arc::clone(shared),
            cancel.clone(),
        ));
        *slot = Some(Connection { cancel, task });
        Ok(())
    }

    fn connect_failed(&self, reason: String) -> Error {
        let shared = &self.inner.shared;
        shared.state_tx.send_replace(SessionState::Idle);
        shared
            .debug_log
            .record(DebugEventKind::Error, format!("Connect failed: {reason}"));
        tracing::warn!(error = %reason, "Relay connect failed");
        Error::WebSocketConnect(reason)
    }

    /// Close the transport with a normal-closure code. Idempotent.
    pub async fn disconnect(&self) {
        let mut slot = self.inner.connection.lock().await;
        let Some(conn) = slot.take() else {
            return;
        };

        if self.state() == SessionState::Open {
            self.inner.shared.state_tx.send_replace(SessionState::Closing);
        }
        conn.cancel.cancel();
        if let Err(e) = conn.task.await {
            tracing::warn!(error = %e, "Relay connection task failed");
        }
    }

    // ── Outbound ─────────────────────────────────────────────────────

    /// Encode and queue a command on the open transport.
    ///
    /// Returns the generated request id. Fails with
    /// [`Error::NotConnected`] when no transport is open; callers racing
    /// a reconnect are expected to treat that as a soft failure.
    pub fn send_command(&self, command: &OutboundCommand) -> Result<Uuid, Error> {
        let shared = &self.inner.shared;
        let encoded = command.encode()?;

        let writer = shared
            .writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let Some(writer) = writer else {
            return Err(send_dropped(shared, command.tag()));
        };

        shared.debug_log.record(DebugEventKind::Sent, encoded.text.clone());
        if writer
            .send(tungstenite::Message::Text(encoded.text.into()))
            .is_err()
        {
            return Err(send_dropped(shared, command.tag()));
        }

        tracing::debug!(
            command = command.tag(),
            request_id = %encoded.request_id,
            "Command sent"
        );
        Ok(encoded.request_id)
    }
}

fn send_dropped(shared: &Shared, tag: &str) -> Error {
    shared
        .debug_log
        .record(DebugEventKind::Error, format!("Dropped {tag}: not connected"));
    tracing::warn!(command = tag, "Relay not connected, command dropped");
    Error::NotConnected
}

// ── Connection task ──────────────────────────────────────────────────

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Pump one connection until it drops or is cancelled, then return the
/// session to idle.
async fn run_connection(
    ws_stream: WsStream,
    mut write_rx: mpsc::UnboundedReceiver<tungstenite::Message>,
    shared: Arc<Shared>,
    cancel: CancellationToken,
) {
    let (mut write, mut read) = ws_stream.split();

    let reason = loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                // Flush commands queued before the disconnect.
                while let Ok(message) = write_rx.try_recv() {
                    if write.send(message).await.is_err() {
                        break;
                    }
                }
                let close = CloseFrame {
                    code: CloseCode::Normal,
                    reason: Utf8Bytes::from_static(""),
                };
                if let Err(e) = write.send(tungstenite::Message::Close(Some(close))).await {
                    tracing::debug!(error = %e, "Close frame not delivered");
                }
                break "closed by client".to_owned();
            }
            outbound = write_rx.recv() => {
                // The sender lives in `Shared`, so `None` only happens
                // once the handle has been torn down.
                let Some(message) = outbound else {
                    break "session dropped".to_owned();
                };
                if let Err(e) = write.send(message).await {
                    shared.debug_log.record(DebugEventKind::Error, format!("Send failed: {e}"));
                    break format!("send failed: {e}");
                }
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        dispatch_frame(&text, &shared);
                    }
                    Some(Ok(tungstenite::Message::Ping(_))) => {
                        // tungstenite queues the pong; flushed on next write
                        tracing::trace!("Relay ping");
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        break match frame {
                            Some(cf) => format!("closed by relay (code {}): {}", cf.code, cf.reason),
                            None => "closed by relay".to_owned(),
                        };
                    }
                    Some(Err(e)) => {
                        shared.debug_log.record(DebugEventKind::Error, format!("Transport error: {e}"));
                        break format!("transport error: {e}");
                    }
                    None => break "stream ended".to_owned(),
                    Some(Ok(_)) => {
                        // Binary, Pong, Frame -- ignore
                    }
                }
            }
        }
    };

    shared
        .writer
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .take();
    shared.state_tx.send_replace(SessionState::Idle);
    shared
        .debug_log
        .record(DebugEventKind::Disconnect, format!("Disconnected: {reason}"));
    tracing::info!(reason = %reason, "Relay disconnected");
    shared.publish(SessionEvent::Disconnected { reason });
}

// ── Frame dispatch ───────────────────────────────────────────────────

/// Decode one text frame and publish the result. Decode failures are
/// logged and the frame dropped.
fn dispatch_frame(text: &str, shared: &Shared) {
    shared
        .debug_log
        .record(DebugEventKind::Received, preview(text, DEBUG_FRAME_PREVIEW));

    match protocol::decode(text) {
        Ok(Inbound::DeviceList(devices)) => {
            tracing::debug!(count = devices.len(), "Device list received");
            shared.publish(SessionEvent::DeviceList(Arc::new(devices)));
        }
        Ok(Inbound::State(payload)) => {
            tracing::trace!(appliance_id = %payload.cooker_id, "Telemetry received");
            shared.publish(SessionEvent::Telemetry(Arc::from(payload)));
        }
        Ok(Inbound::Ignored { command }) => {
            tracing::trace!(command = %command, "Ignoring relay event");
        }
        Err(e) => {
            shared
                .debug_log
                .record(DebugEventKind::Error, format!("Error: {e}"));
            tracing::debug!(error = %e, "Failed to decode relay frame");
        }
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_owned(),
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_carries_token_and_tags() {
        let config = RelayConfig::default();
        let url = config.endpoint(&SecretString::from("abc.def")).unwrap();
        assert_eq!(
            url.as_str(),
            "wss://devices.anovaculinary.io/?token=abc.def&supportedAccessories=APO&platform=ios"
        );
    }

    #[test]
    fn preview_truncates_on_char_boundary() {
        assert_eq!(preview("short", 10), "short");
        assert_eq!(preview("ééééé", 2), "éé…");
    }

    #[test]
    fn dispatch_publishes_device_list() {
        let session = RealtimeSession::new(RelayConfig::default());
        let mut rx = session.subscribe();

        dispatch_frame(
            r#"{"command":"EVENT_APO_WIFI_LIST","payload":[{"cookerId":"a","name":"A","pairedAt":"2024-05-01T10:00:00Z","type":"oven_v2"}]}"#,
            &session.inner.shared,
        );

        let SessionEvent::DeviceList(devices) = rx.try_recv().unwrap() else {
            panic!("expected device list");
        };
        assert_eq!(devices[0].cooker_id, "a");
        assert_eq!(session.debug_log().len(), 1);
    }

    #[test]
    fn queue_keeps_every_event_past_broadcast_capacity() {
        let session = RealtimeSession::new(RelayConfig::default());
        let mut queue = session.queue();
        let mut lossy = session.subscribe();
        let frame = include_str!("../tests/fixtures/apo_state.json");

        let total = EVENT_CHANNEL_CAPACITY + 500;
        for _ in 0..total {
            dispatch_frame(frame, &session.inner.shared);
        }

        let mut queued = 0;
        while let Ok(event) = queue.try_recv() {
            assert!(matches!(event, SessionEvent::Telemetry(_)));
            queued += 1;
        }
        assert_eq!(queued, total);
        assert!(matches!(
            lossy.try_recv(),
            Err(broadcast::error::TryRecvError::Lagged(_))
        ));
    }

    #[test]
    fn dropped_queue_is_pruned() {
        let session = RealtimeSession::new(RelayConfig::default());
        drop(session.queue());
        session.inner.shared.publish(SessionEvent::Connected);
        assert!(session.inner.shared.queues.lock().unwrap().is_empty());
    }

    #[test]
    fn dispatch_drops_malformed_frames() {
        let session = RealtimeSession::new(RelayConfig::default());
        let mut rx = session.subscribe();

        dispatch_frame("not json at all", &session.inner.shared);
        dispatch_frame(r#"{"command":"EVENT_APO_STATE","payload":{}}"#, &session.inner.shared);

        assert!(rx.try_recv().is_err());
        let kinds: Vec<_> = session.debug_log().entries().iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                DebugEventKind::Received,
                DebugEventKind::Error,
                DebugEventKind::Received,
                DebugEventKind::Error,
            ]
        );
    }

    #[test]
    fn send_without_transport_fails_softly() {
        let session = RealtimeSession::new(RelayConfig::default());
        let err = session
            .send_command(&OutboundCommand::StopCook {
                appliance_id: "a".into(),
            })
            .unwrap_err();
        assert!(matches!(err, Error::NotConnected));
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn disconnect_when_idle_is_noop() {
        let session = RealtimeSession::new(RelayConfig::default());
        session.disconnect().await;
        session.disconnect().await;
        assert_eq!(session.state(), SessionState::Idle);
    }
}
