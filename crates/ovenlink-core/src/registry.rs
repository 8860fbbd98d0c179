// ── Device registry ──
//
// The single coalescing point between the relay session and the rest of
// the client. One ingest task consumes session events in order, updates
// the appliance projection, persists a history snapshot per telemetry
// update, and then fans the update out to subscribers.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use ovenlink_api::protocol::{OutboundCommand, StatePayload, TemperatureUnit};
use ovenlink_api::{Credential, DebugLog, RealtimeSession, SessionEvent};

use crate::config::SessionConfig;
use crate::credential::CredentialProvider;
use crate::error::CoreError;
use crate::history::TimeSeriesStore;
use crate::model::{Appliance, HistorySnapshot};
use crate::presets::Preset;
use crate::store::{ApplianceStore, Projection};
use crate::stream::ProjectionStream;

const TELEMETRY_CHANNEL_CAPACITY: usize = 256;

/// Outcome of [`DeviceRegistry::ensure_connected`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Connectivity {
    Connected,
    /// No usable credential; the user has to sign in again.
    NeedsAuthentication,
    /// The relay could not be reached. Retry later.
    Offline { reason: String },
}

/// One telemetry update after it has been projected and persisted.
#[derive(Debug, Clone)]
pub struct TelemetryUpdate {
    pub payload: Arc<StatePayload>,
    /// `None` when the history write failed.
    pub snapshot: Option<Arc<HistorySnapshot>>,
}

impl TelemetryUpdate {
    pub fn appliance_id(&self) -> &str {
        &self.payload.cooker_id
    }
}

// ── DeviceRegistry ───────────────────────────────────────────────────

/// Handle to the registry. Cheaply cloneable.
#[derive(Clone)]
pub struct DeviceRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    session: RealtimeSession,
    store: Arc<ApplianceStore>,
    history: TimeSeriesStore,
    credentials: CredentialProvider,
    /// Latest `processedCommandIds` reported by each appliance.
    processed: Arc<DashMap<String, Vec<Uuid>>>,
    needs_auth: watch::Sender<bool>,
    telemetry_tx: broadcast::Sender<TelemetryUpdate>,
    /// Subscribed at construction so no event is missed; taken by the
    /// ingest task when it starts.
    event_rx: Mutex<Option<mpsc::UnboundedReceiver<SessionEvent>>>,
    poll_interval: Duration,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl DeviceRegistry {
    pub fn new(
        session: RealtimeSession,
        history: TimeSeriesStore,
        credentials: CredentialProvider,
        poll_interval: Duration,
    ) -> Self {
        let event_rx = session.queue();
        let (needs_auth, _) = watch::channel(false);
        let (telemetry_tx, _) = broadcast::channel(TELEMETRY_CHANNEL_CAPACITY);

        Self {
            inner: Arc::new(RegistryInner {
                session,
                store: Arc::new(ApplianceStore::new()),
                history,
                credentials,
                processed: Arc::new(DashMap::new()),
                needs_auth,
                telemetry_tx,
                event_rx: Mutex::new(Some(event_rx)),
                poll_interval,
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Build the session and open the history store described by `config`.
    pub async fn open(
        config: &SessionConfig,
        credentials: CredentialProvider,
    ) -> Result<Self, CoreError> {
        let history = TimeSeriesStore::open(&config.history, config.sql_trace).await?;
        let session = RealtimeSession::new(config.relay.clone());
        Ok(Self::new(
            session,
            history,
            credentials,
            config.poll_interval,
        ))
    }

    // ── Connection ───────────────────────────────────────────────────

    async fn start_ingest(&self) {
        let Some(rx) = self.inner.event_rx.lock().await.take() else {
            return;
        };

        let ingest = Ingest {
            store: Arc::clone(&self.inner.store),
            history: self.inner.history.clone(),
            processed: Arc::clone(&self.inner.processed),
            telemetry_tx: self.inner.telemetry_tx.clone(),
        };
        let cancel = self.inner.cancel.clone();
        self.inner
            .task_handles
            .lock()
            .await
            .push(tokio::spawn(ingest_task(ingest, rx, cancel)));
        debug!("ingest task started");
    }

    /// Connect unless already connected, fetching or refreshing the
    /// credential first. Idempotent.
    pub async fn ensure_connected(&self) -> Connectivity {
        self.start_ingest().await;

        if self.inner.session.is_open() {
            return Connectivity::Connected;
        }

        let Some(credential) = self.inner.credentials.get_credential().await else {
            if !self.inner.needs_auth.send_replace(true) {
                warn!("no usable credential, sign-in required");
            }
            self.inner.store.clear_active();
            self.disconnect().await;
            return Connectivity::NeedsAuthentication;
        };
        self.inner.needs_auth.send_replace(false);

        match self.inner.session.connect(&credential.id_token).await {
            Ok(()) => Connectivity::Connected,
            Err(e) => {
                warn!(error = %e, "relay unreachable");
                Connectivity::Offline {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Poll until the relay has announced at least one appliance,
    /// reconnecting as needed. Unbounded: callers apply their own timeout.
    pub async fn wait_for_appliance(&self, interval: Duration) -> Result<Arc<Appliance>, CoreError> {
        let mut projection = self.inner.store.subscribe();
        loop {
            if let Some(appliance) = self.first_appliance() {
                return Ok(appliance);
            }
            if self.ensure_connected().await == Connectivity::NeedsAuthentication {
                return Err(CoreError::NeedsAuthentication);
            }

            tokio::select! {
                biased;
                () = self.inner.cancel.cancelled() => return Err(CoreError::Disconnected),
                _ = projection.changed() => {}
                () = tokio::time::sleep(interval) => {}
            }
        }
    }

    /// Close the relay transport. The registry can reconnect later.
    pub async fn disconnect(&self) {
        self.inner.session.disconnect().await;
        self.inner.store.mark_disconnected();
    }

    /// Stop the ingest task and close the transport for good.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        drop(handles);
        self.disconnect().await;
        debug!("registry shut down");
    }

    // ── Authentication ───────────────────────────────────────────────

    pub fn needs_authentication(&self) -> bool {
        *self.inner.needs_auth.borrow()
    }

    /// Observe the needs-authentication flag.
    pub fn auth_watch(&self) -> watch::Receiver<bool> {
        self.inner.needs_auth.subscribe()
    }

    /// Persist a credential obtained from the sign-in flow.
    pub async fn sign_in(&self, credential: &Credential) -> Result<(), CoreError> {
        self.inner.credentials.save(credential).await?;
        self.inner.needs_auth.send_replace(false);
        info!("signed in");
        Ok(())
    }

    /// Forget the credential, deselect the appliance, and disconnect.
    pub async fn sign_out(&self) -> Result<(), CoreError> {
        self.inner.credentials.clear().await?;
        self.inner.needs_auth.send_replace(true);
        self.inner.store.clear_active();
        self.disconnect().await;
        info!("signed out");
        Ok(())
    }

    // ── Projection access ────────────────────────────────────────────

    pub fn projection(&self) -> Arc<Projection> {
        self.inner.store.snapshot()
    }

    pub fn subscribe(&self) -> ProjectionStream {
        self.inner.store.subscribe()
    }

    pub fn telemetry(&self) -> broadcast::Receiver<TelemetryUpdate> {
        self.inner.telemetry_tx.subscribe()
    }

    pub fn appliances(&self) -> Vec<Arc<Appliance>> {
        self.projection().appliances.values().cloned().collect()
    }

    pub fn first_appliance(&self) -> Option<Arc<Appliance>> {
        self.projection().first_appliance().cloned()
    }

    pub fn active_appliance(&self) -> Option<Arc<Appliance>> {
        self.projection().active_appliance().cloned()
    }

    /// Case-insensitive display-name lookup.
    pub fn appliance_by_name(&self, name: &str) -> Option<Arc<Appliance>> {
        self.projection()
            .appliances
            .values()
            .find(|a| a.display_name.eq_ignore_ascii_case(name))
            .cloned()
    }

    /// Newest telemetry received for `appliance_id`.
    pub fn latest(&self, appliance_id: &str) -> Option<Arc<StatePayload>> {
        self.projection().latest(appliance_id).cloned()
    }

    /// True once any relay message arrived since the last disconnect.
    pub fn connected(&self) -> bool {
        self.projection().connected
    }

    pub fn select_appliance(&self, appliance_id: &str) -> Result<(), CoreError> {
        if self.inner.store.set_active(appliance_id) {
            info!(appliance_id, "active appliance selected");
            Ok(())
        } else {
            Err(CoreError::ApplianceNotFound {
                identifier: appliance_id.to_owned(),
            })
        }
    }

    /// Whether an appliance has reported `request_id` as processed.
    pub fn was_processed(&self, request_id: &Uuid) -> bool {
        self.inner
            .processed
            .iter()
            .any(|ids| ids.value().contains(request_id))
    }

    pub fn debug_log(&self) -> &DebugLog {
        self.inner.session.debug_log()
    }

    pub fn history(&self) -> &TimeSeriesStore {
        &self.inner.history
    }

    pub fn session(&self) -> &RealtimeSession {
        &self.inner.session
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Resolve a command target: an explicit id or display name, else the
    /// active appliance, else the first known one.
    pub fn resolve_target(&self, explicit: Option<&str>) -> Result<String, CoreError> {
        let projection = self.projection();
        if let Some(wanted) = explicit {
            if projection.appliances.contains_key(wanted) {
                return Ok(wanted.to_owned());
            }
            return self
                .appliance_by_name(wanted)
                .map(|a| a.id.clone())
                .ok_or_else(|| CoreError::ApplianceNotFound {
                    identifier: wanted.to_owned(),
                });
        }

        projection
            .active_appliance()
            .or_else(|| projection.first_appliance())
            .map(|a| a.id.clone())
            .ok_or(CoreError::NoAppliance)
    }

    async fn target(&self, explicit: Option<&str>) -> Result<String, CoreError> {
        self.wait_for_appliance(self.inner.poll_interval).await?;
        self.resolve_target(explicit)
    }

    fn send(&self, command: &OutboundCommand) -> Result<Uuid, CoreError> {
        let request_id = self.inner.session.send_command(command)?;
        debug!(
            command = command.tag(),
            appliance_id = command.appliance_id(),
            %request_id,
            "command sent"
        );
        Ok(request_id)
    }

    pub async fn start_preset(&self, preset: Preset, target: Option<&str>) -> Result<Uuid, CoreError> {
        let appliance_id = self.target(target).await?;
        info!(appliance_id = %appliance_id, %preset, "starting cook");
        self.send(&OutboundCommand::StartCook {
            appliance_id,
            cook: preset.start_cook(),
        })
    }

    pub async fn stop(&self, target: Option<&str>) -> Result<Uuid, CoreError> {
        let appliance_id = self.target(target).await?;
        self.send(&OutboundCommand::StopCook { appliance_id })
    }

    pub async fn set_lamp_preference(&self, on: bool, target: Option<&str>) -> Result<Uuid, CoreError> {
        let appliance_id = self.target(target).await?;
        self.send(&OutboundCommand::SetLampPreference { appliance_id, on })
    }

    pub async fn set_temperature_unit(
        &self,
        unit: TemperatureUnit,
        target: Option<&str>,
    ) -> Result<Uuid, CoreError> {
        let appliance_id = self.target(target).await?;
        self.send(&OutboundCommand::SetTemperatureUnit { appliance_id, unit })
    }

    /// Claim an appliance with the payload from its pairing code. Needs a
    /// connection but no known appliance.
    pub async fn pair_with_code(&self, data: impl Into<String>) -> Result<Uuid, CoreError> {
        match self.ensure_connected().await {
            Connectivity::Connected => {}
            Connectivity::NeedsAuthentication => return Err(CoreError::NeedsAuthentication),
            Connectivity::Offline { reason } => return Err(CoreError::ConnectionFailed { reason }),
        }
        self.send(&OutboundCommand::AddUserWithPairing { data: data.into() })
    }
}

// ── Ingest ───────────────────────────────────────────────────────────

struct Ingest {
    store: Arc<ApplianceStore>,
    history: TimeSeriesStore,
    processed: Arc<DashMap<String, Vec<Uuid>>>,
    telemetry_tx: broadcast::Sender<TelemetryUpdate>,
}

impl Ingest {
    async fn handle(&self, event: SessionEvent) {
        match event {
            SessionEvent::Connected => debug!("relay session open"),
            SessionEvent::DeviceList(devices) => {
                self.store.apply_device_list(&devices);
                info!(count = devices.len(), "appliance list replaced");
            }
            SessionEvent::Telemetry(payload) => self.telemetry(payload).await,
            SessionEvent::Disconnected { reason } => {
                self.store.mark_disconnected();
                info!(reason = %reason, "relay session closed");
            }
        }
    }

    async fn telemetry(&self, payload: Arc<StatePayload>) {
        self.processed.insert(
            payload.cooker_id.clone(),
            payload.state.state.processed_command_ids.clone(),
        );
        self.store.apply_telemetry(Arc::clone(&payload));

        let mut snapshot = HistorySnapshot::from_state(&payload.cooker_id, &payload.state);
        let snapshot = match self.history.append(&snapshot).await {
            Ok(id) => {
                snapshot.id = Some(id);
                Some(Arc::new(snapshot))
            }
            Err(e) => {
                warn!(appliance_id = %payload.cooker_id, error = %e, "failed to persist snapshot");
                None
            }
        };

        let _ = self.telemetry_tx.send(TelemetryUpdate { payload, snapshot });
    }
}

async fn ingest_task(
    ingest: Ingest,
    mut rx: mpsc::UnboundedReceiver<SessionEvent>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = rx.recv() => match event {
                Some(event) => ingest.handle(event).await,
                None => break,
            }
        }
    }
    debug!("ingest task stopped");
}
