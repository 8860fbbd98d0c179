// Integration tests for `DeviceRegistry` against a local websocket relay.
#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use futures_util::{SinkExt, StreamExt};
use secrecy::SecretString;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;

use ovenlink_api::protocol::OutboundCommand;
use ovenlink_api::{Credential, RealtimeSession, RelayConfig, TokenRefresher};
use ovenlink_core::{
    Connectivity, CoreError, CredentialProvider, CredentialStore, DeviceRegistry, HistoryLocation,
    MemoryCredentialStore, Preset, TimeSeriesStore,
};

const STATE: &str = include_str!("../../ovenlink-api/tests/fixtures/apo_state.json");
const APPLIANCE: &str = "a1b2c3d4e5f6";
const WAIT: Duration = Duration::from_secs(5);
const POLL: Duration = Duration::from_millis(50);

// ── Helpers ─────────────────────────────────────────────────────────

type ServerWs = WebSocketStream<TcpStream>;

struct Relay {
    url: String,
    accepted: mpsc::UnboundedReceiver<ServerWs>,
}

impl Relay {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, accepted) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let Ok(ws) = tokio_tungstenite::accept_async(stream).await else {
                    continue;
                };
                if tx.send(ws).is_err() {
                    break;
                }
            }
        });

        Self {
            url: format!("ws://{addr}/"),
            accepted,
        }
    }

    async fn accept(&mut self) -> ServerWs {
        tokio::time::timeout(WAIT, self.accepted.recv())
            .await
            .unwrap()
            .unwrap()
    }
}

struct RejectingRefresher;

#[async_trait]
impl TokenRefresher for RejectingRefresher {
    async fn refresh(&self, _: &Credential) -> Result<Credential, ovenlink_api::Error> {
        Err(ovenlink_api::Error::TokenRefresh {
            status: 400,
            message: "INVALID_REFRESH_TOKEN".into(),
        })
    }
}

fn live_credential() -> Credential {
    Credential {
        id_token: SecretString::from("id-token"),
        refresh_token: SecretString::from("refresh-token"),
        expires_at: Utc::now() + TimeDelta::hours(1),
    }
}

async fn registry(relay: &Relay, credential: Option<Credential>) -> DeviceRegistry {
    let store = Arc::new(MemoryCredentialStore::new(credential));
    let history = TimeSeriesStore::in_memory().await.unwrap();
    registry_with(relay, store, history)
}

fn registry_with(
    relay: &Relay,
    store: Arc<MemoryCredentialStore>,
    history: TimeSeriesStore,
) -> DeviceRegistry {
    let session = RealtimeSession::new(RelayConfig {
        url: relay.url.clone(),
        ..RelayConfig::default()
    });
    let credentials = CredentialProvider::new(store, Arc::new(RejectingRefresher));
    DeviceRegistry::new(session, history, credentials, POLL)
}

async fn wait_until_closed(registry: &DeviceRegistry) {
    tokio::time::timeout(WAIT, async {
        while registry.session().is_open() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .unwrap();
}

fn device_list(ids: &[&str]) -> Message {
    let devices: Vec<_> = ids
        .iter()
        .map(|id| {
            serde_json::json!({
                "cookerId": id,
                "name": format!("Oven {id}"),
                "pairedAt": "2024-05-01T09:30:00Z",
                "type": "oven_v2",
            })
        })
        .collect();
    Message::text(
        serde_json::json!({ "command": "EVENT_APO_WIFI_LIST", "payload": devices }).to_string(),
    )
}

async fn next_command(ws: &mut ServerWs) -> OutboundCommand {
    loop {
        let frame = tokio::time::timeout(WAIT, ws.next()).await.unwrap().unwrap().unwrap();
        if let Message::Text(text) = frame {
            return OutboundCommand::from_wire(text.as_str()).unwrap().1;
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_missing_credential_needs_authentication() {
    let relay = Relay::start().await;
    let registry = registry(&relay, None).await;

    assert_eq!(registry.ensure_connected().await, Connectivity::NeedsAuthentication);
    assert!(registry.needs_authentication());

    let err = registry.wait_for_appliance(POLL).await.unwrap_err();
    assert!(matches!(err, CoreError::NeedsAuthentication));
}

#[tokio::test]
async fn test_unrefreshable_credential_needs_authentication() {
    let relay = Relay::start().await;
    let mut expired = live_credential();
    expired.expires_at = Utc::now() - TimeDelta::minutes(5);
    let registry = registry(&relay, Some(expired)).await;

    assert_eq!(registry.ensure_connected().await, Connectivity::NeedsAuthentication);
}

#[tokio::test]
async fn test_device_list_and_telemetry_are_projected_and_persisted() {
    let mut relay = Relay::start().await;
    let registry = registry(&relay, Some(live_credential())).await;
    let mut telemetry = registry.telemetry();

    assert_eq!(registry.ensure_connected().await, Connectivity::Connected);
    let mut ws = relay.accept().await;

    ws.send(device_list(&[APPLIANCE])).await.unwrap();
    let appliance = tokio::time::timeout(WAIT, registry.wait_for_appliance(POLL))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(appliance.id, APPLIANCE);
    assert_eq!(appliance.display_name, format!("Oven {APPLIANCE}"));

    ws.send(Message::text(STATE.to_owned())).await.unwrap();
    let update = tokio::time::timeout(WAIT, telemetry.recv()).await.unwrap().unwrap();
    assert_eq!(update.appliance_id(), APPLIANCE);
    let snapshot = update.snapshot.unwrap();
    assert!(snapshot.id.is_some());

    assert!(registry.connected());
    assert!(registry.latest(APPLIANCE).is_some());
    assert!(registry.was_processed(&"6c4d0f3e-1b4a-4b8e-9a53-1f2f3d9c8e71".parse().unwrap()));

    let rows = registry
        .history()
        .snapshots_for_cook(APPLIANCE, snapshot.cook_id.as_deref().unwrap())
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn test_removed_active_appliance_is_cleared() {
    let mut relay = Relay::start().await;
    let registry = registry(&relay, Some(live_credential())).await;
    registry.ensure_connected().await;
    let mut ws = relay.accept().await;
    let mut projection = registry.subscribe();

    ws.send(device_list(&["a", "b"])).await.unwrap();
    tokio::time::timeout(WAIT, projection.changed()).await.unwrap().unwrap();
    registry.select_appliance("a").unwrap();
    assert_eq!(registry.active_appliance().unwrap().id, "a");

    ws.send(device_list(&["b"])).await.unwrap();
    loop {
        let snap = tokio::time::timeout(WAIT, projection.changed()).await.unwrap().unwrap();
        if !snap.appliances.contains_key("a") {
            assert!(snap.active.is_none());
            break;
        }
    }
    assert!(matches!(
        registry.select_appliance("a"),
        Err(CoreError::ApplianceNotFound { .. })
    ));
}

#[tokio::test]
async fn test_commands_reach_resolved_appliance() {
    let mut relay = Relay::start().await;
    let registry = registry(&relay, Some(live_credential())).await;
    registry.ensure_connected().await;
    let mut ws = relay.accept().await;
    ws.send(device_list(&["first", "second"])).await.unwrap();

    registry.start_preset(Preset::AirFry, None).await.unwrap();
    match next_command(&mut ws).await {
        OutboundCommand::StartCook { appliance_id, cook } => {
            assert_eq!(appliance_id, "first");
            assert_eq!(cook.stages.len(), 2);
        }
        other => panic!("unexpected command {other:?}"),
    }

    registry.select_appliance("second").unwrap();
    registry.set_lamp_preference(false, None).await.unwrap();
    assert_eq!(
        next_command(&mut ws).await,
        OutboundCommand::SetLampPreference {
            appliance_id: "second".into(),
            on: false
        }
    );

    registry.stop(Some("Oven first")).await.unwrap();
    assert_eq!(
        next_command(&mut ws).await,
        OutboundCommand::StopCook {
            appliance_id: "first".into()
        }
    );

    let err = registry.stop(Some("ghost")).await.unwrap_err();
    assert!(matches!(err, CoreError::ApplianceNotFound { .. }));
}

#[tokio::test]
async fn test_reconnects_after_relay_drop() {
    let mut relay = Relay::start().await;
    let registry = registry(&relay, Some(live_credential())).await;
    let mut telemetry = registry.telemetry();
    registry.ensure_connected().await;
    let mut ws = relay.accept().await;
    ws.send(device_list(&[APPLIANCE])).await.unwrap();
    tokio::time::timeout(WAIT, registry.wait_for_appliance(POLL))
        .await
        .unwrap()
        .unwrap();
    assert!(registry.connected());

    drop(ws);
    wait_until_closed(&registry).await;
    tokio::time::timeout(WAIT, async {
        while registry.connected() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .unwrap();

    assert_eq!(registry.ensure_connected().await, Connectivity::Connected);
    let mut ws = relay.accept().await;
    ws.send(Message::text(STATE.to_owned())).await.unwrap();
    let update = tokio::time::timeout(WAIT, telemetry.recv()).await.unwrap().unwrap();
    assert_eq!(update.appliance_id(), APPLIANCE);
    assert_eq!(registry.history().count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_sign_out_disconnects_and_requires_sign_in() {
    let mut relay = Relay::start().await;
    let registry = registry(&relay, Some(live_credential())).await;
    registry.ensure_connected().await;
    let _ws = relay.accept().await;

    registry.sign_out().await.unwrap();
    assert!(registry.needs_authentication());
    assert!(!registry.session().is_open());
    assert_eq!(registry.ensure_connected().await, Connectivity::NeedsAuthentication);

    registry.sign_in(&live_credential()).await.unwrap();
    assert!(!registry.needs_authentication());
    assert_eq!(registry.ensure_connected().await, Connectivity::Connected);
    registry.shutdown().await;
}

#[tokio::test]
async fn test_burst_beyond_channel_capacity_is_fully_persisted() {
    const FRAMES: i64 = 3000;

    let dir = tempfile::tempdir().unwrap();
    let history = TimeSeriesStore::open(&HistoryLocation::File(dir.path().join("history.db")), false)
        .await
        .unwrap();
    let mut relay = Relay::start().await;
    let store = Arc::new(MemoryCredentialStore::new(Some(live_credential())));
    let registry = registry_with(&relay, store, history);
    registry.ensure_connected().await;
    let mut ws = relay.accept().await;

    for _ in 0..FRAMES {
        ws.feed(Message::text(STATE.to_owned())).await.unwrap();
    }
    ws.flush().await.unwrap();

    tokio::time::timeout(Duration::from_secs(30), async {
        while registry.history().count().await.unwrap() < FRAMES {
            tokio::time::sleep(POLL).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(registry.history().count().await.unwrap(), FRAMES);
    registry.shutdown().await;
}

#[tokio::test]
async fn test_failed_snapshot_write_does_not_stop_ingest() {
    let mut relay = Relay::start().await;
    let registry = registry(&relay, Some(live_credential())).await;
    let mut telemetry = registry.telemetry();
    registry.ensure_connected().await;
    let mut ws = relay.accept().await;

    registry.history().close().await;

    ws.send(Message::text(STATE.to_owned())).await.unwrap();
    ws.send(Message::text(STATE.to_owned())).await.unwrap();
    for _ in 0..2 {
        let update = tokio::time::timeout(WAIT, telemetry.recv()).await.unwrap().unwrap();
        assert_eq!(update.appliance_id(), APPLIANCE);
        assert!(update.snapshot.is_none());
    }
    assert!(registry.latest(APPLIANCE).is_some());
}

#[tokio::test]
async fn test_processed_ids_follow_latest_report() {
    let mut relay = Relay::start().await;
    let registry = registry(&relay, Some(live_credential())).await;
    let mut telemetry = registry.telemetry();
    registry.ensure_connected().await;
    let mut ws = relay.accept().await;
    let reported = "6c4d0f3e-1b4a-4b8e-9a53-1f2f3d9c8e71".parse().unwrap();

    ws.send(Message::text(STATE.to_owned())).await.unwrap();
    tokio::time::timeout(WAIT, telemetry.recv()).await.unwrap().unwrap();
    assert!(registry.was_processed(&reported));

    let mut frame: serde_json::Value = serde_json::from_str(STATE).unwrap();
    frame["payload"]["state"]["state"]["processedCommandIds"] = serde_json::json!([]);
    ws.send(Message::text(frame.to_string())).await.unwrap();
    tokio::time::timeout(WAIT, telemetry.recv()).await.unwrap().unwrap();
    assert!(!registry.was_processed(&reported));
}

#[tokio::test]
async fn test_lost_credential_clears_active_appliance() {
    let mut relay = Relay::start().await;
    let store = Arc::new(MemoryCredentialStore::new(Some(live_credential())));
    let history = TimeSeriesStore::in_memory().await.unwrap();
    let registry = registry_with(&relay, Arc::clone(&store), history);
    registry.ensure_connected().await;
    let mut ws = relay.accept().await;

    ws.send(device_list(&["a", "b"])).await.unwrap();
    tokio::time::timeout(WAIT, registry.wait_for_appliance(POLL))
        .await
        .unwrap()
        .unwrap();
    registry.select_appliance("b").unwrap();

    drop(ws);
    wait_until_closed(&registry).await;
    store.clear().await.unwrap();

    assert_eq!(registry.ensure_connected().await, Connectivity::NeedsAuthentication);
    assert!(registry.needs_authentication());
    assert!(registry.active_appliance().is_none());
    assert!(!registry.session().is_open());
    assert!(!registry.connected());
}
