// ── Appliance state projection ──
//
// The registry's view of the world: known appliances, which one is
// active, and the newest telemetry per appliance. Every mutation builds
// a fresh `Projection` and publishes it through a `watch` channel, so
// readers always see a whole, consistent snapshot.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use tokio::sync::watch;

use ovenlink_api::protocol::{StatePayload, WireDevice};

use crate::model::Appliance;
use crate::stream::ProjectionStream;

#[derive(Debug, Clone, Default)]
pub struct Projection {
    /// Keyed by appliance id, in the relay's announcement order.
    pub appliances: IndexMap<String, Arc<Appliance>>,
    pub active: Option<String>,
    /// Latest telemetry per appliance id.
    pub payloads: HashMap<String, Arc<StatePayload>>,
    /// True once any relay message arrived since the last disconnect.
    pub connected: bool,
}

impl Projection {
    /// First appliance in announcement order.
    pub fn first_appliance(&self) -> Option<&Arc<Appliance>> {
        self.appliances.first().map(|(_, a)| a)
    }

    pub fn active_appliance(&self) -> Option<&Arc<Appliance>> {
        self.active.as_ref().and_then(|id| self.appliances.get(id))
    }

    pub fn latest(&self, appliance_id: &str) -> Option<&Arc<StatePayload>> {
        self.payloads.get(appliance_id)
    }

    pub fn active_payload(&self) -> Option<&Arc<StatePayload>> {
        self.active.as_ref().and_then(|id| self.payloads.get(id))
    }
}

/// Single-writer store for the projection.
pub struct ApplianceStore {
    tx: watch::Sender<Arc<Projection>>,
}

impl Default for ApplianceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ApplianceStore {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Arc::new(Projection::default()));
        Self { tx }
    }

    pub fn snapshot(&self) -> Arc<Projection> {
        Arc::clone(&self.tx.borrow())
    }

    pub fn subscribe(&self) -> ProjectionStream {
        ProjectionStream::new(self.tx.subscribe())
    }

    fn update(&self, f: impl FnOnce(&mut Projection)) {
        self.tx.send_modify(|current| {
            let mut next = Projection::clone(current);
            f(&mut next);
            *current = Arc::new(next);
        });
    }

    // ── Mutations ────────────────────────────────────────────────────

    /// Replace the appliance set wholesale. Clears the active appliance
    /// when it is no longer listed.
    pub fn apply_device_list(&self, devices: &[WireDevice]) {
        self.update(|p| {
            p.appliances = devices
                .iter()
                .map(|d| (d.cooker_id.clone(), Arc::new(Appliance::from(d))))
                .collect();
            if p.active.as_ref().is_some_and(|id| !p.appliances.contains_key(id)) {
                p.active = None;
            }
            p.connected = true;
        });
    }

    pub fn apply_telemetry(&self, payload: Arc<StatePayload>) {
        self.update(|p| {
            p.payloads.insert(payload.cooker_id.clone(), payload);
            p.connected = true;
        });
    }

    /// Returns `false` when `appliance_id` is not a known appliance.
    pub fn set_active(&self, appliance_id: &str) -> bool {
        let mut found = false;
        self.update(|p| {
            if p.appliances.contains_key(appliance_id) {
                p.active = Some(appliance_id.to_owned());
                found = true;
            }
        });
        found
    }

    pub fn clear_active(&self) {
        self.update(|p| p.active = None);
    }

    pub fn mark_disconnected(&self) {
        self.update(|p| p.connected = false);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn device(id: &str) -> WireDevice {
        WireDevice {
            cooker_id: id.into(),
            name: format!("Oven {id}"),
            paired_at: Utc::now(),
            kind: "oven_v2".into(),
        }
    }

    #[test]
    fn device_list_replaces_wholesale() {
        let store = ApplianceStore::new();
        store.apply_device_list(&[device("a"), device("b")]);
        assert!(store.set_active("a"));

        store.apply_device_list(&[device("b")]);

        let snap = store.snapshot();
        assert_eq!(snap.appliances.len(), 1);
        assert!(!snap.appliances.contains_key("a"));
        assert_eq!(snap.active, None);
    }

    #[test]
    fn active_survives_when_still_listed() {
        let store = ApplianceStore::new();
        store.apply_device_list(&[device("a"), device("b")]);
        store.set_active("b");
        store.apply_device_list(&[device("b"), device("c")]);
        assert_eq!(store.snapshot().active_appliance().unwrap().id, "b");
    }

    #[test]
    fn empty_list_clears_everything() {
        let store = ApplianceStore::new();
        store.apply_device_list(&[device("a")]);
        store.set_active("a");
        store.apply_device_list(&[]);
        let snap = store.snapshot();
        assert!(snap.appliances.is_empty());
        assert!(snap.first_appliance().is_none());
        assert!(snap.active.is_none());
    }

    #[test]
    fn first_appliance_follows_announcement_order() {
        let store = ApplianceStore::new();
        store.apply_device_list(&[device("z"), device("a")]);
        assert_eq!(store.snapshot().first_appliance().unwrap().id, "z");
    }

    #[test]
    fn unknown_appliance_cannot_be_activated() {
        let store = ApplianceStore::new();
        assert!(!store.set_active("ghost"));
        assert!(store.snapshot().active.is_none());
    }

    #[test]
    fn older_snapshots_are_untouched() {
        let store = ApplianceStore::new();
        let before = store.snapshot();
        store.apply_device_list(&[device("a")]);
        assert!(before.appliances.is_empty());
        assert!(!before.connected);
        assert!(store.snapshot().connected);
    }
}
