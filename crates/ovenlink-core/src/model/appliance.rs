// ── Appliance identity ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ovenlink_api::protocol::WireDevice;

/// A paired oven as announced by the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appliance {
    pub id: String,
    pub display_name: String,
    pub paired_at: DateTime<Utc>,
    /// Hardware generation reported by the relay, e.g. `oven_v2`.
    pub kind: String,
}

impl From<&WireDevice> for Appliance {
    fn from(d: &WireDevice) -> Self {
        Self {
            id: d.cooker_id.clone(),
            display_name: d.name.clone(),
            paired_at: d.paired_at,
            kind: d.kind.clone(),
        }
    }
}
