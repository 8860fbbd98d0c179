// ── Inbound relay events ──
//
// Decoding is two-phase: peek at the `command` discriminator, then
// decode the full message for the tags we understand. Anything else is
// reported as `Inbound::Ignored` so new relay events never break the
// session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::ApplianceState;
use crate::error::Error;

pub const EVENT_APO_WIFI_LIST: &str = "EVENT_APO_WIFI_LIST";
pub const EVENT_APO_STATE: &str = "EVENT_APO_STATE";

/// A paired appliance as announced by `EVENT_APO_WIFI_LIST`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireDevice {
    pub cooker_id: String,
    pub name: String,
    pub paired_at: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Body of `EVENT_APO_STATE`: one appliance's full telemetry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatePayload {
    pub cooker_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub state: ApplianceState,
}

/// A decoded relay message.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Complete replacement of the paired device set.
    DeviceList(Vec<WireDevice>),
    State(Box<StatePayload>),
    /// A well-formed message with a discriminator we do not handle.
    Ignored { command: String },
}

#[derive(Deserialize)]
struct Discriminator {
    command: String,
}

#[derive(Deserialize)]
struct Message<P> {
    payload: P,
}

/// Decode one text frame from the relay.
pub fn decode(text: &str) -> Result<Inbound, Error> {
    let tag: Discriminator = serde_json::from_str(text).map_err(|e| Error::decode(&e, text))?;

    match tag.command.as_str() {
        EVENT_APO_WIFI_LIST => {
            let msg: Message<Vec<WireDevice>> =
                serde_json::from_str(text).map_err(|e| Error::decode(&e, text))?;
            Ok(Inbound::DeviceList(msg.payload))
        }
        EVENT_APO_STATE => {
            let msg: Message<StatePayload> =
                serde_json::from_str(text).map_err(|e| Error::decode(&e, text))?;
            Ok(Inbound::State(Box::new(msg.payload)))
        }
        _ => Ok(Inbound::Ignored {
            command: tag.command,
        }),
    }
}
