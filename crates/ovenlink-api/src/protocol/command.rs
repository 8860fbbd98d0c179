// ── Outbound commands ──
//
// Every command travels as
// `{"command": TAG, "payload": {"id", "type": TAG, "payload"?}, "requestId"}`.
// `OutboundCommand` is the closed set of commands the client can issue;
// each variant owns its tag and its inner payload shape.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::state::{SteamGeneratorMode, TemperatureBulbsMode, Vent};
use super::temperature::{Temperature, TemperatureUnit};
use crate::error::Error;

pub const CMD_APO_START: &str = "CMD_APO_START";
pub const CMD_APO_STOP: &str = "CMD_APO_STOP";
pub const CMD_APO_SET_LAMP_PREFERENCE: &str = "CMD_APO_SET_LAMP_PREFERENCE";
pub const CMD_APO_SET_TEMPERATURE_UNIT: &str = "CMD_APO_SET_TEMPERATURE_UNIT";
pub const CMD_ADD_USER_WITH_PAIRING: &str = "CMD_ADD_USER_WITH_PAIRING";

// ── Stage definitions ────────────────────────────────────────────────

/// Payload of `CMD_APO_START`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartCook {
    pub cook_id: String,
    pub stages: Vec<StartStage>,
}

/// One stage of a cook program as sent to the appliance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartStage {
    pub step_type: String,
    pub id: String,
    pub title: String,
    pub description: String,
    /// `preheat` or `cook`.
    #[serde(rename = "type")]
    pub kind: String,
    pub user_action_required: bool,
    pub temperature_bulbs: StageTemperatureBulbs,
    pub heating_elements: StageHeatingElements,
    pub fan: StageFan,
    pub vent: Vent,
    pub rack_position: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timer_added: Option<bool>,
    pub probe_added: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steam_generators: Option<StageSteamGenerators>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageFan {
    pub speed: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementSwitch {
    pub on: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageHeatingElements {
    pub rear: ElementSwitch,
    pub top: ElementSwitch,
    pub bottom: ElementSwitch,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageSetpoint {
    pub setpoint: Temperature,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageTemperatureBulbs {
    pub mode: TemperatureBulbsMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dry: Option<StageSetpoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wet: Option<StageSetpoint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageRatio {
    pub setpoint: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageSteamGenerators {
    pub mode: SteamGeneratorMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative_humidity: Option<StageRatio>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steam_percentage: Option<StageRatio>,
}

// ── Command set ──────────────────────────────────────────────────────

/// Every command the client can send through the relay.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundCommand {
    StartCook { appliance_id: String, cook: StartCook },
    StopCook { appliance_id: String },
    SetLampPreference { appliance_id: String, on: bool },
    SetTemperatureUnit { appliance_id: String, unit: TemperatureUnit },
    /// Claim an appliance using the opaque payload from its pairing code.
    AddUserWithPairing { data: String },
}

/// A serialized command ready for the transport.
#[derive(Debug, Clone)]
pub struct EncodedCommand {
    pub request_id: Uuid,
    pub text: String,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<P> {
    command: String,
    payload: Addressed<P>,
    request_id: Uuid,
}

#[derive(Serialize, Deserialize)]
struct Addressed<P> {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default = "Option::default", skip_serializing_if = "Option::is_none")]
    payload: Option<P>,
}

#[derive(Serialize, Deserialize)]
struct LampBody {
    on: bool,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UnitBody {
    temperature_unit: TemperatureUnit,
}

#[derive(Serialize, Deserialize)]
struct PairingBody {
    data: String,
}

fn envelope<P: Serialize>(
    tag: &str,
    id: &str,
    payload: Option<P>,
    request_id: Uuid,
) -> Result<String, Error> {
    serde_json::to_string(&Envelope {
        command: tag.to_owned(),
        payload: Addressed {
            id: id.to_owned(),
            kind: tag.to_owned(),
            payload,
        },
        request_id,
    })
    .map_err(Error::Encode)
}

impl OutboundCommand {
    /// Fixed wire tag of this command.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::StartCook { .. } => CMD_APO_START,
            Self::StopCook { .. } => CMD_APO_STOP,
            Self::SetLampPreference { .. } => CMD_APO_SET_LAMP_PREFERENCE,
            Self::SetTemperatureUnit { .. } => CMD_APO_SET_TEMPERATURE_UNIT,
            Self::AddUserWithPairing { .. } => CMD_ADD_USER_WITH_PAIRING,
        }
    }

    /// Appliance the command is addressed to. Pairing is addressed to
    /// the relay itself and carries an empty id.
    pub fn appliance_id(&self) -> &str {
        match self {
            Self::StartCook { appliance_id, .. }
            | Self::StopCook { appliance_id }
            | Self::SetLampPreference { appliance_id, .. }
            | Self::SetTemperatureUnit { appliance_id, .. } => appliance_id,
            Self::AddUserWithPairing { .. } => "",
        }
    }

    /// Serialize with a freshly generated request id.
    pub fn encode(&self) -> Result<EncodedCommand, Error> {
        self.encode_with_id(Uuid::new_v4())
    }

    pub fn encode_with_id(&self, request_id: Uuid) -> Result<EncodedCommand, Error> {
        let tag = self.tag();
        let id = self.appliance_id();
        let text = match self {
            Self::StartCook { cook, .. } => envelope(tag, id, Some(cook), request_id)?,
            Self::StopCook { .. } => envelope::<()>(tag, id, None, request_id)?,
            Self::SetLampPreference { on, .. } => {
                envelope(tag, id, Some(LampBody { on: *on }), request_id)?
            }
            Self::SetTemperatureUnit { unit, .. } => envelope(
                tag,
                id,
                Some(UnitBody {
                    temperature_unit: *unit,
                }),
                request_id,
            )?,
            Self::AddUserWithPairing { data } => envelope(
                tag,
                id,
                Some(PairingBody { data: data.clone() }),
                request_id,
            )?,
        };
        Ok(EncodedCommand { request_id, text })
    }

    /// Decode a command previously produced by [`encode`](Self::encode).
    ///
    /// Used by relay doubles and diagnostics; the live relay never sends
    /// commands back to the client.
    pub fn from_wire(text: &str) -> Result<(Uuid, Self), Error> {
        #[derive(Deserialize)]
        struct Tag {
            command: String,
        }

        let tag: Tag = serde_json::from_str(text).map_err(|e| Error::decode(&e, text))?;
        match tag.command.as_str() {
            CMD_APO_START => {
                let (rid, id, cook) = addressed::<StartCook>(text)?;
                let cook = cook.ok_or_else(|| missing_payload(text))?;
                Ok((rid, Self::StartCook { appliance_id: id, cook }))
            }
            CMD_APO_STOP => {
                let (rid, id, _) = addressed::<serde_json::Value>(text)?;
                Ok((rid, Self::StopCook { appliance_id: id }))
            }
            CMD_APO_SET_LAMP_PREFERENCE => {
                let (rid, id, body) = addressed::<LampBody>(text)?;
                let body = body.ok_or_else(|| missing_payload(text))?;
                Ok((rid, Self::SetLampPreference { appliance_id: id, on: body.on }))
            }
            CMD_APO_SET_TEMPERATURE_UNIT => {
                let (rid, id, body) = addressed::<UnitBody>(text)?;
                let body = body.ok_or_else(|| missing_payload(text))?;
                Ok((
                    rid,
                    Self::SetTemperatureUnit {
                        appliance_id: id,
                        unit: body.temperature_unit,
                    },
                ))
            }
            CMD_ADD_USER_WITH_PAIRING => {
                let (rid, _, body) = addressed::<PairingBody>(text)?;
                let body = body.ok_or_else(|| missing_payload(text))?;
                Ok((rid, Self::AddUserWithPairing { data: body.data }))
            }
            other => Err(Error::Decode {
                message: format!("unknown command tag {other}"),
                body: text.to_owned(),
            }),
        }
    }
}

fn addressed<P: DeserializeOwned>(text: &str) -> Result<(Uuid, String, Option<P>), Error> {
    let env: Envelope<P> = serde_json::from_str(text).map_err(|e| Error::decode(&e, text))?;
    Ok((env.request_id, env.payload.id, env.payload.payload))
}

fn missing_payload(text: &str) -> Error {
    Error::Decode {
        message: "command payload missing".into(),
        body: text.to_owned(),
    }
}
