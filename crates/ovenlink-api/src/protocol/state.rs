// ── Appliance telemetry state ──
//
// Typed mirror of the `state` object carried by `EVENT_APO_STATE`.
// Every field is required unless the appliance omits it in some mode;
// those are `Option` and are only meaningful while the gating mode or
// flag holds (see the accessor methods).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use super::command::{StageFan, StageHeatingElements, StageSteamGenerators, StageTemperatureBulbs};
use super::temperature::{Temperature, TemperatureUnit};

/// One full telemetry snapshot of an appliance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplianceState {
    pub version: i64,
    pub updated_timestamp: DateTime<Utc>,
    pub system_info: SystemInfo,
    pub state: CookerState,
    pub nodes: Nodes,
    /// Present only while a cook program is active.
    #[serde(default)]
    pub cook: Option<Cook>,
}

impl ApplianceState {
    pub fn mode(&self) -> CookerMode {
        self.state.mode
    }

    pub fn cook_id(&self) -> Option<&str> {
        self.cook.as_ref().map(|c| c.cook_id.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    pub online: bool,
    pub hardware_version: String,
    pub power_mains: i64,
    pub power_hertz: i64,
    pub firmware_version: String,
    pub ui_hardware_version: String,
    pub ui_firmware_version: String,
    pub last_connected_timestamp: DateTime<Utc>,
    pub last_disconnected_timestamp: DateTime<Utc>,
    pub triacs_failed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CookerMode {
    Idle,
    Cook,
    Descale,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CookerState {
    pub mode: CookerMode,
    pub temperature_unit: TemperatureUnit,
    #[serde(default)]
    pub processed_command_ids: Vec<Uuid>,
}

// ── Cook session ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cook {
    pub cook_id: String,
    pub active_stage_id: String,
    pub active_stage_index: usize,
    pub active_stage_seconds_elapsed: i64,
    pub seconds_elapsed: i64,
    pub stage_transition_pending_user_action: bool,
    pub stages: Vec<CookStage>,
}

impl Cook {
    pub fn active_stage(&self) -> Option<&CookStage> {
        self.stages.get(self.active_stage_index)
    }
}

/// A stage as echoed back by the appliance while cooking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CookStage {
    pub id: String,
    /// `preheat`, `cook`, or `stop`.
    #[serde(rename = "type")]
    pub kind: String,
    pub user_action_required: bool,
    pub fan: StageFan,
    pub heating_elements: StageHeatingElements,
    pub temperature_bulbs: StageTemperatureBulbs,
    pub vent: Vent,
    #[serde(default)]
    pub steam_generators: Option<StageSteamGenerators>,
}

// ── Nodes ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Nodes {
    pub temperature_bulbs: TemperatureBulbs,
    pub timer: Timer,
    pub temperature_probe: TemperatureProbe,
    pub steam_generators: SteamGenerators,
    pub heating_elements: HeatingElements,
    pub fan: Fan,
    pub vent: Vent,
    pub water_tank: WaterTank,
    pub door: Door,
    pub lamp: Lamp,
    pub user_interface_circuit: UserInterfaceCircuit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TemperatureBulbsMode {
    Dry,
    Wet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemperatureBulbs {
    pub mode: TemperatureBulbsMode,
    pub wet: WetBulb,
    pub dry: DryBulb,
    pub dry_top: EdgeBulb,
    pub dry_bottom: EdgeBulb,
}

impl TemperatureBulbs {
    /// Dry setpoint, only while the bulbs are in dry mode.
    pub fn dry_setpoint(&self) -> Option<Temperature> {
        match self.mode {
            TemperatureBulbsMode::Dry => self.dry.setpoint,
            TemperatureBulbsMode::Wet => None,
        }
    }

    /// Wet setpoint, only while the bulbs are in wet mode.
    pub fn wet_setpoint(&self) -> Option<Temperature> {
        match self.mode {
            TemperatureBulbsMode::Wet => self.wet.setpoint,
            TemperatureBulbsMode::Dry => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WetBulb {
    pub current: Temperature,
    #[serde(default)]
    pub setpoint: Option<Temperature>,
    pub dosed: bool,
    pub dose_failed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DryBulb {
    pub current: Temperature,
    #[serde(default)]
    pub setpoint: Option<Temperature>,
}

/// The top and bottom dry bulbs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeBulb {
    pub current: Temperature,
    pub overheated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TimerMode {
    Idle,
    Running,
    Paused,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timer {
    pub mode: TimerMode,
    /// Seconds.
    pub initial: i64,
    pub current: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureProbe {
    pub connected: bool,
    #[serde(default)]
    pub current: Option<Temperature>,
    #[serde(default)]
    pub setpoint: Option<Temperature>,
}

impl TemperatureProbe {
    pub fn reading(&self) -> Option<Temperature> {
        if self.connected { self.current } else { None }
    }

    pub fn target(&self) -> Option<Temperature> {
        if self.connected { self.setpoint } else { None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum SteamGeneratorMode {
    Idle,
    RelativeHumidity,
    SteamPercentage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SteamGenerators {
    pub mode: SteamGeneratorMode,
    #[serde(default)]
    pub relative_humidity: Option<RelativeHumidity>,
    #[serde(default)]
    pub steam_percentage: Option<SteamPercentage>,
    pub evaporator: Evaporator,
    pub boiler: Boiler,
}

impl SteamGenerators {
    pub fn humidity(&self) -> Option<&RelativeHumidity> {
        match self.mode {
            SteamGeneratorMode::RelativeHumidity => self.relative_humidity.as_ref(),
            _ => None,
        }
    }

    pub fn steam_percentage_setpoint(&self) -> Option<f64> {
        match self.mode {
            SteamGeneratorMode::SteamPercentage => self.steam_percentage.map(|s| s.setpoint),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelativeHumidity {
    #[serde(default)]
    pub setpoint: Option<f64>,
    #[serde(default)]
    pub current: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SteamPercentage {
    pub setpoint: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaporator {
    pub failed: bool,
    pub overheated: bool,
    pub celsius: f64,
    pub watts: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Boiler {
    pub celsius: f64,
    pub descale_required: bool,
    pub dosed: bool,
    pub failed: bool,
    pub overheated: bool,
    pub watts: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatingElements {
    pub top: HeatingElement,
    pub bottom: HeatingElement,
    pub rear: HeatingElement,
}

impl HeatingElements {
    pub fn total_watts(&self) -> i64 {
        self.top.watts + self.bottom.watts + self.rear.watts
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatingElement {
    pub on: bool,
    pub failed: bool,
    pub watts: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fan {
    pub speed: i64,
    pub failed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vent {
    pub open: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterTank {
    pub empty: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Door {
    pub closed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LampPreference {
    On,
    Off,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lamp {
    pub on: bool,
    pub failed: bool,
    pub preference: LampPreference,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInterfaceCircuit {
    pub communication_failed: bool,
}
