// ── History snapshot ──
//
// One flattened, immutable row of appliance telemetry. Mode-gated fields
// are `None` whenever their gating mode or flag does not hold, even if
// the appliance happened to send a stale value.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use ovenlink_api::protocol::{ApplianceState, LampPreference};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct HistorySnapshot {
    /// Assigned by the store on first append.
    pub id: Option<i64>,
    pub appliance_id: String,
    pub cook_id: Option<String>,
    /// Whole seconds; sub-second precision is dropped.
    pub updated_timestamp: DateTime<Utc>,

    // Temperature bulbs (Celsius)
    pub dry: f64,
    pub dry_top: f64,
    pub dry_bottom: f64,
    pub wet: f64,
    pub wet_dosed: bool,
    pub temperature_mode: String,
    pub dry_setpoint: Option<f64>,
    pub wet_setpoint: Option<f64>,

    // Lamp, vent, door, tank, fan
    pub lamp_on: bool,
    pub lamp_preference: bool,
    pub vent_open: bool,
    pub door_closed: bool,
    pub water_tank_empty: bool,
    pub fan_speed: i64,

    // Heating elements
    pub heating_top_on: bool,
    pub heating_bottom_on: bool,
    pub heating_rear_on: bool,
    pub heating_top_watts: i64,
    pub heating_bottom_watts: i64,
    pub heating_rear_watts: i64,

    // Probe
    pub probe_connected: bool,
    pub probe: Option<f64>,
    pub probe_setpoint: Option<f64>,

    // Steam
    pub steam_mode: String,
    pub evaporator: f64,
    pub boiler: f64,
    pub boiler_dosed: bool,
    pub evaporator_watts: i64,
    pub boiler_watts: i64,
    pub relative_humidity: Option<f64>,
    pub relative_humidity_setpoint: Option<f64>,
    pub steam_percentage_setpoint: Option<f64>,

    // Timer
    pub timer_mode: String,
    pub timer_initial: i64,
    pub timer_current: i64,
}

impl HistorySnapshot {
    /// Flatten one telemetry state for `appliance_id`.
    pub fn from_state(appliance_id: &str, state: &ApplianceState) -> Self {
        let nodes = &state.nodes;
        let bulbs = &nodes.temperature_bulbs;
        let steam = &nodes.steam_generators;
        let heating = &nodes.heating_elements;
        let humidity = steam.humidity();

        Self {
            id: None,
            appliance_id: appliance_id.to_owned(),
            cook_id: state.cook_id().map(str::to_owned),
            updated_timestamp: state.updated_timestamp.trunc_subsecs(0),

            dry: bulbs.dry.current.celsius,
            dry_top: bulbs.dry_top.current.celsius,
            dry_bottom: bulbs.dry_bottom.current.celsius,
            wet: bulbs.wet.current.celsius,
            wet_dosed: bulbs.wet.dosed,
            temperature_mode: bulbs.mode.to_string(),
            dry_setpoint: bulbs.dry_setpoint().map(|t| t.celsius),
            wet_setpoint: bulbs.wet_setpoint().map(|t| t.celsius),

            lamp_on: nodes.lamp.on,
            lamp_preference: nodes.lamp.preference == LampPreference::On,
            vent_open: nodes.vent.open,
            door_closed: nodes.door.closed,
            water_tank_empty: nodes.water_tank.empty,
            fan_speed: nodes.fan.speed,

            heating_top_on: heating.top.on,
            heating_bottom_on: heating.bottom.on,
            heating_rear_on: heating.rear.on,
            heating_top_watts: heating.top.watts,
            heating_bottom_watts: heating.bottom.watts,
            heating_rear_watts: heating.rear.watts,

            probe_connected: nodes.temperature_probe.connected,
            probe: nodes.temperature_probe.reading().map(|t| t.celsius),
            probe_setpoint: nodes.temperature_probe.target().map(|t| t.celsius),

            steam_mode: steam.mode.to_string(),
            evaporator: steam.evaporator.celsius,
            boiler: steam.boiler.celsius,
            boiler_dosed: steam.boiler.dosed,
            evaporator_watts: steam.evaporator.watts,
            boiler_watts: steam.boiler.watts,
            relative_humidity: humidity.and_then(|h| h.current),
            relative_humidity_setpoint: humidity.and_then(|h| h.setpoint),
            steam_percentage_setpoint: steam.steam_percentage_setpoint(),

            timer_mode: nodes.timer.mode.to_string(),
            timer_initial: nodes.timer.initial,
            timer_current: nodes.timer.current,
        }
    }

    /// Combined draw of heating elements, evaporator, and boiler.
    pub fn total_watts(&self) -> i64 {
        self.heating_top_watts
            + self.heating_bottom_watts
            + self.heating_rear_watts
            + self.evaporator_watts
            + self.boiler_watts
    }
}
