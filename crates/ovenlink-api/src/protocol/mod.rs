//! Typed model of the relay's JSON protocol.
//!
//! Inbound events are decoded with [`decode`]; outbound commands are the
//! closed [`OutboundCommand`] enum.

pub mod command;
pub mod inbound;
pub mod state;
pub mod temperature;

pub use command::{
    ElementSwitch, EncodedCommand, OutboundCommand, StageFan, StageHeatingElements, StageRatio,
    StageSetpoint, StageSteamGenerators, StageTemperatureBulbs, StartCook, StartStage,
};
pub use inbound::{Inbound, StatePayload, WireDevice, decode};
pub use state::{
    ApplianceState, Boiler, Cook, CookStage, CookerMode, CookerState, Door, DryBulb, EdgeBulb,
    Evaporator, Fan, HeatingElement, HeatingElements, Lamp, LampPreference, Nodes,
    RelativeHumidity, SteamGeneratorMode, SteamGenerators, SteamPercentage, SystemInfo,
    TemperatureBulbs, TemperatureBulbsMode, TemperatureProbe, Timer, TimerMode,
    UserInterfaceCircuit, Vent, WaterTank, WetBulb,
};
pub use temperature::{Temperature, TemperatureUnit, celsius_to_fahrenheit};
