// ── Temperature values ──
//
// The relay always transmits temperatures as a `{celsius, fahrenheit}`
// pair. Both halves are preserved for re-encoding, but Celsius is the
// canonical value: Fahrenheit is re-derived on demand.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// A temperature as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Temperature {
    pub celsius: f64,
    /// Fahrenheit as reported by the appliance. Not authoritative.
    pub fahrenheit: f64,
}

impl Temperature {
    /// Build a wire temperature from the canonical Celsius value.
    pub fn from_celsius(celsius: f64) -> Self {
        Self {
            celsius,
            fahrenheit: celsius_to_fahrenheit(celsius),
        }
    }

    /// Fahrenheit derived from the Celsius reading.
    pub fn derived_fahrenheit(&self) -> f64 {
        celsius_to_fahrenheit(self.celsius)
    }
}

pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}

/// Unit the appliance uses on its own display.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
pub enum TemperatureUnit {
    #[serde(rename = "C")]
    #[strum(serialize = "C", serialize = "c")]
    Celsius,
    #[serde(rename = "F")]
    #[strum(serialize = "F", serialize = "f")]
    Fahrenheit,
}
