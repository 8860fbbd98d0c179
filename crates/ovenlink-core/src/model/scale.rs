// ── Display temperature scale ──

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use ovenlink_api::protocol::{Temperature, TemperatureUnit, celsius_to_fahrenheit};

/// Scale used to render temperatures. Celsius is the stored value; the
/// others are derived from it.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum TemperatureScale {
    #[default]
    #[strum(to_string = "celsius", serialize = "c")]
    Celsius,
    #[strum(to_string = "fahrenheit", serialize = "f")]
    Fahrenheit,
    #[strum(to_string = "kelvin", serialize = "k")]
    Kelvin,
}

impl TemperatureScale {
    pub fn convert(self, celsius: f64) -> f64 {
        match self {
            Self::Celsius => celsius,
            Self::Fahrenheit => celsius_to_fahrenheit(celsius),
            Self::Kelvin => celsius + 273.15,
        }
    }

    pub fn display(self, temperature: &Temperature) -> f64 {
        self.convert(temperature.celsius)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Celsius => "°C",
            Self::Fahrenheit => "°F",
            Self::Kelvin => "K",
        }
    }

    pub fn format(self, celsius: f64) -> String {
        format!("{:.1}{}", self.convert(celsius), self.symbol())
    }
}

impl From<TemperatureUnit> for TemperatureScale {
    fn from(unit: TemperatureUnit) -> Self {
        match unit {
            TemperatureUnit::Celsius => Self::Celsius,
            TemperatureUnit::Fahrenheit => Self::Fahrenheit,
        }
    }
}
