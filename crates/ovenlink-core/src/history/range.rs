// ── History query windows ──

use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Preset look-back windows for history queries.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
pub enum HistoryRange {
    #[strum(serialize = "5m")]
    #[serde(rename = "5m")]
    FiveMinutes,
    #[strum(serialize = "15m")]
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[strum(serialize = "30m")]
    #[serde(rename = "30m")]
    ThirtyMinutes,
    #[default]
    #[strum(serialize = "1h")]
    #[serde(rename = "1h")]
    OneHour,
    #[strum(serialize = "2h")]
    #[serde(rename = "2h")]
    TwoHours,
    #[strum(serialize = "4h")]
    #[serde(rename = "4h")]
    FourHours,
    #[strum(serialize = "8h")]
    #[serde(rename = "8h")]
    EightHours,
    #[strum(serialize = "12h")]
    #[serde(rename = "12h")]
    TwelveHours,
    #[strum(serialize = "24h")]
    #[serde(rename = "24h")]
    TwentyFourHours,
}

impl HistoryRange {
    pub fn duration(self) -> Duration {
        let minutes = match self {
            Self::FiveMinutes => 5,
            Self::FifteenMinutes => 15,
            Self::ThirtyMinutes => 30,
            Self::OneHour => 60,
            Self::TwoHours => 120,
            Self::FourHours => 240,
            Self::EightHours => 480,
            Self::TwelveHours => 720,
            Self::TwentyFourHours => 1440,
        };
        Duration::from_secs(minutes * 60)
    }
}

impl From<HistoryRange> for Duration {
    fn from(range: HistoryRange) -> Self {
        range.duration()
    }
}
