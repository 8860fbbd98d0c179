// ── Runtime session configuration ──
//
// Describes *how* to reach the relay and where history lives. Never
// touches disk itself: the CLI builds a `SessionConfig` from its config
// file and hands it in.

use std::time::Duration;

use ovenlink_api::RelayConfig;

/// Where telemetry history is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryLocation {
    /// Process-local database, lost on exit.
    InMemory,
    File(std::path::PathBuf),
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub relay: RelayConfig,
    /// Interval of the cooperative "wait for an appliance" poll.
    pub poll_interval: Duration,
    pub history: HistoryLocation,
    /// Emit every SQL statement through `tracing`.
    pub sql_trace: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            relay: RelayConfig::default(),
            poll_interval: Duration::from_secs(1),
            history: HistoryLocation::InMemory,
            sql_trace: false,
        }
    }
}
