//! Domain layer between `ovenlink-api` and its consumers.
//!
//! - **[`DeviceRegistry`]**: Owns the relay session lifecycle
//!   ([`ensure_connected`](DeviceRegistry::ensure_connected)), coalesces the
//!   session's event stream into an [`ApplianceStore`] projection, persists
//!   one [`HistorySnapshot`] per telemetry update, and issues commands to a
//!   resolved target appliance.
//!
//! - **[`ApplianceStore`]**: Copy-on-write projection (known appliances,
//!   active appliance, latest payload per appliance) published through a
//!   `tokio::sync::watch` channel and consumed via [`ProjectionStream`].
//!
//! - **[`TimeSeriesStore`]**: Append-only SQLite history with windowed
//!   and live ([`HistoryWatch`]) queries, plus a binary-search
//!   [`nearest`] lookup for scrubbing.
//!
//! - **[`CredentialProvider`]**: Hands out a valid bearer credential,
//!   refreshing and re-persisting it through a [`CredentialStore`].

pub mod config;
pub mod credential;
pub mod error;
pub mod history;
pub mod model;
pub mod presets;
pub mod registry;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{HistoryLocation, SessionConfig};
pub use credential::{CredentialProvider, CredentialStore, MemoryCredentialStore};
pub use error::CoreError;
pub use history::{HistoryRange, HistoryWatch, TimeSeriesStore, nearest, nearest_index};
pub use model::{Appliance, HistorySnapshot, TemperatureScale};
pub use presets::Preset;
pub use registry::{Connectivity, DeviceRegistry, TelemetryUpdate};
pub use store::{ApplianceStore, Projection};
pub use stream::ProjectionStream;
