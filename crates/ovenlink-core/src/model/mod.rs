// ── Domain model ──
//
// Types consumers (the CLI, tests) depend on. Wire types stay in
// ovenlink-api; these are the shapes the registry and history expose.

pub mod appliance;
pub mod scale;
pub mod snapshot;

pub use appliance::Appliance;
pub use scale::TemperatureScale;
pub use snapshot::HistorySnapshot;
