// ── Reactive appliance store ──
//
// Copy-on-write projection of the relay stream with push-based change
// notification.

mod projection;

pub use projection::{ApplianceStore, Projection};
