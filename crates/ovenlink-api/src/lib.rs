// ovenlink-api: relay protocol, realtime session, and token refresh for connected ovens

pub mod auth;
pub mod debug_log;
pub mod error;
pub mod protocol;
pub mod session;

pub use auth::{Credential, SecureTokenClient, TokenRefresher};
pub use debug_log::{DebugEntry, DebugEventKind, DebugLog};
pub use error::Error;
pub use session::{RealtimeSession, RelayConfig, SessionEvent, SessionState};
