use thiserror::Error;

/// Top-level error type for the `ovenlink-api` crate.
///
/// Covers every failure mode of the relay surface: credential refresh,
/// websocket transport, and wire decoding. `ovenlink-core` maps these
/// into domain-level errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// The token endpoint rejected the refresh request.
    #[error("Token refresh failed (HTTP {status}): {message}")]
    TokenRefresh { status: u16, message: String },

    /// The credential has expired and no refresh was possible.
    #[error("Credential expired -- re-authentication required")]
    CredentialExpired,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ── WebSocket ───────────────────────────────────────────────────
    /// WebSocket connection failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// WebSocket closed unexpectedly.
    #[error("WebSocket closed (code {code}): {reason}")]
    WebSocketClosed { code: u16, reason: String },

    /// A command was issued while no transport was open.
    #[error("Relay session is not open")]
    NotConnected,

    // ── Data ────────────────────────────────────────────────────────
    /// A frame could not be decoded, with the raw body for debugging.
    #[error("Decode error: {message}")]
    Decode { message: String, body: String },

    /// An outgoing command could not be serialized.
    #[error("Encode error: {0}")]
    Encode(#[source] serde_json::Error),
}

impl Error {
    /// Returns `true` if re-authentication might resolve this error.
    pub fn is_auth_expired(&self) -> bool {
        matches!(
            self,
            Self::CredentialExpired | Self::TokenRefresh { status: 400..=403, .. }
        )
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::WebSocketConnect(_) | Self::WebSocketClosed { .. } | Self::NotConnected => true,
            _ => false,
        }
    }

    pub(crate) fn decode(err: &serde_json::Error, body: &str) -> Self {
        Self::Decode {
            message: err.to_string(),
            body: body.to_owned(),
        }
    }
}
