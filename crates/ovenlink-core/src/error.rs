// ── Core error types ──
//
// User-facing errors from ovenlink-core. Consumers never see raw
// websocket or JSON failures directly; the `From<ovenlink_api::Error>`
// impl translates transport-layer errors into domain variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Authentication ───────────────────────────────────────────────
    /// No usable credential: missing, expired, or refresh rejected.
    #[error("Sign-in required")]
    NeedsAuthentication,

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    // ── Connection ───────────────────────────────────────────────────
    #[error("Cannot reach relay: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Relay disconnected")]
    Disconnected,

    #[error("Timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Appliances ───────────────────────────────────────────────────
    #[error("Appliance not found: {identifier}")]
    ApplianceNotFound { identifier: String },

    #[error("No appliance is paired with this account")]
    NoAppliance,

    // ── Storage ──────────────────────────────────────────────────────
    #[error("History storage error: {message}")]
    Storage { message: String },

    // ── Wrapped API errors ───────────────────────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        status: Option<u16>,
    },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            Self::NeedsAuthentication | Self::AuthenticationFailed { .. }
        )
    }
}

// ── Conversion from lower layers ─────────────────────────────────────

impl From<ovenlink_api::Error> for CoreError {
    fn from(err: ovenlink_api::Error) -> Self {
        use ovenlink_api::Error as Api;

        match err {
            Api::CredentialExpired => CoreError::NeedsAuthentication,
            Api::TokenRefresh { status, message } => {
                if (400..=403).contains(&status) {
                    CoreError::AuthenticationFailed { message }
                } else {
                    CoreError::Api {
                        message,
                        status: Some(status),
                    }
                }
            }
            Api::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_secs: 0 }
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            Api::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            Api::WebSocketConnect(reason) => CoreError::ConnectionFailed { reason },
            Api::WebSocketClosed { code, reason } => CoreError::ConnectionFailed {
                reason: format!("websocket closed (code {code}): {reason}"),
            },
            Api::NotConnected => CoreError::Disconnected,
            Api::Decode { message, body: _ } => {
                CoreError::Internal(format!("Decode error: {message}"))
            }
            Api::Encode(e) => CoreError::Internal(format!("Encode error: {e}")),
        }
    }
}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        CoreError::Storage {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_refresh_is_auth_failure() {
        let err = CoreError::from(ovenlink_api::Error::TokenRefresh {
            status: 400,
            message: "INVALID_REFRESH_TOKEN".into(),
        });
        assert!(err.is_auth());

        let err = CoreError::from(ovenlink_api::Error::TokenRefresh {
            status: 500,
            message: "boom".into(),
        });
        assert!(matches!(err, CoreError::Api { status: Some(500), .. }));
    }

    #[test]
    fn not_connected_maps_to_disconnected() {
        assert!(matches!(
            CoreError::from(ovenlink_api::Error::NotConnected),
            CoreError::Disconnected
        ));
    }

    #[test]
    fn sqlx_errors_become_storage() {
        let err = CoreError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, CoreError::Storage { .. }));
    }
}
