//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use ovenlink_config::ConfigError;
use ovenlink_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the relay")]
    #[diagnostic(
        code(ovenlink::connection_failed),
        help("Check your network connection and `relay_url`.\nReason: {reason}")
    )]
    ConnectionFailed { reason: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Sign-in required")]
    #[diagnostic(
        code(ovenlink::auth_required),
        help(
            "Your credential is missing, expired, or was rejected.\n\
             Run: ovenlink login"
        )
    )]
    AuthRequired,

    #[error("Authentication failed: {message}")]
    #[diagnostic(code(ovenlink::auth_failed), help("Run: ovenlink login"))]
    AuthFailed { message: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(code(ovenlink::not_found), help("Run: ovenlink {list_command}"))]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("No appliance is paired with this account")]
    #[diagnostic(
        code(ovenlink::no_appliance),
        help("Pair one with: ovenlink pair <CODE>")
    )]
    NoAppliance,

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(ovenlink::validation))]
    Validation { field: String, reason: String },

    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(ovenlink::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    #[diagnostic(code(ovenlink::config), help("Inspect with: ovenlink config show"))]
    Config { message: String },

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("Timed out after {seconds}s")]
    #[diagnostic(
        code(ovenlink::timeout),
        help("Increase the wait with --timeout or check that the oven is online.")
    )]
    Timeout { seconds: u64 },

    // ── Storage ──────────────────────────────────────────────────────
    #[error("History storage error: {message}")]
    #[diagnostic(code(ovenlink::storage))]
    Storage { message: String },

    #[error("{0}")]
    #[diagnostic(code(ovenlink::internal))]
    Internal(String),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthRequired | Self::AuthFailed { .. } => exit_code::AUTH,
            Self::NotFound { .. } | Self::NoAppliance => exit_code::NOT_FOUND,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── Lower-layer mapping ──────────────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NeedsAuthentication => CliError::AuthRequired,
            CoreError::AuthenticationFailed { message } => CliError::AuthFailed { message },
            CoreError::ConnectionFailed { reason } => CliError::ConnectionFailed { reason },
            CoreError::Disconnected => CliError::ConnectionFailed {
                reason: "relay connection was lost".into(),
            },
            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },
            CoreError::ApplianceNotFound { identifier } => CliError::NotFound {
                resource_type: "appliance".into(),
                identifier,
                list_command: "devices".into(),
            },
            CoreError::NoAppliance => CliError::NoAppliance,
            CoreError::Storage { message } => CliError::Storage { message },
            CoreError::Config { message } => CliError::Config { message },
            CoreError::Api { message, status } => CliError::Internal(match status {
                Some(code) => format!("API error ({code}): {message}"),
                None => format!("API error: {message}"),
            }),
            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::Io(e) => CliError::Io(e),
            other => CliError::Config {
                message: other.to_string(),
            },
        }
    }
}
