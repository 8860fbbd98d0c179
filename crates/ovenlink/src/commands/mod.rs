//! Command dispatch: bridges CLI args -> registry operations -> output.

pub mod auth;
pub mod config_cmd;
pub mod cook;
pub mod debug_log;
pub mod devices;
pub mod history;
pub mod watch;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use ovenlink_config::{Config, KeyringStore};
use ovenlink_core::{
    CoreError, CredentialProvider, DeviceRegistry, HistoryLocation, TimeSeriesStore,
};

use crate::cli::{Command, GlobalOpts, OutputFormat};
use crate::error::CliError;

/// Settings resolved from the config file with CLI overrides applied.
pub struct Context {
    pub config: Config,
    pub format: OutputFormat,
    pub timeout: Duration,
    pub color: bool,
    pub quiet: bool,
    pub yes: bool,
}

impl Context {
    pub fn load(global: &GlobalOpts) -> Result<Self, CliError> {
        let path = global.config.clone().unwrap_or_else(ovenlink_config::config_path);
        let config = ovenlink_config::load_config_from(&path)?;

        let format = match global.output {
            Some(format) => format,
            None => parse_format(&config.output)?,
        };
        let timeout = Duration::from_secs(global.timeout.unwrap_or(config.timeout));

        Ok(Self {
            config,
            format,
            timeout,
            color: crate::output::should_color(global.color),
            quiet: global.quiet,
            yes: global.yes,
        })
    }

    /// Run `fut`, mapping an elapsed `--timeout` to `CliError::Timeout`.
    pub async fn within<T>(
        &self,
        fut: impl Future<Output = Result<T, CoreError>>,
    ) -> Result<T, CliError> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result.map_err(CliError::from),
            Err(_) => Err(CliError::Timeout {
                seconds: self.timeout.as_secs(),
            }),
        }
    }
}

fn parse_format(raw: &str) -> Result<OutputFormat, CliError> {
    use clap::ValueEnum;

    OutputFormat::from_str(raw, true).map_err(|_| CliError::Validation {
        field: "output".into(),
        reason: format!("unknown output format '{raw}'"),
    })
}

// ── Wiring ──────────────────────────────────────────────────────────

fn ensure_parent(path: &std::path::Path) -> Result<(), CliError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Keyring-backed credential provider using the configured refresh endpoint.
pub fn credential_provider(config: &Config) -> Result<CredentialProvider, CliError> {
    let store = KeyringStore::new()?;
    let refresher = config.token_refresher()?;
    Ok(CredentialProvider::new(Arc::new(store), Arc::new(refresher)))
}

/// Build a registry over the configured relay and history database.
pub async fn open_registry(ctx: &Context) -> Result<DeviceRegistry, CliError> {
    let session_config = ctx.config.to_session_config()?;
    if let HistoryLocation::File(path) = &session_config.history {
        ensure_parent(path)?;
    }
    let credentials = credential_provider(&ctx.config)?;
    Ok(DeviceRegistry::open(&session_config, credentials).await?)
}

/// Open only the history database. No relay or keyring access.
pub async fn open_history(ctx: &Context) -> Result<TimeSeriesStore, CliError> {
    let path = ctx.config.history_path();
    ensure_parent(&path)?;
    Ok(TimeSeriesStore::open(&HistoryLocation::File(path), ctx.config.sql_trace).await?)
}

// ── Dispatch ────────────────────────────────────────────────────────

/// Dispatch a command to its handler.
pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    let ctx = Context::load(global)?;

    match cmd {
        Command::Login(args) => auth::login(args, &ctx).await,
        Command::Logout => auth::logout(&ctx).await,
        Command::Devices => devices::handle(&ctx).await,
        Command::Watch(args) => watch::handle(&args, &ctx).await,
        Command::Start(args) => cook::start(args, &ctx).await,
        Command::Stop(args) => cook::stop(args, &ctx).await,
        Command::Lamp(args) => cook::lamp(args, &ctx).await,
        Command::Unit(args) => cook::unit(args, &ctx).await,
        Command::Pair(args) => cook::pair(args, &ctx).await,
        Command::History(args) => history::handle(&args, &ctx).await,
        Command::HistoryReset => history::reset(&ctx).await,
        Command::DebugLog => debug_log::handle(&ctx).await,
        // Handled before dispatch
        Command::Config(_) | Command::Completions(_) => Ok(()),
    }
}
