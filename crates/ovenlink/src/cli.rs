//! Clap derive structures for the `ovenlink` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use ovenlink_core::{HistoryRange, Preset, TemperatureScale};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// ovenlink -- drive and monitor a connected oven from the terminal
#[derive(Debug, Parser)]
#[command(
    name = "ovenlink",
    version,
    about = "Monitor and control a connected oven from the command line",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config dir)
    #[arg(long, env = "OVENLINK_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format (defaults to the config file's `output`)
    #[arg(long, short = 'o', global = true)]
    pub output: Option<OutputFormat>,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Seconds to wait for the relay and appliances
    #[arg(long, global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store a credential obtained from the browser sign-in
    Login(LoginArgs),

    /// Forget the stored credential
    Logout,

    /// List paired appliances
    #[command(alias = "dev", alias = "d")]
    Devices,

    /// Stream live telemetry, recording history as it arrives
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Start a cook preset
    Start(StartArgs),

    /// Stop the running cook
    Stop(TargetArgs),

    /// Set the oven lamp preference
    Lamp(LampArgs),

    /// Set the oven's display temperature unit
    Unit(UnitArgs),

    /// Claim an appliance with the payload from its pairing code
    Pair(PairArgs),

    /// Query recorded telemetry history
    #[command(alias = "h")]
    History(HistoryArgs),

    /// Delete all recorded history
    HistoryReset,

    /// Connect briefly and print the session's debug log
    DebugLog,

    /// Inspect or initialize configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Per-command arguments ────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct LoginArgs {
    /// Id token (prompted for when omitted)
    #[arg(long, env = "OVENLINK_ID_TOKEN", hide_env_values = true)]
    pub id_token: Option<String>,

    /// Refresh token (prompted for when omitted)
    #[arg(long, env = "OVENLINK_REFRESH_TOKEN", hide_env_values = true)]
    pub refresh_token: Option<String>,

    /// Id token lifetime in seconds
    #[arg(long, default_value = "3600")]
    pub expires_in: i64,
}

#[derive(Debug, Args)]
pub struct TargetArgs {
    /// Appliance id or name (defaults to the first paired appliance)
    #[arg(long, short = 'd')]
    pub device: Option<String>,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Stop after this many telemetry updates
    #[arg(long, short = 'n')]
    pub count: Option<usize>,

    /// Only show updates from this appliance id or name
    #[arg(long, short = 'd')]
    pub device: Option<String>,

    /// Temperature scale for display
    #[arg(long, default_value = "celsius")]
    pub scale: TemperatureScale,
}

#[derive(Debug, Args)]
pub struct StartArgs {
    /// Preset to start
    pub preset: Preset,

    #[command(flatten)]
    pub target: TargetArgs,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Switch {
    On,
    Off,
}

#[derive(Debug, Args)]
pub struct LampArgs {
    pub state: Switch,

    #[command(flatten)]
    pub target: TargetArgs,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum UnitChoice {
    C,
    F,
}

#[derive(Debug, Args)]
pub struct UnitArgs {
    pub unit: UnitChoice,

    #[command(flatten)]
    pub target: TargetArgs,
}

#[derive(Debug, Args)]
pub struct PairArgs {
    /// Opaque payload read from the appliance's pairing code
    pub code: String,
}

#[derive(Debug, Args)]
pub struct HistoryArgs {
    /// Appliance id
    pub device: String,

    /// Look-back window: 5m, 15m, 30m, 1h, 2h, 4h, 8h, 12h, 24h
    #[arg(long, default_value = "1h")]
    pub since: HistoryRange,

    /// Print only the snapshot nearest this instant (RFC 3339)
    #[arg(long)]
    pub at: Option<chrono::DateTime<chrono::Utc>>,

    /// Only snapshots from this cook id
    #[arg(long)]
    pub cook: Option<String>,

    /// Temperature scale for display
    #[arg(long, default_value = "celsius")]
    pub scale: TemperatureScale,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the resolved configuration
    Show,

    /// Print the config file path
    Path,

    /// Write a config file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
