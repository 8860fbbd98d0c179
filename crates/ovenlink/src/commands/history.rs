//! Recorded history: windowed queries, cook lookup, scrubbing, reset.

use std::io::IsTerminal;

use chrono::Utc;
use dialoguer::Confirm;
use tabled::Tabled;

use ovenlink_core::{HistorySnapshot, TemperatureScale, nearest};

use crate::cli::HistoryArgs;
use crate::commands::{Context, open_history};
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct HistoryRow {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Dry")]
    dry: String,
    #[tabled(rename = "Dry Target")]
    dry_target: String,
    #[tabled(rename = "Wet")]
    wet: String,
    #[tabled(rename = "Probe")]
    probe: String,
    #[tabled(rename = "RH")]
    humidity: String,
    #[tabled(rename = "Watts")]
    watts: i64,
    #[tabled(rename = "Cook")]
    cook: String,
}

fn optional(value: Option<f64>, scale: TemperatureScale) -> String {
    value.map_or_else(|| "-".into(), |v| scale.format(v))
}

fn row(s: &HistorySnapshot, scale: TemperatureScale) -> HistoryRow {
    HistoryRow {
        time: s.updated_timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
        dry: scale.format(s.dry),
        dry_target: optional(s.dry_setpoint, scale),
        wet: scale.format(s.wet),
        probe: optional(s.probe, scale),
        humidity: s
            .relative_humidity
            .map_or_else(|| "-".into(), |v| format!("{v:.0}%")),
        watts: s.total_watts(),
        cook: s.cook_id.clone().unwrap_or_else(|| "-".into()),
    }
}

fn detail(s: &HistorySnapshot, scale: TemperatureScale) -> String {
    [
        format!("Appliance:   {}", s.appliance_id),
        format!("Time:        {}", s.updated_timestamp.to_rfc3339()),
        format!("Cook:        {}", s.cook_id.as_deref().unwrap_or("-")),
        format!("Mode:        {}", s.temperature_mode),
        format!("Dry:         {} (target {})", scale.format(s.dry), optional(s.dry_setpoint, scale)),
        format!("Wet:         {} (target {})", scale.format(s.wet), optional(s.wet_setpoint, scale)),
        format!("Probe:       {} (target {})", optional(s.probe, scale), optional(s.probe_setpoint, scale)),
        format!("Steam:       {}", s.steam_mode),
        format!(
            "Humidity:    {}",
            s.relative_humidity
                .map_or_else(|| "-".into(), |v| format!("{v:.0}%"))
        ),
        format!("Door:        {}", if s.door_closed { "closed" } else { "open" }),
        format!("Lamp:        {}", if s.lamp_on { "on" } else { "off" }),
        format!("Fan:         {}", s.fan_speed),
        format!("Power:       {}W", s.total_watts()),
        format!("Timer:       {} {}/{}s", s.timer_mode, s.timer_current, s.timer_initial),
    ]
    .join("\n")
}

// ── Handlers ────────────────────────────────────────────────────────

pub async fn handle(args: &HistoryArgs, ctx: &Context) -> Result<(), CliError> {
    let history = open_history(ctx).await?;
    let rows = match &args.cook {
        Some(cook_id) => history.snapshots_for_cook(&args.device, cook_id).await,
        None => history.query(&args.device, args.since.duration()).await,
    };
    history.close().await;
    let rows = rows?;
    tracing::debug!(appliance_id = %args.device, rows = rows.len(), "history loaded");

    let scale = args.scale;
    let out = if let Some(at) = args.at {
        let Some(hit) = nearest(&rows, at) else {
            return Err(CliError::NotFound {
                resource_type: "history".into(),
                identifier: format!("{} @ {}", args.device, at.to_rfc3339()),
                list_command: "watch".into(),
            });
        };
        output::render_single(ctx.format, hit, |s| detail(s, scale))
    } else {
        output::render_list(ctx.format, &rows, |s| row(s, scale))
    };
    output::print_output(&out, ctx.quiet);
    Ok(())
}

pub async fn reset(ctx: &Context) -> Result<(), CliError> {
    if !ctx.yes {
        if !std::io::stdin().is_terminal() {
            return Err(CliError::NonInteractiveRequiresYes {
                action: "history-reset".into(),
            });
        }
        let confirmed = Confirm::new()
            .with_prompt("Delete all recorded history?")
            .default(false)
            .interact()
            .map_err(|e| CliError::Validation {
                field: "interactive".into(),
                reason: format!("prompt failed: {e}"),
            })?;
        if !confirmed {
            return Ok(());
        }
    }

    let history = open_history(ctx).await?;
    let deleted = history.reset().await;
    history.close().await;
    let deleted = deleted?;
    tracing::info!(deleted, at = %Utc::now(), "history reset");
    output::print_output(&format!("Deleted {deleted} snapshots"), ctx.quiet);
    Ok(())
}
