//! Live telemetry stream.

use std::time::Duration;

use owo_colors::OwoColorize;
use tokio::sync::broadcast::error::RecvError;

use ovenlink_core::{Connectivity, DeviceRegistry, HistorySnapshot, TemperatureScale, TelemetryUpdate};

use crate::cli::{OutputFormat, WatchArgs};
use crate::commands::{Context, open_registry};
use crate::error::CliError;
use crate::output;

fn format_line(snapshot: &HistorySnapshot, name: &str, scale: TemperatureScale, color: bool) -> String {
    let mut parts = vec![format!("dry {}", scale.format(snapshot.dry))];
    if let Some(target) = snapshot.dry_setpoint {
        parts.push(format!("-> {}", scale.format(target)));
    }
    parts.push(format!("wet {}", scale.format(snapshot.wet)));
    if let Some(target) = snapshot.wet_setpoint {
        parts.push(format!("-> {}", scale.format(target)));
    }
    if let Some(probe) = snapshot.probe {
        parts.push(format!("probe {}", scale.format(probe)));
    }
    if let Some(rh) = snapshot.relative_humidity {
        parts.push(format!("rh {rh:.0}%"));
    }
    if snapshot.timer_initial > 0 {
        let remaining = u64::try_from(snapshot.timer_initial - snapshot.timer_current).unwrap_or(0);
        parts.push(format!(
            "timer {} left",
            humantime::format_duration(Duration::from_secs(remaining))
        ));
    }
    parts.push(format!("{}W", snapshot.total_watts()));

    let time = snapshot.updated_timestamp.format("%H:%M:%S").to_string();
    let body = parts.join("  ");
    let cooking = snapshot.cook_id.is_some();
    if color {
        let name = if cooking {
            name.green().bold().to_string()
        } else {
            name.bold().to_string()
        };
        format!("{}  {name}  {body}", time.dimmed())
    } else {
        format!("{time}  {name}  {body}")
    }
}

fn matches_filter(registry: &DeviceRegistry, update: &TelemetryUpdate, filter: Option<&str>) -> bool {
    let Some(wanted) = filter else {
        return true;
    };
    update.appliance_id() == wanted
        || registry
            .appliance_by_name(wanted)
            .is_some_and(|a| a.id == update.appliance_id())
}

fn render(registry: &DeviceRegistry, update: &TelemetryUpdate, args: &WatchArgs, ctx: &Context) -> String {
    let snapshot = update.snapshot.as_deref().cloned().unwrap_or_else(|| {
        HistorySnapshot::from_state(update.appliance_id(), &update.payload.state)
    });
    match ctx.format {
        OutputFormat::Table => {
            let name = registry
                .projection()
                .appliances
                .get(update.appliance_id())
                .map_or_else(|| update.appliance_id().to_owned(), |a| a.display_name.clone());
            format_line(&snapshot, &name, args.scale, ctx.color)
        }
        // One document per update so the stream stays line-parseable.
        OutputFormat::Json | OutputFormat::JsonCompact => output::render_json(&snapshot, true),
        OutputFormat::Yaml => output::render_single(OutputFormat::Yaml, &snapshot, |_| String::new()),
    }
}

fn connectivity_error(state: Connectivity) -> Option<CliError> {
    match state {
        Connectivity::Connected => None,
        Connectivity::NeedsAuthentication => Some(CliError::AuthRequired),
        Connectivity::Offline { reason } => Some(CliError::ConnectionFailed { reason }),
    }
}

pub async fn handle(args: &WatchArgs, ctx: &Context) -> Result<(), CliError> {
    let registry = open_registry(ctx).await?;
    let mut telemetry = registry.telemetry();

    if let Some(err) = connectivity_error(registry.ensure_connected().await) {
        registry.shutdown().await;
        return Err(err);
    }

    let result = stream(&registry, &mut telemetry, args, ctx).await;
    registry.shutdown().await;
    result
}

async fn stream(
    registry: &DeviceRegistry,
    telemetry: &mut tokio::sync::broadcast::Receiver<TelemetryUpdate>,
    args: &WatchArgs,
    ctx: &Context,
) -> Result<(), CliError> {
    let mut seen = 0usize;
    let mut reconnect = tokio::time::interval(Duration::from_millis(ctx.config.poll_interval_ms));
    reconnect.tick().await;

    loop {
        if args.count.is_some_and(|n| seen >= n) {
            return Ok(());
        }

        tokio::select! {
            biased;
            _ = tokio::signal::ctrl_c() => return Ok(()),
            received = telemetry.recv() => match received {
                Ok(update) => {
                    if !matches_filter(registry, &update, args.device.as_deref()) {
                        continue;
                    }
                    seen += 1;
                    output::print_output(&render(registry, &update, args, ctx), ctx.quiet);
                }
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "display fell behind telemetry");
                }
                Err(RecvError::Closed) => return Ok(()),
            },
            _ = reconnect.tick() => {
                if !registry.session().is_open() {
                    match registry.ensure_connected().await {
                        Connectivity::NeedsAuthentication => return Err(CliError::AuthRequired),
                        Connectivity::Offline { reason } => {
                            tracing::info!(reason = %reason, "relay offline, retrying");
                        }
                        Connectivity::Connected => tracing::info!("reconnected"),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn snapshot() -> HistorySnapshot {
        HistorySnapshot {
            id: None,
            appliance_id: "oven-1".into(),
            cook_id: None,
            updated_timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 5).unwrap(),
            dry: 180.0,
            dry_top: 181.0,
            dry_bottom: 179.0,
            wet: 60.0,
            wet_dosed: false,
            temperature_mode: "dry".into(),
            dry_setpoint: Some(200.0),
            wet_setpoint: None,
            lamp_on: true,
            lamp_preference: true,
            vent_open: false,
            door_closed: true,
            water_tank_empty: false,
            fan_speed: 100,
            heating_top_on: true,
            heating_bottom_on: false,
            heating_rear_on: true,
            heating_top_watts: 500,
            heating_bottom_watts: 0,
            heating_rear_watts: 1000,
            probe_connected: false,
            probe: None,
            probe_setpoint: None,
            steam_mode: "idle".into(),
            evaporator: 30.0,
            boiler: 30.0,
            boiler_dosed: false,
            evaporator_watts: 0,
            boiler_watts: 0,
            relative_humidity: None,
            relative_humidity_setpoint: None,
            steam_percentage_setpoint: None,
            timer_mode: "running".into(),
            timer_initial: 600,
            timer_current: 540,
        }
    }

    #[test]
    fn plain_line_shows_readings() {
        let line = format_line(&snapshot(), "Kitchen", TemperatureScale::Celsius, false);
        assert_eq!(
            line,
            "12:30:05  Kitchen  dry 180.0°C  -> 200.0°C  wet 60.0°C  timer 1m left  1500W"
        );
    }

    #[test]
    fn line_uses_requested_scale() {
        let line = format_line(&snapshot(), "Kitchen", TemperatureScale::Fahrenheit, false);
        assert!(line.contains("dry 356.0°F"));
    }
}
