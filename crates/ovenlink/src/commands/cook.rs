//! Appliance commands: start, stop, lamp, unit, pair.

use std::time::Duration;

use serde::Serialize;
use uuid::Uuid;

use ovenlink_api::protocol::TemperatureUnit;
use ovenlink_core::{CoreError, DeviceRegistry};

use crate::cli::{LampArgs, PairArgs, StartArgs, Switch, TargetArgs, UnitArgs, UnitChoice};
use crate::commands::{Context, open_registry};
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct Sent {
    command: &'static str,
    request_id: Uuid,
}

/// How long to keep the session open after sending so the frame is flushed
/// and an early ack can be observed.
const SETTLE: Duration = Duration::from_millis(250);

async fn run<F, Fut>(ctx: &Context, command: &'static str, send: F) -> Result<(), CliError>
where
    F: FnOnce(DeviceRegistry) -> Fut,
    Fut: Future<Output = Result<Uuid, CoreError>>,
{
    let registry = open_registry(ctx).await?;
    let result = ctx.within(send(registry.clone())).await;
    if result.is_ok() {
        tokio::time::sleep(SETTLE).await;
    }
    let acked = result
        .as_ref()
        .is_ok_and(|request_id| registry.was_processed(request_id));
    registry.shutdown().await;

    let request_id = result?;
    tracing::debug!(command, %request_id, acked, "command finished");
    let sent = Sent {
        command,
        request_id,
    };
    let out = output::render_single(ctx.format, &sent, |s| {
        format!("Sent {} (request {})", s.command, s.request_id)
    });
    output::print_output(&out, ctx.quiet);
    Ok(())
}

pub async fn start(args: StartArgs, ctx: &Context) -> Result<(), CliError> {
    let preset = args.preset;
    let device = args.target.device;
    run(ctx, "start", move |r| async move {
        r.start_preset(preset, device.as_deref()).await
    })
    .await
}

pub async fn stop(args: TargetArgs, ctx: &Context) -> Result<(), CliError> {
    let device = args.device;
    run(ctx, "stop", move |r| async move { r.stop(device.as_deref()).await }).await
}

pub async fn lamp(args: LampArgs, ctx: &Context) -> Result<(), CliError> {
    let on = matches!(args.state, Switch::On);
    let device = args.target.device;
    run(ctx, "lamp", move |r| async move {
        r.set_lamp_preference(on, device.as_deref()).await
    })
    .await
}

pub async fn unit(args: UnitArgs, ctx: &Context) -> Result<(), CliError> {
    let unit = match args.unit {
        UnitChoice::C => TemperatureUnit::Celsius,
        UnitChoice::F => TemperatureUnit::Fahrenheit,
    };
    let device = args.target.device;
    run(ctx, "unit", move |r| async move {
        r.set_temperature_unit(unit, device.as_deref()).await
    })
    .await
}

pub async fn pair(args: PairArgs, ctx: &Context) -> Result<(), CliError> {
    let code = args.code.trim().to_owned();
    if code.is_empty() {
        return Err(CliError::Validation {
            field: "code".into(),
            reason: "pairing payload cannot be empty".into(),
        });
    }
    run(ctx, "pair", move |r| async move { r.pair_with_code(code).await }).await
}
