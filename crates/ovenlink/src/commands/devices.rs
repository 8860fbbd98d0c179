//! Appliance listing.

use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tabled::Tabled;

use ovenlink_core::{Appliance, DeviceRegistry};

use crate::commands::{Context, open_registry};
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct ApplianceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Paired")]
    paired: String,
    #[tabled(rename = "Mode")]
    mode: String,
    #[tabled(rename = "Active")]
    active: String,
}

#[derive(Serialize)]
struct ApplianceView {
    #[serde(flatten)]
    appliance: Appliance,
    mode: Option<String>,
    active: bool,
}

fn view(registry: &DeviceRegistry, appliance: &Arc<Appliance>, active_id: Option<&str>) -> ApplianceView {
    ApplianceView {
        appliance: appliance.as_ref().clone(),
        mode: registry
            .latest(&appliance.id)
            .map(|p| p.state.mode().to_string()),
        active: active_id == Some(appliance.id.as_str()),
    }
}

fn row(v: &ApplianceView) -> ApplianceRow {
    ApplianceRow {
        id: v.appliance.id.clone(),
        name: v.appliance.display_name.clone(),
        kind: v.appliance.kind.clone(),
        paired: v.appliance.paired_at.format("%Y-%m-%d").to_string(),
        mode: v.mode.clone().unwrap_or_else(|| "-".into()),
        active: if v.active { "*".into() } else { String::new() },
    }
}

pub(crate) fn spinner(message: &'static str, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new_spinner().with_message(message);
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        bar.set_style(style);
    }
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

pub async fn handle(ctx: &Context) -> Result<(), CliError> {
    let registry = open_registry(ctx).await?;

    let bar = spinner("Waiting for appliances...", ctx.quiet);
    let waited = ctx
        .within(registry.wait_for_appliance(Duration::from_millis(
            ctx.config.poll_interval_ms,
        )))
        .await;
    bar.finish_and_clear();
    let outcome = waited.map(|_| {
        let active = registry.active_appliance().map(|a| a.id.clone());
        let mut views: Vec<ApplianceView> = registry
            .appliances()
            .iter()
            .map(|a| view(&registry, a, active.as_deref()))
            .collect();
        views.sort_by(|a, b| a.appliance.display_name.cmp(&b.appliance.display_name));
        views
    });
    registry.shutdown().await;

    let views = outcome?;
    let out = output::render_list(ctx.format, &views, row);
    output::print_output(&out, ctx.quiet);
    Ok(())
}
