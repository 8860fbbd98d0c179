//! Session debug log dump.

use std::time::Duration;

use tabled::Tabled;

use ovenlink_api::DebugEntry;
use ovenlink_core::Connectivity;

use crate::commands::{Context, open_registry};
use crate::error::CliError;
use crate::output;

/// How long to listen before dumping the log.
const LISTEN: Duration = Duration::from_secs(2);

#[derive(Tabled)]
struct EntryRow {
    #[tabled(rename = "Time")]
    at: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Message")]
    message: String,
}

fn row(e: &DebugEntry) -> EntryRow {
    EntryRow {
        at: e.at.format("%H:%M:%S%.3f").to_string(),
        kind: e.kind.to_string(),
        message: e.message.clone(),
    }
}

pub async fn handle(ctx: &Context) -> Result<(), CliError> {
    let registry = open_registry(ctx).await?;

    match registry.ensure_connected().await {
        Connectivity::NeedsAuthentication => {
            registry.shutdown().await;
            return Err(CliError::AuthRequired);
        }
        // Connection failures are recorded in the log itself.
        Connectivity::Offline { .. } | Connectivity::Connected => {}
    }
    if registry.session().is_open() {
        tokio::time::sleep(LISTEN.min(ctx.timeout)).await;
    }
    registry.shutdown().await;

    let entries = registry.debug_log().entries();
    let out = output::render_list(ctx.format, &entries, row);
    output::print_output(&out, ctx.quiet);
    Ok(())
}
