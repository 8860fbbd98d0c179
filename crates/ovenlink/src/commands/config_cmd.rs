//! Config subcommand handlers.

use std::path::PathBuf;

use ovenlink_config::Config;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

fn resolved_path(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(ovenlink_config::config_path)
}

fn redacted(mut cfg: Config) -> Config {
    if cfg.token_api_key.is_some() {
        cfg.token_api_key = Some("********".into());
    }
    cfg
}

fn to_toml(cfg: &Config) -> String {
    toml::to_string_pretty(cfg).unwrap_or_else(|e| format!("error: serialization failed: {e}"))
}

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let path = resolved_path(global);

    match args.command {
        ConfigCommand::Path => {
            output::print_output(&path.display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = redacted(ovenlink_config::load_config_from(&path)?);
            let format = global.output.unwrap_or(OutputFormat::Table);
            let out = output::render_single(format, &cfg, to_toml);
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Init { force } => {
            if path.exists() && !force {
                return Err(CliError::Validation {
                    field: "config".into(),
                    reason: format!("{} already exists (use --force to overwrite)", path.display()),
                });
            }
            ovenlink_config::save_config_to(&Config::default(), &path)?;
            tracing::info!(path = %path.display(), "config written");
            output::print_output(
                &format!("Configuration written to {}", path.display()),
                global.quiet,
            );
            Ok(())
        }
    }
}
