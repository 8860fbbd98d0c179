//! Sign-in and sign-out.

use secrecy::SecretString;

use ovenlink_api::Credential;

use crate::cli::LoginArgs;
use crate::commands::{Context, open_registry};
use crate::error::CliError;
use crate::output;

fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

fn token(value: Option<String>, prompt: &str, field: &str) -> Result<SecretString, CliError> {
    let raw = match value {
        Some(v) => v,
        None => rpassword::prompt_password(prompt).map_err(prompt_err)?,
    };
    let raw = raw.trim().to_owned();
    if raw.is_empty() {
        return Err(CliError::Validation {
            field: field.into(),
            reason: "cannot be empty".into(),
        });
    }
    Ok(SecretString::from(raw))
}

pub async fn login(args: LoginArgs, ctx: &Context) -> Result<(), CliError> {
    if args.expires_in <= 0 {
        return Err(CliError::Validation {
            field: "expires_in".into(),
            reason: "must be a positive number of seconds".into(),
        });
    }
    let id_token = token(args.id_token, "Id token: ", "id_token")?;
    let refresh_token = token(args.refresh_token, "Refresh token: ", "refresh_token")?;
    let credential = Credential::from_token_response(id_token, refresh_token, args.expires_in);

    let registry = open_registry(ctx).await?;
    registry.sign_in(&credential).await?;
    registry.shutdown().await;

    output::print_output(
        &format!("Signed in (id token expires {})", credential.expires_at.to_rfc3339()),
        ctx.quiet,
    );
    Ok(())
}

pub async fn logout(ctx: &Context) -> Result<(), CliError> {
    let registry = open_registry(ctx).await?;
    registry.sign_out().await?;
    registry.shutdown().await;
    output::print_output("Signed out", ctx.quiet);
    Ok(())
}
