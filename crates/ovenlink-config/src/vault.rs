// ── Keyring credential vault ──
//
// The signed-in credential lives in the OS keyring as one JSON blob.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use ovenlink_api::Credential;
use ovenlink_core::{CoreError, CredentialStore};

use crate::ConfigError;

pub const KEYRING_SERVICE: &str = "ovenlink";
pub const KEYRING_ACCOUNT: &str = "tokens";

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredCredential {
    id_token: String,
    refresh_token: String,
    expires_at: DateTime<Utc>,
}

impl From<&Credential> for StoredCredential {
    fn from(c: &Credential) -> Self {
        Self {
            id_token: c.id_token.expose_secret().to_owned(),
            refresh_token: c.refresh_token.expose_secret().to_owned(),
            expires_at: c.expires_at,
        }
    }
}

impl From<StoredCredential> for Credential {
    fn from(s: StoredCredential) -> Self {
        Self {
            id_token: SecretString::from(s.id_token),
            refresh_token: SecretString::from(s.refresh_token),
            expires_at: s.expires_at,
        }
    }
}

/// `CredentialStore` backed by the platform keyring.
pub struct KeyringStore {
    entry: keyring::Entry,
}

impl KeyringStore {
    pub fn new() -> Result<Self, ConfigError> {
        Self::with_account(KEYRING_SERVICE, KEYRING_ACCOUNT)
    }

    pub fn with_account(service: &str, account: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            entry: keyring::Entry::new(service, account)?,
        })
    }
}

fn vault_error(e: impl std::fmt::Display) -> CoreError {
    CoreError::Config {
        message: format!("credential vault: {e}"),
    }
}

#[async_trait]
impl CredentialStore for KeyringStore {
    async fn load(&self) -> Result<Option<Credential>, CoreError> {
        let blob = match self.entry.get_password() {
            Ok(blob) => blob,
            Err(keyring::Error::NoEntry) => return Ok(None),
            Err(e) => return Err(vault_error(e)),
        };
        let stored: StoredCredential = serde_json::from_str(&blob).map_err(vault_error)?;
        Ok(Some(stored.into()))
    }

    async fn save(&self, credential: &Credential) -> Result<(), CoreError> {
        let blob = serde_json::to_string(&StoredCredential::from(credential)).map_err(vault_error)?;
        self.entry.set_password(&blob).map_err(vault_error)?;
        debug!(expires_at = %credential.expires_at, "credential saved to keyring");
        Ok(())
    }

    async fn clear(&self) -> Result<(), CoreError> {
        match self.entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(vault_error(e)),
        }
    }
}
