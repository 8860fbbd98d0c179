// ── Credential provider ──
//
// Composes the external vault (`CredentialStore`) with token refresh.
// Expiry is checked against the wall clock on every call; nothing is
// scheduled ahead of time.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use ovenlink_api::{Credential, TokenRefresher};

use crate::error::CoreError;

/// Durable home of the signed-in credential.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn load(&self) -> Result<Option<Credential>, CoreError>;
    async fn save(&self, credential: &Credential) -> Result<(), CoreError>;
    async fn clear(&self) -> Result<(), CoreError>;
}

/// Process-local store, used by tests and one-shot sessions.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    slot: Mutex<Option<Credential>>,
}

impl MemoryCredentialStore {
    pub fn new(credential: Option<Credential>) -> Self {
        Self {
            slot: Mutex::new(credential),
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<Credential>> {
        self.slot
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn load(&self) -> Result<Option<Credential>, CoreError> {
        Ok(self.slot().clone())
    }

    async fn save(&self, credential: &Credential) -> Result<(), CoreError> {
        *self.slot() = Some(credential.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), CoreError> {
        *self.slot() = None;
        Ok(())
    }
}

/// Hands out a usable credential, refreshing through `refresher` when
/// the stored one has expired.
#[derive(Clone)]
pub struct CredentialProvider {
    store: Arc<dyn CredentialStore>,
    refresher: Arc<dyn TokenRefresher>,
}

impl CredentialProvider {
    pub fn new(store: Arc<dyn CredentialStore>, refresher: Arc<dyn TokenRefresher>) -> Self {
        Self { store, refresher }
    }

    /// A credential valid at this instant, or `None` when the user has to
    /// sign in again. Failures are logged, not returned.
    pub async fn get_credential(&self) -> Option<Credential> {
        let stored = match self.store.load().await {
            Ok(Some(credential)) => credential,
            Ok(None) => {
                debug!("no stored credential");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "credential store unreadable");
                return None;
            }
        };

        if !stored.is_expired() {
            return Some(stored);
        }

        debug!(expired_at = %stored.expires_at, "credential expired, refreshing");
        let refreshed = match self.refresher.refresh(&stored).await {
            Ok(credential) => credential,
            Err(e) => {
                warn!(error = %e, "token refresh failed");
                return None;
            }
        };

        if let Err(e) = self.store.save(&refreshed).await {
            // Still usable for this session even if it could not be persisted.
            warn!(error = %e, "failed to persist refreshed credential");
        } else {
            info!(expires_at = %refreshed.expires_at, "credential refreshed");
        }
        Some(refreshed)
    }

    pub async fn save(&self, credential: &Credential) -> Result<(), CoreError> {
        self.store.save(credential).await
    }

    pub async fn clear(&self) -> Result<(), CoreError> {
        self.store.clear().await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::{TimeDelta, Utc};
    use secrecy::{ExposeSecret, SecretString};

    use super::*;

    struct CountingRefresher {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl TokenRefresher for CountingRefresher {
        async fn refresh(&self, _: &Credential) -> Result<Credential, ovenlink_api::Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ovenlink_api::Error::TokenRefresh {
                    status: 400,
                    message: "INVALID_REFRESH_TOKEN".into(),
                });
            }
            Ok(Credential::from_token_response(
                SecretString::from("fresh-id"),
                SecretString::from("fresh-refresh"),
                3600,
            ))
        }
    }

    fn credential(id: &str, expires_in: i64) -> Credential {
        Credential {
            id_token: SecretString::from(id),
            refresh_token: SecretString::from("refresh"),
            expires_at: Utc::now() + TimeDelta::seconds(expires_in),
        }
    }

    fn setup(
        stored: Option<Credential>,
        fail: bool,
    ) -> (CredentialProvider, Arc<MemoryCredentialStore>, Arc<CountingRefresher>) {
        let store = Arc::new(MemoryCredentialStore::new(stored));
        let refresher = Arc::new(CountingRefresher {
            calls: AtomicUsize::new(0),
            fail,
        });
        (
            CredentialProvider::new(store.clone(), refresher.clone()),
            store,
            refresher,
        )
    }

    #[tokio::test]
    async fn valid_credential_is_returned_without_refresh() {
        let (provider, _, refresher) = setup(Some(credential("live", 600)), false);
        let got = provider.get_credential().await.unwrap();
        assert_eq!(got.id_token.expose_secret(), "live");
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn expired_credential_is_refreshed_and_persisted() {
        let (provider, store, refresher) = setup(Some(credential("stale", -10)), false);
        let got = provider.get_credential().await.unwrap();
        assert_eq!(got.id_token.expose_secret(), "fresh-id");
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);

        let saved = store.load().await.unwrap().unwrap();
        assert_eq!(saved.id_token.expose_secret(), "fresh-id");
        assert!(!saved.is_expired());
    }

    #[tokio::test]
    async fn missing_or_unrefreshable_yields_none() {
        let (provider, _, _) = setup(None, false);
        assert!(provider.get_credential().await.is_none());

        let (provider, store, _) = setup(Some(credential("stale", -10)), true);
        assert!(provider.get_credential().await.is_none());
        let kept = store.load().await.unwrap().unwrap();
        assert_eq!(kept.id_token.expose_secret(), "stale");
    }

    #[tokio::test]
    async fn clear_forgets_credential() {
        let (provider, store, _) = setup(Some(credential("live", 600)), false);
        provider.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
        assert!(provider.get_credential().await.is_none());
    }
}
