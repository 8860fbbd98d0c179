// Bearer credential and token refresh.
//
// The relay authenticates with a short-lived id token. Acquiring the
// first token happens out of band (browser sign-in); this module only
// models the credential and exchanges a refresh token for a new one.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::Error;

pub const DEFAULT_TOKEN_REFRESH_URL: &str = "https://securetoken.googleapis.com/v1/token";

// ── Credential ───────────────────────────────────────────────────────

/// A refreshable bearer credential.
#[derive(Debug, Clone)]
pub struct Credential {
    pub id_token: SecretString,
    pub refresh_token: SecretString,
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    /// Build a credential that expires `expires_in_secs` from now.
    pub fn from_token_response(
        id_token: SecretString,
        refresh_token: SecretString,
        expires_in_secs: i64,
    ) -> Self {
        Self {
            id_token,
            refresh_token,
            expires_at: Utc::now() + TimeDelta::seconds(expires_in_secs),
        }
    }

    /// Wall-clock expiry check, evaluated at the time of the call.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Exchanges a credential's refresh token for a fresh credential.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, credential: &Credential) -> Result<Credential, Error>;
}

// ── Secure token endpoint ────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
    grant_type: &'static str,
}

#[derive(Deserialize)]
struct TokenResponse {
    id_token: String,
    refresh_token: String,
    /// Seconds, sent as a decimal string.
    expires_in: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// HTTP client for the secure-token refresh endpoint.
pub struct SecureTokenClient {
    http: reqwest::Client,
    endpoint: Url,
}

impl SecureTokenClient {
    /// `api_key` is appended as the `key` query parameter when present.
    pub fn new(
        endpoint: &str,
        api_key: Option<&SecretString>,
        timeout: Duration,
    ) -> Result<Self, Error> {
        let mut endpoint = Url::parse(endpoint)?;
        if let Some(key) = api_key {
            endpoint
                .query_pairs_mut()
                .append_pair("key", key.expose_secret());
        }
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("ovenlink/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(Error::Transport)?;
        Ok(Self { http, endpoint })
    }
}

#[async_trait]
impl TokenRefresher for SecureTokenClient {
    async fn refresh(&self, credential: &Credential) -> Result<Credential, Error> {
        debug!(host = ?self.endpoint.host_str(), "refreshing id token");

        let resp = self
            .http
            .post(self.endpoint.clone())
            .json(&RefreshRequest {
                refresh_token: credential.refresh_token.expose_secret(),
                grant_type: "refresh_token",
            })
            .send()
            .await
            .map_err(Error::Transport)?;

        let status = resp.status();
        let body = resp.text().await.map_err(Error::Transport)?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(Error::TokenRefresh {
                status: status.as_u16(),
                message,
            });
        }

        let token: TokenResponse =
            serde_json::from_str(&body).map_err(|e| Error::decode(&e, &body))?;
        let expires_in: i64 = token.expires_in.trim().parse().map_err(|_| Error::Decode {
            message: format!("expires_in is not an integer: {}", token.expires_in),
            body: String::new(),
        })?;

        Ok(Credential::from_token_response(
            SecretString::from(token.id_token),
            SecretString::from(token.refresh_token),
            expires_in,
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn credential(expires_at: DateTime<Utc>) -> Credential {
        Credential {
            id_token: SecretString::from("id"),
            refresh_token: SecretString::from("refresh"),
            expires_at,
        }
    }

    #[test]
    fn expiry_is_inclusive() {
        let now = Utc::now();
        let cred = credential(now);
        assert!(cred.is_expired_at(now));
        assert!(!cred.is_expired_at(now - TimeDelta::seconds(1)));
    }

    #[test]
    fn token_response_sets_future_expiry() {
        let cred = Credential::from_token_response(
            SecretString::from("id"),
            SecretString::from("refresh"),
            3600,
        );
        assert!(!cred.is_expired());
        assert!(cred.expires_at > Utc::now() + TimeDelta::seconds(3500));
    }

    #[test]
    fn debug_output_hides_tokens() {
        let rendered = format!("{:?}", credential(Utc::now()));
        assert!(!rendered.contains("refresh\""));
        assert!(rendered.contains("REDACTED"));
    }

    #[test]
    fn api_key_lands_in_query() {
        let client = SecureTokenClient::new(
            DEFAULT_TOKEN_REFRESH_URL,
            Some(&SecretString::from("k123")),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(client.endpoint.query(), Some("key=k123"));
    }
}
