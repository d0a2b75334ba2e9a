use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::TimeDelta;
use serde::Deserialize;
use tracing::{Instrument, Span};
use url::Url;

use super::{Clock, HttpTransport, SystemClock};
use crate::config::{OidcConfig, Token};
use crate::error::{AuthError, Error, Result};

/// Tokens closer than this to their expiry are treated as expired.
const DEFAULT_SKEW_SECS: i64 = 30;

const DISCOVERY_PATH: &str = ".well-known/openid-configuration";

#[derive(Deserialize)]
struct ProviderMetadata {
    issuer: String,
    token_endpoint: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: String,
    expires_in: Option<i64>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
    error_description: Option<String>,
}

/// Outcome of [`OidcAuthenticator::token`].
#[derive(Clone, Debug, PartialEq)]
pub enum Acquired {
    /// The stored token is still valid; nothing was sent.
    Cached(Token),
    /// A new token was minted and has to be persisted by the caller.
    Minted(Token),
}

/// Runs the client-credentials grant against an OIDC issuer.
///
/// Token endpoints found through discovery are cached per issuer URL for the lifetime
/// of the authenticator and never written anywhere.
pub struct OidcAuthenticator {
    transport: Arc<dyn HttpTransport>,
    clock: Arc<dyn Clock>,
    skew: TimeDelta,
    deadline: Option<Duration>,
    endpoints: Mutex<HashMap<String, Url>>,
    span: Span,
}

impl OidcAuthenticator {
    pub fn new(transport: Arc<dyn HttpTransport>, span: Span) -> Self {
        Self {
            transport,
            clock: Arc::new(SystemClock),
            skew: TimeDelta::seconds(DEFAULT_SKEW_SECS),
            deadline: None,
            endpoints: Mutex::new(HashMap::new()),
            span,
        }
    }

    #[cfg(test)]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Bounds every discovery and token request. Exceeding it yields [`Error::Timeout`].
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn is_valid(&self, token: &Token) -> bool {
        token.is_valid_at(self.clock.now(), self.skew)
    }

    /// Returns the stored token while it is valid, otherwise authenticates again.
    pub async fn token(&self, oidc: &OidcConfig) -> Result<Acquired> {
        oidc.ensure_complete()?;

        if let Some(token) = &oidc.token
            && self.is_valid(token)
        {
            return Ok(Acquired::Cached(token.clone()));
        }

        let reason = if oidc.token.is_some() { "expired" } else { "unset" };
        let token = self
            .bounded(self.authenticate(oidc))
            .instrument(tracing::debug_span!(
                parent: &self.span,
                "authenticate",
                issuer = %oidc.issuer_url,
                reason
            ))
            .await?;
        Ok(Acquired::Minted(token))
    }

    async fn bounded<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        match self.deadline {
            Some(deadline) => tokio::time::timeout(deadline, fut)
                .await
                .map_err(|_| Error::Timeout(deadline))?,
            None => fut.await,
        }
    }

    async fn authenticate(&self, oidc: &OidcConfig) -> Result<Token> {
        let endpoint = self.token_endpoint(&oidc.issuer_url).await?;

        let response = self
            .transport
            .post_form(
                &endpoint,
                &[
                    ("grant_type", "client_credentials"),
                    ("client_id", oidc.client_id.as_str()),
                    ("client_secret", oidc.client_secret.as_str()),
                    ("audience", oidc.audience.as_str()),
                ],
            )
            .await?;

        if response.status.is_success() {
            let body: TokenResponse = response.json().map_err(|err| {
                AuthError::ServerError(format!("malformed token response: {}", err))
            })?;
            if body.access_token.is_empty() {
                return Err(
                    AuthError::ServerError("token response without access_token".into()).into(),
                );
            }

            let expiry = match body.expires_in.filter(|secs| *secs > 0) {
                Some(secs) => Some(
                    TimeDelta::try_seconds(secs)
                        .and_then(|lifetime| self.clock.now().checked_add_signed(lifetime))
                        .ok_or_else(|| {
                            AuthError::ServerError(format!(
                                "token response with out-of-range expires_in: {}",
                                secs
                            ))
                        })?,
                ),
                None => None,
            };
            tracing::info!(expiry = ?expiry, "obtained new access token");

            Ok(Token {
                access_token: body.access_token,
                token_type: body.token_type,
                expiry,
            })
        } else if response.status.as_u16() == 400 || response.status.as_u16() == 401 {
            match response.json::<ErrorResponse>() {
                Ok(error) if error.error == "invalid_client" || error.error == "unauthorized_client" => {
                    Err(AuthError::AuthenticationFailed.into())
                }
                Ok(error) => Err(AuthError::ServerError(
                    error.error_description.unwrap_or(error.error),
                )
                .into()),
                Err(_) => Err(AuthError::AuthenticationFailed.into()),
            }
        } else {
            Err(AuthError::ServerError(format!(
                "HTTP {}: {}",
                response.status,
                response.text()
            ))
            .into())
        }
    }

    async fn token_endpoint(&self, issuer: &str) -> Result<Url> {
        if let Some(endpoint) = self.cached_endpoint(issuer) {
            return Ok(endpoint);
        }

        let endpoint = self.discover(issuer).await?;
        if let Ok(mut endpoints) = self.endpoints.lock() {
            endpoints.insert(issuer.to_string(), endpoint.clone());
        }
        Ok(endpoint)
    }

    fn cached_endpoint(&self, issuer: &str) -> Option<Url> {
        self.endpoints
            .lock()
            .ok()
            .and_then(|endpoints| endpoints.get(issuer).cloned())
    }

    async fn discover(&self, issuer: &str) -> Result<Url> {
        let failed = |reason: String| AuthError::Discovery {
            issuer: issuer.to_string(),
            reason,
        };

        let trimmed = issuer.trim_end_matches('/');
        let url = Url::parse(&format!("{}/{}", trimmed, DISCOVERY_PATH))
            .map_err(|err| failed(format!("invalid issuer URL: {}", err)))?;

        tracing::debug!(%url, "fetching provider metadata");
        let response = self.transport.fetch(&url).await?;
        if !response.status.is_success() {
            return Err(failed(format!("HTTP {}: {}", response.status, response.text())).into());
        }

        let metadata: ProviderMetadata = response
            .json()
            .map_err(|err| failed(format!("malformed provider metadata: {}", err)))?;
        if metadata.issuer.trim_end_matches('/') != trimmed {
            return Err(failed(format!(
                "provider metadata names a different issuer: {}",
                metadata.issuer
            ))
            .into());
        }

        Url::parse(&metadata.token_endpoint)
            .map_err(|err| Error::from(failed(format!("invalid token_endpoint: {}", err))))
    }
}
