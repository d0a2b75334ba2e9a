//! Helpers shared by the test modules: a fixed clock and a mock OIDC issuer.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use serde_json::json;
use tracing::Span;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::auth::{Clock, OidcAuthenticator};
use crate::config::{OidcConfig, Token};

pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// A clock tests move forward by hand.
pub struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self(Mutex::new(now))
    }

    pub fn advance(&self, by: TimeDelta) {
        *self.0.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap()
}

pub fn authenticator() -> OidcAuthenticator {
    OidcAuthenticator::new(Arc::new(reqwest::Client::new()), Span::none())
        .with_clock(Arc::new(FixedClock(now())))
}

/// Issuer URL of `server`, with the trailing slash users tend to type.
pub fn issuer_url(server: &MockServer) -> String {
    format!("{}/", server.uri())
}

pub fn oidc_config(server: &MockServer) -> OidcConfig {
    OidcConfig {
        issuer_url: issuer_url(server),
        client_id: "cid".into(),
        client_secret: "secret".into(),
        audience: "aud".into(),
        token: None,
    }
}

pub fn token(access_token: &str, expiry: DateTime<Utc>) -> Token {
    Token {
        access_token: access_token.into(),
        token_type: "Bearer".into(),
        expiry: Some(expiry),
    }
}

/// Serves provider metadata, expected `discoveries` times.
pub async fn mount_discovery(server: &MockServer, discoveries: u64) {
    Mock::given(method("GET"))
        .and(path("/.well-known/openid-configuration"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "issuer": server.uri(),
            "token_endpoint": format!("{}/token", server.uri()),
            "jwks_uri": format!("{}/keys", server.uri()),
        })))
        .expect(discoveries)
        .mount(server)
        .await;
}

/// Hands out `access_token` valid for an hour, expected `grants` times.
pub async fn mount_token(server: &MockServer, access_token: &str, grants: u64) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(body_string_contains("client_id=cid"))
        .and(body_string_contains("client_secret=secret"))
        .and(body_string_contains("audience=aud"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": access_token,
            "token_type": "Bearer",
            "expires_in": 3600,
        })))
        .expect(grants)
        .mount(server)
        .await;
}

/// A mock issuer minting `access_token` exactly `grants` times.
pub async fn mock_issuer(access_token: &str, grants: u64) -> MockServer {
    let server = MockServer::start().await;
    mount_discovery(&server, grants.min(1)).await;
    mount_token(&server, access_token, grants).await;
    server
}
