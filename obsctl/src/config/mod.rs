mod current;
mod store;

use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use url::Url;

use crate::error::{Error, Result};

pub use current::ContextRef;
pub use store::{ConfigStore, SharedStore, default_config_path};

macro_rules! name_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(name: impl Into<String>) -> Self {
                Self(name.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(name: &str) -> Self {
                Self(name.to_string())
            }
        }

        impl From<String> for $name {
            fn from(name: String) -> Self {
                Self(name)
            }
        }
    };
}

name_type!(
    /// Name an API endpoint is registered under.
    ApiName
);
name_type!(
    /// Name of a tenant within one API.
    TenantName
);

/// The whole persisted document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub apis: BTreeMap<ApiName, ApiEntry>,
    #[serde(default, skip_serializing_if = "Current::is_unset")]
    pub current: Current,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApiEntry {
    pub url: Url,
    #[serde(default)]
    pub contexts: BTreeMap<TenantName, TenantContext>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantContext {
    pub tenant: TenantName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oidc: Option<OidcConfig>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "pem_bytes"
    )]
    pub ca_file: Option<Vec<u8>>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OidcConfig {
    #[serde(rename = "issuerURL", default)]
    pub issuer_url: String,
    #[serde(rename = "clientID", default)]
    pub client_id: String,
    #[serde(rename = "clientSecret", default)]
    pub client_secret: String,
    #[serde(default)]
    pub audience: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<Token>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    /// `None` means the issuer did not bound the token's lifetime.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

/// Raw pointer to the selected context as stored on disk; resolve it through [`ContextRef`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Current {
    #[serde(
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub api: Option<ApiName>,
    #[serde(
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub tenant: Option<TenantName>,
}

impl Current {
    pub fn is_unset(&self) -> bool {
        self.api.is_none() && self.tenant.is_none()
    }
}

impl OidcConfig {
    /// Checks that every field the client-credentials grant needs is present.
    pub fn ensure_complete(&self) -> Result<(), crate::error::AuthError> {
        use crate::error::AuthError::IncompleteCredentials;

        if self.issuer_url.is_empty() {
            return Err(IncompleteCredentials("issuer URL"));
        }
        if self.client_id.is_empty() {
            return Err(IncompleteCredentials("client ID"));
        }
        if self.client_secret.is_empty() {
            return Err(IncompleteCredentials("client secret"));
        }
        if self.audience.is_empty() {
            return Err(IncompleteCredentials("audience"));
        }
        Ok(())
    }
}

impl Token {
    /// A token is usable while more than `skew` remains before its expiry.
    pub fn is_valid_at(&self, now: DateTime<Utc>, skew: Duration) -> bool {
        if self.access_token.is_empty() {
            return false;
        }
        match self.expiry {
            Some(expiry) => expiry - now > skew,
            None => true,
        }
    }

    /// Value for the `Authorization` header.
    pub fn authorization(&self) -> String {
        let kind = if self.token_type.is_empty() || self.token_type.eq_ignore_ascii_case("bearer") {
            "Bearer"
        } else {
            self.token_type.as_str()
        };
        format!("{} {}", kind, self.access_token)
    }
}

impl TenantContext {
    pub fn new(tenant: TenantName, oidc: Option<OidcConfig>, ca_file: Option<Vec<u8>>) -> Self {
        Self {
            tenant,
            oidc,
            ca_file,
        }
    }
}

impl Config {
    pub fn api(&self, name: &str) -> Result<&ApiEntry> {
        self.apis.get(name).ok_or_else(|| Error::api_not_found(name))
    }

    fn api_mut(&mut self, name: &str) -> Result<&mut ApiEntry> {
        self.apis
            .get_mut(name)
            .ok_or_else(|| Error::api_not_found(name))
    }

    pub fn tenant(&self, api: &str, tenant: &str) -> Result<&TenantContext> {
        self.api(api)?
            .contexts
            .get(tenant)
            .ok_or_else(|| Error::tenant_not_found(tenant))
    }

    /// Fails when `name` is taken by a different URL. Returns whether the API still has to be inserted.
    pub fn check_api(&self, name: &ApiName, url: &Url) -> Result<bool> {
        if name.is_empty() {
            return Err(Error::validation("api name", "must not be empty"));
        }
        ensure_absolute(url)?;
        match self.apis.get(name) {
            None => Ok(true),
            Some(existing) if existing.url == *url => Ok(false),
            Some(existing) => Err(Error::validation(
                "api",
                format!(
                    "'{}' is already registered with URL {}, not {}",
                    name, existing.url, url
                ),
            )),
        }
    }

    pub fn add_api(&mut self, name: ApiName, url: Url) -> Result<()> {
        if self.check_api(&name, &url)? {
            self.apis.insert(
                name,
                ApiEntry {
                    url,
                    contexts: BTreeMap::new(),
                },
            );
        }
        Ok(())
    }

    pub fn remove_api(&mut self, name: &str) -> Result<()> {
        self.apis
            .remove(name)
            .ok_or_else(|| Error::api_not_found(name))?;
        if self.current.api.as_ref().is_some_and(|api| api.as_str() == name) {
            self.current = Current::default();
        }
        Ok(())
    }

    /// Inserts or replaces `tenant` under `api`, storing `context` under the tenant's own name.
    pub fn add_tenant(
        &mut self,
        tenant: TenantName,
        api: &str,
        mut context: TenantContext,
    ) -> Result<()> {
        if tenant.is_empty() {
            return Err(Error::validation("tenant name", "must not be empty"));
        }
        let entry = self.api_mut(api)?;
        context.tenant = tenant.clone();
        entry.contexts.insert(tenant, context);
        Ok(())
    }

    pub fn remove_tenant(&mut self, tenant: &str, api: &str) -> Result<()> {
        self.api_mut(api)?
            .contexts
            .remove(tenant)
            .ok_or_else(|| Error::tenant_not_found(tenant))?;
        if ContextRef::from_current(&self.current)
            .is_some_and(|selected| selected.api.as_str() == api && selected.tenant.as_str() == tenant)
        {
            self.current = Current::default();
        }
        Ok(())
    }

    /// Replaces the token of an existing tenant.
    pub fn update_token(&mut self, api: &str, tenant: &str, token: Token) -> Result<()> {
        let context = self
            .api_mut(api)?
            .contexts
            .get_mut(tenant)
            .ok_or_else(|| Error::tenant_not_found(tenant))?;
        match context.oidc.as_mut() {
            Some(oidc) => {
                oidc.token = Some(token);
                Ok(())
            }
            None => Err(Error::validation(
                "tenant",
                format!("'{}' has no OIDC configuration to hold a token", tenant),
            )),
        }
    }

    /// Structural checks run on every loaded document.
    pub fn validate(&self) -> Result<()> {
        for (name, entry) in &self.apis {
            if name.is_empty() {
                return Err(Error::validation("config", "api with an empty name"));
            }
            ensure_absolute(&entry.url)?;
            for (key, context) in &entry.contexts {
                if *key != context.tenant {
                    return Err(Error::validation(
                        "config",
                        format!(
                            "tenant stored as '{}' under api '{}' names itself '{}'",
                            key, name, context.tenant
                        ),
                    ));
                }
            }
        }
        Ok(())
    }
}

fn ensure_absolute(url: &Url) -> Result<()> {
    if url.cannot_be_a_base() || !url.has_host() {
        return Err(Error::validation(
            "url",
            format!("{} is not an absolute URL", url),
        ));
    }
    Ok(())
}

fn empty_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: From<String>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|v| !v.is_empty()).map(T::from))
}

/// PEM bytes are stored base64 encoded, the way the Go tool wrote them.
mod pem_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => serializer.serialize_str(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error> {
        let value: Option<String> = Option::deserialize(deserializer)?;
        match value.filter(|v| !v.is_empty()) {
            Some(encoded) => STANDARD
                .decode(encoded.as_bytes())
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod test;
