use std::path::PathBuf;

use anyhow::{Context as _, anyhow};
use clap::Args;
use url::Url;

use super::context::host_name;
use crate::Context;
use crate::config::{ApiName, Config, ContextRef, OidcConfig, TenantContext, TenantName};

#[derive(Args, Clone, Debug)]
pub struct LoginArgs {
    /// The name of the tenant.
    #[arg(long)]
    pub tenant: String,

    /// The URL of the Observatorium API, or the name of an already registered one.
    #[arg(long)]
    pub api: String,

    /// Path to the TLS CA against which to verify the Observatorium API. If no server CA is specified, the client will use the system certificates.
    #[arg(long = "ca")]
    pub ca_file: Option<PathBuf>,

    #[command(flatten)]
    pub oidc: OidcArgs,

    /// If set, OIDC flags will not be checked while saving tenant details locally.
    #[arg(long = "disable.oidc-check")]
    pub disable_oidc_check: bool,
}

#[derive(Args, Clone, Debug, Default)]
pub struct OidcArgs {
    /// The OIDC issuer URL, see https://openid.net/specs/openid-connect-discovery-1_0.html#IssuerDiscovery.
    #[arg(long = "oidc.issuer-url", default_value = "")]
    pub issuer_url: String,

    /// The OIDC client ID, see https://tools.ietf.org/html/rfc6749#section-2.3.
    #[arg(long = "oidc.client-id", default_value = "")]
    pub client_id: String,

    /// The OIDC client secret, see https://tools.ietf.org/html/rfc6749#section-2.3.
    #[arg(long = "oidc.client-secret", default_value = "")]
    pub client_secret: String,

    /// The audience for whom the access token is intended, see https://openid.net/specs/openid-connect-core-1_0.html#IDToken.
    #[arg(long = "oidc.audience", default_value = "")]
    pub audience: String,
}

impl OidcArgs {
    fn is_empty(&self) -> bool {
        self.issuer_url.is_empty()
            && self.client_id.is_empty()
            && self.client_secret.is_empty()
            && self.audience.is_empty()
    }

    fn to_config(&self) -> OidcConfig {
        OidcConfig {
            issuer_url: self.issuer_url.clone(),
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            audience: self.audience.clone(),
            token: None,
        }
    }
}

impl LoginArgs {
    /// Authenticates first and only then writes API, tenant and current context in one save,
    /// so a failed login leaves the config file as it was.
    pub async fn run(&self, ctx: &Context) -> anyhow::Result<()> {
        let ca_file = match &self.ca_file {
            Some(path) => Some(
                std::fs::read(path)
                    .with_context(|| format!("reading CA file {}", path.display()))?,
            ),
            None => None,
        };

        let tenant = TenantName::new(self.tenant.as_str());
        let (api, url) = {
            let store = ctx.store.lock().await;
            self.resolve_api(store.config())?
        };

        let oidc = if self.disable_oidc_check && self.oidc.is_empty() {
            None
        } else {
            Some(self.oidc.to_config())
        };
        let mut context = TenantContext::new(tenant.clone(), oidc, ca_file);

        if !self.disable_oidc_check {
            let client = ctx
                .factory
                .client(url.clone(), &context, None)
                .await
                .context("creating authenticated client")?;
            context.oidc = client.oidc().await;
        }

        let selected = ContextRef::new(api.clone(), tenant.clone());
        ctx.store
            .lock()
            .await
            .update(|config| {
                config.add_api(api.clone(), url)?;
                config.add_tenant(tenant, api.as_str(), context)?;
                config.set_current(&selected)
            })
            .context("saving tenant details")?;

        tracing::info!(context = %selected, "logged in");
        println!("Logged in as {}", selected);
        Ok(())
    }

    /// A registered API name is used as is; anything else has to be a URL, registered under its host.
    fn resolve_api(&self, config: &Config) -> anyhow::Result<(ApiName, Url)> {
        if let Ok(entry) = config.api(&self.api) {
            return Ok((ApiName::new(self.api.as_str()), entry.url.clone()));
        }

        let url = Url::parse(&self.api)
            .map_err(|_| anyhow!("{} is not a valid URL or existing api name", self.api))?;
        let name = host_name(&url)?;

        // fail on a conflicting registration before talking to the issuer
        config
            .check_api(&name, &url)
            .context("adding new api")?;
        Ok((name, url))
    }
}
