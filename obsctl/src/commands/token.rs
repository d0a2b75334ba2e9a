use anyhow::{Context as _, anyhow};
use clap::Args;

use crate::Context;
use crate::config::ContextRef;

#[derive(Args, Clone, Debug)]
pub struct TokenArgs {
    /// API of the tenant, defaults to the current context
    #[arg(long, requires = "tenant")]
    pub api: Option<String>,

    /// Tenant to print a token for, defaults to the current context
    #[arg(long, requires = "api")]
    pub tenant: Option<String>,
}

impl TokenArgs {
    /// Prints a valid access token, refreshing and saving it first if the stored one expired.
    pub async fn run(&self, ctx: &Context) -> anyhow::Result<()> {
        let selected = match (&self.api, &self.tenant) {
            (Some(api), Some(tenant)) => ContextRef::new(api.as_str(), tenant.as_str()),
            _ => {
                let store = ctx.store.lock().await;
                store.get_current()?.0
            }
        };

        let client = ctx
            .factory
            .for_context(&ctx.store, &selected)
            .await
            .with_context(|| format!("creating authenticated client for {}", selected))?;
        let token = client
            .current_token()
            .await?
            .ok_or_else(|| anyhow!("tenant {} has no OIDC configuration", selected))?;

        println!("{}", token.access_token);
        Ok(())
    }
}
