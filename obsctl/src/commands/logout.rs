use anyhow::{Context as _, bail};
use clap::Args;

use crate::Context;
use crate::config::ContextRef;

#[derive(Args, Clone, Debug)]
pub struct LogoutArgs {
    /// The name of the tenant to logout. If not specified, the tenant of the current context is used.
    #[arg(long)]
    pub tenant: Option<String>,

    /// The name of the Observatorium API that has the tenant. If not specified, the API of the current context is used.
    #[arg(long)]
    pub api: Option<String>,
}

impl LogoutArgs {
    pub async fn run(&self, ctx: &Context) -> anyhow::Result<()> {
        let mut store = ctx.store.lock().await;

        let target = match (&self.api, &self.tenant) {
            (Some(api), Some(tenant)) => ContextRef::new(api.as_str(), tenant.as_str()),
            (api, tenant) => {
                let current = store
                    .config()
                    .current_ref()
                    .context("resolving tenant to logout")?;
                if let Some(api) = api {
                    if api.as_str() != current.api.as_str() {
                        bail!("--tenant is required when --api is not the current api");
                    }
                }
                match tenant {
                    Some(tenant) => ContextRef::new(current.api, tenant.as_str()),
                    None => current,
                }
            }
        };

        store
            .remove_tenant(&target.tenant, &target.api)
            .with_context(|| format!("removing tenant {}", target))?;

        tracing::info!(context = %target, "logged out");
        println!("Logged out of {}", target);
        Ok(())
    }
}

