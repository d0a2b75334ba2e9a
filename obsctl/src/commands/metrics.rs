use anyhow::Context as _;
use clap::{Subcommand, ValueEnum};

use crate::Context;
use crate::config::TenantName;

#[derive(Subcommand, Debug, Clone)]
pub enum MetricsCommands {
    /// Read metrics metadata of the current tenant
    Get {
        #[arg(value_enum)]
        resource: MetricsResource,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum MetricsResource {
    /// All label names
    Labels,
    /// Alerting and recording rules
    Rules,
}

impl MetricsResource {
    fn path(self, tenant: &TenantName) -> String {
        let endpoint = match self {
            MetricsResource::Labels => "labels",
            MetricsResource::Rules => "rules",
        };
        format!("/api/metrics/v1/{}/api/v1/{}", tenant, endpoint)
    }
}

impl MetricsCommands {
    pub async fn run(&self, ctx: &Context) -> anyhow::Result<()> {
        match self {
            Self::Get { resource } => {
                let selected = ctx.store.lock().await.get_current()?.0;
                let client = ctx
                    .factory
                    .for_context(&ctx.store, &selected)
                    .await
                    .with_context(|| format!("creating authenticated client for {}", selected))?;

                let body = client
                    .get(&resource.path(&selected.tenant))
                    .await
                    .with_context(|| format!("reading {:?} of {}", resource, selected))?;
                println!("{}", body);
            }
        }
        Ok(())
    }
}
