use std::fmt::Write as _;

use anyhow::{Context as _, anyhow};
use clap::Subcommand;
use url::Url;

use crate::Context;
use crate::config::{ApiName, Config, ContextRef};

#[derive(Subcommand, Debug, Clone)]
pub enum ContextCommands {
    /// List all saved APIs and tenants
    List,
    /// Switch to a saved context, given as <api>/<tenant>
    #[command(alias = "switch")]
    Set { context: ContextRef },
    /// Show the current context
    Current,
    /// Manage saved APIs
    Api {
        #[command(subcommand)]
        command: ApiCommands,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum ApiCommands {
    /// Register an Observatorium API
    Add {
        #[arg(long)]
        url: Url,
        /// Defaults to the host (and port) of the URL
        #[arg(long)]
        name: Option<String>,
    },
    /// Remove an API together with all of its tenants
    Rm { name: String },
}

impl ContextCommands {
    pub async fn run(&self, ctx: &Context) -> anyhow::Result<()> {
        match self {
            Self::List => {
                let store = ctx.store.lock().await;
                print!("{}", render_list(store.config()));
            }
            Self::Set { context } => {
                ctx.store
                    .lock()
                    .await
                    .set_current(context)
                    .with_context(|| format!("switching to {}", context))?;
                tracing::info!(%context, "switched context");
                println!("Switched to context {}", context);
            }
            Self::Current => {
                let store = ctx.store.lock().await;
                let (selected, _, _) = store.get_current()?;
                println!("{}", selected);
            }
            Self::Api { command } => command.run(ctx).await?,
        }
        Ok(())
    }
}

impl ApiCommands {
    pub async fn run(&self, ctx: &Context) -> anyhow::Result<()> {
        match self {
            Self::Add { url, name } => {
                let name = match name {
                    Some(name) => ApiName::new(name.as_str()),
                    None => host_name(url)?,
                };
                ctx.store
                    .lock()
                    .await
                    .add_api(name.clone(), url.clone())
                    .context("adding new api")?;
                println!("Added api {} ({})", name, url);
            }
            Self::Rm { name } => {
                ctx.store
                    .lock()
                    .await
                    .remove_api(&ApiName::new(name.as_str()))
                    .with_context(|| format!("removing api {}", name))?;
                println!("Removed api {}", name);
            }
        }
        Ok(())
    }
}

/// Name an API is registered under when none is given: `host` or `host:port`.
pub(crate) fn host_name(url: &Url) -> anyhow::Result<ApiName> {
    let host = url
        .host_str()
        .ok_or_else(|| anyhow!("{} has no host to name the api after", url))?;
    Ok(match url.port() {
        Some(port) => ApiName::new(format!("{}:{}", host, port)),
        None => ApiName::new(host),
    })
}

/// One line per API with its tenants indented below it; the current context is starred.
pub fn render_list(config: &Config) -> String {
    let current = config.current_ref().ok();
    let mut out = String::new();
    for (name, api) in &config.apis {
        let _ = writeln!(out, "{} ({})", name, api.url);
        for tenant in api.contexts.keys() {
            let marker = match &current {
                Some(c) if c.api == *name && c.tenant == *tenant => "*",
                _ => " ",
            };
            let _ = writeln!(out, "  {} {}", marker, tenant);
        }
    }
    if config.apis.is_empty() {
        out.push_str("No APIs saved, use `obsctl login` to add one.\n");
    }
    out
}
