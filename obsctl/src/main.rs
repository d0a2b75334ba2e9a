mod api;
mod auth;
mod cli;
mod commands;
mod config;
mod error;
mod logging;
mod settings;

#[cfg(test)]
mod testutil;

use std::process;
use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;

use api::AuthenticatedClientFactory;
use auth::OidcAuthenticator;
use cli::Cli;
use config::{ConfigStore, SharedStore};
use settings::Settings;

/// Runtime context containing the config store and the client factory
pub struct Context {
    pub store: SharedStore,
    pub factory: AuthenticatedClientFactory,
}

impl Context {
    pub fn new(settings: &Settings) -> anyhow::Result<Self> {
        let path = settings.config_path()?;
        let store = ConfigStore::load(&path, tracing::info_span!("store"))
            .with_context(|| format!("loading config from {}", path.display()))?;
        tracing::debug!(path = %store.path().display(), "using config");

        let authenticator = OidcAuthenticator::new(
            Arc::new(reqwest::Client::new()),
            tracing::info_span!("oidc"),
        )
        .with_deadline(settings.timeout);
        let factory =
            AuthenticatedClientFactory::new(Arc::new(authenticator), tracing::info_span!("client"))
                .with_deadline(settings.timeout);

        Ok(Self {
            store: store.into_shared(),
            factory,
        })
    }
}

#[tokio::main]
async fn main() {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    logging::init(cli.settings.log_level, cli.settings.log_format);

    let result = match Context::new(&cli.settings) {
        Ok(ctx) => cli.command.run(&ctx).await,
        Err(err) => Err(err),
    };

    if let Err(err) = result {
        tracing::debug!(error = ?err, "command failed");
        eprintln!("Error: {:#}", err);
        process::exit(1);
    }
}
