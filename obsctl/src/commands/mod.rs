pub mod context;
pub mod login;
pub mod logout;
pub mod metrics;
pub mod token;

use clap::Subcommand;

use crate::Context;
pub use context::ContextCommands;
pub use login::LoginArgs;
pub use logout::LogoutArgs;
pub use metrics::MetricsCommands;
pub use token::TokenArgs;

#[derive(Subcommand)]
pub enum Commands {
    /// Login as a tenant. Will also save tenant details locally.
    Login(LoginArgs),

    /// Logout a tenant and remove its details from the local config.
    Logout(LogoutArgs),

    /// Manage context configuration
    Context {
        #[command(subcommand)]
        command: ContextCommands,
    },

    /// Read metrics data of the current tenant
    Metrics {
        #[command(subcommand)]
        command: MetricsCommands,
    },

    /// Print a valid access token for a tenant, refreshing it if needed.
    Token(TokenArgs),
}

impl Commands {
    pub async fn run(&self, ctx: &Context) -> anyhow::Result<()> {
        match self {
            Commands::Login(args) => args.run(ctx).await,
            Commands::Logout(args) => args.run(ctx).await,
            Commands::Context { command } => command.run(ctx).await,
            Commands::Metrics { command } => command.run(ctx).await,
            Commands::Token(args) => args.run(ctx).await,
        }
    }
}
