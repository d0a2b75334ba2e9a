use clap::Parser;

use crate::commands::Commands;
use crate::settings::Settings;

/// obsctl - credentials and contexts for Observatorium APIs
#[derive(Parser)]
#[command(name = "obsctl")]
#[command(about = "CLI to interact with Observatorium", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub settings: Settings,

    #[command(subcommand)]
    pub command: Commands,
}
