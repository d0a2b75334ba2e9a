use std::path::PathBuf;
use std::time::Duration;

use clap::Args;

use crate::config::default_config_path;
use crate::logging::{LogFormat, LogLevel};

/// Settings shared by every command
#[derive(Args, Clone, Debug)]
pub struct Settings {
    /// Path of the config file holding APIs, tenants and tokens
    #[arg(long = "config", env = "OBSCTL_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Deadline for each network call, e.g. `30s` or `2m`
    #[arg(
        long = "timeout",
        env = "OBSCTL_TIMEOUT",
        default_value = "30s",
        value_parser = humantime::parse_duration,
        global = true
    )]
    pub timeout: Duration,

    /// Log filtering level
    #[arg(long = "log.level", value_enum, default_value = "info", global = true)]
    pub log_level: LogLevel,

    /// Log format to use
    #[arg(long = "log.format", value_enum, default_value = "clilog", global = true)]
    pub log_format: LogFormat,
}

impl Settings {
    pub fn config_path(&self) -> anyhow::Result<PathBuf> {
        match &self.config {
            Some(path) => Ok(path.clone()),
            None => default_config_path().ok_or_else(|| {
                anyhow::anyhow!("unable to determine the user config directory, please pass --config")
            }),
        }
    }
}
