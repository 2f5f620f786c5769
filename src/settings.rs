use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow, ensure};
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::cli::{Cli, LogFormat};

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:10.0.3) Gecko/20120305 Firefox/10.0.3";

fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_log_format() -> LogFormat {
    LogFormat::Text
}

fn default_cache_total_capacity() -> usize {
    1_049_000
}

fn default_cache_max_object_size() -> usize {
    100 * 1024
}

fn default_max_line_length() -> usize {
    8 * 1024
}

fn default_relay_chunk_size() -> usize {
    8 * 1024
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
    #[serde(default = "default_log_format")]
    pub log: LogFormat,
    #[serde(default = "default_cache_total_capacity")]
    pub cache_total_capacity: usize,
    #[serde(default = "default_cache_max_object_size")]
    pub cache_max_object_size: usize,
    #[serde(default = "default_max_line_length")]
    pub max_line_length: usize,
    #[serde(default = "default_relay_chunk_size")]
    pub relay_chunk_size: usize,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default)]
    pub metrics_listen: Option<SocketAddr>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            log: default_log_format(),
            cache_total_capacity: default_cache_total_capacity(),
            cache_max_object_size: default_cache_max_object_size(),
            max_line_length: default_max_line_length(),
            relay_chunk_size: default_relay_chunk_size(),
            user_agent: default_user_agent(),
            metrics_listen: None,
        }
    }
}

impl Settings {
    /// Layer the optional config file, `RELAYCACHE__*` environment variables and the command
    /// line, in that order of precedence.
    pub fn load(cli: &Cli) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(config_path) = resolve_config_path(cli) {
            builder = builder.add_source(File::from(config_path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("RELAYCACHE")
                .separator("__")
                .try_parsing(true),
        );

        let cfg = builder.build().map_err(to_anyhow)?;
        let mut settings: Settings = cfg.try_deserialize().map_err(to_anyhow)?;
        settings.apply_cli(cli);
        settings.validate()?;
        Ok(settings)
    }

    fn apply_cli(&mut self, cli: &Cli) {
        if let Some(port) = cli.port {
            self.listen.set_port(port);
        }
        if let Some(log) = cli.log {
            self.log = log;
        }
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.cache_total_capacity > 0,
            "cache_total_capacity must be greater than 0 (got {})",
            self.cache_total_capacity
        );
        ensure!(
            self.cache_max_object_size > 0,
            "cache_max_object_size must be greater than 0 (got {})",
            self.cache_max_object_size
        );
        ensure!(
            self.cache_max_object_size <= self.cache_total_capacity,
            "cache_max_object_size ({}) must not exceed cache_total_capacity ({})",
            self.cache_max_object_size,
            self.cache_total_capacity
        );
        ensure!(
            self.max_line_length > 0,
            "max_line_length must be greater than 0 (got {})",
            self.max_line_length
        );
        ensure!(
            self.relay_chunk_size > 0,
            "relay_chunk_size must be greater than 0 (got {})",
            self.relay_chunk_size
        );
        ensure!(
            !self.user_agent.trim().is_empty(),
            "user_agent must not be empty"
        );
        ensure!(
            !self.user_agent.contains(['\r', '\n']),
            "user_agent must not contain line breaks"
        );
        Ok(())
    }
}

fn to_anyhow(err: ConfigError) -> anyhow::Error {
    anyhow!(err)
}

impl Cli {
    pub fn config_path(&self) -> Option<&Path> {
        self.config.as_deref()
    }
}

fn resolve_config_path(cli: &Cli) -> Option<PathBuf> {
    if let Some(path) = cli.config_path() {
        return Some(path.to_path_buf());
    }
    default_config_candidates()
        .into_iter()
        .find(|candidate| candidate.exists())
}

fn default_config_candidates() -> [PathBuf; 2] {
    [
        PathBuf::from("/etc/relaycache/relaycache.toml"),
        PathBuf::from("relaycache.toml"),
    ]
}
