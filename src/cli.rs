use std::path::PathBuf;

use clap::Parser;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Parser)]
#[command(name = "relaycache", about = "Caching forward HTTP proxy")]
pub struct Cli {
    /// Port to listen on; overrides the port of the configured `listen` address.
    pub port: Option<u16>,

    /// Path to a configuration file (defaults to ./relaycache.toml if present).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log output format; overrides the configured `log` value.
    #[arg(long, value_enum)]
    pub log: Option<LogFormat>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Text,
}
