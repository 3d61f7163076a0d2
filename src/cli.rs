// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

use crate::config::RawConfigFile;

/// Command-line arguments for `skillwatch`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "skillwatch",
    version,
    about = "Keep a local copy of skills in sync with a remote configuration store.",
    long_about = None
)]
pub struct CliArgs {
    /// Skills to synchronize.
    #[arg(value_name = "SKILL", required_unless_present = "all")]
    pub skills: Vec<String>,

    /// Synchronize every skill in the namespace.
    #[arg(long, conflicts_with = "skills")]
    pub all: bool,

    /// Path to the config file (TOML).
    ///
    /// Default: `skillwatch.toml` in the current working directory, if present.
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Store host, optionally with `:port`.
    #[arg(long, env = "SKILLWATCH_HOST")]
    pub host: Option<String>,

    #[arg(long)]
    pub port: Option<u16>,

    #[arg(long, short = 'n')]
    pub namespace: Option<String>,

    #[arg(long, short = 'u', env = "SKILLWATCH_USERNAME")]
    pub username: Option<String>,

    #[arg(long, short = 'p', env = "SKILLWATCH_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Root directory of the local mirror (default `~/.skills`).
    #[arg(long, short = 'o', value_name = "DIR")]
    pub output_dir: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `SKILLWATCH_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

impl CliArgs {
    /// Overlay flags given on the command line onto a file configuration.
    pub fn apply_overrides(&self, raw: &mut RawConfigFile) {
        if let Some(host) = &self.host {
            raw.server.host = Some(host.clone());
        }
        if let Some(port) = self.port {
            raw.server.port = Some(port);
        }
        if let Some(namespace) = &self.namespace {
            raw.server.namespace = namespace.clone();
        }
        if let Some(username) = &self.username {
            raw.server.username = Some(username.clone());
        }
        if let Some(password) = &self.password {
            raw.server.password = Some(password.clone());
        }
        if let Some(dir) = &self.output_dir {
            raw.sync.output_dir = Some(dir.clone());
        }
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
