//! CLI for the vox API client.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use vox_core::config;

use commands::{run_config, run_request, run_schedule};

/// Top-level CLI for the vox speech-synthesis API client.
#[derive(Debug, Parser)]
#[command(name = "vox")]
#[command(about = "vox: resilient client for a speech-synthesis REST API", long_about = None)]
pub struct Cli {
    /// Read configuration from this file instead of ~/.config/vox/config.toml.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Send one API request (with retries) and print the response body.
    Request {
        /// HTTP method, e.g. GET, POST, DELETE.
        method: String,
        /// Path relative to the base URL, e.g. /v1/voices.
        path: String,
        /// JSON request body.
        #[arg(long, value_name = "JSON")]
        data: Option<String>,
        /// API key for this call (overrides the config file).
        #[arg(long, value_name = "KEY")]
        api_key: Option<String>,
    },

    /// Print the backoff delays the retry policy would use (without jitter).
    Schedule {
        /// Override the configured number of attempts.
        #[arg(long, value_name = "N")]
        attempts: Option<u32>,
    },

    /// Show the effective configuration with secrets masked.
    Config,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = match &cli.config {
            Some(path) => config::load_from(path)?,
            None => config::load_or_init()?,
        };
        tracing::debug!(
            base_url = %cfg.base_url,
            max_attempts = cfg.retry.max_attempts,
            "loaded config"
        );

        match cli.command {
            CliCommand::Request {
                method,
                path,
                data,
                api_key,
            } => run_request(&cfg, &method, &path, data.as_deref(), api_key).await?,
            CliCommand::Schedule { attempts } => run_schedule(&cfg, attempts)?,
            CliCommand::Config => run_config(&cfg, cli.config.as_deref())?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
