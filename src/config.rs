use std::net::SocketAddr;

use clap::{Args, Parser, Subcommand};

use crate::error::ConfigError;

pub const DEFAULT_API_URL: &str = "https://dev.api.swiftprotocol.zone";
pub const DEFAULT_PUBLIC_API_URL: &str = "https://api.dev.swiftprotocol.zone";

#[derive(Parser, Debug)]
#[command(version, about = "Swift Protocol example: consent-gated encrypted storage", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP proxy in front of the Swift Protocol API
    Serve(ServeArgs),
    /// Interactive terminal front end talking to a running proxy
    Shell(ShellArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Base URL of the Swift Protocol API
    #[arg(long, env = "SWIFT_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// API key for the Swift Protocol API
    #[arg(long, env = "SWIFT_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// API URL advertised to clients through /api/config
    #[arg(long, env = "NEXT_PUBLIC_SWIFT_API_URL", default_value = DEFAULT_PUBLIC_API_URL)]
    pub public_api_url: String,

    /// Address the proxy listens on
    #[arg(long, env = "SWIFT_EXAMPLE_BIND", default_value = "127.0.0.1:3000")]
    pub bind: SocketAddr,

    #[arg(long, env = "APP_ENV", default_value = "development")]
    pub environment: String,
}

#[derive(Args, Debug, Clone)]
pub struct ShellArgs {
    /// Base URL of a running proxy
    #[arg(long, env = "SWIFT_EXAMPLE_SERVER", default_value = "http://127.0.0.1:3000")]
    pub server: String,
}

/// Connection settings for the Swift Protocol API.
#[derive(Debug, Clone)]
pub struct SwiftConfig {
    pub api_url: String,
    pub api_key: String,
}

impl ServeArgs {
    pub fn swift_config(&self) -> Result<SwiftConfig, ConfigError> {
        let api_key = self
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::MissingApiKey)?;
        Ok(SwiftConfig {
            api_url: self.api_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }
}
