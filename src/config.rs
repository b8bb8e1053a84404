use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Reel client - authenticated access to the Reel video API
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Base URL of the Reel API
    #[arg(short = 'u', long, env = "API_URL", default_value = "http://localhost:5000")]
    pub api_url: String,

    /// Path to the credential file
    #[arg(short = 'c', long, env = "CREDENTIALS_FILE")]
    pub credentials_file: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// HTTP request timeout in seconds
    #[arg(long, env = "HTTP_REQUEST_TIMEOUT", default_value = "10")]
    pub http_timeout: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create an account and sign in
    Signup {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        /// Prompted for when omitted
        #[arg(long, env = "REEL_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Sign in with email and password
    Login {
        #[arg(long)]
        email: String,
        /// Prompted for when omitted
        #[arg(long, env = "REEL_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Sign out and forget stored credentials
    Logout,

    /// Show the signed-in profile
    Me,

    /// List videos
    Dashboard {
        #[arg(long, default_value = "1")]
        page: u32,
        #[arg(long, default_value = "2")]
        limit: u32,
    },

    /// Fetch the stream descriptor for a video
    Stream { video_id: String },

    /// Check a playback token
    Verify { playback_token: String },
}

#[derive(Clone, Debug)]
pub struct Config {
    pub api_url: String,
    pub credentials_file: PathBuf,

    // HTTP client
    pub http_max_connections: usize,
    pub http_connect_timeout: u64,
    pub http_request_timeout: u64,

    pub log_level: String,
}

impl Config {
    /// Load configuration from all sources with priority: CLI > ENV > defaults
    pub fn load() -> Result<(Self, Command)> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let args = CliArgs::parse();

        let credentials_file = match args.credentials_file {
            Some(ref path) => expand_tilde(path),
            None => default_credentials_file()
                .context("Cannot determine a data directory; set CREDENTIALS_FILE")?,
        };

        let config = Config {
            api_url: args.api_url,
            credentials_file,

            http_max_connections: std::env::var("HTTP_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),

            http_connect_timeout: std::env::var("HTTP_CONNECT_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),

            http_request_timeout: args.http_timeout,

            log_level: args.log_level,
        };

        Ok((config, args.command))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            anyhow::bail!("API_URL must start with http:// or https://: {}", self.api_url);
        }

        if self.http_request_timeout == 0 {
            anyhow::bail!("HTTP_REQUEST_TIMEOUT must be greater than zero");
        }

        Ok(())
    }
}

/// `<data dir>/reel-client/credentials.json`
fn default_credentials_file() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("reel-client").join("credentials.json"))
}

/// Expand tilde (~) in file paths to user's home directory
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
