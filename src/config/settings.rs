//! Server settings for EnvelopeAPI
//!
//! Settings are read once at process start from command-line flags, falling
//! back to environment variables (a `.env` file is loaded first by `main`).

use std::path::PathBuf;

use clap::Parser;

use super::paths::EnvelopePaths;

/// Default data directory when none is configured
pub const DEFAULT_DATA_DIR: &str = "./actual-data";

/// Server and client settings
#[derive(Parser, Debug, Clone)]
#[command(
    name = "envelope-api",
    author = "Kaylee Beyene",
    version,
    about = "HTTP JSON API for envelope budgeting data",
    long_about = "EnvelopeAPI serves budgeting data (accounts, transactions, categories, \
                  payees, rules and monthly budgets) over a JSON HTTP API. The budget \
                  client is started lazily on the first API request."
)]
pub struct Settings {
    /// Address to bind the HTTP server to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 3001)]
    pub port: u16,

    /// Directory holding local budget data
    #[arg(long, env = "ENVELOPE_DATA_DIR", default_value = DEFAULT_DATA_DIR)]
    pub data_dir: PathBuf,

    /// Sync server URL (optional)
    #[arg(long, env = "ENVELOPE_SERVER_URL")]
    pub server_url: Option<String>,

    /// Sync server password (optional)
    #[arg(long, env = "ENVELOPE_SERVER_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Budget to load on startup (local id or sync file id)
    #[arg(long, env = "ENVELOPE_BUDGET_ID")]
    pub budget_id: Option<String>,
}

impl Settings {
    /// Socket address string to bind
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Client configuration handed to the connector on bootstrap
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            data_dir: self.data_dir.clone(),
            server_url: non_empty(self.server_url.as_deref()),
            password: non_empty(self.password.as_deref()),
            budget_id: non_empty(self.budget_id.as_deref()),
        }
    }
}

/// Configuration for starting a budget client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Local data directory
    pub data_dir: PathBuf,
    /// Optional sync server URL
    pub server_url: Option<String>,
    /// Optional sync server password
    pub password: Option<String>,
    /// Optional preferred budget id
    pub budget_id: Option<String>,
}

impl ClientConfig {
    /// Local-only configuration rooted at a data directory
    pub fn local(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            server_url: None,
            password: None,
            budget_id: None,
        }
    }

    /// Path layout for the data directory
    pub fn paths(&self) -> EnvelopePaths {
        EnvelopePaths::with_base_dir(self.data_dir.clone())
    }
}

// Empty env vars (e.g. `ENVELOPE_BUDGET_ID=`) count as unset.
fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
