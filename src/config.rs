use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

/// Default base URL of the chat platform's REST API.
const DEFAULT_API_BASE: &str = "https://gateway.example.com/api";

#[derive(Clone)]
pub struct Config {
    pub gateway_token: String,
    pub gateway_signing_secret: String,
    pub gateway_api_base: String,
    pub port: u16,
    /// Directory for persistent state (SQLite database).
    /// Defaults to current working directory.
    pub state_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let gateway_token = env::var("GATEWAY_TOKEN")
            .context("GATEWAY_TOKEN environment variable is required")?;

        let gateway_signing_secret = env::var("GATEWAY_SIGNING_SECRET")
            .context("GATEWAY_SIGNING_SECRET environment variable is required")?;

        let gateway_api_base =
            env::var("GATEWAY_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string());

        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .context("PORT must be a valid number")?;

        let state_dir = env::var("STATE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."));

        Ok(Config {
            gateway_token,
            gateway_signing_secret,
            gateway_api_base,
            port,
            state_dir,
        })
    }

    /// Path of the ratings database inside the state directory.
    pub fn database_path(&self) -> PathBuf {
        self.state_dir.join("ratings.db")
    }
}
