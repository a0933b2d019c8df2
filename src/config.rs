//! Configuration management for the deployer
//!
//! Loads configuration from TOML files with environment variable substitution.

use anyhow::{Context, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

lazy_static! {
    static ref ENV_VAR: Regex = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap();
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub node: NodeConfig,
    #[serde(default)]
    pub submitter: SubmitterConfig,
    #[serde(default)]
    pub wallet: WalletConfig,
    pub contract: ContractConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    pub rpc_url: String,
    /// Refuse to run against any other chain when set
    pub expected_chain_id: Option<u64>,
    #[serde(default = "default_request_interval_ms")]
    pub request_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SubmitterConfig {
    pub poll_interval_ms: u64,
    pub confirmation_timeout_secs: u64,
    pub broadcast_timeout_secs: u64,
    pub gas_limit_buffer_percent: u64,
    pub gas_price_buffer_percent: u64,
}

impl Default for SubmitterConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1_000,
            confirmation_timeout_secs: 60,
            broadcast_timeout_secs: 30,
            gas_limit_buffer_percent: 20,
            gas_price_buffer_percent: 0,
        }
    }
}

impl SubmitterConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }

    pub fn broadcast_timeout(&self) -> Duration {
        Duration::from_secs(self.broadcast_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    pub private_key_env: String,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            private_key_env: "PRIVATE_KEY".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContractConfig {
    pub artifact_path: PathBuf,
    pub initial_greeting: String,
    pub updated_greeting: String,
}

fn default_request_interval_ms() -> u64 {
    100
}

impl Settings {
    /// Load settings from the configured file
    pub fn load() -> Result<Self> {
        let config_path = env::var("DEPLOYER_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/default.toml"));

        Self::load_from(&config_path)
    }

    /// Load settings from a specific file
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        Self::parse(&config_str)
    }

    /// Parse settings from TOML text
    pub fn parse(config_str: &str) -> Result<Self> {
        // Substitute environment variables
        let config_str = substitute_env_vars(config_str);

        let settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.node.rpc_url.trim().is_empty() {
            anyhow::bail!("node.rpc_url must not be empty");
        }

        if self.submitter.poll_interval_ms == 0 {
            anyhow::bail!("submitter.poll_interval_ms must be greater than zero");
        }

        if self.submitter.confirmation_timeout() <= self.submitter.poll_interval() {
            anyhow::bail!("submitter.confirmation_timeout_secs must exceed the poll interval");
        }

        if self.wallet.private_key_env.trim().is_empty() {
            anyhow::bail!("wallet.private_key_env must name an environment variable");
        }

        Ok(())
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    ENV_VAR
        .replace_all(input, |cap: &regex::Captures| {
            env::var(&cap[1]).unwrap_or_default()
        })
        .into_owned()
}
