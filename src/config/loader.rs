//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::AgentConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable overriding `network.rpc_url`.
pub const RPC_URL_ENV_VAR: &str = "CUSTODY_RPC_URL";
/// Environment variable overriding `network.ws_url`.
pub const WS_URL_ENV_VAR: &str = "CUSTODY_WS_URL";
/// Environment variable overriding `withdrawal.destination` (and enabling the withdrawal).
pub const DESTINATION_ENV_VAR: &str = "CUSTODY_WITHDRAW_DESTINATION";
/// Environment variable overriding `withdrawal.amount_lamports`.
pub const LAMPORTS_ENV_VAR: &str = "CUSTODY_WITHDRAW_LAMPORTS";
/// Environment variable overriding `observability.log_level`.
pub const LOG_LEVEL_ENV_VAR: &str = "CUSTODY_LOG_LEVEL";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value in {var}: {message}")]
    Env { var: &'static str, message: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse a TOML file. Missing sections and fields take their defaults.
pub fn read_config(path: &Path) -> Result<AgentConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Load from `path` (or defaults), apply process environment overrides, then validate.
pub fn load(path: Option<&Path>) -> Result<AgentConfig, ConfigError> {
    load_with_env(path, |var| std::env::var(var).ok())
}

fn load_with_env<F>(path: Option<&Path>, lookup: F) -> Result<AgentConfig, ConfigError>
where
    F: Fn(&'static str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => read_config(path)?,
        None => AgentConfig::default(),
    };

    apply_env_overrides(&mut config, lookup)?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    tracing::debug!(from_file = path.is_some(), "Configuration loaded");
    Ok(config)
}

/// Apply overrides from an environment lookup.
pub fn apply_env_overrides<F>(config: &mut AgentConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&'static str) -> Option<String>,
{
    if let Some(url) = lookup(RPC_URL_ENV_VAR) {
        config.network.rpc_url = url;
    }
    if let Some(url) = lookup(WS_URL_ENV_VAR) {
        config.network.ws_url = url;
    }
    if let Some(destination) = lookup(DESTINATION_ENV_VAR) {
        config.withdrawal.destination = destination;
        config.withdrawal.enabled = true;
    }
    if let Some(lamports) = lookup(LAMPORTS_ENV_VAR) {
        config.withdrawal.amount_lamports = lamports.trim().parse().map_err(|e| ConfigError::Env {
            var: LAMPORTS_ENV_VAR,
            message: format!("'{}': {}", lamports, e),
        })?;
    }
    if let Some(level) = lookup(LOG_LEVEL_ENV_VAR) {
        config.observability.log_level = level;
    }
    Ok(())
}
