//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check endpoint URL schemes
//! - Validate value ranges (timeouts > 0, amount > 0, delays ordered)
//! - Check the withdrawal destination is a valid public key
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AgentConfig → Result<(), Vec<ValidationError>>

use thiserror::Error;

use crate::blockchain::keys::Pubkey;
use crate::config::schema::AgentConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

fn check_url(
    errors: &mut Vec<ValidationError>,
    field: &'static str,
    value: &str,
    schemes: &[&str],
) {
    match url::Url::parse(value) {
        Ok(url) if schemes.contains(&url.scheme()) => {}
        Ok(url) => errors.push(ValidationError::new(
            field,
            format!("scheme '{}' not allowed, expected one of {:?}", url.scheme(), schemes),
        )),
        Err(e) => errors.push(ValidationError::new(
            field,
            format!("invalid URL '{}': {}", value, e),
        )),
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &AgentConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let network = &config.network;
    check_url(&mut errors, "network.rpc_url", &network.rpc_url, &["http", "https"]);
    for url in &network.failover_urls {
        check_url(&mut errors, "network.failover_urls", url, &["http", "https"]);
    }
    check_url(&mut errors, "network.ws_url", &network.ws_url, &["ws", "wss"]);
    if network.rpc_timeout_secs == 0 {
        errors.push(ValidationError::new("network.rpc_timeout_secs", "must be greater than zero"));
    }

    let withdrawal = &config.withdrawal;
    if withdrawal.enabled {
        if let Err(e) = withdrawal.destination.parse::<Pubkey>() {
            errors.push(ValidationError::new("withdrawal.destination", e.to_string()));
        }
        if withdrawal.amount_lamports == 0 {
            errors.push(ValidationError::new(
                "withdrawal.amount_lamports",
                "must be greater than zero",
            ));
        }
    }

    let monitor = &config.monitor;
    if monitor.reconnect_base_delay_ms == 0 {
        errors.push(ValidationError::new(
            "monitor.reconnect_base_delay_ms",
            "must be greater than zero",
        ));
    }
    if monitor.reconnect_base_delay_ms > monitor.reconnect_max_delay_ms {
        errors.push(ValidationError::new(
            "monitor.reconnect_max_delay_ms",
            "must be at least reconnect_base_delay_ms",
        ));
    }
    if monitor.max_consecutive_receive_errors == 0 {
        errors.push(ValidationError::new(
            "monitor.max_consecutive_receive_errors",
            "must be greater than zero",
        ));
    }

    let observability = &config.observability;
    if observability.metrics_enabled
        && observability.metrics_address.parse::<std::net::SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("invalid socket address '{}'", observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
