//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (limits and timeouts > 0, addresses parse)
//! - Compile every rewrite pattern up front
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::rewrite::{ByteRewriteRule, RewriteError, RewriteRule};

/// A single semantic problem in a configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field}: {value:?} is not a socket address")]
    Address { field: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("rewrite.{set}[{index}]: {source}")]
    Rule {
        set: &'static str,
        index: usize,
        #[source]
        source: RewriteError,
    },
}

/// Check a parsed configuration, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(
        &mut errors,
        "listener.bind_address",
        &config.listener.bind_address,
    );
    if config.observability.metrics_enabled {
        check_address(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    let non_zero = [
        ("listener.max_connections", config.listener.max_connections as u64),
        ("listener.max_request_bytes", config.listener.max_request_bytes as u64),
        ("proxy.origin_port", u64::from(config.proxy.origin_port)),
        ("timeouts.connect_secs", config.timeouts.connect_secs),
        ("timeouts.read_secs", config.timeouts.read_secs),
    ];
    for (field, value) in non_zero {
        if value == 0 {
            errors.push(ValidationError::Zero(field));
        }
    }

    for (index, rule) in config.rewrite.request.iter().enumerate() {
        if let Err(source) = RewriteRule::new(&rule.pattern, rule.replacement.as_str()) {
            errors.push(ValidationError::Rule {
                set: "request",
                index,
                source,
            });
        }
    }
    for (index, rule) in config.rewrite.response.iter().enumerate() {
        if let Err(source) = ByteRewriteRule::new(&rule.pattern, rule.replacement.as_str()) {
            errors.push(ValidationError::Rule {
                set: "response",
                index,
                source,
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::Address {
            field,
            value: value.to_string(),
        });
    }
}
