//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (attempts >= 1, timeouts > 0)
//! - Detect conflicting or malformed mounts
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use url::Url;

use crate::config::schema::GatewayConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("listener.bind_address `{0}` is not a socket address")]
    BindAddress(String),

    #[error("origin.base_url `{0}` is not an http(s) URL")]
    OriginUrl(String),

    #[error("mount `{name}`: {reason}")]
    Mount { name: String, reason: &'static str },

    #[error("mount prefix `{0}` is declared twice")]
    DuplicatePrefix(String),

    #[error("retries.max_attempts must be at least 1")]
    ZeroAttempts,

    #[error("timeouts.attempt_ms must be greater than 0")]
    ZeroAttemptTimeout,

    #[error("limits.max_body_bytes must be greater than 0")]
    ZeroBodyLimit,
}

pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    match Url::parse(&config.origin.base_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {}
        _ => errors.push(ValidationError::OriginUrl(config.origin.base_url.clone())),
    }

    let mut seen = HashSet::new();
    for mount in config.effective_mounts() {
        let reason = if !mount.prefix.starts_with('/') {
            Some("prefix must start with `/`")
        } else if mount.prefix == "/" {
            Some("prefix must not be the root path")
        } else if mount.prefix.ends_with('/') {
            Some("prefix must not end with `/`")
        } else if !mount.upstream_prefix.starts_with('/') {
            Some("upstream_prefix must start with `/`")
        } else {
            None
        };
        if let Some(reason) = reason {
            errors.push(ValidationError::Mount {
                name: mount.name.clone(),
                reason,
            });
        }
        if !seen.insert(mount.prefix.clone()) {
            errors.push(ValidationError::DuplicatePrefix(mount.prefix));
        }
    }

    if config.retries.max_attempts == 0 {
        errors.push(ValidationError::ZeroAttempts);
    }
    if config.timeouts.attempt_ms == 0 {
        errors.push(ValidationError::ZeroAttemptTimeout);
    }
    if config.limits.max_body_bytes == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
