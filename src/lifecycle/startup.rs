//! Startup orchestration.
//!
//! # Responsibilities
//! - Resolve configuration: defaults < file < environment < command line
//! - Validate before anything binds
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listeners start last (traffic only when ready)

use std::path::Path;

use crate::config::loader::{apply_env_overrides, read_config};
use crate::config::validation::validate_config;
use crate::config::{ConfigError, GatewayConfig};

/// Values given on the command line; they override everything else.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub bind_address: Option<String>,
    pub backend_url: Option<String>,
}

/// Build the effective configuration.
pub fn resolve_config<F>(
    path: Option<&Path>,
    overrides: &Overrides,
    env: F,
) -> Result<GatewayConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => read_config(path)?,
        None => GatewayConfig::default(),
    };
    apply_env_overrides(&mut config, env);

    if let Some(bind) = &overrides.bind_address {
        config.listener.bind_address = bind.clone();
    }
    if let Some(url) = &overrides.backend_url {
        config.origin.base_url = url.clone();
    }

    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}
