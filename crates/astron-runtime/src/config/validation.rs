//! Configuration validation utilities.

use std::collections::HashSet;

use astron_core::util::has_whitespace;

use super::error::{ConfigError, ConfigResult};
use super::schema::{AstronConfig, LogOutput, LoggingConfig, RouterConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &AstronConfig) -> ConfigResult<()> {
    validate_logging_config(&config.logging)?;
    validate_router_config(&config.router)?;
    Ok(())
}

/// Validates logging settings.
fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }

    if logging.max_files == 0 {
        return Err(ConfigError::validation("logging.max_files must be at least 1"));
    }

    if let Some(module) = logging.filters.keys().find(|m| m.trim().is_empty()) {
        return Err(ConfigError::validation(format!(
            "Invalid log filter target: {module:?}"
        )));
    }

    Ok(())
}

/// Validates router settings.
fn validate_router_config(router: &RouterConfig) -> ConfigResult<()> {
    if router.directory.is_none() {
        return Err(ConfigError::missing_field("router.directory"));
    }

    let mention_possible = router.allow_mention_prefix && router.self_id.is_some();
    if router.prefix.is_empty() && !mention_possible {
        return Err(ConfigError::validation(
            "router.prefix is empty and mention addressing is unavailable",
        ));
    }

    let extension = router.source_extension.trim_start_matches('.');
    if extension.is_empty() || has_whitespace(extension) {
        return Err(ConfigError::validation(format!(
            "Invalid source extension: {:?}",
            router.source_extension
        )));
    }

    if router.response_permission.trim().is_empty() {
        return Err(ConfigError::missing_field("router.response_permission"));
    }

    let mut seen = HashSet::new();
    for owner in &router.owners {
        if owner.is_empty() || has_whitespace(owner) {
            return Err(ConfigError::validation(format!("Invalid owner id: {owner:?}")));
        }
        if !seen.insert(owner) {
            return Err(ConfigError::validation(format!("Duplicate owner id: {owner}")));
        }
    }

    Ok(())
}
