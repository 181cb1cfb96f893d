use std::collections::HashSet;

use super::{AppConfig, ConfigError};

pub(crate) const VALID_LOG_LEVELS: [&str; 6] =
    ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL", "DISABLED"];

/// Validate the full application config, returning an error if any rule is violated.
///
/// # Errors
///
/// Returns [`ConfigError::Validation`] when any configuration invariant is violated.
pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    validate_server_config(config)?;
    validate_allowed_keys(config)?;
    validate_upstream(config)?;
    validate_models(config)?;
    validate_features(config)?;
    Ok(())
}

fn validation_err(msg: impl Into<String>) -> ConfigError {
    ConfigError::Validation(msg.into())
}

fn validate_server_config(config: &AppConfig) -> Result<(), ConfigError> {
    let server = &config.server;
    if server.timeout == 0 {
        return Err(validation_err("server.timeout must be greater than 0"));
    }
    if server.runtime_worker_threads == Some(0) {
        return Err(validation_err(
            "server.runtime_worker_threads must be greater than 0 when set",
        ));
    }
    Ok(())
}

fn validate_allowed_keys(config: &AppConfig) -> Result<(), ConfigError> {
    for key in &config.client_authentication.allowed_keys {
        if key.trim().is_empty() {
            return Err(validation_err("allowed_keys contains an empty key"));
        }
    }
    Ok(())
}

fn validate_upstream(config: &AppConfig) -> Result<(), ConfigError> {
    let upstream = &config.upstream;
    let parsed = url::Url::parse(&upstream.base_url).map_err(|err| {
        validation_err(format!("upstream.base_url is not a valid URL: {err}"))
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(validation_err(
            "upstream.base_url must start with http:// or https://",
        ));
    }
    if !upstream.stream_path.starts_with('/') {
        return Err(validation_err("upstream.stream_path must start with '/'"));
    }
    if upstream
        .access_token
        .as_deref()
        .is_some_and(|token| token.trim().is_empty())
    {
        return Err(validation_err(
            "upstream.access_token cannot be empty when set",
        ));
    }
    if upstream.token_cache_path.trim().is_empty() {
        return Err(validation_err("upstream.token_cache_path cannot be empty"));
    }
    if upstream.token_cache_key.trim().is_empty() {
        return Err(validation_err("upstream.token_cache_key cannot be empty"));
    }
    if upstream.token_ttl_secs == 0 {
        return Err(validation_err(
            "upstream.token_ttl_secs must be greater than 0",
        ));
    }
    Ok(())
}

fn validate_models(config: &AppConfig) -> Result<(), ConfigError> {
    if config.models.is_empty() {
        return Err(validation_err("models cannot be empty"));
    }
    let mut seen = HashSet::new();
    for model in &config.models {
        if model.id.trim().is_empty() {
            return Err(validation_err("model id cannot be empty"));
        }
        if !seen.insert(model.id.as_str()) {
            return Err(validation_err(format!(
                "duplicate model entry '{}'",
                model.id
            )));
        }
    }
    if !seen.contains(config.features.default_model.as_str()) {
        return Err(validation_err(format!(
            "features.default_model '{}' is not listed in models",
            config.features.default_model
        )));
    }
    Ok(())
}

fn validate_features(config: &AppConfig) -> Result<(), ConfigError> {
    if !VALID_LOG_LEVELS.contains(&config.features.log_level.to_uppercase().as_str()) {
        return Err(validation_err(format!(
            "log_level must be one of {VALID_LOG_LEVELS:?}"
        )));
    }
    Ok(())
}
