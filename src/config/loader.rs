//! Configuration loading from disk and environment.

use std::env;
use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::{GatewayConfig, SessionBackend};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load, apply environment overrides, and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: GatewayConfig = toml::from_str(&content)?;
    finish(config)
}

/// Start from built-in defaults when no file is given.
pub fn load_default() -> Result<GatewayConfig, ConfigError> {
    finish(GatewayConfig::default())
}

fn finish(mut config: GatewayConfig) -> Result<GatewayConfig, ConfigError> {
    apply_env_overrides(&mut config, |key| env::var(key).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Overlay environment variables onto a parsed config.
///
/// `lookup` is injected so tests do not touch the process environment.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = get("GATEWAY_BIND_ADDRESS") {
        config.listener.bind_address = v;
    }
    if let Some(v) = get("REDIS_URL") {
        config.session.redis_url = Some(v);
        config.session.backend = SessionBackend::Redis;
    }
    if let Some(v) = get("SESSION_PREFIX") {
        config.session.prefix = v;
    }
    if let Some(v) = get("SESSION_TTL_SECS").and_then(|v| parse_or_warn("SESSION_TTL_SECS", &v)) {
        config.session.ttl_secs = v;
    }
    if let Some(v) = get("RATE_LIMIT_REQUESTS")
        .and_then(|v| parse_or_warn("RATE_LIMIT_REQUESTS", &v))
    {
        config.rate_limit.requests = v;
    }
    if let Some(v) = get("RATE_LIMIT_WINDOW_SECS")
        .and_then(|v| parse_or_warn("RATE_LIMIT_WINDOW_SECS", &v))
    {
        config.rate_limit.window_secs = v;
    }
    if let Some(v) = get("REQUEST_TIMEOUT_SECS")
        .and_then(|v| parse_or_warn("REQUEST_TIMEOUT_SECS", &v))
    {
        config.timeouts.request_secs = v;
    }
    if let Some(v) = get("LOG_LEVEL") {
        config.observability.log_level = v;
    }

    for service in &mut config.services {
        let key = format!("{}_SERVICE_URL", service.name.to_uppercase().replace('-', "_"));
        if let Some(v) = get(&key) {
            service.url = v;
        }
    }
}

fn parse_or_warn<T: std::str::FromStr>(key: &str, value: &str) -> Option<T> {
    match value.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value, "Ignoring unparsable environment override");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn env_overrides_replace_file_values() {
        let vars: HashMap<&str, &str> = [
            ("USER_SERVICE_URL", "http://users.internal:9000"),
            ("RATE_LIMIT_REQUESTS", "5"),
            ("REDIS_URL", "redis://cache:6379"),
            ("SESSION_TTL_SECS", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut config = GatewayConfig::default();
        apply_env_overrides(&mut config, |k| vars.get(k).map(|v| v.to_string()));

        let user = config.services.iter().find(|s| s.name == "user").unwrap();
        assert_eq!(user.url, "http://users.internal:9000");
        assert_eq!(config.rate_limit.requests, 5);
        assert_eq!(config.session.backend, SessionBackend::Redis);
        // bad values keep the default
        assert_eq!(config.session.ttl_secs, 24 * 60 * 60);
    }

    #[test]
    fn loads_minimal_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [listener]
            bind_address = "127.0.0.1:9999"

            [rate_limit]
            requests = 3
            window_secs = 60
            "#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.listener.bind_address, "127.0.0.1:9999");
        assert_eq!(config.rate_limit.requests, 3);
        // untouched sections fall back to defaults
        assert_eq!(config.services.len(), 3);
        assert!(!config.routes.is_empty());
    }

    #[test]
    fn rejects_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [[routes]]
            name = "ghost"
            path_prefix = "/ghost"
            target = "missing"
            "#
        )
        .unwrap();

        match load_config(file.path()) {
            Err(ConfigError::Validation(errors)) => {
                assert!(errors.iter().any(|e| e.to_string().contains("missing")));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn example_file_is_valid() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("gateway.example.toml");
        let content = fs::read_to_string(path).unwrap();
        let config: GatewayConfig = toml::from_str(&content).unwrap();

        validate_config(&config).unwrap();
        assert_eq!(config.session.backend, SessionBackend::Redis);
        assert_eq!(config.services.len(), 3);
    }
}
