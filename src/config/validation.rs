//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (routes reference existing services)
//! - Validate value ranges (timeouts > 0, budgets > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;

use axum::http::Method;
use thiserror::Error;
use url::Url;

use crate::config::schema::{GatewayConfig, SessionBackend};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no services configured")]
    NoServices,

    #[error("duplicate service name '{0}'")]
    DuplicateService(String),

    #[error("service '{name}' has invalid url '{url}': {reason}")]
    InvalidServiceUrl { name: String, url: String, reason: String },

    #[error("route '{route}' targets unknown service '{target}'")]
    UnknownTarget { route: String, target: String },

    #[error("route '{route}' prefix '{prefix}' must start with '/'")]
    InvalidPrefix { route: String, prefix: String },

    #[error("route '{route}' has invalid method '{method}'")]
    InvalidMethod { route: String, method: String },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("session backend 'redis' requires session.redis_url")]
    MissingRedisUrl,

    #[error("credential service '{0}' is not configured")]
    UnknownCredentialService(String),

    #[error("auth mount path '{0}' must start with '/'")]
    InvalidMountPath(String),
}

pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.services.is_empty() {
        errors.push(ValidationError::NoServices);
    }

    let mut names = HashSet::new();
    for service in &config.services {
        if !names.insert(service.name.as_str()) {
            errors.push(ValidationError::DuplicateService(service.name.clone()));
        }
        if let Err(reason) = check_service_url(&service.url) {
            errors.push(ValidationError::InvalidServiceUrl {
                name: service.name.clone(),
                url: service.url.clone(),
                reason,
            });
        }
    }

    for route in &config.routes {
        if !names.contains(route.target.as_str()) {
            errors.push(ValidationError::UnknownTarget {
                route: route.name.clone(),
                target: route.target.clone(),
            });
        }
        if !route.path_prefix.starts_with('/') {
            errors.push(ValidationError::InvalidPrefix {
                route: route.name.clone(),
                prefix: route.path_prefix.clone(),
            });
        }
        for method in &route.methods {
            if Method::from_bytes(method.to_uppercase().as_bytes()).is_err() {
                errors.push(ValidationError::InvalidMethod {
                    route: route.name.clone(),
                    method: method.clone(),
                });
            }
        }
    }

    let positive = [
        ("session.ttl_secs", config.session.ttl_secs),
        ("session.purge_interval_secs", config.session.purge_interval_secs),
        ("rate_limit.requests", u64::from(config.rate_limit.requests)),
        ("rate_limit.window_secs", config.rate_limit.window_secs),
        ("rate_limit.max_clients", config.rate_limit.max_clients as u64),
        ("rate_limit.sweep_interval_secs", config.rate_limit.sweep_interval_secs),
        ("timeouts.request_secs", config.timeouts.request_secs),
        ("timeouts.upstream_secs", config.timeouts.upstream_secs),
        ("timeouts.health_probe_secs", config.timeouts.health_probe_secs),
        ("timeouts.credential_check_secs", config.timeouts.credential_check_secs),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }

    if config.session.backend == SessionBackend::Redis && config.session.redis_url.is_none() {
        errors.push(ValidationError::MissingRedisUrl);
    }

    if !names.contains(config.auth.credential_service.as_str()) {
        errors.push(ValidationError::UnknownCredentialService(
            config.auth.credential_service.clone(),
        ));
    }
    if !config.auth.mount_path.starts_with('/') {
        errors.push(ValidationError::InvalidMountPath(config.auth.mount_path.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_service_url(raw: &str) -> Result<(), String> {
    let url = Url::parse(raw).map_err(|e| e.to_string())?;
    if url.scheme() != "http" {
        return Err(format!("unsupported scheme '{}'", url.scheme()));
    }
    if url.host_str().is_none() {
        return Err("missing host".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{AuthRequirement, RouteConfig, ServiceConfig};

    #[test]
    fn defaults_are_valid() {
        assert_eq!(validate_config(&GatewayConfig::default()), Ok(()));
    }

    #[test]
    fn collects_every_problem() {
        let mut config = GatewayConfig::default();
        config.services.push(ServiceConfig::new("user", "https://elsewhere"));
        config.routes.push(RouteConfig::new("bad", "nope", AuthRequirement::None, "ghost"));
        config.rate_limit.window_secs = 0;
        config.session.backend = SessionBackend::Redis;

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::DuplicateService("user".into())));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::InvalidServiceUrl { .. })));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::UnknownTarget { .. })));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::InvalidPrefix { .. })));
        assert!(errors.contains(&ValidationError::Zero { field: "rate_limit.window_secs" }));
        assert!(errors.contains(&ValidationError::MissingRedisUrl));
    }
}
