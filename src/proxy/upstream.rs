//! Named upstream services.

use std::collections::HashMap;

use axum::http::Uri;
use url::Url;

use crate::config::ServiceConfig;

/// A named upstream with its base address.
#[derive(Debug, Clone)]
pub struct Upstream {
    pub name: String,
    base: String,
}

impl Upstream {
    pub fn new(name: impl Into<String>, base: &Url) -> Self {
        Self {
            name: name.into(),
            base: base.as_str().trim_end_matches('/').to_string(),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// Absolute URI for `path` (and optional query) on this upstream.
    pub fn target_uri(&self, path: &str, query: Option<&str>) -> Result<Uri, axum::http::uri::InvalidUri> {
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        };
        let target = match query {
            Some(q) if !q.is_empty() => format!("{}{}?{}", self.base, path, q),
            _ => format!("{}{}", self.base, path),
        };
        target.parse()
    }
}

/// Immutable name → upstream table.
#[derive(Debug, Clone, Default)]
pub struct UpstreamRegistry {
    upstreams: HashMap<String, Upstream>,
    order: Vec<String>,
}

impl UpstreamRegistry {
    pub fn from_config(services: &[ServiceConfig]) -> Result<Self, String> {
        let mut registry = Self::default();
        for service in services {
            let url = Url::parse(&service.url)
                .map_err(|e| format!("service '{}': {}", service.name, e))?;
            registry.order.push(service.name.clone());
            registry
                .upstreams
                .insert(service.name.clone(), Upstream::new(&service.name, &url));
        }
        Ok(registry)
    }

    pub fn get(&self, name: &str) -> Option<&Upstream> {
        self.upstreams.get(name)
    }

    /// Upstreams in configuration order.
    pub fn iter(&self) -> impl Iterator<Item = &Upstream> {
        self.order.iter().filter_map(|name| self.upstreams.get(name))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
