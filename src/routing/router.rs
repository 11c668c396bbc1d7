//! Route lookup.
//!
//! # Responsibilities
//! - Store compiled routes
//! - Look up the matching route for a method + path
//! - Return matched route or an explicit no-match
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - Longest matching prefix wins; equal prefixes fall back to declaration order
//! - O(n) prefix scan (acceptable for typical route counts)
//! - A path that matches but with the wrong method is 405, not 404

use axum::http::Method;

use crate::config::{AuthRequirement, RouteConfig};
use crate::error::GatewayError;
use crate::routing::matcher::{Matcher, MethodMatcher, PathPrefixMatcher};

/// A compiled route descriptor.
#[derive(Debug)]
pub struct Route {
    pub name: String,
    pub auth: AuthRequirement,
    pub target: String,
    path: PathPrefixMatcher,
    methods: MethodMatcher,
    strip_prefix: Option<String>,
}

impl Route {
    pub fn from_config(config: &RouteConfig) -> Result<Self, String> {
        let methods = config
            .methods
            .iter()
            .map(|m| {
                Method::from_bytes(m.to_uppercase().as_bytes())
                    .map_err(|_| format!("route '{}': invalid method '{}'", config.name, m))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let path = if config.exact {
            PathPrefixMatcher::exact(&config.path_prefix)
        } else {
            PathPrefixMatcher::new(&config.path_prefix)
        };

        Ok(Self {
            name: config.name.clone(),
            auth: config.auth,
            target: config.target.clone(),
            path,
            methods: MethodMatcher::new(methods),
            strip_prefix: config.strip_prefix.clone(),
        })
    }

    pub fn prefix(&self) -> &str {
        self.path.prefix()
    }

    /// Path sent upstream. Never empty.
    pub fn rewrite_path(&self, path: &str) -> String {
        let rewritten = match &self.strip_prefix {
            Some(prefix) => path.strip_prefix(prefix.as_str()).unwrap_or(path),
            None => path,
        };
        if rewritten.is_empty() {
            "/".to_string()
        } else if rewritten.starts_with('/') {
            rewritten.to_string()
        } else {
            format!("/{}", rewritten)
        }
    }
}

/// Immutable, ordered route table.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new(routes: Vec<Route>) -> Self {
        Self { routes }
    }

    pub fn from_config(configs: &[RouteConfig]) -> Result<Self, String> {
        let routes = configs
            .iter()
            .map(Route::from_config)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(routes))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Resolve a request to its route. Pure: depends only on the table and inputs.
    pub fn resolve(&self, method: &Method, path: &str) -> Result<&Route, GatewayError> {
        let mut best: Option<&Route> = None;
        let mut path_matched = false;

        for route in &self.routes {
            if !route.path.matches(method, path) {
                continue;
            }
            path_matched = true;
            if !route.methods.matches(method, path) {
                continue;
            }
            // strict comparison keeps the earlier route on ties
            if best.map_or(true, |b| route.path.specificity() > b.path.specificity()) {
                best = Some(route);
            }
        }

        match best {
            Some(route) => Ok(route),
            None if path_matched => Err(GatewayError::MethodNotAllowed {
                method: method.clone(),
                path: path.to_string(),
            }),
            None => Err(GatewayError::RouteNotFound {
                path: path.to_string(),
            }),
        }
    }
}
