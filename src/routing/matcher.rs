//! Route matching logic.
//!
//! # Responsibilities
//! - Match path prefix on segment boundaries (case-sensitive)
//! - Match request method against an allowed set
//! - A route matches when both its path and method conditions hold
//!
//! # Design Decisions
//! - Path matching is case-sensitive and segment aware: `/api/v1/users`
//!   matches `/api/v1/users/7` but not `/api/v1/usersettings`
//! - Empty method set = always matches (wildcard)
//! - No regex to guarantee O(n) matching
//! - Paths with `.` or `..` segments are never matched; the dispatcher rejects
//!   them before lookup since an upstream would resolve them past the prefix

use axum::http::Method;

/// Trait for matching requests against conditions.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns true if the method and path satisfy this condition.
    fn matches(&self, method: &Method, path: &str) -> bool;
}

/// Matches the request path prefix.
#[derive(Debug, Clone)]
pub struct PathPrefixMatcher {
    prefix: String,
    exact: bool,
}

impl PathPrefixMatcher {
    /// Create a new path prefix matcher. A trailing slash on the prefix is ignored.
    pub fn new(prefix: impl Into<String>) -> Self {
        let mut prefix = prefix.into();
        while prefix.len() > 1 && prefix.ends_with('/') {
            prefix.pop();
        }
        Self {
            prefix,
            exact: false,
        }
    }

    /// Match only the prefix itself (with or without a trailing slash).
    pub fn exact(prefix: impl Into<String>) -> Self {
        Self {
            exact: true,
            ..Self::new(prefix)
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Length used to rank overlapping prefixes.
    pub fn specificity(&self) -> usize {
        self.prefix.len()
    }
}

impl Matcher for PathPrefixMatcher {
    fn matches(&self, _method: &Method, path: &str) -> bool {
        if self.prefix == "/" {
            return !self.exact || path == "/";
        }
        let Some(rest) = path.strip_prefix(self.prefix.as_str()) else {
            return false;
        };
        if self.exact {
            rest.is_empty() || rest == "/"
        } else {
            rest.is_empty() || rest.starts_with('/')
        }
    }
}

/// True if any segment of `path` is `.` or `..`. Percent-encoded dots
/// (`%2e`) and separators (`%2f`, `%5c`, `\`) are treated as their plain forms.
pub fn has_dot_segments(path: &str) -> bool {
    let lowered = path.to_ascii_lowercase();
    let unified = lowered
        .replace("%2f", "/")
        .replace("%5c", "/")
        .replace('\\', "/");
    unified.split('/').any(|segment| {
        let decoded = segment.replace("%2e", ".");
        decoded == "." || decoded == ".."
    })
}

/// Matches the request method.
#[derive(Debug, Clone, Default)]
pub struct MethodMatcher {
    allowed: Vec<Method>,
}

impl MethodMatcher {
    pub fn new(allowed: Vec<Method>) -> Self {
        Self { allowed }
    }

    pub fn any() -> Self {
        Self::default()
    }
}

impl Matcher for MethodMatcher {
    fn matches(&self, method: &Method, _path: &str) -> bool {
        self.allowed.is_empty() || self.allowed.contains(method)
    }
}
