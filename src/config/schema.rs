//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, gateway identity).
    pub listener: ListenerConfig,

    /// Upstream service definitions.
    pub services: Vec<ServiceConfig>,

    /// Path probed on every upstream by the health endpoint.
    pub health_path: String,

    /// Route descriptors, evaluated by longest prefix.
    pub routes: Vec<RouteConfig>,

    /// Session storage and cookie settings.
    pub session: SessionConfig,

    /// Gateway-local authentication endpoints.
    pub auth: AuthConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Cross-origin settings.
    pub cors: CorsConfig,

    /// Response hardening and request limits.
    pub security: SecurityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            services: default_services(),
            health_path: "/health".to_string(),
            routes: default_routes(),
            session: SessionConfig::default(),
            auth: AuthConfig::default(),
            rate_limit: RateLimitConfig::default(),
            timeouts: TimeoutConfig::default(),
            cors: CorsConfig::default(),
            security: SecurityConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Name stamped into `X-Forwarded-By` / `X-Proxied-By`.
    pub gateway_name: String,

    /// `User-Agent` sent to upstreams.
    pub user_agent: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            gateway_name: "api-gateway".to_string(),
            user_agent: "API-Gateway/1.0".to_string(),
        }
    }
}

/// A named upstream service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    /// Name referenced by routes (e.g. "user").
    pub name: String,

    /// Base address (e.g. "http://localhost:8081").
    pub url: String,
}

impl ServiceConfig {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

fn default_services() -> Vec<ServiceConfig> {
    vec![
        ServiceConfig::new("user", "http://localhost:8081"),
        ServiceConfig::new("product", "http://localhost:8082"),
        ServiceConfig::new("order", "http://localhost:8083"),
    ]
}

/// Authorization level a route demands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AuthRequirement {
    /// No session needed; the auth resolver is never consulted.
    #[default]
    None,
    /// Any valid session.
    Authenticated,
    /// Valid session with the admin role.
    Admin,
}

impl std::fmt::Display for AuthRequirement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AuthRequirement::None => "none",
            AuthRequirement::Authenticated => "authenticated",
            AuthRequirement::Admin => "admin",
        };
        f.write_str(s)
    }
}

/// Route descriptor mapping a path prefix and method set to an upstream.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Route identifier for logging/metrics.
    pub name: String,

    /// Path prefix to match (segment aware).
    pub path_prefix: String,

    /// Match only the prefix itself, not paths below it.
    #[serde(default)]
    pub exact: bool,

    /// Allowed methods; empty means any.
    #[serde(default)]
    pub methods: Vec<String>,

    /// Authorization level required.
    #[serde(default)]
    pub auth: AuthRequirement,

    /// Upstream service name to forward to.
    pub target: String,

    /// Prefix removed from the path before forwarding.
    #[serde(default)]
    pub strip_prefix: Option<String>,
}

impl RouteConfig {
    pub fn new(
        name: impl Into<String>,
        path_prefix: impl Into<String>,
        auth: AuthRequirement,
        target: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            path_prefix: path_prefix.into(),
            exact: false,
            methods: Vec::new(),
            auth,
            target: target.into(),
            strip_prefix: None,
        }
    }

    pub fn methods(mut self, methods: &[&str]) -> Self {
        self.methods = methods.iter().map(|m| m.to_string()).collect();
        self
    }

    pub fn exact(mut self) -> Self {
        self.exact = true;
        self
    }

    pub fn strip(mut self, prefix: impl Into<String>) -> Self {
        self.strip_prefix = Some(prefix.into());
        self
    }
}

const API_PREFIX: &str = "/api/v1";
const WRITE_METHODS: &[&str] = &["POST", "PUT", "PATCH", "DELETE"];
const READ_METHODS: &[&str] = &["GET", "HEAD"];

fn default_routes() -> Vec<RouteConfig> {
    use AuthRequirement as Auth;

    let mut routes = vec![
        RouteConfig::new("register", "/api/v1/auth/register", Auth::None, "user").methods(&["POST"]),
        RouteConfig::new("forgot-password", "/api/v1/auth/forgot-password", Auth::None, "user")
            .methods(&["POST"]),
        RouteConfig::new("reset-password", "/api/v1/auth/reset-password", Auth::None, "user")
            .methods(&["POST"]),
        RouteConfig::new("user-create", "/api/v1/users", Auth::None, "user")
            .methods(&["POST"])
            .exact(),
        RouteConfig::new("users", "/api/v1/users", Auth::Authenticated, "user"),
    ];

    for resource in ["products", "categories"] {
        let prefix = format!("{}/{}", API_PREFIX, resource);
        routes.push(
            RouteConfig::new(format!("{}-read", resource), prefix.clone(), Auth::None, "product")
                .methods(READ_METHODS),
        );
        routes.push(
            RouteConfig::new(format!("{}-write", resource), prefix, Auth::Admin, "product")
                .methods(WRITE_METHODS),
        );
    }

    for resource in ["orders", "cart"] {
        routes.push(RouteConfig::new(
            resource,
            format!("{}/{}", API_PREFIX, resource),
            Auth::Authenticated,
            "order",
        ));
    }
    for area in ["admin", "analytics", "export"] {
        routes.push(RouteConfig::new(
            format!("orders-{}", area),
            format!("{}/orders/{}", API_PREFIX, area),
            Auth::Admin,
            "order",
        ));
    }

    for (resource, target) in [("users", "user"), ("products", "product"), ("orders", "order")] {
        routes.push(
            RouteConfig::new(
                format!("admin-{}", resource),
                format!("{}/admin/{}", API_PREFIX, resource),
                Auth::Admin,
                target,
            )
            .strip(format!("{}/admin", API_PREFIX)),
        );
    }

    routes.push(RouteConfig::new("upload", "/api/v1/upload", Auth::Authenticated, "user"));
    routes.push(RouteConfig::new("webhook-payment", "/api/v1/webhooks/payment", Auth::None, "order"));
    routes.push(RouteConfig::new(
        "webhook-notification",
        "/api/v1/webhooks/notification",
        Auth::None,
        "user",
    ));

    routes
        .into_iter()
        .map(|r| {
            if r.strip_prefix.is_none() {
                r.strip(API_PREFIX)
            } else {
                r
            }
        })
        .collect()
}

/// Where sessions live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackend {
    /// Process-local table; sessions do not survive restarts.
    #[default]
    Memory,
    /// External Redis instance.
    Redis,
}

/// Session configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    pub backend: SessionBackend,

    /// Redis connection URL (required for the redis backend).
    pub redis_url: Option<String>,

    /// Key prefix; keys are `<prefix>:<session_id>`.
    pub prefix: String,

    /// Absolute TTL in seconds, reset on every successful lookup.
    pub ttl_secs: u64,

    /// Cookie carrying the session id.
    pub cookie_name: String,

    /// Header carrying the session id when cookies are unavailable.
    pub header_name: String,

    /// Add `Secure` to the session cookie.
    pub cookie_secure: bool,

    /// How often expired entries are purged from the in-memory store, in seconds.
    pub purge_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            backend: SessionBackend::Memory,
            redis_url: None,
            prefix: "session".to_string(),
            ttl_secs: 24 * 60 * 60,
            cookie_name: "session_id".to_string(),
            header_name: "x-session-id".to_string(),
            cookie_secure: false,
            purge_interval_secs: 300,
        }
    }
}

/// Gateway-local authentication endpoints.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Mount point for login/logout/me/refresh/logout-all.
    pub mount_path: String,

    /// Service that verifies email/password pairs.
    pub credential_service: String,

    /// Path on that service receiving the login payload.
    pub credential_path: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            mount_path: "/api/v1/auth".to_string(),
            credential_service: "user".to_string(),
            credential_path: "/auth/login".to_string(),
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Requests admitted per client within one window.
    pub requests: u32,

    /// Trailing window length in seconds.
    pub window_secs: u64,

    /// Upper bound on tracked client windows.
    pub max_clients: usize,

    /// How often idle client windows are swept, in seconds.
    pub sweep_interval_secs: u64,

    /// Derive the client from `X-Forwarded-For` / `X-Real-IP` when present.
    pub trust_forwarded_headers: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests: 60,
            window_secs: 60,
            max_clients: 100_000,
            sweep_interval_secs: 60,
            trust_forwarded_headers: true,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Whole-request deadline in seconds.
    pub request_secs: u64,

    /// Deadline for a single upstream relay in seconds.
    pub upstream_secs: u64,

    /// Deadline for one health probe in seconds.
    pub health_probe_secs: u64,

    /// Deadline for the credential check during login in seconds.
    pub credential_check_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            upstream_secs: 25,
            health_probe_secs: 3,
            credential_check_secs: 10,
        }
    }
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Allowed origins; `["*"]` allows any (without credentials).
    pub allowed_origins: Vec<String>,

    pub allowed_methods: Vec<String>,

    pub allowed_headers: Vec<String>,

    /// Preflight cache lifetime in seconds.
    pub max_age_secs: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
            allowed_methods: ["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"]
                .iter()
                .map(|m| m.to_string())
                .collect(),
            allowed_headers: [
                "content-type",
                "authorization",
                "x-session-id",
                "x-request-id",
                "x-correlation-id",
            ]
            .iter()
            .map(|h| h.to_string())
            .collect(),
            max_age_secs: 600,
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Enable security response headers.
    pub enable_headers: bool,
    /// Maximum body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enable_headers: true,
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
