//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build every subsystem from a validated `GatewayConfig`
//! - Create the Axum Router: health, gateway-local auth, dispatcher fallback
//! - Wire up middleware in a fixed order
//! - Bind server to listener and drain on shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{middleware, routing::get, Router};
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::auth::{
    spawn_purger, AuthResolver, AuthState, CookieSettings, CredentialVerifier, MemoryStore,
    RedisStore, SessionManager, SessionStore, StoreError, UserServiceClient,
};
use crate::config::{GatewayConfig, SessionBackend};
use crate::error::GatewayError;
use crate::health::{self, HealthMonitor};
use crate::http::middleware::{cors_layer, enforce_timeout, envelope_oversized_body, panic_layer};
use crate::http::request::assign_request_ids;
use crate::lifecycle::Shutdown;
use crate::proxy::{Forwarder, ForwarderSettings, UpstreamRegistry};
use crate::routing::{dispatch, Dispatcher, RouteTable};
use crate::security::headers::security_headers_middleware;
use crate::security::rate_limit::{rate_limit_middleware, RateLimitState, SlidingWindowLimiter};

/// Startup failures.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("session store: {0}")]
    Store(#[from] StoreError),

    #[error("credential verifier: {0}")]
    Verifier(GatewayError),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Builder allowing collaborators to be swapped (tests inject stores and verifiers).
pub struct GatewayServerBuilder {
    config: GatewayConfig,
    session_store: Option<Arc<dyn SessionStore>>,
    credential_verifier: Option<Arc<dyn CredentialVerifier>>,
}

impl GatewayServerBuilder {
    pub fn session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.session_store = Some(store);
        self
    }

    pub fn credential_verifier(mut self, verifier: Arc<dyn CredentialVerifier>) -> Self {
        self.credential_verifier = Some(verifier);
        self
    }

    pub async fn build(self) -> Result<GatewayServer, ServerError> {
        let config = self.config;

        let store: Arc<dyn SessionStore> = match self.session_store {
            Some(store) => store,
            None => match (config.session.backend, &config.session.redis_url) {
                (SessionBackend::Redis, Some(url)) => Arc::new(RedisStore::connect(url).await?),
                (SessionBackend::Redis, None) => {
                    return Err(ServerError::Config("redis backend without redis_url".into()))
                }
                (SessionBackend::Memory, _) => {
                    tracing::warn!("Using in-memory session store; sessions are lost on restart");
                    Arc::new(MemoryStore::new())
                }
            },
        };

        let sessions = SessionManager::new(
            store.clone(),
            config.session.prefix.clone(),
            Duration::from_secs(config.session.ttl_secs),
        );
        let resolver = AuthResolver::new(
            sessions,
            config.session.cookie_name.clone(),
            config.session.header_name.clone(),
        );

        let upstreams = UpstreamRegistry::from_config(&config.services).map_err(ServerError::Config)?;
        let verifier: Arc<dyn CredentialVerifier> = match self.credential_verifier {
            Some(verifier) => verifier,
            None => {
                let service = upstreams.get(&config.auth.credential_service).ok_or_else(|| {
                    ServerError::Config(format!(
                        "credential service '{}' is not configured",
                        config.auth.credential_service
                    ))
                })?;
                Arc::new(
                    UserServiceClient::new(
                        service.name.clone(),
                        service.base(),
                        &config.auth.credential_path,
                        Duration::from_secs(config.timeouts.credential_check_secs),
                        config.listener.user_agent.clone(),
                    )
                    .map_err(ServerError::Verifier)?,
                )
            }
        };

        let forwarder = Forwarder::new(
            upstreams,
            ForwarderSettings {
                gateway_name: config.listener.gateway_name.clone(),
                user_agent: config.listener.user_agent.clone(),
                upstream_timeout: Duration::from_secs(config.timeouts.upstream_secs),
                health_path: config.health_path.clone(),
                probe_timeout: Duration::from_secs(config.timeouts.health_probe_secs),
            },
        );

        let limiter = config.rate_limit.enabled.then(|| {
            Arc::new(SlidingWindowLimiter::new(
                config.rate_limit.requests as usize,
                Duration::from_secs(config.rate_limit.window_secs),
                config.rate_limit.max_clients,
            ))
        });

        let routes = RouteTable::from_config(&config.routes).map_err(ServerError::Config)?;
        tracing::info!(routes = routes.len(), "Route table compiled");

        let dispatcher = Arc::new(Dispatcher::new(
            Arc::new(routes),
            resolver.clone(),
            limiter.clone(),
            forwarder.clone(),
            config.rate_limit.trust_forwarded_headers,
        ));

        let auth_state = AuthState {
            resolver,
            verifier,
            cookie: CookieSettings {
                name: config.session.cookie_name.clone(),
                secure: config.session.cookie_secure,
                max_age_secs: config.session.ttl_secs,
            },
            trust_forwarded: config.rate_limit.trust_forwarded_headers,
        };

        let router = build_router(
            &config,
            dispatcher,
            auth_state,
            HealthMonitor::new(forwarder),
            limiter.clone(),
        );

        Ok(GatewayServer {
            router,
            config: Arc::new(config),
            limiter,
            store,
        })
    }
}

/// Assemble routes and middleware. Each `layer` call wraps everything added
/// before it, so the last one listed is outermost.
fn build_router(
    config: &GatewayConfig,
    dispatcher: Arc<Dispatcher>,
    auth_state: AuthState,
    monitor: HealthMonitor,
    limiter: Option<Arc<SlidingWindowLimiter>>,
) -> Router {
    let health_routes = Router::new()
        .route("/health", get(health::active::health))
        .route("/health/live", get(health::active::live))
        .route("/health/ready", get(health::active::ready))
        .with_state(monitor);

    let mut auth_routes = crate::auth::handlers::routes(auth_state, &config.auth.mount_path);
    if let Some(limiter) = limiter {
        let state = RateLimitState {
            limiter,
            trust_forwarded: config.rate_limit.trust_forwarded_headers,
        };
        auth_routes =
            auth_routes.route_layer(middleware::from_fn_with_state(state, rate_limit_middleware));
    }

    let max_body = config.security.max_body_size;

    Router::new()
        .fallback(dispatch)
        .with_state(dispatcher)
        .merge(health_routes)
        .merge(auth_routes)
        .layer(middleware::from_fn_with_state(
            config.security.enable_headers,
            security_headers_middleware,
        ))
        .layer(RequestBodyLimitLayer::new(max_body))
        .layer(middleware::map_response_with_state(max_body, envelope_oversized_body))
        .layer(cors_layer(&config.cors))
        .layer(middleware::from_fn(assign_request_ids))
        .layer(middleware::from_fn_with_state(
            Duration::from_secs(config.timeouts.request_secs),
            enforce_timeout,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(panic_layer())
}

/// The assembled gateway.
pub struct GatewayServer {
    router: Router,
    config: Arc<GatewayConfig>,
    limiter: Option<Arc<SlidingWindowLimiter>>,
    store: Arc<dyn SessionStore>,
}

impl GatewayServer {
    pub fn builder(config: GatewayConfig) -> GatewayServerBuilder {
        GatewayServerBuilder {
            config,
            session_store: None,
            credential_verifier: None,
        }
    }

    /// Build with default collaborators derived from `config`.
    pub async fn new(config: GatewayConfig) -> Result<Self, ServerError> {
        Self::builder(config).build().await
    }

    /// The fully layered router, for in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Serve on `listener` until `shutdown` fires, then drain.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let sweeper = self.limiter.clone().map(|limiter| {
            limiter.spawn_sweeper(
                Duration::from_secs(self.config.rate_limit.sweep_interval_secs),
                shutdown.subscribe(),
            )
        });

        let purger = spawn_purger(
            self.store.clone(),
            Duration::from_secs(self.config.session.purge_interval_secs),
            shutdown.subscribe(),
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.wait())
            .await?;

        if let Some(handle) = sweeper {
            let _ = handle.await;
        }
        let _ = purger.await;
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
