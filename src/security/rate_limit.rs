//! Per-client sliding-window rate limiting.
//!
//! # Responsibilities
//! - Count accepted requests per client inside a trailing window
//! - Identify clients from forwarding headers or the socket address
//! - Bound the number of tracked clients (idle sweep + LRU cap)
//!
//! # Design Decisions
//! - Each client window has its own lock: unrelated clients never contend,
//!   while prune + check + append is atomic for one client
//! - Timestamps are recorded only on admission
//! - Process-local state; no coordination across gateway instances

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time;

use crate::error::GatewayError;
use crate::observability::metrics;

/// Accepted-request timestamps for one client.
#[derive(Debug)]
struct ClientWindow {
    hits: VecDeque<Instant>,
    last_seen: Instant,
}

impl ClientWindow {
    fn new(now: Instant) -> Self {
        Self {
            hits: VecDeque::new(),
            last_seen: now,
        }
    }

    /// Drop every hit at or before `now - window`.
    fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(&oldest) = self.hits.front() {
            if now.saturating_duration_since(oldest) >= window {
                self.hits.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: usize },
    Limited { retry_after: Duration },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed { .. })
    }
}

type Slot = Arc<Mutex<ClientWindow>>;

fn lock(slot: &Slot) -> MutexGuard<'_, ClientWindow> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Sliding-window limiter keyed by client identifier.
#[derive(Debug)]
pub struct SlidingWindowLimiter {
    clients: DashMap<String, Slot>,
    limit: usize,
    window: Duration,
    max_clients: usize,
}

impl SlidingWindowLimiter {
    pub fn new(limit: usize, window: Duration, max_clients: usize) -> Self {
        Self {
            clients: DashMap::new(),
            limit,
            window,
            max_clients: max_clients.max(1),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn tracked_clients(&self) -> usize {
        self.clients.len()
    }

    /// Record a request from `client` if it fits in the budget.
    pub fn allow(&self, client: &str) -> bool {
        self.check_at(client, Instant::now()).is_allowed()
    }

    pub fn check(&self, client: &str) -> RateDecision {
        self.check_at(client, Instant::now())
    }

    /// Admission check at an explicit instant.
    pub fn check_at(&self, client: &str, now: Instant) -> RateDecision {
        let slot = self.slot(client, now);
        let mut window = lock(&slot);

        window.prune(now, self.window);
        window.last_seen = now;

        if window.hits.len() < self.limit {
            window.hits.push_back(now);
            RateDecision::Allowed {
                remaining: self.limit - window.hits.len(),
            }
        } else {
            let retry_after = window
                .hits
                .front()
                .map(|oldest| self.window.saturating_sub(now.saturating_duration_since(*oldest)))
                .unwrap_or(self.window);
            RateDecision::Limited { retry_after }
        }
    }

    /// Gate a request, turning a rejection into `RateLimited`.
    pub fn admit(&self, client: &str) -> Result<(), GatewayError> {
        match self.check(client) {
            RateDecision::Allowed { .. } => Ok(()),
            RateDecision::Limited { retry_after } => {
                tracing::warn!(client = %client, limit = self.limit, "Rate limit exceeded");
                metrics::record_rate_limited();
                Err(GatewayError::RateLimited {
                    limit: self.limit,
                    retry_after,
                })
            }
        }
    }

    fn slot(&self, client: &str, now: Instant) -> Slot {
        if let Some(existing) = self.clients.get(client) {
            return Arc::clone(&existing);
        }
        if self.clients.len() >= self.max_clients {
            self.evict_least_recent();
        }
        Arc::clone(
            &self
                .clients
                .entry(client.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(ClientWindow::new(now)))),
        )
    }

    /// Evict the least recently seen idle windows until below the cap.
    fn evict_least_recent(&self) {
        // frees roughly a tenth of the cap per pass
        let target = self.max_clients - self.max_clients / 10 - 1;
        let mut idle: Vec<(String, Instant)> = self
            .clients
            .iter()
            .filter(|entry| Arc::strong_count(entry.value()) == 1)
            .filter_map(|entry| {
                let last_seen = entry.value().try_lock().ok().map(|window| window.last_seen);
                last_seen.map(|seen| (entry.key().clone(), seen))
            })
            .collect();
        idle.sort_by_key(|(_, last_seen)| *last_seen);

        let excess = self.clients.len().saturating_sub(target);
        let mut evicted = 0;
        for (key, _) in idle.into_iter().take(excess) {
            if self
                .clients
                .remove_if(&key, |_, slot| Arc::strong_count(slot) == 1)
                .is_some()
            {
                evicted += 1;
            }
        }

        if evicted < excess {
            tracing::warn!(
                tracked = self.clients.len(),
                cap = self.max_clients,
                "Rate limiter client cap exceeded by active clients"
            );
        }
        tracing::debug!(evicted, "Evicted rate limiter windows");
    }

    /// Remove windows with no hits inside the trailing window.
    pub fn sweep(&self, now: Instant) -> usize {
        let before = self.clients.len();
        self.clients.retain(|_, slot| {
            if Arc::strong_count(slot) > 1 {
                return true;
            }
            match slot.try_lock() {
                Ok(mut window) => {
                    window.prune(now, self.window);
                    !window.hits.is_empty()
                }
                Err(TryLockError::Poisoned(poisoned)) => {
                    let mut window = poisoned.into_inner();
                    window.prune(now, self.window);
                    !window.hits.is_empty()
                }
                Err(TryLockError::WouldBlock) => true,
            }
        });
        before.saturating_sub(self.clients.len())
    }

    /// Periodically sweep idle windows until shutdown.
    pub fn spawn_sweeper(
        self: Arc<Self>,
        interval: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = self.sweep(Instant::now());
                        metrics::record_rate_limiter_clients(self.tracked_clients());
                        if removed > 0 {
                            tracing::debug!(removed, "Swept idle rate limiter windows");
                        }
                    }
                    _ = shutdown.recv() => {
                        tracing::info!("Rate limiter sweeper received shutdown signal, exiting loop");
                        break;
                    }
                }
            }
        })
    }
}

/// Identify a client: first `X-Forwarded-For` entry, then `X-Real-IP`, then
/// the socket address.
pub fn client_address(headers: &HeaderMap, remote: Option<SocketAddr>, trust_forwarded: bool) -> String {
    if trust_forwarded {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }
        let real_ip = headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = real_ip {
            return ip.to_string();
        }
    }
    remote
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// State for the rate limiting middleware.
#[derive(Debug, Clone)]
pub struct RateLimitState {
    pub limiter: Arc<SlidingWindowLimiter>,
    pub trust_forwarded: bool,
}

/// Middleware applying the limiter to gateway-local endpoints.
pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Response {
    let remote = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|c| c.0);
    let client = client_address(request.headers(), remote, state.trust_forwarded);

    match state.limiter.admit(&client) {
        Ok(()) => next.run(request).await,
        Err(e) => e.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn limiter() -> SlidingWindowLimiter {
        SlidingWindowLimiter::new(3, Duration::from_secs(60), 1000)
    }

    #[test]
    fn budget_resets_after_window() {
        let limiter = limiter();
        let start = Instant::now();

        for i in 0..3 {
            let at = start + Duration::from_secs(i);
            assert!(limiter.check_at("a", at).is_allowed());
        }
        let fourth = limiter.check_at("a", start + Duration::from_secs(10));
        assert_eq!(
            fourth,
            RateDecision::Limited {
                retry_after: Duration::from_secs(50)
            }
        );

        // the first hit falls out exactly at start + window
        assert!(limiter.check_at("a", start + Duration::from_secs(60)).is_allowed());
    }

    #[test]
    fn clients_are_independent() {
        let limiter = limiter();
        let now = Instant::now();
        for _ in 0..3 {
            assert!(limiter.check_at("a", now).is_allowed());
        }
        assert!(!limiter.check_at("a", now).is_allowed());
        assert!(limiter.check_at("b", now).is_allowed());
    }

    #[test]
    fn rejected_requests_are_not_recorded() {
        let limiter = SlidingWindowLimiter::new(1, Duration::from_secs(10), 10);
        let start = Instant::now();
        assert!(limiter.check_at("a", start).is_allowed());
        for s in 1..10 {
            assert!(!limiter.check_at("a", start + Duration::from_secs(s)).is_allowed());
        }
        assert!(limiter.check_at("a", start + Duration::from_secs(10)).is_allowed());
    }

    #[test]
    fn concurrent_burst_never_over_admits() {
        let limiter = Arc::new(SlidingWindowLimiter::new(50, Duration::from_secs(60), 10));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                std::thread::spawn(move || (0..20).filter(|_| limiter.allow("burst")).count())
            })
            .collect();
        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(admitted, 50);
    }

    #[test]
    fn sweep_drops_idle_windows() {
        let limiter = limiter();
        let start = Instant::now();
        limiter.check_at("old", start);
        limiter.check_at("fresh", start + Duration::from_secs(50));

        assert_eq!(limiter.sweep(start + Duration::from_secs(70)), 1);
        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[test]
    fn cap_evicts_least_recently_seen() {
        let limiter = SlidingWindowLimiter::new(5, Duration::from_secs(60), 10);
        let start = Instant::now();
        for i in 0..10u64 {
            limiter.check_at(&format!("c{}", i), start + Duration::from_millis(i));
        }
        assert_eq!(limiter.tracked_clients(), 10);

        limiter.check_at("newcomer", start + Duration::from_secs(1));
        assert!(limiter.tracked_clients() <= 10);
        assert!(limiter.clients.contains_key("newcomer"));
        assert!(!limiter.clients.contains_key("c0"));
        assert!(limiter.clients.contains_key("c9"));
    }

    #[test]
    fn client_address_precedence() {
        let remote: SocketAddr = "192.0.2.7:5000".parse().unwrap();
        let mut headers = HeaderMap::new();
        assert_eq!(client_address(&headers, Some(remote), true), "192.0.2.7");

        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.2"));
        assert_eq!(client_address(&headers, Some(remote), true), "198.51.100.2");

        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9, 10.0.0.1"));
        assert_eq!(client_address(&headers, Some(remote), true), "203.0.113.9");

        assert_eq!(client_address(&headers, Some(remote), false), "192.0.2.7");
        assert_eq!(client_address(&HeaderMap::new(), None, true), "unknown");
    }
}
