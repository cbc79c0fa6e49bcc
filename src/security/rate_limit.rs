//! Fixed-window rate limiting for the API namespace.
//!
//! Each client identity gets a window that opens on its first counted request
//! and lasts `window`. Every request inside the scope increments the counter,
//! including those that end up rejected. Once the window elapses the counter
//! starts over.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::{
    extract::{connect_info::MockConnectInfo, ConnectInfo},
    http::{
        header::{HeaderName, HeaderValue},
        request::Parts,
        Extensions,
    },
};
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::RateLimitConfig;
use crate::error::GatewayError;
use crate::http::pipeline::{Outcome, Stage, StageContext};
use crate::routing::PathPrefixMatcher;

const RATELIMIT_POLICY: HeaderName = HeaderName::from_static("ratelimit-policy");
const RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("ratelimit-limit");
const RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("ratelimit-remaining");
const RATELIMIT_RESET: HeaderName = HeaderName::from_static("ratelimit-reset");
const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");
const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Identity used when no peer address is known.
pub const UNKNOWN_CLIENT: &str = "unknown";

#[derive(Debug)]
struct Window {
    count: u32,
    reset_at: Instant,
}

/// Result of counting one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub admitted: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Time until the client's window resets.
    pub reset_after: Duration,
}

/// Per-client fixed-window counters.
///
/// Counting is done under the map's entry lock, so concurrent requests from
/// one client can never admit more than `max_requests` in a window.
#[derive(Debug)]
pub struct RateLimiter {
    windows: DashMap<String, Window>,
    max_requests: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            windows: DashMap::new(),
            max_requests,
            window,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_requests, Duration::from_secs(config.window_secs))
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Count a request for `client` at the current time.
    pub fn check(&self, client: &str) -> RateDecision {
        self.check_at(client, Instant::now())
    }

    pub fn check_at(&self, client: &str, now: Instant) -> RateDecision {
        let mut entry = self
            .windows
            .entry(client.to_owned())
            .or_insert_with(|| Window {
                count: 0,
                reset_at: now + self.window,
            });

        if now >= entry.reset_at {
            entry.count = 0;
            entry.reset_at = now + self.window;
        }
        entry.count = entry.count.saturating_add(1);

        let count = entry.count;
        let reset_after = entry.reset_at.saturating_duration_since(now);
        drop(entry);

        RateDecision {
            admitted: count <= self.max_requests,
            limit: self.max_requests,
            remaining: self.max_requests.saturating_sub(count),
            reset_after,
        }
    }

    /// Drop windows that have already elapsed. Returns how many were removed.
    pub fn purge_expired(&self, now: Instant) -> usize {
        let before = self.windows.len();
        self.windows.retain(|_, window| window.reset_at > now);
        before.saturating_sub(self.windows.len())
    }

    /// Number of clients currently holding a window.
    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }

    /// Periodically purge elapsed windows until shutdown is signalled.
    pub fn spawn_sweeper(self: &Arc<Self>, mut shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(limiter.window.max(Duration::from_secs(1)));
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let purged = limiter.purge_expired(Instant::now());
                        if purged > 0 {
                            tracing::debug!(purged, remaining = limiter.tracked_clients(), "Purged rate limit windows");
                        }
                    }
                    _ = shutdown.recv() => {
                        tracing::debug!("Rate limit sweeper stopping");
                        break;
                    }
                }
            }
        })
    }
}

/// Resolve the identity a request is counted under.
///
/// The first `X-Forwarded-For` entry is used only when `trust_forwarded_for`
/// is set; otherwise the peer address from the connection.
pub fn client_identity(request: &Parts, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let forwarded = request
            .headers
            .get(X_FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(client) = forwarded {
            return client.to_owned();
        }
    }

    peer_addr(&request.extensions)
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_owned())
}

/// Peer address of the connection, as axum's `ConnectInfo` extractor sees it.
///
/// Falls back to a `MockConnectInfo` layer when no real connection info is
/// present, so in-process routers resolve the same identity as served ones.
pub fn peer_addr(extensions: &Extensions) -> Option<SocketAddr> {
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
        .or_else(|| {
            extensions
                .get::<MockConnectInfo<SocketAddr>>()
                .map(|MockConnectInfo(addr)| *addr)
        })
}

/// Pipeline stage applying a [`RateLimiter`] to one path scope.
#[derive(Debug, Clone)]
pub struct RateLimitStage {
    limiter: Arc<RateLimiter>,
    scope: PathPrefixMatcher,
    trust_forwarded_for: bool,
    legacy_headers: bool,
    policy: HeaderValue,
}

impl RateLimitStage {
    pub fn new(limiter: Arc<RateLimiter>, config: &RateLimitConfig) -> Self {
        let policy = format!("{};w={}", limiter.max_requests(), limiter.window().as_secs());
        Self {
            policy: HeaderValue::from_str(&policy).unwrap_or_else(|_| HeaderValue::from_static("")),
            scope: PathPrefixMatcher::new(config.path_prefix.as_str()),
            trust_forwarded_for: config.trust_forwarded_for,
            legacy_headers: config.legacy_headers,
            limiter,
        }
    }

    pub fn in_scope(&self, path: &str) -> bool {
        self.scope.matches(path)
    }
}

fn reset_seconds(reset_after: Duration) -> u64 {
    let secs = reset_after.as_secs();
    if reset_after.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

/// Reset instant as whole Unix seconds, rounded up.
fn reset_epoch_seconds(reset_after: Duration) -> u64 {
    let since_epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    reset_seconds(since_epoch + reset_after)
}

impl Stage for RateLimitStage {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    fn evaluate(&self, request: &Parts, ctx: &mut StageContext) -> Result<Outcome, GatewayError> {
        if !self.in_scope(request.uri.path()) {
            return Ok(Outcome::Continue);
        }

        let client = client_identity(request, self.trust_forwarded_for);
        let decision = self.limiter.check(&client);

        ctx.annotate(RATELIMIT_POLICY, self.policy.clone());
        ctx.annotate(RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
        ctx.annotate(RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
        ctx.annotate(RATELIMIT_RESET, HeaderValue::from(reset_seconds(decision.reset_after)));
        if self.legacy_headers {
            ctx.annotate(X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
            ctx.annotate(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
            ctx.annotate(
                X_RATELIMIT_RESET,
                HeaderValue::from(reset_epoch_seconds(decision.reset_after)),
            );
        }

        if decision.admitted {
            Ok(Outcome::Continue)
        } else {
            Err(GatewayError::RateLimitExceeded {
                client,
                retry_after: decision.reset_after,
            })
        }
    }
}
