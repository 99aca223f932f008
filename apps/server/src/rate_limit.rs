use axum::{
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use dashmap::DashMap;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::models::ApiResponse;

// ── Configuration ──

/// Route groups with independent limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    /// Specialist listing and slot lookups.
    Public,
    /// Admin password check.
    Auth,
    /// Public appointment creation.
    Booking,
    /// Staff endpoints.
    Admin,
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    /// Maximum requests allowed within the sliding window.
    pub max_requests: u32,
    /// Duration of the sliding window.
    pub window: Duration,
}

impl Tier {
    pub fn default_config(self) -> RateLimitConfig {
        let (max_requests, window_secs) = match self {
            Tier::Public => (60, 60),
            Tier::Auth => (10, 60),
            Tier::Booking => (5, 300),
            Tier::Admin => (120, 60),
        };
        RateLimitConfig {
            max_requests,
            window: Duration::from_secs(window_secs),
        }
    }
}

// ── Core Rate Limiter ──

/// Per-IP sliding window counters, one map per tier.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    configs: Arc<HashMap<Tier, RateLimitConfig>>,
    hits: Arc<DashMap<(Tier, IpAddr), Vec<Instant>>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(
            [Tier::Public, Tier::Auth, Tier::Booking, Tier::Admin]
                .into_iter()
                .map(|tier| (tier, tier.default_config())),
        )
    }
}

impl RateLimiter {
    pub fn new(configs: impl IntoIterator<Item = (Tier, RateLimitConfig)>) -> Self {
        Self {
            configs: Arc::new(configs.into_iter().collect()),
            hits: Arc::new(DashMap::new()),
        }
    }

    /// `Ok(())` if allowed, `Err(retry_after_secs)` if limited.
    /// Tiers without a config are unlimited.
    pub fn check(&self, tier: Tier, ip: IpAddr) -> Result<(), u64> {
        let Some(config) = self.configs.get(&tier) else {
            return Ok(());
        };
        let now = Instant::now();

        let mut entry = self.hits.entry((tier, ip)).or_default();
        entry.retain(|t| now.duration_since(*t) < config.window);

        if entry.len() >= config.max_requests as usize {
            let retry_after = entry
                .first()
                .map(|oldest| (*oldest + config.window).saturating_duration_since(now))
                .unwrap_or(config.window)
                .as_secs()
                .max(1);
            return Err(retry_after);
        }

        entry.push(now);
        Ok(())
    }

    /// Drop entries older than twice their tier's window.
    pub fn cleanup(&self) {
        let now = Instant::now();
        self.hits.retain(|(tier, _), timestamps| {
            let cutoff = self
                .configs
                .get(tier)
                .map(|c| c.window * 2)
                .unwrap_or_default();
            timestamps.retain(|t| now.duration_since(*t) < cutoff);
            !timestamps.is_empty()
        });
    }
}

// ── IP Extraction ──

/// Client IP from the first `X-Forwarded-For` hop, else the socket peer.
pub fn extract_client_ip(req: &Request) -> IpAddr {
    let forwarded = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|ip| ip.trim().parse::<IpAddr>().ok());

    forwarded
        .or_else(|| {
            req.extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ci| ci.0.ip())
        })
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

fn too_many_requests(retry_after: u64) -> Response {
    let body = ApiResponse::<()>::error(format!(
        "Too many requests. Try again in {} seconds",
        retry_after
    ));
    (
        StatusCode::TOO_MANY_REQUESTS,
        [("Retry-After", retry_after.to_string())],
        Json(body),
    )
        .into_response()
}

/// Middleware: `from_fn_with_state((limiter, tier), rate_limit)`.
pub async fn rate_limit(
    State((limiter, tier)): State<(RateLimiter, Tier)>,
    req: Request,
    next: Next,
) -> Result<Response, Response> {
    let ip = extract_client_ip(&req);
    limiter.check(tier, ip).map_err(|retry_after| {
        tracing::warn!(?tier, %ip, retry_after, "rate limited");
        too_many_requests(retry_after)
    })?;
    Ok(next.run(req).await)
}

// ── Tests ──
