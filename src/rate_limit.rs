//! Per-IP request throttling.

use std::{net::SocketAddr, num::NonZeroU32, sync::Arc, time::Duration};

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use tracing::warn;

use crate::{config::RateLimitConfig, error::AppError, state::AppState};

/// Separate buckets for credential routes and everything else.
pub struct RateLimitState {
    auth: DefaultKeyedRateLimiter<String>,
    api: DefaultKeyedRateLimiter<String>,
    trust_proxy_headers: bool,
}

impl RateLimitState {
    pub fn new(cfg: &RateLimitConfig) -> Self {
        Self {
            auth: RateLimiter::keyed(per_minute(cfg.auth_per_minute)),
            api: RateLimiter::keyed(per_minute(cfg.api_per_minute)),
            trust_proxy_headers: cfg.trust_proxy_headers,
        }
    }

    pub fn check_auth(&self, ip: &str) -> bool {
        self.auth.check_key(&ip.to_string()).is_ok()
    }

    pub fn check_api(&self, ip: &str) -> bool {
        self.api.check_key(&ip.to_string()).is_ok()
    }

    /// Drops buckets that have fully refilled.
    pub fn cleanup(&self) {
        self.auth.retain_recent();
        self.api.retain_recent();
    }

    pub fn start_cleanup_task(self: Arc<Self>) {
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_secs(300)).await;
                self.cleanup();
            }
        });
    }
}

fn per_minute(n: u32) -> Quota {
    Quota::per_minute(NonZeroU32::new(n).unwrap_or(NonZeroU32::MIN))
}

/// Client IP: the socket peer, or the proxy headers when they are trusted.
fn client_ip(req: &Request, trust_proxy_headers: bool) -> String {
    if trust_proxy_headers {
        if let Some(ip) = forwarded_ip(req) {
            return ip;
        }
    }

    if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }

    "unknown".to_string()
}

fn forwarded_ip(req: &Request) -> Option<String> {
    if let Some(forwarded) = req
        .headers()
        .get("X-Forwarded-For")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(ip) = forwarded.split(',').next().map(str::trim) {
            if !ip.is_empty() {
                return Some(ip.to_string());
            }
        }
    }

    req.headers()
        .get("X-Real-IP")
        .and_then(|v| v.to_str().ok())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
}

pub async fn auth_rate_limit(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let ip = client_ip(&req, state.rate_limit.trust_proxy_headers);
    if !state.rate_limit.check_auth(&ip) {
        warn!(ip = %ip, "auth rate limit exceeded");
        return AppError::RateLimited.into_response();
    }
    next.run(req).await
}

pub async fn api_rate_limit(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let ip = client_ip(&req, state.rate_limit.trust_proxy_headers);
    if !state.rate_limit.check_api(&ip) {
        warn!(ip = %ip, "api rate limit exceeded");
        return AppError::RateLimited.into_response();
    }
    next.run(req).await
}
