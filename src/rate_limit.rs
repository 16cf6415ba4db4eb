//! Fixed-window request limiter for the `/auth` endpoints.
//!
//! Clients are keyed by the first `X-Forwarded-For` entry, falling back to
//! the peer address and finally to a shared `anonymous` bucket.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

use crate::api::SharedState;
use crate::config::RateLimitSection;
use crate::errors::{FlowieError, Result};

/// Above this many tracked clients, expired windows are swept on insert.
const SWEEP_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: DateTime<Utc>,
    count: u32,
}

#[derive(Debug)]
pub struct RateLimiter {
    enabled: bool,
    max_requests: u32,
    window: Duration,
    windows: DashMap<String, Window>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitSection) -> Self {
        Self {
            enabled: config.enabled,
            max_requests: config.max_requests,
            window: config.window(),
            windows: DashMap::new(),
        }
    }

    /// Count one request for `key`. Fails with `RateLimited` once the
    /// client has used up its window.
    pub fn check(&self, key: &str, now: DateTime<Utc>) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        if self.windows.len() > SWEEP_THRESHOLD {
            let window = self.window;
            self.windows.retain(|_, w| now - w.started < window);
        }

        let mut entry = self.windows.entry(key.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });
        if now - entry.started >= self.window {
            *entry = Window {
                started: now,
                count: 0,
            };
        }
        if entry.count >= self.max_requests {
            let remaining = entry.started + self.window - now;
            // round up so clients never retry a second too early
            let retry_after_secs = (remaining.num_milliseconds() + 999) / 1000;
            return Err(FlowieError::RateLimited {
                retry_after_secs: retry_after_secs.max(1) as u64,
            });
        }
        entry.count += 1;
        Ok(())
    }
}

/// Resolve the client key for a request.
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    match (forwarded, peer) {
        (Some(ip), _) => ip.to_string(),
        (None, Some(addr)) => addr.ip().to_string(),
        (None, None) => "anonymous".to_string(),
    }
}

/// Middleware applied to the auth routes.
pub async fn limit_requests(
    State(state): State<SharedState>,
    request: Request,
    next: Next,
) -> Result<Response> {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let key = client_key(request.headers(), peer);

    if let Err(e) = state.rate_limiter.check(&key, state.clock.now()) {
        tracing::warn!(client = %key, path = %request.uri().path(), "rate limit exceeded");
        return Err(e);
    }
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use chrono::TimeZone;

    fn limiter(max_requests: u32) -> RateLimiter {
        RateLimiter::new(&RateLimitSection {
            enabled: true,
            max_requests,
            window_seconds: 60,
        })
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_allows_up_to_limit_then_rejects() {
        let limiter = limiter(3);
        for _ in 0..3 {
            limiter.check("10.0.0.1", t0()).unwrap();
        }
        match limiter.check("10.0.0.1", t0() + Duration::seconds(20)) {
            Err(FlowieError::RateLimited { retry_after_secs }) => assert_eq!(retry_after_secs, 40),
            other => panic!("expected rate limit, got {:?}", other),
        }
    }

    #[test]
    fn test_clients_are_counted_separately() {
        let limiter = limiter(1);
        limiter.check("10.0.0.1", t0()).unwrap();
        limiter.check("10.0.0.2", t0()).unwrap();
        assert!(limiter.check("10.0.0.1", t0()).is_err());
    }

    #[test]
    fn test_window_resets() {
        let limiter = limiter(1);
        limiter.check("c", t0()).unwrap();
        assert!(limiter.check("c", t0() + Duration::seconds(59)).is_err());
        limiter.check("c", t0() + Duration::seconds(60)).unwrap();
    }

    #[test]
    fn test_zero_and_huge_windows_are_clamped() {
        let limiter = RateLimiter::new(&RateLimitSection {
            enabled: true,
            max_requests: 1,
            window_seconds: 0,
        });
        limiter.check("c", t0()).unwrap();
        assert!(limiter.check("c", t0()).is_err());
        limiter.check("c", t0() + Duration::seconds(1)).unwrap();

        let limiter = RateLimiter::new(&RateLimitSection {
            enabled: true,
            max_requests: 1,
            window_seconds: u64::MAX,
        });
        limiter.check("c", t0()).unwrap();
        match limiter.check("c", t0()) {
            Err(FlowieError::RateLimited { retry_after_secs }) => {
                assert_eq!(retry_after_secs, 24 * 60 * 60)
            }
            other => panic!("expected rate limit, got {:?}", other),
        }
    }

    #[test]
    fn test_disabled_limiter_never_rejects() {
        let limiter = RateLimiter::new(&RateLimitSection {
            enabled: false,
            max_requests: 0,
            window_seconds: 60,
        });
        for _ in 0..100 {
            limiter.check("c", t0()).unwrap();
        }
    }

    #[test]
    fn test_client_key_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        let peer: SocketAddr = "192.168.1.5:51000".parse().unwrap();
        assert_eq!(client_key(&headers, Some(peer)), "192.168.1.5");
        assert_eq!(client_key(&headers, None), "anonymous");

        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        assert_eq!(client_key(&headers, Some(peer)), "203.0.113.7");
    }
}
