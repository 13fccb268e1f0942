//! # Per-Caller Rate Limiting
//!
//! Fixed one-minute windows keyed by the authenticated user. Requests that
//! reach the limiter without a [`CallerIdentity`] (login, registration) are
//! keyed by the peer IP from [`ConnectInfo`], so one noisy client cannot
//! lock everyone else out of login. Only when the server runs without
//! connect info do they share the `"anonymous"` window. A rejected request
//! gets 429 with a `Retry-After` header counting the seconds until its
//! window resets.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use parking_lot::Mutex;

use crate::auth::CallerIdentity;
use crate::error::ErrorBody;

const ANONYMOUS: &str = "anonymous";

/// Limits for one window.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Requests admitted per window and caller.
    pub max_requests: u64,
    /// Window length in seconds.
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 1000,
            window_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    opened: Instant,
    admitted: u64,
}

/// Shared window table, cloned into each request as an extension.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: Arc<Mutex<HashMap<String, Window>>>,
}

impl RateLimiter {
    /// Create a limiter enforcing `config`.
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Admit one request for `key`, or return how long until its window
    /// reopens.
    fn acquire(&self, key: &str) -> Result<(), Duration> {
        let length = Duration::from_secs(self.config.window_secs);
        let now = Instant::now();
        let mut windows = self.windows.lock();

        let window = windows.entry(key.to_owned()).or_insert(Window {
            opened: now,
            admitted: 0,
        });
        let elapsed = now.duration_since(window.opened);
        if elapsed >= length {
            *window = Window {
                opened: now,
                admitted: 0,
            };
        }

        if window.admitted < self.config.max_requests {
            window.admitted += 1;
            Ok(())
        } else {
            Err(length.saturating_sub(now.duration_since(window.opened)))
        }
    }
}

/// Window key for a request: the user id when authenticated, else the peer
/// IP, else the shared anonymous window.
fn caller_key(request: &Request) -> String {
    let extensions = request.extensions();
    if let Some(caller) = extensions.get::<CallerIdentity>() {
        return format!("user:{}", caller.user_id);
    }
    match extensions.get::<ConnectInfo<SocketAddr>>() {
        Some(ConnectInfo(peer)) => format!("ip:{}", peer.ip()),
        None => ANONYMOUS.to_owned(),
    }
}

/// Middleware enforcing the [`RateLimiter`] found in request extensions.
/// Without one, requests pass untouched.
pub async fn rate_limit_middleware(request: Request, next: Next) -> Response {
    let Some(limiter) = request.extensions().get::<RateLimiter>().cloned() else {
        return next.run(request).await;
    };
    let key = caller_key(&request);

    match limiter.acquire(&key) {
        Ok(()) => next.run(request).await,
        Err(wait) => {
            let retry_after = wait.as_secs().max(1);
            tracing::warn!(key = %key, retry_after, "rate limit exceeded");
            metrics::counter!("mediation_rate_limited_total").increment(1);
            (
                StatusCode::TOO_MANY_REQUESTS,
                [(header::RETRY_AFTER, retry_after.to_string())],
                Json(ErrorBody::new("RATE_LIMITED", "rate limit exceeded")),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::middleware::from_fn;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    fn limiter(max_requests: u64) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            max_requests,
            window_secs: 60,
        })
    }

    fn ping() -> Request {
        axum::http::Request::builder()
            .uri("/ping")
            .body(Body::empty())
            .unwrap()
    }

    fn ping_from(peer: &str) -> Request {
        let mut request = ping();
        let addr: SocketAddr = peer.parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(addr));
        request
    }

    #[test]
    fn windows_are_per_key() {
        let limiter = limiter(2);
        assert!(limiter.acquire("a").is_ok());
        assert!(limiter.acquire("a").is_ok());
        let wait = limiter.acquire("a").unwrap_err();
        assert!(wait <= Duration::from_secs(60));
        assert!(limiter.acquire("b").is_ok());
    }

    #[test]
    fn zero_length_window_never_blocks() {
        let limiter = RateLimiter::new(RateLimitConfig {
            max_requests: 1,
            window_secs: 0,
        });
        for _ in 0..5 {
            assert!(limiter.acquire("a").is_ok());
        }
    }

    #[tokio::test]
    async fn second_request_gets_429_with_retry_after() {
        let app = Router::new()
            .route("/ping", get(|| async { "pong" }))
            .layer(from_fn(rate_limit_middleware))
            .layer(axum::Extension(limiter(1)));

        let first = app.clone().oneshot(ping()).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app.oneshot(ping()).await.unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        let retry_after: u64 = second.headers()[header::RETRY_AFTER]
            .to_str()
            .unwrap()
            .parse()
            .unwrap();
        assert!((1..=60).contains(&retry_after));
    }

    #[tokio::test]
    async fn anonymous_clients_get_separate_windows() {
        let app = Router::new()
            .route("/ping", get(|| async { "pong" }))
            .layer(from_fn(rate_limit_middleware))
            .layer(axum::Extension(limiter(1)));

        let status = |r: Response| r.status();
        let first = app.clone().oneshot(ping_from("203.0.113.7:5000")).await.unwrap();
        assert_eq!(status(first), StatusCode::OK);
        // Same host on a new connection shares the window.
        let again = app.clone().oneshot(ping_from("203.0.113.7:5001")).await.unwrap();
        assert_eq!(status(again), StatusCode::TOO_MANY_REQUESTS);
        // Another host is unaffected.
        let other = app.oneshot(ping_from("198.51.100.2:5000")).await.unwrap();
        assert_eq!(status(other), StatusCode::OK);
    }

    #[test]
    fn caller_key_prefers_identity_then_peer() {
        assert_eq!(caller_key(&ping()), ANONYMOUS);
        assert_eq!(caller_key(&ping_from("[::1]:8080")), "ip:::1");
    }

    #[tokio::test]
    async fn missing_limiter_lets_requests_through() {
        let app = Router::new()
            .route("/ping", get(|| async { "pong" }))
            .layer(from_fn(rate_limit_middleware));
        for _ in 0..3 {
            assert_eq!(app.clone().oneshot(ping()).await.unwrap().status(), StatusCode::OK);
        }
    }
}
