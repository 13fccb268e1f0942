//! # mediation-api — Axum API Services for the Mediation Stack
//!
//! HTTP backend for dispute mediation. Users file disputes against other
//! users, a mediator moves them through `not_started → started → closed`,
//! and participants talk in a comment thread with file attachments.
//!
//! ## API Surface
//!
//! | Prefix                          | Module                 | Auth     |
//! |---------------------------------|------------------------|----------|
//! | `/auth/token/login/`            | [`routes::auth`]       | none     |
//! | `/auth/register/`               | [`routes::auth`]       | none     |
//! | `/auth/token/logout/`           | [`routes::auth`]       | bearer   |
//! | `/v1/users/*`                   | [`routes::users`]      | bearer   |
//! | `/v1/disputes/*`                | [`routes::disputes`]   | bearer   |
//! | `/v1/disputes/{id}/comments/*`  | [`routes::comments`]   | bearer   |
//! | `/v1/disputes/{id}/files/`, `/v1/files/*` | [`routes::files`] | bearer |
//! | `/openapi.json`                 | [`openapi`]            | none     |
//! | `/health/*`, `/metrics`         | this module            | none     |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → MetricsMiddleware → RegistrationGuard → BodyLimit
//!     → AuthMiddleware (protected routes only) → RateLimitMiddleware → Handler
//! ```
//!
//! ## Persistence
//!
//! State lives in in-memory stores. With `DATABASE_URL` set, every write is
//! mirrored to Postgres and the stores are hydrated from it on startup.

pub mod auth;
pub mod bootstrap;
pub mod db;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod openapi;
pub mod pagination;
pub mod routes;
pub mod state;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Router};

use crate::middleware::metrics::{metrics_middleware, record_domain_gauges};
use crate::middleware::rate_limit::{rate_limit_middleware, RateLimitConfig, RateLimiter};
use crate::middleware::registration::{registration_guard, RegistrationPolicy};
use crate::middleware::tracing_layer;
use crate::state::AppState;

/// Assemble the full application router with all routes and middleware.
///
/// Health probes and `/metrics` are mounted outside every middleware so
/// they stay reachable without credentials and do not count toward the
/// request metrics.
pub fn app(state: AppState) -> Router {
    let limiter = RateLimiter::new(RateLimitConfig {
        max_requests: state.config.rate_limit_per_minute,
        window_secs: 60,
    });
    let registration = RegistrationPolicy {
        enabled: state.config.registration_enabled,
    };

    // Token-authenticated routes.
    let protected = Router::new()
        .merge(routes::auth::router())
        .merge(routes::users::router())
        .merge(routes::disputes::router())
        .merge(routes::comments::router())
        .merge(routes::files::router())
        .layer(from_fn(rate_limit_middleware))
        .layer(from_fn_with_state(state.clone(), auth::auth_middleware));

    // Login, registration and the OpenAPI document.
    let public = Router::new()
        .merge(routes::auth::public_router())
        .merge(openapi::router())
        .layer(from_fn(rate_limit_middleware));

    let api = Router::new()
        .merge(public)
        .merge(protected)
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .layer(from_fn(registration_guard))
        .layer(from_fn(metrics_middleware))
        .layer(tracing_layer::layer())
        .layer(Extension(registration))
        .layer(Extension(limiter))
        .with_state(state.clone());

    let health = Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness))
        .route("/metrics", get(render_metrics))
        .with_state(state);

    Router::new().merge(health).merge(api)
}

/// Liveness probe. Always returns 200 if the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe. Returns 200 when the application is ready to serve.
async fn readiness() -> &'static str {
    "ready"
}

/// GET /metrics — Prometheus text exposition. 404 when metrics are disabled.
async fn render_metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => {
            record_domain_gauges(&state);
            handle.render().into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
