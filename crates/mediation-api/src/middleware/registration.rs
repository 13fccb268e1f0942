//! # Registration Guard
//!
//! Self-registration is closed by default. While it is closed, every
//! request for `/auth/register/` or a path below it is answered with 403
//! before routing, whatever its method. Siblings that merely share the
//! prefix, such as `/auth/registered`, are not affected.

use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::error::ErrorBody;

/// Path covered by the guard, together with everything below it.
pub const REGISTRATION_PATH: &str = "/auth/register/";

fn is_registration_path(path: &str) -> bool {
    path.starts_with(REGISTRATION_PATH) || path == REGISTRATION_PATH.trim_end_matches('/')
}

/// Whether self-registration is open. Injected as a request extension.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegistrationPolicy {
    /// `true` opens `POST /auth/register/`.
    pub enabled: bool,
}

/// Middleware that rejects registration requests while registration is
/// disabled. A missing [`RegistrationPolicy`] extension counts as disabled.
pub async fn registration_guard(request: Request, next: Next) -> Response {
    let enabled = request
        .extensions()
        .get::<RegistrationPolicy>()
        .is_some_and(|policy| policy.enabled);

    if !enabled && is_registration_path(request.uri().path()) {
        tracing::warn!(path = %request.uri().path(), "registration attempt while registration is disabled");
        return (
            StatusCode::FORBIDDEN,
            Json(ErrorBody::new("FORBIDDEN", "Registration is not allowed")),
        )
            .into_response();
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use axum::middleware::from_fn;
    use axum::routing::{get, post};
    use axum::Router;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_app(enabled: bool) -> Router {
        Router::new()
            .route("/auth/register/", post(|| async { "registered" }))
            .route("/auth/register/activation/", post(|| async { "activated" }))
            .route("/auth/registered", get(|| async { "ok" }))
            .route("/other", get(|| async { "ok" }))
            .layer(from_fn(registration_guard))
            .layer(axum::Extension(RegistrationPolicy { enabled }))
    }

    async fn status_of(app: Router, method: &str, uri: &str) -> StatusCode {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        app.oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn disabled_blocks_every_method_and_subpath() {
        assert_eq!(status_of(test_app(false), "POST", "/auth/register/").await, StatusCode::FORBIDDEN);
        assert_eq!(status_of(test_app(false), "GET", "/auth/register/").await, StatusCode::FORBIDDEN);
        assert_eq!(
            status_of(test_app(false), "POST", "/auth/register/activation/").await,
            StatusCode::FORBIDDEN
        );
    }

    #[tokio::test]
    async fn disabled_message_is_stable() {
        let request = Request::builder()
            .method("POST")
            .uri("/auth/register/")
            .body(Body::empty())
            .unwrap();
        let response = test_app(false).oneshot(request).await.unwrap();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let err: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(err["error"]["message"], "Registration is not allowed");
    }

    #[tokio::test]
    async fn enabled_passes_through() {
        assert_eq!(status_of(test_app(true), "POST", "/auth/register/").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn other_paths_unaffected() {
        assert_eq!(status_of(test_app(false), "GET", "/other").await, StatusCode::OK);
        assert_eq!(status_of(test_app(false), "GET", "/auth/registered").await, StatusCode::OK);
    }

    #[test]
    fn guard_matches_path_segments_not_prefixes() {
        assert!(is_registration_path("/auth/register/"));
        assert!(is_registration_path("/auth/register"));
        assert!(is_registration_path("/auth/register/activation/"));
        assert!(!is_registration_path("/auth/registered"));
        assert!(!is_registration_path("/auth/registration-help/"));
    }
}
