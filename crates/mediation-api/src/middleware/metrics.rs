//! # Prometheus Metrics
//!
//! HTTP request metrics recorded through the `metrics` facade. The binary
//! installs a `metrics-exporter-prometheus` recorder when metrics are
//! enabled; without a recorder every macro call is a no-op.
//!
//! Domain gauges (disputes by status, users, comments, files) are refreshed
//! on each `/metrics` scrape by [`record_domain_gauges`].

use std::time::Instant;

use axum::extract::{MatchedPath, Request};
use axum::middleware::Next;
use axum::response::Response;
use mediation_disputes::DisputeStatus;

use crate::state::AppState;

/// Path label for requests no route matched. Raw paths would give every
/// stray 404 its own series.
const UNMATCHED: &str = "unmatched";

/// Middleware that records request count, latency and error count.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| UNMATCHED.to_string(), |matched| matched.as_str().to_string());
    let start = Instant::now();

    let response = next.run(request).await;

    let status = response.status();
    let status_label = status.as_u16().to_string();
    metrics::counter!(
        "mediation_http_requests_total",
        "method" => method.clone(),
        "path" => path.clone(),
        "status" => status_label.clone()
    )
    .increment(1);
    metrics::histogram!(
        "mediation_http_request_duration_seconds",
        "method" => method.clone(),
        "path" => path.clone()
    )
    .record(start.elapsed().as_secs_f64());
    if status.is_client_error() || status.is_server_error() {
        metrics::counter!(
            "mediation_http_errors_total",
            "method" => method,
            "path" => path,
            "status" => status_label
        )
        .increment(1);
    }

    response
}

/// Set domain gauges from the current in-memory state.
pub fn record_domain_gauges(state: &AppState) {
    for status in [
        DisputeStatus::NotStarted,
        DisputeStatus::Started,
        DisputeStatus::Closed,
    ] {
        let count = state.disputes.filter(|d| d.status == status).len();
        metrics::gauge!("mediation_disputes_total", "status" => status.as_str()).set(count as f64);
    }
    metrics::gauge!("mediation_users_total").set(state.users.len() as f64);
    metrics::gauge!("mediation_comments_total").set(state.comments.len() as f64);
    metrics::gauge!("mediation_files_total").set(state.files.len() as f64);
    metrics::gauge!("mediation_auth_tokens_total").set(state.tokens.len() as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unmatched_paths_share_one_label() {
        use axum::body::Body;
        use axum::http::StatusCode;
        use axum::middleware::from_fn;
        use axum::routing::get;
        use axum::Router;
        use metrics_exporter_prometheus::PrometheusBuilder;
        use tower::ServiceExt;

        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let _guard = metrics::set_default_local_recorder(&recorder);

        let app = Router::new()
            .route("/v1/disputes/{id}/", get(|| async { "ok" }))
            .fallback(|| async { StatusCode::NOT_FOUND })
            .layer(from_fn(metrics_middleware));
        for uri in [
            "/v1/disputes/550e8400-e29b-41d4-a716-446655440000/",
            "/wp-login.php",
            "/scan/550e8400-e29b-41d4-a716-446655440000/a",
            "/scan/b",
        ] {
            let request = axum::http::Request::builder()
                .uri(uri)
                .body(Body::empty())
                .unwrap();
            app.clone().oneshot(request).await.unwrap();
        }

        let rendered = handle.render();
        assert!(rendered.contains(r#"path="/v1/disputes/{id}/""#));
        assert!(rendered.contains(r#"path="unmatched""#));
        assert!(!rendered.contains("wp-login"));
        assert!(!rendered.contains("/scan/"));
    }

    #[test]
    fn gauges_without_recorder_are_noops() {
        record_domain_gauges(&AppState::new());
    }
}
