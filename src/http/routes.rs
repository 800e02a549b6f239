//! HTTP routes.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use super::layer::AdmissionLayer;
use crate::ratelimit::{LimiterStats, SlidingWindowLimiter};

/// Build the service router with admin login guarded by `limiter`.
pub fn router(limiter: Arc<SlidingWindowLimiter>, trust_forwarded_headers: bool) -> Router {
    let admission =
        AdmissionLayer::new(Arc::clone(&limiter)).trust_forwarded_headers(trust_forwarded_headers);

    Router::new()
        .route("/api/v1/admin", post(admin_login).route_layer(admission))
        .route("/api/v1/admin/limits", get(limits))
        .route("/healthz", get(healthz))
        .with_state(limiter)
}

async fn healthz() -> &'static str {
    "ok"
}

/// Admin login attempts that made it past admission control.
///
/// Credential verification belongs to the authentication service behind this
/// endpoint; here the attempt is only acknowledged.
async fn admin_login() -> impl IntoResponse {
    info!("Admin login attempt admitted");
    (StatusCode::ACCEPTED, Json(json!({ "status": "admitted" })))
}

async fn limits(State(limiter): State<Arc<SlidingWindowLimiter>>) -> Json<LimiterStats> {
    Json(limiter.stats())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::{KeyScope, LimiterSettings};
    use axum::body::Body;
    use axum::http::Request;
    use std::time::Duration;
    use tower::ServiceExt;

    fn test_router(quota: usize, scope: KeyScope) -> (Router, Arc<SlidingWindowLimiter>) {
        let settings = LimiterSettings::new(quota, Duration::from_secs(600), scope);
        let limiter = Arc::new(SlidingWindowLimiter::new(settings).unwrap());
        (router(Arc::clone(&limiter), true), limiter)
    }

    fn login() -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/v1/admin")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_admin_login_limited() {
        let (app, _limiter) = test_router(1, KeyScope::Global);

        for _ in 0..2 {
            let response = app.clone().oneshot(login()).await.unwrap();
            assert_eq!(response.status(), StatusCode::ACCEPTED);
        }

        let response = app.clone().oneshot(login()).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_unguarded_routes_not_limited() {
        let (app, limiter) = test_router(0, KeyScope::Global);

        for _ in 0..5 {
            let request = Request::builder().uri("/healthz").body(Body::empty()).unwrap();
            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        assert_eq!(limiter.tracked_keys(), 0);
    }

    #[tokio::test]
    async fn test_limits_reports_stats() {
        let (app, _limiter) = test_router(5, KeyScope::Caller);

        app.clone().oneshot(login()).await.unwrap();

        let request = Request::builder()
            .uri("/api/v1/admin/limits")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let stats: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(stats["quota"], 5);
        assert_eq!(stats["allowance"], 6);
        assert_eq!(stats["scope"], "caller");
        assert_eq!(stats["tracked_keys"], 1);
    }
}
