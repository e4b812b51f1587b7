use axum::{middleware, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::services::ServeDir;

use crate::interceptor::{intercept, RequestInterceptor};

/// Serve the feed directory behind the analytics interceptor
pub fn create_router(feeds_dir: &str, interceptor: Arc<RequestInterceptor>) -> Router {
    let feeds = Router::new().fallback_service(ServeDir::new(feeds_dir));
    create_router_with_fallback(feeds, interceptor)
}

/// Wrap an arbitrary downstream router with the health check and interceptor
pub fn create_router_with_fallback(
    downstream: Router,
    interceptor: Arc<RequestInterceptor>,
) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .merge(downstream)
        .layer(middleware::from_fn_with_state(interceptor, intercept))
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    #[derive(Serialize)]
    struct HealthResponse {
        status: String,
    }

    Json(HealthResponse {
        status: "OK".to_string(),
    })
}
