//! HTTP sink integration tests
//!
//! A throwaway collector is bound on an ephemeral local port so the sink
//! talks to a real HTTP server.

use axum::{extract::State, http::HeaderMap, http::StatusCode, routing::post, Json, Router};
use icstrack::analytics::{AnalyticsRecord, AnalyticsSink, HttpSink, SinkError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

#[derive(Default)]
struct Collected {
    bodies: Mutex<Vec<serde_json::Value>>,
    auth: Mutex<Vec<Option<String>>>,
}

async fn collect(
    State(collected): State<Arc<Collected>>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> StatusCode {
    collected.bodies.lock().await.push(body);
    collected.auth.lock().await.push(
        headers
            .get("authorization")
            .and_then(|h| h.to_str().ok())
            .map(str::to_string),
    );
    StatusCode::NO_CONTENT
}

async fn spawn_collector(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

fn sample_record() -> AnalyticsRecord {
    AnalyticsRecord {
        indexes: vec!["abc123".to_string()],
        blobs: vec![
            "/ipo.ics".to_string(),
            String::new(),
            "TestAgent/1.0".to_string(),
            "US".to_string(),
        ],
        doubles: vec![],
    }
}

#[tokio::test]
async fn test_http_sink_posts_json_record() {
    let collected = Arc::new(Collected::default());
    let router = Router::new()
        .route("/collect", post(collect))
        .with_state(Arc::clone(&collected));
    let base = spawn_collector(router).await;

    let sink = HttpSink::new(
        format!("{}/collect", base),
        Some("secret-token".to_string()),
        Duration::from_secs(5),
    )
    .unwrap();

    sink.write_data_point(sample_record()).await.unwrap();

    let bodies = collected.bodies.lock().await;
    assert_eq!(bodies.len(), 1);
    assert_eq!(
        bodies[0],
        serde_json::json!({
            "indexes": ["abc123"],
            "blobs": ["/ipo.ics", "", "TestAgent/1.0", "US"],
            "doubles": []
        })
    );
    assert_eq!(
        collected.auth.lock().await[0].as_deref(),
        Some("Bearer secret-token")
    );
}

#[tokio::test]
async fn test_http_sink_without_token_sends_no_auth() {
    let collected = Arc::new(Collected::default());
    let router = Router::new()
        .route("/collect", post(collect))
        .with_state(Arc::clone(&collected));
    let base = spawn_collector(router).await;

    let sink = HttpSink::new(format!("{}/collect", base), None, Duration::from_secs(5)).unwrap();
    sink.write_data_point(sample_record()).await.unwrap();

    assert_eq!(collected.auth.lock().await[0], None);
}

#[tokio::test]
async fn test_http_sink_maps_error_status() {
    let router = Router::new().route(
        "/collect",
        post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "overloaded") }),
    );
    let base = spawn_collector(router).await;

    let sink = HttpSink::new(format!("{}/collect", base), None, Duration::from_secs(5)).unwrap();
    let err = sink.write_data_point(sample_record()).await.unwrap_err();

    match err {
        SinkError::Status { status, body } => {
            assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
            assert_eq!(body, "overloaded");
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_http_sink_unreachable_collector() {
    // Bind then drop to get a port with nothing listening
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let sink = HttpSink::new(format!("http://{}/collect", addr), None, Duration::from_secs(2))
        .unwrap();
    let err = sink.write_data_point(sample_record()).await.unwrap_err();

    assert!(matches!(err, SinkError::Transport(_)));
}
