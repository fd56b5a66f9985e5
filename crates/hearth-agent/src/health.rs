//! Auxiliary health endpoints for deployment platforms.
//!
//! Served from a separate listener on a background task. Kept strictly
//! isolated from the session loop: the handlers share no mutable state
//! with the agent, so a slow probe can never stall the voice pipeline.
//! Startup failure here is a warning; the worker continues without
//! health endpoints.

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{info, warn};

async fn healthy() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

async fn ready() -> Json<Value> {
    Json(json!({ "status": "ready" }))
}

/// Builds the health router: `/` and `/health` report healthy, `/ready`
/// reports ready. No auth, no other verbs.
pub fn app() -> Router {
    Router::new()
        .route("/", get(healthy))
        .route("/health", get(healthy))
        .route("/ready", get(ready))
}

/// Serves the health endpoints until the process exits. Best effort:
/// bind and serve failures are logged and swallowed.
pub async fn serve(port: u16) {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            warn!("failed to start health server on {addr}: {e}");
            return;
        }
    };

    info!(%addr, "health server started");

    if let Err(e) = axum::serve(listener, app()).await {
        warn!("health server error: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    async fn get_json(path: &str) -> (StatusCode, Value) {
        let response = app()
            .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn root_and_health_report_healthy() {
        for path in ["/", "/health"] {
            let (status, json) = get_json(path).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(json["status"], "healthy");
        }
    }

    #[tokio::test]
    async fn ready_reports_ready() {
        let (status, json) = get_json("/ready").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ready");
    }
}
