use anyhow::{Context, Result};
use axum::extract::State;
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use tokio::net::TcpListener;

use crate::state::SharedStatus;

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

pub fn router(status: SharedStatus) -> Router {
    Router::new()
        .route("/api/status", get(api_status))
        .with_state(status)
}

async fn api_status(State(status): State<SharedStatus>) -> impl IntoResponse {
    let st = status.read().await;
    Json(st.clone())
}

// ---------------------------------------------------------------------------
// Server entry-point
// ---------------------------------------------------------------------------

pub async fn serve(status: SharedStatus, port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind web port {port}"))?;

    tracing::info!("status api listening on http://{addr}/api/status");

    axum::serve(listener, router(status))
        .await
        .context("web server error")
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StatusResponse;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use tokio::sync::RwLock;
    use tower::ServiceExt;

    #[tokio::test]
    async fn status_endpoint_returns_snapshot() {
        let status: SharedStatus = Arc::new(RwLock::new(StatusResponse::initial("240ac4123456")));
        status.write().await.cycles = 7;

        let resp = router(status)
            .oneshot(Request::get("/api/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let v: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(v["gateway_id"], "240ac4123456");
        assert_eq!(v["cycles"], 7);
        assert_eq!(v["long_range"], "disconnected");
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let status: SharedStatus = Arc::new(RwLock::new(StatusResponse::default()));
        let resp = router(status)
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
