//! Unauthenticated liveness and build-info routes.

use axum::extract::State;
use axum::response::Response;
use serde_json::json;
use std::sync::Arc;

use crate::rest::pipeline::{self, ApiResponse};
use crate::rest::API_VERSIONS;
use crate::AppContext;

pub async fn health(State(app): State<Arc<AppContext>>) -> Response {
    pipeline::simple("GET /health", move || async move {
        let db_ok = sqlx::query("SELECT 1")
            .execute(&app.storage.pool())
            .await
            .is_ok();
        ApiResponse::json(&json!({
            "status": if db_ok { "ok" } else { "degraded" },
            "version": env!("CARGO_PKG_VERSION"),
            "uptime_secs": app.started_at.elapsed().as_secs(),
            "db_ok": db_ok,
        }))
    })
    .await
}

pub async fn info(State(_app): State<Arc<AppContext>>) -> Response {
    pipeline::simple("GET /info", move || async move {
        ApiResponse::json(&json!({
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "apiVersions": API_VERSIONS,
        }))
    })
    .await
}
