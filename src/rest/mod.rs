//! Public REST API server.
//!
//! Endpoints:
//!   GET    /api/v1/health
//!   GET    /api/v1/info
//!   GET    /api/v1/projects/{id}/tasks
//!   POST   /api/v1/projects/{id}/tasks
//!   POST   /api/v1/tasks/{id}/assignment
//!   DELETE /api/v1/tasks/{id}/assignment
//!   POST   /api/v1/tasks/{id}/points
//!   DELETE /api/v1/tasks

pub mod pipeline;
pub mod routes;

use anyhow::Result;
use axum::http::Response as HttpResponse;
use axum::routing::{delete, get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::AppContext;

/// API versions this build serves, oldest first.
pub const API_VERSIONS: &[&str] = &["v1"];

pub async fn serve(ctx: Arc<AppContext>) -> Result<()> {
    let bind = format!("{}:{}", ctx.config.bind_address, ctx.config.port);
    let addr: SocketAddr = bind.parse()?;

    let router = build_router(ctx);

    info!("REST API listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}

pub fn build_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        // Liveness + build info (no auth)
        .route("/api/v1/health", get(routes::info::health))
        .route("/api/v1/info", get(routes::info::info))
        // Tasks
        .route(
            "/api/v1/projects/{id}/tasks",
            get(routes::tasks::get_project_tasks).post(routes::tasks::add_tasks),
        )
        .route(
            "/api/v1/tasks/{id}/assignment",
            post(routes::tasks::assign_task).delete(routes::tasks::unassign_task),
        )
        .route(
            "/api/v1/tasks/{id}/points",
            post(routes::tasks::set_process_points),
        )
        .route("/api/v1/tasks", delete(routes::tasks::delete_tasks))
        // Last line of defense: a panicking handler becomes a 500 and its
        // dropped transaction handle rolls back on its own.
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}

fn handle_panic(err: Box<dyn std::any::Any + Send + 'static>) -> HttpResponse<axum::body::Body> {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unknown panic payload".to_string()
    };
    error!(panic = %detail, "request handler panicked");

    HttpResponse::builder()
        .status(500)
        .header("content-type", "application/json")
        .body(axum::body::Body::from(
            r#"{"error":"internal server error"}"#,
        ))
        .expect("static response must build")
}
