//! Task routes. Thin: extract, then hand off to the pipeline.

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

use crate::rest::pipeline::{self, ApiResponse};
use crate::tasks::TaskDraft;
use crate::AppContext;

pub async fn get_project_tasks(
    State(app): State<Arc<AppContext>>,
    Path(project_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    pipeline::authenticated(app, &headers, "GET /projects/{id}/tasks", move |ctx| {
        async move {
            let tasks = ctx.tasks.get_tasks(&project_id, &ctx.user.uid).await?;
            ApiResponse::json(&tasks)
        }
    })
    .await
}

pub async fn add_tasks(
    State(app): State<Arc<AppContext>>,
    Path(project_id): Path<String>,
    headers: HeaderMap,
    Json(drafts): Json<Vec<TaskDraft>>,
) -> Response {
    pipeline::authenticated(app, &headers, "POST /projects/{id}/tasks", move |ctx| {
        async move {
            let tasks = ctx.tasks.add_tasks(&drafts, &project_id).await?;
            ApiResponse::json(&tasks)
        }
    })
    .await
}

pub async fn assign_task(
    State(app): State<Arc<AppContext>>,
    Path(task_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    pipeline::authenticated(app, &headers, "POST /tasks/{id}/assignment", move |ctx| {
        async move {
            let task = ctx.tasks.assign_user(&task_id, &ctx.user.uid).await?;
            ApiResponse::json(&task)
        }
    })
    .await
}

pub async fn unassign_task(
    State(app): State<Arc<AppContext>>,
    Path(task_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    pipeline::authenticated(app, &headers, "DELETE /tasks/{id}/assignment", move |ctx| {
        async move {
            let task = ctx.tasks.unassign_user(&task_id, &ctx.user.uid).await?;
            ApiResponse::json(&task)
        }
    })
    .await
}

#[derive(Deserialize)]
pub struct PointsQuery {
    points: i64,
}

pub async fn set_process_points(
    State(app): State<Arc<AppContext>>,
    Path(task_id): Path<String>,
    Query(query): Query<PointsQuery>,
    headers: HeaderMap,
) -> Response {
    pipeline::authenticated(app, &headers, "POST /tasks/{id}/points", move |ctx| {
        async move {
            let task = ctx
                .tasks
                .set_process_points(&task_id, query.points, &ctx.user.uid)
                .await?;
            ApiResponse::json(&task)
        }
    })
    .await
}

#[derive(Deserialize)]
pub struct DeleteQuery {
    /// Comma-separated task ids.
    ids: String,
}

pub async fn delete_tasks(
    State(app): State<Arc<AppContext>>,
    Query(query): Query<DeleteQuery>,
    headers: HeaderMap,
) -> Response {
    pipeline::authenticated(app, &headers, "DELETE /tasks", move |ctx| {
        async move {
            let ids: Vec<String> = query
                .ids
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .collect();
            ctx.tasks.delete(&ids, &ctx.user.uid).await?;
            Ok(ApiResponse::empty())
        }
    })
    .await
}
