//! The request-handling pipeline.
//!
//! Two variants wrap every route handler:
//!
//! * [`simple`] for unauthenticated calls: per-call span, explicit
//!   error-to-response branch, JSON encoding.
//! * [`authenticated`] additionally verifies the bearer token, opens the
//!   request transaction, builds the [`RequestContext`] and guarantees the
//!   commit/rollback discipline: commit on success, rollback on any domain
//!   error, with rollback failures logged but never masking the original
//!   error shown to the caller.
//!
//! Error propagation is explicit `Result` values throughout. Genuine panics
//! are caught by the router's catch-panic layer and the dropped transaction
//! handle rolls back on its own, so the transaction can never be left open
//! regardless of how a handler fails.

use std::future::Future;
use std::sync::Arc;

use anyhow::anyhow;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn, Instrument};
use uuid::Uuid;

use crate::auth;
use crate::context::RequestContext;
use crate::error::ApiError;
use crate::AppContext;

/// What a domain handler hands back to the pipeline for encoding.
pub enum ApiResponse {
    Json(Value),
    Empty,
}

impl ApiResponse {
    pub fn json<T: Serialize>(data: &T) -> Result<Self, ApiError> {
        let value = serde_json::to_value(data)
            .map_err(|err| ApiError::Internal(anyhow!(err).context("failed to encode response")))?;
        Ok(ApiResponse::Json(value))
    }

    pub fn empty() -> Self {
        ApiResponse::Empty
    }
}

/// Wrap an unauthenticated handler: fresh per-call span, uniform encoding.
pub async fn simple<F, Fut>(route: &'static str, handler: F) -> Response
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<ApiResponse, ApiError>>,
{
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("request", %request_id, route);
    async move {
        debug!("unauthenticated request");
        match handler().await {
            Ok(response) => encode(response),
            Err(err) => {
                log_error(&err);
                encode_error(&err)
            }
        }
    }
    .instrument(span)
    .await
}

/// Wrap an authenticated, transactional handler.
///
/// Verifies the token, opens the request transaction, builds the context,
/// applies the configured bootstrap membership grant, invokes the handler
/// and settles the transaction. When this function returns, both the
/// response and the transaction are in a valid state.
pub async fn authenticated<F, Fut>(
    app: Arc<AppContext>,
    headers: &HeaderMap,
    route: &'static str,
    handler: F,
) -> Response
where
    F: FnOnce(RequestContext) -> Fut,
    Fut: Future<Output = Result<ApiResponse, ApiError>>,
{
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("request", %request_id, route);
    async move {
        // 401 before any context or transaction exists. The client gets a
        // fixed message; the actual reason is only logged.
        let user = match auth::bearer_token(headers)
            .ok_or_else(|| anyhow!("missing bearer token"))
            .and_then(|token| app.verifier.verify(token))
        {
            Ok(user) => user,
            Err(err) => {
                warn!(error = %err, "token verification failed");
                return encode_error(&ApiError::Authentication);
            }
        };
        info!(user = %user.name, uid = %user.uid, "authenticated request");

        let tx = match app.storage.begin().await {
            Ok(tx) => Arc::new(Mutex::new(tx)),
            Err(err) => {
                error!(error = ?err, "unable to open request transaction");
                return encode_error(&ApiError::Internal(err));
            }
        };

        // The context holds clones of the transaction handle; it must be
        // fully dropped (handler consumed it, or we drop it on the error
        // branch) before the transaction can be settled below.
        let result = {
            let ctx = RequestContext::new(user, Arc::clone(&tx), &app.config);
            match bootstrap_grant(&app, &ctx).await {
                Ok(()) => handler(ctx).await,
                Err(err) => {
                    drop(ctx);
                    Err(err)
                }
            }
        };

        let tx = match Arc::try_unwrap(tx) {
            Ok(lock) => lock.into_inner(),
            Err(_) => {
                error!("transaction handle still shared after handler completion");
                return encode_error(&ApiError::internal("transaction handle leaked"));
            }
        };

        match result {
            Ok(response) => {
                if let Err(err) = tx.commit().await {
                    error!(error = ?err, "unable to commit transaction");
                    return encode_error(&ApiError::Internal(err.into()));
                }
                debug!("committed transaction");
                encode(response)
            }
            Err(err) => {
                log_error(&err);
                // The rollback outcome is logged on its own; its failure
                // must not change the status the caller sees.
                match tx.rollback().await {
                    Ok(()) => debug!("rolled back transaction"),
                    Err(rollback_err) => {
                        error!(error = ?rollback_err, "rollback failed")
                    }
                }
                encode_error(&err)
            }
        }
    }
    .instrument(span)
    .await
}

/// Apply the configured bootstrap membership grant, if any, inside the
/// request transaction.
async fn bootstrap_grant(app: &AppContext, ctx: &RequestContext) -> Result<(), ApiError> {
    let Some(bootstrap) = &app.config.bootstrap else {
        return Ok(());
    };
    ctx.projects
        .ensure_member(&bootstrap.project_id, &ctx.user.uid, &bootstrap.owner_uid)
        .await
}

fn log_error(err: &ApiError) {
    match err {
        // Full chain for faults; the client only ever sees the masked message.
        ApiError::Internal(inner) => error!(error = ?inner, "internal fault"),
        other => warn!(error = %other, "domain error"),
    }
}

fn encode(response: ApiResponse) -> Response {
    match response {
        ApiResponse::Json(value) => (StatusCode::OK, Json(value)).into_response(),
        ApiResponse::Empty => StatusCode::OK.into_response(),
    }
}

fn encode_error(err: &ApiError) -> Response {
    (err.status(), Json(json!({ "error": err.public_message() }))).into_response()
}
