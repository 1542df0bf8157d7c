pub mod auth;
pub mod config;
pub mod context;
pub mod error;
pub mod permission;
pub mod project;
pub mod rest;
pub mod storage;
pub mod tasks;

use std::sync::Arc;

use auth::TokenVerifier;
use config::DaemonConfig;
use storage::Storage;

/// Shared application state passed to every route handler.
///
/// Constructed once in `main` and never mutated afterwards; all per-call
/// state lives in `context::RequestContext`.
pub struct AppContext {
    pub config: Arc<DaemonConfig>,
    pub storage: Arc<Storage>,
    pub verifier: TokenVerifier,
    pub started_at: std::time::Instant,
}
