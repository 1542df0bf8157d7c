// SPDX-License-Identifier: MIT
//! Per-request context.
//!
//! One `RequestContext` exists per authenticated call. It bundles the
//! verified identity with service instances that are all parameterized by
//! the same transaction handle, so every domain operation of the call
//! observes a single consistent snapshot and commits or rolls back
//! atomically. The context is dropped at the end of the call; it is never
//! persisted or shared across calls.

use std::sync::Arc;

use crate::auth::AuthenticatedUser;
use crate::config::DaemonConfig;
use crate::permission::PermissionService;
use crate::project::ProjectService;
use crate::storage::SharedTx;
use crate::tasks::store::TaskStore;
use crate::tasks::TaskService;

pub struct RequestContext {
    pub user: AuthenticatedUser,
    pub tasks: TaskService,
    pub projects: ProjectService,
    pub permissions: PermissionService,
}

impl RequestContext {
    pub fn new(user: AuthenticatedUser, tx: SharedTx, config: &DaemonConfig) -> Self {
        let permissions = PermissionService::new(Arc::clone(&tx));
        let tasks = TaskService::new(
            TaskStore::new(Arc::clone(&tx)),
            permissions.clone(),
            config.limits.max_tasks_per_project,
        );
        let projects = ProjectService::new(tx);
        Self {
            user,
            tasks,
            projects,
            permissions,
        }
    }
}
