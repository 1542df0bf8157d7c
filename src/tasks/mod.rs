//! Task domain logic.
//!
//! A task is either unassigned (empty `assigned_user`) or assigned to exactly
//! one user. Every mutation is gated by the permission service; any denial is
//! propagated unchanged. Process points move within `[0, max_process_points]`.

pub mod geometry;
pub mod store;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ApiError;
use crate::permission::PermissionService;
use store::{TaskStore, ValidatedDraft};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub process_points: i64,
    pub max_process_points: i64,
    pub geometry: String,
    /// Provider uid of the assigned user. Empty = unassigned.
    pub assigned_user: String,
}

/// Unvalidated task-creation input.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    pub max_process_points: i64,
    pub geometry: String,
}

pub struct TaskService {
    store: TaskStore,
    permissions: PermissionService,
    max_tasks_per_project: usize,
}

impl TaskService {
    pub fn new(
        store: TaskStore,
        permissions: PermissionService,
        max_tasks_per_project: usize,
    ) -> Self {
        Self {
            store,
            permissions,
            max_tasks_per_project,
        }
    }

    /// Get all tasks of a project. Requires project membership.
    pub async fn get_tasks(
        &self,
        project_id: &str,
        requesting_user: &str,
    ) -> Result<Vec<Task>, ApiError> {
        self.permissions
            .verify_membership_project(project_id, requesting_user)
            .await?;
        self.store.get_tasks(project_id).await
    }

    /// Bulk-create tasks from drafts. All-or-nothing: every draft is
    /// validated before the first write, so a bad draft rejects the whole
    /// batch without partial inserts.
    pub async fn add_tasks(
        &self,
        drafts: &[TaskDraft],
        project_id: &str,
    ) -> Result<Vec<Task>, ApiError> {
        let mut validated = Vec::with_capacity(drafts.len());
        for draft in drafts {
            if draft.max_process_points < 1 {
                return Err(ApiError::Validation(format!(
                    "maximum process points must be at least 1 ({})",
                    draft.max_process_points
                )));
            }
            validated.push(ValidatedDraft {
                max_process_points: draft.max_process_points,
                geometry: geometry::validate(&draft.geometry)?,
            });
        }

        let existing = self.store.count_tasks(project_id).await?;
        if existing as usize + validated.len() > self.max_tasks_per_project {
            return Err(ApiError::Validation(format!(
                "project {project_id} would exceed the maximum of {} tasks",
                self.max_tasks_per_project
            )));
        }

        let tasks = self.store.add_tasks(&validated, project_id).await?;
        info!(project = %project_id, count = tasks.len(), "added tasks");
        debug!(ids = ?task_ids(&tasks), "added task ids");
        Ok(tasks)
    }

    /// Assign a user to an unassigned task. First caller wins: an already
    /// assigned task is never overwritten.
    pub async fn assign_user(&self, task_id: &str, user_id: &str) -> Result<Task, ApiError> {
        let task = self.store.get_task(task_id).await?;
        if !task.assigned_user.trim().is_empty() {
            return Err(ApiError::Validation(format!(
                "task {} already has an assigned user, cannot overwrite",
                task.id
            )));
        }

        let task = self.store.assign_user(task_id, user_id).await?;
        info!(task = %task_id, user = %user_id, "assigned user");
        Ok(task)
    }

    /// Unassign the task. The permission service decides who may do this.
    pub async fn unassign_user(
        &self,
        task_id: &str,
        requesting_user: &str,
    ) -> Result<Task, ApiError> {
        self.permissions
            .verify_assignment(task_id, requesting_user)
            .await?;
        let task = self.store.unassign_user(task_id).await?;
        info!(task = %task_id, user = %requesting_user, "unassigned user");
        Ok(task)
    }

    /// Update the process points of a task.
    ///
    /// When the owning project requires an assigned user, the requester must
    /// be that user; otherwise plain project membership suffices. The new
    /// value must lie in `[0, max_process_points]`.
    pub async fn set_process_points(
        &self,
        task_id: &str,
        new_points: i64,
        requesting_user: &str,
    ) -> Result<Task, ApiError> {
        if self.permissions.assignment_in_task_needed(task_id).await? {
            self.permissions
                .verify_assignment(task_id, requesting_user)
                .await?;
        } else {
            self.permissions
                .verify_membership_task(task_id, requesting_user)
                .await?;
        }

        let task = self.store.get_task(task_id).await?;
        if new_points < 0 || task.max_process_points < new_points {
            return Err(ApiError::Validation(format!(
                "process points out of range (0..={})",
                task.max_process_points
            )));
        }

        let task = self.store.set_process_points(task_id, new_points).await?;
        info!(task = %task_id, points = new_points, "set process points");
        Ok(task)
    }

    /// Delete the given tasks. The requester must be a member of every
    /// referenced task's project. Since tasks hold the project reference
    /// themselves, deletion leaves no stale backreferences behind.
    pub async fn delete(&self, task_ids: &[String], requesting_user: &str) -> Result<(), ApiError> {
        self.permissions
            .verify_membership_tasks(task_ids, requesting_user)
            .await?;
        self.store.delete(task_ids).await?;
        info!(tasks = ?task_ids, "deleted tasks");
        Ok(())
    }
}

fn task_ids(tasks: &[Task]) -> Vec<&str> {
    tasks.iter().map(|t| t.id.as_str()).collect()
}
