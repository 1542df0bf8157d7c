//! Membership and assignment verification.
//!
//! Every check either succeeds or returns an error the caller propagates
//! unchanged. The task service never makes its own policy decisions, it
//! only asks this service. All queries run on the request transaction.

use serde_json::Value;

use crate::error::ApiError;
use crate::storage::SharedTx;

#[derive(Clone)]
pub struct PermissionService {
    tx: SharedTx,
}

impl PermissionService {
    pub fn new(tx: SharedTx) -> Self {
        Self { tx }
    }

    /// Verify that `user_id` is a member of the project.
    pub async fn verify_membership_project(
        &self,
        project_id: &str,
        user_id: &str,
    ) -> Result<(), ApiError> {
        let mut tx = self.tx.lock().await;
        let row: Option<(String,)> = sqlx::query_as("SELECT users FROM projects WHERE id = ?")
            .bind(project_id)
            .fetch_optional(&mut **tx)
            .await?;
        let (users,) = row.ok_or_else(|| ApiError::NotFound(format!("project {project_id}")))?;
        check_membership(&users, user_id, &format!("project {project_id}"))
    }

    /// Verify that `user_id` is a member of the project the task belongs to.
    pub async fn verify_membership_task(
        &self,
        task_id: &str,
        user_id: &str,
    ) -> Result<(), ApiError> {
        let mut tx = self.tx.lock().await;
        let row: Option<(String, String)> = sqlx::query_as(
            "SELECT p.id, p.users FROM projects p
             JOIN tasks t ON t.project_id = p.id
             WHERE t.id = ?",
        )
        .bind(task_id)
        .fetch_optional(&mut **tx)
        .await?;
        let (project_id, users) =
            row.ok_or_else(|| ApiError::NotFound(format!("task {task_id}")))?;
        check_membership(&users, user_id, &format!("project {project_id}"))
    }

    /// Verify membership for the owning projects of ALL given tasks.
    pub async fn verify_membership_tasks(
        &self,
        task_ids: &[String],
        user_id: &str,
    ) -> Result<(), ApiError> {
        for task_id in task_ids {
            self.verify_membership_task(task_id, user_id).await?;
        }
        Ok(())
    }

    /// Verify that `user_id` is the user assigned to the task.
    pub async fn verify_assignment(&self, task_id: &str, user_id: &str) -> Result<(), ApiError> {
        let mut tx = self.tx.lock().await;
        let row: Option<(String,)> =
            sqlx::query_as("SELECT assigned_user FROM tasks WHERE id = ?")
                .bind(task_id)
                .fetch_optional(&mut **tx)
                .await?;
        let (assigned_user,) =
            row.ok_or_else(|| ApiError::NotFound(format!("task {task_id}")))?;
        if assigned_user != user_id {
            return Err(ApiError::Authorization(format!(
                "user {user_id} is not assigned to task {task_id}"
            )));
        }
        Ok(())
    }

    /// Does the task's project require an assigned user for point updates?
    pub async fn assignment_in_task_needed(&self, task_id: &str) -> Result<bool, ApiError> {
        let mut tx = self.tx.lock().await;
        let row: Option<(bool,)> = sqlx::query_as(
            "SELECT p.needs_assigned_user FROM projects p
             JOIN tasks t ON t.project_id = p.id
             WHERE t.id = ?",
        )
        .bind(task_id)
        .fetch_optional(&mut **tx)
        .await?;
        let (needed,) = row.ok_or_else(|| ApiError::NotFound(format!("task {task_id}")))?;
        Ok(needed)
    }
}

/// Parse the JSON member list stored on the project row and check `user_id`
/// against it.
fn check_membership(users_json: &str, user_id: &str, scope: &str) -> Result<(), ApiError> {
    let users: Vec<String> = match serde_json::from_str::<Value>(users_json) {
        Ok(Value::Array(values)) => values
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => {
            return Err(ApiError::internal(format!(
                "corrupt member list on {scope}"
            )))
        }
    };
    if !users.iter().any(|u| u == user_id) {
        return Err(ApiError::Authorization(format!(
            "user {user_id} is not a member of {scope}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_membership_accepts_member() {
        assert!(check_membership(r#"["1","2","3"]"#, "2", "project p").is_ok());
    }

    #[test]
    fn test_check_membership_rejects_non_member() {
        let err = check_membership(r#"["1","2"]"#, "9", "project p").unwrap_err();
        assert!(matches!(err, ApiError::Authorization(_)));
    }

    #[test]
    fn test_check_membership_rejects_corrupt_list() {
        let err = check_membership("not json", "1", "project p").unwrap_err();
        assert!(matches!(err, ApiError::Internal(_)));
    }
}
