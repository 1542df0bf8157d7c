//! Task persistence, bound to the request transaction.

use chrono::Utc;
use uuid::Uuid;

use crate::error::ApiError;
use crate::storage::SharedTx;
use crate::tasks::Task;

/// A draft that already passed service-level validation.
#[derive(Debug, Clone)]
pub struct ValidatedDraft {
    pub max_process_points: i64,
    pub geometry: String,
}

#[derive(Clone)]
pub struct TaskStore {
    tx: SharedTx,
}

impl TaskStore {
    pub fn new(tx: SharedTx) -> Self {
        Self { tx }
    }

    pub async fn get_tasks(&self, project_id: &str) -> Result<Vec<Task>, ApiError> {
        let mut tx = self.tx.lock().await;
        Ok(
            sqlx::query_as("SELECT * FROM tasks WHERE project_id = ? ORDER BY created_at, id")
                .bind(project_id)
                .fetch_all(&mut **tx)
                .await?,
        )
    }

    pub async fn get_task(&self, id: &str) -> Result<Task, ApiError> {
        let mut tx = self.tx.lock().await;
        let task: Option<Task> = sqlx::query_as("SELECT * FROM tasks WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?;
        task.ok_or_else(|| ApiError::NotFound(format!("task {id}")))
    }

    pub async fn count_tasks(&self, project_id: &str) -> Result<i64, ApiError> {
        let mut tx = self.tx.lock().await;
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tasks WHERE project_id = ?")
            .bind(project_id)
            .fetch_one(&mut **tx)
            .await?;
        Ok(row.0)
    }

    pub async fn add_tasks(
        &self,
        drafts: &[ValidatedDraft],
        project_id: &str,
    ) -> Result<Vec<Task>, ApiError> {
        let now = Utc::now().to_rfc3339();
        let mut tasks = Vec::with_capacity(drafts.len());
        let mut tx = self.tx.lock().await;
        for draft in drafts {
            let id = Uuid::new_v4().to_string();
            sqlx::query(
                "INSERT INTO tasks (id, project_id, process_points, max_process_points, geometry, assigned_user, created_at)
                 VALUES (?, ?, 0, ?, ?, '', ?)",
            )
            .bind(&id)
            .bind(project_id)
            .bind(draft.max_process_points)
            .bind(&draft.geometry)
            .bind(&now)
            .execute(&mut **tx)
            .await?;
            tasks.push(Task {
                id,
                process_points: 0,
                max_process_points: draft.max_process_points,
                geometry: draft.geometry.clone(),
                assigned_user: String::new(),
            });
        }
        Ok(tasks)
    }

    pub async fn assign_user(&self, id: &str, user_id: &str) -> Result<Task, ApiError> {
        {
            let mut tx = self.tx.lock().await;
            sqlx::query("UPDATE tasks SET assigned_user = ? WHERE id = ?")
                .bind(user_id)
                .bind(id)
                .execute(&mut **tx)
                .await?;
        }
        self.get_task(id).await
    }

    pub async fn unassign_user(&self, id: &str) -> Result<Task, ApiError> {
        {
            let mut tx = self.tx.lock().await;
            sqlx::query("UPDATE tasks SET assigned_user = '' WHERE id = ?")
                .bind(id)
                .execute(&mut **tx)
                .await?;
        }
        self.get_task(id).await
    }

    pub async fn set_process_points(&self, id: &str, points: i64) -> Result<Task, ApiError> {
        {
            let mut tx = self.tx.lock().await;
            sqlx::query("UPDATE tasks SET process_points = ? WHERE id = ?")
                .bind(points)
                .bind(id)
                .execute(&mut **tx)
                .await?;
        }
        self.get_task(id).await
    }

    pub async fn delete(&self, ids: &[String]) -> Result<(), ApiError> {
        let mut tx = self.tx.lock().await;
        for id in ids {
            sqlx::query("DELETE FROM tasks WHERE id = ?")
                .bind(id)
                .execute(&mut **tx)
                .await?;
        }
        Ok(())
    }
}
