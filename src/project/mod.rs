//! Project lookup and member management.
//!
//! Only what the task logic and the request pipeline need: project CRUD
//! proper lives behind its own (external) surface. All queries run on the
//! request transaction.

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::storage::SharedTx;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    pub owner: String,
    pub users: Vec<String>,
    pub needs_assigned_user: bool,
}

#[derive(Debug, sqlx::FromRow)]
struct ProjectRow {
    id: String,
    name: String,
    owner: String,
    users: String,
    needs_assigned_user: bool,
}

impl ProjectRow {
    fn into_project(self) -> Result<Project, ApiError> {
        let users: Vec<String> = serde_json::from_str(&self.users)
            .map_err(|_| ApiError::internal(format!("corrupt member list on project {}", self.id)))?;
        Ok(Project {
            id: self.id,
            name: self.name,
            owner: self.owner,
            users,
            needs_assigned_user: self.needs_assigned_user,
        })
    }
}

#[derive(Clone)]
pub struct ProjectService {
    tx: SharedTx,
}

impl ProjectService {
    pub fn new(tx: SharedTx) -> Self {
        Self { tx }
    }

    pub async fn get_project(&self, project_id: &str) -> Result<Project, ApiError> {
        let mut tx = self.tx.lock().await;
        let row: Option<ProjectRow> = sqlx::query_as("SELECT * FROM projects WHERE id = ?")
            .bind(project_id)
            .fetch_optional(&mut **tx)
            .await?;
        row.ok_or_else(|| ApiError::NotFound(format!("project {project_id}")))?
            .into_project()
    }

    /// Create a project owned (and initially solely populated) by `owner`.
    pub async fn create_project(
        &self,
        name: &str,
        owner: &str,
        needs_assigned_user: bool,
    ) -> Result<Project, ApiError> {
        let id = Uuid::new_v4().to_string();
        let users = serde_json::to_string(&[owner]).map_err(anyhow::Error::from)?;
        let now = Utc::now().to_rfc3339();
        {
            let mut tx = self.tx.lock().await;
            sqlx::query(
                "INSERT INTO projects (id, name, owner, users, needs_assigned_user, created_at)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(&id)
            .bind(name)
            .bind(owner)
            .bind(&users)
            .bind(needs_assigned_user)
            .bind(&now)
            .execute(&mut **tx)
            .await?;
        }
        info!(project = %id, owner, "created project");
        self.get_project(&id).await
    }

    /// Add `user_id` to the project's member list. Only the owner may add
    /// members; adding an existing member is an error.
    pub async fn add_user(
        &self,
        project_id: &str,
        user_id: &str,
        requesting_user: &str,
    ) -> Result<Project, ApiError> {
        let project = self.get_project(project_id).await?;
        if project.owner != requesting_user {
            return Err(ApiError::Authorization(format!(
                "user {requesting_user} is not the owner of project {project_id}"
            )));
        }
        if project.users.iter().any(|u| u == user_id) {
            return Err(ApiError::Validation(format!(
                "user {user_id} is already a member of project {project_id}"
            )));
        }

        let mut users = project.users.clone();
        users.push(user_id.to_string());
        self.store_users(project_id, &users).await?;
        info!(project = %project_id, user = %user_id, "added member");
        self.get_project(project_id).await
    }

    /// Idempotent membership grant used by the pipeline's bootstrap step.
    ///
    /// A missing project or a mismatched owner means the bootstrap section of
    /// the config is stale; that is logged and swallowed so it cannot take
    /// down every authenticated request. Storage failures still propagate.
    pub async fn ensure_member(
        &self,
        project_id: &str,
        user_id: &str,
        owner_uid: &str,
    ) -> Result<(), ApiError> {
        let project = match self.get_project(project_id).await {
            Ok(project) => project,
            Err(ApiError::NotFound(_)) => {
                warn!(project = %project_id, "bootstrap project does not exist, skipping grant");
                return Ok(());
            }
            Err(err) => return Err(err),
        };
        if project.owner != owner_uid {
            warn!(
                project = %project_id,
                configured_owner = %owner_uid,
                "bootstrap owner does not own the project, skipping grant"
            );
            return Ok(());
        }
        if project.users.iter().any(|u| u == user_id) {
            return Ok(());
        }

        let mut users = project.users;
        users.push(user_id.to_string());
        self.store_users(project_id, &users).await?;
        info!(project = %project_id, user = %user_id, "bootstrap membership grant");
        Ok(())
    }

    async fn store_users(&self, project_id: &str, users: &[String]) -> Result<(), ApiError> {
        let users_json = serde_json::to_string(users).map_err(anyhow::Error::from)?;
        let mut tx = self.tx.lock().await;
        sqlx::query("UPDATE projects SET users = ? WHERE id = ?")
            .bind(&users_json)
            .bind(project_id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}
