//! PostgreSQL-backed repositories

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{DatabaseError, DatabaseResult};
use sqlx::{PgPool, Row, migrate::Migrator, postgres::PgRow};
use tracing::{debug, info};
use uuid::Uuid;

use super::{
    DependencyRepository, ProjectRepository, SessionRepository, TaskRepository, UserRepository,
};
use crate::graph;
use crate::models::{
    Dependency, ExcludedTimePeriod, NewProject, NewTask, NewTimePeriod, NewUser, Project, Session,
    Task, UpdateProject, UpdateTask, UpdateUser, User, project::excluded_days_from_slice,
};

/// Schema migrations embedded at compile time
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Store implementing every repository over one connection pool
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a new store
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn project_from_row(row: &PgRow) -> Result<Project, sqlx::Error> {
    let days: Vec<bool> = row.try_get("excluded_days")?;
    Ok(Project {
        id: row.try_get("id")?,
        owner_username: row.try_get("owner_username")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        excluded_days: excluded_days_from_slice(&days),
    })
}

#[async_trait]
impl UserRepository for PgStore {
    async fn find_by_username(&self, username: &str) -> DatabaseResult<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT username, display_name, password_hash, profile_photo, created_at, updated_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_query)
    }

    async fn create(&self, new_user: &NewUser) -> DatabaseResult<User> {
        info!("Creating new user: {}", new_user.username);

        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, display_name, password_hash)
            VALUES ($1, $2, $3)
            RETURNING username, display_name, password_hash, profile_photo, created_at, updated_at
            "#,
        )
        .bind(&new_user.username)
        .bind(&new_user.display_name)
        .bind(&new_user.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_query)
    }

    async fn update(&self, username: &str, changes: &UpdateUser) -> DatabaseResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET display_name = COALESCE($2, display_name),
                profile_photo = COALESCE($3, profile_photo),
                password_hash = COALESCE($4, password_hash),
                updated_at = NOW()
            WHERE username = $1
            "#,
        )
        .bind(username)
        .bind(&changes.display_name)
        .bind(&changes.profile_photo)
        .bind(&changes.password_hash)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_query)?;

        Ok(result.rows_affected() > 0)
    }

    async fn rename(&self, username: &str, new_username: &str) -> DatabaseResult<bool> {
        info!("Renaming user {} to {}", username, new_username);

        // projects and sessions follow through ON UPDATE CASCADE
        let result = sqlx::query(
            r#"
            UPDATE users
            SET username = $2, updated_at = NOW()
            WHERE username = $1
            "#,
        )
        .bind(username)
        .bind(new_username)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_query)?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl SessionRepository for PgStore {
    async fn create(&self, session: &Session) -> DatabaseResult<()> {
        sqlx::query(
            r#"
            INSERT INTO user_sessions (token, username, expires_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(&session.token)
        .bind(&session.username)
        .bind(session.expires_at)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_query)?;

        Ok(())
    }

    async fn find_by_token(&self, token: &str) -> DatabaseResult<Option<Session>> {
        sqlx::query_as::<_, Session>(
            r#"
            SELECT token, username, expires_at
            FROM user_sessions
            WHERE token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_query)
    }

    async fn delete(&self, token: &str) -> DatabaseResult<bool> {
        let result = sqlx::query("DELETE FROM user_sessions WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::from_query)?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> DatabaseResult<u64> {
        let result = sqlx::query("DELETE FROM user_sessions WHERE expires_at < $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::from_query)?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl ProjectRepository for PgStore {
    async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<Project>> {
        let row = sqlx::query(
            r#"
            SELECT id, owner_username, name, description, excluded_days
            FROM projects
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_query)?;

        row.as_ref()
            .map(project_from_row)
            .transpose()
            .map_err(DatabaseError::from_query)
    }

    async fn list_by_owner(&self, owner: &str) -> DatabaseResult<Vec<Project>> {
        let rows = sqlx::query(
            r#"
            SELECT id, owner_username, name, description, excluded_days
            FROM projects
            WHERE owner_username = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_query)?;

        rows.iter()
            .map(project_from_row)
            .collect::<Result<_, _>>()
            .map_err(DatabaseError::from_query)
    }

    async fn create(&self, new_project: &NewProject) -> DatabaseResult<Project> {
        let row = sqlx::query(
            r#"
            INSERT INTO projects (id, owner_username, name, description)
            VALUES ($1, $2, $3, $4)
            RETURNING id, owner_username, name, description, excluded_days
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new_project.owner_username)
        .bind(&new_project.name)
        .bind(&new_project.description)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_query)?;

        project_from_row(&row).map_err(DatabaseError::from_query)
    }

    async fn update(&self, id: Uuid, changes: &UpdateProject) -> DatabaseResult<bool> {
        let excluded_days = changes.excluded_days.map(|days| days.to_vec());

        let result = sqlx::query(
            r#"
            UPDATE projects
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                excluded_days = COALESCE($4, excluded_days),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&changes.name)
        .bind(&changes.description)
        .bind(excluded_days)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_query)?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: Uuid) -> DatabaseResult<bool> {
        // tasks, dependencies and excluded periods go through ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::from_query)?;

        Ok(result.rows_affected() > 0)
    }

    async fn time_periods(&self, project_id: Uuid) -> DatabaseResult<Vec<ExcludedTimePeriod>> {
        sqlx::query_as::<_, ExcludedTimePeriod>(
            r#"
            SELECT id, project_id, start_date, end_date
            FROM excluded_time_periods
            WHERE project_id = $1
            ORDER BY start_date, id
            "#,
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_query)
    }

    async fn add_time_period(&self, period: &NewTimePeriod) -> DatabaseResult<ExcludedTimePeriod> {
        sqlx::query_as::<_, ExcludedTimePeriod>(
            r#"
            INSERT INTO excluded_time_periods (id, project_id, start_date, end_date)
            VALUES ($1, $2, $3, $4)
            RETURNING id, project_id, start_date, end_date
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(period.project_id)
        .bind(period.start_date)
        .bind(period.end_date)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_query)
    }

    async fn delete_time_period(&self, project_id: Uuid, id: Uuid) -> DatabaseResult<bool> {
        let result =
            sqlx::query("DELETE FROM excluded_time_periods WHERE id = $1 AND project_id = $2")
                .bind(id)
                .bind(project_id)
                .execute(&self.pool)
                .await
                .map_err(DatabaseError::from_query)?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl TaskRepository for PgStore {
    async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<Task>> {
        sqlx::query_as::<_, Task>(
            r#"
            SELECT id, project_id, name, description, duration_optimistic, duration_normal,
                   duration_pessimistic, start_date, completion, tag, colour,
                   assigned_team_member, is_milestone
            FROM tasks
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_query)
    }

    async fn list_by_project(&self, project_id: Uuid) -> DatabaseResult<Vec<Task>> {
        sqlx::query_as::<_, Task>(
            r#"
            SELECT id, project_id, name, description, duration_optimistic, duration_normal,
                   duration_pessimistic, start_date, completion, tag, colour,
                   assigned_team_member, is_milestone
            FROM tasks
            WHERE project_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_query)
    }

    async fn create(&self, new_task: &NewTask) -> DatabaseResult<Task> {
        sqlx::query_as::<_, Task>(
            r#"
            INSERT INTO tasks (id, project_id, name, is_milestone, start_date)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, project_id, name, description, duration_optimistic, duration_normal,
                      duration_pessimistic, start_date, completion, tag, colour,
                      assigned_team_member, is_milestone
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new_task.project_id)
        .bind(&new_task.name)
        .bind(new_task.is_milestone)
        .bind(new_task.start_date)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_query)
    }

    async fn update(&self, id: Uuid, changes: &UpdateTask) -> DatabaseResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE tasks
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                duration_optimistic = COALESCE($4, duration_optimistic),
                duration_normal = COALESCE($5, duration_normal),
                duration_pessimistic = COALESCE($6, duration_pessimistic),
                start_date = COALESCE($7, start_date),
                completion = COALESCE($8, completion),
                tag = COALESCE($9, tag),
                colour = COALESCE($10, colour),
                assigned_team_member = COALESCE($11, assigned_team_member),
                is_milestone = COALESCE($12, is_milestone),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&changes.name)
        .bind(&changes.description)
        .bind(changes.duration_optimistic)
        .bind(changes.duration_normal)
        .bind(changes.duration_pessimistic)
        .bind(changes.start_date)
        .bind(changes.completion)
        .bind(&changes.tag)
        .bind(&changes.colour)
        .bind(&changes.assigned_team_member)
        .bind(changes.is_milestone)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_query)?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: Uuid) -> DatabaseResult<bool> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::from_query)?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl DependencyRepository for PgStore {
    async fn outgoing(&self, task_id: Uuid) -> DatabaseResult<Vec<Dependency>> {
        sqlx::query_as::<_, Dependency>(
            "SELECT from_task, to_task FROM task_dependencies WHERE from_task = $1",
        )
        .bind(task_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_query)
    }

    async fn incoming(&self, task_id: Uuid) -> DatabaseResult<Vec<Dependency>> {
        sqlx::query_as::<_, Dependency>(
            "SELECT from_task, to_task FROM task_dependencies WHERE to_task = $1",
        )
        .bind(task_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_query)
    }

    async fn add(&self, project_id: Uuid, edge: Dependency) -> DatabaseResult<bool> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from_query)?;

        // serializes edge inserts per project so two writers cannot close a cycle together
        sqlx::query("SELECT id FROM projects WHERE id = $1 FOR UPDATE")
            .bind(project_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(DatabaseError::from_query)?;

        let edges = sqlx::query_as::<_, Dependency>(
            r#"
            SELECT d.from_task, d.to_task
            FROM task_dependencies d
            JOIN tasks t ON t.id = d.from_task
            WHERE t.project_id = $1
            "#,
        )
        .bind(project_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(DatabaseError::from_query)?;

        if graph::creates_cycle(&edges, edge) {
            debug!("Rejecting dependency {} -> {}", edge.from_task, edge.to_task);
            return Err(DatabaseError::Conflict(
                "dependency would create a cycle".to_string(),
            ));
        }

        let result = sqlx::query(
            r#"
            INSERT INTO task_dependencies (from_task, to_task)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(edge.from_task)
        .bind(edge.to_task)
        .execute(&mut *tx)
        .await
        .map_err(DatabaseError::from_query)?;

        tx.commit().await.map_err(DatabaseError::from_query)?;

        Ok(result.rows_affected() > 0)
    }

    async fn remove(&self, edge: Dependency) -> DatabaseResult<bool> {
        let result =
            sqlx::query("DELETE FROM task_dependencies WHERE from_task = $1 AND to_task = $2")
                .bind(edge.from_task)
                .bind(edge.to_task)
                .execute(&self.pool)
                .await
                .map_err(DatabaseError::from_query)?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::database::{DatabaseConfig, init_pool};

    #[tokio::test]
    #[ignore = "requires a running PostgreSQL instance"]
    async fn test_mistyped_project_row_is_an_error() -> Result<(), Box<dyn std::error::Error>> {
        let pool = init_pool(&DatabaseConfig::from_env()?).await?;

        let row = sqlx::query(
            r#"
            SELECT gen_random_uuid() AS id, 'alice' AS owner_username, 'X' AS name,
                   '' AS description, ARRAY[true, false]::BOOLEAN[] AS excluded_days
            "#,
        )
        .fetch_one(&pool)
        .await?;
        let project = project_from_row(&row)?;
        assert_eq!(project.excluded_days, [true, false, false, false, false, false, false]);

        let row = sqlx::query(
            r#"
            SELECT 'not-a-uuid' AS id, 'alice' AS owner_username, 'X' AS name,
                   '' AS description, ARRAY[]::BOOLEAN[] AS excluded_days
            "#,
        )
        .fetch_one(&pool)
        .await?;
        let err = project_from_row(&row).map_err(DatabaseError::from_query).unwrap_err();
        assert!(matches!(err, DatabaseError::Query(_)));

        Ok(())
    }
}
