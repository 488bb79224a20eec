//! Repositories for database operations
//!
//! Each entity has its own repository trait. Two backends implement all of
//! them: [`postgres::PgStore`] for deployments and [`memory::MemoryStore`]
//! for local runs and tests. Reads return `Ok(None)` (or an empty list) when
//! nothing matches; `Err` always means the storage itself failed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::DatabaseResult;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{
    Dependency, ExcludedTimePeriod, NewProject, NewTask, NewTimePeriod, NewUser, Project, Session,
    Task, UpdateProject, UpdateTask, UpdateUser, User,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_username(&self, username: &str) -> DatabaseResult<Option<User>>;

    /// Fails with `Conflict` when the username is taken
    async fn create(&self, new_user: &NewUser) -> DatabaseResult<User>;

    /// Returns false when the user does not exist
    async fn update(&self, username: &str, changes: &UpdateUser) -> DatabaseResult<bool>;

    /// Change a username. Owned projects and sessions follow the new name.
    /// Fails with `Conflict` when `new_username` is taken.
    async fn rename(&self, username: &str, new_username: &str) -> DatabaseResult<bool>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create(&self, session: &Session) -> DatabaseResult<()>;

    async fn find_by_token(&self, token: &str) -> DatabaseResult<Option<Session>>;

    async fn delete(&self, token: &str) -> DatabaseResult<bool>;

    /// Delete every session with `expires_at < now` in one statement.
    /// Safe to run concurrently with itself and with lookups.
    async fn delete_expired(&self, now: DateTime<Utc>) -> DatabaseResult<u64>;
}

#[async_trait]
pub trait ProjectRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<Project>>;

    async fn list_by_owner(&self, owner: &str) -> DatabaseResult<Vec<Project>>;

    async fn create(&self, new_project: &NewProject) -> DatabaseResult<Project>;

    async fn update(&self, id: Uuid, changes: &UpdateProject) -> DatabaseResult<bool>;

    /// Deletes the project with its tasks, dependencies and excluded periods
    async fn delete(&self, id: Uuid) -> DatabaseResult<bool>;

    async fn time_periods(&self, project_id: Uuid) -> DatabaseResult<Vec<ExcludedTimePeriod>>;

    async fn add_time_period(&self, period: &NewTimePeriod) -> DatabaseResult<ExcludedTimePeriod>;

    async fn delete_time_period(&self, project_id: Uuid, id: Uuid) -> DatabaseResult<bool>;
}

#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<Task>>;

    async fn list_by_project(&self, project_id: Uuid) -> DatabaseResult<Vec<Task>>;

    async fn create(&self, new_task: &NewTask) -> DatabaseResult<Task>;

    async fn update(&self, id: Uuid, changes: &UpdateTask) -> DatabaseResult<bool>;

    /// Deletes the task and every dependency edge touching it
    async fn delete(&self, id: Uuid) -> DatabaseResult<bool>;
}

#[async_trait]
pub trait DependencyRepository: Send + Sync {
    /// Edges leaving `task_id`: the tasks it depends on
    async fn outgoing(&self, task_id: Uuid) -> DatabaseResult<Vec<Dependency>>;

    /// Edges entering `task_id`: the tasks depending on it
    async fn incoming(&self, task_id: Uuid) -> DatabaseResult<Vec<Dependency>>;

    /// Insert an edge between two tasks of `project_id`. The cycle check and
    /// the insert are atomic per project; a cycle fails with `Conflict`.
    /// Returns false when the edge already existed.
    async fn add(&self, project_id: Uuid, edge: Dependency) -> DatabaseResult<bool>;

    async fn remove(&self, edge: Dependency) -> DatabaseResult<bool>;
}

/// The set of repositories handed to the service components
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub projects: Arc<dyn ProjectRepository>,
    pub tasks: Arc<dyn TaskRepository>,
    pub dependencies: Arc<dyn DependencyRepository>,
    /// Set when backed by PostgreSQL, for health checks
    pub pool: Option<PgPool>,
}

impl Repositories {
    /// All repositories backed by one store
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: UserRepository
            + SessionRepository
            + ProjectRepository
            + TaskRepository
            + DependencyRepository
            + 'static,
    {
        Self {
            users: store.clone(),
            sessions: store.clone(),
            projects: store.clone(),
            tasks: store.clone(),
            dependencies: store,
            pool: None,
        }
    }

    /// Repositories backed by PostgreSQL
    pub fn postgres(pool: PgPool) -> Self {
        let mut repositories = Self::from_store(Arc::new(PgStore::new(pool.clone())));
        repositories.pool = Some(pool);
        repositories
    }

    /// Repositories backed by process memory
    pub fn in_memory() -> Self {
        Self::from_store(Arc::new(MemoryStore::new()))
    }
}
