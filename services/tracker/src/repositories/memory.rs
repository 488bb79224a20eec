//! In-memory repositories
//!
//! Everything lives behind one `RwLock`, so each repository call is atomic
//! and a cascade (project delete, user rename) is never observed half done.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{DatabaseError, DatabaseResult};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    DependencyRepository, ProjectRepository, SessionRepository, TaskRepository, UserRepository,
};
use crate::graph;
use crate::models::{
    Dependency, ExcludedTimePeriod, NewProject, NewTask, NewTimePeriod, NewUser, Project, Session,
    Task, UpdateProject, UpdateTask, UpdateUser, User,
};

#[derive(Default)]
struct Tables {
    users: HashMap<String, User>,
    sessions: HashMap<String, Session>,
    // insertion order doubles as listing order
    projects: Vec<Project>,
    time_periods: Vec<ExcludedTimePeriod>,
    tasks: Vec<Task>,
    dependencies: Vec<Dependency>,
}

impl Tables {
    fn project_of_task(&self, task_id: Uuid) -> Option<Uuid> {
        self.tasks
            .iter()
            .find(|task| task.id == task_id)
            .map(|task| task.project_id)
    }
}

/// Store implementing every repository in process memory
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn find_by_username(&self, username: &str) -> DatabaseResult<Option<User>> {
        Ok(self.tables.read().await.users.get(username).cloned())
    }

    async fn create(&self, new_user: &NewUser) -> DatabaseResult<User> {
        let mut tables = self.tables.write().await;
        if tables.users.contains_key(&new_user.username) {
            return Err(DatabaseError::Conflict(format!(
                "username {} already exists",
                new_user.username
            )));
        }

        let now = Utc::now();
        let user = User {
            username: new_user.username.clone(),
            display_name: new_user.display_name.clone(),
            password_hash: new_user.password_hash.clone(),
            profile_photo: String::new(),
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(user.username.clone(), user.clone());

        Ok(user)
    }

    async fn update(&self, username: &str, changes: &UpdateUser) -> DatabaseResult<bool> {
        let mut tables = self.tables.write().await;
        let Some(user) = tables.users.get_mut(username) else {
            return Ok(false);
        };

        if let Some(display_name) = &changes.display_name {
            user.display_name = display_name.clone();
        }
        if let Some(profile_photo) = &changes.profile_photo {
            user.profile_photo = profile_photo.clone();
        }
        if let Some(password_hash) = &changes.password_hash {
            user.password_hash = password_hash.clone();
        }
        user.updated_at = Utc::now();

        Ok(true)
    }

    async fn rename(&self, username: &str, new_username: &str) -> DatabaseResult<bool> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(username) {
            return Ok(false);
        }
        if username == new_username {
            return Ok(true);
        }
        if tables.users.contains_key(new_username) {
            return Err(DatabaseError::Conflict(format!(
                "username {} already exists",
                new_username
            )));
        }

        if let Some(mut user) = tables.users.remove(username) {
            user.username = new_username.to_string();
            user.updated_at = Utc::now();
            tables.users.insert(new_username.to_string(), user);
        }
        for project in tables
            .projects
            .iter_mut()
            .filter(|project| project.owner_username == username)
        {
            project.owner_username = new_username.to_string();
        }
        for session in tables
            .sessions
            .values_mut()
            .filter(|session| session.username == username)
        {
            session.username = new_username.to_string();
        }

        Ok(true)
    }
}

#[async_trait]
impl SessionRepository for MemoryStore {
    async fn create(&self, session: &Session) -> DatabaseResult<()> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&session.username) {
            return Err(DatabaseError::Conflict(format!(
                "session owner {} does not exist",
                session.username
            )));
        }
        if tables.sessions.contains_key(&session.token) {
            return Err(DatabaseError::Conflict("session token collision".to_string()));
        }
        tables
            .sessions
            .insert(session.token.clone(), session.clone());

        Ok(())
    }

    async fn find_by_token(&self, token: &str) -> DatabaseResult<Option<Session>> {
        Ok(self.tables.read().await.sessions.get(token).cloned())
    }

    async fn delete(&self, token: &str) -> DatabaseResult<bool> {
        Ok(self.tables.write().await.sessions.remove(token).is_some())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> DatabaseResult<u64> {
        let mut tables = self.tables.write().await;
        let before = tables.sessions.len();
        tables.sessions.retain(|_, session| session.expires_at >= now);

        Ok((before - tables.sessions.len()) as u64)
    }
}

#[async_trait]
impl ProjectRepository for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<Project>> {
        let tables = self.tables.read().await;
        Ok(tables.projects.iter().find(|project| project.id == id).cloned())
    }

    async fn list_by_owner(&self, owner: &str) -> DatabaseResult<Vec<Project>> {
        let tables = self.tables.read().await;
        Ok(tables
            .projects
            .iter()
            .filter(|project| project.owner_username == owner)
            .cloned()
            .collect())
    }

    async fn create(&self, new_project: &NewProject) -> DatabaseResult<Project> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&new_project.owner_username) {
            return Err(DatabaseError::Conflict(format!(
                "project owner {} does not exist",
                new_project.owner_username
            )));
        }

        let project = Project {
            id: Uuid::new_v4(),
            owner_username: new_project.owner_username.clone(),
            name: new_project.name.clone(),
            description: new_project.description.clone(),
            excluded_days: [false; 7],
        };
        tables.projects.push(project.clone());

        Ok(project)
    }

    async fn update(&self, id: Uuid, changes: &UpdateProject) -> DatabaseResult<bool> {
        let mut tables = self.tables.write().await;
        let Some(project) = tables.projects.iter_mut().find(|project| project.id == id) else {
            return Ok(false);
        };

        if let Some(name) = &changes.name {
            project.name = name.clone();
        }
        if let Some(description) = &changes.description {
            project.description = description.clone();
        }
        if let Some(excluded_days) = changes.excluded_days {
            project.excluded_days = excluded_days;
        }

        Ok(true)
    }

    async fn delete(&self, id: Uuid) -> DatabaseResult<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.projects.len();
        tables.projects.retain(|project| project.id != id);
        if tables.projects.len() == before {
            return Ok(false);
        }

        let Tables {
            tasks,
            dependencies,
            time_periods,
            ..
        } = &mut *tables;
        let removed: Vec<Uuid> = tasks
            .iter()
            .filter(|task| task.project_id == id)
            .map(|task| task.id)
            .collect();
        tasks.retain(|task| task.project_id != id);
        dependencies.retain(|edge| !removed.iter().any(|task_id| edge.touches(*task_id)));
        time_periods.retain(|period| period.project_id != id);

        Ok(true)
    }

    async fn time_periods(&self, project_id: Uuid) -> DatabaseResult<Vec<ExcludedTimePeriod>> {
        let tables = self.tables.read().await;
        let mut periods: Vec<ExcludedTimePeriod> = tables
            .time_periods
            .iter()
            .filter(|period| period.project_id == project_id)
            .cloned()
            .collect();
        periods.sort_by_key(|period| (period.start_date, period.id));

        Ok(periods)
    }

    async fn add_time_period(&self, period: &NewTimePeriod) -> DatabaseResult<ExcludedTimePeriod> {
        let mut tables = self.tables.write().await;
        if !tables
            .projects
            .iter()
            .any(|project| project.id == period.project_id)
        {
            return Err(DatabaseError::Conflict(format!(
                "project {} does not exist",
                period.project_id
            )));
        }

        let period = ExcludedTimePeriod {
            id: Uuid::new_v4(),
            project_id: period.project_id,
            start_date: period.start_date,
            end_date: period.end_date,
        };
        tables.time_periods.push(period.clone());

        Ok(period)
    }

    async fn delete_time_period(&self, project_id: Uuid, id: Uuid) -> DatabaseResult<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.time_periods.len();
        tables
            .time_periods
            .retain(|period| !(period.id == id && period.project_id == project_id));

        Ok(tables.time_periods.len() < before)
    }
}

#[async_trait]
impl TaskRepository for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<Task>> {
        let tables = self.tables.read().await;
        Ok(tables.tasks.iter().find(|task| task.id == id).cloned())
    }

    async fn list_by_project(&self, project_id: Uuid) -> DatabaseResult<Vec<Task>> {
        let tables = self.tables.read().await;
        Ok(tables
            .tasks
            .iter()
            .filter(|task| task.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn create(&self, new_task: &NewTask) -> DatabaseResult<Task> {
        let mut tables = self.tables.write().await;
        if !tables
            .projects
            .iter()
            .any(|project| project.id == new_task.project_id)
        {
            return Err(DatabaseError::Conflict(format!(
                "project {} does not exist",
                new_task.project_id
            )));
        }

        let task = Task {
            id: Uuid::new_v4(),
            project_id: new_task.project_id,
            name: new_task.name.clone(),
            description: String::new(),
            duration_optimistic: 0.0,
            duration_normal: 0.0,
            duration_pessimistic: 0.0,
            start_date: new_task.start_date,
            completion: 0.0,
            tag: String::new(),
            colour: String::new(),
            assigned_team_member: String::new(),
            is_milestone: new_task.is_milestone,
        };
        tables.tasks.push(task.clone());

        Ok(task)
    }

    async fn update(&self, id: Uuid, changes: &UpdateTask) -> DatabaseResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.tasks.iter_mut().find(|task| task.id == id) {
            Some(task) => {
                task.apply(changes);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: Uuid) -> DatabaseResult<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.tasks.len();
        tables.tasks.retain(|task| task.id != id);
        if tables.tasks.len() == before {
            return Ok(false);
        }
        tables.dependencies.retain(|edge| !edge.touches(id));

        Ok(true)
    }
}

#[async_trait]
impl DependencyRepository for MemoryStore {
    async fn outgoing(&self, task_id: Uuid) -> DatabaseResult<Vec<Dependency>> {
        let tables = self.tables.read().await;
        Ok(tables
            .dependencies
            .iter()
            .filter(|edge| edge.from_task == task_id)
            .copied()
            .collect())
    }

    async fn incoming(&self, task_id: Uuid) -> DatabaseResult<Vec<Dependency>> {
        let tables = self.tables.read().await;
        Ok(tables
            .dependencies
            .iter()
            .filter(|edge| edge.to_task == task_id)
            .copied()
            .collect())
    }

    async fn add(&self, project_id: Uuid, edge: Dependency) -> DatabaseResult<bool> {
        let mut tables = self.tables.write().await;
        if tables.project_of_task(edge.from_task) != Some(project_id)
            || tables.project_of_task(edge.to_task) != Some(project_id)
        {
            return Err(DatabaseError::Conflict(
                "dependency endpoints must belong to the project".to_string(),
            ));
        }
        if tables.dependencies.contains(&edge) {
            return Ok(false);
        }

        let project_edges: Vec<Dependency> = tables
            .dependencies
            .iter()
            .filter(|existing| tables.project_of_task(existing.from_task) == Some(project_id))
            .copied()
            .collect();
        if graph::creates_cycle(&project_edges, edge) {
            return Err(DatabaseError::Conflict(
                "dependency would create a cycle".to_string(),
            ));
        }
        tables.dependencies.push(edge);

        Ok(true)
    }

    async fn remove(&self, edge: Dependency) -> DatabaseResult<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.dependencies.len();
        tables.dependencies.retain(|existing| *existing != edge);

        Ok(tables.dependencies.len() < before)
    }
}
