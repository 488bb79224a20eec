//! Ownership checks for projects and tasks

use common::DatabaseError;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{Project, Task};
use crate::repositories::{ProjectRepository, TaskRepository};

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("forbidden")]
    Forbidden,

    #[error("storage did not answer in time")]
    Timeout,

    #[error("fetch task failed: {0}")]
    Aborted(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Storage(#[from] DatabaseError),
}

/// Run a repository call under the fetch timeout
pub(crate) async fn bounded<T, F>(limit: Duration, fetch: F) -> Result<T, ResourceError>
where
    F: Future<Output = Result<T, DatabaseError>>,
{
    match tokio::time::timeout(limit, fetch).await {
        Ok(result) => result.map_err(ResourceError::from),
        Err(_) => {
            warn!("Repository call exceeded {:?}", limit);
            Err(ResourceError::Timeout)
        }
    }
}

/// Access control guard. A missing resource is reported before ownership.
#[derive(Clone)]
pub struct AccessGuard {
    projects: Arc<dyn ProjectRepository>,
    tasks: Arc<dyn TaskRepository>,
    timeout: Duration,
}

impl AccessGuard {
    pub fn new(
        projects: Arc<dyn ProjectRepository>,
        tasks: Arc<dyn TaskRepository>,
        timeout: Duration,
    ) -> Self {
        Self {
            projects,
            tasks,
            timeout,
        }
    }

    pub async fn assert_owns_project(
        &self,
        principal: &str,
        project_id: Uuid,
    ) -> Result<Project, ResourceError> {
        let project = bounded(self.timeout, self.projects.find_by_id(project_id))
            .await?
            .ok_or(ResourceError::NotFound("project"))?;

        if project.owner_username != principal {
            debug!("{} denied access to project {}", principal, project_id);
            return Err(ResourceError::Forbidden);
        }

        Ok(project)
    }

    /// Ownership of a task is ownership of its project
    pub async fn assert_owns_task(
        &self,
        principal: &str,
        task_id: Uuid,
    ) -> Result<Task, ResourceError> {
        let task = bounded(self.timeout, self.tasks.find_by_id(task_id))
            .await?
            .ok_or(ResourceError::NotFound("task"))?;

        self.assert_owns_project(principal, task.project_id)
            .await
            .map_err(|e| match e {
                // a task whose project vanished mid-request is gone too
                ResourceError::NotFound(_) => ResourceError::NotFound("task"),
                other => other,
            })?;

        Ok(task)
    }
}
