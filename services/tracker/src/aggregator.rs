//! Full project assembly
//!
//! The project row is checked first; tasks and excluded periods are then
//! fetched together, and every task's edge pair is fetched concurrently. The
//! view is returned only once all of those have finished.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::info;
use uuid::Uuid;

use crate::guard::{AccessGuard, ResourceError, bounded};
use crate::models::{ProjectView, TimePeriodView};
use crate::repositories::{ProjectRepository, TaskRepository};
use crate::task_view::TaskViewBuilder;

#[derive(Clone)]
pub struct ProjectAggregator {
    guard: AccessGuard,
    projects: Arc<dyn ProjectRepository>,
    tasks: Arc<dyn TaskRepository>,
    task_views: TaskViewBuilder,
    timeout: Duration,
}

impl ProjectAggregator {
    pub fn new(
        guard: AccessGuard,
        projects: Arc<dyn ProjectRepository>,
        tasks: Arc<dyn TaskRepository>,
        task_views: TaskViewBuilder,
        timeout: Duration,
    ) -> Self {
        Self {
            guard,
            projects,
            tasks,
            task_views,
            timeout,
        }
    }

    pub async fn full_project(
        &self,
        project_id: Uuid,
        principal: &str,
    ) -> Result<ProjectView, ResourceError> {
        let project = self.guard.assert_owns_project(principal, project_id).await?;

        let (tasks, periods) = tokio::join!(
            bounded(self.timeout, self.tasks.list_by_project(project_id)),
            bounded(self.timeout, self.projects.time_periods(project_id)),
        );
        let (tasks, periods) = (tasks?, periods?);

        let mut pending = JoinSet::new();
        for (index, task) in tasks.into_iter().enumerate() {
            let task_views = self.task_views.clone();
            pending.spawn(async move { (index, task_views.build(task).await) });
        }
        let mut views = Vec::with_capacity(pending.len());
        while let Some(joined) = pending.join_next().await {
            views.push(joined?);
        }
        views.sort_by_key(|(index, _)| *index);
        let tasks: Vec<_> = views.into_iter().map(|(_, view)| view).collect();

        let incomplete = tasks.iter().filter(|task| !task.edges_complete).count();
        info!(
            "Assembled project {} with {} tasks ({} with incomplete edges)",
            project_id,
            tasks.len(),
            incomplete
        );

        Ok(ProjectView {
            id: project.id,
            owner: project.owner_username,
            name: project.name,
            description: project.description,
            excluded_days: project.excluded_days,
            tasks,
            time_periods: periods.into_iter().map(TimePeriodView::from).collect(),
        })
    }
}
