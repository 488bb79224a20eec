//! Task view assembly: edge sets plus PERT-derived scheduling fields

use chrono::{Duration, NaiveDate};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::guard::{AccessGuard, ResourceError, bounded};
use crate::models::{Dependency, DurationEstimate, Task, TaskView};
use crate::repositories::DependencyRepository;

/// PERT expected duration: `(o + p + 4m) / 6`
pub fn expected_duration(optimistic: f64, normal: f64, pessimistic: f64) -> f64 {
    (optimistic + pessimistic + 4.0 * normal) / 6.0
}

/// Start date pushed forward by the expected duration rounded to whole days,
/// saturating at the last representable date
pub fn end_date(start: NaiveDate, expected: f64) -> NaiveDate {
    let days = expected.round() as i64;
    Duration::try_days(days)
        .and_then(|offset| start.checked_add_signed(offset))
        .unwrap_or(NaiveDate::MAX)
}

/// Edges of one task: `(outgoing, incoming)`
pub type TaskEdges = (Vec<Dependency>, Vec<Dependency>);

/// Shape a stored task into its view. `None` edges mark a failed edge fetch.
pub fn assemble(task: Task, edges: Option<TaskEdges>) -> TaskView {
    let expected = expected_duration(
        task.duration_optimistic,
        task.duration_normal,
        task.duration_pessimistic,
    );
    let edges_complete = edges.is_some();
    let (outgoing, incoming) = edges.unwrap_or_default();

    let mut dependent_on: Vec<Uuid> = outgoing.iter().map(|edge| edge.to_task).collect();
    dependent_on.sort();
    dependent_on.dedup();
    let mut dependency_of: Vec<Uuid> = incoming.iter().map(|edge| edge.from_task).collect();
    dependency_of.sort();
    dependency_of.dedup();

    TaskView {
        id: task.id,
        project_id: task.project_id,
        duration: DurationEstimate {
            optimistic: task.duration_optimistic,
            normal: task.duration_normal,
            pessimistic: task.duration_pessimistic,
        },
        expected_duration: expected,
        end_date: end_date(task.start_date, expected),
        start_date: task.start_date,
        completion: task.completion,
        name: task.name,
        description: task.description,
        tag: task.tag,
        colour: task.colour,
        assigned_team_member: task.assigned_team_member,
        is_milestone: task.is_milestone,
        dependent_on,
        dependency_of,
        edges_complete,
    }
}

/// Builds task views, fetching both edge sets of a task concurrently
#[derive(Clone)]
pub struct TaskViewBuilder {
    guard: AccessGuard,
    dependencies: Arc<dyn DependencyRepository>,
    timeout: std::time::Duration,
}

impl TaskViewBuilder {
    pub fn new(
        guard: AccessGuard,
        dependencies: Arc<dyn DependencyRepository>,
        timeout: std::time::Duration,
    ) -> Self {
        Self {
            guard,
            dependencies,
            timeout,
        }
    }

    /// Task view for its owner; `Forbidden` for anyone else
    pub async fn get_task_view(
        &self,
        task_id: Uuid,
        principal: &str,
    ) -> Result<TaskView, ResourceError> {
        let task = self.guard.assert_owns_task(principal, task_id).await?;
        Ok(self.build(task).await)
    }

    /// Never fails: an edge fetch error degrades to `edges_complete = false`
    pub async fn build(&self, task: Task) -> TaskView {
        let edges = self.edges(task.id).await;
        if let Err(e) = &edges {
            warn!("Dependency fetch for task {} failed: {}", task.id, e);
        }
        assemble(task, edges.ok())
    }

    async fn edges(&self, task_id: Uuid) -> Result<TaskEdges, ResourceError> {
        let (outgoing, incoming) = tokio::join!(
            bounded(self.timeout, self.dependencies.outgoing(task_id)),
            bounded(self.timeout, self.dependencies.incoming(task_id)),
        );
        Ok((outgoing?, incoming?))
    }
}
