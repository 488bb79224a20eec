//! Client-facing shapes assembled from storage rows

use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use super::project::{ExcludedDays, ExcludedTimePeriod, Project};

/// Three-point duration estimate, in days
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DurationEstimate {
    pub optimistic: f64,
    pub normal: f64,
    pub pessimistic: f64,
}

/// A task with its dependency edges and derived scheduling fields.
///
/// `dependent_on` lists the tasks this task depends on (outgoing edges),
/// `dependency_of` the tasks that depend on it (incoming edges). When either
/// edge fetch failed both lists are empty and `edges_complete` is false.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskView {
    #[serde(rename = "UUID")]
    pub id: Uuid,
    #[serde(rename = "projectUUID")]
    pub project_id: Uuid,
    pub name: String,
    pub description: String,
    pub duration: DurationEstimate,
    pub expected_duration: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub completion: f64,
    pub tag: String,
    pub colour: String,
    pub assigned_team_member: String,
    pub is_milestone: bool,
    pub dependent_on: Vec<Uuid>,
    pub dependency_of: Vec<Uuid>,
    pub edges_complete: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimePeriodView {
    pub id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl From<ExcludedTimePeriod> for TimePeriodView {
    fn from(period: ExcludedTimePeriod) -> Self {
        Self {
            id: period.id,
            start_date: period.start_date,
            end_date: period.end_date,
        }
    }
}

/// Full project: metadata, every task with its edges, and excluded periods
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectView {
    pub id: Uuid,
    pub owner: String,
    pub name: String,
    pub description: String,
    pub excluded_days: ExcludedDays,
    pub tasks: Vec<TaskView>,
    pub time_periods: Vec<TimePeriodView>,
}

/// Entry of the `GET /api/projects` listing
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    #[serde(rename = "UUID")]
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub excluded_days: ExcludedDays,
}

impl From<Project> for ProjectSummary {
    fn from(project: Project) -> Self {
        Self {
            id: project.id,
            name: project.name,
            description: project.description,
            excluded_days: project.excluded_days,
        }
    }
}
