//! Task and dependency models

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Task entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Task {
    pub id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    pub description: String,
    pub duration_optimistic: f64,
    pub duration_normal: f64,
    pub duration_pessimistic: f64,
    pub start_date: NaiveDate,
    pub completion: f64,
    pub tag: String,
    pub colour: String,
    pub assigned_team_member: String,
    pub is_milestone: bool,
}

/// New task creation payload
#[derive(Debug, Clone)]
pub struct NewTask {
    pub project_id: Uuid,
    pub name: String,
    pub is_milestone: bool,
    pub start_date: NaiveDate,
}

/// Partial task update. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct UpdateTask {
    pub name: Option<String>,
    pub description: Option<String>,
    pub duration_optimistic: Option<f64>,
    pub duration_normal: Option<f64>,
    pub duration_pessimistic: Option<f64>,
    pub start_date: Option<NaiveDate>,
    pub completion: Option<f64>,
    pub tag: Option<String>,
    pub colour: Option<String>,
    pub assigned_team_member: Option<String>,
    pub is_milestone: Option<bool>,
}

impl Task {
    pub(crate) fn apply(&mut self, changes: &UpdateTask) {
        if let Some(name) = &changes.name {
            self.name = name.clone();
        }
        if let Some(description) = &changes.description {
            self.description = description.clone();
        }
        if let Some(value) = changes.duration_optimistic {
            self.duration_optimistic = value;
        }
        if let Some(value) = changes.duration_normal {
            self.duration_normal = value;
        }
        if let Some(value) = changes.duration_pessimistic {
            self.duration_pessimistic = value;
        }
        if let Some(start_date) = changes.start_date {
            self.start_date = start_date;
        }
        if let Some(completion) = changes.completion {
            self.completion = completion;
        }
        if let Some(tag) = &changes.tag {
            self.tag = tag.clone();
        }
        if let Some(colour) = &changes.colour {
            self.colour = colour.clone();
        }
        if let Some(member) = &changes.assigned_team_member {
            self.assigned_team_member = member.clone();
        }
        if let Some(is_milestone) = changes.is_milestone {
            self.is_milestone = is_milestone;
        }
    }
}

/// Directed dependency edge: `from_task` depends on `to_task`
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, FromRow,
)]
pub struct Dependency {
    pub from_task: Uuid,
    pub to_task: Uuid,
}

impl Dependency {
    pub fn new(from_task: Uuid, to_task: Uuid) -> Self {
        Self { from_task, to_task }
    }

    pub fn touches(&self, task_id: Uuid) -> bool {
        self.from_task == task_id || self.to_task == task_id
    }
}
