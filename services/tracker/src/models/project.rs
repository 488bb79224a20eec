//! Project and excluded time period models

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One flag per weekday, Monday first
pub type ExcludedDays = [bool; 7];

/// Project entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub owner_username: String,
    pub name: String,
    pub description: String,
    pub excluded_days: ExcludedDays,
}

/// New project creation payload
#[derive(Debug, Clone)]
pub struct NewProject {
    pub owner_username: String,
    pub name: String,
    pub description: String,
}

/// Project update payload
#[derive(Debug, Clone, Default)]
pub struct UpdateProject {
    pub name: Option<String>,
    pub description: Option<String>,
    pub excluded_days: Option<ExcludedDays>,
}

/// A date range excluded from scheduling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ExcludedTimePeriod {
    pub id: Uuid,
    pub project_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// New excluded period payload
#[derive(Debug, Clone)]
pub struct NewTimePeriod {
    pub project_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Convert a stored weekday vector into the fixed-size form.
/// Missing entries read as not excluded; extra entries are ignored.
pub fn excluded_days_from_slice(days: &[bool]) -> ExcludedDays {
    let mut week = [false; 7];
    for (slot, day) in week.iter_mut().zip(days) {
        *slot = *day;
    }
    week
}
