//! Task and dependency endpoints

use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection, rejection::PathRejection},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use super::message;
use crate::{
    error::{ApiError, ApiResult},
    middleware::Principal,
    models::{Dependency, NewTask, TaskView, UpdateTask},
    state::AppState,
    validation::{validate_completion, validate_duration},
};

const DEFAULT_TASK_NAME: &str = "Untitled Task";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    #[serde(rename = "projectUUID")]
    pub project_id: Uuid,
    pub name: Option<String>,
    pub is_milestone: Option<bool>,
    pub start_date: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchTaskRequest {
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

impl PatchTaskRequest {
    fn into_update(self) -> Result<UpdateTask, String> {
        for (field, value) in [
            ("durationOptimistic", self.duration_optimistic),
            ("durationNormal", self.duration_normal),
            ("durationPessimistic", self.duration_pessimistic),
        ] {
            if let Some(days) = value {
                validate_duration(field, days)?;
            }
        }
        if let Some(completion) = self.completion {
            validate_completion(completion)?;
        }

        Ok(UpdateTask {
            name: self.name,
            description: self.description,
            duration_optimistic: self.duration_optimistic,
            duration_normal: self.duration_normal,
            duration_pessimistic: self.duration_pessimistic,
            start_date: self.start_date,
            completion: self.completion,
            tag: self.tag,
            colour: self.colour,
            assigned_team_member: self.assigned_team_member,
            is_milestone: self.is_milestone,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddDependencyRequest {
    pub depends_on: Uuid,
}

/// `POST /api/task`
pub async fn create_task(
    State(state): State<AppState>,
    Extension(Principal(principal)): Extension<Principal>,
    payload: Result<Json<CreateTaskRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(payload) = payload?;
    state
        .guard
        .assert_owns_project(&principal, payload.project_id)
        .await?;

    let task = state
        .repositories
        .tasks
        .create(&NewTask {
            project_id: payload.project_id,
            name: payload
                .name
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_TASK_NAME.to_string()),
            is_milestone: payload.is_milestone.unwrap_or(false),
            start_date: payload
                .start_date
                .unwrap_or_else(|| Utc::now().date_naive()),
        })
        .await?;
    info!("Created task {} in project {}", task.id, task.project_id);

    Ok((StatusCode::CREATED, Json(json!({ "UUID": task.id }))))
}

/// `GET /api/task/:uuid`
pub async fn get_task(
    State(state): State<AppState>,
    Extension(Principal(principal)): Extension<Principal>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<TaskView>> {
    let Path(task_id) = path?;
    let view = state.task_views.get_task_view(task_id, &principal).await?;

    Ok(Json(view))
}

/// `PATCH /api/task/:uuid`
pub async fn patch_task(
    State(state): State<AppState>,
    Extension(Principal(principal)): Extension<Principal>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<PatchTaskRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Path(task_id) = path?;
    let Json(payload) = payload?;
    let changes = payload.into_update().map_err(ApiError::Validation)?;
    state.guard.assert_owns_task(&principal, task_id).await?;

    if !state.repositories.tasks.update(task_id, &changes).await? {
        return Err(ApiError::NotFound("task"));
    }

    Ok(message(StatusCode::OK, "Task updated"))
}

/// `DELETE /api/task/:uuid`
pub async fn delete_task(
    State(state): State<AppState>,
    Extension(Principal(principal)): Extension<Principal>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<impl IntoResponse> {
    let Path(task_id) = path?;
    state.guard.assert_owns_task(&principal, task_id).await?;

    if !state.repositories.tasks.delete(task_id).await? {
        return Err(ApiError::NotFound("task"));
    }

    Ok(message(StatusCode::OK, "Task deleted"))
}

/// `POST /api/task/:uuid/dependency`: the task starts depending on `dependsOn`
pub async fn add_dependency(
    State(state): State<AppState>,
    Extension(Principal(principal)): Extension<Principal>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<AddDependencyRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Path(task_id) = path?;
    let Json(payload) = payload?;

    let task = state.guard.assert_owns_task(&principal, task_id).await?;
    if task_id == payload.depends_on {
        return Err(ApiError::Validation(
            "A task cannot depend on itself".to_string(),
        ));
    }
    let other = state
        .guard
        .assert_owns_task(&principal, payload.depends_on)
        .await?;
    if task.project_id != other.project_id {
        return Err(ApiError::Validation(
            "Dependencies must stay within one project".to_string(),
        ));
    }

    let edge = Dependency::new(task.id, other.id);
    if state
        .repositories
        .dependencies
        .add(task.project_id, edge)
        .await?
    {
        info!("Task {} now depends on {}", task.id, other.id);
    }

    Ok(message(StatusCode::CREATED, "Dependency added"))
}

/// `DELETE /api/task/:uuid/dependency/:other`
pub async fn remove_dependency(
    State(state): State<AppState>,
    Extension(Principal(principal)): Extension<Principal>,
    path: Result<Path<(Uuid, Uuid)>, PathRejection>,
) -> ApiResult<impl IntoResponse> {
    let Path((task_id, other_id)) = path?;
    state.guard.assert_owns_task(&principal, task_id).await?;

    if !state
        .repositories
        .dependencies
        .remove(Dependency::new(task_id, other_id))
        .await?
    {
        return Err(ApiError::NotFound("dependency"));
    }

    Ok(message(StatusCode::OK, "Dependency removed"))
}
