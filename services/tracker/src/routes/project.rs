//! Project endpoints

use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection, rejection::PathRejection},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use super::message;
use crate::{
    error::{ApiError, ApiResult},
    middleware::Principal,
    models::{
        NewProject, NewTimePeriod, ProjectSummary, ProjectView, UpdateProject,
        project::excluded_days_from_slice,
    },
    state::AppState,
    validation::{validate_date_range, validate_excluded_days},
};

const DEFAULT_PROJECT_NAME: &str = "Untitled Project";

#[derive(Debug, Default, Deserialize)]
pub struct CreateProjectRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchProjectRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub excluded_days: Option<Vec<bool>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimePeriodRequest {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// `GET /api/projects`
pub async fn list_projects(
    State(state): State<AppState>,
    Extension(Principal(principal)): Extension<Principal>,
) -> ApiResult<Json<Vec<ProjectSummary>>> {
    let projects = state.repositories.projects.list_by_owner(&principal).await?;

    Ok(Json(projects.into_iter().map(ProjectSummary::from).collect()))
}

/// `POST /api/project`
pub async fn create_project(
    State(state): State<AppState>,
    Extension(Principal(principal)): Extension<Principal>,
    payload: Result<Json<CreateProjectRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(payload) = payload?;

    let project = state
        .repositories
        .projects
        .create(&NewProject {
            owner_username: principal,
            name: payload
                .name
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_PROJECT_NAME.to_string()),
            description: payload.description.unwrap_or_default(),
        })
        .await?;
    info!("Created project {} for {}", project.id, project.owner_username);

    Ok((StatusCode::CREATED, Json(json!({ "UUID": project.id }))))
}

/// `GET /api/project/:uuid`
pub async fn get_project(
    State(state): State<AppState>,
    Extension(Principal(principal)): Extension<Principal>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<ProjectView>> {
    let Path(project_id) = path?;
    let view = state.aggregator.full_project(project_id, &principal).await?;

    Ok(Json(view))
}

/// `PATCH /api/project/:uuid`
pub async fn patch_project(
    State(state): State<AppState>,
    Extension(Principal(principal)): Extension<Principal>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<PatchProjectRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Path(project_id) = path?;
    let Json(payload) = payload?;
    state.guard.assert_owns_project(&principal, project_id).await?;

    let excluded_days = match payload.excluded_days {
        Some(days) => {
            validate_excluded_days(&days).map_err(ApiError::Validation)?;
            Some(excluded_days_from_slice(&days))
        }
        None => None,
    };
    let changes = UpdateProject {
        name: payload.name,
        description: payload.description,
        excluded_days,
    };
    if !state.repositories.projects.update(project_id, &changes).await? {
        return Err(ApiError::NotFound("project"));
    }

    Ok(message(StatusCode::OK, "Project updated"))
}

/// `DELETE /api/project/:uuid`: removes tasks, dependencies and periods too
pub async fn delete_project(
    State(state): State<AppState>,
    Extension(Principal(principal)): Extension<Principal>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<impl IntoResponse> {
    let Path(project_id) = path?;
    state.guard.assert_owns_project(&principal, project_id).await?;

    if !state.repositories.projects.delete(project_id).await? {
        return Err(ApiError::NotFound("project"));
    }
    info!("Deleted project {}", project_id);

    Ok(message(StatusCode::OK, "Project deleted"))
}

/// `POST /api/project/:uuid/timeperiod`
pub async fn add_time_period(
    State(state): State<AppState>,
    Extension(Principal(principal)): Extension<Principal>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<TimePeriodRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Path(project_id) = path?;
    let Json(payload) = payload?;
    validate_date_range(payload.start_date, payload.end_date).map_err(ApiError::Validation)?;
    state.guard.assert_owns_project(&principal, project_id).await?;

    let period = state
        .repositories
        .projects
        .add_time_period(&NewTimePeriod {
            project_id,
            start_date: payload.start_date,
            end_date: payload.end_date,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(json!({ "id": period.id }))))
}

/// `DELETE /api/project/:uuid/timeperiod/:id`
pub async fn delete_time_period(
    State(state): State<AppState>,
    Extension(Principal(principal)): Extension<Principal>,
    path: Result<Path<(Uuid, Uuid)>, PathRejection>,
) -> ApiResult<impl IntoResponse> {
    let Path((project_id, period_id)) = path?;
    state.guard.assert_owns_project(&principal, project_id).await?;

    if !state
        .repositories
        .projects
        .delete_time_period(project_id, period_id)
        .await?
    {
        return Err(ApiError::NotFound("time period"));
    }

    Ok(message(StatusCode::OK, "Time period deleted"))
}
