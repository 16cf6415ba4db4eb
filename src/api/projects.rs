use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};

use super::{PathParam, Payload, QueryParams, SharedState};
use crate::auth::AuthUser;
use crate::errors::Result;
use crate::models::{CreateProject, ProjectFilter, TaskFilter, UpdateProject};
use crate::validation::Validate;

pub async fn list_projects(
    State(state): State<SharedState>,
    _user: AuthUser,
    QueryParams(filter): QueryParams<ProjectFilter>,
) -> Result<impl IntoResponse> {
    let projects = state.db.call(move |db| db.list_projects(&filter)).await?;
    Ok(Json(projects))
}

pub async fn create_project(
    State(state): State<SharedState>,
    user: AuthUser,
    Payload(cmd): Payload<CreateProject>,
) -> Result<impl IntoResponse> {
    cmd.validate(&state.validation_context())?;
    let now = state.clock.now();
    let project = state
        .db
        .call(move |db| db.create_project(&cmd, now))
        .await?;
    tracing::info!(project_id = project.id, user_id = user.user_id, "project created");
    Ok((StatusCode::CREATED, Json(project)))
}

pub async fn get_project(
    State(state): State<SharedState>,
    _user: AuthUser,
    PathParam(id): PathParam<i64>,
) -> Result<impl IntoResponse> {
    let detail = state.db.call(move |db| db.get_project_detail(id)).await?;
    Ok(Json(detail))
}

pub async fn update_project(
    State(state): State<SharedState>,
    _user: AuthUser,
    PathParam(id): PathParam<i64>,
    Payload(cmd): Payload<UpdateProject>,
) -> Result<impl IntoResponse> {
    cmd.validate(&state.validation_context())?;
    let now = state.clock.now();
    let project = state
        .db
        .call(move |db| db.update_project(id, &cmd, now))
        .await?;
    Ok(Json(project))
}

pub async fn delete_project(
    State(state): State<SharedState>,
    user: AuthUser,
    PathParam(id): PathParam<i64>,
) -> Result<impl IntoResponse> {
    let now = state.clock.now();
    state.db.call(move |db| db.delete_project(id, now)).await?;
    tracing::info!(project_id = id, user_id = user.user_id, "project deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Every non-deleted task of a project, subtasks included.
pub async fn list_project_tasks(
    State(state): State<SharedState>,
    _user: AuthUser,
    PathParam(id): PathParam<i64>,
) -> Result<impl IntoResponse> {
    let tasks = state
        .db
        .call(move |db| {
            db.get_project(id)?;
            db.list_tasks(&TaskFilter {
                project_id: Some(id),
                ..Default::default()
            })
        })
        .await?;
    Ok(Json(tasks))
}
