use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{PathParam, Payload, QueryParams, SharedState};
use crate::auth::AuthUser;
use crate::errors::Result;
use crate::models::{ChangeTaskStatus, CreateTask, TaskFilter, UpdateTask};
use crate::validation::Validate;

/// Body of `POST /api/tasks/{id}/subtasks`; project and parent come from
/// the parent task.
#[derive(Debug, Deserialize)]
pub struct CreateSubtask {
    pub task_type_id: Option<i64>,
    pub employee_id: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    pub due_date: DateTime<Utc>,
}

pub async fn list_tasks(
    State(state): State<SharedState>,
    _user: AuthUser,
    QueryParams(filter): QueryParams<TaskFilter>,
) -> Result<impl IntoResponse> {
    let tasks = state.db.call(move |db| db.list_tasks(&filter)).await?;
    Ok(Json(tasks))
}

pub async fn create_task(
    State(state): State<SharedState>,
    user: AuthUser,
    Payload(cmd): Payload<CreateTask>,
) -> Result<impl IntoResponse> {
    let ctx = state.validation_context();
    cmd.validate(&ctx)?;
    let task = state
        .db
        .call(move |db| db.create_task(&cmd, ctx.now))
        .await?;
    tracing::info!(
        task_id = task.id,
        project_id = task.project_id,
        user_id = user.user_id,
        "task created"
    );
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn get_task(
    State(state): State<SharedState>,
    _user: AuthUser,
    PathParam(id): PathParam<i64>,
) -> Result<impl IntoResponse> {
    let detail = state.db.call(move |db| db.get_task_detail(id)).await?;
    Ok(Json(detail))
}

pub async fn update_task(
    State(state): State<SharedState>,
    _user: AuthUser,
    PathParam(id): PathParam<i64>,
    Payload(cmd): Payload<UpdateTask>,
) -> Result<impl IntoResponse> {
    let ctx = state.validation_context();
    cmd.validate(&ctx)?;
    let task = state
        .db
        .call(move |db| db.update_task(id, &cmd, ctx.now))
        .await?;
    Ok(Json(task))
}

pub async fn change_status(
    State(state): State<SharedState>,
    _user: AuthUser,
    PathParam(id): PathParam<i64>,
    Payload(cmd): Payload<ChangeTaskStatus>,
) -> Result<impl IntoResponse> {
    let now = state.clock.now();
    let task = state
        .db
        .call(move |db| db.set_task_status(id, cmd.status, now))
        .await?;
    Ok(Json(task))
}

pub async fn delete_task(
    State(state): State<SharedState>,
    user: AuthUser,
    PathParam(id): PathParam<i64>,
) -> Result<impl IntoResponse> {
    let now = state.clock.now();
    state.db.call(move |db| db.delete_task(id, now)).await?;
    tracing::info!(task_id = id, user_id = user.user_id, "task deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_subtasks(
    State(state): State<SharedState>,
    _user: AuthUser,
    PathParam(id): PathParam<i64>,
) -> Result<impl IntoResponse> {
    let subtasks = state.db.call(move |db| db.list_subtasks(id)).await?;
    Ok(Json(subtasks))
}

pub async fn create_subtask(
    State(state): State<SharedState>,
    _user: AuthUser,
    PathParam(parent_id): PathParam<i64>,
    Payload(req): Payload<CreateSubtask>,
) -> Result<impl IntoResponse> {
    let ctx = state.validation_context();
    let task = state
        .db
        .call(move |db| {
            let parent = db.get_task(parent_id)?;
            let cmd = CreateTask {
                project_id: parent.project_id,
                parent_task_id: Some(parent.id),
                task_type_id: req.task_type_id,
                employee_id: req.employee_id,
                title: req.title,
                description: req.description,
                due_date: req.due_date,
            };
            cmd.validate(&ctx)?;
            db.create_task(&cmd, ctx.now)
        })
        .await?;
    Ok((StatusCode::CREATED, Json(task)))
}
