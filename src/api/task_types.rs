use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use super::{PathParam, Payload, QueryParams, SharedState};
use crate::auth::AuthUser;
use crate::errors::Result;
use crate::models::{CreateTaskType, UpdateTaskType};
use crate::validation::Validate;

#[derive(Debug, Default, Deserialize)]
pub struct ActiveFilter {
    #[serde(default)]
    pub active_only: bool,
}

pub async fn list_task_types(
    State(state): State<SharedState>,
    _user: AuthUser,
    QueryParams(filter): QueryParams<ActiveFilter>,
) -> Result<impl IntoResponse> {
    let task_types = state
        .db
        .call(move |db| db.list_task_types(filter.active_only))
        .await?;
    Ok(Json(task_types))
}

pub async fn create_task_type(
    State(state): State<SharedState>,
    _user: AuthUser,
    Payload(cmd): Payload<CreateTaskType>,
) -> Result<impl IntoResponse> {
    let ctx = state.validation_context();
    cmd.validate(&ctx)?;
    let task_type = state
        .db
        .call(move |db| db.create_task_type(&cmd, ctx.now))
        .await?;
    Ok((StatusCode::CREATED, Json(task_type)))
}

pub async fn get_task_type(
    State(state): State<SharedState>,
    _user: AuthUser,
    PathParam(id): PathParam<i64>,
) -> Result<impl IntoResponse> {
    let task_type = state.db.call(move |db| db.get_task_type(id)).await?;
    Ok(Json(task_type))
}

pub async fn update_task_type(
    State(state): State<SharedState>,
    _user: AuthUser,
    PathParam(id): PathParam<i64>,
    Payload(cmd): Payload<UpdateTaskType>,
) -> Result<impl IntoResponse> {
    cmd.validate(&state.validation_context())?;
    let task_type = state
        .db
        .call(move |db| db.update_task_type(id, &cmd))
        .await?;
    Ok(Json(task_type))
}

pub async fn delete_task_type(
    State(state): State<SharedState>,
    user: AuthUser,
    PathParam(id): PathParam<i64>,
) -> Result<impl IntoResponse> {
    state.db.call(move |db| db.delete_task_type(id)).await?;
    tracing::info!(task_type_id = id, user_id = user.user_id, "task type removed");
    Ok(StatusCode::NO_CONTENT)
}
