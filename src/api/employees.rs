use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};

use super::{PathParam, Payload, QueryParams, SharedState};
use crate::auth::AuthUser;
use crate::errors::{FlowieError, Result};
use crate::models::{CreateEmployee, UpdateEmployee};
use crate::validation::Validate;

#[derive(Debug, Default, Deserialize)]
pub struct EmployeeFilter {
    #[serde(default)]
    pub active_only: bool,
}

#[derive(Debug, Serialize)]
pub struct CalendarToken {
    pub calendar_token: String,
    /// Path of the feed, relative to the server root
    pub feed_path: String,
}

pub async fn list_employees(
    State(state): State<SharedState>,
    _user: AuthUser,
    QueryParams(filter): QueryParams<EmployeeFilter>,
) -> Result<impl IntoResponse> {
    let employees = state
        .db
        .call(move |db| db.list_employees(filter.active_only))
        .await?;
    Ok(Json(employees))
}

pub async fn create_employee(
    State(state): State<SharedState>,
    _user: AuthUser,
    Payload(cmd): Payload<CreateEmployee>,
) -> Result<impl IntoResponse> {
    let ctx = state.validation_context();
    cmd.validate(&ctx)?;
    let employee = state
        .db
        .call(move |db| db.create_employee(&cmd, ctx.now))
        .await?;
    Ok((StatusCode::CREATED, Json(employee)))
}

/// The employee record linked to the caller's account.
pub async fn current_employee(
    State(state): State<SharedState>,
    user: AuthUser,
) -> Result<impl IntoResponse> {
    let user_id = user.user_id;
    let employee = state
        .db
        .call(move |db| db.get_employee_by_user(user_id))
        .await?;
    Ok(Json(employee))
}

pub async fn get_employee(
    State(state): State<SharedState>,
    _user: AuthUser,
    PathParam(id): PathParam<i64>,
) -> Result<impl IntoResponse> {
    let employee = state.db.call(move |db| db.get_employee(id)).await?;
    Ok(Json(employee))
}

pub async fn update_employee(
    State(state): State<SharedState>,
    _user: AuthUser,
    PathParam(id): PathParam<i64>,
    Payload(cmd): Payload<UpdateEmployee>,
) -> Result<impl IntoResponse> {
    cmd.validate(&state.validation_context())?;
    let employee = state
        .db
        .call(move |db| db.update_employee(id, &cmd))
        .await?;
    Ok(Json(employee))
}

/// Issue a new calendar token; the previous feed URL stops working.
/// Only the employee linked to the caller can be rotated; any other id
/// reads as not found.
pub async fn regenerate_calendar_token(
    State(state): State<SharedState>,
    user: AuthUser,
    PathParam(id): PathParam<i64>,
) -> Result<impl IntoResponse> {
    let user_id = user.user_id;
    let employee = state
        .db
        .call(move |db| {
            if db.get_employee_by_user(user_id)?.id != id {
                return Err(FlowieError::not_found("Employee", id));
            }
            db.regenerate_calendar_token(id)
        })
        .await?;
    tracing::info!(employee_id = id, user_id = user.user_id, "calendar feed rotated");

    let calendar_token = employee.calendar_token.unwrap_or_default();
    Ok(Json(CalendarToken {
        feed_path: format!("/api/calendar/{}/feed.ics", calendar_token),
        calendar_token,
    }))
}
