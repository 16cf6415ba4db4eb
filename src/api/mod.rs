//! REST API: shared state, routing and one handler module per feature.

mod auth;
mod calendar;
mod employees;
pub mod error;
mod projects;
mod task_types;
mod tasks;

use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, patch, post},
};

use crate::auth::AuthService;
use crate::clock::Clock;
use crate::config::FlowieConfig;
use crate::db::DbHandle;
use crate::rate_limit::{self, RateLimiter};
use crate::validation::ValidationContext;

pub use error::{PathParam, Payload, QueryParams};

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub db: DbHandle,
    pub clock: Arc<dyn Clock>,
    pub auth: AuthService,
    pub rate_limiter: RateLimiter,
    pub config: FlowieConfig,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(config: FlowieConfig, db: DbHandle, clock: Arc<dyn Clock>) -> Self {
        Self {
            db,
            clock,
            auth: AuthService::new(&config.auth),
            rate_limiter: RateLimiter::new(&config.rate_limit),
            config,
        }
    }

    pub fn validation_context(&self) -> ValidationContext {
        ValidationContext {
            now: self.clock.now(),
        }
    }
}

// ── Router ────────────────────────────────────────────────────────────

/// Auth and API routes with state applied. The rate limiter only guards
/// `/auth/*`.
pub fn api_router(state: SharedState) -> Router {
    let auth_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/logout", post(auth::logout))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::limit_requests,
        ));

    Router::new()
        .route(
            "/api/projects",
            get(projects::list_projects).post(projects::create_project),
        )
        .route(
            "/api/projects/{id}",
            get(projects::get_project)
                .put(projects::update_project)
                .delete(projects::delete_project),
        )
        .route("/api/projects/{id}/tasks", get(projects::list_project_tasks))
        .route("/api/tasks", get(tasks::list_tasks).post(tasks::create_task))
        .route(
            "/api/tasks/{id}",
            get(tasks::get_task)
                .put(tasks::update_task)
                .delete(tasks::delete_task),
        )
        .route("/api/tasks/{id}/status", patch(tasks::change_status))
        .route(
            "/api/tasks/{id}/subtasks",
            get(tasks::list_subtasks).post(tasks::create_subtask),
        )
        .route(
            "/api/task-types",
            get(task_types::list_task_types).post(task_types::create_task_type),
        )
        .route(
            "/api/task-types/{id}",
            get(task_types::get_task_type)
                .put(task_types::update_task_type)
                .delete(task_types::delete_task_type),
        )
        .route(
            "/api/employees",
            get(employees::list_employees).post(employees::create_employee),
        )
        .route("/api/employees/me", get(employees::current_employee))
        .route(
            "/api/employees/{id}",
            get(employees::get_employee).put(employees::update_employee),
        )
        .route(
            "/api/employees/{id}/calendar-token",
            post(employees::regenerate_calendar_token),
        )
        .route("/api/calendar/{token}/feed.ics", get(calendar::feed))
        .route("/health", get(health_check))
        .merge(auth_routes)
        .with_state(state)
}

async fn health_check() -> &'static str {
    "ok"
}

// ── Test support ──────────────────────────────────────────────────────
