//! Input validators.
//!
//! Each command type implements [`Validate`]; handlers call it before
//! touching the database. Checks that need stored state (parent belongs to
//! the same project, task type still in use, ...) live in the `db` layer.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::errors::{Result, ValidationErrors};
use crate::models::{
    CreateEmployee, CreateProject, CreateTask, CreateTaskType, Register, UpdateEmployee,
    UpdateProject, UpdateTask, UpdateTaskType,
};

pub const TITLE_MIN: usize = 3;
pub const TITLE_MAX: usize = 200;
pub const DESCRIPTION_MAX: usize = 4000;
pub const TASK_TYPE_NAME_MIN: usize = 2;
pub const TASK_TYPE_NAME_MAX: usize = 50;
pub const EMPLOYEE_NAME_MIN: usize = 2;
pub const EMPLOYEE_NAME_MAX: usize = 100;
pub const EMAIL_MAX: usize = 254;
pub const PASSWORD_MIN: usize = 8;
pub const PASSWORD_MAX: usize = 128;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex is valid")
});

/// Validation context: whatever a validator needs besides the input itself.
#[derive(Debug, Clone, Copy)]
pub struct ValidationContext {
    pub now: DateTime<Utc>,
}

pub trait Validate {
    fn validate(&self, ctx: &ValidationContext) -> Result<()>;
}

// ── Field rules ───────────────────────────────────────────────────────

fn char_len(value: &str) -> usize {
    value.trim().chars().count()
}

pub fn check_length(
    errors: &mut ValidationErrors,
    field: &str,
    value: &str,
    min: usize,
    max: usize,
) {
    let len = char_len(value);
    if len < min {
        errors.add(field, format!("must be at least {} characters", min));
    } else if len > max {
        errors.add(field, format!("must be at most {} characters", max));
    }
}

pub fn check_title(errors: &mut ValidationErrors, title: &str) {
    check_length(errors, "title", title, TITLE_MIN, TITLE_MAX);
}

pub fn check_description(errors: &mut ValidationErrors, description: Option<&str>) {
    if let Some(d) = description
        && d.chars().count() > DESCRIPTION_MAX
    {
        errors.add(
            "description",
            format!("must be at most {} characters", DESCRIPTION_MAX),
        );
    }
}

pub fn check_email(errors: &mut ValidationErrors, email: &str) {
    let email = email.trim();
    if email.len() > EMAIL_MAX {
        errors.add("email", format!("must be at most {} characters", EMAIL_MAX));
    } else if !EMAIL_RE.is_match(email) {
        errors.add("email", "must be a valid email address");
    }
}

pub fn check_password(errors: &mut ValidationErrors, password: &str) {
    let len = password.chars().count();
    if len < PASSWORD_MIN {
        errors.add(
            "password",
            format!("must be at least {} characters", PASSWORD_MIN),
        );
    } else if len > PASSWORD_MAX {
        errors.add(
            "password",
            format!("must be at most {} characters", PASSWORD_MAX),
        );
    }
}

fn check_positive_id(errors: &mut ValidationErrors, field: &str, id: Option<i64>) {
    if let Some(id) = id
        && id <= 0
    {
        errors.add(field, "must be a positive id");
    }
}

// ── Command validators ────────────────────────────────────────────────

impl Validate for CreateProject {
    fn validate(&self, _ctx: &ValidationContext) -> Result<()> {
        let mut errors = ValidationErrors::new();
        check_title(&mut errors, &self.title);
        check_description(&mut errors, self.description.as_deref());
        errors.into_result()
    }
}

impl Validate for UpdateProject {
    fn validate(&self, _ctx: &ValidationContext) -> Result<()> {
        let mut errors = ValidationErrors::new();
        if let Some(title) = &self.title {
            check_title(&mut errors, title);
        }
        check_description(&mut errors, self.description.as_deref());
        errors.into_result()
    }
}

impl Validate for CreateTask {
    fn validate(&self, ctx: &ValidationContext) -> Result<()> {
        let mut errors = ValidationErrors::new();
        check_title(&mut errors, &self.title);
        check_description(&mut errors, self.description.as_deref());
        if self.due_date <= ctx.now {
            errors.add("due_date", "must be in the future");
        }
        check_positive_id(&mut errors, "project_id", Some(self.project_id));
        check_positive_id(&mut errors, "parent_task_id", self.parent_task_id);
        check_positive_id(&mut errors, "task_type_id", self.task_type_id);
        check_positive_id(&mut errors, "employee_id", self.employee_id);
        errors.into_result()
    }
}

impl Validate for UpdateTask {
    fn validate(&self, _ctx: &ValidationContext) -> Result<()> {
        let mut errors = ValidationErrors::new();
        if let Some(title) = &self.title {
            check_title(&mut errors, title);
        }
        check_description(&mut errors, self.description.as_deref());
        check_positive_id(&mut errors, "task_type_id", self.task_type_id);
        check_positive_id(&mut errors, "employee_id", self.employee_id);
        errors.into_result()
    }
}

impl Validate for CreateTaskType {
    fn validate(&self, _ctx: &ValidationContext) -> Result<()> {
        let mut errors = ValidationErrors::new();
        check_length(
            &mut errors,
            "name",
            &self.name,
            TASK_TYPE_NAME_MIN,
            TASK_TYPE_NAME_MAX,
        );
        errors.into_result()
    }
}

impl Validate for UpdateTaskType {
    fn validate(&self, _ctx: &ValidationContext) -> Result<()> {
        let mut errors = ValidationErrors::new();
        if let Some(name) = &self.name {
            check_length(
                &mut errors,
                "name",
                name,
                TASK_TYPE_NAME_MIN,
                TASK_TYPE_NAME_MAX,
            );
        }
        errors.into_result()
    }
}

impl Validate for CreateEmployee {
    fn validate(&self, _ctx: &ValidationContext) -> Result<()> {
        let mut errors = ValidationErrors::new();
        check_length(
            &mut errors,
            "name",
            &self.name,
            EMPLOYEE_NAME_MIN,
            EMPLOYEE_NAME_MAX,
        );
        check_email(&mut errors, &self.email);
        check_positive_id(&mut errors, "user_id", self.user_id);
        errors.into_result()
    }
}

impl Validate for UpdateEmployee {
    fn validate(&self, _ctx: &ValidationContext) -> Result<()> {
        let mut errors = ValidationErrors::new();
        if let Some(name) = &self.name {
            check_length(
                &mut errors,
                "name",
                name,
                EMPLOYEE_NAME_MIN,
                EMPLOYEE_NAME_MAX,
            );
        }
        if let Some(email) = &self.email {
            check_email(&mut errors, email);
        }
        errors.into_result()
    }
}

impl Validate for Register {
    fn validate(&self, _ctx: &ValidationContext) -> Result<()> {
        let mut errors = ValidationErrors::new();
        check_email(&mut errors, &self.email);
        check_password(&mut errors, &self.password);
        check_length(
            &mut errors,
            "name",
            &self.name,
            EMPLOYEE_NAME_MIN,
            EMPLOYEE_NAME_MAX,
        );
        errors.into_result()
    }
}
