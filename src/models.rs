use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Enums ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Company {
    Immoseed,
    NovaraRealEstate,
    Flowie,
}

impl Company {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Immoseed => "immoseed",
            Self::NovaraRealEstate => "novara_real_estate",
            Self::Flowie => "flowie",
        }
    }
}

impl FromStr for Company {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "immoseed" => Ok(Self::Immoseed),
            "novara_real_estate" => Ok(Self::NovaraRealEstate),
            "flowie" => Ok(Self::Flowie),
            _ => Err(format!("Invalid company: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Ongoing,
    #[serde(alias = "completed")]
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Ongoing => "ongoing",
            Self::Done => "done",
        }
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "ongoing" => Ok(Self::Ongoing),
            "done" | "completed" => Ok(Self::Done),
            _ => Err(format!("Invalid task status: {}", s)),
        }
    }
}

// ── Entities ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub company: Company,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: i64,
    pub project_id: i64,
    pub parent_task_id: Option<i64>,
    pub task_type_id: Option<i64>,
    pub employee_id: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    pub due_date: DateTime<Utc>,
    pub status: TaskStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskType {
    pub id: i64,
    pub name: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Employee {
    pub id: i64,
    pub user_id: Option<i64>,
    pub name: String,
    pub email: String,
    pub active: bool,
    /// Sole credential of the calendar feed; only returned by the
    /// regenerate endpoint.
    #[serde(skip_serializing, default)]
    pub calendar_token: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Credential record. Never serialized to clients.
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub token_version: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct RefreshToken {
    pub id: i64,
    pub user_id: i64,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
}

// API view types
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TaskCounts {
    pub total: i64,
    pub pending: i64,
    pub ongoing: i64,
    pub done: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectDetail {
    #[serde(flatten)]
    pub project: Project,
    pub task_counts: TaskCounts,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDetail {
    #[serde(flatten)]
    pub task: Task,
    pub subtasks: Vec<Task>,
}

/// A task as it appears in an employee's calendar feed.
#[derive(Debug, Clone)]
pub struct CalendarEntry {
    pub task_id: i64,
    pub project_title: String,
    pub title: String,
    pub description: Option<String>,
    pub due_date: DateTime<Utc>,
}

// ── Commands ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct CreateProject {
    pub title: String,
    pub description: Option<String>,
    pub company: Company,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProject {
    pub title: Option<String>,
    /// `Some("")` clears the description.
    pub description: Option<String>,
    pub company: Option<Company>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTask {
    pub project_id: i64,
    pub parent_task_id: Option<i64>,
    pub task_type_id: Option<i64>,
    pub employee_id: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    pub due_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTask {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub task_type_id: Option<i64>,
    pub employee_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangeTaskStatus {
    pub status: TaskStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTaskType {
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTaskType {
    pub name: Option<String>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateEmployee {
    pub name: String,
    pub email: String,
    pub user_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateEmployee {
    pub name: Option<String>,
    pub email: Option<String>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Register {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Login {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefreshSession {
    pub refresh_token: String,
}

// ── Queries ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectFilter {
    pub company: Option<Company>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskFilter {
    pub project_id: Option<i64>,
    pub employee_id: Option<i64>,
    pub status: Option<TaskStatus>,
    pub parent_id: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_status_round_trips_through_str() {
        for status in [TaskStatus::Pending, TaskStatus::Ongoing, TaskStatus::Done] {
            assert_eq!(TaskStatus::from_str(status.as_str()).unwrap(), status);
        }
    }

    #[test]
    fn test_task_status_accepts_completed_alias() {
        assert_eq!(TaskStatus::from_str("completed").unwrap(), TaskStatus::Done);
        let parsed: TaskStatus = serde_json::from_str("\"completed\"").unwrap();
        assert_eq!(parsed, TaskStatus::Done);
        assert!(TaskStatus::from_str("archived").is_err());
    }

    #[test]
    fn test_company_serializes_snake_case() {
        let json = serde_json::to_string(&Company::NovaraRealEstate).unwrap();
        assert_eq!(json, "\"novara_real_estate\"");
        assert_eq!(Company::from_str("immoseed").unwrap(), Company::Immoseed);
        assert!(Company::from_str("acme").is_err());
    }

    #[test]
    fn test_project_detail_flattens_project() {
        let now = Utc::now();
        let detail = ProjectDetail {
            project: Project {
                id: 7,
                title: "Renovation".into(),
                description: None,
                company: Company::Flowie,
                created_at: now,
                updated_at: now,
            },
            task_counts: TaskCounts {
                total: 2,
                pending: 1,
                ongoing: 0,
                done: 1,
            },
        };
        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["company"], "flowie");
        assert_eq!(json["task_counts"]["done"], 1);
    }
}
