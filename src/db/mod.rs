//! SQLite persistence for Flowie.
//!
//! `FlowieDb` owns the connection and exposes one method per command or
//! query; each feature's methods live in their own submodule. Handlers never
//! see `FlowieDb` directly, they go through [`DbHandle::call`].

mod employees;
mod projects;
mod task_types;
mod tasks;
mod users;

pub use task_types::DEFAULT_TASK_TYPES;

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context;
use rusqlite::Connection;
use rusqlite::types::Type;

use crate::errors::{FlowieError, Result};

/// Async-safe handle to the Flowie database.
///
/// Wraps `FlowieDb` behind `Arc<Mutex>` and runs all access on tokio's
/// blocking thread pool via `spawn_blocking`, so synchronous SQLite I/O
/// never ties up async worker threads.
#[derive(Clone)]
pub struct DbHandle {
    inner: Arc<std::sync::Mutex<FlowieDb>>,
}

impl DbHandle {
    pub fn new(db: FlowieDb) -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(db)),
        }
    }

    /// Run a closure with access to the database on a blocking thread.
    /// All data passed into `f` must be owned (`'static`).
    pub async fn call<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&FlowieDb) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let db = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = db
                .lock()
                .map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
            f(&guard)
        })
        .await
        .context("DB task panicked")?
    }
}

pub struct FlowieDb {
    conn: Connection,
}

impl FlowieDb {
    /// Open (or create) a SQLite database at the given path and run migrations.
    pub fn new(path: &Path) -> anyhow::Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open SQLite database at {}", path.display()))?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Create an in-memory SQLite database (for testing).
    pub fn new_in_memory() -> anyhow::Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Run several operations as one unit: an `Err` from `f` rolls back
    /// everything it wrote. The operations called inside must not open
    /// their own transaction.
    pub fn in_transaction<R>(&self, f: impl FnOnce(&Self) -> Result<R>) -> Result<R> {
        // Safety: DbHandle's Mutex already guarantees single-threaded access.
        let tx = self.conn.unchecked_transaction()?;
        let value = f(self)?;
        tx.commit()?;
        Ok(value)
    }

    fn init(&self) -> anyhow::Result<()> {
        self.conn
            .execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign keys")?;
        self.run_migrations().context("Failed to run migrations")?;
        Ok(())
    }

    fn run_migrations(&self) -> anyhow::Result<()> {
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS users (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    email TEXT NOT NULL UNIQUE COLLATE NOCASE,
                    password_hash TEXT NOT NULL,
                    token_version INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS refresh_tokens (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    token_hash TEXT NOT NULL UNIQUE,
                    expires_at TEXT NOT NULL,
                    revoked INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS employees (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER UNIQUE REFERENCES users(id) ON DELETE SET NULL,
                    name TEXT NOT NULL,
                    email TEXT NOT NULL,
                    active INTEGER NOT NULL DEFAULT 1,
                    calendar_token TEXT UNIQUE,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS projects (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    title TEXT NOT NULL,
                    description TEXT,
                    company TEXT NOT NULL,
                    is_deleted INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS task_types (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL UNIQUE COLLATE NOCASE,
                    active INTEGER NOT NULL DEFAULT 1,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS tasks (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                    parent_task_id INTEGER REFERENCES tasks(id) ON DELETE CASCADE,
                    task_type_id INTEGER REFERENCES task_types(id),
                    employee_id INTEGER REFERENCES employees(id) ON DELETE SET NULL,
                    title TEXT NOT NULL,
                    description TEXT,
                    due_date TEXT NOT NULL,
                    status TEXT NOT NULL DEFAULT 'pending',
                    started_at TEXT,
                    completed_at TEXT,
                    is_deleted INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_tasks_project ON tasks(project_id);
                CREATE INDEX IF NOT EXISTS idx_tasks_parent ON tasks(parent_task_id);
                CREATE INDEX IF NOT EXISTS idx_tasks_employee ON tasks(employee_id);
                CREATE INDEX IF NOT EXISTS idx_tasks_task_type ON tasks(task_type_id);
                CREATE INDEX IF NOT EXISTS idx_refresh_tokens_user ON refresh_tokens(user_id);
                ",
            )
            .context("Failed to create tables")?;
        Ok(())
    }
}

/// Parse a text column into a domain enum, surfacing bad data as a
/// conversion error on that column.
fn parse_column<T>(idx: usize, value: &str) -> rusqlite::Result<T>
where
    T: FromStr<Err = String>,
{
    T::from_str(value).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, anyhow::anyhow!(e).into())
    })
}

/// Treat empty optional text as absent.
fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn map_not_found<T>(result: Option<T>, entity: &'static str, id: impl ToString) -> Result<T> {
    result.ok_or_else(|| FlowieError::not_found(entity, id))
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use super::FlowieDb;
    use crate::models::{Company, CreateProject, CreateTask, Project, Task};

    pub fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 1, 9, 0, 0).unwrap()
    }

    pub fn db() -> FlowieDb {
        FlowieDb::new_in_memory().unwrap()
    }

    pub fn project(db: &FlowieDb, title: &str) -> Project {
        db.create_project(
            &CreateProject {
                title: title.to_string(),
                description: None,
                company: Company::Immoseed,
            },
            now(),
        )
        .unwrap()
    }

    pub fn new_task(project_id: i64, title: &str, due_in_days: i64) -> CreateTask {
        CreateTask {
            project_id,
            parent_task_id: None,
            task_type_id: None,
            employee_id: None,
            title: title.to_string(),
            description: None,
            due_date: now() + Duration::days(due_in_days),
        }
    }

    pub fn task(db: &FlowieDb, project_id: i64, title: &str, due_in_days: i64) -> Task {
        db.create_task(&new_task(project_id, title, due_in_days), now())
            .unwrap()
    }

    pub fn subtask(
        db: &FlowieDb,
        parent: &Task,
        title: &str,
        due_in_days: i64,
    ) -> Task {
        let mut cmd = new_task(parent.project_id, title, due_in_days);
        cmd.parent_task_id = Some(parent.id);
        db.create_task(&cmd, now()).unwrap()
    }
}
