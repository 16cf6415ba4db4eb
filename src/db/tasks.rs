use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{OptionalExtension, Row, params, params_from_iter};

use super::{FlowieDb, map_not_found, non_empty, parse_column};
use crate::errors::{FlowieError, Result};
use crate::models::{CreateTask, Task, TaskDetail, TaskFilter, TaskStatus, UpdateTask};
use crate::status;

const TASK_COLUMNS: &str = "id, project_id, parent_task_id, task_type_id, employee_id, title, \
     description, due_date, status, started_at, completed_at, created_at, updated_at";

/// Intermediate row struct for tasks.
struct TaskRow {
    id: i64,
    project_id: i64,
    parent_task_id: Option<i64>,
    task_type_id: Option<i64>,
    employee_id: Option<i64>,
    title: String,
    description: Option<String>,
    due_date: DateTime<Utc>,
    status: String,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TaskRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            project_id: row.get(1)?,
            parent_task_id: row.get(2)?,
            task_type_id: row.get(3)?,
            employee_id: row.get(4)?,
            title: row.get(5)?,
            description: row.get(6)?,
            due_date: row.get(7)?,
            status: row.get(8)?,
            started_at: row.get(9)?,
            completed_at: row.get(10)?,
            created_at: row.get(11)?,
            updated_at: row.get(12)?,
        })
    }

    fn into_task(self) -> rusqlite::Result<Task> {
        Ok(Task {
            id: self.id,
            project_id: self.project_id,
            parent_task_id: self.parent_task_id,
            task_type_id: self.task_type_id,
            employee_id: self.employee_id,
            title: self.title,
            description: self.description,
            due_date: self.due_date,
            status: parse_column(8, &self.status)?,
            started_at: self.started_at,
            completed_at: self.completed_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    TaskRow::from_row(row)?.into_task()
}

impl FlowieDb {
    // ── Task CRUD ─────────────────────────────────────────────────────

    /// Create a task (or subtask when `parent_task_id` is set).
    ///
    /// A subtask must live in its parent's project. Creating one extends the
    /// parent's due date when needed and re-derives the parent's status.
    pub fn create_task(&self, cmd: &CreateTask, now: DateTime<Utc>) -> Result<Task> {
        self.get_project(cmd.project_id)?;

        let parent = match cmd.parent_task_id {
            Some(parent_id) => {
                let parent = self.get_task(parent_id)?;
                if parent.project_id != cmd.project_id {
                    return Err(FlowieError::validation(
                        "parent_task_id",
                        "parent task belongs to a different project",
                    ));
                }
                Some(parent)
            }
            None => None,
        };
        self.check_task_type_assignable(cmd.task_type_id)?;
        self.check_employee_assignable(cmd.employee_id)?;

        // Safety: DbHandle's Mutex already guarantees single-threaded access.
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO tasks (project_id, parent_task_id, task_type_id, employee_id, title,
                                description, due_date, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'pending', ?8, ?8)",
            params![
                cmd.project_id,
                cmd.parent_task_id,
                cmd.task_type_id,
                cmd.employee_id,
                cmd.title.trim(),
                non_empty(cmd.description.as_deref()),
                cmd.due_date,
                now
            ],
        )?;
        let id = tx.last_insert_rowid();

        if let Some(parent) = &parent {
            self.extend_ancestor_due_dates(parent.id, cmd.due_date, now)?;
            self.refresh_rollup(parent.id, now)?;
        }
        tx.commit()?;

        tracing::debug!(task_id = id, project_id = cmd.project_id, "task created");
        self.get_task(id)
    }

    pub fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        let mut sql = format!(
            "SELECT {} FROM tasks WHERE is_deleted = 0",
            TASK_COLUMNS
        );
        let mut values: Vec<Value> = Vec::new();
        let mut push = |sql: &mut String, column: &str, value: Value| {
            values.push(value);
            sql.push_str(&format!(" AND {} = ?{}", column, values.len()));
        };
        if let Some(project_id) = filter.project_id {
            push(&mut sql, "project_id", Value::Integer(project_id));
        }
        if let Some(employee_id) = filter.employee_id {
            push(&mut sql, "employee_id", Value::Integer(employee_id));
        }
        if let Some(status) = filter.status {
            push(&mut sql, "status", Value::Text(status.as_str().to_string()));
        }
        if let Some(parent_id) = filter.parent_id {
            push(&mut sql, "parent_task_id", Value::Integer(parent_id));
        }
        sql.push_str(" ORDER BY due_date, id");

        self.query_tasks(&sql, values)
    }

    pub(crate) fn find_task(&self, id: i64) -> Result<Option<Task>> {
        let task = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM tasks WHERE id = ?1 AND is_deleted = 0",
                    TASK_COLUMNS
                ),
                params![id],
                task_from_row,
            )
            .optional()?;
        Ok(task)
    }

    pub fn get_task(&self, id: i64) -> Result<Task> {
        map_not_found(self.find_task(id)?, "Task", id)
    }

    pub fn get_task_detail(&self, id: i64) -> Result<TaskDetail> {
        let task = self.get_task(id)?;
        let subtasks = self.subtasks_of(id)?;
        Ok(TaskDetail { task, subtasks })
    }

    /// Direct, non-deleted subtasks of a task.
    pub fn list_subtasks(&self, parent_id: i64) -> Result<Vec<Task>> {
        self.get_task(parent_id)?;
        self.subtasks_of(parent_id)
    }

    pub fn update_task(&self, id: i64, cmd: &UpdateTask, now: DateTime<Utc>) -> Result<Task> {
        let mut task = self.get_task(id)?;
        if let Some(title) = &cmd.title {
            task.title = title.trim().to_string();
        }
        if cmd.description.is_some() {
            task.description = non_empty(cmd.description.as_deref());
        }
        if cmd.task_type_id.is_some() {
            self.check_task_type_assignable(cmd.task_type_id)?;
            task.task_type_id = cmd.task_type_id;
        }
        if cmd.employee_id.is_some() {
            self.check_employee_assignable(cmd.employee_id)?;
            task.employee_id = cmd.employee_id;
        }
        let due_date_changed = match cmd.due_date {
            Some(due) if due != task.due_date => {
                task.due_date = due;
                true
            }
            _ => false,
        };

        // Safety: DbHandle's Mutex already guarantees single-threaded access.
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "UPDATE tasks SET title = ?1, description = ?2, task_type_id = ?3, employee_id = ?4,
                              due_date = ?5, updated_at = ?6
             WHERE id = ?7",
            params![
                task.title,
                task.description,
                task.task_type_id,
                task.employee_id,
                task.due_date,
                now,
                id
            ],
        )?;
        if due_date_changed && let Some(parent_id) = task.parent_task_id {
            self.extend_ancestor_due_dates(parent_id, task.due_date, now)?;
        }
        tx.commit()?;

        self.get_task(id)
    }

    /// Change a task's status and re-derive every ancestor's status.
    ///
    /// Tasks with subtasks take their status from them, so setting it
    /// directly is rejected.
    pub fn set_task_status(
        &self,
        id: i64,
        next: TaskStatus,
        now: DateTime<Utc>,
    ) -> Result<Task> {
        let mut task = self.get_task(id)?;
        if !self.subtasks_of(id)?.is_empty() {
            return Err(FlowieError::validation(
                "status",
                "status of a task with subtasks is derived from its subtasks",
            ));
        }

        let previous = task.status;
        status::apply_status(&mut task, next, now);

        // Safety: DbHandle's Mutex already guarantees single-threaded access.
        let tx = self.conn.unchecked_transaction()?;
        self.save_status(&task, now)?;
        if let Some(parent_id) = task.parent_task_id {
            self.refresh_rollup(parent_id, now)?;
        }
        tx.commit()?;

        tracing::info!(
            task_id = id,
            from = previous.as_str(),
            to = next.as_str(),
            "task status changed"
        );
        self.get_task(id)
    }

    /// Soft-delete a task and all its descendants.
    pub fn delete_task(&self, id: i64, now: DateTime<Utc>) -> Result<()> {
        let task = self.get_task(id)?;

        // Safety: DbHandle's Mutex already guarantees single-threaded access.
        let tx = self.conn.unchecked_transaction()?;
        let deleted = tx.execute(
            "WITH RECURSIVE subtree(id) AS (
                 SELECT ?1
                 UNION ALL
                 SELECT t.id FROM tasks t JOIN subtree s ON t.parent_task_id = s.id
             )
             UPDATE tasks SET is_deleted = 1, updated_at = ?2
             WHERE id IN (SELECT id FROM subtree) AND is_deleted = 0",
            params![id, now],
        )?;
        if let Some(parent_id) = task.parent_task_id {
            self.refresh_rollup(parent_id, now)?;
        }
        tx.commit()?;

        tracing::info!(task_id = id, deleted, "task deleted");
        Ok(())
    }

    // ── Tree maintenance ──────────────────────────────────────────────

    fn subtasks_of(&self, parent_id: i64) -> Result<Vec<Task>> {
        self.query_tasks(
            &format!(
                "SELECT {} FROM tasks WHERE parent_task_id = ?1 AND is_deleted = 0
                 ORDER BY due_date, id",
                TASK_COLUMNS
            ),
            vec![Value::Integer(parent_id)],
        )
    }

    fn query_tasks(&self, sql: &str, values: Vec<Value>) -> Result<Vec<Task>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), task_from_row)?;
        let mut tasks = Vec::new();
        for row in rows {
            tasks.push(row?);
        }
        Ok(tasks)
    }

    fn save_status(&self, task: &Task, now: DateTime<Utc>) -> Result<()> {
        self.conn.execute(
            "UPDATE tasks SET status = ?1, started_at = ?2, completed_at = ?3, updated_at = ?4
             WHERE id = ?5",
            params![
                task.status.as_str(),
                task.started_at,
                task.completed_at,
                now,
                task.id
            ],
        )?;
        Ok(())
    }

    /// Walk up from `task_id`, re-deriving each ancestor's status from its
    /// subtasks. Stops at the first task whose status does not change.
    fn refresh_rollup(&self, task_id: i64, now: DateTime<Utc>) -> Result<()> {
        let mut current = Some(task_id);
        while let Some(id) = current {
            let mut task = self.get_task(id)?;
            let children = self.subtasks_of(id)?;
            let derived = match status::rollup(children.iter().map(|c| c.status)) {
                Some(derived) if derived != task.status => derived,
                _ => break,
            };
            tracing::debug!(
                task_id = id,
                from = task.status.as_str(),
                to = derived.as_str(),
                "parent status rolled up"
            );
            status::apply_status(&mut task, derived, now);
            self.save_status(&task, now)?;
            current = task.parent_task_id;
        }
        Ok(())
    }

    /// Push `due_date` up the ancestor chain wherever it exceeds the
    /// ancestor's own due date.
    fn extend_ancestor_due_dates(
        &self,
        parent_id: i64,
        due_date: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let mut current = Some(parent_id);
        while let Some(id) = current {
            let parent = self.get_task(id)?;
            if due_date <= parent.due_date {
                break;
            }
            self.conn.execute(
                "UPDATE tasks SET due_date = ?1, updated_at = ?2 WHERE id = ?3",
                params![due_date, now, id],
            )?;
            tracing::debug!(task_id = id, "parent due date extended");
            current = parent.parent_task_id;
        }
        Ok(())
    }
}
