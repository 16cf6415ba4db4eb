use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, params};

use super::{FlowieDb, map_not_found};
use crate::errors::{FlowieError, Result};
use crate::models::{CreateTaskType, TaskType, UpdateTaskType};

/// Task types created by `flowie seed-task-types`.
pub const DEFAULT_TASK_TYPES: &[&str] = &["Bug", "Feature", "Improvement"];

const TASK_TYPE_COLUMNS: &str = "id, name, active, created_at";

fn task_type_from_row(row: &Row<'_>) -> rusqlite::Result<TaskType> {
    Ok(TaskType {
        id: row.get(0)?,
        name: row.get(1)?,
        active: row.get(2)?,
        created_at: row.get(3)?,
    })
}

impl FlowieDb {
    // ── Task type CRUD ────────────────────────────────────────────────

    pub fn create_task_type(&self, cmd: &CreateTaskType, now: DateTime<Utc>) -> Result<TaskType> {
        let name = cmd.name.trim();
        self.ensure_task_type_name_free(name, None)?;
        self.conn.execute(
            "INSERT INTO task_types (name, active, created_at) VALUES (?1, 1, ?2)",
            params![name, now],
        )?;
        self.get_task_type(self.conn.last_insert_rowid())
    }

    pub fn list_task_types(&self, active_only: bool) -> Result<Vec<TaskType>> {
        let sql = if active_only {
            format!(
                "SELECT {} FROM task_types WHERE active = 1 ORDER BY name",
                TASK_TYPE_COLUMNS
            )
        } else {
            format!("SELECT {} FROM task_types ORDER BY name", TASK_TYPE_COLUMNS)
        };
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], task_type_from_row)?;
        let mut task_types = Vec::new();
        for row in rows {
            task_types.push(row?);
        }
        Ok(task_types)
    }

    pub(crate) fn find_task_type(&self, id: i64) -> Result<Option<TaskType>> {
        let task_type = self
            .conn
            .query_row(
                &format!("SELECT {} FROM task_types WHERE id = ?1", TASK_TYPE_COLUMNS),
                params![id],
                task_type_from_row,
            )
            .optional()?;
        Ok(task_type)
    }

    pub fn get_task_type(&self, id: i64) -> Result<TaskType> {
        map_not_found(self.find_task_type(id)?, "TaskType", id)
    }

    pub fn update_task_type(&self, id: i64, cmd: &UpdateTaskType) -> Result<TaskType> {
        let mut task_type = self.get_task_type(id)?;
        if let Some(name) = &cmd.name {
            let name = name.trim();
            self.ensure_task_type_name_free(name, Some(id))?;
            task_type.name = name.to_string();
        }
        if let Some(active) = cmd.active {
            task_type.active = active;
        }
        self.conn.execute(
            "UPDATE task_types SET name = ?1, active = ?2 WHERE id = ?3",
            params![task_type.name, task_type.active, id],
        )?;
        self.get_task_type(id)
    }

    /// Hard-delete a task type. Refused while any task row references it.
    pub fn delete_task_type(&self, id: i64) -> Result<()> {
        self.get_task_type(id)?;
        let in_use = self.task_type_usage(id)?;
        if in_use > 0 {
            return Err(FlowieError::validation(
                "task_type",
                format!("is used by {} task(s) and cannot be deleted", in_use),
            ));
        }
        self.conn
            .execute("DELETE FROM task_types WHERE id = ?1", params![id])?;
        tracing::info!(task_type_id = id, "task type deleted");
        Ok(())
    }

    /// Insert the default task types that are not present yet.
    /// Returns how many were added.
    pub fn seed_task_types(&self, names: &[&str], now: DateTime<Utc>) -> Result<usize> {
        let mut added = 0;
        for name in names {
            added += self.conn.execute(
                "INSERT OR IGNORE INTO task_types (name, active, created_at) VALUES (?1, 1, ?2)",
                params![name, now],
            )?;
        }
        Ok(added)
    }

    fn task_type_usage(&self, id: i64) -> Result<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM tasks WHERE task_type_id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn ensure_task_type_name_free(&self, name: &str, except: Option<i64>) -> Result<()> {
        let taken: bool = self.conn.query_row(
            "SELECT COUNT(*) > 0 FROM task_types WHERE name = ?1 COLLATE NOCASE AND id IS NOT ?2",
            params![name, except],
            |row| row.get(0),
        )?;
        if taken {
            return Err(FlowieError::validation("name", "a task type with this name already exists"));
        }
        Ok(())
    }

    /// A task may only be (re)assigned to an existing, active task type.
    pub(crate) fn check_task_type_assignable(&self, id: Option<i64>) -> Result<()> {
        let Some(id) = id else {
            return Ok(());
        };
        let task_type = self.get_task_type(id)?;
        if !task_type.active {
            return Err(FlowieError::validation("task_type_id", "task type is inactive"));
        }
        Ok(())
    }
}
