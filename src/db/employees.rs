use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, params};
use uuid::Uuid;

use super::{FlowieDb, map_not_found};
use crate::errors::{FlowieError, Result};
use crate::models::{CalendarEntry, CreateEmployee, Employee, UpdateEmployee};

const EMPLOYEE_COLUMNS: &str = "id, user_id, name, email, active, calendar_token, created_at";

fn employee_from_row(row: &Row<'_>) -> rusqlite::Result<Employee> {
    Ok(Employee {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        email: row.get(3)?,
        active: row.get(4)?,
        calendar_token: row.get(5)?,
        created_at: row.get(6)?,
    })
}

impl FlowieDb {
    // ── Employee CRUD ─────────────────────────────────────────────────

    pub fn create_employee(&self, cmd: &CreateEmployee, now: DateTime<Utc>) -> Result<Employee> {
        if let Some(user_id) = cmd.user_id {
            self.get_user(user_id)?;
            if self.find_employee_by_user(user_id)?.is_some() {
                return Err(FlowieError::validation(
                    "user_id",
                    "user is already linked to an employee",
                ));
            }
        }
        self.conn.execute(
            "INSERT INTO employees (user_id, name, email, active, created_at)
             VALUES (?1, ?2, ?3, 1, ?4)",
            params![cmd.user_id, cmd.name.trim(), cmd.email.trim(), now],
        )?;
        self.get_employee(self.conn.last_insert_rowid())
    }

    pub fn list_employees(&self, active_only: bool) -> Result<Vec<Employee>> {
        let filter = if active_only { "WHERE active = 1" } else { "" };
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM employees {} ORDER BY name, id",
            EMPLOYEE_COLUMNS, filter
        ))?;
        let rows = stmt.query_map([], employee_from_row)?;
        let mut employees = Vec::new();
        for row in rows {
            employees.push(row?);
        }
        Ok(employees)
    }

    pub fn get_employee(&self, id: i64) -> Result<Employee> {
        let employee = self
            .conn
            .query_row(
                &format!("SELECT {} FROM employees WHERE id = ?1", EMPLOYEE_COLUMNS),
                params![id],
                employee_from_row,
            )
            .optional()?;
        map_not_found(employee, "Employee", id)
    }

    pub(crate) fn find_employee_by_user(&self, user_id: i64) -> Result<Option<Employee>> {
        let employee = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM employees WHERE user_id = ?1",
                    EMPLOYEE_COLUMNS
                ),
                params![user_id],
                employee_from_row,
            )
            .optional()?;
        Ok(employee)
    }

    pub fn get_employee_by_user(&self, user_id: i64) -> Result<Employee> {
        map_not_found(
            self.find_employee_by_user(user_id)?,
            "Employee for user",
            user_id,
        )
    }

    pub fn update_employee(&self, id: i64, cmd: &UpdateEmployee) -> Result<Employee> {
        let mut employee = self.get_employee(id)?;
        if let Some(name) = &cmd.name {
            employee.name = name.trim().to_string();
        }
        if let Some(email) = &cmd.email {
            employee.email = email.trim().to_string();
        }
        if let Some(active) = cmd.active {
            employee.active = active;
        }
        self.conn.execute(
            "UPDATE employees SET name = ?1, email = ?2, active = ?3 WHERE id = ?4",
            params![employee.name, employee.email, employee.active, id],
        )?;
        self.get_employee(id)
    }

    // ── Calendar feed ─────────────────────────────────────────────────

    /// Issue a fresh calendar token, invalidating the previous one.
    pub fn regenerate_calendar_token(&self, id: i64) -> Result<Employee> {
        self.get_employee(id)?;
        let token = Uuid::new_v4().to_string();
        self.conn.execute(
            "UPDATE employees SET calendar_token = ?1 WHERE id = ?2",
            params![token, id],
        )?;
        tracing::info!(employee_id = id, "calendar token regenerated");
        self.get_employee(id)
    }

    pub fn employee_by_calendar_token(&self, token: &str) -> Result<Employee> {
        let employee = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM employees WHERE calendar_token = ?1 AND active = 1",
                    EMPLOYEE_COLUMNS
                ),
                params![token],
                employee_from_row,
            )
            .optional()?;
        map_not_found(employee, "Calendar feed", "for this token")
    }

    /// Open tasks assigned to an employee, in feed order.
    pub fn calendar_tasks(&self, employee_id: i64) -> Result<Vec<CalendarEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT t.id, p.title, t.title, t.description, t.due_date
             FROM tasks t
             JOIN projects p ON p.id = t.project_id
             WHERE t.employee_id = ?1
               AND t.is_deleted = 0
               AND p.is_deleted = 0
               AND t.status != 'done'
             ORDER BY t.due_date, t.id",
        )?;
        let rows = stmt.query_map(params![employee_id], |row| {
            Ok(CalendarEntry {
                task_id: row.get(0)?,
                project_title: row.get(1)?,
                title: row.get(2)?,
                description: row.get(3)?,
                due_date: row.get(4)?,
            })
        })?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    /// A task may only be (re)assigned to an existing, active employee.
    pub(crate) fn check_employee_assignable(&self, id: Option<i64>) -> Result<()> {
        let Some(id) = id else {
            return Ok(());
        };
        let employee = self.get_employee(id)?;
        if !employee.active {
            return Err(FlowieError::validation("employee_id", "employee is inactive"));
        }
        Ok(())
    }
}
