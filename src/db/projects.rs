use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{OptionalExtension, Row, params, params_from_iter};

use super::{FlowieDb, map_not_found, non_empty, parse_column};
use crate::errors::Result;
use crate::models::{
    CreateProject, Project, ProjectDetail, ProjectFilter, TaskCounts, TaskStatus, UpdateProject,
};

const PROJECT_COLUMNS: &str = "id, title, description, company, created_at, updated_at";

fn project_from_row(row: &Row<'_>) -> rusqlite::Result<Project> {
    let company: String = row.get(3)?;
    Ok(Project {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        company: parse_column(3, &company)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

impl FlowieDb {
    // ── Project CRUD ──────────────────────────────────────────────────

    pub fn create_project(&self, cmd: &CreateProject, now: DateTime<Utc>) -> Result<Project> {
        self.conn.execute(
            "INSERT INTO projects (title, description, company, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![
                cmd.title.trim(),
                non_empty(cmd.description.as_deref()),
                cmd.company.as_str(),
                now
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        tracing::debug!(project_id = id, "project created");
        self.get_project(id)
    }

    pub fn list_projects(&self, filter: &ProjectFilter) -> Result<Vec<Project>> {
        let mut sql = format!(
            "SELECT {} FROM projects WHERE is_deleted = 0",
            PROJECT_COLUMNS
        );
        let mut values: Vec<Value> = Vec::new();
        if let Some(company) = filter.company {
            values.push(Value::Text(company.as_str().to_string()));
            sql.push_str(&format!(" AND company = ?{}", values.len()));
        }
        if let Some(search) = non_empty(filter.search.as_deref()) {
            values.push(Value::Text(search));
            sql.push_str(&format!(" AND title LIKE '%' || ?{} || '%'", values.len()));
        }
        sql.push_str(" ORDER BY id");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), project_from_row)?;
        let mut projects = Vec::new();
        for row in rows {
            projects.push(row?);
        }
        Ok(projects)
    }

    pub(crate) fn find_project(&self, id: i64) -> Result<Option<Project>> {
        let project = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM projects WHERE id = ?1 AND is_deleted = 0",
                    PROJECT_COLUMNS
                ),
                params![id],
                project_from_row,
            )
            .optional()?;
        Ok(project)
    }

    pub fn get_project(&self, id: i64) -> Result<Project> {
        map_not_found(self.find_project(id)?, "Project", id)
    }

    pub fn get_project_detail(&self, id: i64) -> Result<ProjectDetail> {
        let project = self.get_project(id)?;

        let mut stmt = self.conn.prepare(
            "SELECT status, COUNT(*) FROM tasks
             WHERE project_id = ?1 AND is_deleted = 0
             GROUP BY status",
        )?;
        let rows = stmt.query_map(params![id], |row| {
            let status: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            Ok((parse_column::<TaskStatus>(0, &status)?, count))
        })?;

        let mut task_counts = TaskCounts::default();
        for row in rows {
            let (status, count) = row?;
            task_counts.total += count;
            match status {
                TaskStatus::Pending => task_counts.pending += count,
                TaskStatus::Ongoing => task_counts.ongoing += count,
                TaskStatus::Done => task_counts.done += count,
            }
        }

        Ok(ProjectDetail {
            project,
            task_counts,
        })
    }

    pub fn update_project(
        &self,
        id: i64,
        cmd: &UpdateProject,
        now: DateTime<Utc>,
    ) -> Result<Project> {
        let mut project = self.get_project(id)?;
        if let Some(title) = &cmd.title {
            project.title = title.trim().to_string();
        }
        if cmd.description.is_some() {
            project.description = non_empty(cmd.description.as_deref());
        }
        if let Some(company) = cmd.company {
            project.company = company;
        }

        self.conn.execute(
            "UPDATE projects SET title = ?1, description = ?2, company = ?3, updated_at = ?4
             WHERE id = ?5",
            params![
                project.title,
                project.description,
                project.company.as_str(),
                now,
                id
            ],
        )?;
        self.get_project(id)
    }

    /// Soft-delete a project together with all of its tasks.
    pub fn delete_project(&self, id: i64, now: DateTime<Utc>) -> Result<()> {
        self.get_project(id)?;

        // Safety: DbHandle's Mutex already guarantees single-threaded access.
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "UPDATE tasks SET is_deleted = 1, updated_at = ?1
             WHERE project_id = ?2 AND is_deleted = 0",
            params![now, id],
        )?;
        tx.execute(
            "UPDATE projects SET is_deleted = 1, updated_at = ?1 WHERE id = ?2",
            params![now, id],
        )?;
        tx.commit()?;

        tracing::info!(project_id = id, "project deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use crate::errors::FlowieError;
    use crate::models::{Company, CreateProject, ProjectFilter, TaskStatus, UpdateProject};

    #[test]
    fn test_create_and_get_project() {
        let db = db();
        let created = db
            .create_project(
                &CreateProject {
                    title: "  Office move  ".into(),
                    description: Some("Move to the new building".into()),
                    company: Company::NovaraRealEstate,
                },
                now(),
            )
            .unwrap();

        assert!(created.id > 0);
        assert_eq!(created.title, "Office move");
        assert_eq!(created.company, Company::NovaraRealEstate);
        assert_eq!(created.created_at, now());

        let fetched = db.get_project(created.id).unwrap();
        assert_eq!(fetched, created);
    }

    #[test]
    fn test_get_missing_project_is_not_found() {
        let db = db();
        let err = db.get_project(99).unwrap_err();
        assert!(matches!(err, FlowieError::NotFound { entity: "Project", .. }));
    }

    #[test]
    fn test_list_projects_filters() {
        let db = db();
        project(&db, "Garden redesign");
        let b = project(&db, "Roof repair");
        db.update_project(
            b.id,
            &UpdateProject {
                company: Some(Company::Flowie),
                ..Default::default()
            },
            now(),
        )
        .unwrap();

        let all = db.list_projects(&ProjectFilter::default()).unwrap();
        assert_eq!(all.len(), 2);

        let flowie = db
            .list_projects(&ProjectFilter {
                company: Some(Company::Flowie),
                search: None,
            })
            .unwrap();
        assert_eq!(flowie.len(), 1);
        assert_eq!(flowie[0].title, "Roof repair");

        let search = db
            .list_projects(&ProjectFilter {
                company: None,
                search: Some("garden".into()),
            })
            .unwrap();
        assert_eq!(search.len(), 1);
        assert_eq!(search[0].title, "Garden redesign");
    }

    #[test]
    fn test_update_project_clears_description_with_empty_string() {
        let db = db();
        let p = project(&db, "Inventory");
        db.update_project(
            p.id,
            &UpdateProject {
                description: Some("counting".into()),
                ..Default::default()
            },
            now(),
        )
        .unwrap();
        let updated = db
            .update_project(
                p.id,
                &UpdateProject {
                    description: Some(String::new()),
                    ..Default::default()
                },
                now(),
            )
            .unwrap();
        assert_eq!(updated.description, None);
        assert_eq!(updated.title, "Inventory");
    }

    #[test]
    fn test_delete_project_hides_it_and_its_tasks() {
        let db = db();
        let p = project(&db, "Temporary");
        let t = task(&db, p.id, "Short lived", 3);

        db.delete_project(p.id, now()).unwrap();

        assert!(db.get_project(p.id).is_err());
        assert!(db.get_task(t.id).is_err());
        assert!(db.list_projects(&ProjectFilter::default()).unwrap().is_empty());
        assert!(matches!(
            db.delete_project(p.id, now()),
            Err(FlowieError::NotFound { .. })
        ));
    }

    #[test]
    fn test_project_detail_counts_tasks_by_status() {
        let db = db();
        let p = project(&db, "Counting");
        let a = task(&db, p.id, "First task", 1);
        task(&db, p.id, "Second task", 2);
        db.set_task_status(a.id, TaskStatus::Done, now()).unwrap();

        let detail = db.get_project_detail(p.id).unwrap();
        assert_eq!(detail.task_counts.total, 2);
        assert_eq!(detail.task_counts.done, 1);
        assert_eq!(detail.task_counts.pending, 1);
        assert_eq!(detail.task_counts.ongoing, 0);
    }
}
