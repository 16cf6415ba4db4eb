//! Task status transitions and parent rollup.
//!
//! A task moves freely between `pending`, `ongoing` and `done`. Each move
//! stamps or clears `started_at` / `completed_at`. A parent task's status is
//! never set directly once it has subtasks; it is derived from them with
//! [`rollup`] every time one of them changes.

use chrono::{DateTime, Utc};

use crate::models::{Task, TaskStatus};

/// Timestamp pair carried by every task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusStamps {
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&Task> for StatusStamps {
    fn from(task: &Task) -> Self {
        Self {
            started_at: task.started_at,
            completed_at: task.completed_at,
        }
    }
}

/// Compute the timestamps for a task moving from `current` to `next`.
///
/// Re-applying the current status keeps the existing stamps.
pub fn transition(
    current: TaskStatus,
    stamps: StatusStamps,
    next: TaskStatus,
    now: DateTime<Utc>,
) -> StatusStamps {
    if current == next {
        return stamps;
    }
    match next {
        TaskStatus::Pending => StatusStamps {
            started_at: None,
            completed_at: None,
        },
        TaskStatus::Ongoing => StatusStamps {
            started_at: Some(now),
            completed_at: None,
        },
        TaskStatus::Done => StatusStamps {
            started_at: stamps.started_at.or(Some(now)),
            completed_at: Some(now),
        },
    }
}

/// Apply a status change to a task in place.
pub fn apply_status(task: &mut Task, next: TaskStatus, now: DateTime<Utc>) {
    let stamps = transition(task.status, StatusStamps::from(&*task), next, now);
    task.status = next;
    task.started_at = stamps.started_at;
    task.completed_at = stamps.completed_at;
}

/// Derive a parent's status from its subtasks' statuses.
///
/// `None` when there are no subtasks (the parent keeps its own status).
pub fn rollup<I>(children: I) -> Option<TaskStatus>
where
    I: IntoIterator<Item = TaskStatus>,
{
    let mut any = false;
    let mut all_done = true;
    let mut any_ongoing = false;

    for status in children {
        any = true;
        match status {
            TaskStatus::Done => {}
            TaskStatus::Ongoing => {
                any_ongoing = true;
                all_done = false;
            }
            TaskStatus::Pending => all_done = false,
        }
    }

    if !any {
        None
    } else if all_done {
        Some(TaskStatus::Done)
    } else if any_ongoing {
        Some(TaskStatus::Ongoing)
    } else {
        Some(TaskStatus::Pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, hour, 0, 0).unwrap()
    }

    fn task(status: TaskStatus) -> Task {
        Task {
            id: 1,
            project_id: 1,
            parent_task_id: None,
            task_type_id: None,
            employee_id: None,
            title: "Paint walls".into(),
            description: None,
            due_date: at(23),
            status,
            started_at: None,
            completed_at: None,
            created_at: at(8),
            updated_at: at(8),
        }
    }

    #[test]
    fn test_ongoing_stamps_start_and_clears_completion() {
        let mut t = task(TaskStatus::Done);
        t.completed_at = Some(at(9));
        apply_status(&mut t, TaskStatus::Ongoing, at(10));
        assert_eq!(t.status, TaskStatus::Ongoing);
        assert_eq!(t.started_at, Some(at(10)));
        assert_eq!(t.completed_at, None);
    }

    #[test]
    fn test_done_stamps_completion() {
        let mut t = task(TaskStatus::Pending);
        apply_status(&mut t, TaskStatus::Ongoing, at(10));
        apply_status(&mut t, TaskStatus::Done, at(12));
        assert_eq!(t.started_at, Some(at(10)));
        assert_eq!(t.completed_at, Some(at(12)));
    }

    #[test]
    fn test_done_from_pending_also_stamps_start() {
        let mut t = task(TaskStatus::Pending);
        apply_status(&mut t, TaskStatus::Done, at(11));
        assert_eq!(t.started_at, Some(at(11)));
        assert_eq!(t.completed_at, Some(at(11)));
    }

    #[test]
    fn test_pending_clears_both() {
        let mut t = task(TaskStatus::Pending);
        apply_status(&mut t, TaskStatus::Done, at(11));
        apply_status(&mut t, TaskStatus::Pending, at(12));
        assert_eq!(t.started_at, None);
        assert_eq!(t.completed_at, None);
    }

    #[test]
    fn test_same_status_keeps_stamps() {
        let mut t = task(TaskStatus::Pending);
        apply_status(&mut t, TaskStatus::Ongoing, at(10));
        apply_status(&mut t, TaskStatus::Ongoing, at(14));
        assert_eq!(t.started_at, Some(at(10)));
    }

    #[test]
    fn test_rollup_all_done() {
        let statuses = [TaskStatus::Done, TaskStatus::Done];
        assert_eq!(rollup(statuses), Some(TaskStatus::Done));
    }

    #[test]
    fn test_rollup_any_ongoing() {
        let statuses = [TaskStatus::Done, TaskStatus::Ongoing, TaskStatus::Pending];
        assert_eq!(rollup(statuses), Some(TaskStatus::Ongoing));
    }

    #[test]
    fn test_rollup_all_pending() {
        let statuses = [TaskStatus::Pending, TaskStatus::Pending];
        assert_eq!(rollup(statuses), Some(TaskStatus::Pending));
    }

    #[test]
    fn test_rollup_done_and_pending_is_pending() {
        let statuses = [TaskStatus::Done, TaskStatus::Pending];
        assert_eq!(rollup(statuses), Some(TaskStatus::Pending));
    }

    #[test]
    fn test_rollup_without_children() {
        assert_eq!(rollup(Vec::<TaskStatus>::new()), None);
    }
}
