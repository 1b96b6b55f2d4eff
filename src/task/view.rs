#![forbid(unsafe_code)]

use serde::Serialize;
use time::Date;

use crate::task::model::{Priority, Task, format_date};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum DueStatus {
    None,
    DueSoon,
    Overdue,
}

impl DueStatus {
    #[must_use]
    pub fn of(task: &Task, today: Date) -> Self {
        if task.completed {
            return DueStatus::None;
        }
        if task.due_date < today {
            return DueStatus::Overdue;
        }
        if Some(task.due_date) == today.next_day() {
            return DueStatus::DueSoon;
        }
        DueStatus::None
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DueStatus::None => "",
            DueStatus::DueSoon => "due-soon",
            DueStatus::Overdue => "overdue",
        }
    }
}

/// Hex color shared by the list and the calendar.
#[must_use]
pub fn priority_color(priority: Priority) -> &'static str {
    match priority {
        Priority::Low => "#28a745",
        Priority::Medium => "#ffc107",
        Priority::High => "#dc3545",
    }
}

/// One render-ready row of the task list.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TaskView {
    pub id: String,
    pub completed: bool,
    pub priority: Priority,
    pub priority_label: &'static str,
    pub priority_color: &'static str,
    pub title: String,
    pub description: String,
    pub due_date: String,
    pub status: DueStatus,
    /// Carried by drag sources so a calendar drop can name the task.
    pub drag_id: String,
}

impl TaskView {
    #[must_use]
    pub fn new(task: &Task, today: Date) -> Self {
        Self {
            id: task.id.clone(),
            completed: task.completed,
            priority: task.priority,
            priority_label: task.priority.label(),
            priority_color: priority_color(task.priority),
            title: task.title.clone(),
            description: task.description.clone(),
            due_date: format_date(task.due_date),
            status: DueStatus::of(task, today),
            drag_id: task.id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn due(d: Date, completed: bool) -> Task {
        Task {
            id: "t".to_owned(),
            title: "t".to_owned(),
            description: String::new(),
            due_date: d,
            priority: Priority::Low,
            completed,
        }
    }

    #[test]
    fn status_reads_the_due_date() {
        let today = date!(2025 - 06 - 01);
        assert_eq!(
            DueStatus::of(&due(date!(2025 - 05 - 31), false), today),
            DueStatus::Overdue
        );
        assert_eq!(
            DueStatus::of(&due(date!(2025 - 06 - 02), false), today),
            DueStatus::DueSoon
        );
        assert_eq!(DueStatus::of(&due(today, false), today), DueStatus::None);
        assert_eq!(
            DueStatus::of(&due(date!(2025 - 05 - 31), true), today),
            DueStatus::None
        );
    }

    #[test]
    fn due_soon_crosses_month_boundaries() {
        let today = date!(2025 - 01 - 31);
        assert_eq!(
            DueStatus::of(&due(date!(2025 - 02 - 01), false), today),
            DueStatus::DueSoon
        );
    }

    #[test]
    fn view_carries_labels_and_ids() {
        let mut t = due(date!(2025 - 06 - 10), false);
        t.priority = Priority::High;
        let v = TaskView::new(&t, date!(2025 - 06 - 01));
        assert_eq!(v.priority_label, "High");
        assert_eq!(v.priority_color, "#dc3545");
        assert_eq!(v.due_date, "2025-06-10");
        assert_eq!(v.drag_id, v.id);
    }
}
