#![forbid(unsafe_code)]

//! The task list controller.
//!
//! Owns the collection and the view state (filter, sort, in-progress edit).
//! Every mutation is applied to a copy, saved through the [`TaskStore`], and
//! only then committed, so a failed save leaves the controller untouched.
//! After a commit the calendar is refetched and the list re-rendered.

use time::Date;

use crate::calendar::{CalendarSink, events_from_tasks};
use crate::error::TaskdeckError;
use crate::task::alerts::{self, Alerter, SweepReport};
use crate::task::model::{Filter, Priority, SortKey, Task, parse_date};
use crate::task::storage::TaskStore;
use crate::task::view::TaskView;

/// Rendering surface for the list and the task form.
pub trait ViewPort {
    fn render_list(&mut self, tasks: &[TaskView]);
    fn populate_form(&mut self, task: &Task);
    fn reset_form(&mut self);
}

/// A view that draws nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoView;

impl ViewPort for NoView {
    fn render_list(&mut self, _tasks: &[TaskView]) {}
    fn populate_form(&mut self, _task: &Task) {}
    fn reset_form(&mut self) {}
}

pub trait Clock {
    fn today(&self) -> Date;
}

/// Local calendar date, falling back to UTC when the offset is unknown.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> Date {
        time::OffsetDateTime::now_local()
            .unwrap_or_else(|_| time::OffsetDateTime::now_utc())
            .date()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub Date);

impl Clock for FixedClock {
    fn today(&self) -> Date {
        self.0
    }
}

/// Raw form fields as typed by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskForm {
    pub title: String,
    pub description: String,
    pub due_date: String,
    pub priority: String,
}

impl TaskForm {
    #[must_use]
    pub fn from_task(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            description: task.description.clone(),
            due_date: crate::task::model::format_date(task.due_date),
            priority: task.priority.as_str().to_owned(),
        }
    }

    fn parse(&self) -> Result<(String, String, Date, Priority), TaskdeckError> {
        let title = self.title.trim();
        let due = parse_date(&self.due_date)?;
        let priority = if self.priority.trim().is_empty() {
            Priority::Low
        } else {
            self.priority.parse()?
        };
        Ok((
            title.to_owned(),
            self.description.trim().to_owned(),
            due,
            priority,
        ))
    }
}

fn required_title(title: &str) -> Result<&str, TaskdeckError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(TaskdeckError::InvalidInput {
            field: "title",
            msg: "title is required".to_owned(),
        });
    }
    Ok(title)
}

/// Everything an input surface can ask of the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add {
        title: String,
        description: String,
        due_date: Date,
        priority: Priority,
    },
    Edit {
        id: String,
        title: String,
        description: String,
        due_date: Date,
        priority: Priority,
    },
    /// Form submission: updates the task being edited, or creates one.
    Submit(TaskForm),
    BeginEdit {
        id: String,
    },
    CancelEdit,
    Delete {
        id: String,
    },
    Toggle {
        id: String,
    },
    MoveDueDate {
        id: String,
        date: Date,
    },
    SetFilter(Filter),
    SetSort(SortKey),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Created(Task),
    Updated(String),
    Editing(Option<Task>),
    Applied,
}

pub struct TaskListController<S, V, C> {
    tasks: Vec<Task>,
    filter: Filter,
    sort: SortKey,
    editing_task_id: Option<String>,
    store: S,
    view: V,
    calendar: C,
    clock: Box<dyn Clock>,
}

impl<S, V, C> TaskListController<S, V, C>
where
    S: TaskStore,
    V: ViewPort,
    C: CalendarSink,
{
    /// Loads the collection and draws the initial list and calendar.
    pub fn new(store: S, view: V, calendar: C, clock: Box<dyn Clock>) -> anyhow::Result<Self> {
        let tasks = store.load()?;
        tracing::debug!(count = tasks.len(), "loaded tasks");
        let mut ctl = Self {
            tasks,
            filter: Filter::default(),
            sort: SortKey::default(),
            editing_task_id: None,
            store,
            view,
            calendar,
            clock,
        };
        ctl.refresh();
        Ok(ctl)
    }

    #[must_use]
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    #[must_use]
    pub fn filter(&self) -> Filter {
        self.filter
    }

    #[must_use]
    pub fn sort(&self) -> SortKey {
        self.sort
    }

    #[must_use]
    pub fn editing_task_id(&self) -> Option<&str> {
        self.editing_task_id.as_deref()
    }

    #[must_use]
    pub fn today(&self) -> Date {
        self.clock.today()
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    #[must_use]
    pub fn view(&self) -> &V {
        &self.view
    }

    #[must_use]
    pub fn calendar(&self) -> &C {
        &self.calendar
    }

    pub fn create(
        &mut self,
        title: &str,
        description: &str,
        due_date: Date,
        priority: Priority,
    ) -> anyhow::Result<Task> {
        let title = required_title(title)?;
        let today = self.clock.today();
        if due_date < today {
            return Err(TaskdeckError::PastDueDate(due_date).into());
        }

        let task = Task {
            id: self.fresh_id(),
            title: title.to_owned(),
            description: description.to_owned(),
            due_date,
            priority,
            completed: false,
        };
        let mut next = self.tasks.clone();
        next.push(task.clone());
        self.commit(next)?;
        tracing::debug!(id = %task.id, "created task");
        self.refresh();
        Ok(task)
    }

    pub fn update(
        &mut self,
        id: &str,
        title: &str,
        description: &str,
        due_date: Date,
        priority: Priority,
    ) -> anyhow::Result<()> {
        let title = required_title(title)?;
        let mut next = self.tasks.clone();
        let task = next
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| TaskdeckError::TaskNotFound(id.to_owned()))?;
        task.title = title.to_owned();
        task.description = description.to_owned();
        task.due_date = due_date;
        task.priority = priority;

        self.commit(next)?;
        self.editing_task_id = None;
        tracing::debug!(%id, "updated task");
        self.refresh();
        Ok(())
    }

    /// Removes the task if present. Unknown ids are ignored.
    pub fn delete(&mut self, id: &str) -> anyhow::Result<()> {
        if self.get(id).is_none() {
            return Ok(());
        }
        let next: Vec<Task> = self.tasks.iter().filter(|t| t.id != id).cloned().collect();
        self.commit(next)?;
        if self.editing_task_id.as_deref() == Some(id) {
            self.editing_task_id = None;
            self.view.reset_form();
        }
        tracing::debug!(%id, "deleted task");
        self.refresh();
        Ok(())
    }

    pub fn toggle_complete(&mut self, id: &str) -> anyhow::Result<()> {
        self.modify(id, |t| t.completed = !t.completed)
    }

    /// Reschedules a task, as a calendar drop does. Past dates are allowed.
    pub fn move_due_date(&mut self, id: &str, date: Date) -> anyhow::Result<()> {
        self.modify(id, |t| t.due_date = date)
    }

    pub fn set_filter(&mut self, filter: Filter) {
        self.filter = filter;
        self.render();
    }

    pub fn set_sort(&mut self, sort: SortKey) {
        self.sort = sort;
        self.render();
    }

    /// Marks the task as being edited and fills the form with it.
    pub fn begin_edit(&mut self, id: &str) -> Option<Task> {
        let task = self.get(id)?.clone();
        self.editing_task_id = Some(task.id.clone());
        self.view.populate_form(&task);
        Some(task)
    }

    pub fn cancel_edit(&mut self) {
        self.editing_task_id = None;
        self.view.reset_form();
    }

    /// Creates or updates from raw form input, depending on whether an edit
    /// is in progress.
    pub fn submit(&mut self, form: &TaskForm) -> anyhow::Result<CommandOutcome> {
        let (title, description, due, priority) = form.parse()?;
        if due < self.clock.today() {
            return Err(TaskdeckError::PastDueDate(due).into());
        }

        let outcome = match self.editing_task_id.clone() {
            Some(id) => {
                self.update(&id, &title, &description, due, priority)?;
                CommandOutcome::Updated(id)
            }
            None => CommandOutcome::Created(self.create(&title, &description, due, priority)?),
        };
        self.view.reset_form();
        Ok(outcome)
    }

    /// Filtered and sorted copy of the collection.
    #[must_use]
    pub fn visible_tasks(&self) -> Vec<Task> {
        let mut out: Vec<Task> = self
            .tasks
            .iter()
            .filter(|t| self.filter.matches(t))
            .cloned()
            .collect();
        let primary = self.sort;
        let secondary = primary.secondary();
        out.sort_by(|a, b| {
            primary
                .compare(a, b)
                .then_with(|| secondary.compare(a, b))
        });
        out
    }

    #[must_use]
    pub fn render_view(&self) -> Vec<TaskView> {
        let today = self.clock.today();
        self.visible_tasks()
            .iter()
            .map(|t| TaskView::new(t, today))
            .collect()
    }

    pub fn dispatch(&mut self, cmd: Command) -> anyhow::Result<CommandOutcome> {
        match cmd {
            Command::Add {
                title,
                description,
                due_date,
                priority,
            } => Ok(CommandOutcome::Created(self.create(
                &title,
                &description,
                due_date,
                priority,
            )?)),
            Command::Edit {
                id,
                title,
                description,
                due_date,
                priority,
            } => {
                self.update(&id, &title, &description, due_date, priority)?;
                Ok(CommandOutcome::Updated(id))
            }
            Command::Submit(form) => self.submit(&form),
            Command::BeginEdit { id } => Ok(CommandOutcome::Editing(self.begin_edit(&id))),
            Command::CancelEdit => {
                self.cancel_edit();
                Ok(CommandOutcome::Applied)
            }
            Command::Delete { id } => {
                self.delete(&id)?;
                Ok(CommandOutcome::Applied)
            }
            Command::Toggle { id } => {
                self.toggle_complete(&id)?;
                Ok(CommandOutcome::Applied)
            }
            Command::MoveDueDate { id, date } => {
                self.move_due_date(&id, date)?;
                Ok(CommandOutcome::Applied)
            }
            Command::SetFilter(f) => {
                self.set_filter(f);
                Ok(CommandOutcome::Applied)
            }
            Command::SetSort(s) => {
                self.set_sort(s);
                Ok(CommandOutcome::Applied)
            }
        }
    }

    pub fn sweep(&self, alerter: &mut dyn Alerter) -> SweepReport {
        alerts::sweep(&self.tasks, self.clock.today(), alerter)
    }

    /// Re-reads the store, picking up writes made by other processes.
    pub fn reload(&mut self) -> anyhow::Result<()> {
        self.tasks = self.store.load()?;
        if let Some(id) = self.editing_task_id.as_deref()
            && self.get(id).is_none()
        {
            self.editing_task_id = None;
            self.view.reset_form();
        }
        self.refresh();
        Ok(())
    }

    /// Refetches the calendar and re-renders the list.
    pub fn refresh(&mut self) {
        self.calendar.refetch(events_from_tasks(&self.tasks));
        self.render();
    }

    fn render(&mut self) {
        let views = self.render_view();
        self.view.render_list(&views);
    }

    fn modify(&mut self, id: &str, f: impl FnOnce(&mut Task)) -> anyhow::Result<()> {
        let mut next = self.tasks.clone();
        let Some(task) = next.iter_mut().find(|t| t.id == id) else {
            return Ok(());
        };
        f(task);
        self.commit(next)?;
        tracing::debug!(%id, "modified task");
        self.refresh();
        Ok(())
    }

    fn commit(&mut self, next: Vec<Task>) -> anyhow::Result<()> {
        self.store.save(&next)?;
        self.tasks = next;
        Ok(())
    }

    fn fresh_id(&self) -> String {
        loop {
            let id = Task::new_id();
            if self.get(&id).is_none() {
                return id;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::MonthCalendar;
    use crate::task::alerts::AlertQueue;
    use crate::task::storage::MemoryStore;
    use time::macros::date;

    #[derive(Debug, Default)]
    struct RecordingView {
        renders: Vec<Vec<String>>,
        form: Option<TaskForm>,
    }

    impl ViewPort for RecordingView {
        fn render_list(&mut self, tasks: &[TaskView]) {
            self.renders
                .push(tasks.iter().map(|t| t.id.clone()).collect());
        }

        fn populate_form(&mut self, task: &Task) {
            self.form = Some(TaskForm::from_task(task));
        }

        fn reset_form(&mut self) {
            self.form = None;
        }
    }

    type Ctl = TaskListController<MemoryStore, RecordingView, MonthCalendar>;

    const TODAY: Date = date!(2025 - 01 - 01);

    fn task(id: &str, priority: Priority, due: Date) -> Task {
        Task {
            id: id.to_owned(),
            title: format!("title {id}"),
            description: String::new(),
            due_date: due,
            priority,
            completed: false,
        }
    }

    fn controller(tasks: Vec<Task>) -> Ctl {
        TaskListController::new(
            MemoryStore::with_tasks(tasks),
            RecordingView::default(),
            MonthCalendar::default(),
            Box::new(FixedClock(TODAY)),
        )
        .unwrap()
    }

    fn ids(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn construction_renders_and_fills_calendar() {
        let ctl = controller(vec![task("a", Priority::Low, TODAY)]);
        assert_eq!(ctl.view().renders, [vec!["a".to_owned()]]);
        assert_eq!(ctl.calendar().events().len(), 1);
    }

    #[test]
    fn create_rejects_past_dates_without_changes() {
        let mut ctl = controller(vec![]);
        let err = ctl
            .create("late", "", date!(2024 - 12 - 31), Priority::High)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TaskdeckError>(),
            Some(TaskdeckError::PastDueDate(_))
        ));
        assert!(ctl.tasks().is_empty());
        assert_eq!(ctl.store().saves(), 0);
    }

    #[test]
    fn blank_titles_are_rejected_on_every_path() {
        let mut ctl = controller(vec![task("a", Priority::Low, TODAY)]);
        let err = ctl.create("   ", "", TODAY, Priority::Low).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TaskdeckError>(),
            Some(TaskdeckError::InvalidInput { field: "title", .. })
        ));
        assert!(ctl.update("a", "", "", TODAY, Priority::Low).is_err());
        assert!(
            ctl.dispatch(Command::Add {
                title: String::new(),
                description: String::new(),
                due_date: TODAY,
                priority: Priority::High,
            })
            .is_err()
        );
        assert_eq!(ctl.get("a").unwrap().title, "title a");
        assert_eq!(ids(ctl.tasks()), ["a"]);
        assert_eq!(ctl.store().saves(), 0);

        let t = ctl.create("  padded  ", "", TODAY, Priority::Low).unwrap();
        assert_eq!(t.title, "padded");
    }

    #[test]
    fn create_today_appends_pending_task_and_refreshes() {
        let mut ctl = controller(vec![]);
        let t = ctl.create("write", "docs", TODAY, Priority::Medium).unwrap();
        assert!(!t.completed);
        assert_eq!(ids(ctl.tasks()), [t.id.as_str()]);
        assert_eq!(ctl.store().tasks(), ctl.tasks());
        assert_eq!(ctl.calendar().events()[0].task_id, t.id);
        assert_eq!(ctl.view().renders.last().unwrap(), &vec![t.id.clone()]);
    }

    #[test]
    fn created_ids_are_unique() {
        let mut ctl = controller(vec![]);
        for i in 0..50 {
            ctl.create(&format!("t{i}"), "", TODAY, Priority::Low).unwrap();
        }
        let mut seen: Vec<&str> = ids(ctl.tasks());
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 50);
    }

    #[test]
    fn update_changes_fields_and_clears_edit() {
        let mut ctl = controller(vec![task("a", Priority::Low, TODAY)]);
        ctl.toggle_complete("a").unwrap();
        ctl.begin_edit("a").unwrap();
        ctl.update("a", "new", "d", date!(2025 - 02 - 01), Priority::High)
            .unwrap();
        let t = ctl.get("a").unwrap();
        assert_eq!(t.title, "new");
        assert_eq!(t.priority, Priority::High);
        assert!(t.completed);
        assert_eq!(ctl.editing_task_id(), None);
    }

    #[test]
    fn update_unknown_id_is_not_found() {
        let mut ctl = controller(vec![]);
        let err = ctl
            .update("nope", "x", "", TODAY, Priority::Low)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TaskdeckError>(),
            Some(TaskdeckError::TaskNotFound(id)) if id == "nope"
        ));
    }

    #[test]
    fn delete_is_idempotent() {
        let mut ctl = controller(vec![
            task("a", Priority::Low, TODAY),
            task("b", Priority::Low, TODAY),
        ]);
        ctl.delete("a").unwrap();
        assert_eq!(ids(ctl.tasks()), ["b"]);
        let saves = ctl.store().saves();
        ctl.delete("a").unwrap();
        assert_eq!(ids(ctl.tasks()), ["b"]);
        assert_eq!(ctl.store().saves(), saves);
    }

    #[test]
    fn toggle_twice_restores() {
        let mut ctl = controller(vec![task("a", Priority::Low, TODAY)]);
        let before = ctl.tasks().to_vec();
        ctl.toggle_complete("a").unwrap();
        assert!(ctl.get("a").unwrap().completed);
        ctl.toggle_complete("a").unwrap();
        assert_eq!(ctl.tasks(), before.as_slice());
        ctl.toggle_complete("missing").unwrap();
    }

    #[test]
    fn filters_partition_the_collection() {
        let mut ctl = controller(vec![
            task("a", Priority::Low, TODAY),
            task("b", Priority::High, TODAY),
            task("c", Priority::Medium, TODAY),
        ]);
        ctl.toggle_complete("b").unwrap();

        ctl.set_filter(Filter::Completed);
        let done = ctl.visible_tasks();
        assert!(done.iter().all(|t| t.completed));
        ctl.set_filter(Filter::Pending);
        let open = ctl.visible_tasks();
        assert!(open.iter().all(|t| !t.completed));
        ctl.set_filter(Filter::All);
        let all = ctl.visible_tasks();

        let mut union: Vec<&str> = ids(&done);
        union.extend(ids(&open));
        union.sort_unstable();
        let mut all_ids = ids(&all);
        all_ids.sort_unstable();
        assert_eq!(union, all_ids);
    }

    #[test]
    fn priority_sort_breaks_ties_by_due_date() {
        let ctl = controller(vec![
            task("A", Priority::High, date!(2025 - 01 - 10)),
            task("B", Priority::High, date!(2025 - 01 - 05)),
            task("C", Priority::Low, date!(2025 - 01 - 01)),
        ]);
        assert_eq!(ids(&ctl.visible_tasks()), ["B", "A", "C"]);
    }

    #[test]
    fn date_sort_breaks_ties_by_priority() {
        let mut ctl = controller(vec![
            task("a", Priority::Low, date!(2025 - 01 - 05)),
            task("b", Priority::High, date!(2025 - 01 - 05)),
            task("c", Priority::Medium, date!(2025 - 01 - 02)),
        ]);
        ctl.set_sort(SortKey::DueDate);
        assert_eq!(ids(&ctl.visible_tasks()), ["c", "b", "a"]);
        assert_eq!(ids(ctl.tasks()), ["a", "b", "c"]);
    }

    #[test]
    fn view_state_changes_do_not_persist() {
        let mut ctl = controller(vec![task("a", Priority::Low, TODAY)]);
        ctl.set_filter(Filter::Completed);
        ctl.set_sort(SortKey::DueDate);
        assert_eq!(ctl.store().saves(), 0);
        assert_eq!(ctl.view().renders.last().unwrap(), &Vec::<String>::new());
    }

    #[test]
    fn begin_edit_then_submit_updates() {
        let mut ctl = controller(vec![task("a", Priority::Low, TODAY)]);
        assert!(ctl.begin_edit("missing").is_none());
        assert_eq!(ctl.editing_task_id(), None);

        ctl.begin_edit("a").unwrap();
        assert_eq!(ctl.view().form.as_ref().unwrap().title, "title a");
        let form = TaskForm {
            title: "renamed".to_owned(),
            description: String::new(),
            due_date: "2025-01-03".to_owned(),
            priority: "medium".to_owned(),
        };
        let out = ctl.submit(&form).unwrap();
        assert_eq!(out, CommandOutcome::Updated("a".to_owned()));
        assert_eq!(ctl.tasks().len(), 1);
        assert_eq!(ctl.get("a").unwrap().title, "renamed");
        assert!(ctl.view().form.is_none());
    }

    #[test]
    fn submit_without_edit_creates() {
        let mut ctl = controller(vec![]);
        let form = TaskForm {
            title: "new".to_owned(),
            description: String::new(),
            due_date: "2025-01-01".to_owned(),
            priority: String::new(),
        };
        let out = ctl.dispatch(Command::Submit(form)).unwrap();
        let CommandOutcome::Created(t) = out else {
            panic!("expected a created task");
        };
        assert_eq!(t.priority, Priority::Low);
    }

    #[test]
    fn submit_rejects_past_dates_while_editing() {
        let mut ctl = controller(vec![task("a", Priority::Low, TODAY)]);
        ctl.begin_edit("a").unwrap();
        let form = TaskForm {
            title: "x".to_owned(),
            due_date: "2024-01-01".to_owned(),
            ..TaskForm::default()
        };
        assert!(ctl.submit(&form).is_err());
        assert_eq!(ctl.get("a").unwrap().title, "title a");
        assert_eq!(ctl.editing_task_id(), Some("a"));
    }

    #[test]
    fn move_due_date_refetches_calendar() {
        let mut ctl = controller(vec![task("a", Priority::Low, TODAY)]);
        let before = ctl.calendar().refetches();
        ctl.dispatch(Command::MoveDueDate {
            id: "a".to_owned(),
            date: date!(2025 - 03 - 03),
        })
        .unwrap();
        assert_eq!(ctl.calendar().refetches(), before + 1);
        assert_eq!(ctl.calendar().events()[0].date, date!(2025 - 03 - 03));
    }

    #[test]
    fn failed_save_leaves_state_untouched() {
        let mut ctl = controller(vec![task("a", Priority::Low, TODAY)]);
        ctl.store_mut().set_fail_saves(true);
        assert!(ctl.create("x", "", TODAY, Priority::Low).is_err());
        assert!(ctl.toggle_complete("a").is_err());
        assert!(ctl.delete("a").is_err());
        assert_eq!(ids(ctl.tasks()), ["a"]);
        assert!(!ctl.get("a").unwrap().completed);
    }

    #[test]
    fn deleting_the_edited_task_cancels_the_edit() {
        let mut ctl = controller(vec![task("a", Priority::Low, TODAY)]);
        ctl.begin_edit("a").unwrap();
        ctl.delete("a").unwrap();
        assert_eq!(ctl.editing_task_id(), None);
        assert!(ctl.view().form.is_none());
    }

    #[test]
    fn sweep_uses_the_clock() {
        let ctl = controller(vec![task("a", Priority::Low, date!(2024 - 12 - 30))]);
        let mut q = AlertQueue::new(true);
        let r = ctl.sweep(&mut q);
        assert_eq!(r.overdue, 1);
        assert_eq!(q.alerts.front().unwrap(), "Task \"title a\" is overdue!");
    }
}
