use taskdeck::calendar::{CalendarInput, MonthCalendar};
use taskdeck::task::alerts::AlertQueue;
use taskdeck::task::controller::{Command, CommandOutcome, FixedClock, NoView, TaskListController};
use taskdeck::task::model::{Filter, Priority, SortKey};
use taskdeck::task::storage::{JsonFileStore, TaskStore};
use time::Date;
use time::macros::date;

const TODAY: Date = date!(2025 - 03 - 10);

type Ctl = TaskListController<JsonFileStore, NoView, MonthCalendar>;

fn open(dir: &std::path::Path, today: Date) -> Ctl {
    let store = JsonFileStore::new(dir.to_path_buf(), "tasks").expect("store");
    TaskListController::new(
        store,
        NoView,
        MonthCalendar::default(),
        Box::new(FixedClock(today)),
    )
    .expect("controller")
}

fn add(ctl: &mut Ctl, title: &str, due: Date, priority: Priority) -> String {
    match ctl
        .dispatch(Command::Add {
            title: title.to_owned(),
            description: String::new(),
            due_date: due,
            priority,
        })
        .expect("add")
    {
        CommandOutcome::Created(t) => t.id,
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[test]
fn collection_survives_restart() {
    let td = tempfile::tempdir().expect("tempdir");

    let mut ctl = open(td.path(), TODAY);
    let rent = add(&mut ctl, "Pay rent", date!(2025 - 03 - 11), Priority::High);
    let milk = add(&mut ctl, "Buy milk", date!(2025 - 03 - 12), Priority::Low);
    ctl.dispatch(Command::Toggle { id: milk.clone() })
        .expect("toggle");
    drop(ctl);

    let ctl = open(td.path(), TODAY);
    assert_eq!(ctl.tasks().len(), 2);
    let r = ctl.get(&rent).expect("rent");
    assert_eq!(r.due_date, date!(2025 - 03 - 11));
    assert_eq!(r.priority, Priority::High);
    assert!(!r.completed);
    assert!(ctl.get(&milk).expect("milk").completed);
    assert_eq!(ctl.calendar().events().len(), 2);
}

#[test]
fn stored_document_uses_camel_case_dates() {
    let td = tempfile::tempdir().expect("tempdir");
    let mut ctl = open(td.path(), TODAY);
    add(&mut ctl, "Call mom", date!(2025 - 03 - 15), Priority::Medium);

    let raw = std::fs::read_to_string(td.path().join("tasks.json")).expect("read");
    let doc: serde_json::Value = serde_json::from_str(&raw).expect("json");
    let first = &doc[0];
    assert_eq!(first["dueDate"], "2025-03-15");
    assert_eq!(first["priority"], "medium");
    assert_eq!(first["completed"], false);
}

#[test]
fn corrupt_file_starts_empty_and_is_overwritten() {
    let td = tempfile::tempdir().expect("tempdir");
    std::fs::write(td.path().join("tasks.json"), "{not json").expect("write");

    let mut ctl = open(td.path(), TODAY);
    assert!(ctl.tasks().is_empty());
    add(&mut ctl, "Fresh start", TODAY, Priority::Low);

    let store = JsonFileStore::new(td.path().to_path_buf(), "tasks").expect("store");
    assert_eq!(store.load().expect("load").len(), 1);
}

#[test]
fn filter_sort_and_calendar_drop() {
    let td = tempfile::tempdir().expect("tempdir");
    let mut ctl = open(td.path(), TODAY);
    let b = add(&mut ctl, "B", date!(2025 - 03 - 20), Priority::Low);
    let a = add(&mut ctl, "A", date!(2025 - 03 - 12), Priority::High);
    let c = add(&mut ctl, "C", date!(2025 - 03 - 15), Priority::Medium);

    let ids = |ctl: &Ctl| -> Vec<String> { ctl.visible_tasks().into_iter().map(|t| t.id).collect() };
    assert_eq!(ids(&ctl), [a.clone(), c.clone(), b.clone()]);

    ctl.dispatch(Command::SetSort(SortKey::DueDate)).expect("sort");
    assert_eq!(ids(&ctl), [a.clone(), c.clone(), b.clone()]);

    ctl.dispatch(CalendarInput::Drop { task_id: b.clone(), date: date!(2025 - 03 - 11) }.into())
        .expect("drop");
    assert_eq!(ids(&ctl), [b.clone(), a.clone(), c.clone()]);

    ctl.dispatch(Command::Toggle { id: a.clone() }).expect("toggle");
    ctl.dispatch(Command::SetFilter(Filter::Pending)).expect("filter");
    assert_eq!(ids(&ctl), [b.clone(), c.clone()]);
    ctl.dispatch(Command::SetFilter(Filter::Completed)).expect("filter");
    assert_eq!(ids(&ctl), [a.clone()]);

    drop(ctl);
    let ctl = open(td.path(), TODAY);
    assert_eq!(ctl.get(&b).expect("b").due_date, date!(2025 - 03 - 11));
}

#[test]
fn sweep_after_days_pass() {
    let td = tempfile::tempdir().expect("tempdir");
    let mut ctl = open(td.path(), TODAY);
    add(&mut ctl, "Report", date!(2025 - 03 - 11), Priority::High);
    add(&mut ctl, "Dentist", date!(2025 - 03 - 13), Priority::Low);
    drop(ctl);

    // Two days later: the report is overdue and the dentist is tomorrow.
    let ctl = open(td.path(), date!(2025 - 03 - 12));
    let mut queue = AlertQueue::new(true);
    let report = ctl.sweep(&mut queue);
    assert_eq!(report.overdue, 1);
    assert_eq!(report.due_soon, 1);
    assert_eq!(queue.alerts.front().map(String::as_str), Some("Task \"Report\" is overdue!"));
    assert_eq!(queue.notices, ["Task \"Dentist\" is due tomorrow!"]);

    let mut muted = AlertQueue::new(false);
    let report = ctl.sweep(&mut muted);
    assert_eq!(report.suppressed, 1);
    assert!(muted.notices.is_empty());
    assert_eq!(muted.alerts.len(), 1);
}

#[test]
fn reload_sees_writes_from_another_handle() {
    let td = tempfile::tempdir().expect("tempdir");
    let mut watcher = open(td.path(), TODAY);
    let mut writer = open(td.path(), TODAY);
    add(&mut writer, "From elsewhere", TODAY, Priority::Medium);

    assert!(watcher.tasks().is_empty());
    watcher.reload().expect("reload");
    assert_eq!(watcher.tasks().len(), 1);
}

#[test]
fn reload_drops_edit_of_task_deleted_elsewhere() {
    let td = tempfile::tempdir().expect("tempdir");
    let mut editor = open(td.path(), TODAY);
    let id = add(&mut editor, "Short lived", TODAY, Priority::Low);
    let keep = add(&mut editor, "Stays", TODAY, Priority::Low);

    let mut other = open(td.path(), TODAY);
    other.dispatch(Command::Delete { id: id.clone() }).expect("delete");

    editor.dispatch(Command::BeginEdit { id: keep.clone() }).expect("edit");
    editor.reload().expect("reload");
    assert_eq!(editor.editing_task_id(), Some(keep.as_str()));

    other.dispatch(Command::Delete { id: keep.clone() }).expect("delete");
    editor.reload().expect("reload");
    assert_eq!(editor.editing_task_id(), None);
    assert!(editor.tasks().is_empty());
}
