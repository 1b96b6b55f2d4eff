#![forbid(unsafe_code)]

//! Calendar mirror of the task collection.
//!
//! The controller owns the tasks; a [`CalendarSink`] only receives a fresh
//! event list after each mutation. Moves and clicks made on the calendar come
//! back as [`CalendarInput`] and are turned into controller commands.

use std::fmt::Write as _;

use time::{Date, Month};

use crate::error::TaskdeckError;
use crate::task::controller::Command;
use crate::task::model::{Priority, Task};
use crate::task::view::priority_color;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarEvent {
    pub task_id: String,
    pub title: String,
    pub date: Date,
    pub priority: Priority,
    pub color: &'static str,
    pub completed: bool,
}

impl CalendarEvent {
    #[must_use]
    pub fn from_task(task: &Task) -> Self {
        Self {
            task_id: task.id.clone(),
            title: task.title.clone(),
            date: task.due_date,
            priority: task.priority,
            color: priority_color(task.priority),
            completed: task.completed,
        }
    }
}

/// Rebuilds the event list from the full collection.
#[must_use]
pub fn events_from_tasks(tasks: &[Task]) -> Vec<CalendarEvent> {
    tasks.iter().map(CalendarEvent::from_task).collect()
}

pub trait CalendarSink {
    fn refetch(&mut self, events: Vec<CalendarEvent>);
}

/// Keeps the latest event list for month rendering.
#[derive(Debug, Clone, Default)]
pub struct MonthCalendar {
    events: Vec<CalendarEvent>,
    refetches: usize,
}

impl MonthCalendar {
    #[must_use]
    pub fn events(&self) -> &[CalendarEvent] {
        &self.events
    }

    #[must_use]
    pub fn refetches(&self) -> usize {
        self.refetches
    }

    /// Events in the given month, earliest first.
    #[must_use]
    pub fn events_in_month(&self, year: i32, month: Month) -> Vec<&CalendarEvent> {
        let mut out: Vec<&CalendarEvent> = self
            .events
            .iter()
            .filter(|e| e.date.year() == year && e.date.month() == month)
            .collect();
        out.sort_by(|a, b| {
            a.date
                .cmp(&b.date)
                .then_with(|| b.priority.rank().cmp(&a.priority.rank()))
        });
        out
    }

    #[must_use]
    pub fn events_on(&self, date: Date) -> Vec<&CalendarEvent> {
        self.events.iter().filter(|e| e.date == date).collect()
    }
}

impl CalendarSink for MonthCalendar {
    fn refetch(&mut self, events: Vec<CalendarEvent>) {
        self.events = events;
        self.refetches += 1;
    }
}

/// Something the user did on the calendar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalendarInput {
    /// A task was dropped onto a day.
    Drop { task_id: String, date: Date },
    /// An event was clicked.
    Click { task_id: String },
}

impl From<CalendarInput> for Command {
    fn from(input: CalendarInput) -> Self {
        match input {
            CalendarInput::Drop { task_id, date } => Command::MoveDueDate { id: task_id, date },
            CalendarInput::Click { task_id } => Command::BeginEdit { id: task_id },
        }
    }
}

/// Weeks of a month, Monday first. `None` pads days outside the month.
pub fn month_weeks(year: i32, month: Month) -> Result<Vec<[Option<Date>; 7]>, TaskdeckError> {
    let first = Date::from_calendar_date(year, month, 1).map_err(|e| TaskdeckError::InvalidInput {
        field: "month",
        msg: e.to_string(),
    })?;
    let days = month.length(year);
    let offset = usize::from(first.weekday().number_days_from_monday());

    let mut weeks: Vec<[Option<Date>; 7]> = Vec::new();
    let mut week: [Option<Date>; 7] = [None; 7];
    let mut col = offset;
    let mut day = Some(first);
    for _ in 0..days {
        week[col] = day;
        col += 1;
        if col == 7 {
            weeks.push(week);
            week = [None; 7];
            col = 0;
        }
        day = day.and_then(Date::next_day);
    }
    if col > 0 {
        weeks.push(week);
    }
    Ok(weeks)
}

/// Plain-text month grid followed by the month's events. Days with events
/// carry a `*`, today is bracketed.
pub fn month_grid(
    calendar: &MonthCalendar,
    year: i32,
    month: Month,
    today: Date,
) -> Result<String, TaskdeckError> {
    let weeks = month_weeks(year, month)?;
    let mut out = String::new();
    let _ = writeln!(out, "{month} {year}");
    let _ = writeln!(out, " Mo   Tu   We   Th   Fr   Sa   Su");
    for week in &weeks {
        let mut line = String::new();
        for cell in week {
            let text = match cell {
                None => "    ".to_owned(),
                Some(d) => {
                    let mark = if calendar.events_on(*d).is_empty() {
                        ' '
                    } else {
                        '*'
                    };
                    if *d == today {
                        format!("[{:>2}]", d.day())
                    } else {
                        format!(" {:>2}{mark}", d.day())
                    }
                }
            };
            line.push_str(&text);
            line.push(' ');
        }
        let _ = writeln!(out, "{}", line.trim_end());
    }

    let events = calendar.events_in_month(year, month);
    if !events.is_empty() {
        out.push('\n');
        for e in events {
            let done = if e.completed { " (done)" } else { "" };
            let _ = writeln!(
                out,
                "{:>2}  {} [{}]{done}",
                e.date.day(),
                e.title,
                e.priority.label()
            );
        }
    }
    Ok(out)
}

/// Parses `YYYY-MM`.
pub fn parse_month(input: &str) -> Result<(i32, Month), TaskdeckError> {
    let invalid = || TaskdeckError::InvalidInput {
        field: "month",
        msg: format!("expected YYYY-MM, got '{input}'"),
    };
    let (y, m) = input.trim().split_once('-').ok_or_else(invalid)?;
    let year: i32 = y.parse().map_err(|_| invalid())?;
    let month: u8 = m.parse().map_err(|_| invalid())?;
    let month = Month::try_from(month).map_err(|_| invalid())?;
    Ok((year, month))
}
