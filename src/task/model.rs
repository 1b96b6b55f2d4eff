#![forbid(unsafe_code)]

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::Date;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use uuid::Uuid;

use crate::error::TaskdeckError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::Low, Priority::Medium, Priority::High];

    #[must_use]
    pub fn rank(self) -> u8 {
        match self {
            Priority::High => 3,
            Priority::Medium => 2,
            Priority::Low => 1,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = TaskdeckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" | "l" => Ok(Priority::Low),
            "medium" | "med" | "m" => Ok(Priority::Medium),
            "high" | "h" => Ok(Priority::High),
            other => Err(TaskdeckError::InvalidInput {
                field: "priority",
                msg: format!("expected low|medium|high, got '{other}'"),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Filter {
    #[default]
    All,
    Completed,
    Pending,
}

impl Filter {
    #[must_use]
    pub fn matches(self, task: &Task) -> bool {
        match self {
            Filter::All => true,
            Filter::Completed => task.completed,
            Filter::Pending => !task.completed,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Filter::All => "all",
            Filter::Completed => "completed",
            Filter::Pending => "pending",
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Filter {
    type Err = TaskdeckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" | "" => Ok(Filter::All),
            "completed" | "done" => Ok(Filter::Completed),
            "pending" | "open" => Ok(Filter::Pending),
            other => Err(TaskdeckError::InvalidInput {
                field: "filter",
                msg: format!("expected all|completed|pending, got '{other}'"),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum SortKey {
    #[default]
    #[serde(rename = "priority")]
    Priority,
    #[serde(rename = "dueDate")]
    DueDate,
}

impl SortKey {
    /// The key used to break ties on this one.
    #[must_use]
    pub fn secondary(self) -> SortKey {
        match self {
            SortKey::Priority => SortKey::DueDate,
            SortKey::DueDate => SortKey::Priority,
        }
    }

    /// Priority sorts high first; due date sorts earliest first.
    #[must_use]
    pub fn compare(self, a: &Task, b: &Task) -> Ordering {
        match self {
            SortKey::Priority => b.priority.rank().cmp(&a.priority.rank()),
            SortKey::DueDate => a.due_date.cmp(&b.due_date),
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SortKey::Priority => "priority",
            SortKey::DueDate => "dueDate",
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = TaskdeckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "priority" | "" => Ok(SortKey::Priority),
            "duedate" | "due-date" | "due_date" | "due" => Ok(SortKey::DueDate),
            other => Err(TaskdeckError::InvalidInput {
                field: "sort",
                msg: format!("expected priority|dueDate, got '{other}'"),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(with = "due_date")]
    pub due_date: Date,
    pub priority: Priority,
    #[serde(default)]
    pub completed: bool,
}

impl Task {
    #[must_use]
    pub fn new_id() -> String {
        let id = Uuid::new_v4().simple().to_string();
        id.chars().take(8).collect()
    }
}

/// Parses a due date. Accepts `YYYY-MM-DD` and RFC 3339 timestamps, keeping
/// only the calendar date of the latter.
pub fn parse_date(input: &str) -> Result<Date, TaskdeckError> {
    let s = input.trim();
    if let Ok(d) = Date::parse(s, format_description!("[year]-[month]-[day]")) {
        return Ok(d);
    }
    if let Ok(dt) = time::OffsetDateTime::parse(s, &Rfc3339) {
        return Ok(dt.date());
    }
    Err(TaskdeckError::InvalidInput {
        field: "due date",
        msg: format!("expected YYYY-MM-DD, got '{s}'"),
    })
}

#[must_use]
pub fn format_date(date: Date) -> String {
    date.format(format_description!("[year]-[month]-[day]"))
        .unwrap_or_else(|_| date.to_string())
}

mod due_date {
    use serde::{Deserialize as _, Deserializer, Serializer};
    use time::Date;

    pub fn serialize<S: Serializer>(date: &Date, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_date(*date))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Date, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_date(&raw).map_err(serde::de::Error::custom)
    }
}
