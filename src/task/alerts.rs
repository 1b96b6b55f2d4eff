#![forbid(unsafe_code)]

use std::collections::VecDeque;
use std::time::Duration;

use serde::Serialize;
use time::Date;

use crate::task::model::Task;

/// Receiver of sweep results.
pub trait Alerter {
    /// A blocking, user-facing alert.
    fn alert(&mut self, message: &str);
    /// A passive system notification.
    fn notify(&mut self, message: &str);
    fn notifications_permitted(&self) -> bool;
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct SweepReport {
    pub overdue: usize,
    pub due_soon: usize,
    /// Due-soon notices dropped because notifications are not permitted.
    pub suppressed: usize,
}

#[must_use]
pub fn overdue_message(title: &str) -> String {
    format!("Task \"{title}\" is overdue!")
}

#[must_use]
pub fn due_soon_message(title: &str) -> String {
    format!("Task \"{title}\" is due tomorrow!")
}

pub fn overdue_tasks(tasks: &[Task], today: Date) -> impl Iterator<Item = &Task> {
    tasks
        .iter()
        .filter(move |t| !t.completed && t.due_date < today)
}

pub fn due_soon_tasks(tasks: &[Task], today: Date) -> impl Iterator<Item = &Task> {
    let tomorrow = today.next_day().unwrap_or(today);
    tasks
        .iter()
        .filter(move |t| !t.completed && t.due_date > today && t.due_date <= tomorrow)
}

/// Runs both passes. Alerts repeat on every sweep until the task is
/// completed or moved.
pub fn sweep(tasks: &[Task], today: Date, alerter: &mut dyn Alerter) -> SweepReport {
    let mut report = SweepReport::default();

    for task in overdue_tasks(tasks, today) {
        alerter.alert(&overdue_message(&task.title));
        report.overdue += 1;
    }

    let permitted = alerter.notifications_permitted();
    for task in due_soon_tasks(tasks, today) {
        if permitted {
            alerter.notify(&due_soon_message(&task.title));
            report.due_soon += 1;
        } else {
            report.suppressed += 1;
        }
    }

    tracing::debug!(
        %today,
        overdue = report.overdue,
        due_soon = report.due_soon,
        suppressed = report.suppressed,
        "sweep finished"
    );
    report
}

/// Writes alerts to stderr and notifications to stdout.
#[derive(Debug, Clone, Copy)]
pub struct TerminalAlerter {
    pub notifications: bool,
    pub icons: bool,
}

impl Alerter for TerminalAlerter {
    fn alert(&mut self, message: &str) {
        if self.icons {
            eprintln!("🚨 {message}");
        } else {
            eprintln!("ALERT: {message}");
        }
    }

    fn notify(&mut self, message: &str) {
        if self.icons {
            println!("⏰ {message}");
        } else {
            println!("{message}");
        }
    }

    fn notifications_permitted(&self) -> bool {
        self.notifications
    }
}

/// Buffers alerts for a surface that shows them one at a time.
#[derive(Debug, Clone, Default)]
pub struct AlertQueue {
    pub alerts: VecDeque<String>,
    pub notices: Vec<String>,
    pub permitted: bool,
}

impl AlertQueue {
    #[must_use]
    pub fn new(permitted: bool) -> Self {
        Self {
            permitted,
            ..Self::default()
        }
    }
}

impl Alerter for AlertQueue {
    fn alert(&mut self, message: &str) {
        self.alerts.push_back(message.to_owned());
    }

    fn notify(&mut self, message: &str) {
        self.notices.push(message.to_owned());
    }

    fn notifications_permitted(&self) -> bool {
        self.permitted
    }
}

/// Calls `on_tick` immediately and then every `interval` until Ctrl-C.
pub async fn run_periodic<F>(interval: Duration, mut on_tick: F) -> anyhow::Result<()>
where
    F: FnMut() -> anyhow::Result<SweepReport>,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::debug!("sweep loop interrupted");
                return Ok(());
            }
            _ = ticker.tick() => {
                let report = on_tick()?;
                tracing::info!(
                    overdue = report.overdue,
                    due_soon = report.due_soon,
                    "periodic sweep"
                );
            }
        }
    }
}
