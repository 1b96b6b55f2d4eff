#![forbid(unsafe_code)]

use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState, Wrap};
use time::{Date, Month};

use crate::calendar::{self, CalendarInput, MonthCalendar};
use crate::config::Config;
use crate::task::alerts::AlertQueue;
use crate::task::controller::{
    Command, CommandOutcome, SystemClock, TaskForm, TaskListController, ViewPort,
};
use crate::task::model::{Filter, Priority, Task};
use crate::task::storage::{JsonFileStore, TaskStore};
use crate::task::view::{DueStatus, TaskView};
use crate::tui;

/// View port backing the board: keeps the last rendered rows and any form
/// contents the controller asked to show.
#[derive(Debug, Default)]
pub struct BoardView {
    rows: Vec<TaskView>,
    form: Option<TaskForm>,
}

impl BoardView {
    #[must_use]
    pub fn rows(&self) -> &[TaskView] {
        &self.rows
    }
}

impl ViewPort for BoardView {
    fn render_list(&mut self, tasks: &[TaskView]) {
        self.rows = tasks.to_vec();
    }

    fn populate_form(&mut self, task: &Task) {
        self.form = Some(TaskForm::from_task(task));
    }

    fn reset_form(&mut self) {
        self.form = None;
    }
}

type Board<S> = TaskListController<S, BoardView, MonthCalendar>;

pub fn run(cfg: Config, store: JsonFileStore) -> anyhow::Result<()> {
    let ctl = TaskListController::new(
        store,
        BoardView::default(),
        MonthCalendar::default(),
        Box::new(SystemClock),
    )?;
    let mut app = AppState::new(cfg, ctl);
    app.sweep();

    let terminal = tui::init_terminal()?;
    let mut guard = TerminalGuard::new(terminal);

    loop {
        if let Some(toast) = &app.toast
            && Instant::now() >= toast.until
        {
            app.toast = None;
        }

        {
            let Some(terminal) = guard.terminal.as_mut() else {
                anyhow::bail!("terminal unavailable");
            };
            terminal.draw(|f| draw(f, &mut app))?;
        }

        if app.should_quit {
            break;
        }

        if app.sweep_due() {
            app.sweep();
        }

        if event::poll(Duration::from_millis(200))?
            && let Event::Key(key) = event::read()?
        {
            app.handle_key(key);
        }
    }

    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Normal,
    Form,
    Confirm,
}

#[derive(Debug, Clone)]
struct TextInput {
    text: String,
    cursor: usize,
}

impl TextInput {
    fn new(initial: impl Into<String>) -> Self {
        let text = initial.into();
        let cursor = text.chars().count();
        Self { text, cursor }
    }

    fn as_str(&self) -> &str {
        &self.text
    }

    fn set(&mut self, text: impl Into<String>) {
        *self = Self::new(text);
    }

    fn insert_char(&mut self, c: char) {
        let mut chars: Vec<char> = self.text.chars().collect();
        let cur = self.cursor.min(chars.len());
        chars.insert(cur, c);
        self.text = chars.into_iter().collect();
        self.cursor = cur + 1;
    }

    fn backspace(&mut self) {
        let mut chars: Vec<char> = self.text.chars().collect();
        let cur = self.cursor.min(chars.len());
        if cur == 0 {
            return;
        }
        chars.remove(cur - 1);
        self.text = chars.into_iter().collect();
        self.cursor = cur - 1;
    }

    fn delete(&mut self) {
        let mut chars: Vec<char> = self.text.chars().collect();
        let cur = self.cursor.min(chars.len());
        if cur >= chars.len() {
            return;
        }
        chars.remove(cur);
        self.text = chars.into_iter().collect();
    }

    fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    fn move_right(&mut self) {
        let len = self.text.chars().count();
        self.cursor = (self.cursor + 1).min(len);
    }

    fn handle_edit_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Left => self.move_left(),
            KeyCode::Right => self.move_right(),
            KeyCode::Home => self.cursor = 0,
            KeyCode::End => self.cursor = self.text.chars().count(),
            KeyCode::Backspace => self.backspace(),
            KeyCode::Delete => self.delete(),
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.insert_char(c);
            }
            _ => {}
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FormField {
    Title,
    Description,
    Due,
    Priority,
}

impl FormField {
    fn next(self) -> Self {
        match self {
            FormField::Title => FormField::Description,
            FormField::Description => FormField::Due,
            FormField::Due => FormField::Priority,
            FormField::Priority => FormField::Title,
        }
    }

    fn prev(self) -> Self {
        match self {
            FormField::Title => FormField::Priority,
            FormField::Description => FormField::Title,
            FormField::Due => FormField::Description,
            FormField::Priority => FormField::Due,
        }
    }
}

#[derive(Debug, Clone)]
struct FormDialog {
    title: TextInput,
    description: TextInput,
    due: TextInput,
    priority: TextInput,
    field: FormField,
    editing: Option<String>,
    error: Option<String>,
}

impl FormDialog {
    fn new(today: Date) -> Self {
        Self::from_form(
            &TaskForm {
                due_date: crate::task::model::format_date(today),
                priority: Priority::Low.as_str().to_owned(),
                ..TaskForm::default()
            },
            None,
        )
    }

    fn from_form(form: &TaskForm, editing: Option<String>) -> Self {
        Self {
            title: TextInput::new(form.title.clone()),
            description: TextInput::new(form.description.clone()),
            due: TextInput::new(form.due_date.clone()),
            priority: TextInput::new(form.priority.clone()),
            field: FormField::Title,
            editing,
            error: None,
        }
    }

    fn to_form(&self) -> TaskForm {
        TaskForm {
            title: self.title.text.clone(),
            description: self.description.text.clone(),
            due_date: self.due.text.clone(),
            priority: self.priority.text.clone(),
        }
    }

    fn input_mut(&mut self) -> &mut TextInput {
        match self.field {
            FormField::Title => &mut self.title,
            FormField::Description => &mut self.description,
            FormField::Due => &mut self.due,
            FormField::Priority => &mut self.priority,
        }
    }

    fn cycle_priority(&mut self, up: bool) {
        let current = self.priority.text.parse::<Priority>().unwrap_or(Priority::Low);
        let idx = Priority::ALL.iter().position(|p| *p == current).unwrap_or(0);
        let len = Priority::ALL.len();
        let next = if up { (idx + 1) % len } else { (idx + len - 1) % len };
        self.priority.set(Priority::ALL[next].as_str());
    }
}

#[derive(Debug, Clone)]
struct Toast {
    message: String,
    until: Instant,
}

impl Toast {
    fn info(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            until: Instant::now() + Duration::from_secs(4),
        }
    }
}

struct AppState<S> {
    cfg: Config,
    ctl: Board<S>,
    mode: Mode,
    table: TableState,
    form: Option<FormDialog>,
    confirm_delete: Option<(String, String)>,
    alerts: AlertQueue,
    show_calendar: bool,
    month: (i32, Month),
    cal_day: Date,
    toast: Option<Toast>,
    last_error: Option<String>,
    sweep_interval: Duration,
    last_sweep: Option<Instant>,
    should_quit: bool,
}

impl<S: TaskStore> AppState<S> {
    fn new(cfg: Config, mut ctl: Board<S>) -> Self {
        ctl.set_filter(cfg.view.default_filter);
        ctl.set_sort(cfg.view.default_sort);
        let today = ctl.today();
        let mut table = TableState::default();
        if !ctl.view().rows().is_empty() {
            table.select(Some(0));
        }
        Self {
            alerts: AlertQueue::new(cfg.alerts.notifications),
            sweep_interval: Duration::from_secs(cfg.alerts.sweep_interval_secs.max(1)),
            cfg,
            ctl,
            mode: Mode::Normal,
            table,
            form: None,
            confirm_delete: None,
            show_calendar: false,
            month: (today.year(), today.month()),
            cal_day: today,
            toast: None,
            last_error: None,
            last_sweep: None,
            should_quit: false,
        }
    }

    fn rows(&self) -> &[TaskView] {
        self.ctl.view().rows()
    }

    fn selected_id(&self) -> Option<String> {
        let idx = self.table.selected()?;
        self.rows().get(idx).map(|v| v.id.clone())
    }

    fn select_id(&mut self, id: &str) {
        if let Some(idx) = self.rows().iter().position(|v| v.id == id) {
            self.table.select(Some(idx));
        }
    }

    fn clamp_selection(&mut self) {
        let len = self.rows().len();
        if len == 0 {
            self.table.select(None);
            return;
        }
        let idx = self.table.selected().unwrap_or(0).min(len - 1);
        self.table.select(Some(idx));
    }

    fn sweep_due(&self) -> bool {
        self.last_sweep
            .is_none_or(|at| at.elapsed() >= self.sweep_interval)
    }

    fn sweep(&mut self) {
        let notices_before = self.alerts.notices.len();
        self.ctl.sweep(&mut self.alerts);
        self.last_sweep = Some(Instant::now());
        if let Some(last) = self.alerts.notices.get(notices_before..).and_then(<[String]>::last) {
            let icon = if self.cfg.view.icons { "⏰ " } else { "" };
            self.toast = Some(Toast::info(format!("{icon}{last}")));
        }
    }

    fn dispatch(&mut self, cmd: Command) -> Option<CommandOutcome> {
        let out = match self.ctl.dispatch(cmd) {
            Ok(o) => {
                self.last_error = None;
                Some(o)
            }
            Err(e) => {
                self.last_error = Some(format!("{e:#}"));
                None
            }
        };
        self.clamp_selection();
        out
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }

        // Alerts block everything else until dismissed.
        if !self.alerts.alerts.is_empty() {
            if matches!(
                key.code,
                KeyCode::Enter | KeyCode::Esc | KeyCode::Char(' ' | 'q')
            ) {
                self.alerts.alerts.pop_front();
            }
            return;
        }

        match self.mode {
            Mode::Normal => self.handle_normal_key(key),
            Mode::Form => self.handle_form_key(key),
            Mode::Confirm => self.handle_confirm_key(key),
        }
    }

    fn handle_normal_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Char('j') | KeyCode::Down => {
                let len = self.rows().len();
                if len > 0 {
                    let idx = self.table.selected().map_or(0, |i| (i + 1).min(len - 1));
                    self.table.select(Some(idx));
                }
            }
            KeyCode::Char('k') | KeyCode::Up => {
                if !self.rows().is_empty() {
                    let idx = self.table.selected().map_or(0, |i| i.saturating_sub(1));
                    self.table.select(Some(idx));
                }
            }
            KeyCode::Char('g') | KeyCode::Home => {
                if !self.rows().is_empty() {
                    self.table.select(Some(0));
                }
            }
            KeyCode::Char('G') | KeyCode::End => {
                let len = self.rows().len();
                if len > 0 {
                    self.table.select(Some(len - 1));
                }
            }
            KeyCode::Char('n') => {
                self.ctl.cancel_edit();
                self.form = Some(FormDialog::new(self.ctl.today()));
                self.mode = Mode::Form;
            }
            KeyCode::Char('e') | KeyCode::Enter => self.open_edit(),
            KeyCode::Char(' ' | 'x') => {
                if let Some(id) = self.selected_id() {
                    self.dispatch(Command::Toggle { id: id.clone() });
                    self.select_id(&id);
                }
            }
            KeyCode::Char('d') => {
                if let Some(id) = self.selected_id() {
                    let title = self.ctl.get(&id).map(|t| t.title.clone()).unwrap_or_default();
                    self.confirm_delete = Some((id, title));
                    self.mode = Mode::Confirm;
                }
            }
            KeyCode::Char('f') => {
                let next = match self.ctl.filter() {
                    Filter::All => Filter::Pending,
                    Filter::Pending => Filter::Completed,
                    Filter::Completed => Filter::All,
                };
                self.dispatch(Command::SetFilter(next));
            }
            KeyCode::Char('s') => {
                let next = self.ctl.sort().secondary();
                self.dispatch(Command::SetSort(next));
            }
            KeyCode::Char('c') => self.show_calendar = !self.show_calendar,
            KeyCode::Char('<') => self.shift_selected_due(-1),
            KeyCode::Char('>') => self.shift_selected_due(1),
            KeyCode::Char('[') => self.shift_month(false),
            KeyCode::Char(']') => self.shift_month(true),
            KeyCode::Char('h') if self.show_calendar => self.move_cal_day(-1),
            KeyCode::Char('l') if self.show_calendar => self.move_cal_day(1),
            KeyCode::Char('H') if self.show_calendar => self.move_cal_day(-7),
            KeyCode::Char('L') if self.show_calendar => self.move_cal_day(7),
            KeyCode::Char('o') if self.show_calendar => self.click_cal_day(),
            KeyCode::Char('t') => {
                let today = self.ctl.today();
                self.cal_day = today;
                self.month = (today.year(), today.month());
            }
            KeyCode::Char('r') => match self.ctl.reload() {
                Ok(()) => {
                    self.clamp_selection();
                    self.toast = Some(Toast::info("Reloaded"));
                }
                Err(e) => self.last_error = Some(format!("{e:#}")),
            },
            KeyCode::Char('!') => self.sweep(),
            _ => {}
        }
    }

    fn open_edit(&mut self) {
        let Some(id) = self.selected_id() else {
            return;
        };
        self.begin_edit(Command::BeginEdit { id });
    }

    fn begin_edit(&mut self, cmd: Command) {
        if let Some(CommandOutcome::Editing(Some(task))) = self.dispatch(cmd) {
            let id = task.id.clone();
            self.select_id(&id);
            let form = self
                .ctl
                .view()
                .form
                .clone()
                .unwrap_or_else(|| TaskForm::from_task(&task));
            self.form = Some(FormDialog::from_form(&form, Some(id)));
            self.mode = Mode::Form;
        }
    }

    /// Keyboard stand-in for dragging the selected task to another day.
    fn shift_selected_due(&mut self, days: i64) {
        let Some(id) = self.selected_id() else {
            return;
        };
        let Some(task) = self.ctl.get(&id) else {
            return;
        };
        let Some(date) = task.due_date.checked_add(time::Duration::days(days)) else {
            return;
        };
        self.show_calendar = true;
        self.dispatch(CalendarInput::Drop { task_id: id.clone(), date }.into());
        self.select_id(&id);
        self.cal_day = date;
        self.month = (date.year(), date.month());
    }

    fn move_cal_day(&mut self, days: i64) {
        if let Some(day) = self.cal_day.checked_add(time::Duration::days(days)) {
            self.cal_day = day;
            self.month = (day.year(), day.month());
        }
    }

    /// Clicks the most pressing event on the highlighted day.
    fn click_cal_day(&mut self) {
        let target = self
            .ctl
            .calendar()
            .events_on(self.cal_day)
            .into_iter()
            .max_by_key(|e| (!e.completed, e.priority.rank()))
            .map(|e| e.task_id.clone());
        let Some(task_id) = target else {
            self.toast = Some(Toast::info("No tasks on this day"));
            return;
        };
        self.begin_edit(CalendarInput::Click { task_id }.into());
    }

    fn shift_month(&mut self, forward: bool) {
        let (year, month) = self.month;
        self.month = if forward {
            if month == Month::December {
                (year + 1, Month::January)
            } else {
                (year, month.next())
            }
        } else if month == Month::January {
            (year - 1, Month::December)
        } else {
            (year, month.previous())
        };
    }

    fn handle_form_key(&mut self, key: KeyEvent) {
        let Some(dialog) = self.form.as_mut() else {
            self.mode = Mode::Normal;
            return;
        };

        match key.code {
            KeyCode::Esc => {
                self.form = None;
                self.mode = Mode::Normal;
                self.ctl.cancel_edit();
            }
            KeyCode::Tab => {
                dialog.error = None;
                dialog.field = dialog.field.next();
            }
            KeyCode::BackTab => {
                dialog.error = None;
                dialog.field = dialog.field.prev();
            }
            KeyCode::Up | KeyCode::Down if dialog.field == FormField::Priority => {
                dialog.cycle_priority(key.code == KeyCode::Up);
            }
            KeyCode::Enter => {
                dialog.error = None;
                if dialog.field != FormField::Priority {
                    dialog.field = dialog.field.next();
                    return;
                }
                self.submit_form();
            }
            _ => dialog.input_mut().handle_edit_key(key),
        }
    }

    fn submit_form(&mut self) {
        let Some(dialog) = self.form.as_ref() else {
            return;
        };
        let form = dialog.to_form();

        match self.ctl.dispatch(Command::Submit(form)) {
            Ok(CommandOutcome::Created(task)) => {
                self.toast = Some(Toast::info(format!("Added \"{}\"", task.title)));
                self.close_form();
                self.select_id(&task.id);
            }
            Ok(CommandOutcome::Updated(id)) => {
                self.toast = Some(Toast::info("Task updated"));
                self.close_form();
                self.select_id(&id);
            }
            Ok(_) => self.close_form(),
            Err(e) => {
                if let Some(dialog) = self.form.as_mut() {
                    dialog.error = Some(format!("{e:#}"));
                }
            }
        }
    }

    fn close_form(&mut self) {
        self.form = None;
        self.mode = Mode::Normal;
        self.last_error = None;
        self.clamp_selection();
    }

    fn handle_confirm_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('y' | 'Y') => {
                if let Some((id, _)) = self.confirm_delete.take() {
                    self.dispatch(Command::Delete { id });
                }
                self.mode = Mode::Normal;
            }
            KeyCode::Char('n' | 'N' | 'q') | KeyCode::Esc => {
                self.confirm_delete = None;
                self.mode = Mode::Normal;
            }
            _ => {}
        }
    }
}

fn draw<S: TaskStore>(f: &mut Frame<'_>, app: &mut AppState<S>) {
    let area = f.area();
    let root = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(1),
            Constraint::Length(1),
        ])
        .split(area);

    draw_header(f, root[0], app);

    if app.show_calendar {
        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(root[1]);
        draw_task_table(f, body[0], app);
        draw_calendar(f, body[1], app);
    } else {
        draw_task_table(f, root[1], app);
    }

    draw_footer(f, root[2], app);

    if let Some((_, title)) = &app.confirm_delete {
        draw_confirm(f, title);
    }
    if app.mode == Mode::Form
        && let Some(dialog) = &app.form
    {
        draw_form(f, dialog);
    }
    if let Some(alert) = app.alerts.alerts.front() {
        draw_alert(f, alert, app.alerts.alerts.len(), app.cfg.view.icons);
    }
}

fn draw_header<S: TaskStore>(f: &mut Frame<'_>, area: Rect, app: &AppState<S>) {
    let total = app.ctl.tasks().len();
    let done = app.ctl.tasks().iter().filter(|t| t.completed).count();
    let left = Line::from(vec![
        Span::styled(
            " taskdeck ",
            Style::default()
                .fg(Color::Black)
                .bg(Color::LightBlue)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!(
            "  filter: {}  sort: {}",
            app.ctl.filter(),
            app.ctl.sort()
        )),
    ]);
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(70), Constraint::Percentage(30)])
        .split(area);
    f.render_widget(Paragraph::new(left), chunks[0]);
    let right = Paragraph::new(Line::from(format!("{done}/{total} done")))
        .style(Style::default().fg(Color::DarkGray))
        .alignment(Alignment::Right);
    f.render_widget(right, chunks[1]);
}

fn draw_task_table<S: TaskStore>(f: &mut Frame<'_>, area: Rect, app: &mut AppState<S>) {
    let icons = app.cfg.view.icons;
    let rows: Vec<Row> = app
        .rows()
        .iter()
        .map(|v| {
            let check = match (v.completed, icons) {
                (true, true) => "✓",
                (false, true) => "○",
                (true, false) => "[x]",
                (false, false) => "[ ]",
            };
            let title_style = if v.completed {
                Style::default()
                    .fg(Color::DarkGray)
                    .add_modifier(Modifier::CROSSED_OUT)
            } else {
                Style::default()
            };
            let (status, status_style) = match v.status {
                DueStatus::Overdue => ("overdue", Style::default().fg(Color::Red)),
                DueStatus::DueSoon => ("due soon", Style::default().fg(Color::Yellow)),
                DueStatus::None => ("", Style::default()),
            };
            Row::new(vec![
                Cell::from(check),
                Cell::from(Span::styled(
                    v.priority_label,
                    Style::default().fg(hex_color(v.priority_color)),
                )),
                Cell::from(Span::styled(v.title.clone(), title_style)),
                Cell::from(v.due_date.clone()),
                Cell::from(Span::styled(status, status_style)),
            ])
        })
        .collect();

    let header = Row::new(vec!["", "PRIORITY", "TITLE", "DUE", "STATUS"])
        .style(Style::default().add_modifier(Modifier::BOLD));
    let title = format!("Tasks ({})", app.rows().len());
    let table = Table::new(
        rows,
        [
            Constraint::Length(3),
            Constraint::Length(8),
            Constraint::Min(10),
            Constraint::Length(10),
            Constraint::Length(8),
        ],
    )
    .header(header)
    .block(Block::default().borders(Borders::ALL).title(title))
    .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED));

    if app.rows().is_empty() {
        let empty = Paragraph::new("No tasks. Press n to add one.")
            .style(Style::default().fg(Color::DarkGray))
            .block(Block::default().borders(Borders::ALL).title("Tasks (0)"));
        f.render_widget(empty, area);
        return;
    }
    f.render_stateful_widget(table, area, &mut app.table);
}

fn draw_calendar<S: TaskStore>(f: &mut Frame<'_>, area: Rect, app: &AppState<S>) {
    let (year, month) = app.month;
    let today = app.ctl.today();
    let selected_due = app
        .selected_id()
        .and_then(|id| app.ctl.get(&id).map(|t| t.due_date));
    let cal = app.ctl.calendar();

    let mut lines = vec![
        Line::from(Span::styled(
            format!("{month} {year}"),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            " Mo  Tu  We  Th  Fr  Sa  Su",
            Style::default().fg(Color::DarkGray),
        )),
    ];

    match calendar::month_weeks(year, month) {
        Ok(weeks) => {
            for week in weeks {
                let spans: Vec<Span> = week
                    .iter()
                    .map(|cell| match cell {
                        None => Span::raw("    "),
                        Some(d) => Span::styled(
                            format!(" {:>2} ", d.day()),
                            day_style(cal, *d, today, selected_due, app.cal_day),
                        ),
                    })
                    .collect();
                lines.push(Line::from(spans));
            }
        }
        Err(e) => lines.push(Line::from(e.to_string())),
    }

    lines.push(Line::from(""));
    for e in cal.events_in_month(year, month) {
        let style = if e.completed {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default().fg(hex_color(e.color))
        };
        lines.push(Line::from(vec![
            Span::raw(format!("{:>2}  ", e.date.day())),
            Span::styled(e.title.clone(), style),
        ]));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .title("Calendar  h/l day • o open • [ ] month");
    f.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
        area,
    );
}

fn day_style(
    cal: &MonthCalendar,
    day: Date,
    today: Date,
    selected: Option<Date>,
    cursor: Date,
) -> Style {
    let events = cal.events_on(day);
    let top = events
        .iter()
        .filter(|e| !e.completed)
        .max_by_key(|e| e.priority.rank());
    let mut style = match (top, events.is_empty()) {
        (Some(e), _) => Style::default().fg(hex_color(e.color)).add_modifier(Modifier::BOLD),
        (None, false) => Style::default().fg(Color::DarkGray),
        (None, true) => Style::default(),
    };
    if day == today {
        style = style.add_modifier(Modifier::REVERSED);
    }
    if Some(day) == selected {
        style = style.add_modifier(Modifier::UNDERLINED);
    }
    if day == cursor {
        style = style.bg(Color::Blue);
    }
    style
}

fn draw_footer<S: TaskStore>(f: &mut Frame<'_>, area: Rect, app: &AppState<S>) {
    let hints = match app.mode {
        Mode::Normal => "q quit • j/k move • n new • e edit • space toggle • d delete • f filter • s sort • c calendar • < > due • r reload",
        Mode::Form => "Enter next/save • Tab switch field • ↑/↓ priority • Esc cancel",
        Mode::Confirm => "y delete • n cancel",
    };

    let line = if let Some(err) = &app.last_error {
        Line::from(Span::styled(err.clone(), Style::default().fg(Color::Red)))
    } else if let Some(toast) = &app.toast {
        Line::from(Span::styled(
            toast.message.clone(),
            Style::default().fg(Color::Green),
        ))
    } else {
        Line::from(Span::styled(hints, Style::default().fg(Color::DarkGray)))
    };
    f.render_widget(Paragraph::new(line), area);
}

fn draw_form(f: &mut Frame<'_>, dialog: &FormDialog) {
    let area = centered_rect(70, 40, f.area());
    f.render_widget(Clear, area);
    let title = if dialog.editing.is_some() {
        "Edit task"
    } else {
        "New task"
    };
    let block = Block::default().borders(Borders::ALL).title(title);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let label = Style::default().add_modifier(Modifier::BOLD);
    let active = Style::default()
        .fg(Color::Yellow)
        .add_modifier(Modifier::BOLD);
    let style_for = |field: FormField| {
        if dialog.field == field {
            active
        } else {
            Style::default()
        }
    };

    let mut lines = vec![
        Line::from(vec![
            Span::styled("Title:       ", label),
            Span::styled(dialog.title.as_str(), style_for(FormField::Title)),
        ]),
        Line::from(vec![
            Span::styled("Description: ", label),
            Span::styled(dialog.description.as_str(), style_for(FormField::Description)),
        ]),
        Line::from(vec![
            Span::styled("Due:         ", label),
            Span::styled(dialog.due.as_str(), style_for(FormField::Due)),
            Span::styled("  (YYYY-MM-DD)", Style::default().fg(Color::DarkGray)),
        ]),
        Line::from(vec![
            Span::styled("Priority:    ", label),
            Span::styled(dialog.priority.as_str(), style_for(FormField::Priority)),
            Span::styled("  (low/medium/high)", Style::default().fg(Color::DarkGray)),
        ]),
    ];

    if let Some(err) = dialog.error.as_deref() {
        lines.push(Line::from(""));
        lines.push(Line::from(vec![
            Span::styled(
                "Error: ",
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            ),
            Span::styled(err, Style::default().fg(Color::Red)),
        ]));
    }
    f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), inner);

    let (row, input) = match dialog.field {
        FormField::Title => (0u16, &dialog.title),
        FormField::Description => (1, &dialog.description),
        FormField::Due => (2, &dialog.due),
        FormField::Priority => (3, &dialog.priority),
    };
    let prefix = u16::try_from("Description: ".chars().count()).unwrap_or(0);
    let x = inner.x + prefix + cursor_x_for_text(input.as_str(), input.cursor);
    f.set_cursor_position((x, inner.y + row));
}

fn draw_confirm(f: &mut Frame<'_>, title: &str) {
    let area = centered_rect(60, 20, f.area());
    f.render_widget(Clear, area);
    let block = Block::default().borders(Borders::ALL).title("Delete task");
    let inner = block.inner(area);
    f.render_widget(block, area);
    let lines = vec![
        Line::from(format!("Delete \"{title}\"?")),
        Line::from(""),
        Line::from("[y] delete    [n] cancel"),
    ];
    f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }), inner);
}

fn draw_alert(f: &mut Frame<'_>, message: &str, pending: usize, icons: bool) {
    let area = centered_rect(60, 20, f.area());
    f.render_widget(Clear, area);
    let title = if pending > 1 {
        format!("Alert (1 of {pending})")
    } else {
        "Alert".to_owned()
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red))
        .title(title);
    let inner = block.inner(area);
    f.render_widget(block, area);
    let text = if icons {
        format!("🚨 {message}")
    } else {
        message.to_owned()
    };
    let lines = vec![
        Line::from(Span::styled(text, Style::default().add_modifier(Modifier::BOLD))),
        Line::from(""),
        Line::from(Span::styled("[Enter] OK", Style::default().fg(Color::DarkGray))),
    ];
    f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }), inner);
}

/// `#rrggbb` to a terminal color; anything else is gray.
fn hex_color(hex: &str) -> Color {
    let digits = hex.trim_start_matches('#');
    if digits.len() != 6 {
        return Color::Gray;
    }
    let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();
    match (channel(0), channel(2), channel(4)) {
        (Some(r), Some(g), Some(b)) => Color::Rgb(r, g, b),
        _ => Color::Gray,
    }
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

fn cursor_x_for_text(text: &str, cursor: usize) -> u16 {
    u16::try_from(text.chars().take(cursor).count()).unwrap_or(0)
}

struct TerminalGuard {
    terminal: Option<ratatui::Terminal<ratatui::backend::CrosstermBackend<std::io::Stdout>>>,
}

impl TerminalGuard {
    fn new(
        terminal: ratatui::Terminal<ratatui::backend::CrosstermBackend<std::io::Stdout>>,
    ) -> Self {
        Self {
            terminal: Some(terminal),
        }
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        if let Some(terminal) = self.terminal.take() {
            let _ = tui::restore_terminal(terminal);
        }
    }
}
