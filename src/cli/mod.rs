#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context as _;
use clap::{CommandFactory as _, Parser, Subcommand};

use crate::calendar::{self, MonthCalendar};
use crate::config::{self, Config};
use crate::error::TaskdeckError;
use crate::logging;
use crate::output::table::Table;
use crate::task::alerts::{self, TerminalAlerter};
use crate::task::controller::{Command, CommandOutcome, NoView, SystemClock, TaskListController};
use crate::task::model::{Filter, Priority, SortKey, Task, format_date, parse_date};
use crate::task::storage::JsonFileStore;
use crate::task::view::{DueStatus, TaskView};
use crate::tui;

type CliController = TaskListController<JsonFileStore, NoView, MonthCalendar>;

#[derive(Debug, Parser)]
#[command(
    name = "taskdeck",
    version,
    about = "Personal task list with due-date calendar and overdue alerts"
)]
pub struct Cli {
    /// Directory holding the task file (overrides storage.data_dir)
    #[arg(long = "data-dir", global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub cmd: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    Add(AddArgs),
    Edit(EditArgs),
    #[command(alias = "rm")]
    Delete(DeleteArgs),
    Toggle(IdArgs),
    Move(MoveArgs),
    #[command(alias = "ls")]
    List(ListArgs),
    Show(ShowArgs),
    Calendar(CalendarArgs),
    /// Run one overdue / due-soon sweep
    Check,
    /// Sweep periodically until interrupted
    Watch(WatchArgs),
    /// Interactive board
    Tui,
    Config(ConfigArgs),
    Completion(CompletionArgs),
    Version,
}

#[derive(Debug, Parser)]
pub struct AddArgs {
    /// Task title
    pub title: String,
    /// Due date (YYYY-MM-DD)
    #[arg(long = "due")]
    pub due: String,
    #[arg(short = 'd', long = "description", default_value = "")]
    pub description: String,
    #[arg(short = 'p', long = "priority", default_value = "low")]
    pub priority: String,
}

#[derive(Debug, Parser)]
pub struct EditArgs {
    /// Task ID or unique prefix
    pub id: String,
    #[arg(long = "title")]
    pub title: Option<String>,
    #[arg(short = 'd', long = "description")]
    pub description: Option<String>,
    #[arg(long = "due")]
    pub due: Option<String>,
    #[arg(short = 'p', long = "priority")]
    pub priority: Option<String>,
}

#[derive(Debug, Parser)]
pub struct DeleteArgs {
    /// Task IDs or unique prefixes
    #[arg(required = true)]
    pub ids: Vec<String>,
}

#[derive(Debug, Parser)]
pub struct IdArgs {
    /// Task ID or unique prefix
    pub id: String,
}

#[derive(Debug, Parser)]
pub struct MoveArgs {
    /// Task ID or unique prefix
    pub id: String,
    /// New due date (YYYY-MM-DD)
    pub date: String,
}

#[derive(Debug, Parser)]
pub struct ListArgs {
    /// all, completed or pending
    #[arg(short = 'f', long = "filter")]
    pub filter: Option<String>,
    /// priority or dueDate
    #[arg(short = 's', long = "sort")]
    pub sort: Option<String>,
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
    #[arg(long = "json")]
    pub json: bool,
    #[arg(long = "csv")]
    pub csv: bool,
}

#[derive(Debug, Parser)]
pub struct ShowArgs {
    pub id: String,
    #[arg(long = "json")]
    pub json: bool,
}

#[derive(Debug, Parser)]
pub struct CalendarArgs {
    /// Month to show (YYYY-MM); defaults to the current month
    #[arg(short = 'm', long = "month")]
    pub month: Option<String>,
}

#[derive(Debug, Parser)]
pub struct WatchArgs {
    /// Seconds between sweeps (overrides alerts.sweep_interval_secs)
    #[arg(short = 'i', long = "interval")]
    pub interval_secs: Option<u64>,
}

#[derive(Debug, Parser)]
pub struct CompletionArgs {
    pub shell: clap_complete::Shell,
}

#[derive(Debug, Parser)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub cmd: ConfigCmd,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCmd {
    List,
    Set(ConfigSetArgs),
    Get(ConfigGetArgs),
}

#[derive(Debug, Parser)]
pub struct ConfigSetArgs {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Parser)]
pub struct ConfigGetArgs {
    pub key: String,
}

pub async fn main() -> ExitCode {
    let cli = Cli::parse();
    let interactive = matches!(cli.cmd, Some(Commands::Tui))
        || (cli.cmd.is_none() && tui::is_tty());
    logging::init(interactive);

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::from(exit_status(&err))
        }
    }
}

/// 2 for input the user can correct, 1 for everything else.
fn exit_status(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<TaskdeckError>() {
        Some(e) if e.is_validation() => 2,
        _ => 1,
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let data_dir = cli.data_dir;
    match cli.cmd {
        None if tui::is_tty() => cmd_tui(data_dir),
        None => cmd_list(data_dir, &ListArgs::default_view()),
        Some(Commands::Completion(args)) => {
            let mut cmd = Cli::command();
            clap_complete::generate(args.shell, &mut cmd, "taskdeck", &mut std::io::stdout());
            Ok(ExitCode::SUCCESS)
        }
        Some(Commands::Config(args)) => cmd_config(args),
        Some(Commands::Add(args)) => cmd_add(data_dir, args),
        Some(Commands::Edit(args)) => cmd_edit(data_dir, args),
        Some(Commands::Delete(args)) => cmd_delete(data_dir, &args),
        Some(Commands::Toggle(args)) => cmd_toggle(data_dir, &args),
        Some(Commands::Move(args)) => cmd_move(data_dir, &args),
        Some(Commands::List(args)) => cmd_list(data_dir, &args),
        Some(Commands::Show(args)) => cmd_show(data_dir, &args),
        Some(Commands::Calendar(args)) => cmd_calendar(data_dir, &args),
        Some(Commands::Check) => cmd_check(data_dir),
        Some(Commands::Watch(args)) => cmd_watch(data_dir, &args).await,
        Some(Commands::Tui) => cmd_tui(data_dir),
        Some(Commands::Version) => Ok(cmd_version()),
    }
}

impl ListArgs {
    fn default_view() -> Self {
        Self {
            filter: None,
            sort: None,
            verbose: false,
            json: false,
            csv: false,
        }
    }
}

fn load_cfg() -> anyhow::Result<Config> {
    let (cfg, _paths) = config::load()?;
    Ok(cfg)
}

/// Builds the store the way every command sees it: config data dir unless
/// `--data-dir` was given.
pub fn open_store(cfg: &Config, data_dir: Option<PathBuf>) -> anyhow::Result<JsonFileStore> {
    let dir = match data_dir {
        Some(d) => d,
        None => config::expand_path(&cfg.storage.data_dir)?,
    };
    JsonFileStore::new(dir, &cfg.storage.key)
}

fn open_controller(cfg: &Config, data_dir: Option<PathBuf>) -> anyhow::Result<CliController> {
    let store = open_store(cfg, data_dir)?;
    let path = store.path();
    let mut ctl = TaskListController::new(
        store,
        NoView,
        MonthCalendar::default(),
        Box::new(SystemClock),
    )
    .with_context(|| format!("failed to load tasks from {}", path.display()))?;
    ctl.set_filter(cfg.view.default_filter);
    ctl.set_sort(cfg.view.default_sort);
    Ok(ctl)
}

fn cmd_config(args: ConfigArgs) -> anyhow::Result<ExitCode> {
    match args.cmd {
        ConfigCmd::List => {
            print!("{}", config::list_resolved_toml()?);
        }
        ConfigCmd::Set(set) => {
            config::set_value_string(&set.key, &set.value)?;
            println!("Set {} = {}", set.key, set.value);
        }
        ConfigCmd::Get(get) => match config::get_value_string(&get.key)? {
            Some(v) => println!("{v}"),
            None => anyhow::bail!(
                "configuration key '{}' not found - use 'taskdeck config list' to see available keys",
                get.key
            ),
        },
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_add(data_dir: Option<PathBuf>, args: AddArgs) -> anyhow::Result<ExitCode> {
    let cfg = load_cfg()?;
    let mut ctl = open_controller(&cfg, data_dir)?;
    let due_date = parse_date(&args.due)?;
    let priority: Priority = args.priority.parse()?;

    let outcome = ctl.dispatch(Command::Add {
        title: args.title,
        description: args.description,
        due_date,
        priority,
    })?;
    if let CommandOutcome::Created(task) = outcome {
        println!(
            "Added {} \"{}\" (due {}, {})",
            task.id,
            task.title,
            format_date(task.due_date),
            task.priority
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_edit(data_dir: Option<PathBuf>, args: EditArgs) -> anyhow::Result<ExitCode> {
    let cfg = load_cfg()?;
    let mut ctl = open_controller(&cfg, data_dir)?;
    let id = resolve_id(&ctl, &args.id)?;
    let current = ctl
        .begin_edit(&id)
        .ok_or_else(|| TaskdeckError::TaskNotFound(id.clone()))?;

    let due_date = match args.due.as_deref() {
        Some(raw) => {
            let d = parse_date(raw)?;
            if d < ctl.today() {
                return Err(TaskdeckError::PastDueDate(d).into());
            }
            d
        }
        None => current.due_date,
    };
    let priority = match args.priority.as_deref() {
        Some(raw) => raw.parse()?,
        None => current.priority,
    };

    ctl.dispatch(Command::Edit {
        id: id.clone(),
        title: args.title.unwrap_or(current.title),
        description: args.description.unwrap_or(current.description),
        due_date,
        priority,
    })?;
    println!("Updated {id}");
    Ok(ExitCode::SUCCESS)
}

fn cmd_delete(data_dir: Option<PathBuf>, args: &DeleteArgs) -> anyhow::Result<ExitCode> {
    let cfg = load_cfg()?;
    let mut ctl = open_controller(&cfg, data_dir)?;
    for pattern in &args.ids {
        match lookup_id(&ctl, pattern)? {
            Some(id) => {
                ctl.dispatch(Command::Delete { id: id.clone() })?;
                println!("Deleted {id}");
            }
            None => println!("No task matching '{pattern}'"),
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_toggle(data_dir: Option<PathBuf>, args: &IdArgs) -> anyhow::Result<ExitCode> {
    let cfg = load_cfg()?;
    let mut ctl = open_controller(&cfg, data_dir)?;
    let Some(id) = lookup_id(&ctl, &args.id)? else {
        println!("No task matching '{}'", args.id);
        return Ok(ExitCode::SUCCESS);
    };
    ctl.dispatch(Command::Toggle { id: id.clone() })?;
    let done = ctl.get(&id).is_some_and(|t| t.completed);
    println!(
        "{id} marked {}",
        if done { "completed" } else { "pending" }
    );
    Ok(ExitCode::SUCCESS)
}

fn cmd_move(data_dir: Option<PathBuf>, args: &MoveArgs) -> anyhow::Result<ExitCode> {
    let cfg = load_cfg()?;
    let mut ctl = open_controller(&cfg, data_dir)?;
    let id = resolve_id(&ctl, &args.id)?;
    let date = parse_date(&args.date)?;
    ctl.dispatch(calendar::CalendarInput::Drop {
        task_id: id.clone(),
        date,
    }
    .into())?;
    println!("Moved {id} to {}", format_date(date));
    Ok(ExitCode::SUCCESS)
}

fn cmd_list(data_dir: Option<PathBuf>, args: &ListArgs) -> anyhow::Result<ExitCode> {
    let cfg = load_cfg()?;
    let mut ctl = open_controller(&cfg, data_dir)?;
    if let Some(f) = args.filter.as_deref() {
        ctl.dispatch(Command::SetFilter(f.parse::<Filter>()?))?;
    }
    if let Some(s) = args.sort.as_deref() {
        ctl.dispatch(Command::SetSort(s.parse::<SortKey>()?))?;
    }
    let views = ctl.render_view();

    if args.json {
        let mut s = serde_json::to_string_pretty(&views)?;
        s.push('\n');
        print!("{s}");
        return Ok(ExitCode::SUCCESS);
    }

    if args.csv {
        let mut t = Table::new([
            "id",
            "title",
            "description",
            "dueDate",
            "priority",
            "completed",
            "status",
        ]);
        for v in &views {
            t.row([
                v.id.clone(),
                v.title.clone(),
                v.description.clone(),
                v.due_date.clone(),
                v.priority.as_str().to_owned(),
                v.completed.to_string(),
                v.status.as_str().to_owned(),
            ]);
        }
        t.print_csv()?;
        return Ok(ExitCode::SUCCESS);
    }

    if views.is_empty() {
        println!("No tasks found.");
        return Ok(ExitCode::SUCCESS);
    }

    let mut t = if args.verbose {
        Table::new(["", "ID", "PRIORITY", "DUE", "STATUS", "TITLE", "DESCRIPTION"])
    } else {
        Table::new(["", "ID", "PRIORITY", "DUE", "STATUS", "TITLE"])
    };
    for v in &views {
        let mut row = vec![
            check_mark(v, cfg.view.icons).to_owned(),
            v.id.clone(),
            v.priority_label.to_owned(),
            v.due_date.clone(),
            due_status_str(v.status).to_owned(),
            v.title.clone(),
        ];
        if args.verbose {
            row.push(if v.description.trim().is_empty() {
                "-".to_owned()
            } else {
                truncate(&v.description, 60)
            });
        }
        t.row(row);
    }
    t.print()?;
    Ok(ExitCode::SUCCESS)
}

fn cmd_show(data_dir: Option<PathBuf>, args: &ShowArgs) -> anyhow::Result<ExitCode> {
    let cfg = load_cfg()?;
    let ctl = open_controller(&cfg, data_dir)?;
    let id = resolve_id(&ctl, &args.id)?;
    let task = ctl
        .get(&id)
        .ok_or_else(|| TaskdeckError::TaskNotFound(id.clone()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(task)?);
        return Ok(ExitCode::SUCCESS);
    }
    print_task_details(task, &TaskView::new(task, ctl.today()));
    Ok(ExitCode::SUCCESS)
}

fn cmd_calendar(data_dir: Option<PathBuf>, args: &CalendarArgs) -> anyhow::Result<ExitCode> {
    let cfg = load_cfg()?;
    let ctl = open_controller(&cfg, data_dir)?;
    let today = ctl.today();
    let (year, month) = match args.month.as_deref() {
        Some(m) => calendar::parse_month(m)?,
        None => (today.year(), today.month()),
    };
    print!(
        "{}",
        calendar::month_grid(ctl.calendar(), year, month, today)?
    );
    Ok(ExitCode::SUCCESS)
}

fn cmd_check(data_dir: Option<PathBuf>) -> anyhow::Result<ExitCode> {
    let cfg = load_cfg()?;
    let ctl = open_controller(&cfg, data_dir)?;
    let mut alerter = TerminalAlerter {
        notifications: cfg.alerts.notifications,
        icons: cfg.view.icons,
    };
    let report = ctl.sweep(&mut alerter);
    if report.overdue == 0 && report.due_soon == 0 {
        println!("No overdue or due-soon tasks.");
    }
    Ok(ExitCode::SUCCESS)
}

async fn cmd_watch(data_dir: Option<PathBuf>, args: &WatchArgs) -> anyhow::Result<ExitCode> {
    let cfg = load_cfg()?;
    let mut ctl = open_controller(&cfg, data_dir)?;
    let secs = args
        .interval_secs
        .unwrap_or(cfg.alerts.sweep_interval_secs)
        .max(1);
    let mut alerter = TerminalAlerter {
        notifications: cfg.alerts.notifications,
        icons: cfg.view.icons,
    };

    println!("Watching {} task(s), sweeping every {secs}s. Press Ctrl+C to stop.", ctl.tasks().len());
    alerts::run_periodic(Duration::from_secs(secs), || {
        ctl.reload()?;
        Ok(ctl.sweep(&mut alerter))
    })
    .await?;
    Ok(ExitCode::SUCCESS)
}

fn cmd_tui(data_dir: Option<PathBuf>) -> anyhow::Result<ExitCode> {
    let cfg = load_cfg()?;
    let store = open_store(&cfg, data_dir)?;
    tui::app::run(cfg, store)?;
    Ok(ExitCode::SUCCESS)
}

fn cmd_version() -> ExitCode {
    println!("taskdeck version {}", env!("CARGO_PKG_VERSION"));
    println!("  rust: {}", rustc_version_runtime::version());
    println!(
        "  os/arch: {}/{}",
        std::env::consts::OS,
        std::env::consts::ARCH
    );
    ExitCode::SUCCESS
}

/// Exact ID, or a prefix matching exactly one task.
fn lookup_id(ctl: &CliController, pattern: &str) -> anyhow::Result<Option<String>> {
    let pattern = pattern.trim();
    if pattern.is_empty() {
        anyhow::bail!("task ID is required");
    }
    if ctl.get(pattern).is_some() {
        return Ok(Some(pattern.to_owned()));
    }
    let matches: Vec<&Task> = ctl
        .tasks()
        .iter()
        .filter(|t| t.id.starts_with(pattern))
        .collect();
    match matches.as_slice() {
        [] => Ok(None),
        [one] => Ok(Some(one.id.clone())),
        many => Err(TaskdeckError::Other(format!(
            "'{pattern}' matches {} tasks: {}",
            many.len(),
            many.iter()
                .map(|t| t.id.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ))
        .into()),
    }
}

fn resolve_id(ctl: &CliController, pattern: &str) -> anyhow::Result<String> {
    lookup_id(ctl, pattern)?
        .ok_or_else(|| TaskdeckError::TaskNotFound(pattern.trim().to_owned()).into())
}

fn print_task_details(task: &Task, view: &TaskView) {
    println!("ID:          {}", task.id);
    println!("Title:       {}", task.title);
    if !task.description.trim().is_empty() {
        println!("Description: {}", task.description);
    }
    println!("Due:         {}", view.due_date);
    println!("Priority:    {}", view.priority_label);
    println!(
        "Completed:   {}",
        if task.completed { "yes" } else { "no" }
    );
    if view.status != DueStatus::None {
        println!("Status:      {}", due_status_str(view.status));
    }
}

fn check_mark(view: &TaskView, icons: bool) -> &'static str {
    match (view.completed, icons) {
        (true, true) => "✓",
        (false, true) => "○",
        (true, false) => "[x]",
        (false, false) => "[ ]",
    }
}

fn due_status_str(status: DueStatus) -> &'static str {
    match status {
        DueStatus::None => "-",
        DueStatus::DueSoon => "due soon",
        DueStatus::Overdue => "overdue",
    }
}

fn truncate(s: &str, max: usize) -> String {
    let mut out: String = s.chars().take(max).collect();
    if s.chars().count() > max {
        out.push_str("...");
    }
    out
}
