use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::{JoinError, JoinHandle};

use dayboard_lib::commands::{self, CommandCtx, CommandResult};
use dayboard_lib::content::{self, ContentError};
use dayboard_lib::events::{StatePayload, EVENT_STATE_UPDATED};
use dayboard_lib::logging::init_logging;
use dayboard_lib::render::{
    render_board, render_category, render_last_reset, render_panel, render_settings, short_id,
};
use dayboard_lib::storage::StorageError;
use dayboard_lib::{
    Category, ContentPanel, DailyContent, PanelView, Priority, Settings, TaskStore,
};

const APP_DIR_NAME: &str = "dayboard";

#[derive(Parser)]
#[command(name = "dayboard")]
#[command(version)]
#[command(about = "Personal and professional to-do lists plus a daily content panel")]
struct Cli {
    /// Directory holding task lists, settings, backups and logs
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(flatten)]
    Board(BoardCommand),
    /// Fetch today's content once and print it
    Content,
    /// Interactive board: the page stays open and content loads in the background
    Session,
}

#[derive(Subcommand, Debug, Clone)]
enum BoardCommand {
    /// Show both task lists
    List,
    /// Add a task to a category
    Add(AddArgs),
    /// Flip a task between done and not done
    Toggle {
        #[arg(value_parser = parse_category)]
        category: Category,
        /// Task id or unambiguous id prefix
        id: String,
    },
    /// Remove a task
    Delete {
        #[arg(value_parser = parse_category)]
        category: Category,
        /// Task id or unambiguous id prefix
        id: String,
    },
    /// Start a new day: clear both lists
    Reset {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// List board snapshots taken before resets
    Backups,
    /// Replace both lists with a backup snapshot
    Restore {
        /// Backup file name as shown by `backups`
        name: String,
    },
    /// Show settings, or change them with the flags below
    Config(ConfigArgs),
}

#[derive(Args, Debug, Clone, Default)]
struct ConfigArgs {
    /// Gemini API key; an empty value clears it
    #[arg(long)]
    api_key: Option<String>,
    /// Model name used for daily content
    #[arg(long)]
    model: Option<String>,
    /// Request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,
    /// Ask before clearing both lists (true/false)
    #[arg(long, action = clap::ArgAction::Set)]
    confirm_reset: Option<bool>,
    /// Snapshot the board before a reset (true/false)
    #[arg(long, action = clap::ArgAction::Set)]
    backup_on_reset: Option<bool>,
}

impl ConfigArgs {
    /// Applies the given flags; returns false when none were given.
    fn apply(self, settings: &mut Settings) -> bool {
        let mut changed = false;
        if let Some(key) = self.api_key {
            settings.gemini_api_key = key.trim().to_string();
            changed = true;
        }
        if let Some(model) = self.model.filter(|m| !m.trim().is_empty()) {
            settings.model = model.trim().to_string();
            changed = true;
        }
        if let Some(secs) = self.timeout.filter(|&secs| secs > 0) {
            settings.request_timeout_secs = secs;
            changed = true;
        }
        if let Some(value) = self.confirm_reset {
            settings.confirm_reset = value;
            changed = true;
        }
        if let Some(value) = self.backup_on_reset {
            settings.backup_on_reset = value;
            changed = true;
        }
        changed
    }
}

#[derive(Args, Debug, Clone)]
struct AddArgs {
    /// `personal` or `professional`
    #[arg(value_parser = parse_category)]
    category: Category,
    /// Task text
    #[arg(required = true, num_args = 1..)]
    text: Vec<String>,
    /// Optional time, HH:MM
    #[arg(short, long, default_value = "")]
    time: String,
    /// high, medium or low
    #[arg(short, long, value_parser = parse_priority, default_value = "medium")]
    priority: Priority,
}

/// One line typed into a session.
#[derive(Parser)]
#[command(no_binary_name = true)]
struct SessionLine {
    #[command(subcommand)]
    action: SessionAction,
}

#[derive(Subcommand, Debug)]
enum SessionAction {
    #[command(flatten)]
    Board(BoardCommand),
    /// Fetch new daily content
    #[command(alias = "content")]
    Refresh,
    /// Leave the session
    #[command(alias = "exit")]
    Quit,
}

fn parse_category(value: &str) -> Result<Category, String> {
    Category::parse(value).ok_or_else(|| format!("unknown category `{value}`"))
}

fn parse_priority(value: &str) -> Result<Priority, String> {
    Priority::parse(value).ok_or_else(|| format!("unknown priority `{value}`"))
}

struct CliCtx {
    data_dir: PathBuf,
    assume_yes: bool,
    can_prompt: bool,
}

impl CommandCtx for CliCtx {
    fn data_dir(&self) -> Result<PathBuf, StorageError> {
        Ok(self.data_dir.clone())
    }

    fn confirm(&self, prompt: &str) -> bool {
        if self.assume_yes {
            return true;
        }
        if !self.can_prompt {
            println!("{prompt}\nRun `reset --yes` to confirm.");
            return false;
        }
        print!("{prompt} [y/N] ");
        let _ = io::stdout().flush();
        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
    }

    fn emit_state_updated(&self, payload: StatePayload) {
        log::debug!(
            "{EVENT_STATE_UPDATED} personal={} professional={}",
            payload.personal.len(),
            payload.professional.len()
        );
    }
}

fn resolve_data_dir(flag: Option<PathBuf>) -> PathBuf {
    if let Some(dir) = flag {
        return dir;
    }
    if let Some(dir) = std::env::var_os("DAYBOARD_HOME").filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }
    dirs::data_dir()
        .map(|dir| dir.join(APP_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(format!(".{APP_DIR_NAME}")))
}

/// Prints a failed command to stderr; returns whether it succeeded.
fn report<T>(result: &CommandResult<T>) -> bool {
    if let Some(error) = &result.error {
        eprintln!("error: {error}");
    }
    result.ok
}

fn resolve_id(store: &TaskStore, category: Category, id: &str) -> Option<String> {
    let resolved = store.resolve_id(category, id);
    if resolved.is_none() {
        eprintln!(
            "error: no single {} task matches `{id}`",
            category.label().to_lowercase()
        );
    }
    resolved
}

fn execute(
    data_dir: &Path,
    can_prompt: bool,
    store: &mut TaskStore,
    settings: &mut Settings,
    command: BoardCommand,
) -> bool {
    let ctx = CliCtx {
        data_dir: data_dir.to_path_buf(),
        assume_yes: matches!(command, BoardCommand::Reset { yes: true }),
        can_prompt,
    };
    match command {
        BoardCommand::List => {
            print!("{}", render_board(store));
            println!("\n{}", render_last_reset(settings.last_reset_at));
            true
        }
        BoardCommand::Add(args) => {
            let text = args.text.join(" ");
            let result =
                commands::add_task(&ctx, store, args.category, &text, &args.time, args.priority);
            if let Some(Some(task)) = &result.data {
                println!("added {} ({})", task.text, short_id(&task.id));
                print!("{}", render_category(store, args.category));
            }
            report(&result)
        }
        BoardCommand::Toggle { category, id } => {
            let Some(id) = resolve_id(store, category, &id) else {
                return false;
            };
            let result = commands::toggle_task(&ctx, store, category, &id);
            if result.ok {
                print!("{}", render_category(store, category));
            }
            report(&result)
        }
        BoardCommand::Delete { category, id } => {
            let Some(id) = resolve_id(store, category, &id) else {
                return false;
            };
            let result = commands::delete_task(&ctx, store, category, &id);
            if result.ok {
                print!("{}", render_category(store, category));
            }
            report(&result)
        }
        BoardCommand::Reset { .. } => {
            let result = commands::reset_all(&ctx, store, settings);
            match result.data {
                Some(true) => println!("New day started. All tasks cleared."),
                Some(false) => println!("Reset cancelled."),
                None => {}
            }
            report(&result)
        }
        BoardCommand::Backups => {
            let result = commands::list_backups(&ctx);
            if let Some(entries) = &result.data {
                if entries.is_empty() {
                    println!("No backups yet.");
                }
                for entry in entries {
                    println!("{}", entry.name);
                }
            }
            report(&result)
        }
        BoardCommand::Restore { name } => {
            let result = commands::restore_backup(&ctx, store, &name);
            if result.ok {
                print!("{}", render_board(store));
            }
            report(&result)
        }
        BoardCommand::Config(args) => {
            let mut updated = settings.clone();
            if !args.apply(&mut updated) {
                print!("{}", render_settings(settings));
                return true;
            }
            let result = commands::save_settings(&ctx, &updated);
            if result.ok {
                *settings = updated;
                print!("{}", render_settings(settings));
            }
            report(&result)
        }
    }
}

type FetchOutcome = Result<DailyContent, ContentError>;

fn start_refresh(
    panel: &mut ContentPanel,
    inflight: &mut Option<JoinHandle<FetchOutcome>>,
    settings: &Settings,
) {
    if !panel.begin_refresh() {
        println!("Content is already refreshing.");
        return;
    }
    // Environment overrides stay out of settings.json.
    let settings = settings.clone().with_env_overrides();
    *inflight = Some(tokio::spawn(async move {
        content::fetch_daily_content(&settings).await
    }));
    println!("Refreshing daily content...");
}

async fn join_inflight(
    inflight: &mut Option<JoinHandle<FetchOutcome>>,
) -> Result<FetchOutcome, JoinError> {
    match inflight.as_mut() {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

fn prompt() {
    print!("> ");
    let _ = io::stdout().flush();
}

async fn run_session(data_dir: &Path, mut store: TaskStore, mut settings: Settings) {
    let mut panel = ContentPanel::new();
    let mut inflight: Option<JoinHandle<FetchOutcome>> = None;

    print!("{}", render_board(&store));
    println!();
    start_refresh(&mut panel, &mut inflight, &settings);
    println!("Commands: list, add, toggle, delete, reset, backups, restore, config, refresh, quit");
    prompt();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(error) => {
                        log::error!("failed to read session input: {error}");
                        break;
                    }
                };
                let words: Vec<&str> = line.split_whitespace().collect();
                if words.is_empty() {
                    prompt();
                    continue;
                }
                match SessionLine::try_parse_from(words) {
                    Ok(parsed) => match parsed.action {
                        SessionAction::Quit => break,
                        SessionAction::Refresh => {
                            start_refresh(&mut panel, &mut inflight, &settings);
                        }
                        SessionAction::Board(command) => {
                            execute(data_dir, false, &mut store, &mut settings, command);
                        }
                    },
                    Err(error) => {
                        let _ = error.print();
                    }
                }
                prompt();
            }
            joined = join_inflight(&mut inflight) => {
                inflight = None;
                let outcome = joined.unwrap_or_else(|error| {
                    Err(ContentError::Transport(format!("fetch task failed: {error}")))
                });
                panel.complete(outcome);
                println!();
                print!("{}", render_panel(panel.view()));
                prompt();
            }
        }
    }

    if let Some(handle) = inflight {
        handle.abort();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let data_dir = resolve_data_dir(cli.data_dir);

    let _logger = match init_logging(&data_dir) {
        Ok(handle) => Some(handle),
        Err(error) => {
            eprintln!("logging disabled: {error}");
            None
        }
    };

    let startup = CliCtx {
        data_dir: data_dir.clone(),
        assume_yes: false,
        can_prompt: true,
    };
    let loaded = commands::load_state(&startup);
    if !report(&loaded) {
        return ExitCode::FAILURE;
    }
    let Some((mut store, mut settings)) = loaded.data else {
        return ExitCode::FAILURE;
    };

    let success = match cli.command.unwrap_or(Command::Board(BoardCommand::List)) {
        Command::Board(command) => execute(&data_dir, true, &mut store, &mut settings, command),
        Command::Content => {
            let result = commands::fetch_daily_content(&settings.clone().with_env_overrides()).await;
            if let Some(content) = &result.data {
                print!("{}", render_panel(PanelView::Ready { content, error: None }));
            }
            report(&result)
        }
        Command::Session => {
            run_session(&data_dir, store, settings).await;
            true
        }
    };

    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
