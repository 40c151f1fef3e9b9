use std::path::PathBuf;

use chrono::Utc;

use crate::content::{ContentError, FETCH_ERROR_MESSAGE};
use crate::events::StatePayload;
use crate::models::{is_valid_time, Category, DailyContent, Priority, Settings, SettingsFile, Task};
use crate::state::TaskStore;
use crate::storage::{Storage, StorageError, SCHEMA_VERSION};

pub const RESET_CONFIRM_PROMPT: &str =
    "Are you sure you want to start a new day? This will clear all current tasks.";

#[derive(Debug, PartialEq, Eq)]
pub struct CommandResult<T> {
    pub ok: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupEntry {
    pub name: String,
    pub modified_at: i64,
}

/// What a front end provides to the commands: where data lives, how to ask the user, and where
/// state updates go.
pub trait CommandCtx {
    fn data_dir(&self) -> Result<PathBuf, StorageError>;
    fn confirm(&self, prompt: &str) -> bool;
    fn emit_state_updated(&self, payload: StatePayload);
}

pub fn ok<T>(data: T) -> CommandResult<T> {
    CommandResult {
        ok: true,
        data: Some(data),
        error: None,
    }
}

pub fn err<T>(message: &str) -> CommandResult<T> {
    CommandResult {
        ok: false,
        data: None,
        error: Some(message.to_string()),
    }
}

fn open_storage(ctx: &impl CommandCtx) -> Result<Storage, StorageError> {
    let storage = Storage::new(ctx.data_dir()?);
    storage.ensure_dirs()?;
    Ok(storage)
}

fn persist(
    ctx: &impl CommandCtx,
    store: &TaskStore,
    categories: &[Category],
) -> Result<(), StorageError> {
    let storage = open_storage(ctx)?;
    for &category in categories {
        store.save(&storage, category)?;
    }
    ctx.emit_state_updated(StatePayload::from_store(store));
    Ok(())
}

fn storage_err<T>(error: StorageError) -> CommandResult<T> {
    log::error!("storage error: {error}");
    err(&format!("storage error: {error}"))
}

/// Loads both lists and the settings. Unreadable data falls back to empty lists and defaults.
pub fn load_state(ctx: &impl CommandCtx) -> CommandResult<(TaskStore, Settings)> {
    let storage = match open_storage(ctx) {
        Ok(storage) => storage,
        Err(error) => return storage_err(error),
    };
    let store = TaskStore::load(&storage);
    let settings = match storage.load_settings() {
        Ok(file) => file.settings,
        Err(StorageError::Io(io)) if io.kind() == std::io::ErrorKind::NotFound => {
            Settings::default()
        }
        Err(error) => {
            log::warn!("ignoring unreadable settings error={error}");
            Settings::default()
        }
    };
    ok((store, settings))
}

pub fn save_settings(ctx: &impl CommandCtx, settings: &Settings) -> CommandResult<bool> {
    let storage = match open_storage(ctx) {
        Ok(storage) => storage,
        Err(error) => return storage_err(error),
    };
    let file = SettingsFile {
        schema_version: SCHEMA_VERSION,
        settings: settings.clone(),
    };
    if let Err(error) = storage.save_settings(&file) {
        return storage_err(error);
    }
    ok(true)
}

/// Adds a task. Blank text is a silent no-op (`ok(None)`); a malformed time is an error.
pub fn add_task(
    ctx: &impl CommandCtx,
    store: &mut TaskStore,
    category: Category,
    text: &str,
    time: &str,
    priority: Priority,
) -> CommandResult<Option<Task>> {
    let time = time.trim();
    if !is_valid_time(time) {
        return err(&format!("invalid time `{time}`, expected HH:MM"));
    }
    let Some(task) = store.add(category, text, time, priority) else {
        log::debug!("ignored blank task submission category={category:?}");
        return ok(None);
    };
    if let Err(error) = persist(ctx, store, &[category]) {
        return storage_err(error);
    }
    log::info!(
        "task added category={category:?} id={} priority={:?}",
        task.id,
        task.priority
    );
    ok(Some(task))
}

pub fn toggle_task(
    ctx: &impl CommandCtx,
    store: &mut TaskStore,
    category: Category,
    task_id: &str,
) -> CommandResult<Task> {
    let Some(task) = store.toggle(category, task_id) else {
        return err("task not found");
    };
    if let Err(error) = persist(ctx, store, &[category]) {
        return storage_err(error);
    }
    ok(task)
}

pub fn delete_task(
    ctx: &impl CommandCtx,
    store: &mut TaskStore,
    category: Category,
    task_id: &str,
) -> CommandResult<bool> {
    if !store.delete(category, task_id) {
        return err("task not found");
    }
    if let Err(error) = persist(ctx, store, &[category]) {
        return storage_err(error);
    }
    log::info!("task deleted category={category:?} id={task_id}");
    ok(true)
}

/// Clears both lists. Returns `ok(false)` when the user declines.
pub fn reset_all(
    ctx: &impl CommandCtx,
    store: &mut TaskStore,
    settings: &mut Settings,
) -> CommandResult<bool> {
    if settings.confirm_reset && !ctx.confirm(RESET_CONFIRM_PROMPT) {
        return ok(false);
    }
    let storage = match open_storage(ctx) {
        Ok(storage) => storage,
        Err(error) => return storage_err(error),
    };
    let has_tasks = Category::ALL
        .iter()
        .any(|&category| !store.tasks(category).is_empty());
    if settings.backup_on_reset && has_tasks {
        match storage.create_backup(&store.snapshot()) {
            Ok(name) => log::info!("board backed up before reset name={name}"),
            Err(error) => return storage_err(error),
        }
    }

    // Record the reset before clearing so a failed write leaves the board untouched.
    let mut updated = settings.clone();
    updated.last_reset_at = Some(Utc::now().timestamp());
    let file = SettingsFile {
        schema_version: SCHEMA_VERSION,
        settings: updated.clone(),
    };
    if let Err(error) = storage.save_settings(&file) {
        return storage_err(error);
    }

    store.reset_all();
    *settings = updated;
    if let Err(error) = persist(ctx, store, &Category::ALL) {
        return storage_err(error);
    }
    log::info!("board reset");
    ok(true)
}

pub fn list_backups(ctx: &impl CommandCtx) -> CommandResult<Vec<BackupEntry>> {
    let storage = match open_storage(ctx) {
        Ok(storage) => storage,
        Err(error) => return storage_err(error),
    };
    match storage.list_backups() {
        Ok(list) => ok(list
            .into_iter()
            .map(|(name, modified_at)| BackupEntry { name, modified_at })
            .collect()),
        Err(error) => storage_err(error),
    }
}

pub fn restore_backup(
    ctx: &impl CommandCtx,
    store: &mut TaskStore,
    filename: &str,
) -> CommandResult<bool> {
    let storage = match open_storage(ctx) {
        Ok(storage) => storage,
        Err(error) => return storage_err(error),
    };
    let snapshot = match storage.restore_backup(filename.trim()) {
        Ok(snapshot) => snapshot,
        Err(error) => return storage_err(error),
    };
    store.replace(snapshot);
    // Re-write so the on-disk order matches the re-sorted lists.
    if let Err(error) = persist(ctx, store, &Category::ALL) {
        return storage_err(error);
    }
    log::info!("board restored from backup name={filename}");
    ok(true)
}

/// Collapses any fetch failure into the single user-facing message, logging the detail.
pub fn content_result(result: Result<DailyContent, ContentError>) -> CommandResult<DailyContent> {
    match result {
        Ok(content) => ok(content),
        Err(error) => {
            log::error!("error fetching daily content: {error}");
            err(FETCH_ERROR_MESSAGE)
        }
    }
}

#[cfg(feature = "app")]
pub async fn fetch_daily_content(settings: &Settings) -> CommandResult<DailyContent> {
    content_result(crate::content::fetch_daily_content(settings).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;

    struct TestCtx {
        root: tempfile::TempDir,
        data_dir_error: Option<String>,
        confirm_answer: bool,
        prompts: Mutex<Vec<String>>,
        emitted: Mutex<Vec<StatePayload>>,
    }

    impl TestCtx {
        fn new() -> Self {
            Self {
                root: tempfile::tempdir().unwrap(),
                data_dir_error: None,
                confirm_answer: true,
                prompts: Mutex::new(Vec::new()),
                emitted: Mutex::new(Vec::new()),
            }
        }

        fn with_data_dir_error(message: &str) -> Self {
            let mut ctx = Self::new();
            ctx.data_dir_error = Some(message.to_string());
            ctx
        }

        fn declining() -> Self {
            let mut ctx = Self::new();
            ctx.confirm_answer = false;
            ctx
        }

        fn root_path(&self) -> &std::path::Path {
            self.root.path()
        }

        fn storage(&self) -> Storage {
            Storage::new(self.root.path().to_path_buf())
        }
    }

    impl CommandCtx for TestCtx {
        fn data_dir(&self) -> Result<PathBuf, StorageError> {
            if let Some(message) = &self.data_dir_error {
                return Err(StorageError::Io(std::io::Error::other(message.clone())));
            }
            Ok(self.root.path().to_path_buf())
        }

        fn confirm(&self, prompt: &str) -> bool {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.confirm_answer
        }

        fn emit_state_updated(&self, payload: StatePayload) {
            self.emitted.lock().unwrap().push(payload);
        }
    }

    #[test]
    fn ok_and_err_helpers_construct_expected_shape() {
        let r = ok(123);
        assert!(r.ok);
        assert_eq!(r.data, Some(123));
        assert_eq!(r.error, None);

        let r: CommandResult<i32> = err("nope");
        assert!(!r.ok);
        assert_eq!(r.data, None);
        assert_eq!(r.error, Some("nope".to_string()));
    }

    #[test]
    fn load_state_defaults_on_fresh_directory() {
        let ctx = TestCtx::new();
        let result = load_state(&ctx);
        assert!(result.ok);
        let (store, settings) = result.data.unwrap();
        assert_eq!(store, TaskStore::default());
        assert_eq!(settings, Settings::default());
        assert!(ctx.root_path().join("backups").is_dir());
    }

    #[test]
    fn load_state_swallows_corrupt_files() {
        let ctx = TestCtx::new();
        fs::write(ctx.root_path().join("personalTodos.json"), "[oops").unwrap();
        fs::write(ctx.root_path().join("settings.json"), "{").unwrap();
        let (store, settings) = load_state(&ctx).data.unwrap();
        assert!(store.tasks(Category::Personal).is_empty());
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn load_state_reports_data_dir_error() {
        let ctx = TestCtx::with_data_dir_error("no home");
        let result = load_state(&ctx);
        assert!(!result.ok);
        assert!(result.error.unwrap().contains("no home"));
    }

    #[test]
    fn add_persists_only_the_touched_category() {
        let ctx = TestCtx::new();
        let mut store = TaskStore::default();

        let result = add_task(&ctx, &mut store, Category::Personal, "Buy milk", "08:00", Priority::High);
        let task = result.data.unwrap().unwrap();
        assert_eq!(task.time, "08:00");

        assert_eq!(ctx.storage().load_tasks(Category::Personal).unwrap(), vec![task]);
        assert!(!ctx.root_path().join("professionalTodos.json").exists());
        assert_eq!(ctx.emitted.lock().unwrap().len(), 1);
    }

    #[test]
    fn add_ignores_blank_text_without_writing() {
        let ctx = TestCtx::new();
        let mut store = TaskStore::default();
        let result = add_task(&ctx, &mut store, Category::Personal, "  ", "", Priority::Medium);
        assert!(result.ok);
        assert_eq!(result.data, Some(None));
        assert!(!ctx.root_path().join("personalTodos.json").exists());
        assert!(ctx.emitted.lock().unwrap().is_empty());
    }

    #[test]
    fn add_rejects_malformed_time() {
        let ctx = TestCtx::new();
        let mut store = TaskStore::default();
        let result = add_task(&ctx, &mut store, Category::Personal, "x", "25:00", Priority::Low);
        assert!(!result.ok);
        assert!(store.tasks(Category::Personal).is_empty());
    }

    #[test]
    fn add_surfaces_storage_error() {
        let ctx = TestCtx::with_data_dir_error("read-only");
        let mut store = TaskStore::default();
        let result = add_task(&ctx, &mut store, Category::Personal, "x", "", Priority::Low);
        assert!(!result.ok);
        assert!(result.error.unwrap().starts_with("storage error"));
    }

    #[test]
    fn toggle_and_delete_persist_and_reload() {
        let ctx = TestCtx::new();
        let mut store = TaskStore::default();
        let milk = add_task(&ctx, &mut store, Category::Professional, "Buy milk", "08:00", Priority::High)
            .data
            .unwrap()
            .unwrap();
        let boss = add_task(&ctx, &mut store, Category::Professional, "Email boss", "09:00", Priority::Medium)
            .data
            .unwrap()
            .unwrap();

        let toggled = toggle_task(&ctx, &mut store, Category::Professional, &milk.id);
        assert!(toggled.data.unwrap().completed);

        let (reloaded, _) = load_state(&ctx).data.unwrap();
        let tasks = reloaded.tasks(Category::Professional);
        assert_eq!(tasks[0].id, milk.id);
        assert!(tasks[0].completed);
        assert_eq!(tasks[1].id, boss.id);

        assert_eq!(delete_task(&ctx, &mut store, Category::Professional, &boss.id).data, Some(true));
        let (reloaded, _) = load_state(&ctx).data.unwrap();
        assert_eq!(reloaded, store);

        assert!(!toggle_task(&ctx, &mut store, Category::Professional, "missing").ok);
        assert!(!delete_task(&ctx, &mut store, Category::Personal, &milk.id).ok);
    }

    #[test]
    fn reset_clears_both_lists_and_backs_up() {
        let ctx = TestCtx::new();
        let mut store = TaskStore::default();
        let mut settings = Settings::default();
        add_task(&ctx, &mut store, Category::Personal, "a", "", Priority::High);
        add_task(&ctx, &mut store, Category::Professional, "b", "", Priority::Low);

        let result = reset_all(&ctx, &mut store, &mut settings);
        assert_eq!(result.data, Some(true));
        assert_eq!(ctx.prompts.lock().unwrap().as_slice(), [RESET_CONFIRM_PROMPT]);
        assert_eq!(store, TaskStore::default());
        assert!(settings.last_reset_at.is_some());

        let (reloaded, saved_settings) = load_state(&ctx).data.unwrap();
        assert_eq!(reloaded, TaskStore::default());
        assert_eq!(saved_settings.last_reset_at, settings.last_reset_at);

        let backups = list_backups(&ctx).data.unwrap();
        assert_eq!(backups.len(), 1);

        assert_eq!(restore_backup(&ctx, &mut store, &backups[0].name).data, Some(true));
        assert_eq!(store.tasks(Category::Personal)[0].text, "a");
        assert_eq!(store.tasks(Category::Professional)[0].text, "b");
        let (reloaded, _) = load_state(&ctx).data.unwrap();
        assert_eq!(reloaded, store);
    }

    #[test]
    fn reset_keeps_tasks_when_settings_cannot_be_written() {
        let ctx = TestCtx::new();
        let mut store = TaskStore::default();
        let mut settings = Settings {
            backup_on_reset: false,
            ..Settings::default()
        };
        add_task(&ctx, &mut store, Category::Personal, "survive", "", Priority::High);
        let before = store.clone();
        // A directory in place of settings.json makes the final rename fail.
        fs::create_dir_all(ctx.root_path().join("settings.json").join("blocked")).unwrap();

        let result = reset_all(&ctx, &mut store, &mut settings);
        assert!(!result.ok);
        assert!(result.error.is_some());
        assert_eq!(store, before);
        assert!(settings.last_reset_at.is_none());
        let saved = ctx.storage().load_tasks(Category::Personal).unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].text, "survive");
    }

    #[test]
    fn reset_declined_changes_nothing() {
        let ctx = TestCtx::declining();
        let mut store = TaskStore::default();
        let mut settings = Settings::default();
        add_task(&ctx, &mut store, Category::Personal, "keep", "", Priority::Medium);
        let before = store.clone();

        let result = reset_all(&ctx, &mut store, &mut settings);
        assert!(result.ok);
        assert_eq!(result.data, Some(false));
        assert_eq!(store, before);
        assert!(settings.last_reset_at.is_none());
        assert_eq!(ctx.storage().load_tasks(Category::Personal).unwrap().len(), 1);
    }

    #[test]
    fn reset_without_confirmation_or_backup() {
        let ctx = TestCtx::declining();
        let mut store = TaskStore::default();
        let mut settings = Settings {
            confirm_reset: false,
            backup_on_reset: false,
            ..Settings::default()
        };
        add_task(&ctx, &mut store, Category::Personal, "gone", "", Priority::Medium);

        assert_eq!(reset_all(&ctx, &mut store, &mut settings).data, Some(true));
        assert!(ctx.prompts.lock().unwrap().is_empty());
        assert!(store.tasks(Category::Personal).is_empty());
        assert!(list_backups(&ctx).data.unwrap().is_empty());
    }

    #[test]
    fn reset_of_empty_board_skips_backup() {
        let ctx = TestCtx::new();
        let mut store = TaskStore::default();
        let mut settings = Settings::default();
        assert_eq!(reset_all(&ctx, &mut store, &mut settings).data, Some(true));
        assert!(list_backups(&ctx).data.unwrap().is_empty());
    }

    #[test]
    fn restore_missing_backup_is_an_error() {
        let ctx = TestCtx::new();
        let mut store = TaskStore::default();
        let result = restore_backup(&ctx, &mut store, "board-nope.json");
        assert!(!result.ok);
    }

    #[test]
    fn settings_roundtrip_through_commands() {
        let ctx = TestCtx::new();
        let settings = Settings {
            model: "gemini-custom".to_string(),
            ..Settings::default()
        };
        assert!(save_settings(&ctx, &settings).ok);
        let (_, loaded) = load_state(&ctx).data.unwrap();
        assert_eq!(loaded.model, "gemini-custom");
    }

    #[test]
    fn content_result_hides_error_detail() {
        let result = content_result(Err(ContentError::MissingField("thoughtOfTheDay")));
        assert!(!result.ok);
        assert_eq!(result.error.as_deref(), Some(FETCH_ERROR_MESSAGE));

        let result = content_result(Err(ContentError::Http {
            status: 500,
            body: "boom".to_string(),
        }));
        assert_eq!(result.error.as_deref(), Some(FETCH_ERROR_MESSAGE));
    }
}
