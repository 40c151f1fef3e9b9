use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::models::{BoardSnapshot, Category, SettingsFile, StoredTasks, Task, TasksFile};

pub const SCHEMA_VERSION: u32 = 1;

const SETTINGS_KEY: &str = "settings";
const BACKUP_DIR: &str = "backups";
const BACKUP_PREFIX: &str = "board-";
const BACKUP_LIMIT: usize = 5;

#[derive(Debug)]
pub enum StorageError {
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Io(err) => write!(f, "io error: {err}"),
            StorageError::Json(err) => write!(f, "json error: {err}"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<std::io::Error> for StorageError {
    fn from(value: std::io::Error) -> Self {
        StorageError::Io(value)
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(value: serde_json::Error) -> Self {
        StorageError::Json(value)
    }
}

/// File-backed key-value store. Each key is one `<key>.json` file under `root`.
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn ensure_dirs(&self) -> Result<(), StorageError> {
        fs::create_dir_all(self.root.join(BACKUP_DIR))?;
        Ok(())
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }

    /// Reads one category snapshot. A missing file is an empty list; a malformed one is an error
    /// the caller is expected to swallow.
    pub fn load_tasks(&self, category: Category) -> Result<Vec<Task>, StorageError> {
        let path = self.key_path(category.storage_key());
        if !path.exists() {
            return Ok(Vec::new());
        }
        let stored: StoredTasks = self.load_json(path)?;
        Ok(stored.into_tasks())
    }

    pub fn save_tasks(&self, category: Category, tasks: &[Task]) -> Result<(), StorageError> {
        let data = TasksFile {
            schema_version: SCHEMA_VERSION,
            tasks: tasks.to_vec(),
        };
        self.write_atomic(self.key_path(category.storage_key()), &data)
    }

    pub fn load_settings(&self) -> Result<SettingsFile, StorageError> {
        self.load_json(self.key_path(SETTINGS_KEY))
    }

    pub fn save_settings(&self, data: &SettingsFile) -> Result<(), StorageError> {
        self.write_atomic(self.key_path(SETTINGS_KEY), data)
    }

    fn load_json<T: DeserializeOwned>(&self, path: PathBuf) -> Result<T, StorageError> {
        let mut file = File::open(path)?;
        let mut buf = String::new();
        file.read_to_string(&mut buf)?;
        Ok(serde_json::from_str(&buf)?)
    }

    fn write_atomic<T: Serialize>(&self, path: PathBuf, data: &T) -> Result<(), StorageError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let temp_path = path.with_extension("tmp");
        let json = serde_json::to_vec_pretty(data)?;
        {
            let mut file = File::create(&temp_path)?;
            file.write_all(&json)?;
            file.sync_all()?;
        }
        fs::rename(temp_path, path)?;
        Ok(())
    }

    /// Writes both lists into `backups/` and prunes the oldest snapshots beyond the limit.
    /// Returns the backup file name.
    pub fn create_backup(&self, snapshot: &BoardSnapshot) -> Result<String, StorageError> {
        let dir = self.root.join(BACKUP_DIR);
        fs::create_dir_all(&dir)?;
        // UTC keeps name order monotonic across DST changes.
        let timestamp = chrono::Utc::now().format("%Y%m%d-%H%M%S").to_string();
        let seq = self.next_backup_seq(&timestamp)?;
        let name = format!("{BACKUP_PREFIX}{timestamp}-{seq:03}.json");
        self.write_atomic(dir.join(&name), snapshot)?;
        self.trim_backups()?;
        Ok(name)
    }

    /// One past the highest sequence already used for `timestamp`, so pruned names are never
    /// handed out again.
    fn next_backup_seq(&self, timestamp: &str) -> Result<u32, StorageError> {
        let stem = format!("{BACKUP_PREFIX}{timestamp}-");
        let next = self
            .list_backups()?
            .iter()
            .filter_map(|(name, _)| {
                name.strip_prefix(&stem)?
                    .strip_suffix(".json")?
                    .parse::<u32>()
                    .ok()
            })
            .max()
            .map_or(0, |seq| seq + 1);
        Ok(next)
    }

    /// Backup names with their modification time (unix seconds), oldest first.
    pub fn list_backups(&self) -> Result<Vec<(String, i64)>, StorageError> {
        let mut results = Vec::new();
        for entry in fs::read_dir(self.root.join(BACKUP_DIR))?.filter_map(|entry| entry.ok()) {
            let Some(name) = entry.file_name().to_str().map(|s| s.to_string()) else {
                continue;
            };
            if !name.starts_with(BACKUP_PREFIX) || !name.ends_with(".json") {
                continue;
            }
            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .ok()
                .and_then(|time| time.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|dur| dur.as_secs() as i64)
                .unwrap_or(0);
            results.push((name, modified));
        }
        // Names embed a sortable timestamp and sequence number.
        results.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(results)
    }

    pub fn restore_backup(&self, filename: &str) -> Result<BoardSnapshot, StorageError> {
        if filename.contains('/') || filename.contains('\\') || filename.contains("..") {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("invalid backup name: {filename}"),
            )));
        }
        let snapshot: BoardSnapshot = self.load_json(self.root.join(BACKUP_DIR).join(filename))?;
        self.save_tasks(Category::Personal, &snapshot.personal)?;
        self.save_tasks(Category::Professional, &snapshot.professional)?;
        Ok(snapshot)
    }

    fn trim_backups(&self) -> Result<(), StorageError> {
        let entries = self.list_backups()?;
        let to_remove = entries.len().saturating_sub(BACKUP_LIMIT);
        for (name, _) in entries.into_iter().take(to_remove) {
            let _ = fs::remove_file(self.root.join(BACKUP_DIR).join(name));
        }
        Ok(())
    }
}
