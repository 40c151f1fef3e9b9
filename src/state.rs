use uuid::Uuid;

use crate::content::{ContentError, FETCH_ERROR_MESSAGE};
use crate::models::{BoardSnapshot, Category, DailyContent, Priority, Task};
use crate::storage::{Storage, StorageError, SCHEMA_VERSION};

/// Both category lists. Every mutation keeps the touched list sorted by priority.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskStore {
    personal: Vec<Task>,
    professional: Vec<Task>,
}

impl TaskStore {
    pub fn new(personal: Vec<Task>, professional: Vec<Task>) -> Self {
        Self {
            personal,
            professional,
        }
    }

    /// Reads both categories; an absent or unreadable list starts empty.
    pub fn load(storage: &Storage) -> Self {
        let mut store = Self::default();
        for category in Category::ALL {
            let tasks = match storage.load_tasks(category) {
                Ok(tasks) => tasks,
                Err(error) => {
                    log::warn!(
                        "ignoring unreadable task list key={} error={error}",
                        category.storage_key()
                    );
                    Vec::new()
                }
            };
            *store.list_mut(category) = tasks;
        }
        store
    }

    pub fn save(&self, storage: &Storage, category: Category) -> Result<(), StorageError> {
        storage.save_tasks(category, self.tasks(category))
    }

    pub fn save_all(&self, storage: &Storage) -> Result<(), StorageError> {
        for category in Category::ALL {
            self.save(storage, category)?;
        }
        Ok(())
    }

    pub fn tasks(&self, category: Category) -> &[Task] {
        match category {
            Category::Personal => &self.personal,
            Category::Professional => &self.professional,
        }
    }

    fn list_mut(&mut self, category: Category) -> &mut Vec<Task> {
        match category {
            Category::Personal => &mut self.personal,
            Category::Professional => &mut self.professional,
        }
    }

    pub fn get(&self, category: Category, id: &str) -> Option<&Task> {
        self.tasks(category).iter().find(|task| task.id == id)
    }

    /// Resolves a full id or an unambiguous id prefix.
    pub fn resolve_id(&self, category: Category, id_or_prefix: &str) -> Option<String> {
        let needle = id_or_prefix.trim();
        if needle.is_empty() {
            return None;
        }
        if let Some(task) = self.get(category, needle) {
            return Some(task.id.clone());
        }
        let mut matches = self
            .tasks(category)
            .iter()
            .filter(|task| task.id.starts_with(needle));
        match (matches.next(), matches.next()) {
            (Some(task), None) => Some(task.id.clone()),
            _ => None,
        }
    }

    pub fn pending_count(&self, category: Category) -> usize {
        self.tasks(category)
            .iter()
            .filter(|task| !task.completed)
            .count()
    }

    /// Prepends a new task and re-sorts. Blank text is ignored and yields `None`.
    pub fn add(
        &mut self,
        category: Category,
        text: &str,
        time: &str,
        priority: Priority,
    ) -> Option<Task> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let task = Task {
            id: Uuid::new_v4().to_string(),
            text: text.to_string(),
            time: time.trim().to_string(),
            completed: false,
            priority,
        };
        let list = self.list_mut(category);
        list.insert(0, task.clone());
        sort_by_priority(list);
        Some(task)
    }

    /// Flips `completed` in place; order is left alone.
    pub fn toggle(&mut self, category: Category, id: &str) -> Option<Task> {
        let task = self.list_mut(category).iter_mut().find(|t| t.id == id)?;
        task.completed = !task.completed;
        Some(task.clone())
    }

    pub fn delete(&mut self, category: Category, id: &str) -> bool {
        let list = self.list_mut(category);
        let before = list.len();
        list.retain(|task| task.id != id);
        list.len() != before
    }

    pub fn reset_all(&mut self) {
        self.personal.clear();
        self.professional.clear();
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        BoardSnapshot {
            schema_version: SCHEMA_VERSION,
            personal: self.personal.clone(),
            professional: self.professional.clone(),
        }
    }

    pub fn replace(&mut self, snapshot: BoardSnapshot) {
        self.personal = snapshot.personal;
        self.professional = snapshot.professional;
        sort_by_priority(&mut self.personal);
        sort_by_priority(&mut self.professional);
    }
}

/// Stable sort, heaviest priority first.
pub fn sort_by_priority(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| b.priority.weight().cmp(&a.priority.weight()));
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelView<'a> {
    Loading,
    Error(&'a str),
    Ready {
        content: &'a DailyContent,
        error: Option<&'a str>,
    },
    Empty,
}

/// Display state of the daily content section. At most one fetch is in flight.
#[derive(Debug, Clone, Default)]
pub struct ContentPanel {
    content: Option<DailyContent>,
    loading: bool,
    error: Option<String>,
}

impl ContentPanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content(&self) -> Option<&DailyContent> {
        self.content.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Returns false, leaving the panel untouched, while a fetch is already outstanding.
    pub fn begin_refresh(&mut self) -> bool {
        if self.loading {
            return false;
        }
        self.loading = true;
        self.error = None;
        true
    }

    pub fn complete(&mut self, result: Result<DailyContent, ContentError>) {
        self.loading = false;
        match result {
            Ok(content) => {
                self.content = Some(content);
                self.error = None;
            }
            Err(error) => {
                log::error!("daily content fetch failed: {error}");
                self.error = Some(FETCH_ERROR_MESSAGE.to_string());
            }
        }
    }

    pub fn view(&self) -> PanelView<'_> {
        match (&self.content, self.loading, &self.error) {
            (Some(content), _, error) => PanelView::Ready {
                content,
                error: error.as_deref(),
            },
            (None, true, _) => PanelView::Loading,
            (None, false, Some(error)) => PanelView::Error(error),
            (None, false, None) => PanelView::Empty,
        }
    }
}
