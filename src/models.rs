use serde::{Deserialize, Deserializer, Serialize};

pub type Timestamp = i64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub fn weight(self) -> u8 {
        match self {
            Priority::High => 3,
            Priority::Medium => 2,
            Priority::Low => 1,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Priority::High => "High",
            Priority::Medium => "Medium",
            Priority::Low => "Low",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "high" | "h" => Some(Priority::High),
            "medium" | "med" | "m" => Some(Priority::Medium),
            "low" | "l" => Some(Priority::Low),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Category {
    Personal,
    Professional,
}

impl Category {
    pub const ALL: [Category; 2] = [Category::Personal, Category::Professional];

    /// Storage key holding this category's snapshot.
    pub fn storage_key(self) -> &'static str {
        match self {
            Category::Personal => "personalTodos",
            Category::Professional => "professionalTodos",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Category::Personal => "Personal",
            Category::Professional => "Professional",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "personal" | "p" => Some(Category::Personal),
            "professional" | "pro" | "work" => Some(Category::Professional),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: String,
    pub text: String,
    /// `HH:MM`, or empty when the task has no time.
    #[serde(default, deserialize_with = "null_as_default")]
    pub time: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub completed: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub priority: Priority,
}

/// Treats an explicit `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Returns true for an empty string or a valid 24h `HH:MM` time.
pub fn is_valid_time(value: &str) -> bool {
    if value.is_empty() {
        return true;
    }
    let Some((hours, minutes)) = value.split_once(':') else {
        return false;
    };
    if hours.len() != 2 || minutes.len() != 2 {
        return false;
    }
    match (hours.parse::<u8>(), minutes.parse::<u8>()) {
        (Ok(h), Ok(m)) => h < 24 && m < 60,
        _ => false,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WordOfTheDay {
    pub word: String,
    pub definition: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StudyTopic {
    #[serde(default)]
    pub topic: String,
    pub explanation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StudyPlan {
    pub math_topic: StudyTopic,
    pub science_topic: StudyTopic,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TechConcept {
    pub topic: String,
    pub explanation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DailyContent {
    pub word_of_the_day: WordOfTheDay,
    pub thought_of_the_day: String,
    pub study_plan: StudyPlan,
    pub tech_concept: TechConcept,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct Settings {
    #[serde(default)]
    pub gemini_api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_true")]
    pub confirm_reset: bool,
    #[serde(default = "default_true")]
    pub backup_on_reset: bool,
    #[serde(default)]
    pub last_reset_at: Option<Timestamp>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            gemini_api_key: String::new(),
            model: default_model(),
            api_base: default_api_base(),
            request_timeout_secs: default_request_timeout_secs(),
            confirm_reset: true,
            backup_on_reset: true,
            last_reset_at: None,
        }
    }
}

impl Settings {
    /// Applies `GEMINI_API_KEY`/`API_KEY` and `DAYBOARD_MODEL` on top of the stored values.
    pub fn with_env_overrides(mut self) -> Self {
        let key = env_non_empty("GEMINI_API_KEY").or_else(|| env_non_empty("API_KEY"));
        if let Some(key) = key {
            self.gemini_api_key = key;
        }
        if let Some(model) = env_non_empty("DAYBOARD_MODEL") {
            self.model = model;
        }
        self
    }
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_api_base() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_request_timeout_secs() -> u64 {
    45
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TasksFile {
    pub schema_version: u32,
    pub tasks: Vec<Task>,
}

/// A category snapshot as read from disk: the versioned envelope, or the bare array the browser
/// build kept in `localStorage`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StoredTasks {
    Versioned(TasksFile),
    Bare(Vec<Task>),
}

impl StoredTasks {
    pub fn into_tasks(self) -> Vec<Task> {
        match self {
            StoredTasks::Versioned(file) => file.tasks,
            StoredTasks::Bare(tasks) => tasks,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SettingsFile {
    pub schema_version: u32,
    pub settings: Settings,
}

/// Both category lists, as written into a backup snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub struct BoardSnapshot {
    pub schema_version: u32,
    pub personal: Vec<Task>,
    pub professional: Vec<Task>,
}
