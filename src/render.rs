use std::fmt::Write as _;

use chrono::{DateTime, Local};

use crate::models::{Category, DailyContent, Settings, Task, Timestamp};
use crate::state::{PanelView, TaskStore};

const SHORT_ID_LEN: usize = 8;

pub fn short_id(id: &str) -> &str {
    id.get(..SHORT_ID_LEN).unwrap_or(id)
}

fn render_task(out: &mut String, task: &Task) {
    let check = if task.completed { "x" } else { " " };
    let time = if task.time.is_empty() { "     " } else { task.time.as_str() };
    let _ = writeln!(
        out,
        "  [{check}] {priority:<6} {time}  {text}  ({id})",
        priority = task.priority.label(),
        text = task.text,
        id = short_id(&task.id),
    );
}

pub fn render_category(store: &TaskStore, category: Category) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} ({} pending)",
        category.label(),
        store.pending_count(category)
    );
    let tasks = store.tasks(category);
    if tasks.is_empty() {
        let _ = writeln!(
            out,
            "  No {} tasks yet.",
            category.label().to_lowercase()
        );
    }
    for task in tasks {
        render_task(&mut out, task);
    }
    out
}

pub fn render_board(store: &TaskStore) -> String {
    let mut out = String::from("To-Do List\n\n");
    for (index, category) in Category::ALL.into_iter().enumerate() {
        if index > 0 {
            out.push('\n');
        }
        out.push_str(&render_category(store, category));
    }
    out
}

pub fn render_last_reset(last_reset_at: Option<Timestamp>) -> String {
    match last_reset_at.and_then(|secs| DateTime::from_timestamp(secs, 0)) {
        Some(at) => format!(
            "Last new day: {}",
            at.with_timezone(&Local).format("%Y-%m-%d %H:%M")
        ),
        None => "Last new day: never".to_string(),
    }
}

/// Shows only the last four characters of a key.
fn mask_key(key: &str) -> String {
    if key.is_empty() {
        return "(not set)".to_string();
    }
    let chars: Vec<char> = key.chars().collect();
    let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
    format!("****{tail}")
}

pub fn render_settings(settings: &Settings) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "api key          {}", mask_key(&settings.gemini_api_key));
    let _ = writeln!(out, "model            {}", settings.model);
    let _ = writeln!(out, "api base         {}", settings.api_base);
    let _ = writeln!(out, "timeout          {}s", settings.request_timeout_secs);
    let _ = writeln!(out, "confirm reset    {}", settings.confirm_reset);
    let _ = writeln!(out, "backup on reset  {}", settings.backup_on_reset);
    let _ = writeln!(out, "{}", render_last_reset(settings.last_reset_at));
    out
}

fn render_content(out: &mut String, content: &DailyContent) {
    let _ = writeln!(out, "Word of the Day: {}", content.word_of_the_day.word);
    let _ = writeln!(out, "  {}", content.word_of_the_day.definition);
    let _ = writeln!(out);
    let _ = writeln!(out, "Thought of the Day");
    let _ = writeln!(out, "  \"{}\"", content.thought_of_the_day);
    let _ = writeln!(out);
    let _ = writeln!(out, "Tech Bite: {}", content.tech_concept.topic);
    push_paragraphs(out, &content.tech_concept.explanation);
    let _ = writeln!(out);
    let _ = writeln!(out, "Study Plan");
    for (label, topic) in [
        ("Math", &content.study_plan.math_topic),
        ("Science", &content.study_plan.science_topic),
    ] {
        if topic.topic.is_empty() {
            let _ = writeln!(out, "  {label}");
        } else {
            let _ = writeln!(out, "  {label}: {}", topic.topic);
        }
        push_paragraphs(out, &topic.explanation);
    }
}

fn push_paragraphs(out: &mut String, text: &str) {
    for line in text.lines().map(str::trim).filter(|line| !line.is_empty()) {
        let _ = writeln!(out, "    {line}");
    }
}

pub fn render_panel(view: PanelView<'_>) -> String {
    let mut out = String::new();
    match view {
        PanelView::Loading => out.push_str("Loading daily content...\n"),
        PanelView::Empty => out.push_str("No daily content yet. Type `refresh` to fetch.\n"),
        PanelView::Error(message) => {
            let _ = writeln!(out, "An Error Occurred\n  {message}");
        }
        PanelView::Ready { content, error } => {
            if let Some(message) = error {
                let _ = writeln!(out, "An Error Occurred\n  {message}\n");
            }
            render_content(&mut out, content);
        }
    }
    out
}
