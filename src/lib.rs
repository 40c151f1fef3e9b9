//! Dayboard: a two-list todo board (personal and professional) with a panel of AI-generated
//! daily content.
//!
//! The library holds everything but the terminal front end, so it can be tested without a
//! network or a terminal.

pub mod commands;
pub mod content;
pub mod events;
pub mod logging;
pub mod models;
pub mod render;
pub mod state;
pub mod storage;

pub use content::{ContentError, FETCH_ERROR_MESSAGE};
pub use models::{Category, DailyContent, Priority, Settings, Task};
pub use state::{ContentPanel, PanelView, TaskStore};
pub use storage::{Storage, StorageError};
