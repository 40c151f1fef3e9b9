use crate::models::Task;
use crate::state::TaskStore;

pub const EVENT_STATE_UPDATED: &str = "state_updated";

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct StatePayload {
    pub personal: Vec<Task>,
    pub professional: Vec<Task>,
}

impl StatePayload {
    pub fn from_store(store: &TaskStore) -> Self {
        let snapshot = store.snapshot();
        Self {
            personal: snapshot.personal,
            professional: snapshot.professional,
        }
    }
}
