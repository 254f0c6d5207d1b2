use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::Event;
use crate::storage::{Store, keys};

/// What the events screen learned about an event's sharing
/// (`viking_shared_metadata_<eventId>`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SharedMetadata {
    #[serde(rename = "_isOwner", default)]
    pub is_owner: bool,
    #[serde(rename = "_allSections", default)]
    pub all_sections: Vec<Value>,
}

impl SharedMetadata {
    pub fn is_shared(&self) -> bool {
        self.is_owner || self.all_sections.len() > 1
    }
}

pub fn is_shared_event(store: &Store, event: &Event) -> bool {
    store
        .get_opt::<SharedMetadata>(&keys::shared_metadata(&event.event_id))
        .is_some_and(|meta| meta.is_shared())
}

/// Whether any of the events is shared with other sections.
pub fn any_shared_event(store: &Store, events: &[Event]) -> bool {
    events.iter().any(|event| is_shared_event(store, event))
}
