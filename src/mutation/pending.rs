use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use crate::osm::FlexiWriteContext;
use crate::projection::{GroupNumber, ProjectedMember};
use crate::util::lock;

/// A camp group move the user made that OSM has not yet settled.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingMove {
    pub move_id: String,
    /// Logical event the move belongs to.
    pub event_name: String,
    pub member: ProjectedMember,
    pub from_group_number: GroupNumber,
    pub to_group_number: GroupNumber,
    pub context: FlexiWriteContext,
    pub timestamp: DateTime<Utc>,
}

impl PendingMove {
    pub fn move_id_for(member: &ProjectedMember, timestamp: DateTime<Utc>) -> String {
        format!("{}_{}", member.scout_id, timestamp.timestamp_millis())
    }
}

/// Session-wide registry of pending moves. Lives outside any view so a
/// remounted view still sees moves started by its predecessor.
#[derive(Debug, Clone, Default)]
pub struct PendingMoves {
    inner: Arc<Mutex<BTreeMap<String, PendingMove>>>,
}

impl PendingMoves {
    pub fn insert(&self, pending_move: PendingMove) {
        lock(&self.inner).insert(pending_move.move_id.clone(), pending_move);
    }

    pub fn remove(&self, move_id: &str) -> Option<PendingMove> {
        lock(&self.inner).remove(move_id)
    }

    /// Moves for one logical event, oldest first.
    pub fn for_event(&self, event_name: &str) -> Vec<PendingMove> {
        let mut moves: Vec<PendingMove> = lock(&self.inner)
            .values()
            .filter(|m| m.event_name == event_name)
            .cloned()
            .collect();
        moves.sort_by_key(|m| m.timestamp);
        moves
    }

    pub fn has_pending_for(&self, event_name: &str) -> bool {
        lock(&self.inner).values().any(|m| m.event_name == event_name)
    }

    pub fn len(&self) -> usize {
        lock(&self.inner).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.inner).is_empty()
    }
}
