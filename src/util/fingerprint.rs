use sha2::{Digest, Sha256};

use crate::models::Event;

/// Stable identity of a set of events, independent of their order. Used to
/// tell apart refreshes issued for different event selections.
pub fn events_fingerprint(events: &[Event]) -> String {
    let mut triples: Vec<String> = events
        .iter()
        .map(|e| format!("{}:{}:{}", e.section_id, e.term_id, e.event_id))
        .collect();
    triples.sort();
    triples.dedup();

    let mut hasher = Sha256::new();
    for triple in &triples {
        hasher.update(triple.as_bytes());
        hasher.update(b"\n");
    }
    format!("{:x}", hasher.finalize())
}
