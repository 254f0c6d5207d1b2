use std::collections::HashMap;
use std::sync::Mutex;

use crate::util::lock;

/// Proof that a refresh was started; only the newest ticket per event
/// selection may publish its results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTicket {
    fingerprint: String,
    generation: u64,
}

#[derive(Debug, Default)]
pub struct RefreshTracker {
    latest: Mutex<HashMap<String, u64>>,
}

impl RefreshTracker {
    /// Starts a refresh, superseding any still running for `fingerprint`.
    pub fn begin(&self, fingerprint: &str) -> RefreshTicket {
        let mut latest = lock(&self.latest);
        let generation = latest.entry(fingerprint.to_string()).or_insert(0);
        *generation += 1;
        RefreshTicket {
            fingerprint: fingerprint.to_string(),
            generation: *generation,
        }
    }

    pub fn is_current(&self, ticket: &RefreshTicket) -> bool {
        lock(&self.latest).get(&ticket.fingerprint) == Some(&ticket.generation)
    }
}
