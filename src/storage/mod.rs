//! Durable key-value cache. Values are JSON documents under namespaced keys;
//! every read has a fallback and no operation here ever fails the caller.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

pub mod backend;
pub mod keys;

pub use backend::{FileBackend, KvBackend, MemoryBackend, StoreError};

#[derive(Clone)]
pub struct Store {
    backend: Arc<dyn KvBackend>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}

impl Store {
    pub fn new(backend: impl KvBackend + 'static) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryBackend::new())
    }

    /// Parsed value under `key`, or `default` when missing or malformed.
    pub fn get<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get_opt(key).unwrap_or(default)
    }

    pub fn get_opt<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.backend.read(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(category = "kvs", key, error = %e, "Cache read failed");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(category = "kvs", key, error = %e, "Ignoring malformed cache entry");
                None
            }
        }
    }

    /// Serializes the whole value before touching the backend, so a
    /// serialization failure never leaves a partial document behind.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> bool {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(category = "kvs", key, error = %e, "Could not serialize cache value");
                return false;
            }
        };
        match self.backend.write(key, &raw) {
            Ok(()) => {
                debug!(category = "kvs", key, bytes = raw.len(), "Cached");
                true
            }
            Err(e) => {
                warn!(category = "kvs", key, error = %e, "Cache write dropped");
                false
            }
        }
    }

    pub fn remove(&self, key: &str) {
        if let Err(e) = self.backend.remove(key) {
            warn!(category = "kvs", key, error = %e, "Cache delete failed");
        }
    }

    /// Stored document exactly as written, for cache inspection.
    pub fn get_raw_json(&self, key: &str) -> Option<String> {
        self.backend.read(key).ok().flatten()
    }

    pub fn contains(&self, key: &str) -> bool {
        matches!(self.backend.read(key), Ok(Some(_)))
    }

    pub fn list_by_prefix(&self, prefix: &str) -> Vec<String> {
        match self.backend.keys() {
            Ok(keys) => keys.into_iter().filter(|k| k.starts_with(prefix)).collect(),
            Err(e) => {
                warn!(category = "kvs", prefix, error = %e, "Cache listing failed");
                Vec::new()
            }
        }
    }

    pub fn user_preferences(&self) -> serde_json::Value {
        self.get(keys::USER_PREFERENCES, serde_json::json!({}))
    }

    pub fn save_user_preferences(&self, prefs: &serde_json::Value) -> bool {
        self.set(keys::USER_PREFERENCES, prefs)
    }

    pub fn assignment_draft<T: DeserializeOwned>(&self, term_type: &str, term_year: &str) -> Option<T> {
        self.get_opt(&keys::assignment_draft(term_type, term_year))
    }

    pub fn save_assignment_draft<T: Serialize>(&self, term_type: &str, term_year: &str, draft: &T) -> bool {
        self.set(&keys::assignment_draft(term_type, term_year), draft)
    }

    pub fn clear_assignment_draft(&self, term_type: &str, term_year: &str) {
        self.remove(&keys::assignment_draft(term_type, term_year));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Draft {
        moves: Vec<u32>,
    }

    #[test]
    fn test_get_returns_default_for_missing_and_malformed() {
        let backend = MemoryBackend::new();
        backend.write("broken", "{\"items\": [1, 2").unwrap();
        let store = Store::new(backend);

        assert_eq!(store.get::<Vec<u32>>("missing", vec![9]), vec![9]);
        assert_eq!(store.get::<Vec<u32>>("broken", vec![]), Vec::<u32>::new());
        assert!(store.contains("broken"));
        assert_eq!(store.get_raw_json("broken").as_deref(), Some("{\"items\": [1, 2"));
    }

    #[test]
    fn test_set_reports_quota_failure() {
        let store = Store::new(MemoryBackend::with_quota(64));
        assert!(store.set("small", &json!([1, 2, 3])));
        assert!(!store.set("large", &"x".repeat(256)));
        assert_eq!(store.get_opt::<String>("large"), None);
    }

    #[test]
    fn test_list_by_prefix() {
        let store = Store::in_memory();
        store.set(&keys::attendance("1", "2", "3"), &json!([]));
        store.set(&keys::attendance("1", "2", "4"), &json!([]));
        store.set(keys::SECTIONS, &json!([]));

        let found = store.list_by_prefix(keys::ATTENDANCE_PREFIX);
        assert_eq!(found.len(), 2);
        store.remove(&found[0]);
        assert_eq!(store.list_by_prefix(keys::ATTENDANCE_PREFIX).len(), 1);
    }

    #[test]
    fn test_preferences_and_drafts() {
        let store = Store::in_memory();
        assert_eq!(store.user_preferences(), json!({}));
        assert!(store.save_user_preferences(&json!({"theme": "dark"})));
        assert_eq!(store.user_preferences()["theme"], "dark");

        let draft = Draft { moves: vec![1, 2] };
        assert!(store.save_assignment_draft("spring", "2025", &draft));
        assert_eq!(store.assignment_draft::<Draft>("spring", "2025"), Some(draft));
        store.clear_assignment_draft("spring", "2025");
        assert_eq!(store.assignment_draft::<Draft>("spring", "2025"), None);
    }
}
