//! Attendance cache and loader: builds `(roster, flexi)` snapshots for the
//! events of one logical event, preferring whichever of cache and remote
//! the caller asked for and degrading to the other.

use std::collections::{BTreeMap, HashSet};
use std::future::Future;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::auth::read_token;
use crate::error::CoreError;
use crate::flexi::{CachedFlexiData, FlexiData, FlexiRecordInfo, FlexiRow, FlexiTable, find_viking_record};
use crate::models::{AttendanceRecord, Event, Section};
use crate::state::AppState;
use crate::storage::keys;

pub mod generation;
pub mod sections;
pub mod shared;

pub use generation::{RefreshTicket, RefreshTracker};
pub use sections::{find_member_section_name, find_member_section_type};
pub use shared::{SharedMetadata, any_shared_event, is_shared_event};

/// Which source a load trusts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Entering a view: cached attendance is good enough.
    PreferCache,
    /// Explicit refresh: ask OSM whenever there is a token.
    PreferRemote,
}

/// Everything a view renders from. `error` carries the first load failure;
/// the rest of the snapshot is still usable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttendanceSnapshot {
    pub roster: Vec<AttendanceRecord>,
    pub flexi: FlexiData,
    pub error: Option<CoreError>,
}

#[derive(Clone)]
pub struct AttendanceLoader {
    app: AppState,
}

impl AttendanceLoader {
    pub fn new(app: AppState) -> Self {
        Self { app }
    }

    /// Roster and Viking Event tables for `events`, cache first.
    pub async fn load_attendance(&self, events: &[Event]) -> AttendanceSnapshot {
        self.load(events, Freshness::PreferCache).await
    }

    /// Same as [`load_attendance`](Self::load_attendance) but remote first.
    pub async fn refresh(&self, events: &[Event]) -> AttendanceSnapshot {
        self.load(events, Freshness::PreferRemote).await
    }

    pub async fn load(&self, events: &[Event], freshness: Freshness) -> AttendanceSnapshot {
        let token = read_token(self.app.auth.as_ref());
        let (roster, error) = self.load_roster(events, freshness, token.as_deref()).await;
        let flexi = FlexiData::new(self.load_flexi_for_events(events, token.as_deref()).await);
        info!(
            category = "attendance",
            events = events.len(),
            records = roster.len(),
            ?freshness,
            "Attendance loaded"
        );
        AttendanceSnapshot { roster, flexi, error }
    }

    async fn load_roster(
        &self,
        events: &[Event],
        freshness: Freshness,
        token: Option<&str>,
    ) -> (Vec<AttendanceRecord>, Option<CoreError>) {
        let mut roster = Vec::new();
        let mut error = None;

        for event in events {
            if let Some(missing) = event.missing_identifier() {
                warn!(
                    category = "attendance",
                    event_id = %event.event_id,
                    event_name = %event.name,
                    missing,
                    "Skipping event with incomplete identifiers"
                );
                continue;
            }

            let key = keys::attendance(&event.section_id, &event.term_id, &event.event_id);
            let cached: Option<Vec<AttendanceRecord>> = self.app.store.get_opt(&key);
            let records = match (freshness, cached, token) {
                (Freshness::PreferCache, Some(cached), _) => cached,
                (_, cached, Some(token)) => match self
                    .app
                    .gateway
                    .get_event_attendance(&event.section_id, &event.event_id, &event.term_id, token)
                    .await
                {
                    Ok(fresh) => {
                        self.app.store.set(&key, &fresh);
                        fresh
                    }
                    Err(e) => {
                        warn!(
                            category = "attendance",
                            event_id = %event.event_id,
                            section_id = %event.section_id,
                            error = %e,
                            "Attendance fetch failed, using cache"
                        );
                        if error.is_none() {
                            error = Some(e);
                        }
                        cached.unwrap_or_default()
                    }
                },
                (_, cached, None) => cached.unwrap_or_default(),
            };

            roster.extend(records.into_iter().map(|record| tag_record(record, event)));
        }

        if let Some(token) = token {
            self.merge_shared_attendance(events, token, &mut roster).await;
        }
        (roster, error)
    }

    /// Adds attendance from sections the user does not own. These records
    /// are never persisted.
    async fn merge_shared_attendance(&self, events: &[Event], token: &str, roster: &mut Vec<AttendanceRecord>) {
        let own_sections: HashSet<&str> = events.iter().map(|e| e.section_id.as_str()).collect();
        let mut seen_names = HashSet::new();

        for event in events {
            if event.missing_identifier().is_some()
                || !is_shared_event(&self.app.store, event)
                || !seen_names.insert(event.name.as_str())
            {
                continue;
            }
            let shared = match self
                .app
                .gateway
                .get_shared_event_attendance(&event.event_id, &event.section_id, token)
                .await
            {
                Ok(shared) => shared,
                Err(e) => {
                    warn!(category = "attendance", event_id = %event.event_id, error = %e, "Shared attendance fetch failed");
                    continue;
                }
            };
            if let Some(err) = &shared.error {
                warn!(category = "attendance", event_id = %event.event_id, error = %err, "Shared attendance reported an error");
            }

            let before = roster.len();
            roster.extend(
                shared
                    .items
                    .into_iter()
                    .filter(|r| !own_sections.contains(r.section_id.as_str()))
                    .map(|mut record| {
                        record.event_id = event.event_id.clone();
                        record.event_name = Some(event.name.clone());
                        record.event_date = event.start_date.clone();
                        record
                    }),
            );
            debug!(
                category = "attendance",
                event_id = %event.event_id,
                merged = roster.len() - before,
                "Merged shared attendance"
            );
        }
    }

    /// Viking Event table per section of `events`. Without a token only the
    /// cache is read. A section that fails to load maps to `None`.
    pub async fn load_flexi_for_events(
        &self,
        events: &[Event],
        token: Option<&str>,
    ) -> BTreeMap<String, Option<FlexiTable>> {
        let sections: Vec<Section> = self.app.store.get(keys::SECTIONS, Vec::new());
        let mut by_section = BTreeMap::new();

        for event in events {
            if event.missing_identifier().is_some() || by_section.contains_key(&event.section_id) {
                continue;
            }
            let table = self
                .load_section_flexi(&event.section_id, &event.term_id, token, &sections)
                .await;
            by_section.insert(event.section_id.clone(), table);
        }
        by_section
    }

    async fn load_section_flexi(
        &self,
        section_id: &str,
        term_id: &str,
        token: Option<&str>,
        sections: &[Section],
    ) -> Option<FlexiTable> {
        let gateway = &self.app.gateway;

        let records: Vec<FlexiRecordInfo> = self
            .remote_or_cached(
                &keys::flexi_lists(section_id),
                token.map(|t| gateway.get_flexi_records(section_id, t)),
            )
            .await
            .unwrap_or_default();
        let Some(info) = find_viking_record(&records) else {
            debug!(category = "flexi", section_id, "Section has no Viking Event Mgmt record");
            return None;
        };
        let flexi_record_id = info.flexi_record_id.clone();

        let Some(structure) = self
            .remote_or_cached(
                &keys::flexi_structure(&flexi_record_id),
                token.map(|t| gateway.get_flexi_structure(&flexi_record_id, section_id, term_id, t)),
            )
            .await
        else {
            warn!(category = "flexi", section_id, %flexi_record_id, "No structure for Viking Event Mgmt");
            return None;
        };

        let data_key = keys::flexi_data(&flexi_record_id, section_id, term_id);
        let data: Option<CachedFlexiData> = match token {
            Some(token) => match gateway
                .get_single_flexi_record(&flexi_record_id, section_id, term_id, token)
                .await
            {
                Ok(raw) => {
                    let data = CachedFlexiData {
                        items: raw
                            .into_iter()
                            .filter_map(|row| FlexiRow::from_raw(row, &structure))
                            .collect(),
                        structure: structure.clone(),
                    };
                    self.app.store.set(&data_key, &data);
                    Some(data)
                }
                Err(e) => {
                    warn!(category = "flexi", section_id, error = %e, "Viking Event data fetch failed, using cache");
                    self.app.store.get_opt(&data_key)
                }
            },
            None => self.app.store.get_opt(&data_key),
        };
        let data = data?;

        Some(FlexiTable {
            flexi_record_id,
            section_id: section_id.to_string(),
            term_id: term_id.to_string(),
            section_type: find_member_section_type(section_id, sections).map(|t| t.as_str().to_string()),
            structure,
            items: data.items,
        })
    }

    /// Awaits `fetch` when there is one and writes the result through;
    /// otherwise, or when it fails, reads `key` from the cache.
    async fn remote_or_cached<T>(
        &self,
        key: &str,
        fetch: Option<impl Future<Output = Result<T, CoreError>>>,
    ) -> Option<T>
    where
        T: Serialize + DeserializeOwned,
    {
        if let Some(fetch) = fetch {
            match fetch.await {
                Ok(value) => {
                    self.app.store.set(key, &value);
                    return Some(value);
                }
                Err(e) => warn!(category = "flexi", key, error = %e, "Remote read failed, using cache"),
            }
        }
        self.app.store.get_opt(key)
    }
}

fn tag_record(mut record: AttendanceRecord, event: &Event) -> AttendanceRecord {
    record.event_id = event.event_id.clone();
    record.event_name = Some(event.name.clone());
    record.event_date = event.start_date.clone();
    record.section_id = event.section_id.clone();
    record.section_name = Some(event.section_name.clone());
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flexi::CAMP_GROUP;
    use crate::models::ScoutId;
    use crate::osm::SharedAttendance;
    use crate::testing::{FLEXI_ID, Harness, attendance, event};
    use serde_json::json;

    #[tokio::test]
    async fn test_prefers_cache_and_tags_records() {
        let h = Harness::new();
        let ev = event("e1", "s1", "t1", "Summer Camp");
        h.app.store.set(&keys::attendance("s1", "t1", "e1"), &vec![attendance(101, "Alice", "")]);
        h.gateway.set_attendance("e1", vec![attendance(999, "Remote", "s1")]);

        let snapshot = h.loader().load_attendance(&[ev]).await;
        assert_eq!(snapshot.roster.len(), 1);
        let record = &snapshot.roster[0];
        assert_eq!(record.scout_id, ScoutId(101));
        assert_eq!(record.section_id, "s1");
        assert_eq!(record.event_name.as_deref(), Some("Summer Camp"));
        assert_eq!(record.section_name.as_deref(), Some("Section s1"));
        assert_eq!(h.gateway.calls_named("get_event_attendance"), 0);
        assert!(snapshot.error.is_none());
    }

    #[tokio::test]
    async fn test_cache_miss_fetches_and_writes_through() {
        let h = Harness::new();
        h.gateway.set_attendance("e1", vec![attendance(101, "Alice", "s1")]);

        let snapshot = h.loader().load_attendance(&[event("e1", "s1", "t1", "Camp")]).await;
        assert_eq!(snapshot.roster.len(), 1);
        let cached: Vec<AttendanceRecord> = h.app.store.get(&keys::attendance("s1", "t1", "e1"), vec![]);
        assert_eq!(cached.len(), 1);
    }

    #[tokio::test]
    async fn test_refresh_falls_back_to_cache_and_reports_error() {
        let h = Harness::new();
        h.app.store.set(&keys::attendance("s1", "t1", "e1"), &vec![attendance(101, "Alice", "s1")]);
        h.gateway.fail_reads(CoreError::offline());

        let snapshot = h.loader().refresh(&[event("e1", "s1", "t1", "Camp")]).await;
        assert_eq!(snapshot.roster.len(), 1);
        assert_eq!(snapshot.error, Some(CoreError::offline()));
    }

    #[tokio::test]
    async fn test_events_with_missing_ids_are_skipped() {
        let h = Harness::new();
        h.gateway.set_attendance("e1", vec![attendance(101, "Alice", "s1")]);
        let events = vec![event("e1", "s1", "", "Camp"), event("e2", "", "t1", "Camp")];

        let snapshot = h.loader().load_attendance(&events).await;
        assert!(snapshot.roster.is_empty());
        assert!(snapshot.error.is_none());
        assert_eq!(h.gateway.calls_named("get_event_attendance"), 0);
    }

    #[tokio::test]
    async fn test_without_token_reads_cache_only() {
        let h = Harness::new();
        h.auth.clear_token();
        h.gateway.set_attendance("e1", vec![attendance(101, "Alice", "s1")]);

        let snapshot = h.loader().refresh(&[event("e1", "s1", "t1", "Camp")]).await;
        assert!(snapshot.roster.is_empty());
        assert!(snapshot.error.is_none());
        assert_eq!(h.gateway.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_flexi_discovery_writes_through_every_step() {
        let h = Harness::new();
        h.seed_section("s1", "t1", "e1", &[(101, "Alice", "1"), (102, "Bob", "")]);

        let tables = h
            .loader()
            .load_flexi_for_events(&[event("e1", "s1", "t1", "Camp")], Some("token"))
            .await;
        let table = tables["s1"].as_ref().unwrap();
        assert_eq!(table.section_type.as_deref(), Some("cubs"));
        assert_eq!(table.row(ScoutId(101)).unwrap().camp_group, "1");
        assert_eq!(table.structure.column_for(CAMP_GROUP), Some("f_1"));

        let store = &h.app.store;
        assert!(store.contains(&keys::flexi_lists("s1")));
        assert!(store.contains(&keys::flexi_structure(FLEXI_ID)));
        let cached: CachedFlexiData = store
            .get_opt(&keys::flexi_data(FLEXI_ID, "s1", "t1"))
            .unwrap();
        assert_eq!(cached.items.len(), 2);
        assert_eq!(cached.items[0].columns["f_1"], "1");

        // The same chain now works from the cache alone.
        let offline = h
            .loader()
            .load_flexi_for_events(&[event("e1", "s1", "t1", "Camp")], None)
            .await;
        assert_eq!(offline["s1"].as_ref().unwrap().items.len(), 2);
    }

    #[tokio::test]
    async fn test_flexi_failure_degrades_one_section() {
        let h = Harness::new();
        h.seed_section("s1", "t1", "e1", &[(101, "Alice", "1")]);
        h.gateway.remove_viking_record("s2");

        let events = vec![event("e1", "s1", "t1", "Camp"), event("e2", "s2", "t2", "Camp")];
        let tables = h.loader().load_flexi_for_events(&events, Some("token")).await;
        assert!(tables["s1"].is_some());
        assert!(tables["s2"].is_none());
    }

    #[tokio::test]
    async fn test_shared_event_merges_foreign_sections() {
        let h = Harness::new();
        h.gateway.set_attendance("e1", vec![attendance(101, "Alice", "s1")]);
        h.app.store.set(
            &keys::shared_metadata("e1"),
            &json!({"_isOwner": true, "_allSections": ["s1", "s9"]}),
        );
        h.gateway.set_shared_attendance(
            "e1",
            SharedAttendance {
                items: vec![attendance(101, "Alice", "s1"), attendance(901, "Zed", "s9")],
                error: None,
            },
        );

        let snapshot = h.loader().load_attendance(&[event("e1", "s1", "t1", "Camp")]).await;
        let ids: Vec<ScoutId> = snapshot.roster.iter().map(|r| r.scout_id).collect();
        assert_eq!(ids, vec![ScoutId(101), ScoutId(901)]);
        assert_eq!(snapshot.roster[1].section_id, "s9");
        assert_eq!(snapshot.roster[1].event_name.as_deref(), Some("Camp"));

        // Only the owned section's register is cached.
        assert_eq!(h.app.store.list_by_prefix(keys::ATTENDANCE_PREFIX).len(), 1);
    }
}
