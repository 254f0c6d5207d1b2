//! Mutation engine: every write to Viking Event data goes through here.
//! Each mutation applies locally first, then syncs with OSM, then writes
//! through to the cache or reverts.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::attendance::find_member_section_type;
use crate::auth::ensure_token;
use crate::error::CoreError;
use crate::flexi::{
    CAMP_GROUP, CachedFlexiData, FlexiRecordInfo, FlexiRow, FlexiStructure, FlexiTable, SIGNED_IN_BY, SIGNED_IN_WHEN,
    SIGNED_OUT_BY, SIGNED_OUT_WHEN, VIKING_FLEXI_NAME, find_viking_record,
};
use crate::models::{ScoutId, Section};
use crate::osm::FlexiWriteContext;
use crate::state::AppState;
use crate::storage::keys;
use crate::view::CampGroupsView;

pub mod camp_group;
pub mod delete;
pub mod drag;
pub mod pending;
pub mod rename;
pub mod sign_in_out;

pub use camp_group::MoveRequest;
pub use drag::DragState;
pub use pending::{PendingMove, PendingMoves};
pub use sign_in_out::SignAction;

/// Term id demo sessions write under.
pub const DEMO_TERM_ID: &str = "demo-term";
pub const DEMO_FLEXI_RECORD_ID: &str = "demo-viking-event";
const DEMO_SECTION_TYPE: &str = "beavers";

/// Fixed column per field for demo sessions.
pub const DEMO_COLUMNS: [(&str, &str); 5] = [
    (CAMP_GROUP, "f_1"),
    (SIGNED_IN_BY, "f_2"),
    (SIGNED_IN_WHEN, "f_3"),
    (SIGNED_OUT_BY, "f_4"),
    (SIGNED_OUT_WHEN, "f_5"),
];

pub fn demo_structure() -> FlexiStructure {
    FlexiStructure {
        flexi_record_id: DEMO_FLEXI_RECORD_ID.to_string(),
        name: VIKING_FLEXI_NAME.to_string(),
        field_mapping: DEMO_COLUMNS
            .iter()
            .map(|(field, column)| (column.to_string(), field.to_string()))
            .collect::<BTreeMap<_, _>>(),
    }
}

/// Writes for one view. Cheap to clone.
#[derive(Clone)]
pub struct MutationEngine {
    view: CampGroupsView,
}

impl MutationEngine {
    pub fn new(view: CampGroupsView) -> Self {
        Self { view }
    }

    pub fn view(&self) -> &CampGroupsView {
        &self.view
    }

    fn app(&self) -> &AppState {
        self.view.app()
    }

    /// Token for a write; `None` in demo mode. Without a token the error
    /// says whether the device is offline or the session expired.
    pub(crate) async fn write_token(&self) -> Result<Option<String>, CoreError> {
        match ensure_token(self.app().auth.as_ref()) {
            Ok(token) => Ok(token),
            Err(_) => Err(self.unavailable_error().await),
        }
    }

    async fn unavailable_error(&self) -> CoreError {
        if self.app().network.check_network_status().await {
            CoreError::auth_expired()
        } else {
            CoreError::offline()
        }
    }

    /// Where `field` lives for a member of `section_id`. The section type is
    /// the member's own, never the first event's.
    pub(crate) async fn build_member_context(
        &self,
        section_id: &str,
        field: &str,
        token: Option<&str>,
    ) -> Result<FlexiWriteContext, CoreError> {
        let sections: Vec<Section> = self.app().store.get(keys::SECTIONS, Vec::new());
        let section_type = find_member_section_type(section_id, &sections).map(|t| t.as_str().to_string());

        if self.app().auth.is_demo_mode() {
            return Ok(self.demo_context(section_id, field, section_type));
        }

        let (flexi_record_id, column_id, table_term, table_type) = self
            .view
            .with_flexi(|flexi| {
                flexi.table(section_id).map(|table| {
                    (
                        table.flexi_record_id.clone(),
                        table.structure.column_for(field).map(str::to_string),
                        table.term_id.clone(),
                        table.section_type.clone(),
                    )
                })
            })
            .ok_or_else(|| {
                CoreError::structure_missing(format!("no Viking Event Mgmt data for section {section_id}"))
            })?;
        let column_id = column_id.ok_or_else(|| {
            CoreError::structure_missing(format!("no {field} column for section {section_id}"))
        })?;
        let section_type = section_type.or(table_type).ok_or_else(|| {
            CoreError::Validation(format!("Could not determine the section type for section {section_id}"))
        })?;
        let term_id = match table_term.trim() {
            "" => self.resolve_term(section_id, token).await?,
            term => term.to_string(),
        };

        Ok(FlexiWriteContext {
            flexi_record_id,
            column_id,
            section_id: section_id.to_string(),
            term_id,
            section_type,
        })
    }

    async fn resolve_term(&self, section_id: &str, token: Option<&str>) -> Result<String, CoreError> {
        let missing = || CoreError::Validation(format!("Could not determine the current term for section {section_id}"));
        let token = token.ok_or_else(missing)?;
        let term = self.app().gateway.fetch_most_recent_term_id(section_id, token).await?;
        debug!(category = "camp_groups", section_id, ?term, "Resolved most recent term");
        term.ok_or_else(missing)
    }

    /// Demo writes go wherever the loader will look for them again: the
    /// section's loaded table when there is one, otherwise a demo record
    /// registered in the section's cached catalogue.
    fn demo_context(&self, section_id: &str, field: &str, section_type: Option<String>) -> FlexiWriteContext {
        let section_type = section_type.unwrap_or_else(|| DEMO_SECTION_TYPE.to_string());
        let demo_column = || {
            DEMO_COLUMNS
                .iter()
                .find(|(name, _)| *name == field)
                .map(|(_, column)| column.to_string())
                .unwrap_or_default()
        };

        let loaded = self.view.with_flexi(|flexi| {
            flexi.table(section_id).map(|table| {
                (
                    table.flexi_record_id.clone(),
                    table.term_id.clone(),
                    table.structure.column_for(field).map(str::to_string),
                )
            })
        });
        let (flexi_record_id, term_id, column_id) = match loaded {
            Some((flexi_record_id, term_id, column_id)) => {
                (flexi_record_id, term_id, column_id.unwrap_or_else(demo_column))
            }
            None => {
                let term_id = self
                    .view
                    .events()
                    .iter()
                    .find(|e| e.section_id.trim() == section_id.trim() && !e.term_id.trim().is_empty())
                    .map(|e| e.term_id.clone())
                    .unwrap_or_else(|| DEMO_TERM_ID.to_string());
                self.register_demo_record(section_id);
                self.view.update_flexi(|flexi| {
                    flexi.insert_table(FlexiTable {
                        flexi_record_id: DEMO_FLEXI_RECORD_ID.to_string(),
                        section_id: section_id.to_string(),
                        term_id: term_id.clone(),
                        section_type: Some(section_type.clone()),
                        structure: demo_structure(),
                        items: Vec::new(),
                    });
                });
                (DEMO_FLEXI_RECORD_ID.to_string(), term_id, demo_column())
            }
        };

        FlexiWriteContext {
            flexi_record_id,
            column_id,
            section_id: section_id.to_string(),
            term_id,
            section_type,
        }
    }

    /// Adds the demo record to the section's cached catalogue and caches
    /// its structure, so a cache-only load finds demo data.
    fn register_demo_record(&self, section_id: &str) {
        let store = &self.app().store;
        let lists_key = keys::flexi_lists(section_id);
        let mut records: Vec<FlexiRecordInfo> = store.get(&lists_key, Vec::new());
        if find_viking_record(&records).is_none() {
            records.push(FlexiRecordInfo {
                flexi_record_id: DEMO_FLEXI_RECORD_ID.to_string(),
                name: VIKING_FLEXI_NAME.to_string(),
            });
            store.set(&lists_key, &records);
        }
        let structure_key = keys::flexi_structure(DEMO_FLEXI_RECORD_ID);
        if !store.contains(&structure_key) {
            store.set(&structure_key, &demo_structure());
        }
    }

    /// Sets `field` on the member's in-memory row. Returns the value it
    /// replaces, `None` when the row had to be created.
    pub(crate) fn apply_local(
        &self,
        context: &FlexiWriteContext,
        scout_id: ScoutId,
        field: &str,
        value: &str,
    ) -> Option<String> {
        if !self.view.is_mounted() {
            return None;
        }
        self.view.update_flexi(|flexi| {
            let previous = flexi
                .table(&context.section_id)
                .and_then(|t| t.row(scout_id))
                .and_then(|row| row.field(field).map(str::to_string));
            flexi.update_row(&context.section_id, scout_id, |row| {
                row.set_field(field, &context.column_id, value)
            });
            previous
        })
    }

    pub(crate) fn revert_local(
        &self,
        context: &FlexiWriteContext,
        scout_id: ScoutId,
        field: &str,
        previous: Option<&str>,
    ) {
        if !self.view.is_mounted() {
            return;
        }
        self.view.update_flexi(|flexi| match previous {
            Some(value) => {
                flexi.update_row(&context.section_id, scout_id, |row| {
                    row.set_field(field, &context.column_id, value)
                });
            }
            None => {
                flexi.remove_row(&context.section_id, scout_id);
            }
        });
    }

    /// Records an acknowledged value in the cached Viking Event data. The
    /// cached document is rebuilt, never edited in place.
    pub(crate) fn write_through(&self, context: &FlexiWriteContext, scout_id: ScoutId, field: &str, value: &str) {
        let store = &self.app().store;
        let key = keys::flexi_data(&context.flexi_record_id, &context.section_id, &context.term_id);

        let cached = match store.get_opt::<CachedFlexiData>(&key) {
            Some(cached) => cached,
            None => {
                let loaded = self
                    .view
                    .with_flexi(|f| f.table(&context.section_id).map(|t| t.structure.clone()));
                match loaded {
                    Some(structure) => CachedFlexiData {
                        structure,
                        items: Vec::new(),
                    },
                    None if self.app().auth.is_demo_mode() => CachedFlexiData {
                        structure: demo_structure(),
                        items: Vec::new(),
                    },
                    None => {
                        warn!(category = "flexi", %key, "No cached Viking Event data to update");
                        return;
                    }
                }
            }
        };

        let mut found = false;
        let mut items: Vec<FlexiRow> = cached
            .items
            .iter()
            .map(|row| {
                if row.scout_id == scout_id {
                    found = true;
                    row.clone().with_field(field, &context.column_id, value)
                } else {
                    row.clone()
                }
            })
            .collect();
        if !found {
            items.push(FlexiRow::new(scout_id).with_field(field, &context.column_id, value));
        }

        let updated = CachedFlexiData {
            structure: cached.structure,
            items,
        };
        if !store.set(&key, &updated) {
            warn!(category = "flexi", %key, %scout_id, "Viking Event cache not updated");
        }
    }

    /// Reloads the view from OSM once the remote has had time to settle.
    pub(crate) fn schedule_refresh(&self) {
        let view = self.view.clone();
        let delay = self.app().timings.refresh_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if view.is_mounted() {
                view.refresh().await;
            }
        });
    }
}
