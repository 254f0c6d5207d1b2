//! The "Viking Event Mgmt" FlexiRecord: a per-section side-table whose
//! columns carry camp groups and sign-in/out stamps.

use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::{ScoutId, lenient};

pub const VIKING_FLEXI_NAME: &str = "Viking Event Mgmt";

pub const CAMP_GROUP: &str = "CampGroup";
pub const SIGNED_IN_BY: &str = "SignedInBy";
pub const SIGNED_IN_WHEN: &str = "SignedInWhen";
pub const SIGNED_OUT_BY: &str = "SignedOutBy";
pub const SIGNED_OUT_WHEN: &str = "SignedOutWhen";

/// A FlexiRecord known for a section (`viking_flexi_lists_*`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlexiRecordInfo {
    #[serde(rename = "extraid", alias = "flexiRecordId", deserialize_with = "lenient::string")]
    pub flexi_record_id: String,
    #[serde(default)]
    pub name: String,
}

pub fn find_viking_record(records: &[FlexiRecordInfo]) -> Option<&FlexiRecordInfo> {
    records.iter().find(|r| r.name.trim() == VIKING_FLEXI_NAME)
}

/// Column layout of a FlexiRecord: column id (`f_<n>`) to field name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlexiStructure {
    #[serde(rename = "flexiRecordId", default)]
    pub flexi_record_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "fieldMapping", default)]
    pub field_mapping: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct OsmColumn {
    #[serde(deserialize_with = "lenient::string")]
    id: String,
    #[serde(default)]
    name: String,
}

impl FlexiStructure {
    /// Builds the mapping from OSM's `config`, a JSON array encoded as a
    /// string: `[{"id":"f_1","name":"CampGroup"}, ...]`.
    pub fn from_osm_config(
        flexi_record_id: &str,
        name: &str,
        config: &str,
    ) -> Result<Self, serde_json::Error> {
        let columns: Vec<OsmColumn> = serde_json::from_str(config)?;
        Ok(Self {
            flexi_record_id: flexi_record_id.to_string(),
            name: name.to_string(),
            field_mapping: columns
                .into_iter()
                .filter(|c| !c.name.is_empty())
                .map(|c| (c.id, c.name))
                .collect(),
        })
    }

    pub fn column_for(&self, field: &str) -> Option<&str> {
        self.field_mapping
            .iter()
            .find(|(_, name)| name.as_str() == field)
            .map(|(id, _)| id.as_str())
    }
}

/// One member's row. Semantic fields are mirrored from their `f_<n>`
/// columns, which stay in `columns` so the row can be written back as is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlexiRow {
    #[serde(rename = "scoutid", alias = "scoutId")]
    pub scout_id: ScoutId,
    #[serde(default, deserialize_with = "lenient::string")]
    pub firstname: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub lastname: String,
    #[serde(rename = "CampGroup", default, deserialize_with = "lenient::string")]
    pub camp_group: String,
    #[serde(rename = "SignedInBy", default, deserialize_with = "lenient::string")]
    pub signed_in_by: String,
    #[serde(rename = "SignedInWhen", default, deserialize_with = "lenient::string")]
    pub signed_in_when: String,
    #[serde(rename = "SignedOutBy", default, deserialize_with = "lenient::string")]
    pub signed_out_by: String,
    #[serde(rename = "SignedOutWhen", default, deserialize_with = "lenient::string")]
    pub signed_out_when: String,
    #[serde(rename = "patrolid", alias = "patrol_id", default, deserialize_with = "lenient::opt_i64")]
    pub patrol_id: Option<i64>,
    #[serde(flatten)]
    pub columns: Map<String, Value>,
}

impl FlexiRow {
    pub fn new(scout_id: ScoutId) -> Self {
        Self {
            scout_id,
            firstname: String::new(),
            lastname: String::new(),
            camp_group: String::new(),
            signed_in_by: String::new(),
            signed_in_when: String::new(),
            signed_out_by: String::new(),
            signed_out_when: String::new(),
            patrol_id: None,
            columns: Map::new(),
        }
    }

    /// Normalises a raw OSM row, copying every mapped column under its
    /// field name. Rows without a usable scout id are dropped.
    pub fn from_raw(mut raw: Map<String, Value>, structure: &FlexiStructure) -> Option<Self> {
        for (column, field) in &structure.field_mapping {
            if let Some(value) = raw.get(column).cloned() {
                raw.insert(field.clone(), value);
            }
        }
        serde_json::from_value(Value::Object(raw)).ok()
    }

    pub fn field(&self, field: &str) -> Option<&str> {
        match field {
            CAMP_GROUP => Some(&self.camp_group),
            SIGNED_IN_BY => Some(&self.signed_in_by),
            SIGNED_IN_WHEN => Some(&self.signed_in_when),
            SIGNED_OUT_BY => Some(&self.signed_out_by),
            SIGNED_OUT_WHEN => Some(&self.signed_out_when),
            _ => None,
        }
    }

    /// Sets a field and its backing column together.
    pub fn set_field(&mut self, field: &str, column_id: &str, value: &str) {
        match field {
            CAMP_GROUP => self.camp_group = value.to_string(),
            SIGNED_IN_BY => self.signed_in_by = value.to_string(),
            SIGNED_IN_WHEN => self.signed_in_when = value.to_string(),
            SIGNED_OUT_BY => self.signed_out_by = value.to_string(),
            SIGNED_OUT_WHEN => self.signed_out_when = value.to_string(),
            _ => {}
        }
        if !column_id.is_empty() {
            self.columns
                .insert(column_id.to_string(), Value::String(value.to_string()));
        }
    }

    pub fn with_field(mut self, field: &str, column_id: &str, value: &str) -> Self {
        self.set_field(field, column_id, value);
        self
    }
}

/// Cached form of a section's Viking Event data (`viking_flexi_data_*`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CachedFlexiData {
    #[serde(rename = "_structure", default)]
    pub structure: FlexiStructure,
    #[serde(default)]
    pub items: Vec<FlexiRow>,
}

/// A section's Viking Event table plus the context needed to write to it.
#[derive(Debug, Clone, PartialEq)]
pub struct FlexiTable {
    pub flexi_record_id: String,
    pub section_id: String,
    pub term_id: String,
    pub section_type: Option<String>,
    pub structure: FlexiStructure,
    pub items: Vec<FlexiRow>,
}

impl FlexiTable {
    pub fn row(&self, scout_id: ScoutId) -> Option<&FlexiRow> {
        self.items.iter().find(|r| r.scout_id == scout_id)
    }
}

/// Viking Event tables for every section of a logical event, with a lazily
/// built `scoutid -> row` index. The index is rebuilt only after the set of
/// rows changes.
#[derive(Debug, Clone, Default)]
pub struct FlexiData {
    by_section: BTreeMap<String, Option<FlexiTable>>,
    index: OnceLock<HashMap<ScoutId, (String, usize)>>,
}

impl PartialEq for FlexiData {
    fn eq(&self, other: &Self) -> bool {
        self.by_section == other.by_section
    }
}

impl FlexiData {
    pub fn new(by_section: BTreeMap<String, Option<FlexiTable>>) -> Self {
        Self {
            by_section,
            index: OnceLock::new(),
        }
    }

    pub fn sections(&self) -> &BTreeMap<String, Option<FlexiTable>> {
        &self.by_section
    }

    pub fn table(&self, section_id: &str) -> Option<&FlexiTable> {
        self.by_section.get(section_id).and_then(Option::as_ref)
    }

    pub fn has_any_table(&self) -> bool {
        self.by_section.values().any(Option::is_some)
    }

    fn index(&self) -> &HashMap<ScoutId, (String, usize)> {
        self.index.get_or_init(|| {
            let mut index = HashMap::new();
            for (section_id, table) in &self.by_section {
                let Some(table) = table else { continue };
                for (pos, row) in table.items.iter().enumerate() {
                    index
                        .entry(row.scout_id)
                        .or_insert_with(|| (section_id.clone(), pos));
                }
            }
            index
        })
    }

    /// First row for `scout_id` across all sections.
    pub fn lookup(&self, scout_id: ScoutId) -> Option<&FlexiRow> {
        let (section_id, pos) = self.index().get(&scout_id)?;
        self.table(section_id)?.items.get(*pos)
    }

    /// The row in the given section, falling back to any section.
    pub fn row_for(&self, section_id: &str, scout_id: ScoutId) -> Option<&FlexiRow> {
        self.table(section_id)
            .and_then(|t| t.row(scout_id))
            .or_else(|| self.lookup(scout_id))
    }

    /// Applies `update` to the member's row in `section_id`, creating the
    /// row if the table has none yet. Returns false when the section has
    /// no table.
    pub fn update_row(
        &mut self,
        section_id: &str,
        scout_id: ScoutId,
        update: impl FnOnce(&mut FlexiRow),
    ) -> bool {
        let Some(Some(table)) = self.by_section.get_mut(section_id) else {
            return false;
        };
        match table.items.iter_mut().find(|r| r.scout_id == scout_id) {
            Some(row) => update(row),
            None => {
                let mut row = FlexiRow::new(scout_id);
                update(&mut row);
                table.items.push(row);
                self.index = OnceLock::new();
            }
        }
        true
    }

    /// Drops the member's row from `section_id`. Used to undo an optimistic
    /// insert.
    pub fn remove_row(&mut self, section_id: &str, scout_id: ScoutId) -> bool {
        let Some(Some(table)) = self.by_section.get_mut(section_id) else {
            return false;
        };
        let before = table.items.len();
        table.items.retain(|r| r.scout_id != scout_id);
        let removed = table.items.len() != before;
        if removed {
            self.index = OnceLock::new();
        }
        removed
    }

    pub fn insert_table(&mut self, table: FlexiTable) {
        self.by_section.insert(table.section_id.clone(), Some(table));
        self.index = OnceLock::new();
    }
}
