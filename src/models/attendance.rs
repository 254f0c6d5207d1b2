use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{ScoutId, lenient};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttendanceStatus {
    Yes,
    No,
    Invited,
    NotInvited,
}

impl AttendanceStatus {
    pub fn from_attending(attending: Option<&str>) -> Self {
        match attending {
            Some("Yes") | Some("1") => AttendanceStatus::Yes,
            Some("No") => AttendanceStatus::No,
            Some("Invited") => AttendanceStatus::Invited,
            _ => AttendanceStatus::NotInvited,
        }
    }
}

/// A row of an event's attendance register, tagged with the event it
/// came from once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    #[serde(rename = "scoutid", alias = "scoutId")]
    pub scout_id: ScoutId,
    #[serde(default, deserialize_with = "lenient::string")]
    pub firstname: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub lastname: String,
    #[serde(rename = "sectionid", alias = "sectionId", default, deserialize_with = "lenient::string")]
    pub section_id: String,
    #[serde(rename = "sectionname", alias = "sectionName", default)]
    pub section_name: Option<String>,
    #[serde(rename = "eventid", alias = "eventId", default, deserialize_with = "lenient::string")]
    pub event_id: String,
    #[serde(rename = "eventname", alias = "eventName", default)]
    pub event_name: Option<String>,
    #[serde(rename = "eventdate", alias = "eventDate", default)]
    pub event_date: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub attending: Option<String>,
    /// Everything else OSM sends (patrol, age, custom columns).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AttendanceRecord {
    pub fn status(&self) -> AttendanceStatus {
        AttendanceStatus::from_attending(self.attending.as_deref())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSummary {
    pub yes: usize,
    pub no: usize,
    pub invited: usize,
    pub not_invited: usize,
}

impl AttendanceSummary {
    pub fn from_records(records: &[AttendanceRecord]) -> Self {
        records.iter().fold(Self::default(), |mut acc, record| {
            match record.status() {
                AttendanceStatus::Yes => acc.yes += 1,
                AttendanceStatus::No => acc.no += 1,
                AttendanceStatus::Invited => acc.invited += 1,
                AttendanceStatus::NotInvited => acc.not_invited += 1,
            }
            acc
        })
    }

    pub fn total(&self) -> usize {
        self.yes + self.no + self.invited + self.not_invited
    }
}
