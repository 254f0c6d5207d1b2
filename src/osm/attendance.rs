use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{OsmClient, items_of, reject_error_body};
use crate::error::CoreError;
use crate::models::AttendanceRecord;

/// Attendance across every section taking part in a shared event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SharedAttendance {
    #[serde(default)]
    pub items: Vec<AttendanceRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn parse_records(items: Vec<Value>) -> Vec<AttendanceRecord> {
    items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect()
}

pub async fn get_event_attendance(
    client: &OsmClient,
    section_id: &str,
    event_id: &str,
    term_id: &str,
    token: &str,
) -> Result<Vec<AttendanceRecord>, CoreError> {
    let body = client
        .get_json(
            "get-event-attendance",
            &[("sectionid", section_id), ("termid", term_id), ("eventid", event_id)],
            token,
        )
        .await?;
    Ok(parse_records(items_of(reject_error_body(body)?)))
}

pub async fn get_shared_event_attendance(
    client: &OsmClient,
    event_id: &str,
    section_id: &str,
    token: &str,
) -> Result<SharedAttendance, CoreError> {
    let body = client
        .get_json(
            "get-shared-event-attendance",
            &[("eventid", event_id), ("sectionid", section_id)],
            token,
        )
        .await?;
    let error = body["error"].as_str().map(str::to_string);
    Ok(SharedAttendance {
        items: parse_records(items_of(body)),
        error,
    })
}
