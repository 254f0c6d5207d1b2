//! Client for the thin HTTP gateway in front of OSM.

use async_trait::async_trait;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::CoreError;
use crate::flexi::{FlexiRecordInfo, FlexiStructure};
use crate::models::{AttendanceRecord, ScoutId};

pub mod attendance;
pub mod flexi;
pub mod terms;

pub use attendance::SharedAttendance;
pub use flexi::{AssignOutcome, FlexiUpdate, FlexiWriteContext, assign_member_to_camp_group};

/// The OSM calls the core depends on. `token` is always a live access
/// token; callers decide what happens without one.
#[async_trait]
pub trait OsmGateway: Send + Sync {
    async fn get_event_attendance(
        &self,
        section_id: &str,
        event_id: &str,
        term_id: &str,
        token: &str,
    ) -> Result<Vec<AttendanceRecord>, CoreError>;

    async fn get_shared_event_attendance(
        &self,
        event_id: &str,
        section_id: &str,
        token: &str,
    ) -> Result<SharedAttendance, CoreError>;

    async fn get_flexi_records(
        &self,
        section_id: &str,
        token: &str,
    ) -> Result<Vec<FlexiRecordInfo>, CoreError>;

    async fn get_flexi_structure(
        &self,
        flexi_record_id: &str,
        section_id: &str,
        term_id: &str,
        token: &str,
    ) -> Result<FlexiStructure, CoreError>;

    /// Raw rows of a FlexiRecord for one section and term.
    async fn get_single_flexi_record(
        &self,
        flexi_record_id: &str,
        section_id: &str,
        term_id: &str,
        token: &str,
    ) -> Result<Vec<Map<String, Value>>, CoreError>;

    /// Writes one member's cell. Empty values are allowed here.
    async fn update_flexi_record(&self, update: &FlexiUpdate, token: &str) -> Result<Value, CoreError>;

    /// Writes the same value into one column for many members. OSM rejects
    /// empty values on this endpoint.
    async fn multi_update_flexi_record(
        &self,
        section_id: &str,
        scout_ids: &[ScoutId],
        value: &str,
        column_id: &str,
        flexi_record_id: &str,
        token: &str,
    ) -> Result<Value, CoreError>;

    async fn fetch_most_recent_term_id(
        &self,
        section_id: &str,
        token: &str,
    ) -> Result<Option<String>, CoreError>;
}

/// Whether a write response means the write was accepted. OSM answers
/// with several shapes; all of these have been seen for real successes.
pub fn is_success_shape(response: &Value) -> bool {
    let truthy = |v: &Value| v.as_bool() == Some(true);
    if truthy(&response["status"])
        || truthy(&response["success"])
        || truthy(&response["ok"])
        || truthy(&response["data"]["success"])
    {
        return true;
    }
    response["error"].as_bool() == Some(false) && response.get("_rateLimitInfo").is_some()
}

/// Best human-readable reason out of a failed write response.
pub fn rejection_message(response: &Value) -> String {
    for candidate in [&response["error"], &response["message"], &response["data"]["error"]] {
        if let Some(msg) = candidate.as_str() {
            if !msg.is_empty() {
                return msg.to_string();
            }
        }
    }
    "Unexpected response from OSM".to_string()
}

#[derive(Debug, Clone)]
pub struct OsmClient {
    client: reqwest::Client,
    base_url: String,
}

impl OsmClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str, query: &[(&str, &str)]) -> String {
        let query = query
            .iter()
            .map(|(k, v)| format!("{}={}", k, utf8_percent_encode(v, NON_ALPHANUMERIC)))
            .collect::<Vec<_>>()
            .join("&");
        if query.is_empty() {
            format!("{}/{}", self.base_url, path)
        } else {
            format!("{}/{}?{}", self.base_url, path, query)
        }
    }

    pub(crate) async fn get_json(
        &self,
        path: &str,
        query: &[(&str, &str)],
        token: &str,
    ) -> Result<Value, CoreError> {
        let url = self.url(path, query);
        debug!(category = "api", %url, "GET");
        let body = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await?;
        Ok(body)
    }

    pub(crate) async fn post_json(&self, path: &str, body: &Value, token: &str) -> Result<Value, CoreError> {
        let url = self.url(path, &[]);
        debug!(category = "api", %url, "POST");
        let body = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await?;
        Ok(body)
    }
}

/// Rejects bodies that carry an error message instead of data.
pub(crate) fn reject_error_body(body: Value) -> Result<Value, CoreError> {
    match &body["error"] {
        Value::String(msg) if !msg.is_empty() => Err(CoreError::RemoteRejection(msg.clone())),
        Value::Object(obj) => Err(CoreError::RemoteRejection(
            obj.get("message")
                .and_then(Value::as_str)
                .unwrap_or("OSM reported an error")
                .to_string(),
        )),
        _ => Ok(body),
    }
}

/// `items` of a list response; some endpoints answer with a bare array.
pub(crate) fn items_of(body: Value) -> Vec<Value> {
    match body {
        Value::Array(items) => items,
        Value::Object(mut obj) => match obj.remove("items") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

#[async_trait]
impl OsmGateway for OsmClient {
    async fn get_event_attendance(
        &self,
        section_id: &str,
        event_id: &str,
        term_id: &str,
        token: &str,
    ) -> Result<Vec<AttendanceRecord>, CoreError> {
        attendance::get_event_attendance(self, section_id, event_id, term_id, token).await
    }

    async fn get_shared_event_attendance(
        &self,
        event_id: &str,
        section_id: &str,
        token: &str,
    ) -> Result<SharedAttendance, CoreError> {
        attendance::get_shared_event_attendance(self, event_id, section_id, token).await
    }

    async fn get_flexi_records(
        &self,
        section_id: &str,
        token: &str,
    ) -> Result<Vec<FlexiRecordInfo>, CoreError> {
        flexi::get_flexi_records(self, section_id, token).await
    }

    async fn get_flexi_structure(
        &self,
        flexi_record_id: &str,
        section_id: &str,
        term_id: &str,
        token: &str,
    ) -> Result<FlexiStructure, CoreError> {
        flexi::get_flexi_structure(self, flexi_record_id, section_id, term_id, token).await
    }

    async fn get_single_flexi_record(
        &self,
        flexi_record_id: &str,
        section_id: &str,
        term_id: &str,
        token: &str,
    ) -> Result<Vec<Map<String, Value>>, CoreError> {
        flexi::get_single_flexi_record(self, flexi_record_id, section_id, term_id, token).await
    }

    async fn update_flexi_record(&self, update: &FlexiUpdate, token: &str) -> Result<Value, CoreError> {
        flexi::update_flexi_record(self, update, token).await
    }

    async fn multi_update_flexi_record(
        &self,
        section_id: &str,
        scout_ids: &[ScoutId],
        value: &str,
        column_id: &str,
        flexi_record_id: &str,
        token: &str,
    ) -> Result<Value, CoreError> {
        flexi::multi_update_flexi_record(
            self,
            section_id,
            scout_ids,
            value,
            column_id,
            flexi_record_id,
            token,
        )
        .await
    }

    async fn fetch_most_recent_term_id(
        &self,
        section_id: &str,
        token: &str,
    ) -> Result<Option<String>, CoreError> {
        terms::fetch_most_recent_term_id(self, section_id, token).await
    }
}
