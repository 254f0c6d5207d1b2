use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tokio::time::Instant;
use tracing::{info, warn};

use super::{OsmClient, OsmGateway, is_success_shape, items_of, reject_error_body, rejection_message};
use crate::error::CoreError;
use crate::flexi::{FlexiRecordInfo, FlexiStructure};
use crate::models::ScoutId;

/// Everything OSM needs to locate one column of a member's FlexiRecord row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlexiWriteContext {
    pub flexi_record_id: String,
    pub column_id: String,
    pub section_id: String,
    pub term_id: String,
    pub section_type: String,
}

/// A single-cell write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlexiUpdate {
    pub scout_id: ScoutId,
    pub value: String,
    pub context: FlexiWriteContext,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignOutcome {
    pub success: bool,
    pub error: Option<String>,
    pub duration: Duration,
}

pub async fn get_flexi_records(
    client: &OsmClient,
    section_id: &str,
    token: &str,
) -> Result<Vec<FlexiRecordInfo>, CoreError> {
    let body = client
        .get_json("get-flexi-records", &[("sectionid", section_id), ("archived", "n")], token)
        .await?;
    Ok(items_of(reject_error_body(body)?)
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect())
}

pub async fn get_flexi_structure(
    client: &OsmClient,
    flexi_record_id: &str,
    section_id: &str,
    term_id: &str,
    token: &str,
) -> Result<FlexiStructure, CoreError> {
    let body = client
        .get_json(
            "get-flexi-structure",
            &[("flexirecordid", flexi_record_id), ("sectionid", section_id), ("termid", term_id)],
            token,
        )
        .await?;
    let body = reject_error_body(body)?;
    let config = body["config"].as_str().ok_or_else(|| {
        CoreError::RemoteRejection(format!("FlexiRecord {flexi_record_id} has no column config"))
    })?;
    let name = body["name"].as_str().unwrap_or_default();
    FlexiStructure::from_osm_config(flexi_record_id, name, config).map_err(|e| {
        CoreError::RemoteRejection(format!("Unreadable FlexiRecord structure: {e}"))
    })
}

pub async fn get_single_flexi_record(
    client: &OsmClient,
    flexi_record_id: &str,
    section_id: &str,
    term_id: &str,
    token: &str,
) -> Result<Vec<Map<String, Value>>, CoreError> {
    let body = client
        .get_json(
            "get-single-flexi-record",
            &[("flexirecordid", flexi_record_id), ("sectionid", section_id), ("termid", term_id)],
            token,
        )
        .await?;
    Ok(items_of(reject_error_body(body)?)
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(row) => Some(row),
            _ => None,
        })
        .collect())
}

pub async fn update_flexi_record(
    client: &OsmClient,
    update: &FlexiUpdate,
    token: &str,
) -> Result<Value, CoreError> {
    let ctx = &update.context;
    let body = json!({
        "sectionid": ctx.section_id,
        "scoutid": update.scout_id.to_string(),
        "flexirecordid": ctx.flexi_record_id,
        "columnid": ctx.column_id,
        "value": update.value,
        "termid": ctx.term_id,
        "section": ctx.section_type,
    });
    client.post_json("update-flexi-record", &body, token).await
}

pub async fn multi_update_flexi_record(
    client: &OsmClient,
    section_id: &str,
    scout_ids: &[ScoutId],
    value: &str,
    column_id: &str,
    flexi_record_id: &str,
    token: &str,
) -> Result<Value, CoreError> {
    let scouts: Vec<String> = scout_ids.iter().map(ScoutId::to_string).collect();
    let body = json!({
        "sectionid": section_id,
        "scouts": scouts,
        "value": value,
        "column": column_id,
        "flexirecordid": flexi_record_id,
    });
    client.post_json("multi-update-flexi-record", &body, token).await
}

/// Writes one member's camp group and reports how it went. Never fails;
/// the outcome carries the reason instead.
pub async fn assign_member_to_camp_group(
    gateway: &dyn OsmGateway,
    scout_id: ScoutId,
    camp_group: &str,
    context: &FlexiWriteContext,
    token: &str,
) -> AssignOutcome {
    let started = Instant::now();
    let update = FlexiUpdate {
        scout_id,
        value: camp_group.to_string(),
        context: context.clone(),
    };
    let result = gateway.update_flexi_record(&update, token).await;
    let duration = started.elapsed();

    match result {
        Ok(response) if is_success_shape(&response) => {
            info!(
                category = "camp_groups",
                %scout_id,
                camp_group,
                section_id = %context.section_id,
                duration_ms = duration.as_millis() as u64,
                "Camp group written"
            );
            AssignOutcome {
                success: true,
                error: None,
                duration,
            }
        }
        Ok(response) => {
            let error = rejection_message(&response);
            warn!(category = "camp_groups", %scout_id, %error, "Camp group write rejected");
            AssignOutcome {
                success: false,
                error: Some(error),
                duration,
            }
        }
        Err(e) => {
            warn!(category = "camp_groups", %scout_id, error = %e, "Camp group write failed");
            AssignOutcome {
                success: false,
                error: Some(e.message()),
                duration,
            }
        }
    }
}
