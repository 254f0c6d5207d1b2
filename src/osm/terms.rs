use super::{OsmClient, reject_error_body};
use crate::error::CoreError;
use crate::models::Term;

/// Terms come back keyed by section id; only `section_id`'s are read.
pub async fn fetch_most_recent_term_id(
    client: &OsmClient,
    section_id: &str,
    token: &str,
) -> Result<Option<String>, CoreError> {
    let body = reject_error_body(client.get_json("get-terms", &[], token).await?)?;
    let terms: Vec<Term> = match body.get(section_id) {
        Some(list) => serde_json::from_value(list.clone())
            .map_err(|e| CoreError::RemoteRejection(format!("Unexpected terms response: {e}")))?,
        None => return Ok(None),
    };
    Ok(Term::most_recent(&terms).map(|t| t.term_id.clone()))
}
