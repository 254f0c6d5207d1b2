use std::collections::BTreeMap;

use tracing::{info, warn};
use uuid::Uuid;

use super::MutationEngine;
use crate::error::CoreError;
use crate::flexi::CAMP_GROUP;
use crate::projection::{GroupNumber, ProjectedMember};

impl MutationEngine {
    /// Empties a camp group by moving each member to Unassigned. The batch
    /// endpoint refuses empty values, so members are written one at a time
    /// with a pause between calls.
    pub async fn delete_group(
        &self,
        group_name: &str,
        members_by_section: &BTreeMap<String, Vec<ProjectedMember>>,
    ) -> Result<(), CoreError> {
        let correlation_id = Uuid::new_v4();
        let Some(_gate) = self.view.try_begin_group_edit() else {
            let err = CoreError::Validation("Another group change is still in progress".to_string());
            self.app().notifier.notify_error(&err.message());
            return Err(err);
        };
        self.mutation_started();

        let result = self.delete_members(group_name, members_by_section, correlation_id).await;
        self.mutation_finished();
        match &result {
            Ok(moved) => self.app().notifier.notify_success(&format!(
                "Successfully deleted \"{}\" - {} members moved to Unassigned",
                group_name, moved
            )),
            Err(e) => {
                warn!(category = "camp_groups", %correlation_id, error = %e, "Delete failed");
                self.app().notifier.notify_error(&e.message());
            }
        }
        result.map(|_| ())
    }

    async fn delete_members(
        &self,
        group_name: &str,
        members_by_section: &BTreeMap<String, Vec<ProjectedMember>>,
        correlation_id: Uuid,
    ) -> Result<usize, CoreError> {
        if GroupNumber::from_group_name(group_name).is_unassigned() {
            return Err(CoreError::Validation(format!("{} cannot be deleted", group_name)));
        }
        if self.view.groups().get(group_name).is_none() {
            return Err(CoreError::Validation(format!("{} does not exist", group_name)));
        }
        let token = self.write_token().await?;

        let mut contexts = Vec::new();
        for (section_id, members) in members_by_section {
            if members.is_empty() {
                continue;
            }
            let context = self
                .build_member_context(section_id, CAMP_GROUP, token.as_deref())
                .await?;
            contexts.push((section_id, members, context));
        }

        let total: usize = contexts.iter().map(|(_, members, _)| members.len()).sum();
        info!(category = "camp_groups", %correlation_id, group_name, total, "Deleting group");

        let pacing = self.app().timings.delete_pacing;
        let mut moved = 0;
        let mut failed_sections = 0;
        let mut errors = Vec::new();
        let mut first_call = true;

        for (section_id, members, context) in &contexts {
            let mut section_ok = true;
            for member in members.iter() {
                if !first_call && token.is_some() {
                    tokio::time::sleep(pacing).await;
                }
                first_call = false;

                let outcome = self
                    .write_camp_group(member, &GroupNumber::Unassigned, context, token.as_deref())
                    .await;
                if outcome.success {
                    moved += 1;
                } else {
                    section_ok = false;
                    errors.push(format!(
                        "{}: {}",
                        member.firstname,
                        outcome.error.unwrap_or_else(|| "Unknown error".to_string())
                    ));
                }
            }
            if !section_ok {
                warn!(category = "camp_groups", %correlation_id, section_id = %section_id, "Section delete incomplete");
                failed_sections += 1;
            }
        }

        if moved > 0 {
            self.schedule_refresh();
        }
        if failed_sections == 0 {
            Ok(moved)
        } else {
            Err(CoreError::RemoteRejection(format!(
                "Failed to delete \"{}\": {} of {} members moved to Unassigned, {} sections incomplete ({})",
                group_name,
                moved,
                total,
                failed_sections,
                errors.join("; ")
            )))
        }
    }
}
