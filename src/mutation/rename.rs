use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{info, warn};
use uuid::Uuid;

use super::MutationEngine;
use crate::error::CoreError;
use crate::flexi::CAMP_GROUP;
use crate::models::ScoutId;
use crate::osm::{FlexiWriteContext, is_success_shape, rejection_message};
use crate::projection::{GroupNumber, ProjectedMember};

static COLUMN_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^f_\d+$").expect("column id regex is valid"));

/// OSM silently accepts batch writes to unknown columns, so bad ids are
/// caught here.
pub fn is_valid_column_id(column_id: &str) -> bool {
    COLUMN_ID.is_match(column_id)
}

/// What one section's batch write changed, kept for revert.
struct SectionRename<'a> {
    section_id: &'a str,
    members: &'a [ProjectedMember],
    context: FlexiWriteContext,
    previous: Vec<Option<String>>,
}

impl MutationEngine {
    /// Gives every member of `old_name` the camp group `new_name`, one batch
    /// write per section.
    pub async fn rename_group(
        &self,
        old_name: &str,
        new_name: &str,
        members_by_section: &BTreeMap<String, Vec<ProjectedMember>>,
    ) -> Result<(), CoreError> {
        let correlation_id = Uuid::new_v4();
        let Some(_gate) = self.view.try_begin_group_edit() else {
            let err = CoreError::Validation("Another group change is still in progress".to_string());
            self.app().notifier.notify_error(&err.message());
            return Err(err);
        };
        self.mutation_started();

        let result = self
            .rename_sections(old_name, new_name.trim(), members_by_section, correlation_id)
            .await;
        self.mutation_finished();
        match &result {
            Ok(()) => self.app().notifier.notify_success(&format!(
                "Successfully renamed \"{}\" to \"{}\"",
                old_name,
                new_name.trim()
            )),
            Err(e) => {
                warn!(category = "camp_groups", %correlation_id, error = %e, "Rename failed");
                self.app().notifier.notify_error(&e.message());
            }
        }
        result
    }

    async fn rename_sections(
        &self,
        old_name: &str,
        new_name: &str,
        members_by_section: &BTreeMap<String, Vec<ProjectedMember>>,
        correlation_id: Uuid,
    ) -> Result<(), CoreError> {
        let target = self.validate_rename(old_name, new_name)?;
        if members_by_section.values().all(Vec::is_empty) {
            return Err(CoreError::Validation(format!("{} has no members to rename", old_name)));
        }
        let token = self.write_token().await?;

        let mut sections = Vec::new();
        for (section_id, members) in members_by_section {
            if members.is_empty() {
                continue;
            }
            let context = self
                .build_member_context(section_id, CAMP_GROUP, token.as_deref())
                .await?;
            if !is_valid_column_id(&context.column_id) {
                return Err(CoreError::Validation(format!(
                    "Invalid CampGroup column id \"{}\" for section {}",
                    context.column_id, section_id
                )));
            }
            sections.push(SectionRename {
                section_id,
                members,
                context,
                previous: Vec::new(),
            });
        }

        let value = target.camp_group_value();
        for section in &mut sections {
            section.previous = section
                .members
                .iter()
                .map(|m| self.apply_local(&section.context, m.scout_id, CAMP_GROUP, value))
                .collect();
        }
        info!(
            category = "camp_groups",
            %correlation_id,
            old_name,
            new_name,
            sections = sections.len(),
            "Renaming group"
        );

        let mut succeeded = 0;
        let mut errors = Vec::new();
        for section in &sections {
            let result = match token.as_deref() {
                Some(token) => self.write_section(section, value, token).await,
                None => Ok(()),
            };
            match result {
                Ok(()) => {
                    succeeded += 1;
                    for member in section.members {
                        self.write_through(&section.context, member.scout_id, CAMP_GROUP, value);
                    }
                }
                Err(e) => {
                    warn!(
                        category = "camp_groups",
                        %correlation_id,
                        section_id = section.section_id,
                        error = %e,
                        "Section rename failed"
                    );
                    for (member, previous) in section.members.iter().zip(&section.previous) {
                        self.revert_local(&section.context, member.scout_id, CAMP_GROUP, previous.as_deref());
                    }
                    errors.push(e.message());
                }
            }
        }

        if succeeded > 0 {
            self.schedule_refresh();
        }
        match (succeeded, errors.len()) {
            (_, 0) => Ok(()),
            (0, _) => Err(CoreError::RemoteRejection(format!(
                "Failed to rename \"{}\": {}",
                old_name,
                errors.join("; ")
            ))),
            (ok, failed) => Err(CoreError::RemoteRejection(format!(
                "Partial rename: {} succeeded, {} failed: {}",
                ok,
                failed,
                errors.join("; ")
            ))),
        }
    }

    fn validate_rename(&self, old_name: &str, new_name: &str) -> Result<GroupNumber, CoreError> {
        if new_name.is_empty() {
            return Err(CoreError::Validation("Group name cannot be empty".to_string()));
        }
        let projection = self.view.groups();
        if projection.get(old_name).is_none() {
            return Err(CoreError::Validation(format!("{} does not exist", old_name)));
        }
        let target = GroupNumber::from_camp_group(new_name);
        if target.is_unassigned() {
            return Err(CoreError::Validation(format!("\"{}\" is reserved", new_name)));
        }
        if GroupNumber::from_group_name(old_name) == target {
            return Err(CoreError::Validation(format!("{} already has that name", old_name)));
        }
        if projection.get(&target.group_name()).is_some() {
            return Err(CoreError::Validation(format!(
                "{} already exists",
                target.group_name()
            )));
        }
        Ok(target)
    }

    async fn write_section(&self, section: &SectionRename<'_>, value: &str, token: &str) -> Result<(), CoreError> {
        let scout_ids: Vec<ScoutId> = section.members.iter().map(|m| m.scout_id).collect();
        let response = self
            .app()
            .gateway
            .multi_update_flexi_record(
                section.section_id,
                &scout_ids,
                value,
                &section.context.column_id,
                &section.context.flexi_record_id,
                token,
            )
            .await?;
        if is_success_shape(&response) {
            Ok(())
        } else {
            Err(CoreError::RemoteRejection(format!(
                "Section {}: {}",
                section.section_id,
                rejection_message(&response)
            )))
        }
    }
}
