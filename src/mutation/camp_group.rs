use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{MutationEngine, PendingMove};
use crate::error::CoreError;
use crate::flexi::CAMP_GROUP;
use crate::osm::{AssignOutcome, FlexiWriteContext, assign_member_to_camp_group};
use crate::projection::{GroupNumber, ProjectedMember};

/// A drop of one member onto a camp group.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveRequest {
    pub member: ProjectedMember,
    pub from_group_number: GroupNumber,
    pub from_group_name: String,
    pub to_group_number: GroupNumber,
    pub to_group_name: String,
}

impl MoveRequest {
    pub fn new(member: ProjectedMember, from: GroupNumber, to: GroupNumber) -> Self {
        Self {
            member,
            from_group_name: from.group_name(),
            from_group_number: from,
            to_group_name: to.group_name(),
            to_group_number: to,
        }
    }
}

impl MutationEngine {
    /// Moves a member to another camp group. Always ends with exactly one
    /// toast; the result mirrors it for callers that want to react.
    pub async fn assign_to_group(&self, request: MoveRequest) -> Result<(), CoreError> {
        let correlation_id = Uuid::new_v4();
        self.mutation_started();
        let result = self.move_member(&request, correlation_id).await;
        self.mutation_finished();

        match &result {
            Ok(()) => self.app().notifier.notify_success(&format!(
                "{} moved to {}",
                request.member.firstname, request.to_group_name
            )),
            Err(e) => {
                warn!(category = "camp_groups", %correlation_id, error = %e, "Move failed");
                self.app().notifier.notify_error(&e.message());
            }
        }
        result
    }

    async fn move_member(&self, request: &MoveRequest, correlation_id: Uuid) -> Result<(), CoreError> {
        let member = &request.member;
        self.validate_move(request)?;
        let token = self.write_token().await?;
        let context = self
            .build_member_context(&member.section_id, CAMP_GROUP, token.as_deref())
            .await?;

        info!(
            category = "camp_groups",
            %correlation_id,
            scout_id = %member.scout_id,
            from = %request.from_group_number,
            to = %request.to_group_number,
            "Moving member"
        );
        let outcome = self
            .write_camp_group(member, &request.to_group_number, &context, token.as_deref())
            .await;

        if outcome.success {
            Ok(())
        } else {
            let reason = outcome.error.unwrap_or_else(|| "Unknown error".to_string());
            Err(CoreError::RemoteRejection(format!(
                "Failed to move {}: {}",
                member.firstname, reason
            )))
        }
    }

    /// Rejects moves into the member's current group and into groups that
    /// do not exist.
    fn validate_move(&self, request: &MoveRequest) -> Result<(), CoreError> {
        let projection = self.view.groups();
        let member = &request.member;
        let Some(current) = projection.group_of(member.scout_id) else {
            return Err(CoreError::Validation(format!(
                "{} is not in any camp group for this event",
                member.firstname
            )));
        };
        if current.number == request.to_group_number {
            return Err(CoreError::Validation(format!(
                "{} is already in {}",
                member.firstname, request.to_group_name
            )));
        }
        let target_exists = request.to_group_number.is_unassigned()
            || projection.groups.iter().any(|g| g.number == request.to_group_number);
        if !target_exists {
            return Err(CoreError::Validation(format!(
                "{} does not exist",
                request.to_group_name
            )));
        }
        Ok(())
    }

    /// Optimistic apply, remote write, then write-through or revert. The
    /// pending move outlives a successful write by the settle delay.
    pub(crate) async fn write_camp_group(
        &self,
        member: &ProjectedMember,
        to: &GroupNumber,
        context: &FlexiWriteContext,
        token: Option<&str>,
    ) -> AssignOutcome {
        let value = to.camp_group_value();
        let previous = self.apply_local(context, member.scout_id, CAMP_GROUP, value);

        let timestamp = Utc::now();
        let pending = PendingMove {
            move_id: PendingMove::move_id_for(member, timestamp),
            event_name: self.view.event_name().to_string(),
            member: member.clone(),
            from_group_number: GroupNumber::from_camp_group(&member.camp_group),
            to_group_number: to.clone(),
            context: context.clone(),
            timestamp,
        };
        let move_id = pending.move_id.clone();
        self.app().pending.insert(pending);

        let outcome = match token {
            Some(token) => {
                assign_member_to_camp_group(self.app().gateway.as_ref(), member.scout_id, value, context, token)
                    .await
            }
            None => AssignOutcome {
                success: true,
                error: None,
                duration: Duration::ZERO,
            },
        };

        if outcome.success {
            // A refresh may have replaced the optimistic row while the write
            // was in flight.
            self.apply_local(context, member.scout_id, CAMP_GROUP, value);
            self.write_through(context, member.scout_id, CAMP_GROUP, value);
            self.settle_pending(move_id);
        } else {
            self.revert_local(context, member.scout_id, CAMP_GROUP, previous.as_deref());
            self.app().pending.remove(&move_id);
        }
        outcome
    }

    fn settle_pending(&self, move_id: String) {
        let pending = self.app().pending.clone();
        let settle = self.app().timings.pending_settle;
        tokio::spawn(async move {
            tokio::time::sleep(settle).await;
            if pending.remove(&move_id).is_some() {
                debug!(category = "camp_groups", %move_id, "Pending move settled");
            }
        });
    }
}
