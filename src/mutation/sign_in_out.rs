use chrono::{SecondsFormat, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use super::MutationEngine;
use crate::error::CoreError;
use crate::flexi::{SIGNED_IN_BY, SIGNED_IN_WHEN, SIGNED_OUT_BY, SIGNED_OUT_WHEN};
use crate::osm::{FlexiUpdate, FlexiWriteContext, is_success_shape, rejection_message};
use crate::projection::ProjectedMember;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignAction {
    SignIn,
    SignOut,
}

impl SignAction {
    /// The `By` and `When` fields this action stamps.
    fn fields(self) -> (&'static str, &'static str) {
        match self {
            SignAction::SignIn => (SIGNED_IN_BY, SIGNED_IN_WHEN),
            SignAction::SignOut => (SIGNED_OUT_BY, SIGNED_OUT_WHEN),
        }
    }

    fn verb(self) -> &'static str {
        match self {
            SignAction::SignIn => "sign in",
            SignAction::SignOut => "sign out",
        }
    }

    fn past_tense(self) -> &'static str {
        match self {
            SignAction::SignIn => "signed in",
            SignAction::SignOut => "signed out",
        }
    }
}

impl MutationEngine {
    pub async fn sign_in(&self, member: &ProjectedMember) -> Result<(), CoreError> {
        self.sign(member, SignAction::SignIn).await
    }

    pub async fn sign_out(&self, member: &ProjectedMember) -> Result<(), CoreError> {
        self.sign(member, SignAction::SignOut).await
    }

    pub async fn sign(&self, member: &ProjectedMember, action: SignAction) -> Result<(), CoreError> {
        let correlation_id = Uuid::new_v4();
        let result = self.stamp(member, action, correlation_id).await;
        match &result {
            Ok(()) => self
                .app()
                .notifier
                .notify_success(&format!("{} {}", member.firstname, action.past_tense())),
            Err(e) => {
                warn!(category = "sign_in_out", %correlation_id, error = %e, "Sign in/out failed");
                self.app().notifier.notify_error(&e.message());
            }
        }
        result
    }

    /// Stamps `By` then `When`. Both are applied locally up front and both
    /// are reverted if either remote write fails.
    async fn stamp(&self, member: &ProjectedMember, action: SignAction, correlation_id: Uuid) -> Result<(), CoreError> {
        let (by_field, when_field) = action.fields();
        let token = self.write_token().await?;
        let by_context = self
            .build_member_context(&member.section_id, by_field, token.as_deref())
            .await?;
        let when_context = self
            .build_member_context(&member.section_id, when_field, token.as_deref())
            .await?;

        let by = self.app().auth.user_display_name();
        let when = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        info!(
            category = "sign_in_out",
            %correlation_id,
            scout_id = %member.scout_id,
            action = action.verb(),
            by = %by,
            "Stamping member"
        );

        let writes = [(by_field, &by_context, by.as_str()), (when_field, &when_context, when.as_str())];
        let previous: Vec<Option<String>> = writes
            .iter()
            .map(|(field, context, value)| self.apply_local(context, member.scout_id, field, value))
            .collect();

        if let Some(token) = token.as_deref() {
            for (_, context, value) in &writes {
                if let Err(e) = self.write_field(member, context, value, token).await {
                    for ((field, context, _), previous) in writes.iter().zip(&previous).rev() {
                        self.revert_local(context, member.scout_id, field, previous.as_deref());
                    }
                    return Err(e.map_message(|m| {
                        format!("Failed to {} {}: {}", action.verb(), member.firstname, m)
                    }));
                }
            }
        }

        for (field, context, value) in &writes {
            self.write_through(context, member.scout_id, field, value);
        }
        Ok(())
    }

    async fn write_field(
        &self,
        member: &ProjectedMember,
        context: &FlexiWriteContext,
        value: &str,
        token: &str,
    ) -> Result<(), CoreError> {
        let update = FlexiUpdate {
            scout_id: member.scout_id,
            value: value.to_string(),
            context: context.clone(),
        };
        let response = self.app().gateway.update_flexi_record(&update, token).await?;
        if is_success_shape(&response) {
            Ok(())
        } else {
            Err(CoreError::RemoteRejection(rejection_message(&response)))
        }
    }
}
