use tracing::debug;

use super::MutationEngine;
use crate::error::CoreError;
use crate::models::ScoutId;

/// Advisory drag flags for the drag-and-drop collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DragState {
    pub is_drag_in_progress: bool,
    pub dragging_member: Option<ScoutId>,
    /// Bumped by every drag start and every mutation, so a safety timer can
    /// tell whether anything happened since it was armed.
    epoch: u64,
}

impl MutationEngine {
    pub fn drag_state(&self) -> DragState {
        self.view.drag().clone()
    }

    /// Starts dragging `scout_id`. Refused while an earlier move of this
    /// event is unsettled, or when a drop could not be saved anyway.
    pub async fn begin_drag(&self, scout_id: ScoutId) -> Result<(), CoreError> {
        if self.app().pending.has_pending_for(self.view.event_name()) {
            return Err(CoreError::Validation(
                "Please wait for the previous move to finish".to_string(),
            ));
        }
        self.write_token().await?;

        let mut drag = self.view.drag();
        drag.is_drag_in_progress = true;
        drag.dragging_member = Some(scout_id);
        drag.epoch += 1;
        Ok(())
    }

    /// Ends the drag. If no mutation follows within the drag safety window
    /// (a drop on the same group or outside any zone), the dragging member
    /// is cleared.
    pub fn end_drag(&self) {
        let epoch = {
            let mut drag = self.view.drag();
            drag.is_drag_in_progress = false;
            drag.epoch
        };
        let view = self.view.clone();
        let delay = self.app().timings.drag_safety;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let mut drag = view.drag();
            if drag.epoch == epoch && drag.dragging_member.is_some() {
                debug!(category = "camp_groups", "Drag safety timer cleared dragging member");
                drag.dragging_member = None;
            }
        });
    }

    /// Called when a mutation starts: disarms any safety timer.
    pub(crate) fn mutation_started(&self) {
        self.view.drag().epoch += 1;
    }

    pub(crate) fn mutation_finished(&self) {
        let mut drag = self.view.drag();
        drag.dragging_member = None;
        drag.is_drag_in_progress = false;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::mutation::MoveRequest;
    use crate::projection::GroupNumber;
    use crate::testing::{Harness, event};

    #[tokio::test(start_paused = true)]
    async fn test_safety_timer_clears_dragging_member() {
        let h = Harness::new();
        let view = h.open_view(&[event("e1", "s1", "t1", "Camp")]).await;
        let engine = view.mutations();

        engine.begin_drag(ScoutId(101)).await.unwrap();
        assert!(engine.drag_state().is_drag_in_progress);
        engine.end_drag();
        assert!(!engine.drag_state().is_drag_in_progress);
        assert_eq!(engine.drag_state().dragging_member, Some(ScoutId(101)));

        tokio::time::sleep(Duration::from_millis(3100)).await;
        assert_eq!(engine.drag_state().dragging_member, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mutation_disarms_safety_timer() {
        let h = Harness::new();
        let view = h.open_view(&[event("e1", "s1", "t1", "Camp")]).await;
        let engine = view.mutations();

        engine.begin_drag(ScoutId(101)).await.unwrap();
        engine.end_drag();
        engine.mutation_started();
        tokio::time::sleep(Duration::from_millis(3100)).await;
        assert_eq!(engine.drag_state().dragging_member, Some(ScoutId(101)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drag_refused_while_move_pending() {
        let h = Harness::new();
        h.seed_section("s1", "t1", "e1", &[(101, "Alice", "1"), (102, "Bob", "2")]);
        let view = h.open_view(&[event("e1", "s1", "t1", "Camp")]).await;
        let engine = view.mutations();

        let bob = view.groups().member(ScoutId(102)).unwrap().clone();
        engine
            .assign_to_group(MoveRequest::new(bob, GroupNumber::from_camp_group("2"), GroupNumber::from_camp_group("1")))
            .await
            .unwrap();

        let err = engine.begin_drag(ScoutId(101)).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(engine.begin_drag(ScoutId(101)).await.is_ok());
    }

    #[tokio::test]
    async fn test_drag_refused_without_token() {
        let h = Harness::new();
        h.auth.clear_token();
        h.set_online(false);
        let view = h.open_view(&[event("e1", "s1", "t1", "Camp")]).await;

        let err = view.mutations().begin_drag(ScoutId(101)).await.unwrap_err();
        assert_eq!(err, CoreError::offline());
        assert_eq!(view.mutations().drag_state(), DragState::default());
    }
}
