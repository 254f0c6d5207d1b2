//! A mounted camp-groups screen for one logical event. Holds the latest
//! snapshot, guards it against stale refreshes and hands out the mutation
//! engine that edits it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use crate::attendance::{AttendanceLoader, AttendanceSnapshot, Freshness, RefreshTracker, any_shared_event};
use crate::error::CoreError;
use crate::flexi::{FlexiData, FlexiRow};
use crate::models::{AttendanceSummary, Event, Member, ScoutId};
use crate::mutation::{DragState, MutationEngine};
use crate::projection::{GroupProjection, project_groups};
use crate::state::AppState;
use crate::util::fingerprint::events_fingerprint;
use crate::util::lock;

#[derive(Clone)]
pub struct CampGroupsView {
    inner: Arc<ViewInner>,
}

struct ViewInner {
    app: AppState,
    loader: AttendanceLoader,
    event_name: String,
    events: Vec<Event>,
    members: Vec<Member>,
    fingerprint: String,
    snapshot: Mutex<AttendanceSnapshot>,
    drag: Mutex<DragState>,
    mounted: AtomicBool,
    refreshes: RefreshTracker,
    group_edit_loading: AtomicBool,
}

/// Held while a rename or delete runs; other group-level edits are refused
/// until it drops.
pub(crate) struct GroupEditGate<'a>(&'a AtomicBool);

impl Drop for GroupEditGate<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl CampGroupsView {
    /// A mounted view with no data yet. `events` are the section records of
    /// one logical event.
    pub fn new(app: AppState, events: Vec<Event>, members: Vec<Member>) -> Self {
        let event_name = events.first().map(|e| e.name.clone()).unwrap_or_default();
        let fingerprint = events_fingerprint(&events);
        Self {
            inner: Arc::new(ViewInner {
                loader: AttendanceLoader::new(app.clone()),
                app,
                event_name,
                events,
                members,
                fingerprint,
                snapshot: Mutex::new(AttendanceSnapshot::default()),
                drag: Mutex::new(DragState::default()),
                mounted: AtomicBool::new(true),
                refreshes: RefreshTracker::default(),
                group_edit_loading: AtomicBool::new(false),
            }),
        }
    }

    /// Mounts and loads from the cache where possible.
    pub async fn open(app: AppState, events: Vec<Event>, members: Vec<Member>) -> Self {
        let view = Self::new(app, events, members);
        view.load().await;
        view
    }

    pub fn app(&self) -> &AppState {
        &self.inner.app
    }

    pub fn event_name(&self) -> &str {
        &self.inner.event_name
    }

    pub fn events(&self) -> &[Event] {
        &self.inner.events
    }

    pub fn mutations(&self) -> MutationEngine {
        MutationEngine::new(self.clone())
    }

    pub async fn load(&self) -> bool {
        self.run_load(Freshness::PreferCache).await
    }

    pub async fn refresh(&self) -> bool {
        self.run_load(Freshness::PreferRemote).await
    }

    /// Returns whether the result was applied. A load loses to any load
    /// started after it, and to unmounting.
    async fn run_load(&self, freshness: Freshness) -> bool {
        let ticket = self.inner.refreshes.begin(&self.inner.fingerprint);
        let snapshot = self.inner.loader.load(&self.inner.events, freshness).await;

        if !self.is_mounted() || !self.inner.refreshes.is_current(&ticket) {
            debug!(
                category = "attendance",
                event_name = %self.inner.event_name,
                "Discarding stale attendance snapshot"
            );
            return false;
        }
        *lock(&self.inner.snapshot) = snapshot;
        true
    }

    /// Current camp groups, with pending moves laid over the loaded data.
    pub fn groups(&self) -> GroupProjection {
        let pending = self.inner.app.pending.for_event(&self.inner.event_name);
        let snapshot = lock(&self.inner.snapshot);
        project_groups(&snapshot.roster, &snapshot.flexi, &self.inner.members, &pending)
    }

    pub fn lookup_flexi_row(&self, scout_id: ScoutId) -> Option<FlexiRow> {
        lock(&self.inner.snapshot).flexi.lookup(scout_id).cloned()
    }

    pub fn error(&self) -> Option<CoreError> {
        lock(&self.inner.snapshot).error.clone()
    }

    pub fn attendance_summary(&self) -> AttendanceSummary {
        AttendanceSummary::from_records(&lock(&self.inner.snapshot).roster)
    }

    pub fn is_shared(&self) -> bool {
        any_shared_event(&self.inner.app.store, &self.inner.events)
    }

    pub fn is_mounted(&self) -> bool {
        self.inner.mounted.load(Ordering::SeqCst)
    }

    /// In-flight remote writes still finish; their UI updates are skipped.
    pub fn unmount(&self) {
        self.inner.mounted.store(false, Ordering::SeqCst);
    }

    pub fn is_group_edit_loading(&self) -> bool {
        self.inner.group_edit_loading.load(Ordering::SeqCst)
    }

    pub(crate) fn try_begin_group_edit(&self) -> Option<GroupEditGate<'_>> {
        self.inner
            .group_edit_loading
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| GroupEditGate(&self.inner.group_edit_loading))
    }

    pub(crate) fn with_flexi<R>(&self, f: impl FnOnce(&FlexiData) -> R) -> R {
        f(&lock(&self.inner.snapshot).flexi)
    }

    pub(crate) fn update_flexi<R>(&self, f: impl FnOnce(&mut FlexiData) -> R) -> R {
        f(&mut lock(&self.inner.snapshot).flexi)
    }

    pub(crate) fn drag(&self) -> MutexGuard<'_, DragState> {
        lock(&self.inner.drag)
    }

    #[cfg(test)]
    pub(crate) fn replace_snapshot(&self, snapshot: AttendanceSnapshot) {
        *lock(&self.inner.snapshot) = snapshot;
    }
}
