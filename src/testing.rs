//! Test doubles: an in-memory OSM, a toast recorder and a ready-wired
//! `AppState`.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tokio::sync::watch;
use tokio::time::Instant;

use crate::attendance::AttendanceLoader;
use crate::auth::SessionAuth;
use crate::config::Timings;
use crate::error::CoreError;
use crate::flexi::{
    CAMP_GROUP, CachedFlexiData, FlexiRecordInfo, FlexiRow, FlexiStructure, SIGNED_IN_BY, SIGNED_IN_WHEN,
    SIGNED_OUT_BY, SIGNED_OUT_WHEN, VIKING_FLEXI_NAME,
};
use crate::models::lenient::to_text;
use crate::models::{AttendanceRecord, Event, ScoutId};
use crate::network::NetworkProbe;
use crate::notify::Notifier;
use crate::osm::{FlexiUpdate, OsmGateway, SharedAttendance, is_success_shape};
use crate::state::AppState;
use crate::storage::{Store, keys};
use crate::util::lock;
use crate::view::CampGroupsView;

pub const FLEXI_ID: &str = "72";

pub fn viking_structure() -> FlexiStructure {
    FlexiStructure {
        flexi_record_id: FLEXI_ID.to_string(),
        name: VIKING_FLEXI_NAME.to_string(),
        field_mapping: [
            ("f_1", CAMP_GROUP),
            ("f_2", SIGNED_IN_BY),
            ("f_3", SIGNED_IN_WHEN),
            ("f_4", SIGNED_OUT_BY),
            ("f_5", SIGNED_OUT_WHEN),
        ]
        .into_iter()
        .map(|(column, field)| (column.to_string(), field.to_string()))
        .collect(),
    }
}

pub fn event(event_id: &str, section_id: &str, term_id: &str, name: &str) -> Event {
    Event {
        event_id: event_id.to_string(),
        section_id: section_id.to_string(),
        term_id: term_id.to_string(),
        name: name.to_string(),
        start_date: Some("2025-07-12".to_string()),
        section_name: format!("Section {section_id}"),
    }
}

pub fn attendance(scout_id: i64, firstname: &str, section_id: &str) -> AttendanceRecord {
    AttendanceRecord {
        scout_id: ScoutId(scout_id),
        firstname: firstname.to_string(),
        lastname: "Test".to_string(),
        section_id: section_id.to_string(),
        section_name: None,
        event_id: String::new(),
        event_name: None,
        event_date: None,
        attending: Some("Yes".to_string()),
        extra: Map::new(),
    }
}

/// A row as `get-single-flexi-record` returns it: `f_<n>` columns only.
pub fn raw_row(scout_id: i64, firstname: &str, camp_group: &str) -> Map<String, Value> {
    let Value::Object(row) = json!({
        "scoutid": scout_id.to_string(),
        "firstname": firstname,
        "lastname": "Test",
        "f_1": camp_group,
        "f_2": "",
        "f_3": "",
        "f_4": "",
        "f_5": ""
    }) else {
        unreachable!()
    };
    row
}

fn sections_manifest() -> Value {
    json!([
        {"sectionid": "s1", "sectionname": "1st Cubs", "sectiontype": "cubs"},
        {"sectionid": "s2", "sectionname": "1st Beavers", "sectiontype": "beavers"},
        {"sectionid": "s9", "sectionname": "Visitors", "sectiontype": "scouts"}
    ])
}

/// Holds gateway calls until released.
#[derive(Clone)]
pub struct Gate(Arc<watch::Sender<bool>>);

impl Gate {
    fn new() -> Self {
        Gate(Arc::new(watch::channel(false).0))
    }

    pub fn release(&self) {
        self.0.send_replace(true);
    }

    async fn wait(&self) {
        let mut rx = self.0.subscribe();
        loop {
            let open = *rx.borrow_and_update();
            if open || rx.changed().await.is_err() {
                break;
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Call {
    pub name: &'static str,
    pub section_id: String,
    pub scout_ids: Vec<ScoutId>,
    pub column_id: String,
    pub value: String,
    pub at: Instant,
}

#[derive(Default)]
struct MockState {
    attendance: HashMap<String, Vec<AttendanceRecord>>,
    shared: HashMap<String, SharedAttendance>,
    flexi_lists: HashMap<String, Vec<FlexiRecordInfo>>,
    structures: HashMap<String, FlexiStructure>,
    rows: HashMap<String, Vec<Map<String, Value>>>,
    terms: HashMap<String, String>,
    update_script: VecDeque<Result<Value, CoreError>>,
    multi_script: VecDeque<Value>,
    read_failure: Option<CoreError>,
    read_gate: Option<Gate>,
    update_gate: Option<Gate>,
    calls: Vec<Call>,
}

/// An OSM that keeps its data in memory and applies accepted writes.
#[derive(Default)]
pub struct MockGateway {
    state: Mutex<MockState>,
}

impl MockGateway {
    pub fn set_attendance(&self, event_id: &str, records: Vec<AttendanceRecord>) {
        lock(&self.state).attendance.insert(event_id.to_string(), records);
    }

    pub fn add_attendance(&self, event_id: &str, record: AttendanceRecord) {
        lock(&self.state)
            .attendance
            .entry(event_id.to_string())
            .or_default()
            .push(record);
    }

    pub fn set_shared_attendance(&self, event_id: &str, shared: SharedAttendance) {
        lock(&self.state).shared.insert(event_id.to_string(), shared);
    }

    /// Gives `section_id` a Viking Event Mgmt record holding `rows`.
    pub fn seed_flexi(&self, section_id: &str, rows: Vec<Map<String, Value>>) {
        let mut state = lock(&self.state);
        state.flexi_lists.insert(
            section_id.to_string(),
            vec![
                FlexiRecordInfo {
                    flexi_record_id: "5".to_string(),
                    name: "Badges".to_string(),
                },
                FlexiRecordInfo {
                    flexi_record_id: FLEXI_ID.to_string(),
                    name: VIKING_FLEXI_NAME.to_string(),
                },
            ],
        );
        state
            .structures
            .entry(FLEXI_ID.to_string())
            .or_insert_with(viking_structure);
        state.rows.insert(section_id.to_string(), rows);
    }

    pub fn remove_viking_record(&self, section_id: &str) {
        lock(&self.state).flexi_lists.insert(
            section_id.to_string(),
            vec![FlexiRecordInfo {
                flexi_record_id: "5".to_string(),
                name: "Badges".to_string(),
            }],
        );
    }

    /// Moves a column to a new id, in the structure and in every row.
    pub fn set_structure_column(&self, flexi_record_id: &str, from: &str, to: &str) {
        let mut state = lock(&self.state);
        if let Some(structure) = state.structures.get_mut(flexi_record_id) {
            if let Some(field) = structure.field_mapping.remove(from) {
                structure.field_mapping.insert(to.to_string(), field);
            }
        }
        for rows in state.rows.values_mut() {
            for row in rows.iter_mut() {
                if let Some(value) = row.remove(from) {
                    row.insert(to.to_string(), value);
                }
            }
        }
    }

    pub fn set_term(&self, section_id: &str, term_id: &str) {
        lock(&self.state).terms.insert(section_id.to_string(), term_id.to_string());
    }

    pub fn fail_reads(&self, error: CoreError) {
        lock(&self.state).read_failure = Some(error);
    }

    /// Queues the response for the next single-cell write.
    pub fn script_update(&self, response: Result<Value, CoreError>) {
        lock(&self.state).update_script.push_back(response);
    }

    pub fn script_multi(&self, response: Value) {
        lock(&self.state).multi_script.push_back(response);
    }

    pub fn hold_reads(&self) -> Gate {
        let gate = Gate::new();
        lock(&self.state).read_gate = Some(gate.clone());
        gate
    }

    pub fn hold_updates(&self) -> Gate {
        let gate = Gate::new();
        lock(&self.state).update_gate = Some(gate.clone());
        gate
    }

    pub fn calls(&self) -> Vec<Call> {
        lock(&self.state).calls.clone()
    }

    pub fn calls_named_list(&self, name: &str) -> Vec<Call> {
        self.calls().into_iter().filter(|c| c.name == name).collect()
    }

    pub fn calls_named(&self, name: &str) -> usize {
        self.calls_named_list(name).len()
    }

    pub fn updates(&self) -> Vec<Call> {
        self.calls_named_list("update_flexi_record")
    }

    pub fn total_calls(&self) -> usize {
        lock(&self.state).calls.len()
    }

    /// Current remote value of a member's column.
    pub fn row_value(&self, section_id: &str, scout_id: ScoutId, column_id: &str) -> Option<String> {
        let state = lock(&self.state);
        state
            .rows
            .get(section_id)?
            .iter()
            .find(|row| row_matches(row, scout_id))
            .and_then(|row| row.get(column_id))
            .map(to_text)
    }

    fn record(&self, name: &'static str, section_id: &str) {
        self.record_write(name, section_id, Vec::new(), "", "");
    }

    fn record_write(&self, name: &'static str, section_id: &str, scout_ids: Vec<ScoutId>, column_id: &str, value: &str) {
        lock(&self.state).calls.push(Call {
            name,
            section_id: section_id.to_string(),
            scout_ids,
            column_id: column_id.to_string(),
            value: value.to_string(),
            at: Instant::now(),
        });
    }

    async fn before_read(&self) -> Result<(), CoreError> {
        let gate = lock(&self.state).read_gate.clone();
        if let Some(gate) = gate {
            gate.wait().await;
        }
        match &lock(&self.state).read_failure {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn apply_write(&self, section_id: &str, scout_id: ScoutId, column_id: &str, value: &str) {
        let mut state = lock(&self.state);
        let rows = state.rows.entry(section_id.to_string()).or_default();
        match rows.iter_mut().find(|row| row_matches(row, scout_id)) {
            Some(row) => {
                row.insert(column_id.to_string(), Value::String(value.to_string()));
            }
            None => {
                let mut row = Map::new();
                row.insert("scoutid".to_string(), Value::String(scout_id.to_string()));
                row.insert(column_id.to_string(), Value::String(value.to_string()));
                rows.push(row);
            }
        }
    }
}

fn row_matches(row: &Map<String, Value>, scout_id: ScoutId) -> bool {
    row.get("scoutid").map(to_text) == Some(scout_id.to_string())
}

#[async_trait]
impl OsmGateway for MockGateway {
    async fn get_event_attendance(
        &self,
        section_id: &str,
        event_id: &str,
        _term_id: &str,
        _token: &str,
    ) -> Result<Vec<AttendanceRecord>, CoreError> {
        self.record("get_event_attendance", section_id);
        self.before_read().await?;
        Ok(lock(&self.state).attendance.get(event_id).cloned().unwrap_or_default())
    }

    async fn get_shared_event_attendance(
        &self,
        event_id: &str,
        section_id: &str,
        _token: &str,
    ) -> Result<SharedAttendance, CoreError> {
        self.record("get_shared_event_attendance", section_id);
        self.before_read().await?;
        Ok(lock(&self.state).shared.get(event_id).cloned().unwrap_or_default())
    }

    async fn get_flexi_records(&self, section_id: &str, _token: &str) -> Result<Vec<FlexiRecordInfo>, CoreError> {
        self.record("get_flexi_records", section_id);
        self.before_read().await?;
        Ok(lock(&self.state).flexi_lists.get(section_id).cloned().unwrap_or_default())
    }

    async fn get_flexi_structure(
        &self,
        flexi_record_id: &str,
        section_id: &str,
        _term_id: &str,
        _token: &str,
    ) -> Result<FlexiStructure, CoreError> {
        self.record("get_flexi_structure", section_id);
        self.before_read().await?;
        lock(&self.state)
            .structures
            .get(flexi_record_id)
            .cloned()
            .ok_or_else(|| CoreError::RemoteRejection(format!("No structure for {flexi_record_id}")))
    }

    async fn get_single_flexi_record(
        &self,
        _flexi_record_id: &str,
        section_id: &str,
        _term_id: &str,
        _token: &str,
    ) -> Result<Vec<Map<String, Value>>, CoreError> {
        self.record("get_single_flexi_record", section_id);
        self.before_read().await?;
        Ok(lock(&self.state).rows.get(section_id).cloned().unwrap_or_default())
    }

    async fn update_flexi_record(&self, update: &FlexiUpdate, _token: &str) -> Result<Value, CoreError> {
        let ctx = &update.context;
        self.record_write(
            "update_flexi_record",
            &ctx.section_id,
            vec![update.scout_id],
            &ctx.column_id,
            &update.value,
        );
        let gate = lock(&self.state).update_gate.clone();
        if let Some(gate) = gate {
            gate.wait().await;
        }

        let response = lock(&self.state)
            .update_script
            .pop_front()
            .unwrap_or_else(|| Ok(json!({"status": true})));
        if let Ok(body) = &response {
            if is_success_shape(body) {
                self.apply_write(&ctx.section_id, update.scout_id, &ctx.column_id, &update.value);
            }
        }
        response
    }

    async fn multi_update_flexi_record(
        &self,
        section_id: &str,
        scout_ids: &[ScoutId],
        value: &str,
        column_id: &str,
        _flexi_record_id: &str,
        _token: &str,
    ) -> Result<Value, CoreError> {
        self.record_write("multi_update_flexi_record", section_id, scout_ids.to_vec(), column_id, value);
        let response = lock(&self.state)
            .multi_script
            .pop_front()
            .unwrap_or_else(|| json!({"error": false, "_rateLimitInfo": {"remaining": 100}}));
        if is_success_shape(&response) {
            for scout_id in scout_ids {
                self.apply_write(section_id, *scout_id, column_id, value);
            }
        }
        Ok(response)
    }

    async fn fetch_most_recent_term_id(&self, section_id: &str, _token: &str) -> Result<Option<String>, CoreError> {
        self.record("fetch_most_recent_term_id", section_id);
        self.before_read().await?;
        Ok(lock(&self.state).terms.get(section_id).cloned())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    toasts: Mutex<Vec<(bool, String)>>,
}

impl RecordingNotifier {
    pub fn successes(&self) -> Vec<String> {
        self.filtered(true)
    }

    pub fn errors(&self) -> Vec<String> {
        self.filtered(false)
    }

    fn filtered(&self, success: bool) -> Vec<String> {
        lock(&self.toasts)
            .iter()
            .filter(|(ok, _)| *ok == success)
            .map(|(_, message)| message.clone())
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify_success(&self, message: &str) {
        lock(&self.toasts).push((true, message.to_string()));
    }

    fn notify_error(&self, message: &str) {
        lock(&self.toasts).push((false, message.to_string()));
    }
}

struct ToggleProbe(Arc<AtomicBool>);

#[async_trait]
impl NetworkProbe for ToggleProbe {
    async fn check_network_status(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// An `AppState` wired to in-memory collaborators, with handles on each.
pub struct Harness {
    pub app: AppState,
    pub gateway: Arc<MockGateway>,
    pub notifier: Arc<RecordingNotifier>,
    pub auth: Arc<SessionAuth>,
    online: Arc<AtomicBool>,
}

impl Harness {
    /// Signed in as "Sam Leader" with a valid token.
    pub fn new() -> Self {
        Self::with_auth(SessionAuth::new(Some("token".to_string()), "Sam Leader"))
    }

    pub fn demo() -> Self {
        Self::with_auth(SessionAuth::demo("Demo Leader"))
    }

    fn with_auth(auth: SessionAuth) -> Self {
        let store = Store::in_memory();
        store.set(keys::SECTIONS, &sections_manifest());
        let gateway = Arc::new(MockGateway::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let auth = Arc::new(auth);
        let online = Arc::new(AtomicBool::new(true));
        let app = AppState::new(
            store,
            gateway.clone(),
            auth.clone(),
            Arc::new(ToggleProbe(online.clone())),
            notifier.clone(),
            Timings::default(),
        );
        Self {
            app,
            gateway,
            notifier,
            auth,
            online,
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn loader(&self) -> AttendanceLoader {
        AttendanceLoader::new(self.app.clone())
    }

    pub async fn open_view(&self, events: &[Event]) -> CampGroupsView {
        CampGroupsView::open(self.app.clone(), events.to_vec(), Vec::new()).await
    }

    /// Puts an event's register and Viking Event rows into the mock OSM.
    /// Rows are `(scoutid, firstname, CampGroup)`.
    pub fn seed_section(&self, section_id: &str, term_id: &str, event_id: &str, rows: &[(i64, &str, &str)]) {
        self.gateway.set_attendance(
            event_id,
            rows.iter()
                .map(|(id, first, _)| attendance(*id, first, section_id))
                .collect(),
        );
        self.gateway.seed_flexi(
            section_id,
            rows.iter().map(|(id, first, cg)| raw_row(*id, first, cg)).collect(),
        );
        self.gateway.set_term(section_id, term_id);
    }

    /// Same data as [`seed_section`](Self::seed_section), but only in the
    /// cache.
    pub fn seed_cache_only(&self, section_id: &str, term_id: &str, event_id: &str, rows: &[(i64, &str, &str)]) {
        let store = &self.app.store;
        let records: Vec<AttendanceRecord> = rows
            .iter()
            .map(|(id, first, _)| attendance(*id, first, section_id))
            .collect();
        store.set(&keys::attendance(section_id, term_id, event_id), &records);
        store.set(
            &keys::flexi_lists(section_id),
            &vec![FlexiRecordInfo {
                flexi_record_id: FLEXI_ID.to_string(),
                name: VIKING_FLEXI_NAME.to_string(),
            }],
        );
        let structure = viking_structure();
        store.set(&keys::flexi_structure(FLEXI_ID), &structure);
        let items: Vec<FlexiRow> = rows
            .iter()
            .filter_map(|(id, first, cg)| FlexiRow::from_raw(raw_row(*id, first, cg), &structure))
            .collect();
        store.set(
            &keys::flexi_data(FLEXI_ID, section_id, term_id),
            &CachedFlexiData { structure, items },
        );
    }
}
