//! Camp group projection: attendance + Viking Event rows + member directory
//! in, sorted camp groups out. Pure; recomputed on every state change.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use serde::{Serialize, Serializer};
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use crate::flexi::{FlexiData, FlexiRow};
use crate::models::member::is_group_eligible;
use crate::models::{AttendanceRecord, Member, ScoutId};
use crate::mutation::pending::PendingMove;

pub const UNASSIGNED: &str = "Unassigned";
pub const UNASSIGNED_GROUP_NAME: &str = "Group Unassigned";

/// A camp group's identity. Usually a number, but renamed groups can carry
/// any text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GroupNumber {
    Assigned(String),
    Unassigned,
}

impl GroupNumber {
    /// Empty and "Unassigned" both mean the member has no group.
    pub fn from_camp_group(value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case(UNASSIGNED) {
            GroupNumber::Unassigned
        } else {
            GroupNumber::Assigned(value.to_string())
        }
    }

    /// Parses a display name such as "Group 3".
    pub fn from_group_name(name: &str) -> Self {
        let name = name.trim();
        Self::from_camp_group(name.strip_prefix("Group ").unwrap_or(name))
    }

    /// Value written to the CampGroup column.
    pub fn camp_group_value(&self) -> &str {
        match self {
            GroupNumber::Assigned(value) => value,
            GroupNumber::Unassigned => "",
        }
    }

    pub fn group_name(&self) -> String {
        format!("Group {}", self)
    }

    pub fn is_unassigned(&self) -> bool {
        matches!(self, GroupNumber::Unassigned)
    }

    fn sort_key(&self) -> (u8, u64, String) {
        match self {
            GroupNumber::Assigned(value) => match value.parse::<u64>() {
                Ok(n) => (0, n, String::new()),
                Err(_) => (1, 0, value.to_lowercase()),
            },
            GroupNumber::Unassigned => (2, 0, String::new()),
        }
    }
}

impl fmt::Display for GroupNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupNumber::Assigned(value) => write!(f, "{}", value),
            GroupNumber::Unassigned => write!(f, "{}", UNASSIGNED),
        }
    }
}

impl Serialize for GroupNumber {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectedMember {
    pub scout_id: ScoutId,
    pub firstname: String,
    pub lastname: String,
    pub section_id: String,
    pub section_name: String,
    pub person_type: Option<String>,
    /// Camp group as displayed; "" when unassigned.
    pub camp_group: String,
    pub viking_flexi_data: Option<FlexiRow>,
}

impl ProjectedMember {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.firstname, self.lastname).trim().to_string()
    }

    /// Accents and case are ignored first, so "Émile" sorts with the Es;
    /// the plain lowercase name then orders otherwise-equal names.
    fn sort_key(&self) -> (String, String, ScoutId) {
        let name = self.display_name();
        let folded = name
            .nfkd()
            .filter(|c| !is_combining_mark(*c))
            .collect::<String>()
            .to_lowercase();
        (folded, name.to_lowercase(), self.scout_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CampGroup {
    pub name: String,
    pub number: GroupNumber,
    pub leaders: Vec<ProjectedMember>,
    pub young_people: Vec<ProjectedMember>,
}

impl CampGroup {
    fn empty(number: GroupNumber) -> Self {
        Self {
            name: number.group_name(),
            number,
            leaders: Vec::new(),
            young_people: Vec::new(),
        }
    }

    fn sort_members(&mut self) {
        self.young_people.sort_by_cached_key(ProjectedMember::sort_key);
    }

    pub fn contains(&self, scout_id: ScoutId) -> bool {
        self.young_people.iter().any(|m| m.scout_id == scout_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSummary {
    pub total_groups: usize,
    pub total_members: usize,
    pub total_young_people: usize,
    pub total_leaders: usize,
    pub has_unassigned: bool,
    pub viking_event_data_available: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupProjection {
    pub groups: Vec<CampGroup>,
    pub summary: GroupSummary,
}

impl GroupProjection {
    pub fn get(&self, name: &str) -> Option<&CampGroup> {
        self.groups.iter().find(|g| g.name == name)
    }

    pub fn group_of(&self, scout_id: ScoutId) -> Option<&CampGroup> {
        self.groups.iter().find(|g| g.contains(scout_id))
    }

    pub fn member(&self, scout_id: ScoutId) -> Option<&ProjectedMember> {
        self.groups
            .iter()
            .flat_map(|g| g.young_people.iter())
            .find(|m| m.scout_id == scout_id)
    }

    pub fn group_names(&self) -> Vec<&str> {
        self.groups.iter().map(|g| g.name.as_str()).collect()
    }

    /// Members of a group keyed by section, the shape rename and delete take.
    pub fn members_by_section(&self, group_name: &str) -> BTreeMap<String, Vec<ProjectedMember>> {
        let mut by_section: BTreeMap<String, Vec<ProjectedMember>> = BTreeMap::new();
        if let Some(group) = self.get(group_name) {
            for member in &group.young_people {
                by_section
                    .entry(member.section_id.clone())
                    .or_default()
                    .push(member.clone());
            }
        }
        by_section
    }
}

/// Builds the camp groups for one logical event.
pub fn project_groups(
    roster: &[AttendanceRecord],
    flexi: &FlexiData,
    members: &[Member],
    pending: &[PendingMove],
) -> GroupProjection {
    let mut groups = raw_groups(roster, flexi, members);
    apply_pending_moves(&mut groups, pending);
    let summary = summarize(&groups, flexi.has_any_table());
    GroupProjection { groups, summary }
}

fn raw_groups(roster: &[AttendanceRecord], flexi: &FlexiData, members: &[Member]) -> Vec<CampGroup> {
    let directory: HashMap<ScoutId, &Member> = members.iter().map(|m| (m.scout_id, m)).collect();
    let mut seen: HashSet<ScoutId> = HashSet::new();
    let mut by_number: HashMap<GroupNumber, CampGroup> = HashMap::new();
    by_number.insert(GroupNumber::Unassigned, CampGroup::empty(GroupNumber::Unassigned));

    for record in roster {
        if !seen.insert(record.scout_id) {
            continue;
        }
        let member = directory.get(&record.scout_id);
        let row = flexi.row_for(&record.section_id, record.scout_id);

        let person_type = member.and_then(|m| m.person_type());
        let patrol_id = member.and_then(|m| m.patrol_id).or(row.and_then(|r| r.patrol_id));
        if !is_group_eligible(person_type, patrol_id) {
            continue;
        }

        let camp_group = row.map(|r| r.camp_group.trim().to_string()).unwrap_or_default();
        let number = GroupNumber::from_camp_group(&camp_group);
        let projected = ProjectedMember {
            scout_id: record.scout_id,
            firstname: record.firstname.clone(),
            lastname: record.lastname.clone(),
            section_id: record.section_id.clone(),
            section_name: record.section_name.clone().unwrap_or_default(),
            person_type: member.and_then(|m| m.person_type.clone()),
            camp_group: number.camp_group_value().to_string(),
            viking_flexi_data: row.cloned(),
        };
        by_number
            .entry(number.clone())
            .or_insert_with(|| CampGroup::empty(number))
            .young_people
            .push(projected);
    }

    let mut groups: Vec<CampGroup> = by_number.into_values().collect();
    groups.sort_by_cached_key(|g| g.number.sort_key());
    for group in &mut groups {
        group.sort_members();
    }
    groups
}

/// Moves members the user has moved but OSM has not yet confirmed. Moves
/// for members outside the projection are ignored; a move whose target
/// already holds the member is a no-op.
pub fn apply_pending_moves(groups: &mut Vec<CampGroup>, pending: &[PendingMove]) {
    let mut ordered: Vec<&PendingMove> = pending.iter().collect();
    ordered.sort_by_key(|m| m.timestamp);

    for pending_move in ordered {
        let scout_id = pending_move.member.scout_id;
        let mut moved = None;
        for group in groups.iter_mut() {
            if let Some(pos) = group.young_people.iter().position(|m| m.scout_id == scout_id) {
                moved = Some(group.young_people.remove(pos));
                break;
            }
        }
        let Some(mut member) = moved else { continue };

        let target = &pending_move.to_group_number;
        member.camp_group = target.camp_group_value().to_string();

        let pos = match groups.iter().position(|g| &g.number == target) {
            Some(pos) => pos,
            None => {
                groups.push(CampGroup::empty(target.clone()));
                groups.sort_by_cached_key(|g| g.number.sort_key());
                groups
                    .iter()
                    .position(|g| &g.number == target)
                    .unwrap_or(groups.len() - 1)
            }
        };
        groups[pos].young_people.push(member);
        groups[pos].sort_members();
    }
}

fn summarize(groups: &[CampGroup], viking_event_data_available: bool) -> GroupSummary {
    let total_young_people: usize = groups.iter().map(|g| g.young_people.len()).sum();
    let total_leaders: usize = groups.iter().map(|g| g.leaders.len()).sum();
    GroupSummary {
        total_groups: groups.len(),
        total_members: total_young_people + total_leaders,
        total_young_people,
        total_leaders,
        has_unassigned: groups
            .iter()
            .any(|g| g.number.is_unassigned() && !g.young_people.is_empty()),
        viking_event_data_available,
    }
}
