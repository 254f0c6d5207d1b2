use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{ScoutId, lenient};

/// Patrol ids OSM uses for leader, young-leader and unassigned-adult pseudo
/// patrols. Members in them never take part in camp groups.
pub const SPECIAL_PATROL_IDS: [i64; 3] = [-2, -3, -99];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PersonType {
    YoungPeople,
    YoungLeaders,
    Leaders,
}

impl PersonType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PersonType::YoungPeople => "Young People",
            PersonType::YoungLeaders => "Young Leaders",
            PersonType::Leaders => "Leaders",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Young People" => Some(PersonType::YoungPeople),
            "Young Leaders" => Some(PersonType::YoungLeaders),
            "Leaders" => Some(PersonType::Leaders),
            _ => None,
        }
    }
}

/// A member directory entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    #[serde(rename = "scoutid", alias = "scoutId")]
    pub scout_id: ScoutId,
    #[serde(default, deserialize_with = "lenient::string")]
    pub firstname: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub lastname: String,
    #[serde(rename = "sectionid", alias = "sectionId", default, deserialize_with = "lenient::string")]
    pub section_id: String,
    #[serde(alias = "personType", default)]
    pub person_type: Option<String>,
    #[serde(alias = "dateOfBirth", default)]
    pub date_of_birth: Option<String>,
    #[serde(alias = "patrolId", alias = "patrolid", default, deserialize_with = "lenient::opt_i64")]
    pub patrol_id: Option<i64>,
    /// Contact details and anything else the directory carries.
    #[serde(flatten)]
    pub contact: Map<String, Value>,
}

impl Member {
    pub fn person_type(&self) -> Option<PersonType> {
        self.person_type.as_deref().and_then(PersonType::parse)
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.firstname, self.lastname).trim().to_string()
    }
}

/// Whether a member may be placed into a camp group.
pub fn is_group_eligible(person_type: Option<PersonType>, patrol_id: Option<i64>) -> bool {
    if matches!(person_type, Some(PersonType::Leaders) | Some(PersonType::YoungLeaders)) {
        return false;
    }
    !patrol_id.is_some_and(|id| SPECIAL_PATROL_IDS.contains(&id))
}
