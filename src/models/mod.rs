use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

pub mod attendance;
pub mod event;
pub mod member;
pub mod section;

pub use attendance::{AttendanceRecord, AttendanceStatus, AttendanceSummary};
pub use event::{Event, Term, group_events_by_name};
pub use member::{Member, PersonType};
pub use section::{Section, SectionType};

/// OSM member id. The directory sends numbers, attendance sends strings;
/// both parse to the same value so comparisons are numeric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScoutId(pub i64);

impl fmt::Display for ScoutId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ScoutId {
    fn from(value: i64) -> Self {
        ScoutId(value)
    }
}

impl Serialize for ScoutId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.0)
    }
}

impl<'de> Deserialize<'de> for ScoutId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let parsed = match &value {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        };
        parsed
            .map(ScoutId)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid scout id: {value}")))
    }
}

/// Deserializers for OSM's loosely typed JSON.
pub(crate) mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn to_text(value: &Value) -> String {
        match value {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// Strings, numbers and booleans as text; null as "".
    pub fn string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        Ok(to_text(&Value::deserialize(deserializer)?))
    }

    pub fn opt_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            Value::Null => None,
            other => Some(to_text(&other)),
        })
    }

    pub fn opt_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scout_id_accepts_numbers_and_strings() {
        let a: ScoutId = serde_json::from_value(serde_json::json!(101)).unwrap();
        let b: ScoutId = serde_json::from_value(serde_json::json!("101")).unwrap();
        let c: ScoutId = serde_json::from_value(serde_json::json!(" 101 ")).unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert!(serde_json::from_value::<ScoutId>(serde_json::json!("abc")).is_err());
        assert!(serde_json::from_value::<ScoutId>(serde_json::json!(null)).is_err());
    }
}
