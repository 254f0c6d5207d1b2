use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::lenient;

/// One section's record of an event. Records sharing a `name` across
/// sections make up a single logical event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "eventid", alias = "eventId", default, deserialize_with = "lenient::string")]
    pub event_id: String,
    #[serde(rename = "sectionid", alias = "sectionId", default, deserialize_with = "lenient::string")]
    pub section_id: String,
    #[serde(rename = "termid", alias = "termId", default, deserialize_with = "lenient::string")]
    pub term_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "startdate", alias = "startDate", default)]
    pub start_date: Option<String>,
    #[serde(rename = "sectionname", alias = "sectionName", default)]
    pub section_name: String,
}

impl Event {
    /// Name of the first id that is blank, if any.
    pub fn missing_identifier(&self) -> Option<&'static str> {
        if self.section_id.trim().is_empty() {
            Some("sectionid")
        } else if self.term_id.trim().is_empty() {
            Some("termid")
        } else if self.event_id.trim().is_empty() {
            Some("eventid")
        } else {
            None
        }
    }
}

/// Groups event records into logical events, keyed by display name.
pub fn group_events_by_name(events: &[Event]) -> BTreeMap<String, Vec<Event>> {
    let mut grouped: BTreeMap<String, Vec<Event>> = BTreeMap::new();
    for event in events {
        grouped.entry(event.name.clone()).or_default().push(event.clone());
    }
    grouped
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Term {
    #[serde(rename = "termid", alias = "termId", deserialize_with = "lenient::string")]
    pub term_id: String,
    #[serde(rename = "sectionid", alias = "sectionId", default, deserialize_with = "lenient::string")]
    pub section_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "startdate", alias = "startDate", default)]
    pub start_date: Option<NaiveDate>,
    #[serde(rename = "enddate", alias = "endDate", default)]
    pub end_date: Option<NaiveDate>,
}

impl Term {
    /// The term a section is currently working in: latest end date, then
    /// latest start date.
    pub fn most_recent(terms: &[Term]) -> Option<&Term> {
        terms.iter().max_by_key(|t| (t.end_date, t.start_date))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(id: &str, section: &str, name: &str) -> Event {
        Event {
            event_id: id.into(),
            section_id: section.into(),
            term_id: "t1".into(),
            name: name.into(),
            start_date: None,
            section_name: format!("Section {section}"),
        }
    }

    #[test]
    fn test_group_events_by_name() {
        let events = vec![
            event("1", "s1", "Summer Camp"),
            event("2", "s2", "Summer Camp"),
            event("3", "s1", "Hike"),
        ];
        let grouped = group_events_by_name(&events);
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped["Summer Camp"].len(), 2);
        assert_eq!(grouped["Hike"][0].event_id, "3");
    }

    #[test]
    fn test_missing_identifier() {
        let mut e = event("1", "s1", "Camp");
        assert_eq!(e.missing_identifier(), None);
        e.term_id = " ".into();
        assert_eq!(e.missing_identifier(), Some("termid"));
    }

    #[test]
    fn test_most_recent_term() {
        let terms: Vec<Term> = serde_json::from_value(json!([
            {"termid": "1", "name": "Autumn", "startdate": "2024-09-01", "enddate": "2024-12-20"},
            {"termid": 2, "name": "Spring", "startdate": "2025-01-06", "enddate": "2025-04-04"},
            {"termid": "3", "name": "Summer", "startdate": "2024-04-20", "enddate": "2024-07-20"}
        ]))
        .unwrap();
        assert_eq!(Term::most_recent(&terms).unwrap().term_id, "2");
        assert!(Term::most_recent(&[]).is_none());
    }
}
