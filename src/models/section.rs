use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::lenient;

/// The section types OSM scopes FlexiRecord writes by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionType {
    EarlyYears,
    Beavers,
    Cubs,
    Scouts,
    Adults,
    WaitingList,
}

impl SectionType {
    /// Spelling the OSM write endpoints expect.
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionType::EarlyYears => "earlyyears",
            SectionType::Beavers => "beavers",
            SectionType::Cubs => "cubs",
            SectionType::Scouts => "scouts",
            SectionType::Adults => "adults",
            SectionType::WaitingList => "waiting",
        }
    }
}

impl FromStr for SectionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "earlyyears" | "squirrels" => Ok(SectionType::EarlyYears),
            "beavers" => Ok(SectionType::Beavers),
            "cubs" => Ok(SectionType::Cubs),
            "scouts" => Ok(SectionType::Scouts),
            "adults" => Ok(SectionType::Adults),
            "waiting" | "waitinglist" => Ok(SectionType::WaitingList),
            _ => Err(format!("Unknown section type: {}", s)),
        }
    }
}

impl fmt::Display for SectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An entry of the sections manifest (`viking_sections_offline`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    #[serde(rename = "sectionid", alias = "sectionId", deserialize_with = "lenient::string")]
    pub section_id: String,
    #[serde(rename = "sectionname", alias = "sectionName", default)]
    pub section_name: String,
    /// Raw type string; manifests carry types the core has no use for.
    #[serde(rename = "sectiontype", alias = "sectionType", default)]
    pub section_type: String,
}

impl Section {
    pub fn kind(&self) -> Option<SectionType> {
        self.section_type.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_type_from_str() {
        assert_eq!("beavers".parse(), Ok(SectionType::Beavers));
        assert_eq!("Cubs".parse(), Ok(SectionType::Cubs));
        assert_eq!("EarlyYears".parse(), Ok(SectionType::EarlyYears));
        assert_eq!("WaitingList".parse(), Ok(SectionType::WaitingList));
        assert_eq!("waiting".parse(), Ok(SectionType::WaitingList));
        assert!("explorers".parse::<SectionType>().is_err());
    }

    #[test]
    fn test_section_from_manifest_json() {
        let section: Section = serde_json::from_value(serde_json::json!({
            "sectionid": 49097,
            "sectionname": "Thursday Beavers",
            "sectiontype": "beavers"
        }))
        .unwrap();
        assert_eq!(section.section_id, "49097");
        assert_eq!(section.kind(), Some(SectionType::Beavers));
    }
}
