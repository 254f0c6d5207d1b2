//! Cache key schema. These strings are shared with the web client, so they
//! must stay byte-for-byte stable.

pub const SECTIONS: &str = "viking_sections_offline";
pub const USER_PREFERENCES: &str = "viking_user_preferences";

pub const ATTENDANCE_PREFIX: &str = "viking_attendance_";
pub const FLEXI_DATA_PREFIX: &str = "viking_flexi_data_";
pub const SHARED_METADATA_PREFIX: &str = "viking_shared_metadata_";
pub const ASSIGNMENT_DRAFT_PREFIX: &str = "viking_assignment_draft_";

pub fn attendance(section_id: &str, term_id: &str, event_id: &str) -> String {
    format!("{ATTENDANCE_PREFIX}{section_id}_{term_id}_{event_id}_offline")
}

pub fn flexi_data(flexi_record_id: &str, section_id: &str, term_id: &str) -> String {
    format!("{FLEXI_DATA_PREFIX}{flexi_record_id}_{section_id}_{term_id}_offline")
}

pub fn flexi_lists(section_id: &str) -> String {
    format!("viking_flexi_lists_{section_id}_offline")
}

pub fn flexi_structure(flexi_record_id: &str) -> String {
    format!("viking_flexi_structure_{flexi_record_id}_offline")
}

pub fn shared_metadata(event_id: &str) -> String {
    format!("{SHARED_METADATA_PREFIX}{event_id}")
}

pub fn assignment_draft(term_type: &str, term_year: &str) -> String {
    format!("{ASSIGNMENT_DRAFT_PREFIX}{term_type}_{term_year}")
}
