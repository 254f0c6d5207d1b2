use crate::models::{Section, SectionType};

fn find_section<'a>(section_id: &str, sections: &'a [Section]) -> Option<&'a Section> {
    let wanted = section_id.trim();
    sections.iter().find(|s| s.section_id.trim() == wanted)
}

/// Section type for a member's own section, from the sections manifest.
pub fn find_member_section_type(section_id: &str, sections: &[Section]) -> Option<SectionType> {
    find_section(section_id, sections).and_then(Section::kind)
}

pub fn find_member_section_name(section_id: &str, sections: &[Section]) -> Option<String> {
    find_section(section_id, sections)
        .map(|s| s.section_name.clone())
        .filter(|name| !name.is_empty())
}
