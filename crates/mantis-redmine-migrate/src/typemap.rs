//! Built-in MantisBT enumeration labels and the fixed Mantis→Redmine
//! translation tables.
//!
//! Mantis stores its enumerations (status, priority, access level, ...) as
//! integer codes in bug/user rows; the names live in application config, not
//! in the database. The tables here reproduce the stock 1.2 enumeration so
//! candidates shown to the operator carry readable labels. Sites with custom
//! enumerations fall back to `"<kind> <code>"`.

use crate::mapping::TargetOption;

/// Label for a Mantis bug status code.
pub fn status_label(code: i64) -> String {
    match code {
        10 => "new".to_string(),
        20 => "feedback".to_string(),
        30 => "acknowledged".to_string(),
        40 => "confirmed".to_string(),
        50 => "assigned".to_string(),
        80 => "resolved".to_string(),
        90 => "closed".to_string(),
        _ => format!("status {}", code),
    }
}

/// Label for a Mantis priority code.
pub fn priority_label(code: i64) -> String {
    match code {
        10 => "none".to_string(),
        20 => "low".to_string(),
        30 => "normal".to_string(),
        40 => "high".to_string(),
        50 => "urgent".to_string(),
        60 => "immediate".to_string(),
        _ => format!("priority {}", code),
    }
}

/// Label for a Mantis user access level.
pub fn access_level_label(code: i64) -> String {
    match code {
        10 => "viewer".to_string(),
        25 => "reporter".to_string(),
        40 => "updater".to_string(),
        55 => "developer".to_string(),
        70 => "manager".to_string(),
        90 => "administrator".to_string(),
        _ => format!("access level {}", code),
    }
}

/// Label for a Mantis custom field type code.
pub fn custom_field_type_label(code: i64) -> String {
    match code {
        0 => "string".to_string(),
        1 => "numeric".to_string(),
        2 => "float".to_string(),
        3 => "enumeration".to_string(),
        4 => "email".to_string(),
        5 => "checkbox".to_string(),
        6 => "list".to_string(),
        7 => "multiselection list".to_string(),
        8 => "date".to_string(),
        _ => format!("field type {}", code),
    }
}

/// Label for a Mantis bug relationship type code.
pub fn relation_type_label(code: i64) -> String {
    match code {
        0 => "duplicate of".to_string(),
        1 => "related to".to_string(),
        2 => "parent of".to_string(),
        3 => "child of".to_string(),
        4 => "has duplicate".to_string(),
        _ => format!("relationship {}", code),
    }
}

/// Mantis access level for administrators, used for the membership grant pass.
pub const ADMIN_ACCESS_LEVEL: i64 = 90;

/// Mantis custom field type code for checkboxes, subject to the list override.
pub const CHECKBOX_FIELD_TYPE: i64 = 5;

/// The Redmine custom field formats a Mantis field type can translate into.
///
/// Ids are synthetic ordinals; only the labels are written to the target.
pub fn field_format_options() -> Vec<TargetOption> {
    ["string", "int", "float", "list", "date", "bool"]
        .iter()
        .enumerate()
        .map(|(i, name)| TargetOption::new(i as i64 + 1, *name))
        .collect()
}

/// Fixed translation from a Mantis custom field type code to a Redmine
/// field format. Multi-selection lists degrade to plain lists.
pub fn field_format_for_type(code: i64) -> &'static str {
    match code {
        0 => "string",
        1 => "int",
        2 => "float",
        3 => "list",
        4 => "string",
        5 => "bool",
        6 => "list",
        7 => "list",
        8 => "date",
        _ => "string",
    }
}

/// The Redmine relation names a Mantis relationship type can translate into.
pub fn relation_options() -> Vec<TargetOption> {
    ["relates", "duplicates", "blocks", "precedes"]
        .iter()
        .enumerate()
        .map(|(i, name)| TargetOption::new(i as i64 + 1, *name))
        .collect()
}

/// Fixed translation from a Mantis relationship type code to a Redmine
/// relation name. Parent/child links flatten to plain relations.
pub fn relation_for_type(code: i64) -> &'static str {
    match code {
        0 => "duplicates",
        1 => "relates",
        2 => "relates",
        3 => "relates",
        4 => "duplicates",
        _ => "relates",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_labels() {
        assert_eq!(status_label(10), "new");
        assert_eq!(status_label(80), "resolved");
        assert_eq!(status_label(90), "closed");
        assert_eq!(status_label(85), "status 85");
    }

    #[test]
    fn test_priority_labels() {
        assert_eq!(priority_label(30), "normal");
        assert_eq!(priority_label(60), "immediate");
        assert_eq!(priority_label(99), "priority 99");
    }

    #[test]
    fn test_access_level_labels() {
        assert_eq!(access_level_label(25), "reporter");
        assert_eq!(access_level_label(90), "administrator");
    }

    #[test]
    fn test_field_format_translation() {
        assert_eq!(field_format_for_type(0), "string");
        assert_eq!(field_format_for_type(1), "int");
        assert_eq!(field_format_for_type(3), "list");
        assert_eq!(field_format_for_type(5), "bool");
        // Multi-selection degrades to a plain list.
        assert_eq!(field_format_for_type(7), "list");
        assert_eq!(field_format_for_type(42), "string");
    }

    #[test]
    fn test_relation_translation() {
        assert_eq!(relation_for_type(0), "duplicates");
        assert_eq!(relation_for_type(1), "relates");
        assert_eq!(relation_for_type(2), "relates");
        assert_eq!(relation_for_type(4), "duplicates");
        assert_eq!(relation_for_type(9), "relates");
    }

    #[test]
    fn test_translation_targets_exist_in_option_tables() {
        let formats = field_format_options();
        for code in 0..=8 {
            let format = field_format_for_type(code);
            assert!(formats.iter().any(|o| o.label == format));
        }
        let relations = relation_options();
        for code in 0..=4 {
            let name = relation_for_type(code);
            assert!(relations.iter().any(|o| o.label == name));
        }
    }
}
