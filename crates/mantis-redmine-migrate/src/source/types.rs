//! Row types read from the Mantis database.
//!
//! Mantis stores timestamps as unix seconds; `unix_datetime` converts them
//! to the naive UTC form the target expects.

use crate::mapping::Candidate;
use chrono::{DateTime, NaiveDateTime};

/// Convert a unix-seconds timestamp to a naive UTC datetime.
/// Out-of-range values collapse to the epoch.
pub fn unix_datetime(secs: i64) -> NaiveDateTime {
    DateTime::from_timestamp(secs, 0)
        .unwrap_or_default()
        .naive_utc()
}

/// A `mantis_project_table` row.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceProject {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub enabled: bool,
    /// Mantis view state: 10 public, 50 private.
    pub view_state: i64,
}

impl SourceProject {
    pub fn candidate(&self) -> Candidate {
        Candidate::new(self.id, self.name.clone())
            .with_field("description", self.description.clone())
            .with_field("enabled", if self.enabled { "1" } else { "0" })
            .with_field("view_state", self.view_state.to_string())
    }

    pub fn is_public(&self) -> bool {
        self.view_state == 10
    }
}

/// A `mantis_project_version_table` row.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceVersion {
    pub id: i64,
    pub project_id: i64,
    pub version: String,
    /// Unix seconds ordering/release date.
    pub date_order: i64,
    pub description: String,
    pub released: bool,
    pub obsolete: bool,
}

impl SourceVersion {
    pub fn candidate(&self) -> Candidate {
        Candidate::new(self.id, self.version.clone())
            .with_field("project_id", self.project_id.to_string())
            .with_field("date_order", self.date_order.to_string())
            .with_field("description", self.description.clone())
            .with_field("released", if self.released { "1" } else { "0" })
            .with_field("obsolete", if self.obsolete { "1" } else { "0" })
    }

    pub fn effective_date(&self) -> NaiveDateTime {
        unix_datetime(self.date_order)
    }
}

/// A `mantis_category_table` row.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceCategory {
    pub id: i64,
    pub project_id: i64,
    pub name: String,
}

impl SourceCategory {
    pub fn candidate(&self) -> Candidate {
        Candidate::new(self.id, self.name.clone())
            .with_field("project_id", self.project_id.to_string())
    }
}

/// A `mantis_user_table` row.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceUser {
    pub id: i64,
    pub username: String,
    pub realname: String,
    pub email: String,
    pub enabled: bool,
    pub access_level: i64,
}

impl SourceUser {
    pub fn candidate(&self) -> Candidate {
        Candidate::new(self.id, self.username.clone())
            .with_field("realname", self.realname.clone())
            .with_field("email", self.email.clone())
            .with_field("enabled", if self.enabled { "1" } else { "0" })
            .with_field("access_level", self.access_level.to_string())
    }
}

/// A `mantis_bug_table` row joined with its `mantis_bug_text_table` body.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceIssue {
    pub id: i64,
    pub project_id: i64,
    pub reporter_id: i64,
    /// 0 means unassigned.
    pub handler_id: i64,
    pub severity: i64,
    pub priority: i64,
    pub status: i64,
    pub category_id: i64,
    pub date_submitted: i64,
    pub last_updated: i64,
    pub view_state: i64,
    pub summary: String,
    /// Affected version label.
    pub version: String,
    pub fixed_in_version: String,
    pub target_version: String,
    pub description: String,
    pub steps_to_reproduce: String,
    pub additional_information: String,
}

impl SourceIssue {
    pub fn submitted_at(&self) -> NaiveDateTime {
        unix_datetime(self.date_submitted)
    }

    pub fn updated_at(&self) -> NaiveDateTime {
        unix_datetime(self.last_updated)
    }

    pub fn is_private(&self) -> bool {
        self.view_state != 10
    }

    /// Version label to pin the issue to, preferring the forward-looking
    /// target version over the fixed-in record.
    pub fn version_label(&self) -> Option<&str> {
        for label in [&self.target_version, &self.fixed_in_version] {
            if !label.is_empty() {
                return Some(label);
            }
        }
        None
    }

    /// Assemble the Mantis text sections into one description body.
    pub fn full_description(&self) -> String {
        let mut out = self.description.trim_end().to_string();
        if !self.steps_to_reproduce.trim().is_empty() {
            out.push_str("\n\nSteps to reproduce:\n");
            out.push_str(self.steps_to_reproduce.trim());
        }
        if !self.additional_information.trim().is_empty() {
            out.push_str("\n\nAdditional information:\n");
            out.push_str(self.additional_information.trim());
        }
        out
    }
}

/// A `mantis_bugnote_table` row joined with its text body.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceNote {
    pub id: i64,
    pub reporter_id: i64,
    pub date_submitted: i64,
    pub view_state: i64,
    /// Minutes of tracked time; 0 when the note carries none.
    pub time_tracking: i64,
    pub text: String,
}

impl SourceNote {
    pub fn submitted_at(&self) -> NaiveDateTime {
        unix_datetime(self.date_submitted)
    }

    pub fn is_private(&self) -> bool {
        self.view_state != 10
    }

    /// Tracked time in hours, the unit the target bills in.
    pub fn hours(&self) -> f64 {
        self.time_tracking as f64 / 60.0
    }
}

/// A `mantis_bug_history_table` row.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceHistory {
    pub user_id: i64,
    pub date_modified: i64,
    pub field_name: String,
    pub old_value: String,
    pub new_value: String,
}

impl SourceHistory {
    pub fn modified_at(&self) -> NaiveDateTime {
        unix_datetime(self.date_modified)
    }

    pub fn is_status_change(&self) -> bool {
        self.field_name == "status"
    }
}

/// A `mantis_bug_file_table` row, content included.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceAttachment {
    pub id: i64,
    pub user_id: i64,
    pub date_added: i64,
    pub filesize: i64,
    pub filename: String,
    pub file_type: String,
    pub content: Vec<u8>,
}

impl SourceAttachment {
    pub fn added_at(&self) -> NaiveDateTime {
        unix_datetime(self.date_added)
    }
}

/// A `mantis_bug_relationship_table` row.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRelation {
    pub id: i64,
    pub source_bug_id: i64,
    pub destination_bug_id: i64,
    pub relationship_type: i64,
}

/// A `mantis_custom_field_table` row.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceCustomField {
    pub id: i64,
    pub name: String,
    pub field_type: i64,
    /// Pipe-separated value list, e.g. `|red|green|blue|`.
    pub possible_values: String,
    pub default_value: String,
}

impl SourceCustomField {
    /// Split the pipe-separated list into clean values.
    pub fn values(&self) -> Vec<&str> {
        self.possible_values
            .split('|')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .collect()
    }
}

/// A `mantis_custom_field_string_table` row for one field.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceCustomFieldValue {
    pub bug_id: i64,
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unix_datetime_known_value() {
        // 2009-02-13 23:31:30 UTC
        let dt = unix_datetime(1_234_567_890);
        assert_eq!(dt.to_string(), "2009-02-13 23:31:30");
        assert_eq!(unix_datetime(0).to_string(), "1970-01-01 00:00:00");
    }

    #[test]
    fn test_project_candidate_carries_create_fields() {
        let project = SourceProject {
            id: 3,
            name: "Website".to_string(),
            description: "Public site".to_string(),
            enabled: true,
            view_state: 10,
        };
        let candidate = project.candidate();
        assert_eq!(candidate.old_id, 3);
        assert_eq!(candidate.label, "Website");
        assert_eq!(candidate.field("description"), Some("Public site"));
        assert!(candidate.field_bool("enabled"));
    }

    #[test]
    fn test_issue_version_label_preference() {
        let mut issue = sample_issue();
        issue.target_version = "2.0".to_string();
        issue.fixed_in_version = "1.9".to_string();
        assert_eq!(issue.version_label(), Some("2.0"));

        issue.target_version.clear();
        assert_eq!(issue.version_label(), Some("1.9"));

        issue.fixed_in_version.clear();
        assert_eq!(issue.version_label(), None);
    }

    #[test]
    fn test_full_description_appends_nonempty_sections() {
        let mut issue = sample_issue();
        issue.description = "It breaks.".to_string();
        issue.steps_to_reproduce = "Click the button.".to_string();
        issue.additional_information = "".to_string();
        assert_eq!(
            issue.full_description(),
            "It breaks.\n\nSteps to reproduce:\nClick the button."
        );

        issue.steps_to_reproduce.clear();
        assert_eq!(issue.full_description(), "It breaks.");
    }

    #[test]
    fn test_note_hours() {
        let note = SourceNote {
            id: 1,
            reporter_id: 2,
            date_submitted: 0,
            view_state: 10,
            time_tracking: 90,
            text: "done".to_string(),
        };
        assert!((note.hours() - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_custom_field_values_split() {
        let field = SourceCustomField {
            id: 1,
            name: "Color".to_string(),
            field_type: 3,
            possible_values: "|red|green| blue |".to_string(),
            default_value: "red".to_string(),
        };
        assert_eq!(field.values(), vec!["red", "green", "blue"]);
    }

    fn sample_issue() -> SourceIssue {
        SourceIssue {
            id: 1,
            project_id: 1,
            reporter_id: 1,
            handler_id: 0,
            severity: 50,
            priority: 30,
            status: 10,
            category_id: 0,
            date_submitted: 0,
            last_updated: 0,
            view_state: 10,
            summary: "s".to_string(),
            version: String::new(),
            fixed_in_version: String::new(),
            target_version: String::new(),
            description: String::new(),
            steps_to_reproduce: String::new(),
            additional_information: String::new(),
        }
    }
}
