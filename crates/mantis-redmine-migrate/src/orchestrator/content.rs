//! Issue content import: issues with their journals, time entries, and
//! attachments, then relations and custom fields once every issue id is
//! known.

use super::{mapped_id, Orchestrator, ReferenceTables, RunState};
use crate::config::CategoryMode;
use crate::entity::EntityKind;
use crate::error::{MigrateError, Result};
use crate::remap::PREVIEW_ID;
use crate::report::ReportAccumulator;
use crate::source::SourceIssue;
use crate::target::{
    NewAttachment, NewCustomField, NewIssue, NewJournal, NewRelation, NewTimeEntry,
};
use crate::typemap::CHECKBOX_FIELD_TYPE;
use chrono::Datelike;
use sha2::{Digest, Sha256};
use tracing::debug;

impl Orchestrator {
    /// Issue stage. Each issue lands with its notes, status history, and
    /// (when inline) attachments; the whole branch is one resume unit.
    pub(super) async fn migrate_issues(
        &mut self,
        refs: &ReferenceTables,
        state: &mut RunState,
        report: &mut ReportAccumulator,
    ) -> Result<()> {
        let issues = self.source.issues().await?;
        let mut applied = self.load_applied(EntityKind::Issue)?;

        for issue in &issues {
            if let Some(new_id) = applied.get(issue.id) {
                state.fk.insert(EntityKind::Issue, issue.id, new_id);
                report.reused("issue");
                continue;
            }
            let new_id = self.import_issue(issue, refs, state, report).await?;
            state.fk.insert(EntityKind::Issue, issue.id, new_id);
            self.record_applied(EntityKind::Issue, &mut applied, issue.id, new_id)?;
        }
        Ok(())
    }

    async fn import_issue(
        &mut self,
        issue: &SourceIssue,
        refs: &ReferenceTables,
        state: &RunState,
        report: &mut ReportAccumulator,
    ) -> Result<i64> {
        let project_id = state.fk.require(EntityKind::Project, issue.project_id)?;
        let tracker_id = self.tracker_for(issue, state);
        let category_id = match self.config.migration.categories_as {
            CategoryMode::Categories if issue.category_id != 0 => {
                state.fk.get(EntityKind::Category, issue.category_id)
            }
            _ => None,
        };
        // Pin the fixed version by label within the issue's own project;
        // the explicit target version wins over the fixed-in marker.
        let fixed_version_id = issue.version_label().and_then(|label| {
            state
                .version_map
                .get(&(issue.project_id, label.to_string()))
                .copied()
        });
        let row = NewIssue {
            project_id,
            tracker_id,
            status_id: mapped_id(&refs.status, issue.status)?,
            priority_id: mapped_id(&refs.priority, issue.priority)?,
            author_id: state
                .fk
                .get(EntityKind::User, issue.reporter_id)
                .unwrap_or(self.config.migration.default_author_id),
            assigned_to_id: (issue.handler_id != 0)
                .then(|| state.fk.get(EntityKind::User, issue.handler_id))
                .flatten(),
            category_id,
            fixed_version_id,
            subject: truncate_subject(&issue.summary),
            description: issue.full_description(),
            is_private: issue.is_private(),
            done_ratio: if self
                .config
                .migration
                .resolved_status_codes
                .contains(&issue.status)
            {
                100
            } else {
                0
            },
            created_on: issue.submitted_at(),
            updated_on: issue.updated_at(),
        };
        let new_id = if self.preview {
            PREVIEW_ID
        } else {
            self.target.insert_issue(&row).await?
        };
        report.created("issue");

        self.import_notes(issue, new_id, project_id, state, report)
            .await?;
        self.import_history(issue, new_id, refs, state, report)
            .await?;
        if self.config.source.attachments_inline {
            self.import_attachments(issue, new_id, state, report).await?;
        }
        Ok(new_id)
    }

    /// Tracker for an issue: in trackers mode the category's tracker wins,
    /// otherwise the severity code picks bug or feature.
    fn tracker_for(&self, issue: &SourceIssue, state: &RunState) -> i64 {
        if self.config.migration.categories_as == CategoryMode::Trackers && issue.category_id != 0 {
            if let Some(tracker_id) = state.fk.get(EntityKind::Category, issue.category_id) {
                return tracker_id;
            }
        }
        if issue.severity == self.config.migration.feature_severity {
            state.tracker_feature
        } else {
            state.tracker_bug
        }
    }

    async fn import_notes(
        &mut self,
        issue: &SourceIssue,
        issue_id: i64,
        project_id: i64,
        state: &RunState,
        report: &mut ReportAccumulator,
    ) -> Result<()> {
        for note in self.source.notes_for_issue(issue.id).await? {
            let user_id = state
                .fk
                .get(EntityKind::User, note.reporter_id)
                .unwrap_or(self.config.migration.default_author_id);
            if !self.preview {
                let journal = NewJournal {
                    issue_id,
                    user_id,
                    notes: note.text.clone(),
                    is_private: note.is_private(),
                    created_on: note.submitted_at(),
                };
                self.target.insert_journal(&journal).await?;
            }
            report.imported("journal", 1);

            if note.time_tracking > 0 {
                if !self.preview {
                    let spent_on = note.submitted_at().date();
                    let entry = NewTimeEntry {
                        project_id,
                        issue_id,
                        user_id,
                        hours: note.hours(),
                        comments: String::new(),
                        activity_id: self.config.migration.activity_id,
                        spent_on,
                        tyear: i64::from(spent_on.year()),
                        tmonth: i64::from(spent_on.month()),
                        tweek: i64::from(spent_on.iso_week().week()),
                    };
                    self.target.insert_time_entry(&entry).await?;
                }
                report.imported("time_entry", 1);
            }
        }
        Ok(())
    }

    /// Replay status transitions as journals with one status_id detail each.
    /// A transition into the closed code also stamps the issue's closed_on.
    async fn import_history(
        &mut self,
        issue: &SourceIssue,
        issue_id: i64,
        refs: &ReferenceTables,
        state: &RunState,
        report: &mut ReportAccumulator,
    ) -> Result<()> {
        let history = self.source.history_for_issue(issue.id).await?;
        for event in history.iter().filter(|e| e.is_status_change()) {
            let (Some(old_code), Some(new_code)) = (
                event.old_value.trim().parse::<i64>().ok(),
                event.new_value.trim().parse::<i64>().ok(),
            ) else {
                report.warn(format!(
                    "issue {} has an unreadable status history entry '{}' -> '{}'",
                    issue.id, event.old_value, event.new_value
                ));
                continue;
            };
            let (Some(old_status), Some(new_status)) = (
                refs.status.get(old_code).map(|e| e.chosen.id),
                refs.status.get(new_code).map(|e| e.chosen.id),
            ) else {
                report.warn(format!(
                    "issue {} history references an unresolved status code ({old_code} -> {new_code})",
                    issue.id
                ));
                continue;
            };

            if !self.preview {
                let journal = NewJournal {
                    issue_id,
                    user_id: state
                        .fk
                        .get(EntityKind::User, event.user_id)
                        .unwrap_or(self.config.migration.default_author_id),
                    notes: String::new(),
                    is_private: false,
                    created_on: event.modified_at(),
                };
                let journal_id = self.target.insert_journal(&journal).await?;
                self.target
                    .insert_journal_detail(
                        journal_id,
                        "status_id",
                        &old_status.to_string(),
                        &new_status.to_string(),
                    )
                    .await?;
                if new_code == self.config.migration.closed_status_code {
                    self.target
                        .set_issue_closed_on(issue_id, event.modified_at())
                        .await?;
                }
            }
            report.imported("journal", 1);
        }
        Ok(())
    }

    async fn import_attachments(
        &mut self,
        issue: &SourceIssue,
        issue_id: i64,
        state: &RunState,
        report: &mut ReportAccumulator,
    ) -> Result<()> {
        for attachment in self.source.attachments_for_issue(issue.id).await? {
            let disk_filename = format!(
                "{}_{}",
                attachment.added_at().format("%y%m%d%H%M%S"),
                attachment.filename
            );
            let filesize = if self.preview {
                attachment.content.len() as i64
            } else {
                self.blobs.put(&disk_filename, &attachment.content)? as i64
            };
            if !self.preview {
                let row = NewAttachment {
                    issue_id,
                    author_id: state
                        .fk
                        .get(EntityKind::User, attachment.user_id)
                        .unwrap_or(self.config.migration.default_author_id),
                    filename: attachment.filename.clone(),
                    disk_filename,
                    filesize,
                    content_type: attachment.file_type.clone(),
                    digest: format!("{:x}", Sha256::digest(&attachment.content)),
                    created_on: attachment.added_at(),
                };
                self.target.insert_attachment(&row).await?;
            }
            report.imported("attachment", 1);
        }
        Ok(())
    }

    /// Relation stage. Runs after every issue is mapped; a relation whose
    /// endpoints did not both migrate is skipped with a warning.
    pub(super) async fn migrate_relations(
        &mut self,
        refs: &ReferenceTables,
        state: &mut RunState,
        report: &mut ReportAccumulator,
    ) -> Result<()> {
        let relations = self.source.relations().await?;
        let mut applied = self.load_applied(EntityKind::Relation)?;

        for relation in &relations {
            if applied.contains(relation.id) {
                report.reused("relation");
                continue;
            }
            let (Some(issue_from_id), Some(issue_to_id)) = (
                state.fk.get(EntityKind::Issue, relation.source_bug_id),
                state.fk.get(EntityKind::Issue, relation.destination_bug_id),
            ) else {
                report.warn(format!(
                    "relation {} skipped: issue {} or {} was not migrated",
                    relation.id, relation.source_bug_id, relation.destination_bug_id
                ));
                continue;
            };
            let relation_type = refs
                .relation_names
                .chosen_label(relation.relationship_type)
                .ok_or_else(|| {
                    MigrateError::Unmapped(format!(
                        "no relation type mapping for source code {}",
                        relation.relationship_type
                    ))
                })?
                .to_string();

            let new_id = if self.preview {
                PREVIEW_ID
            } else {
                let row = NewRelation {
                    issue_from_id,
                    issue_to_id,
                    relation_type,
                };
                self.target.insert_relation(&row).await?
            };
            report.created("relation");
            self.record_applied(EntityKind::Relation, &mut applied, relation.id, new_id)?;
        }
        Ok(())
    }

    /// Custom field stage: definitions, tracker and project associations,
    /// and per-issue values.
    pub(super) async fn migrate_custom_fields(
        &mut self,
        refs: &ReferenceTables,
        state: &mut RunState,
        report: &mut ReportAccumulator,
    ) -> Result<()> {
        let fields = self.source.custom_fields().await?;
        let mut applied = self.load_applied(EntityKind::CustomField)?;
        // Re-read trackers: the category stage may have added some.
        let trackers = self.target.trackers().await?;

        for field in &fields {
            if let Some(new_id) = applied.get(field.id) {
                state.fk.insert(EntityKind::CustomField, field.id, new_id);
                report.reused("custom_field");
                continue;
            }

            let values = field.values();
            // A multi-value checkbox has no single-field equivalent; it
            // becomes a multi-select list instead of a bool.
            let checkbox_list = field.field_type == CHECKBOX_FIELD_TYPE && values.len() > 1;
            let field_format = if checkbox_list {
                "list".to_string()
            } else {
                refs.field_formats
                    .chosen_label(field.field_type)
                    .ok_or_else(|| {
                        MigrateError::Unmapped(format!(
                            "no field format mapping for source type {}",
                            field.field_type
                        ))
                    })?
                    .to_string()
            };
            let possible_values = if field_format == "list" {
                yaml_value_list(&values)?
            } else {
                String::new()
            };
            let row = NewCustomField {
                name: field.name.clone(),
                field_format,
                possible_values,
                default_value: field.default_value.clone(),
                multiple: checkbox_list,
            };
            let new_id = if self.preview {
                PREVIEW_ID
            } else {
                self.target.insert_custom_field(&row).await?
            };
            report.created("custom_field");

            if !self.preview {
                for tracker in &trackers {
                    self.target
                        .attach_custom_field_tracker(new_id, tracker.id)
                        .await?;
                }
            }
            for old_project_id in self.source.custom_field_projects(field.id).await? {
                let Some(project_id) = state.fk.get(EntityKind::Project, old_project_id) else {
                    debug!(
                        field = %field.name,
                        old_project_id,
                        "custom field references an unmigrated project; skipping link"
                    );
                    continue;
                };
                if !self.preview {
                    self.target
                        .attach_custom_field_project(new_id, project_id)
                        .await?;
                }
            }
            for value in self.source.custom_field_values(field.id).await? {
                let Some(issue_id) = state.fk.get(EntityKind::Issue, value.bug_id) else {
                    debug!(
                        field = %field.name,
                        bug_id = value.bug_id,
                        "custom field value for an unmigrated issue; skipping"
                    );
                    continue;
                };
                if !self.preview {
                    self.target
                        .insert_custom_value(new_id, issue_id, &value.value)
                        .await?;
                }
                report.imported("custom_value", 1);
            }

            state.fk.insert(EntityKind::CustomField, field.id, new_id);
            self.record_applied(EntityKind::CustomField, &mut applied, field.id, new_id)?;
        }
        Ok(())
    }
}

/// Redmine caps subjects at 255 characters.
pub(super) fn truncate_subject(summary: &str) -> String {
    summary.chars().take(255).collect()
}

/// Serialize allowed values the way Redmine stores them: a YAML document
/// with the leading marker.
pub(super) fn yaml_value_list(values: &[&str]) -> Result<String> {
    Ok(format!("---\n{}", serde_yaml::to_string(values)?))
}
