//! Interactive resolution of one entity kind's mapping table.
//!
//! A [`ResolutionSession`] starts from heuristic proposals, lets the operator
//! override individual rows, and ends when the operator confirms the table.
//! The console is a trait so the session runs unchanged under dialoguer, an
//! auto-confirming non-interactive console, or a scripted test console.

use super::{Candidate, Fallback, MappingEntry, MappingTable, TargetOption, CREATE_NEW_ID};
use crate::entity::EntityKind;
use crate::error::{MigrateError, Result};
use std::collections::{BTreeMap, VecDeque};

/// First target option whose label matches the candidate's label
/// case-insensitively.
pub fn premap<'a>(candidate: &Candidate, options: &'a [TargetOption]) -> Option<&'a TargetOption> {
    options
        .iter()
        .find(|o| o.label.eq_ignore_ascii_case(&candidate.label))
}

/// A parsed operator command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    /// `ok`: accept the current proposals.
    Confirm,

    /// `print`: show the proposal table again.
    Print,

    /// `<old>:<new>`: point source id `old` at target id `new`
    /// (`new` may be [`CREATE_NEW_ID`]).
    Override { old_id: i64, target_id: i64 },
}

impl SessionCommand {
    /// Parse one input line. `None` means the line matched no command and the
    /// session should silently prompt again.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        match line {
            "ok" => Some(SessionCommand::Confirm),
            "print" => Some(SessionCommand::Print),
            _ => {
                let (old, new) = line.split_once(':')?;
                let old_id = old.trim().parse().ok()?;
                let target_id = new.trim().parse().ok()?;
                Some(SessionCommand::Override { old_id, target_id })
            }
        }
    }
}

/// The operator-facing side of a resolution session.
pub trait MappingConsole {
    /// Render the current proposal table.
    fn show_proposals(&mut self, session: &ResolutionSession);

    /// Read one command line from the operator.
    fn prompt(&mut self, kind: EntityKind) -> Result<String>;

    /// Show a message (rejected override, out-of-range id, ...).
    fn notify(&mut self, message: &str);
}

/// Console that confirms every session as proposed. Used by non-interactive
/// runs; proposals are logged so the operator can audit them afterwards.
#[derive(Debug, Default)]
pub struct AutoConfirmConsole;

impl MappingConsole for AutoConfirmConsole {
    fn show_proposals(&mut self, session: &ResolutionSession) {
        tracing::info!(
            kind = %session.kind(),
            candidates = session.proposal_count(),
            creates = session.create_count(),
            "auto-confirming proposed mapping"
        );
        for (candidate, chosen) in session.proposals() {
            tracing::debug!(
                old_id = candidate.old_id,
                label = %candidate.label,
                target = %describe_choice(chosen),
                "proposed"
            );
        }
    }

    fn prompt(&mut self, _kind: EntityKind) -> Result<String> {
        Ok("ok".to_string())
    }

    fn notify(&mut self, message: &str) {
        tracing::warn!("{message}");
    }
}

/// Console that replays a fixed list of operator replies. Test support.
#[derive(Debug, Default)]
pub struct ScriptedConsole {
    replies: VecDeque<String>,
    /// Messages the session rejected input with, in order.
    pub notices: Vec<String>,
}

impl ScriptedConsole {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: replies.into_iter().map(Into::into).collect(),
            notices: Vec::new(),
        }
    }
}

impl MappingConsole for ScriptedConsole {
    fn show_proposals(&mut self, _session: &ResolutionSession) {}

    fn prompt(&mut self, kind: EntityKind) -> Result<String> {
        self.replies.pop_front().ok_or_else(|| {
            MigrateError::Resolution(format!(
                "console script exhausted before the {kind} mapping was confirmed"
            ))
        })
    }

    fn notify(&mut self, message: &str) {
        self.notices.push(message.to_string());
    }
}

/// Human-readable form of a chosen target, for tables and logs.
pub fn describe_choice(chosen: &TargetOption) -> String {
    if chosen.is_create_new() {
        format!("create new '{}'", chosen.label)
    } else {
        format!("{} (id {})", chosen.label, chosen.id)
    }
}

/// One entity kind's resolution, from heuristic proposals to a confirmed
/// [`MappingTable`].
pub struct ResolutionSession {
    kind: EntityKind,
    options: Vec<TargetOption>,
    proposals: BTreeMap<i64, MappingEntry>,
}

impl ResolutionSession {
    /// Build initial proposals: label pre-match first, then the fallback for
    /// whatever the heuristic left unmatched.
    pub fn new(
        kind: EntityKind,
        candidates: Vec<Candidate>,
        options: Vec<TargetOption>,
        fallback: Fallback,
    ) -> Self {
        let mut proposals = BTreeMap::new();
        for candidate in candidates {
            let chosen = match premap(&candidate, &options) {
                Some(option) => option.clone(),
                None => match &fallback {
                    Fallback::CreateNew => TargetOption::create_new(candidate.label.clone()),
                    Fallback::Existing(option) => option.clone(),
                },
            };
            proposals.insert(candidate.old_id, MappingEntry { candidate, chosen });
        }
        Self {
            kind,
            options,
            proposals,
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Current proposal rows in old-id order.
    pub fn proposals(&self) -> impl Iterator<Item = (&Candidate, &TargetOption)> {
        self.proposals.values().map(|e| (&e.candidate, &e.chosen))
    }

    /// Target options the operator may pick from.
    pub fn options(&self) -> &[TargetOption] {
        &self.options
    }

    pub fn proposal_count(&self) -> usize {
        self.proposals.len()
    }

    /// Proposals currently pointing at the create-new sentinel.
    pub fn create_count(&self) -> usize {
        self.proposals
            .values()
            .filter(|e| e.chosen.is_create_new())
            .count()
    }

    /// Apply an `<old>:<new>` override. Returns the operator-facing message
    /// when the override is rejected; the proposals are unchanged in that
    /// case.
    fn apply_override(
        &mut self,
        old_id: i64,
        target_id: i64,
    ) -> std::result::Result<(), String> {
        let entry = self.proposals.get_mut(&old_id).ok_or_else(|| {
            format!("no {} candidate with source id {old_id}", self.kind)
        })?;

        if target_id == CREATE_NEW_ID {
            if !self.kind.allows_create() {
                return Err(format!(
                    "{} records cannot be created; pick an existing target id",
                    self.kind
                ));
            }
            entry.chosen = TargetOption::create_new(entry.candidate.label.clone());
            return Ok(());
        }

        let option = self
            .options
            .iter()
            .find(|o| o.id == target_id)
            .ok_or_else(|| format!("no {} target with id {target_id}", self.kind))?;
        entry.chosen = option.clone();
        Ok(())
    }

    /// Drive the session against a console until the operator confirms.
    ///
    /// The proposal table is shown before every prompt, so `print` and a
    /// rejected override both fall through to a fresh render. Lines that
    /// parse as no command re-prompt without comment.
    pub fn run(mut self, console: &mut dyn MappingConsole) -> Result<MappingTable> {
        loop {
            console.show_proposals(&self);
            let line = console.prompt(self.kind)?;
            match SessionCommand::parse(&line) {
                None | Some(SessionCommand::Print) => continue,
                Some(SessionCommand::Confirm) => {
                    return Ok(MappingTable {
                        kind: self.kind,
                        entries: self.proposals,
                    });
                }
                Some(SessionCommand::Override { old_id, target_id }) => {
                    if let Err(message) = self.apply_override(old_id, target_id) {
                        console.notify(&message);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_options() -> Vec<TargetOption> {
        vec![
            TargetOption::new(1, "New"),
            TargetOption::new(2, "In Progress"),
            TargetOption::new(5, "Closed"),
        ]
    }

    fn status_candidates() -> Vec<Candidate> {
        vec![
            Candidate::new(10, "new"),
            Candidate::new(50, "assigned"),
            Candidate::new(90, "closed"),
        ]
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(SessionCommand::parse("ok"), Some(SessionCommand::Confirm));
        assert_eq!(SessionCommand::parse(" ok "), Some(SessionCommand::Confirm));
        assert_eq!(SessionCommand::parse("print"), Some(SessionCommand::Print));
        assert_eq!(
            SessionCommand::parse("50:2"),
            Some(SessionCommand::Override {
                old_id: 50,
                target_id: 2
            })
        );
        assert_eq!(
            SessionCommand::parse("50 : -1"),
            Some(SessionCommand::Override {
                old_id: 50,
                target_id: -1
            })
        );
        assert_eq!(SessionCommand::parse(""), None);
        assert_eq!(SessionCommand::parse("yes"), None);
        assert_eq!(SessionCommand::parse("50:"), None);
        assert_eq!(SessionCommand::parse("a:b"), None);
    }

    #[test]
    fn test_premap_is_case_insensitive_first_match() {
        let options = status_options();
        let hit = premap(&Candidate::new(10, "NEW"), &options);
        assert_eq!(hit.map(|o| o.id), Some(1));
        assert!(premap(&Candidate::new(50, "assigned"), &options).is_none());
    }

    #[test]
    fn test_session_proposes_premap_then_fallback() {
        let session = ResolutionSession::new(
            EntityKind::Status,
            status_candidates(),
            status_options(),
            Fallback::Existing(TargetOption::new(1, "New")),
        );
        let proposals: Vec<_> = session
            .proposals()
            .map(|(c, t)| (c.old_id, t.id))
            .collect();
        // 10 and 90 pre-match; 50 takes the fallback.
        assert_eq!(proposals, vec![(10, 1), (50, 1), (90, 5)]);
    }

    #[test]
    fn test_auto_confirm_accepts_proposals() {
        let session = ResolutionSession::new(
            EntityKind::Status,
            status_candidates(),
            status_options(),
            Fallback::Existing(TargetOption::new(1, "New")),
        );
        let table = session.run(&mut AutoConfirmConsole).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.chosen_label(90), Some("Closed"));
    }

    #[test]
    fn test_override_then_confirm() {
        let session = ResolutionSession::new(
            EntityKind::Status,
            status_candidates(),
            status_options(),
            Fallback::Existing(TargetOption::new(1, "New")),
        );
        let mut console = ScriptedConsole::new(["50:2", "ok"]);
        let table = session.run(&mut console).unwrap();
        assert_eq!(table.chosen_label(50), Some("In Progress"));
        assert!(console.notices.is_empty());
    }

    #[test]
    fn test_rejected_overrides_reprompt_with_message() {
        let session = ResolutionSession::new(
            EntityKind::Status,
            status_candidates(),
            status_options(),
            Fallback::Existing(TargetOption::new(1, "New")),
        );
        // Unknown candidate, unknown target, create-new on a kind that
        // forbids it, then a garbage line, then confirm.
        let mut console = ScriptedConsole::new(["7:2", "50:99", "50:-1", "wat", "ok"]);
        let table = session.run(&mut console).unwrap();
        assert_eq!(table.chosen_label(50), Some("New"));
        assert_eq!(console.notices.len(), 3);
        assert!(console.notices[0].contains("source id 7"));
        assert!(console.notices[1].contains("id 99"));
        assert!(console.notices[2].contains("cannot be created"));
    }

    #[test]
    fn test_create_new_override_allowed_for_creatable_kind() {
        let session = ResolutionSession::new(
            EntityKind::Category,
            vec![Candidate::new(4, "GUI")],
            vec![TargetOption::new(11, "Interface")],
            Fallback::Existing(TargetOption::new(11, "Interface")),
        );
        let mut console = ScriptedConsole::new(["4:-1", "ok"]);
        let table = session.run(&mut console).unwrap();
        let entry = table.get(4).unwrap();
        assert!(entry.chosen.is_create_new());
        assert_eq!(entry.chosen.label, "GUI");
    }

    #[test]
    fn test_create_fallback_for_unmatched() {
        let session = ResolutionSession::new(
            EntityKind::User,
            vec![Candidate::new(2, "jdoe"), Candidate::new(3, "admin")],
            vec![TargetOption::new(1, "admin")],
            Fallback::CreateNew,
        );
        assert_eq!(session.create_count(), 1);
        let table = session.run(&mut AutoConfirmConsole).unwrap();
        assert!(table.get(2).unwrap().chosen.is_create_new());
        assert_eq!(table.get(3).unwrap().chosen.id, 1);
    }

    #[test]
    fn test_exhausted_script_is_an_error() {
        let session = ResolutionSession::new(
            EntityKind::Status,
            status_candidates(),
            status_options(),
            Fallback::Existing(TargetOption::new(1, "New")),
        );
        let mut console = ScriptedConsole::new(["print"]);
        assert!(session.run(&mut console).is_err());
    }
}
