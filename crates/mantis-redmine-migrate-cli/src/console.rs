//! Terminal console for interactive mapping resolution.
//!
//! Renders the numbered source/target legends and the proposed translation,
//! then reads override commands with dialoguer until the operator confirms.

use dialoguer::Input;
use mantis_redmine_migrate::mapping::describe_choice;
use mantis_redmine_migrate::{
    EntityKind, MappingConsole, MigrateError, ResolutionSession, Result,
};

/// Console backed by the operator's terminal.
#[derive(Debug, Default)]
pub struct TerminalConsole;

impl TerminalConsole {
    pub fn new() -> Self {
        Self
    }
}

impl MappingConsole for TerminalConsole {
    fn show_proposals(&mut self, session: &ResolutionSession) {
        println!("\n== {} mapping ==", session.kind());
        println!("Source records:");
        for (candidate, _) in session.proposals() {
            println!("  [{:>4}] {}", candidate.old_id, candidate.label);
        }
        println!("Target options:");
        if session.kind().allows_create() {
            println!("  [  -1] <create new>");
        }
        for option in session.options() {
            println!("  [{:>4}] {}", option.id, option.label);
        }
        println!("Proposed translation:");
        for (candidate, chosen) in session.proposals() {
            println!(
                "  {:>4} {:<30} -> {}",
                candidate.old_id,
                candidate.label,
                describe_choice(chosen)
            );
        }
    }

    fn prompt(&mut self, kind: EntityKind) -> Result<String> {
        Input::<String>::new()
            .with_prompt(format!("{kind} [ok | <old>:<new> | print]"))
            .allow_empty(true)
            .interact_text()
            .map_err(|e| MigrateError::Io(std::io::Error::other(e.to_string())))
    }

    fn notify(&mut self, message: &str) {
        println!("  ! {message}");
    }
}
