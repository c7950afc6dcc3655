//! Migration orchestrator - stage coordinator.
//!
//! Stages run in fixed dependency order: reference enumerations first, then
//! projects (the structural anchor), then versions/categories/users, then
//! issue content, relations, and custom fields. Each stage resolves its
//! mapping table, applies it record by record, and registers the resulting
//! ids for the stages that follow.

mod content;

use crate::blob::{BlobSink, FsBlobSink};
use crate::config::{CategoryMode, Config};
use crate::entity::EntityKind;
use crate::error::{MigrateError, Result};
use crate::mapping::{
    AppliedLog, AutoConfirmConsole, Candidate, Fallback, MappingConsole, MappingEntry,
    MappingStore, MappingTable, ResolutionSession, TargetOption,
};
use crate::remap::{ForeignKeyMap, PREVIEW_ID};
use crate::report::{MigrationReport, ReportAccumulator};
use crate::source::{MysqlSource, SourceProject, SourceRepository, SourceUser};
use crate::target::{
    NewCategory, NewMembership, NewProject, NewUser, NewVersion, PgTarget, TargetRepository,
};
use crate::typemap::{
    access_level_label, custom_field_type_label, field_format_for_type, field_format_options,
    priority_label, relation_for_type, relation_options, relation_type_label, status_label,
    ADMIN_ACCESS_LEVEL,
};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info};

/// Migration orchestrator.
pub struct Orchestrator {
    config: Config,
    store: MappingStore,
    source: Arc<dyn SourceRepository>,
    target: Arc<dyn TargetRepository>,
    blobs: Box<dyn BlobSink>,
    console: Box<dyn MappingConsole>,
    preview: bool,
    resume: bool,
}

/// The confirmed reference mapping tables, consulted throughout the run.
struct ReferenceTables {
    status: MappingTable,
    priority: MappingTable,
    role: MappingTable,
    field_formats: MappingTable,
    relation_names: MappingTable,
}

/// Mutable lookup state threaded through the stages of one run.
struct RunState {
    fk: ForeignKeyMap,

    /// `(source project id, version label)` → target version id.
    version_map: BTreeMap<(i64, String), i64>,

    /// Target ids of projects created by this run, or by the run this one
    /// resumes. Admin membership grants land in exactly these.
    created_projects: Vec<i64>,

    tracker_bug: i64,
    tracker_feature: i64,
}

impl Orchestrator {
    /// Create an orchestrator over the real source and target databases.
    pub async fn connect(config: Config) -> Result<Self> {
        let source = MysqlSource::connect(&config.source).await?;
        let target = PgTarget::connect(&config.target).await?;
        let blobs = FsBlobSink::new(&config.migration.attachments_dir);
        Ok(Self::new(
            config,
            Arc::new(source),
            Arc::new(target),
            Box::new(blobs),
        ))
    }

    /// Create an orchestrator over caller-provided repositories.
    pub fn new(
        config: Config,
        source: Arc<dyn SourceRepository>,
        target: Arc<dyn TargetRepository>,
        blobs: Box<dyn BlobSink>,
    ) -> Self {
        let store = MappingStore::new(&config.migration.mapping_dir);
        Self {
            config,
            store,
            source,
            target,
            blobs,
            console: Box::new(AutoConfirmConsole),
            preview: false,
            resume: false,
        }
    }

    /// Skip every target write; resolution and reporting still run.
    pub fn with_preview(mut self, preview: bool) -> Self {
        self.preview = preview;
        self
    }

    /// Reuse persisted mapping units and skip already-applied records.
    pub fn with_resume(mut self, resume: bool) -> Self {
        self.resume = resume;
        self
    }

    /// Replace the mapping console (default: auto-confirm).
    pub fn with_console(mut self, console: Box<dyn MappingConsole>) -> Self {
        self.console = console;
        self
    }

    /// Run the migration and return the final report.
    pub async fn run(mut self) -> Result<MigrationReport> {
        let mut report = ReportAccumulator::new(self.preview);
        info!(
            "Starting migration run {} ({} mode)",
            report.run_id(),
            if self.preview { "preview" } else { "live" }
        );

        self.source.ping().await?;
        self.target.ping().await?;

        self.prepare_store()?;

        let projects = self.source.projects().await?;
        if projects.is_empty() {
            return Err(MigrateError::Prerequisite(
                "source has no projects; nothing to migrate".into(),
            ));
        }
        let (tracker_bug, tracker_feature) = self.find_trackers().await?;

        info!("Stage 1: resolving reference mappings");
        let refs = self.resolve_references(&mut report).await?;

        let mut state = RunState {
            fk: ForeignKeyMap::new(),
            version_map: BTreeMap::new(),
            created_projects: Vec::new(),
            tracker_bug,
            tracker_feature,
        };

        info!("Stage 2: migrating projects");
        self.stage_projects(&projects, &mut state, &mut report)
            .await?;

        info!("Stage 3: migrating versions, categories, and users");
        self.stage_versions(&mut state, &mut report).await?;
        self.stage_categories(&mut state, &mut report).await?;
        self.stage_users(&refs, &mut state, &mut report).await?;

        info!("Stage 4: importing issue content");
        self.migrate_issues(&refs, &mut state, &mut report).await?;
        self.migrate_relations(&refs, &mut state, &mut report)
            .await?;
        self.migrate_custom_fields(&refs, &mut state, &mut report)
            .await?;

        let report = report.finish("completed");
        info!(
            "Migration {}: {} created, {} reused, {} content rows in {:.1}s",
            report.status,
            report.total_created(),
            report.total_reused(),
            report.total_imported(),
            report.duration_seconds
        );
        Ok(report)
    }

    /// Probe both databases. Used by the health-check command.
    pub async fn health_check(&self) -> Result<()> {
        self.source.ping().await?;
        self.target.ping().await?;
        Ok(())
    }

    /// Prepare the mapping directory for this run.
    ///
    /// A resume run must match the configuration that wrote the store. A
    /// fresh live run drops recorded progress and re-stamps the hash. A
    /// preview run overwrites mapping units as it goes but leaves progress
    /// units and the hash alone, so it can never poison a later live resume.
    fn prepare_store(&self) -> Result<()> {
        self.store.ensure_dir()?;
        let hash = self.config.hash();
        if self.resume {
            self.store.verify_config_hash(&hash)?;
        }
        if !self.preview {
            if !self.resume {
                for kind in EntityKind::ALL.into_iter().filter(EntityKind::tracks_progress) {
                    self.store.clear_applied(kind)?;
                }
            }
            self.store.save_config_hash(&hash)?;
        }
        Ok(())
    }

    /// Look up the configured bug and feature trackers in the target.
    async fn find_trackers(&self) -> Result<(i64, i64)> {
        let trackers = self.target.trackers().await?;
        let find = |name: &str| {
            trackers
                .iter()
                .find(|t| t.label.eq_ignore_ascii_case(name))
                .map(|t| t.id)
                .ok_or_else(|| {
                    MigrateError::Prerequisite(format!("target has no tracker named '{name}'"))
                })
        };
        Ok((
            find(&self.config.migration.tracker_bug)?,
            find(&self.config.migration.tracker_feature)?,
        ))
    }

    /// Resolve the five reference kinds.
    ///
    /// Status, priority, and role go through the operator; custom field
    /// types and relation types use the fixed translation tables. All five
    /// are persisted so a resumed run replays identical decisions.
    async fn resolve_references(
        &mut self,
        report: &mut ReportAccumulator,
    ) -> Result<ReferenceTables> {
        let codes = self.source.status_codes().await?;
        let options = self.target.statuses().await?;
        let fallback =
            existing_fallback(EntityKind::Status, &options, &self.config.migration.default_status)?;
        let status = self
            .resolve_table(
                EntityKind::Status,
                label_candidates(&codes, status_label),
                options,
                fallback,
            )
            .await?;
        report.reused_many("status", status.len() as u64);

        let codes = self.source.priority_codes().await?;
        let options = self.target.priorities().await?;
        let fallback = existing_fallback(
            EntityKind::Priority,
            &options,
            &self.config.migration.default_priority,
        )?;
        let priority = self
            .resolve_table(
                EntityKind::Priority,
                label_candidates(&codes, priority_label),
                options,
                fallback,
            )
            .await?;
        report.reused_many("priority", priority.len() as u64);

        let codes = self.source.access_levels().await?;
        let options = self.target.roles().await?;
        let fallback =
            existing_fallback(EntityKind::Role, &options, &self.config.migration.default_role)?;
        let role = self
            .resolve_table(
                EntityKind::Role,
                label_candidates(&codes, access_level_label),
                options,
                fallback,
            )
            .await?;
        report.reused_many("role", role.len() as u64);

        let codes = self.source.custom_field_types().await?;
        let field_formats = self.fixed_table(
            EntityKind::CustomFieldType,
            label_candidates(&codes, custom_field_type_label),
            field_format_options(),
            |c| field_format_for_type(c.old_id),
        )?;

        let codes = self.source.relation_types().await?;
        let relation_names = self.fixed_table(
            EntityKind::RelationType,
            label_candidates(&codes, relation_type_label),
            relation_options(),
            |c| relation_for_type(c.old_id),
        )?;

        Ok(ReferenceTables {
            status,
            priority,
            role,
            field_formats,
            relation_names,
        })
    }

    /// Resolve one operator kind: load the persisted unit on resume, or run
    /// a session and persist its result.
    async fn resolve_table(
        &mut self,
        kind: EntityKind,
        candidates: Vec<Candidate>,
        options: Vec<TargetOption>,
        fallback: Fallback,
    ) -> Result<MappingTable> {
        if self.resume {
            if let Some(table) = self.store.load(kind)? {
                table.verify_covers(&candidates)?;
                info!(
                    "Loaded persisted {} mapping ({} entries, {} to create)",
                    kind,
                    table.len(),
                    table.create_count()
                );
                return Ok(table);
            }
        }
        let session = ResolutionSession::new(kind, candidates, options, fallback);
        let table = session.run(self.console.as_mut())?;
        self.store.save(&table)?;
        info!(
            "Confirmed {} mapping ({} entries, {} to create)",
            kind,
            table.len(),
            table.create_count()
        );
        Ok(table)
    }

    /// Build a non-operator kind's table from a fixed translation rule.
    fn fixed_table<F>(
        &self,
        kind: EntityKind,
        candidates: Vec<Candidate>,
        options: Vec<TargetOption>,
        rule: F,
    ) -> Result<MappingTable>
    where
        F: Fn(&Candidate) -> &'static str,
    {
        if self.resume {
            if let Some(table) = self.store.load(kind)? {
                table.verify_covers(&candidates)?;
                debug!("Loaded persisted {} translation ({} entries)", kind, table.len());
                return Ok(table);
            }
        }
        let table = MappingTable::from_rule(kind, &candidates, &options, rule)?;
        self.store.save(&table)?;
        debug!("Built {} translation ({} entries)", kind, table.len());
        Ok(table)
    }

    /// Progress log for a kind; resume runs pick up where the log ends,
    /// fresh runs start empty.
    fn load_applied(&self, kind: EntityKind) -> Result<AppliedLog> {
        if self.resume {
            self.store.load_applied(kind)
        } else {
            Ok(AppliedLog::default())
        }
    }

    /// Record one completed record branch. Preview runs keep no progress;
    /// their new ids are placeholders.
    fn record_applied(
        &self,
        kind: EntityKind,
        applied: &mut AppliedLog,
        old_id: i64,
        new_id: i64,
    ) -> Result<()> {
        if self.preview {
            return Ok(());
        }
        applied.insert(old_id, new_id);
        self.store.save_applied(kind, applied)
    }

    /// Project stage: resolve, create or reuse each project, then link the
    /// hierarchy once every parent id is known.
    async fn stage_projects(
        &mut self,
        projects: &[SourceProject],
        state: &mut RunState,
        report: &mut ReportAccumulator,
    ) -> Result<()> {
        let candidates = projects.iter().map(|p| p.candidate()).collect();
        let options = self.target.projects().await?;
        let table = self
            .resolve_table(EntityKind::Project, candidates, options, Fallback::CreateNew)
            .await?;

        let mut applied = self.load_applied(EntityKind::Project)?;
        let mut identifiers: BTreeSet<String> =
            self.target.project_identifiers().await?.into_iter().collect();
        // Placeholder tree positions, appended past the existing forest.
        let mut tree_cursor = self.target.max_project_rgt().await? + 1;

        for project in projects {
            let entry = entry_for(&table, project.id)?;

            if let Some(new_id) = applied.get(project.id) {
                state.fk.insert(EntityKind::Project, project.id, new_id);
                if entry.chosen.is_create_new() {
                    state.created_projects.push(new_id);
                }
                report.reused("project");
                continue;
            }

            let new_id = if entry.chosen.is_create_new() {
                let row = NewProject {
                    name: project.name.clone(),
                    identifier: project_identifier(&project.name, project.id, &mut identifiers),
                    description: project.description.clone(),
                    is_public: project.is_public(),
                    status: if project.enabled { 1 } else { 5 },
                    lft: tree_cursor,
                    rgt: tree_cursor + 1,
                };
                tree_cursor += 2;

                let new_id = if self.preview {
                    PREVIEW_ID
                } else {
                    let new_id = self.target.insert_project(&row).await?;
                    for module in &self.config.migration.enabled_modules {
                        self.target.enable_module(new_id, module).await?;
                    }
                    let mut trackers = vec![state.tracker_bug];
                    if state.tracker_feature != state.tracker_bug {
                        trackers.push(state.tracker_feature);
                    }
                    for tracker_id in trackers {
                        self.target.attach_tracker(new_id, tracker_id).await?;
                    }
                    new_id
                };
                debug!(project = %project.name, new_id, "created project");
                state.created_projects.push(new_id);
                report.created("project");
                new_id
            } else {
                report.reused("project");
                entry.chosen.id
            };

            state.fk.insert(EntityKind::Project, project.id, new_id);
            self.record_applied(EntityKind::Project, &mut applied, project.id, new_id)?;
        }

        // Second pass: children exist now, so parent pointers can be set.
        for (child, parent) in self.source.project_hierarchy().await? {
            let child_created = table.get(child).is_some_and(|e| e.chosen.is_create_new());
            if !child_created {
                continue;
            }
            let (Some(child_id), Some(parent_id)) = (
                state.fk.get(EntityKind::Project, child),
                state.fk.get(EntityKind::Project, parent),
            ) else {
                report.warn(format!(
                    "project hierarchy row {child} -> {parent} skipped: parent not migrated"
                ));
                continue;
            };
            if !self.preview {
                self.target.set_project_parent(child_id, parent_id).await?;
            }
            debug!(child_id, parent_id, "linked project parent");
        }

        Ok(())
    }

    /// Version stage. Every version also lands in the project-scoped
    /// `version_map` so issue import can pin fixed versions by label.
    async fn stage_versions(
        &mut self,
        state: &mut RunState,
        report: &mut ReportAccumulator,
    ) -> Result<()> {
        let versions = self.source.versions().await?;
        let candidates = versions.iter().map(|v| v.candidate()).collect();
        let options = self.target.versions().await?;
        let table = self
            .resolve_table(EntityKind::Version, candidates, options, Fallback::CreateNew)
            .await?;
        let mut applied = self.load_applied(EntityKind::Version)?;

        for version in &versions {
            let key = (version.project_id, version.version.clone());

            if let Some(new_id) = applied.get(version.id) {
                state.fk.insert(EntityKind::Version, version.id, new_id);
                state.version_map.insert(key, new_id);
                report.reused("version");
                continue;
            }

            let entry = entry_for(&table, version.id)?;
            let new_id = if entry.chosen.is_create_new() {
                let new_id = if self.preview {
                    PREVIEW_ID
                } else {
                    let row = NewVersion {
                        project_id: state.fk.require(EntityKind::Project, version.project_id)?,
                        name: version.version.clone(),
                        description: version.description.clone(),
                        status: if version.released { "closed" } else { "open" }.to_string(),
                        effective_date: (version.date_order > 0)
                            .then(|| version.effective_date().date()),
                    };
                    self.target.insert_version(&row).await?
                };
                report.created("version");
                new_id
            } else {
                report.reused("version");
                entry.chosen.id
            };

            state.fk.insert(EntityKind::Version, version.id, new_id);
            state.version_map.insert(key, new_id);
            self.record_applied(EntityKind::Version, &mut applied, version.id, new_id)?;
        }
        Ok(())
    }

    /// Category stage. Mantis categories become per-project issue categories
    /// or global trackers, depending on configuration.
    async fn stage_categories(
        &mut self,
        state: &mut RunState,
        report: &mut ReportAccumulator,
    ) -> Result<()> {
        let categories = self.source.categories().await?;
        let candidates = categories.iter().map(|c| c.candidate()).collect();
        let mode = self.config.migration.categories_as;
        let options = match mode {
            CategoryMode::Categories => self.target.issue_categories().await?,
            CategoryMode::Trackers => self.target.trackers().await?,
        };
        let table = self
            .resolve_table(EntityKind::Category, candidates, options, Fallback::CreateNew)
            .await?;
        let mut applied = self.load_applied(EntityKind::Category)?;

        for category in &categories {
            if let Some(new_id) = applied.get(category.id) {
                state.fk.insert(EntityKind::Category, category.id, new_id);
                report.reused("category");
                continue;
            }

            let entry = entry_for(&table, category.id)?;
            let new_id = if entry.chosen.is_create_new() {
                let new_id = if self.preview {
                    PREVIEW_ID
                } else {
                    match mode {
                        CategoryMode::Categories => {
                            let row = NewCategory {
                                project_id: state
                                    .fk
                                    .require(EntityKind::Project, category.project_id)?,
                                name: category.name.clone(),
                            };
                            self.target.insert_issue_category(&row).await?
                        }
                        CategoryMode::Trackers => {
                            self.target.insert_tracker(&category.name).await?
                        }
                    }
                };
                report.created("category");
                new_id
            } else {
                report.reused("category");
                entry.chosen.id
            };

            state.fk.insert(EntityKind::Category, category.id, new_id);
            self.record_applied(EntityKind::Category, &mut applied, category.id, new_id)?;
        }
        Ok(())
    }

    /// User stage. Administrator accounts also receive a membership in every
    /// created project, now that both sides' ids exist.
    async fn stage_users(
        &mut self,
        refs: &ReferenceTables,
        state: &mut RunState,
        report: &mut ReportAccumulator,
    ) -> Result<()> {
        let users = self.source.users().await?;
        let candidates = users.iter().map(|u| u.candidate()).collect();
        let options = self.target.users().await?;
        let table = self
            .resolve_table(EntityKind::User, candidates, options, Fallback::CreateNew)
            .await?;
        let mut applied = self.load_applied(EntityKind::User)?;

        for user in &users {
            if let Some(new_id) = applied.get(user.id) {
                state.fk.insert(EntityKind::User, user.id, new_id);
                report.reused("user");
                continue;
            }

            let entry = entry_for(&table, user.id)?;
            let new_id = if entry.chosen.is_create_new() {
                let row = new_user_row(user);
                let new_id = if self.preview {
                    PREVIEW_ID
                } else {
                    self.target.insert_user(&row).await?
                };
                report.created("user");
                new_id
            } else {
                report.reused("user");
                entry.chosen.id
            };
            state.fk.insert(EntityKind::User, user.id, new_id);

            if user.access_level == ADMIN_ACCESS_LEVEL && !state.created_projects.is_empty() {
                let role_id = mapped_id(&refs.role, user.access_level)?;
                for &project_id in &state.created_projects {
                    if !self.preview {
                        let membership = NewMembership {
                            project_id,
                            user_id: new_id,
                            role_id,
                        };
                        self.target.insert_membership(&membership).await?;
                    }
                    report.created("membership");
                }
                debug!(
                    login = %user.username,
                    projects = state.created_projects.len(),
                    "granted administrator memberships"
                );
            }

            self.record_applied(EntityKind::User, &mut applied, user.id, new_id)?;
        }
        Ok(())
    }
}

/// Candidates for an enumeration kind, labelled by the built-in tables.
fn label_candidates(codes: &[i64], label: impl Fn(i64) -> String) -> Vec<Candidate> {
    codes
        .iter()
        .map(|&code| Candidate::new(code, label(code)))
        .collect()
}

/// Fallback for a reference kind: the configured default label if the target
/// has it, else the first target row. An empty target is a missing
/// prerequisite.
fn existing_fallback(
    kind: EntityKind,
    options: &[TargetOption],
    default_label: &str,
) -> Result<Fallback> {
    options
        .iter()
        .find(|o| o.label.eq_ignore_ascii_case(default_label))
        .or_else(|| options.first())
        .cloned()
        .map(Fallback::Existing)
        .ok_or_else(|| {
            MigrateError::Prerequisite(format!("target has no {kind} records to map onto"))
        })
}

/// The mapping entry for a source id; by this point every source record of
/// the kind has one.
fn entry_for(table: &MappingTable, old_id: i64) -> Result<&MappingEntry> {
    table.get(old_id).ok_or_else(|| {
        MigrateError::Unmapped(format!(
            "no {} mapping for source id {old_id}",
            table.kind
        ))
    })
}

/// The chosen target id for a source code.
fn mapped_id(table: &MappingTable, old_id: i64) -> Result<i64> {
    Ok(entry_for(table, old_id)?.chosen.id)
}

/// Derive a unique Redmine project identifier from the project name:
/// lowercased, non-alphanumeric characters dashed, deduplicated against
/// identifiers already taken by suffixing the source id.
fn project_identifier(name: &str, old_id: i64, used: &mut BTreeSet<String>) -> String {
    let mut slug = String::new();
    for c in name.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug = slug.trim_matches('-').to_string();
    if slug.is_empty() {
        slug = format!("project-{old_id}");
    }
    if used.contains(&slug) {
        slug = format!("{slug}-{old_id}");
    }
    used.insert(slug.clone());
    slug
}

/// Build the account row for a user with no target match.
fn new_user_row(user: &SourceUser) -> NewUser {
    let mut parts = user.realname.split_whitespace();
    let firstname = parts.next().unwrap_or(&user.username).to_string();
    let rest = parts.collect::<Vec<_>>().join(" ");
    NewUser {
        login: user.username.clone(),
        firstname,
        lastname: if rest.is_empty() { "-".to_string() } else { rest },
        mail: user.email.clone(),
        hashed_password: placeholder_password_hash(),
        status: if user.enabled { 1 } else { 3 },
    }
}

/// Random digest for imported accounts; every password must be reset before
/// first login.
fn placeholder_password_hash() -> String {
    let seed = uuid::Uuid::new_v4();
    format!("{:x}", Sha256::digest(seed.as_bytes()))
}
