//! PostgreSQL target implementation.
//!
//! Uses deadpool-postgres for connection pooling. All ids are read and bound
//! as `bigint`; the classic Redmine schema stores `integer` columns and
//! PostgreSQL applies the assignment cast. Inserts use `RETURNING id` so the
//! freshly assigned id never has to be read back separately.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use deadpool_postgres::{Client, Manager, ManagerConfig, Pool, RecyclingMethod};
use tokio_postgres::Config as PgConfig;
use tracing::info;

use super::{
    NewAttachment, NewCategory, NewCustomField, NewIssue, NewJournal, NewMembership, NewProject,
    NewRelation, NewTimeEntry, NewUser, NewVersion, TargetRepository,
};
use crate::config::TargetConfig;
use crate::error::{MigrateError, Result};
use crate::mapping::TargetOption;

/// Connection pool timeout.
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Pool size; the apply phase writes one record at a time.
const TARGET_POOL_SIZE: usize = 4;

/// Redmine writer backed by a deadpool-postgres pool.
pub struct PgTarget {
    pool: Pool,
}

impl PgTarget {
    /// Connect to the Redmine database.
    pub async fn connect(config: &TargetConfig) -> Result<Self> {
        let mut pg_config = PgConfig::new();
        pg_config.host(&config.host);
        pg_config.port(config.port);
        pg_config.dbname(&config.database);
        pg_config.user(&config.user);
        pg_config.password(&config.password);
        pg_config.connect_timeout(POOL_CONNECTION_TIMEOUT);

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };
        let mgr = Manager::from_config(pg_config, tokio_postgres::NoTls, mgr_config);
        let pool = Pool::builder(mgr)
            .max_size(TARGET_POOL_SIZE)
            .build()
            .map_err(|e| MigrateError::pool(e, "creating PostgreSQL target pool"))?;

        let client = pool
            .get()
            .await
            .map_err(|e| MigrateError::pool(e, "testing PostgreSQL target connection"))?;
        client.simple_query("SELECT 1").await?;

        info!(
            "Connected to Redmine target: {}:{}/{}",
            config.host, config.port, config.database
        );

        Ok(Self { pool })
    }

    async fn client(&self) -> Result<Client> {
        self.pool
            .get()
            .await
            .map_err(|e| MigrateError::pool(e, "acquiring PostgreSQL target connection"))
    }

    /// Read an `(id, label)` listing into target options.
    async fn options(&self, sql: &str) -> Result<Vec<TargetOption>> {
        let client = self.client().await?;
        let rows = client.query(sql, &[]).await?;
        Ok(rows
            .iter()
            .map(|row| TargetOption::new(row.get(0), row.get::<_, String>(1)))
            .collect())
    }

    /// Run an insert that returns the new row's id.
    async fn insert_returning(
        &self,
        sql: &str,
        params: &[&(dyn tokio_postgres::types::ToSql + Sync)],
    ) -> Result<i64> {
        let client = self.client().await?;
        let row = client.query_one(sql, params).await?;
        Ok(row.get(0))
    }
}

#[async_trait]
impl TargetRepository for PgTarget {
    async fn statuses(&self) -> Result<Vec<TargetOption>> {
        self.options("SELECT id::bigint, name FROM issue_statuses ORDER BY position, id")
            .await
    }

    async fn priorities(&self) -> Result<Vec<TargetOption>> {
        self.options(
            "SELECT id::bigint, name FROM enumerations \
             WHERE type = 'IssuePriority' ORDER BY position, id",
        )
        .await
    }

    async fn roles(&self) -> Result<Vec<TargetOption>> {
        self.options("SELECT id::bigint, name FROM roles WHERE builtin = 0 ORDER BY position, id")
            .await
    }

    async fn trackers(&self) -> Result<Vec<TargetOption>> {
        self.options("SELECT id::bigint, name FROM trackers ORDER BY position, id")
            .await
    }

    async fn projects(&self) -> Result<Vec<TargetOption>> {
        self.options("SELECT id::bigint, name FROM projects ORDER BY id")
            .await
    }

    async fn versions(&self) -> Result<Vec<TargetOption>> {
        self.options("SELECT id::bigint, name FROM versions ORDER BY id")
            .await
    }

    async fn issue_categories(&self) -> Result<Vec<TargetOption>> {
        self.options("SELECT id::bigint, name FROM issue_categories ORDER BY id")
            .await
    }

    async fn users(&self) -> Result<Vec<TargetOption>> {
        self.options("SELECT id::bigint, login FROM users WHERE type = 'User' ORDER BY id")
            .await
    }

    async fn project_identifiers(&self) -> Result<Vec<String>> {
        let client = self.client().await?;
        let rows = client
            .query("SELECT identifier FROM projects ORDER BY id", &[])
            .await?;
        Ok(rows.iter().map(|row| row.get(0)).collect())
    }

    async fn max_project_rgt(&self) -> Result<i64> {
        let client = self.client().await?;
        let row = client
            .query_one("SELECT COALESCE(MAX(rgt), 0)::bigint FROM projects", &[])
            .await?;
        Ok(row.get(0))
    }

    async fn insert_project(&self, project: &NewProject) -> Result<i64> {
        self.insert_returning(
            "INSERT INTO projects \
               (name, description, identifier, is_public, status, lft, rgt, \
                created_on, updated_on) \
             VALUES ($1, $2, $3, $4, $5::bigint, $6::bigint, $7::bigint, $8, $8) \
             RETURNING id::bigint",
            &[
                &project.name,
                &project.description,
                &project.identifier,
                &project.is_public,
                &project.status,
                &project.lft,
                &project.rgt,
                &Utc::now().naive_utc(),
            ],
        )
        .await
    }

    async fn set_project_parent(&self, project_id: i64, parent_id: i64) -> Result<()> {
        let client = self.client().await?;
        client
            .execute(
                "UPDATE projects SET parent_id = $2::bigint WHERE id = $1::bigint",
                &[&project_id, &parent_id],
            )
            .await?;
        Ok(())
    }

    async fn enable_module(&self, project_id: i64, module: &str) -> Result<()> {
        let client = self.client().await?;
        client
            .execute(
                "INSERT INTO enabled_modules (project_id, name) VALUES ($1::bigint, $2)",
                &[&project_id, &module],
            )
            .await?;
        Ok(())
    }

    async fn attach_tracker(&self, project_id: i64, tracker_id: i64) -> Result<()> {
        let client = self.client().await?;
        client
            .execute(
                "INSERT INTO projects_trackers (project_id, tracker_id) \
                 VALUES ($1::bigint, $2::bigint)",
                &[&project_id, &tracker_id],
            )
            .await?;
        Ok(())
    }

    async fn insert_membership(&self, membership: &NewMembership) -> Result<i64> {
        let client = self.client().await?;
        let row = client
            .query_one(
                "INSERT INTO members (user_id, project_id, created_on) \
                 VALUES ($1::bigint, $2::bigint, $3) RETURNING id::bigint",
                &[
                    &membership.user_id,
                    &membership.project_id,
                    &Utc::now().naive_utc(),
                ],
            )
            .await?;
        let member_id: i64 = row.get(0);
        client
            .execute(
                "INSERT INTO member_roles (member_id, role_id) \
                 VALUES ($1::bigint, $2::bigint)",
                &[&member_id, &membership.role_id],
            )
            .await?;
        Ok(member_id)
    }

    async fn insert_version(&self, version: &NewVersion) -> Result<i64> {
        self.insert_returning(
            "INSERT INTO versions \
               (project_id, name, description, status, effective_date, \
                created_on, updated_on) \
             VALUES ($1::bigint, $2, $3, $4, $5, $6, $6) RETURNING id::bigint",
            &[
                &version.project_id,
                &version.name,
                &version.description,
                &version.status,
                &version.effective_date,
                &Utc::now().naive_utc(),
            ],
        )
        .await
    }

    async fn insert_issue_category(&self, category: &NewCategory) -> Result<i64> {
        self.insert_returning(
            "INSERT INTO issue_categories (project_id, name) \
             VALUES ($1::bigint, $2) RETURNING id::bigint",
            &[&category.project_id, &category.name],
        )
        .await
    }

    async fn insert_tracker(&self, name: &str) -> Result<i64> {
        self.insert_returning(
            "INSERT INTO trackers (name, position, is_in_chlog, is_in_roadmap) \
             SELECT $1, COALESCE(MAX(position), 0) + 1, false, true FROM trackers \
             RETURNING id::bigint",
            &[&name],
        )
        .await
    }

    async fn insert_user(&self, user: &NewUser) -> Result<i64> {
        self.insert_returning(
            "INSERT INTO users \
               (login, hashed_password, firstname, lastname, mail, status, \
                admin, type, created_on, updated_on) \
             VALUES ($1, $2, $3, $4, $5, $6::bigint, false, 'User', $7, $7) \
             RETURNING id::bigint",
            &[
                &user.login,
                &user.hashed_password,
                &user.firstname,
                &user.lastname,
                &user.mail,
                &user.status,
                &Utc::now().naive_utc(),
            ],
        )
        .await
    }

    async fn insert_issue(&self, issue: &NewIssue) -> Result<i64> {
        self.insert_returning(
            "INSERT INTO issues \
               (project_id, tracker_id, status_id, priority_id, author_id, \
                assigned_to_id, category_id, fixed_version_id, subject, \
                description, is_private, done_ratio, created_on, updated_on) \
             VALUES ($1::bigint, $2::bigint, $3::bigint, $4::bigint, $5::bigint, \
                     $6::bigint, $7::bigint, $8::bigint, $9, $10, $11, \
                     $12::bigint, $13, $14) \
             RETURNING id::bigint",
            &[
                &issue.project_id,
                &issue.tracker_id,
                &issue.status_id,
                &issue.priority_id,
                &issue.author_id,
                &issue.assigned_to_id,
                &issue.category_id,
                &issue.fixed_version_id,
                &issue.subject,
                &issue.description,
                &issue.is_private,
                &issue.done_ratio,
                &issue.created_on,
                &issue.updated_on,
            ],
        )
        .await
    }

    async fn insert_journal(&self, journal: &NewJournal) -> Result<i64> {
        self.insert_returning(
            "INSERT INTO journals \
               (journalized_id, journalized_type, user_id, notes, \
                private_notes, created_on) \
             VALUES ($1::bigint, 'Issue', $2::bigint, $3, $4, $5) \
             RETURNING id::bigint",
            &[
                &journal.issue_id,
                &journal.user_id,
                &journal.notes,
                &journal.is_private,
                &journal.created_on,
            ],
        )
        .await
    }

    async fn insert_journal_detail(
        &self,
        journal_id: i64,
        prop_key: &str,
        old_value: &str,
        value: &str,
    ) -> Result<()> {
        let client = self.client().await?;
        client
            .execute(
                "INSERT INTO journal_details \
                   (journal_id, property, prop_key, old_value, value) \
                 VALUES ($1::bigint, 'attr', $2, $3, $4)",
                &[&journal_id, &prop_key, &old_value, &value],
            )
            .await?;
        Ok(())
    }

    async fn insert_time_entry(&self, entry: &NewTimeEntry) -> Result<i64> {
        self.insert_returning(
            "INSERT INTO time_entries \
               (project_id, issue_id, user_id, hours, comments, activity_id, \
                spent_on, tyear, tmonth, tweek, created_on, updated_on) \
             VALUES ($1::bigint, $2::bigint, $3::bigint, $4, $5, $6::bigint, \
                     $7, $8::bigint, $9::bigint, $10::bigint, $11, $11) \
             RETURNING id::bigint",
            &[
                &entry.project_id,
                &entry.issue_id,
                &entry.user_id,
                &entry.hours,
                &entry.comments,
                &entry.activity_id,
                &entry.spent_on,
                &entry.tyear,
                &entry.tmonth,
                &entry.tweek,
                &Utc::now().naive_utc(),
            ],
        )
        .await
    }

    async fn insert_attachment(&self, attachment: &NewAttachment) -> Result<i64> {
        self.insert_returning(
            "INSERT INTO attachments \
               (container_id, container_type, filename, disk_filename, \
                filesize, content_type, digest, downloads, author_id, \
                created_on) \
             VALUES ($1::bigint, 'Issue', $2, $3, $4::bigint, $5, $6, 0, \
                     $7::bigint, $8) \
             RETURNING id::bigint",
            &[
                &attachment.issue_id,
                &attachment.filename,
                &attachment.disk_filename,
                &attachment.filesize,
                &attachment.content_type,
                &attachment.digest,
                &attachment.author_id,
                &attachment.created_on,
            ],
        )
        .await
    }

    async fn set_issue_closed_on(&self, issue_id: i64, closed_on: NaiveDateTime) -> Result<()> {
        let client = self.client().await?;
        client
            .execute(
                "UPDATE issues SET closed_on = $2 WHERE id = $1::bigint",
                &[&issue_id, &closed_on],
            )
            .await?;
        Ok(())
    }

    async fn insert_relation(&self, relation: &NewRelation) -> Result<i64> {
        self.insert_returning(
            "INSERT INTO issue_relations (issue_from_id, issue_to_id, relation_type) \
             VALUES ($1::bigint, $2::bigint, $3) RETURNING id::bigint",
            &[
                &relation.issue_from_id,
                &relation.issue_to_id,
                &relation.relation_type,
            ],
        )
        .await
    }

    async fn insert_custom_field(&self, field: &NewCustomField) -> Result<i64> {
        self.insert_returning(
            "INSERT INTO custom_fields \
               (type, name, field_format, possible_values, default_value, \
                is_required, is_filter, searchable, multiple, position) \
             SELECT 'IssueCustomField', $1, $2, $3, $4, false, false, false, $5, \
                    COALESCE(MAX(position), 0) + 1 \
             FROM custom_fields \
             RETURNING id::bigint",
            &[
                &field.name,
                &field.field_format,
                &field.possible_values,
                &field.default_value,
                &field.multiple,
            ],
        )
        .await
    }

    async fn attach_custom_field_tracker(&self, field_id: i64, tracker_id: i64) -> Result<()> {
        let client = self.client().await?;
        client
            .execute(
                "INSERT INTO custom_fields_trackers (custom_field_id, tracker_id) \
                 VALUES ($1::bigint, $2::bigint)",
                &[&field_id, &tracker_id],
            )
            .await?;
        Ok(())
    }

    async fn attach_custom_field_project(&self, field_id: i64, project_id: i64) -> Result<()> {
        let client = self.client().await?;
        client
            .execute(
                "INSERT INTO custom_fields_projects (custom_field_id, project_id) \
                 VALUES ($1::bigint, $2::bigint)",
                &[&field_id, &project_id],
            )
            .await?;
        Ok(())
    }

    async fn insert_custom_value(&self, field_id: i64, issue_id: i64, value: &str) -> Result<()> {
        let client = self.client().await?;
        client
            .execute(
                "INSERT INTO custom_values \
                   (customized_type, customized_id, custom_field_id, value) \
                 VALUES ('Issue', $1::bigint, $2::bigint, $3)",
                &[&issue_id, &field_id, &value],
            )
            .await?;
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        let client = self.client().await?;
        client.simple_query("SELECT 1").await?;
        Ok(())
    }
}
