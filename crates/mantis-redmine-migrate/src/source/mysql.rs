//! MySQL source implementation.
//!
//! Uses SQLx for connection pooling and async query execution. Mantis
//! stores most numeric columns as unsigned ints; every numeric read goes
//! through `CAST(... AS SIGNED)` so rows decode uniformly as `i64`.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow, MySqlSslMode};
use sqlx::Row;
use tracing::info;

use super::{
    SourceAttachment, SourceCategory, SourceCustomField, SourceCustomFieldValue, SourceHistory,
    SourceIssue, SourceNote, SourceProject, SourceRelation, SourceRepository, SourceUser,
    SourceVersion,
};
use crate::config::SourceConfig;
use crate::error::{MigrateError, Result};

/// Connection pool timeout.
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Pool size; stages read one at a time.
const SOURCE_POOL_SIZE: u32 = 4;

/// Mantis reader backed by a SQLx MySQL pool.
pub struct MysqlSource {
    pool: MySqlPool,
}

impl MysqlSource {
    /// Connect to the Mantis database.
    pub async fn connect(config: &SourceConfig) -> Result<Self> {
        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.database)
            .username(&config.user)
            .password(&config.password)
            .ssl_mode(MySqlSslMode::Preferred);

        let pool = MySqlPoolOptions::new()
            .max_connections(SOURCE_POOL_SIZE)
            .acquire_timeout(POOL_CONNECTION_TIMEOUT)
            .connect_with(options)
            .await
            .map_err(|e| MigrateError::pool(e, "creating MySQL source pool"))?;

        info!(
            "Connected to Mantis source: {}:{}/{}",
            config.host, config.port, config.database
        );

        Ok(Self { pool })
    }

    async fn distinct_codes(&self, sql: &str) -> Result<Vec<i64>> {
        let rows = sqlx::query(sql).fetch_all(&self.pool).await?;
        rows.iter().map(|row| Ok(row.try_get(0)?)).collect()
    }
}

#[async_trait]
impl SourceRepository for MysqlSource {
    async fn status_codes(&self) -> Result<Vec<i64>> {
        self.distinct_codes(
            "SELECT DISTINCT CAST(status AS SIGNED) FROM mantis_bug_table ORDER BY 1",
        )
        .await
    }

    async fn priority_codes(&self) -> Result<Vec<i64>> {
        self.distinct_codes(
            "SELECT DISTINCT CAST(priority AS SIGNED) FROM mantis_bug_table ORDER BY 1",
        )
        .await
    }

    async fn access_levels(&self) -> Result<Vec<i64>> {
        self.distinct_codes(
            "SELECT DISTINCT CAST(access_level AS SIGNED) FROM mantis_user_table ORDER BY 1",
        )
        .await
    }

    async fn custom_field_types(&self) -> Result<Vec<i64>> {
        self.distinct_codes(
            "SELECT DISTINCT CAST(type AS SIGNED) FROM mantis_custom_field_table ORDER BY 1",
        )
        .await
    }

    async fn relation_types(&self) -> Result<Vec<i64>> {
        self.distinct_codes(
            "SELECT DISTINCT CAST(relationship_type AS SIGNED) \
             FROM mantis_bug_relationship_table ORDER BY 1",
        )
        .await
    }

    async fn projects(&self) -> Result<Vec<SourceProject>> {
        let rows = sqlx::query(
            "SELECT CAST(id AS SIGNED) AS id, name, description, \
                    CAST(enabled AS SIGNED) AS enabled, \
                    CAST(view_state AS SIGNED) AS view_state \
             FROM mantis_project_table ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(project_from_row).collect()
    }

    async fn project_hierarchy(&self) -> Result<Vec<(i64, i64)>> {
        let rows = sqlx::query(
            "SELECT CAST(child_id AS SIGNED) AS child_id, \
                    CAST(parent_id AS SIGNED) AS parent_id \
             FROM mantis_project_hierarchy_table ORDER BY child_id",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| Ok((row.try_get("child_id")?, row.try_get("parent_id")?)))
            .collect()
    }

    async fn versions(&self) -> Result<Vec<SourceVersion>> {
        let rows = sqlx::query(
            "SELECT CAST(id AS SIGNED) AS id, \
                    CAST(project_id AS SIGNED) AS project_id, \
                    version, description, \
                    CAST(date_order AS SIGNED) AS date_order, \
                    CAST(released AS SIGNED) AS released, \
                    CAST(obsolete AS SIGNED) AS obsolete \
             FROM mantis_project_version_table ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(version_from_row).collect()
    }

    async fn categories(&self) -> Result<Vec<SourceCategory>> {
        let rows = sqlx::query(
            "SELECT CAST(id AS SIGNED) AS id, \
                    CAST(project_id AS SIGNED) AS project_id, name \
             FROM mantis_category_table ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| {
                Ok(SourceCategory {
                    id: row.try_get("id")?,
                    project_id: row.try_get("project_id")?,
                    name: row.try_get("name")?,
                })
            })
            .collect()
    }

    async fn users(&self) -> Result<Vec<SourceUser>> {
        let rows = sqlx::query(
            "SELECT CAST(id AS SIGNED) AS id, username, realname, email, \
                    CAST(enabled AS SIGNED) AS enabled, \
                    CAST(access_level AS SIGNED) AS access_level \
             FROM mantis_user_table ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(user_from_row).collect()
    }

    async fn issues(&self) -> Result<Vec<SourceIssue>> {
        let rows = sqlx::query(
            "SELECT CAST(b.id AS SIGNED) AS id, \
                    CAST(b.project_id AS SIGNED) AS project_id, \
                    CAST(b.reporter_id AS SIGNED) AS reporter_id, \
                    CAST(b.handler_id AS SIGNED) AS handler_id, \
                    CAST(b.severity AS SIGNED) AS severity, \
                    CAST(b.priority AS SIGNED) AS priority, \
                    CAST(b.status AS SIGNED) AS status, \
                    CAST(b.category_id AS SIGNED) AS category_id, \
                    CAST(b.date_submitted AS SIGNED) AS date_submitted, \
                    CAST(b.last_updated AS SIGNED) AS last_updated, \
                    CAST(b.view_state AS SIGNED) AS view_state, \
                    b.summary, b.version, b.fixed_in_version, b.target_version, \
                    t.description, t.steps_to_reproduce, t.additional_information \
             FROM mantis_bug_table b \
             JOIN mantis_bug_text_table t ON t.id = b.bug_text_id \
             ORDER BY b.id",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(issue_from_row).collect()
    }

    async fn notes_for_issue(&self, bug_id: i64) -> Result<Vec<SourceNote>> {
        let rows = sqlx::query(
            "SELECT CAST(n.id AS SIGNED) AS id, \
                    CAST(n.reporter_id AS SIGNED) AS reporter_id, \
                    CAST(n.date_submitted AS SIGNED) AS date_submitted, \
                    CAST(n.view_state AS SIGNED) AS view_state, \
                    CAST(n.time_tracking AS SIGNED) AS time_tracking, \
                    t.note \
             FROM mantis_bugnote_table n \
             JOIN mantis_bugnote_text_table t ON t.id = n.bugnote_text_id \
             WHERE n.bug_id = ? ORDER BY n.id",
        )
        .bind(bug_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| {
                Ok(SourceNote {
                    id: row.try_get("id")?,
                    reporter_id: row.try_get("reporter_id")?,
                    date_submitted: row.try_get("date_submitted")?,
                    view_state: row.try_get("view_state")?,
                    time_tracking: row.try_get("time_tracking")?,
                    text: row.try_get("note")?,
                })
            })
            .collect()
    }

    async fn history_for_issue(&self, bug_id: i64) -> Result<Vec<SourceHistory>> {
        let rows = sqlx::query(
            "SELECT CAST(user_id AS SIGNED) AS user_id, \
                    CAST(date_modified AS SIGNED) AS date_modified, \
                    field_name, old_value, new_value \
             FROM mantis_bug_history_table \
             WHERE bug_id = ? ORDER BY date_modified, id",
        )
        .bind(bug_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| {
                Ok(SourceHistory {
                    user_id: row.try_get("user_id")?,
                    date_modified: row.try_get("date_modified")?,
                    field_name: row.try_get("field_name")?,
                    old_value: row.try_get("old_value")?,
                    new_value: row.try_get("new_value")?,
                })
            })
            .collect()
    }

    async fn attachments_for_issue(&self, bug_id: i64) -> Result<Vec<SourceAttachment>> {
        let rows = sqlx::query(
            "SELECT CAST(id AS SIGNED) AS id, \
                    CAST(user_id AS SIGNED) AS user_id, \
                    CAST(date_added AS SIGNED) AS date_added, \
                    CAST(filesize AS SIGNED) AS filesize, \
                    filename, file_type, content \
             FROM mantis_bug_file_table \
             WHERE bug_id = ? ORDER BY id",
        )
        .bind(bug_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| {
                Ok(SourceAttachment {
                    id: row.try_get("id")?,
                    user_id: row.try_get("user_id")?,
                    date_added: row.try_get("date_added")?,
                    filesize: row.try_get("filesize")?,
                    filename: row.try_get("filename")?,
                    file_type: row.try_get("file_type")?,
                    content: row.try_get("content")?,
                })
            })
            .collect()
    }

    async fn relations(&self) -> Result<Vec<SourceRelation>> {
        let rows = sqlx::query(
            "SELECT CAST(id AS SIGNED) AS id, \
                    CAST(source_bug_id AS SIGNED) AS source_bug_id, \
                    CAST(destination_bug_id AS SIGNED) AS destination_bug_id, \
                    CAST(relationship_type AS SIGNED) AS relationship_type \
             FROM mantis_bug_relationship_table ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| {
                Ok(SourceRelation {
                    id: row.try_get("id")?,
                    source_bug_id: row.try_get("source_bug_id")?,
                    destination_bug_id: row.try_get("destination_bug_id")?,
                    relationship_type: row.try_get("relationship_type")?,
                })
            })
            .collect()
    }

    async fn custom_fields(&self) -> Result<Vec<SourceCustomField>> {
        let rows = sqlx::query(
            "SELECT CAST(id AS SIGNED) AS id, name, \
                    CAST(type AS SIGNED) AS field_type, \
                    possible_values, default_value \
             FROM mantis_custom_field_table ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| {
                Ok(SourceCustomField {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                    field_type: row.try_get("field_type")?,
                    possible_values: row.try_get("possible_values")?,
                    default_value: row.try_get("default_value")?,
                })
            })
            .collect()
    }

    async fn custom_field_projects(&self, field_id: i64) -> Result<Vec<i64>> {
        let rows = sqlx::query(
            "SELECT CAST(project_id AS SIGNED) \
             FROM mantis_custom_field_project_table \
             WHERE field_id = ? ORDER BY 1",
        )
        .bind(field_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(|row| Ok(row.try_get(0)?)).collect()
    }

    async fn custom_field_values(&self, field_id: i64) -> Result<Vec<SourceCustomFieldValue>> {
        let rows = sqlx::query(
            "SELECT CAST(bug_id AS SIGNED) AS bug_id, value \
             FROM mantis_custom_field_string_table \
             WHERE field_id = ? ORDER BY bug_id",
        )
        .bind(field_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| {
                Ok(SourceCustomFieldValue {
                    bug_id: row.try_get("bug_id")?,
                    value: row.try_get("value")?,
                })
            })
            .collect()
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}

fn project_from_row(row: &MySqlRow) -> Result<SourceProject> {
    Ok(SourceProject {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        enabled: row.try_get::<i64, _>("enabled")? != 0,
        view_state: row.try_get("view_state")?,
    })
}

fn version_from_row(row: &MySqlRow) -> Result<SourceVersion> {
    Ok(SourceVersion {
        id: row.try_get("id")?,
        project_id: row.try_get("project_id")?,
        version: row.try_get("version")?,
        date_order: row.try_get("date_order")?,
        description: row.try_get("description")?,
        released: row.try_get::<i64, _>("released")? != 0,
        obsolete: row.try_get::<i64, _>("obsolete")? != 0,
    })
}

fn user_from_row(row: &MySqlRow) -> Result<SourceUser> {
    Ok(SourceUser {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        realname: row.try_get("realname")?,
        email: row.try_get("email")?,
        enabled: row.try_get::<i64, _>("enabled")? != 0,
        access_level: row.try_get("access_level")?,
    })
}

fn issue_from_row(row: &MySqlRow) -> Result<SourceIssue> {
    Ok(SourceIssue {
        id: row.try_get("id")?,
        project_id: row.try_get("project_id")?,
        reporter_id: row.try_get("reporter_id")?,
        handler_id: row.try_get("handler_id")?,
        severity: row.try_get("severity")?,
        priority: row.try_get("priority")?,
        status: row.try_get("status")?,
        category_id: row.try_get("category_id")?,
        date_submitted: row.try_get("date_submitted")?,
        last_updated: row.try_get("last_updated")?,
        view_state: row.try_get("view_state")?,
        summary: row.try_get("summary")?,
        version: row.try_get("version")?,
        fixed_in_version: row.try_get("fixed_in_version")?,
        target_version: row.try_get("target_version")?,
        description: row.try_get("description")?,
        steps_to_reproduce: row.try_get("steps_to_reproduce")?,
        additional_information: row.try_get("additional_information")?,
    })
}
