//! Database migrations

use crate::entity::{EntityDescriptor, EntityKind};
use crate::error::Result;
use crate::models::LookupKind;
use libsql::Connection;

/// Current schema version
const CURRENT_VERSION: i32 = 2;

/// Run all pending migrations
pub async fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn).await?;

    if version < 1 {
        migrate_v1(conn).await?;
    }
    if version < 2 {
        migrate_v2(conn).await?;
    }

    Ok(())
}

/// Get the current schema version
async fn get_version(conn: &Connection) -> Result<i32> {
    let mut rows = conn
        .query(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            (),
        )
        .await?;

    let exists: bool = if let Some(row) = rows.next().await? {
        row.get::<i32>(0)? != 0
    } else {
        false
    };

    if !exists {
        return Ok(0);
    }

    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await?;

    let version: i32 = if let Some(row) = rows.next().await? {
        row.get(0)?
    } else {
        0
    };

    Ok(version)
}

/// Render the CREATE TABLE statement for one synchronized entity table.
///
/// Every table carries the shared sync-metadata block; child tables add the
/// parent link columns, parent tables add the sub-screen rollup flag.
fn create_entity_table_sql(descriptor: &EntityDescriptor) -> String {
    let mut columns = vec!["content_item_id TEXT PRIMARY KEY".to_string()];

    if descriptor.has_parent {
        columns.push("parent_kind TEXT NOT NULL".to_string());
        columns.push("parent_id TEXT NOT NULL".to_string());
    }

    for column in descriptor.payload_columns {
        columns.push(format!("{} {}", column.name, column.sql_type));
    }

    columns.push("correlation_id TEXT".to_string());
    columns.push("is_edited INTEGER NOT NULL DEFAULT 0".to_string());
    columns.push("is_sync INTEGER NOT NULL DEFAULT 0".to_string());
    columns.push("is_force_sync INTEGER NOT NULL DEFAULT 0".to_string());
    columns.push("is_force_sync_success INTEGER NOT NULL DEFAULT 0".to_string());
    columns.push("not_in_offline INTEGER NOT NULL DEFAULT 0".to_string());
    columns.push("api_change_date_utc TEXT".to_string());
    columns.push("created_utc INTEGER NOT NULL".to_string());
    columns.push("modified_utc INTEGER NOT NULL".to_string());

    if !descriptor.has_parent {
        columns.push("is_sub_screen_edited INTEGER NOT NULL DEFAULT 0".to_string());
    }

    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
        descriptor.table,
        columns.join(",\n    ")
    )
}

fn entity_index_sql(descriptor: &EntityDescriptor) -> Vec<String> {
    let table = descriptor.table;
    let mut statements = vec![format!(
        "CREATE INDEX IF NOT EXISTS idx_{table}_dirty ON {table}(is_edited, is_force_sync, is_force_sync_success)"
    )];
    if descriptor.has_parent {
        statements.push(format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_parent ON {table}(parent_id)"
        ));
    }
    statements
}

async fn apply(conn: &Connection, statements: &[String], version: i32) -> Result<()> {
    // libsql doesn't have execute_batch, so we run each statement separately
    // inside one transaction for atomicity.
    conn.execute("BEGIN TRANSACTION", ()).await?;

    for stmt in statements {
        if let Err(e) = conn.execute(stmt, ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
    }

    if let Err(e) = conn.execute("COMMIT", ()).await {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    tracing::info!("Migrated database to version {version}");
    Ok(())
}

/// Migration to version 1: schema version tracking plus all entity tables
async fn migrate_v1(conn: &Connection) -> Result<()> {
    let mut statements = vec![
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        )"
        .to_string(),
    ];

    for kind in [EntityKind::Case, EntityKind::License]
        .into_iter()
        .chain(EntityKind::CHILD_KINDS)
    {
        let descriptor = kind.descriptor();
        statements.push(create_entity_table_sql(descriptor));
        statements.extend(entity_index_sql(descriptor));
    }

    statements.push("INSERT INTO schema_version (version) VALUES (1)".to_string());

    apply(conn, &statements, 1).await
}

/// Migration to version 2: lookup/dropdown cache tables
async fn migrate_v2(conn: &Connection) -> Result<()> {
    let mut statements = Vec::new();

    for kind in LookupKind::ALL {
        statements.push(format!(
            "CREATE TABLE IF NOT EXISTS {} (
            key TEXT PRIMARY KEY,
            label TEXT NOT NULL,
            fetched_utc INTEGER NOT NULL
        )",
            kind.table()
        ));
    }

    statements.push("INSERT INTO schema_version (version) VALUES (2)".to_string());

    apply(conn, &statements, 2).await
}
