//! Versioned schema for document metadata.
//!
//! # Schema
//! - v1 `documents`: documents, their append-only `document_versions`
//!   (checksum plus algorithm per version) and `document_permissions`
//!   keyed by `(document, user, permission)` with an explicit `granted`
//!   flag so revocations stay on record.
//! - v2 `labels`: named attributes, case-insensitive tags and groups, each
//!   attached through a per-document join table.
//!
//! # Invariants
//! - Version rows are immutable: `BEFORE UPDATE` and `BEFORE DELETE`
//!   triggers on `document_versions` abort the statement.
//! - Join rows cascade with their document; version rows do not.
//! - The applied version is mirrored to `PRAGMA user_version`, and all
//!   pending steps commit in one transaction or not at all.

use crate::db::{DbError, DbResult};
use log::{debug, info};
use rusqlite::Connection;

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "documents",
        sql: include_str!("0001_documents.sql"),
    },
    Migration {
        version: 2,
        name: "labels",
        sql: include_str!("0002_labels.sql"),
    },
];

/// Schema version written by the newest migration this build knows.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Brings the metadata schema up to `latest_version`.
///
/// Fails with `UnsupportedSchemaVersion` on a database written by a newer
/// build instead of guessing at its layout.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let from_version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    let latest = latest_version();

    if from_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: from_version,
            latest_supported: latest,
        });
    }
    if from_version == latest {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for step in MIGRATIONS.iter().filter(|step| step.version > from_version) {
        tx.execute_batch(step.sql)?;
        tx.pragma_update(None, "user_version", step.version)?;
        debug!(
            "event=db_migrate_step module=db status=applied version={} name={}",
            step.version, step.name
        );
    }
    tx.commit()?;

    info!("event=db_migrate module=db status=ok from_version={from_version} to_version={latest}");
    Ok(())
}
