//! Schema migrations for the attribution database

use rusqlite::Connection;

use crate::error::{AttributionError, Result};

/// SQL for each schema version, applied in order
const MIGRATIONS: &[(&str, &str)] = &[("v001_initial", include_str!("v001_initial.sql"))];

/// Brings a connection's schema up to the latest version
pub struct Migrator<'a> {
    conn: &'a Connection,
}

impl<'a> Migrator<'a> {
    /// Wrap a connection
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Schema version recorded in `PRAGMA user_version`
    pub fn current_version(&self) -> Result<i32> {
        let version: i32 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;
        Ok(version)
    }

    /// Record `version` in `PRAGMA user_version`
    fn set_version(&self, version: i32) -> Result<()> {
        self.conn.pragma_update(None, "user_version", version)?;
        Ok(())
    }

    /// Apply every migration newer than the recorded version
    pub fn migrate(&self) -> Result<()> {
        let current = self.current_version()?;
        let target = self.target_version();

        if current >= target {
            return Ok(());
        }

        for (idx, (name, sql)) in MIGRATIONS.iter().enumerate() {
            let version = (idx + 1) as i32;
            if version > current {
                tracing::info!(version, migration = %name, "Applying attribution schema migration");
                self.conn.execute_batch(sql).map_err(|e| match e {
                    // Keep the sqlite code so callers can spot a corrupt file
                    rusqlite::Error::SqliteFailure(..) => AttributionError::Database(e),
                    other => AttributionError::Migration(format!("{name}: {other}")),
                })?;
                self.set_version(version)?;
            }
        }

        Ok(())
    }

    /// Latest schema version known to this build
    pub fn target_version(&self) -> i32 {
        MIGRATIONS.len() as i32
    }
}
