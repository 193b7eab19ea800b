//! SQLite-backed impression and budget store

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::{Connection, ErrorCode, OptionalExtension, params};
use tracing::{debug, warn};

use super::migrations::Migrator;
use super::{BudgetStore, ImpressionStore};
use crate::error::{AttributionError, Result};
use crate::model::{Budget, Impression};

/// Both attribution tables in one SQLite database
pub struct SqliteStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open or create the database at `path`.
    ///
    /// A file that SQLite reports as corrupt or not a database is deleted and
    /// recreated empty.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        match Self::open_file(path) {
            Ok(store) => Ok(store),
            Err(e) if is_corruption(&e) => {
                warn!(path = %path.display(), error = %e, "Attribution database is corrupt, recreating");
                remove_database_files(path)?;
                Self::open_file(path)
            }
            Err(e) => Err(e),
        }
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let store = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
            path: None,
        };
        store.init()?;
        Ok(store)
    }

    fn open_file(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let store = Self {
            conn: Mutex::new(Connection::open(path)?),
            path: Some(path.to_path_buf()),
        };
        store.init()?;
        Ok(store)
    }

    fn init(&self) -> Result<()> {
        let conn = self.lock()?;
        Migrator::new(&conn).migrate()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AttributionError::Storage("connection lock poisoned".into()))
    }

    /// Location on disk, `None` for in-memory databases
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

fn is_corruption(err: &AttributionError) -> bool {
    matches!(
        err,
        AttributionError::Database(rusqlite::Error::SqliteFailure(e, _))
            if matches!(e.code, ErrorCode::NotADatabase | ErrorCode::DatabaseCorrupt)
    )
}

fn remove_database_files(path: &Path) -> Result<()> {
    std::fs::remove_file(path)?;
    for suffix in ["-wal", "-shm", "-journal"] {
        let mut sidecar = path.as_os_str().to_owned();
        sidecar.push(suffix);
        // Sidecars are optional
        let _ = std::fs::remove_file(PathBuf::from(sidecar));
    }
    Ok(())
}

#[async_trait]
impl ImpressionStore for SqliteStore {
    async fn get(&self, ad_key: &str) -> Result<Vec<Impression>> {
        let conn = self.lock()?;
        let records: Option<String> = conn
            .query_row(
                "SELECT records FROM impressions WHERE ad_key = ?1",
                params![ad_key],
                |row| row.get(0),
            )
            .optional()?;

        match records {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    async fn get_all(&self) -> Result<Vec<Impression>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT records FROM impressions ORDER BY rowid")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut all = Vec::new();
        for json in rows {
            let records: Vec<Impression> = serde_json::from_str(&json?)?;
            all.extend(records);
        }
        debug!(count = all.len(), "Loaded all impressions");
        Ok(all)
    }

    async fn put(&self, ad_key: &str, impressions: &[Impression]) -> Result<()> {
        let json = serde_json::to_string(impressions)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO impressions (ad_key, records) VALUES (?1, ?2)
             ON CONFLICT(ad_key) DO UPDATE SET records = excluded.records",
            params![ad_key, json],
        )?;
        Ok(())
    }
}

#[async_trait]
impl BudgetStore for SqliteStore {
    async fn get(&self, host: &str) -> Result<Option<Budget>> {
        let conn = self.lock()?;
        let budget = conn
            .query_row(
                "SELECT conversions, next_reset FROM budgets WHERE host = ?1",
                params![host],
                |row| {
                    Ok(Budget {
                        conversions: row.get(0)?,
                        next_reset: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(budget)
    }

    async fn put(&self, host: &str, budget: &Budget) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO budgets (host, conversions, next_reset) VALUES (?1, ?2, ?3)
             ON CONFLICT(host) DO UPDATE SET
                conversions = excluded.conversions,
                next_reset = excluded.next_reset",
            params![host, budget.conversions, budget.next_reset],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ImpressionType;
    use tempfile::TempDir;

    fn impression(source: &str, target: &str, index: u32, at: i64) -> Impression {
        let mut imp = Impression::new(source, target, index);
        imp.touch(ImpressionType::Default, index, at);
        imp
    }

    #[tokio::test]
    async fn test_impressions_round_trip_through_put() {
        let store = SqliteStore::open_in_memory().unwrap();
        let records = vec![impression("a.com", "b.com", 1, 10)];

        ImpressionStore::put(&store, "ad-1", &records).await.unwrap();

        assert_eq!(ImpressionStore::get(&store, "ad-1").await.unwrap(), records);
        assert!(ImpressionStore::get(&store, "ad-2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_all_keeps_insertion_order() {
        let store = SqliteStore::open_in_memory().unwrap();
        let first = impression("a.com", "t.com", 1, 10);
        let second = impression("c.com", "t.com", 2, 20);
        let third = impression("d.com", "t.com", 3, 30);

        ImpressionStore::put(&store, "ad-z", &[first.clone()]).await.unwrap();
        ImpressionStore::put(&store, "ad-a", &[second.clone()]).await.unwrap();
        // Updating an existing key keeps its position
        ImpressionStore::put(&store, "ad-z", &[first.clone(), third.clone()])
            .await
            .unwrap();

        let all = store.get_all().await.unwrap();
        assert_eq!(all, vec![first, third, second]);
    }

    #[tokio::test]
    async fn test_budget_upsert() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(BudgetStore::get(&store, "b.com").await.unwrap().is_none());

        let budget = Budget {
            conversions: 1,
            next_reset: 500,
        };
        BudgetStore::put(&store, "b.com", &budget).await.unwrap();
        BudgetStore::put(
            &store,
            "b.com",
            &Budget {
                conversions: 2,
                ..budget
            },
        )
        .await
        .unwrap();

        let stored = BudgetStore::get(&store, "b.com").await.unwrap().unwrap();
        assert_eq!(stored.conversions, 2);
        assert_eq!(stored.next_reset, 500);
    }

    #[tokio::test]
    async fn test_file_database_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("attribution.sqlite");

        {
            let store = SqliteStore::open(&path).unwrap();
            BudgetStore::put(&store, "b.com", &Budget::fresh(99)).await.unwrap();
            assert_eq!(store.path(), Some(path.as_path()));
        }

        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(
            BudgetStore::get(&reopened, "b.com").await.unwrap(),
            Some(Budget::fresh(99))
        );
    }

    #[tokio::test]
    async fn test_corrupt_database_is_recreated() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("attribution.sqlite");
        std::fs::write(&path, vec![0x5Au8; 4096]).unwrap();

        let store = SqliteStore::open(&path).unwrap();

        assert!(store.get_all().await.unwrap().is_empty());
        BudgetStore::put(&store, "b.com", &Budget::fresh(1)).await.unwrap();
    }
}
