//! SQLite-backed preference store.
//!
//! One `kv` table keyed by `(namespace, key)`; each row keeps the value's
//! type tag next to its text payload so reads come back typed.

use std::path::Path;

use rusqlite::{params, Connection};

use super::keys::NAMESPACE;
use super::{data_dir, KeyValueStore, StoreValue};
use crate::error::{CoreError, StoreError};

/// SQLite database holding the box preferences.
pub struct SqliteStore {
    conn: Connection,
    namespace: String,
}

impl SqliteStore {
    /// Open the store at `~/.config/quitbox/quitbox.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, CoreError> {
        let path = data_dir()?.join("quitbox.db");
        Ok(Self::open_at(&path)?)
    }

    /// Open the store at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|source| StoreError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let store = Self {
            conn,
            namespace: NAMESPACE.to_string(),
        };
        store.migrate()?;
        Ok(store)
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn,
            namespace: NAMESPACE.to_string(),
        };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                namespace TEXT NOT NULL,
                key       TEXT NOT NULL,
                kind      TEXT NOT NULL,
                value     TEXT NOT NULL,
                PRIMARY KEY (namespace, key)
            );",
        )?;
        Ok(())
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<StoreValue>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT kind, value FROM kv WHERE namespace = ?1 AND key = ?2")?;
        let result = stmt.query_row(params![self.namespace, key], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        });
        match result {
            Ok((kind, raw)) => Ok(Some(StoreValue::decode(key, &kind, &raw)?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&mut self, key: &str, value: StoreValue) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (namespace, key, kind, value) VALUES (?1, ?2, ?3, ?4)",
            params![self.namespace, key, value.kind(), value.encode()],
        )?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "DELETE FROM kv WHERE namespace = ?1 AND key = ?2",
            params![self.namespace, key],
        )?;
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.conn
            .execute("DELETE FROM kv WHERE namespace = ?1", params![self.namespace])?;
        Ok(())
    }
}
