//! SQLite-backed key-value table.
//!
//! Uses `rusqlite` with the `bundled` feature so no system SQLite
//! library is required.  All methods are synchronous rusqlite calls
//! executed under a `Mutex`; the consensus layer never awaits storage
//! beyond the replicator contract, and handlers tolerate the brief
//! blocking.
//!
//! Reads are served without consensus; writes reach this table only
//! after the engine has committed the operation.

use std::collections::BTreeMap;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::consensus::messages::{OpKind, Operation};

/// Key-value store backed by a single SQLite database file.
pub struct KvStore {
    /// The database connection, guarded by a mutex for Send + Sync.
    conn: Mutex<Connection>,
}

/// One page of the keyed table, as returned by `GET /api/get-all`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KvPage {
    /// Key-value pairs on this page, in key order.
    pub data: BTreeMap<String, String>,
    pub page: u64,
    pub limit: u64,
    pub total_items: u64,
    pub total_pages: u64,
}

impl KvStore {
    /// Open (or create) the database at `path` and initialize the
    /// schema.  Passing `":memory:"` creates an in-memory database
    /// (useful for tests).
    pub fn new(path: &str) -> anyhow::Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.apply_pragmas()?;
        store.init_db()?;
        Ok(store)
    }

    /// Apply recommended SQLite pragmas for performance and safety.
    fn apply_pragmas(&self) -> anyhow::Result<()> {
        let conn = self.conn.lock().expect("mutex poisoned");
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
            ",
        )?;
        Ok(())
    }

    /// Create the table if it does not already exist.  Idempotent --
    /// safe to call on every startup.
    fn init_db(&self) -> anyhow::Result<()> {
        let conn = self.conn.lock().expect("mutex poisoned");
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS kv_entries (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    /// Insert or replace a key-value pair.
    pub fn put(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let conn = self.conn.lock().expect("mutex poisoned");
        conn.execute(
            "INSERT OR REPLACE INTO kv_entries (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    /// Point lookup.
    pub fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let conn = self.conn.lock().expect("mutex poisoned");
        let value = conn
            .query_row(
                "SELECT value FROM kv_entries WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Delete a key.  Deleting an absent key is not an error.
    pub fn delete(&self, key: &str) -> anyhow::Result<()> {
        let conn = self.conn.lock().expect("mutex poisoned");
        conn.execute("DELETE FROM kv_entries WHERE key = ?1", params![key])?;
        Ok(())
    }

    /// Total number of stored keys.
    pub fn count(&self) -> anyhow::Result<u64> {
        let conn = self.conn.lock().expect("mutex poisoned");
        let count: u64 = conn.query_row("SELECT COUNT(*) FROM kv_entries", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Paginated scan in key order.  `page` is 1-based; out-of-range
    /// pages return an empty data map with correct totals.
    pub fn page(&self, page: u64, limit: u64) -> anyhow::Result<KvPage> {
        let page = page.max(1);
        let limit = limit.max(1);
        let offset = (page - 1) * limit;

        let conn = self.conn.lock().expect("mutex poisoned");
        let mut stmt = conn
            .prepare("SELECT key, value FROM kv_entries ORDER BY key LIMIT ?1 OFFSET ?2")?;
        let rows = stmt.query_map(params![limit, offset], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut data = BTreeMap::new();
        for row in rows {
            let (key, value) = row?;
            data.insert(key, value);
        }

        let total_items: u64 =
            conn.query_row("SELECT COUNT(*) FROM kv_entries", [], |row| row.get(0))?;
        let total_pages = total_items.div_ceil(limit);

        Ok(KvPage {
            data,
            page,
            limit,
            total_items,
            total_pages,
        })
    }

    /// Apply a committed operation.  Idempotent: replays of the same
    /// operation leave the table unchanged.
    pub fn apply(&self, op: &Operation) -> anyhow::Result<()> {
        match op.kind {
            OpKind::Put => self.put(&op.key, &op.value),
            OpKind::Delete => self.delete(&op.key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> KvStore {
        KvStore::new(":memory:").expect("failed to create in-memory store")
    }

    // ── Schema tests ────────────────────────────────────────────────

    #[test]
    fn test_schema_idempotent() {
        let store = test_store();
        store.init_db().expect("second init_db failed");
        store.init_db().expect("third init_db failed");
    }

    #[test]
    fn test_on_disk_store_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kv.db");
        let path = path.to_str().unwrap();

        {
            let store = KvStore::new(path).unwrap();
            store.put("persisted", "yes").unwrap();
        }
        let store = KvStore::new(path).unwrap();
        assert_eq!(store.get("persisted").unwrap().as_deref(), Some("yes"));
    }

    // ── CRUD tests ──────────────────────────────────────────────────

    #[test]
    fn test_put_get_roundtrip() {
        let store = test_store();
        store.put("foo", "bar").unwrap();
        assert_eq!(store.get("foo").unwrap().as_deref(), Some("bar"));
        assert_eq!(store.get("missing").unwrap(), None);
    }

    #[test]
    fn test_put_replaces_existing_value() {
        let store = test_store();
        store.put("foo", "v1").unwrap();
        store.put("foo", "v2").unwrap();
        assert_eq!(store.get("foo").unwrap().as_deref(), Some("v2"));
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let store = test_store();
        store.put("foo", "bar").unwrap();
        store.delete("foo").unwrap();
        assert_eq!(store.get("foo").unwrap(), None);
        // Deleting again is fine.
        store.delete("foo").unwrap();
    }

    #[test]
    fn test_apply_dispatches_operations() {
        let store = test_store();
        store.apply(&Operation::put("k", "v")).unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));

        // Replaying the same operation changes nothing.
        store.apply(&Operation::put("k", "v")).unwrap();
        assert_eq!(store.count().unwrap(), 1);

        store.apply(&Operation::delete("k")).unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }

    // ── Pagination tests ────────────────────────────────────────────

    #[test]
    fn test_pagination_math() {
        let store = test_store();
        for i in 0..25 {
            store.put(&format!("key{i:02}"), "v").unwrap();
        }

        let first = store.page(1, 10).unwrap();
        assert_eq!(first.data.len(), 10);
        assert_eq!(first.total_items, 25);
        assert_eq!(first.total_pages, 3);
        assert!(first.data.contains_key("key00"));

        let last = store.page(3, 10).unwrap();
        assert_eq!(last.data.len(), 5);
        assert!(last.data.contains_key("key24"));

        let beyond = store.page(4, 10).unwrap();
        assert!(beyond.data.is_empty());
        assert_eq!(beyond.total_pages, 3);
    }

    #[test]
    fn test_pagination_clamps_degenerate_parameters() {
        let store = test_store();
        store.put("a", "1").unwrap();
        let page = store.page(0, 0).unwrap();
        assert_eq!(page.page, 1);
        assert_eq!(page.limit, 1);
        assert_eq!(page.data.len(), 1);
    }

    #[test]
    fn test_empty_store_pages() {
        let store = test_store();
        let page = store.page(1, 10).unwrap();
        assert!(page.data.is_empty());
        assert_eq!(page.total_items, 0);
        assert_eq!(page.total_pages, 0);
    }
}
