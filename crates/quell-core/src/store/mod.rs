//! Durable key store backing the coalescing engine.
//!
//! Runtime defaults are intentionally conservative:
//! - `journal_mode = WAL` so the reconciler and query readers can run
//!   while the event consumer writes
//! - `busy_timeout = 5s` to reduce transient lock failures under contention
//! - `foreign_keys = ON` for relational integrity
//!
//! The store is the single source of truth for pending state. There is no
//! in-process pending map: a restart resumes from whatever the tables say.
//!
//! Multi-step mutation groups ("append to list + add key to set", "remove
//! from list + conditionally drop key") run through [`KeyStore::mutate`],
//! which wraps them in one SQLite write transaction. SQLite's single-writer
//! model makes that the per-key serialization discipline: a reconciler
//! eviction can never interleave with a terminal removal.

pub mod migrations;
pub mod schema;

use rusqlite::{Connection, OptionalExtension, params};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::threshold::ThresholdPolicy;

/// Busy timeout used for store connections.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Default deployment namespace; every persisted row is scoped under it.
pub const DEFAULT_NAMESPACE: &str = "coalesce.v1.";

/// Errors from key-store operations.
///
/// Any of these is fatal to the event being processed: the caller must not
/// acknowledge the delivery, so the transport redelivers it later.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The underlying SQLite operation failed.
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// The store directory could not be created.
    #[error("create store directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A tracked pending task: the coalesce key captured at insertion time and
/// the insertion timestamp (microseconds since the Unix epoch).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTask {
    pub task_id: String,
    pub list_key: String,
    pub inserted_at_us: i64,
}

/// Handle to the durable key store, scoped to one deployment namespace.
pub struct KeyStore {
    conn: Connection,
    ns: String,
}

impl KeyStore {
    /// Open (or create) the store at `path`, apply runtime pragmas, and
    /// migrate the schema to the latest version.
    ///
    /// # Errors
    ///
    /// Returns an error if opening, configuring, or migrating fails.
    pub fn open(path: &Path, namespace: impl Into<String>) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let conn = Connection::open(path)?;
        Self::from_connection(conn, namespace)
    }

    /// Open an in-memory store. Used by tests and ephemeral tooling.
    ///
    /// # Errors
    ///
    /// Returns an error if configuring or migrating fails.
    pub fn open_in_memory(namespace: impl Into<String>) -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, namespace)
    }

    fn from_connection(mut conn: Connection, namespace: impl Into<String>) -> Result<Self, StoreError> {
        configure_connection(&conn)?;
        migrations::migrate(&mut conn)?;
        Ok(Self {
            conn,
            ns: namespace.into(),
        })
    }

    /// The deployment namespace this handle is scoped to.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.ns
    }

    /// Run a group of primitive operations as one write transaction.
    ///
    /// The closure's operations commit together or not at all; an `Err`
    /// rolls everything back, so a failed event is never partially applied.
    ///
    /// # Errors
    ///
    /// Returns the closure's error, or a transaction begin/commit failure.
    pub fn mutate<T>(
        &mut self,
        f: impl FnOnce(&StoreOps<'_>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let ns = self.ns.clone();
        let tx = self.conn.transaction()?;
        let result = f(&StoreOps { conn: &tx, ns: &ns });
        match result {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(error) => Err(error),
        }
    }

    /// Borrow the primitives for read-only (or single-statement) use.
    #[must_use]
    pub fn ops(&self) -> StoreOps<'_> {
        StoreOps {
            conn: &self.conn,
            ns: &self.ns,
        }
    }

    // Read-side conveniences, used by the query surface and the evaluator.

    /// Ordered members of a coalesce list, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    pub fn list_range(&self, list_key: &str) -> Result<Vec<String>, StoreError> {
        self.ops().list_range(list_key)
    }

    /// Members of the known-keys set, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    pub fn known_keys(&self) -> Result<Vec<String>, StoreError> {
        self.ops().keys_members()
    }

    /// Whether `list_key` is in the known-keys set.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    pub fn is_known_key(&self, list_key: &str) -> Result<bool, StoreError> {
        self.ops().keys_contains(list_key)
    }

    /// Look up a tracked task.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    pub fn pending_task(&self, task_id: &str) -> Result<Option<PendingTask>, StoreError> {
        self.ops().pending_task_get(task_id)
    }

    /// Threshold policy for a key, if configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    pub fn threshold(&self, list_key: &str) -> Result<Option<ThresholdPolicy>, StoreError> {
        self.ops().threshold_get(list_key)
    }

    /// All configured threshold policies, keyed by coalesce key.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    pub fn thresholds(&self) -> Result<BTreeMap<String, ThresholdPolicy>, StoreError> {
        self.ops().thresholds_all()
    }

    /// Set (create or replace) the threshold policy for a key.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn set_threshold(&self, list_key: &str, policy: ThresholdPolicy) -> Result<(), StoreError> {
        self.ops().threshold_set(list_key, policy)
    }

    /// Delete the threshold policy for a key. Returns whether one existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn delete_threshold(&self, list_key: &str) -> Result<bool, StoreError> {
        self.ops().threshold_delete(list_key)
    }

    /// Read one named counter (0 when never written).
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    pub fn counter(&self, name: &str) -> Result<i64, StoreError> {
        self.ops().counter_get(name)
    }

    /// All persisted counters.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    pub fn counters(&self) -> Result<BTreeMap<String, i64>, StoreError> {
        self.ops().counters_all()
    }
}

impl std::fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyStore").field("ns", &self.ns).finish()
    }
}

fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    // In-memory databases report "memory" here; file databases switch to WAL.
    let _journal_mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
    Ok(())
}

/// Primitive keyed-list / keyed-set / scalar operations, bound to one
/// connection and namespace.
///
/// Obtained from [`KeyStore::mutate`] (transactional) or [`KeyStore::ops`]
/// (auto-commit, single statements only).
pub struct StoreOps<'a> {
    conn: &'a Connection,
    ns: &'a str,
}

impl StoreOps<'_> {
    // -- ordered lists ------------------------------------------------------

    /// Append `task_id` at the tail of `list_key`'s list.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn list_append(&self, list_key: &str, task_id: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO pending_lists (ns, list_key, seq, task_id)
             VALUES (
                 ?1, ?2,
                 (SELECT COALESCE(MAX(seq), 0) + 1
                    FROM pending_lists WHERE ns = ?1 AND list_key = ?2),
                 ?3
             )",
            params![self.ns, list_key, task_id],
        )?;
        Ok(())
    }

    /// Remove a single occurrence of `task_id` from `list_key`'s list.
    /// Returns whether anything was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn list_remove_single(&self, list_key: &str, task_id: &str) -> Result<bool, StoreError> {
        let removed = self.conn.execute(
            "DELETE FROM pending_lists WHERE rowid = (
                 SELECT rowid FROM pending_lists
                  WHERE ns = ?1 AND list_key = ?2 AND task_id = ?3
                  ORDER BY seq LIMIT 1
             )",
            params![self.ns, list_key, task_id],
        )?;
        Ok(removed > 0)
    }

    /// Number of members in `list_key`'s list.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    pub fn list_len(&self, list_key: &str) -> Result<u64, StoreError> {
        let len = self.conn.query_row(
            "SELECT COUNT(*) FROM pending_lists WHERE ns = ?1 AND list_key = ?2",
            params![self.ns, list_key],
            |row| row.get(0),
        )?;
        Ok(len)
    }

    /// Members of `list_key`'s list, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    pub fn list_range(&self, list_key: &str) -> Result<Vec<String>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT task_id FROM pending_lists
              WHERE ns = ?1 AND list_key = ?2
              ORDER BY seq DESC",
        )?;
        let rows = stmt.query_map(params![self.ns, list_key], |row| row.get(0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<String>>>()?)
    }

    /// The oldest member of `list_key`'s list (the head), if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    pub fn list_oldest(&self, list_key: &str) -> Result<Option<String>, StoreError> {
        let oldest = self
            .conn
            .query_row(
                "SELECT task_id FROM pending_lists
                  WHERE ns = ?1 AND list_key = ?2
                  ORDER BY seq ASC LIMIT 1",
                params![self.ns, list_key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(oldest)
    }

    // -- known-keys set -----------------------------------------------------

    /// Add `list_key` to the known-keys set (no-op if already present).
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn keys_add(&self, list_key: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT OR IGNORE INTO list_keys (ns, list_key) VALUES (?1, ?2)",
            params![self.ns, list_key],
        )?;
        Ok(())
    }

    /// Remove `list_key` from the known-keys set. Returns whether it was
    /// present.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn keys_remove(&self, list_key: &str) -> Result<bool, StoreError> {
        let removed = self.conn.execute(
            "DELETE FROM list_keys WHERE ns = ?1 AND list_key = ?2",
            params![self.ns, list_key],
        )?;
        Ok(removed > 0)
    }

    /// Whether `list_key` is in the known-keys set.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    pub fn keys_contains(&self, list_key: &str) -> Result<bool, StoreError> {
        let found = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM list_keys WHERE ns = ?1 AND list_key = ?2)",
            params![self.ns, list_key],
            |row| row.get(0),
        )?;
        Ok(found)
    }

    /// Members of the known-keys set, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    pub fn keys_members(&self) -> Result<Vec<String>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT list_key FROM list_keys WHERE ns = ?1 ORDER BY list_key")?;
        let rows = stmt.query_map(params![self.ns], |row| row.get(0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<String>>>()?)
    }

    /// Size of the known-keys set.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    pub fn keys_count(&self) -> Result<i64, StoreError> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM list_keys WHERE ns = ?1",
            params![self.ns],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // -- pending-task index -------------------------------------------------

    /// Record (or refresh) the captured key and insertion timestamp for a
    /// tracked task.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn pending_task_put(
        &self,
        task_id: &str,
        list_key: &str,
        inserted_at_us: i64,
    ) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO pending_tasks (ns, task_id, list_key, inserted_at_us)
             VALUES (?1, ?2, ?3, ?4)",
            params![self.ns, task_id, list_key, inserted_at_us],
        )?;
        Ok(())
    }

    /// Look up a tracked task.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    pub fn pending_task_get(&self, task_id: &str) -> Result<Option<PendingTask>, StoreError> {
        let task = self
            .conn
            .query_row(
                "SELECT list_key, inserted_at_us FROM pending_tasks
                  WHERE ns = ?1 AND task_id = ?2",
                params![self.ns, task_id],
                |row| {
                    Ok(PendingTask {
                        task_id: task_id.to_string(),
                        list_key: row.get(0)?,
                        inserted_at_us: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(task)
    }

    /// Forget a tracked task. Returns whether it was tracked.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn pending_task_delete(&self, task_id: &str) -> Result<bool, StoreError> {
        let removed = self.conn.execute(
            "DELETE FROM pending_tasks WHERE ns = ?1 AND task_id = ?2",
            params![self.ns, task_id],
        )?;
        Ok(removed > 0)
    }

    /// Number of tracked pending tasks.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    pub fn pending_count(&self) -> Result<i64, StoreError> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM pending_tasks WHERE ns = ?1",
            params![self.ns],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // -- threshold policies -------------------------------------------------

    /// Set (create or replace) the threshold policy for a key.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn threshold_set(&self, list_key: &str, policy: ThresholdPolicy) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO thresholds (ns, list_key, max_age_secs, max_size)
             VALUES (?1, ?2, ?3, ?4)",
            params![self.ns, list_key, policy.age, policy.size],
        )?;
        Ok(())
    }

    /// Threshold policy for a key, if configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    pub fn threshold_get(&self, list_key: &str) -> Result<Option<ThresholdPolicy>, StoreError> {
        let policy = self
            .conn
            .query_row(
                "SELECT max_age_secs, max_size FROM thresholds
                  WHERE ns = ?1 AND list_key = ?2",
                params![self.ns, list_key],
                |row| {
                    Ok(ThresholdPolicy {
                        age: row.get(0)?,
                        size: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(policy)
    }

    /// Delete the threshold policy for a key. Returns whether one existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn threshold_delete(&self, list_key: &str) -> Result<bool, StoreError> {
        let removed = self.conn.execute(
            "DELETE FROM thresholds WHERE ns = ?1 AND list_key = ?2",
            params![self.ns, list_key],
        )?;
        Ok(removed > 0)
    }

    /// All configured threshold policies, keyed by coalesce key.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    pub fn thresholds_all(&self) -> Result<BTreeMap<String, ThresholdPolicy>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT list_key, max_age_secs, max_size FROM thresholds WHERE ns = ?1",
        )?;
        let rows = stmt.query_map(params![self.ns], |row| {
            Ok((
                row.get::<_, String>(0)?,
                ThresholdPolicy {
                    age: row.get(1)?,
                    size: row.get(2)?,
                },
            ))
        })?;
        Ok(rows.collect::<rusqlite::Result<BTreeMap<_, _>>>()?)
    }

    // -- counters -----------------------------------------------------------

    /// Increment a named counter by one, creating it at 1 if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn counter_incr(&self, name: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO counters (ns, name, value) VALUES (?1, ?2, 1)
             ON CONFLICT (ns, name) DO UPDATE SET value = value + 1",
            params![self.ns, name],
        )?;
        Ok(())
    }

    /// Set a named counter to an absolute value.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn counter_set(&self, name: &str, value: i64) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO counters (ns, name, value) VALUES (?1, ?2, ?3)",
            params![self.ns, name, value],
        )?;
        Ok(())
    }

    /// Read one named counter (0 when never written).
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    pub fn counter_get(&self, name: &str) -> Result<i64, StoreError> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM counters WHERE ns = ?1 AND name = ?2",
                params![self.ns, name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value.unwrap_or(0))
    }

    /// All persisted counters.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    pub fn counters_all(&self) -> Result<BTreeMap<String, i64>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, value FROM counters WHERE ns = ?1")?;
        let rows = stmt.query_map(params![self.ns], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        Ok(rows.collect::<rusqlite::Result<BTreeMap<_, _>>>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn mem_store() -> KeyStore {
        KeyStore::open_in_memory("testing.prefix.").expect("open in-memory store")
    }

    fn temp_db_path() -> (TempDir, PathBuf) {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("quell.sqlite3");
        (dir, path)
    }

    #[test]
    fn open_sets_wal_busy_timeout_and_fk() {
        let (_dir, path) = temp_db_path();
        let store = KeyStore::open(&path, DEFAULT_NAMESPACE).expect("open store");

        let journal_mode: String = store
            .conn
            .pragma_query_value(None, "journal_mode", |row| row.get(0))
            .expect("query journal_mode");
        assert_eq!(journal_mode.to_ascii_lowercase(), "wal");

        let busy_timeout_ms: u64 = store
            .conn
            .pragma_query_value(None, "busy_timeout", |row| row.get(0))
            .expect("query busy_timeout");
        assert_eq!(
            u128::from(busy_timeout_ms),
            DEFAULT_BUSY_TIMEOUT.as_millis()
        );

        let foreign_keys: i64 = store
            .conn
            .pragma_query_value(None, "foreign_keys", |row| row.get(0))
            .expect("query foreign_keys");
        assert_eq!(foreign_keys, 1);
    }

    #[test]
    fn list_append_orders_newest_first_on_range() {
        let store = mem_store();
        let ops = store.ops();
        ops.list_append("builds", "t1").expect("append");
        ops.list_append("builds", "t2").expect("append");
        ops.list_append("builds", "t3").expect("append");

        assert_eq!(
            store.list_range("builds").expect("range"),
            vec!["t3", "t2", "t1"]
        );
        assert_eq!(
            ops.list_oldest("builds").expect("oldest").as_deref(),
            Some("t1")
        );
        assert_eq!(ops.list_len("builds").expect("len"), 3);
    }

    #[test]
    fn list_remove_single_takes_one_occurrence() {
        let store = mem_store();
        let ops = store.ops();
        ops.list_append("k", "a").expect("append");
        ops.list_append("k", "b").expect("append");
        ops.list_append("k", "a").expect("append");

        assert!(ops.list_remove_single("k", "a").expect("remove"));
        assert_eq!(store.list_range("k").expect("range"), vec!["a", "b"]);

        assert!(!ops.list_remove_single("k", "missing").expect("remove"));
        assert_eq!(ops.list_len("k").expect("len"), 2);
    }

    #[test]
    fn key_set_add_remove_members() {
        let store = mem_store();
        let ops = store.ops();
        ops.keys_add("beta").expect("add");
        ops.keys_add("alpha").expect("add");
        ops.keys_add("alpha").expect("re-add is a no-op");

        assert_eq!(store.known_keys().expect("members"), vec!["alpha", "beta"]);
        assert_eq!(ops.keys_count().expect("count"), 2);
        assert!(store.is_known_key("alpha").expect("contains"));

        assert!(ops.keys_remove("alpha").expect("remove"));
        assert!(!ops.keys_remove("alpha").expect("second remove"));
        assert!(!store.is_known_key("alpha").expect("contains"));
    }

    #[test]
    fn pending_task_roundtrip() {
        let store = mem_store();
        let ops = store.ops();
        ops.pending_task_put("t9", "builds", 1_234_567).expect("put");

        let task = store.pending_task("t9").expect("get").expect("present");
        assert_eq!(task.list_key, "builds");
        assert_eq!(task.inserted_at_us, 1_234_567);
        assert_eq!(ops.pending_count().expect("count"), 1);

        assert!(ops.pending_task_delete("t9").expect("delete"));
        assert!(store.pending_task("t9").expect("get").is_none());
        assert_eq!(ops.pending_count().expect("count"), 0);
    }

    #[test]
    fn threshold_roundtrip_and_delete() {
        let store = mem_store();
        let policy = ThresholdPolicy { age: 3600, size: 5 };
        store.set_threshold("builds", policy).expect("set");

        assert_eq!(store.threshold("builds").expect("get"), Some(policy));
        assert_eq!(store.thresholds().expect("all").len(), 1);

        assert!(store.delete_threshold("builds").expect("delete"));
        assert_eq!(store.threshold("builds").expect("get"), None);
        assert!(!store.delete_threshold("builds").expect("second delete"));
    }

    #[test]
    fn counters_incr_set_get() {
        let store = mem_store();
        let ops = store.ops();
        ops.counter_incr("unknown_tasks").expect("incr");
        ops.counter_incr("unknown_tasks").expect("incr");
        ops.counter_set("pending_count", 41).expect("set");

        assert_eq!(store.counter("unknown_tasks").expect("get"), 2);
        assert_eq!(store.counter("pending_count").expect("get"), 41);
        assert_eq!(store.counter("never_written").expect("get"), 0);
    }

    #[test]
    fn counters_survive_reopen() {
        let (_dir, path) = temp_db_path();
        {
            let store = KeyStore::open(&path, DEFAULT_NAMESPACE).expect("open");
            store.ops().counter_set("total_msgs_handled", 7).expect("set");
        }
        let store = KeyStore::open(&path, DEFAULT_NAMESPACE).expect("reopen");
        assert_eq!(store.counter("total_msgs_handled").expect("get"), 7);
    }

    #[test]
    fn namespaces_do_not_collide() {
        let (_dir, path) = temp_db_path();
        let a = KeyStore::open(&path, "deploy-a.").expect("open a");
        a.ops().keys_add("shared").expect("add");

        let b = KeyStore::open(&path, "deploy-b.").expect("open b");
        assert!(b.known_keys().expect("members").is_empty());
    }

    #[test]
    fn mutate_rolls_back_on_error() {
        let mut store = mem_store();
        let result: Result<(), StoreError> = store.mutate(|ops| {
            ops.list_append("k", "t1")?;
            ops.keys_add("k")?;
            // Simulated mid-group failure: a bogus statement.
            ops.conn
                .execute("INSERT INTO no_such_table VALUES (1)", [])?;
            Ok(())
        });
        assert!(result.is_err());

        assert!(store.list_range("k").expect("range").is_empty());
        assert!(store.known_keys().expect("members").is_empty());
    }
}
