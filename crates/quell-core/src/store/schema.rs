//! Canonical SQLite schema for the quell key store.
//!
//! Every table carries an `ns` column: a stable namespace prefix that
//! groups all rows belonging to one deployment, so multiple coalescing
//! domains can share one database file without collision.
//!
//! - `pending_lists` holds the ordered coalesce lists. Insertion is always
//!   at the tail (`seq` ascending); the head (minimum `seq`) is the oldest
//!   member, the one age lookups read.
//! - `list_keys` is the known-keys set. Invariant: a key has a row here if
//!   and only if its list is non-empty.
//! - `pending_tasks` records, per tracked task, the coalesce key captured
//!   at insertion time and the insertion timestamp. Terminal events look
//!   the key up here instead of re-deriving it.
//! - `thresholds` stores the per-key (age, size) supersession policy.
//! - `counters` persists the named stats so a restart resumes prior counts.

/// Migration v1: core tables.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS pending_lists (
    ns TEXT NOT NULL,
    list_key TEXT NOT NULL CHECK (length(list_key) > 0),
    seq INTEGER NOT NULL,
    task_id TEXT NOT NULL CHECK (length(task_id) > 0),
    PRIMARY KEY (ns, list_key, seq)
);

CREATE TABLE IF NOT EXISTS list_keys (
    ns TEXT NOT NULL,
    list_key TEXT NOT NULL CHECK (length(list_key) > 0),
    PRIMARY KEY (ns, list_key)
);

CREATE TABLE IF NOT EXISTS pending_tasks (
    ns TEXT NOT NULL,
    task_id TEXT NOT NULL CHECK (length(task_id) > 0),
    list_key TEXT NOT NULL,
    inserted_at_us INTEGER NOT NULL,
    PRIMARY KEY (ns, task_id)
);

CREATE TABLE IF NOT EXISTS thresholds (
    ns TEXT NOT NULL,
    list_key TEXT NOT NULL CHECK (length(list_key) > 0),
    max_age_secs INTEGER NOT NULL CHECK (max_age_secs >= 0),
    max_size INTEGER NOT NULL CHECK (max_size >= 0),
    PRIMARY KEY (ns, list_key)
);

CREATE TABLE IF NOT EXISTS counters (
    ns TEXT NOT NULL,
    name TEXT NOT NULL CHECK (length(name) > 0),
    value INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (ns, name)
);
";

/// Migration v2: read-path indexes for member lookups and sweeps.
pub const MIGRATION_V2_SQL: &str = r"
CREATE INDEX IF NOT EXISTS idx_pending_lists_member
    ON pending_lists(ns, list_key, task_id);

CREATE INDEX IF NOT EXISTS idx_pending_tasks_key
    ON pending_tasks(ns, list_key);
";
