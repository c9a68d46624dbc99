use std::path::Path;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{Connection, OptionalExtension, Result, params};

fn current_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as i64)
        .unwrap_or(0)
}

/// A persisted graph/viewport snapshot row.
#[derive(Debug, Clone)]
pub struct StoredSnapshot {
    pub payload: String,
    pub zoom: f64,
    pub pan_x: f64,
    pub pan_y: f64,
    pub timestamp: i64,
}

/// Best-effort local persistence: explore sessions, wallet path results and
/// graph/viewport snapshots. Nothing here is durable in any stronger sense;
/// rows carry timestamps and are evicted by TTL.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn exists(path: &Path) -> bool {
        path.exists()
    }

    pub fn remove(path: &Path) -> std::io::Result<()> {
        std::fs::remove_file(path)
    }

    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            PRAGMA foreign_keys = ON;
            ",
        )?;

        let db = Database {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;
        Ok(db)
    }

    /// In-memory database, used by tests and `--no-store` runs.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS explore_sessions (
                id TEXT PRIMARY KEY,
                seed TEXT NOT NULL,
                start_time INTEGER NOT NULL,
                end_time INTEGER,
                status TEXT NOT NULL CHECK(status IN ('running', 'completed', 'failed'))
            );

            -- Wallet path-finding results, keyed \"{source}-to-{target}\".
            CREATE TABLE IF NOT EXISTS path_results (
                key TEXT PRIMARY KEY,
                source TEXT NOT NULL,
                target TEXT NOT NULL,
                hops TEXT NOT NULL,          -- JSON array of node ids
                timestamp INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_path_results_timestamp ON path_results(timestamp);

            -- Graph/viewport snapshots keyed by the focused signature.
            CREATE TABLE IF NOT EXISTS graph_snapshots (
                signature TEXT PRIMARY KEY,
                payload TEXT NOT NULL,       -- JSON node/edge snapshot
                zoom REAL NOT NULL DEFAULT 1.0,
                pan_x REAL NOT NULL DEFAULT 0.0,
                pan_y REAL NOT NULL DEFAULT 0.0,
                timestamp INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_graph_snapshots_timestamp ON graph_snapshots(timestamp);
            ",
        )?;
        Ok(())
    }

    // Session management

    pub fn create_session(&self, seed: &str) -> Result<String> {
        let session_id = uuid::Uuid::new_v4().to_string();
        let timestamp = current_timestamp();

        self.conn.lock().unwrap().execute(
            "INSERT INTO explore_sessions (id, seed, start_time, status) VALUES (?1, ?2, ?3, ?4)",
            params![&session_id, seed, timestamp, "running"],
        )?;

        Ok(session_id)
    }

    pub fn complete_session(&self, session_id: &str) -> Result<()> {
        self.finish_session(session_id, "completed")
    }

    pub fn fail_session(&self, session_id: &str) -> Result<()> {
        self.finish_session(session_id, "failed")
    }

    fn finish_session(&self, session_id: &str, status: &str) -> Result<()> {
        let timestamp = current_timestamp();
        self.conn.lock().unwrap().execute(
            "UPDATE explore_sessions SET status = ?1, end_time = ?2 WHERE id = ?3",
            params![status, timestamp, session_id],
        )?;
        Ok(())
    }

    pub fn session_status(&self, session_id: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT status FROM explore_sessions WHERE id = ?1")?;
        stmt.query_row(params![session_id], |row| row.get(0))
            .optional()
    }

    // Path results

    pub fn save_path_result(&self, source: &str, target: &str, hops_json: &str) -> Result<()> {
        let key = format!("{source}-to-{target}");
        let timestamp = current_timestamp();
        self.conn.lock().unwrap().execute(
            "INSERT OR REPLACE INTO path_results (key, source, target, hops, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![&key, source, target, hops_json, timestamp],
        )?;
        Ok(())
    }

    /// Returns the stored hops JSON and its timestamp.
    pub fn load_path_result(&self, source: &str, target: &str) -> Result<Option<(String, i64)>> {
        let key = format!("{source}-to-{target}");
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT hops, timestamp FROM path_results WHERE key = ?1")?;
        stmt.query_row(params![&key], |row| Ok((row.get(0)?, row.get(1)?)))
            .optional()
    }

    pub fn evict_stale_paths(&self, ttl_secs: i64) -> Result<usize> {
        let cutoff = current_timestamp() - ttl_secs;
        let deleted = self.conn.lock().unwrap().execute(
            "DELETE FROM path_results WHERE timestamp < ?1",
            params![cutoff],
        )?;
        Ok(deleted)
    }

    // Snapshots

    pub fn save_snapshot(
        &self,
        signature: &str,
        payload: &str,
        zoom: f64,
        pan_x: f64,
        pan_y: f64,
    ) -> Result<()> {
        let timestamp = current_timestamp();
        self.conn.lock().unwrap().execute(
            "INSERT OR REPLACE INTO graph_snapshots (signature, payload, zoom, pan_x, pan_y, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![signature, payload, zoom, pan_x, pan_y, timestamp],
        )?;
        Ok(())
    }

    pub fn load_snapshot(&self, signature: &str) -> Result<Option<StoredSnapshot>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT payload, zoom, pan_x, pan_y, timestamp FROM graph_snapshots WHERE signature = ?1",
        )?;
        stmt.query_row(params![signature], |row| {
            Ok(StoredSnapshot {
                payload: row.get(0)?,
                zoom: row.get(1)?,
                pan_x: row.get(2)?,
                pan_y: row.get(3)?,
                timestamp: row.get(4)?,
            })
        })
        .optional()
    }

    pub fn evict_stale_snapshots(&self, ttl_secs: i64) -> Result<usize> {
        let cutoff = current_timestamp() - ttl_secs;
        let deleted = self.conn.lock().unwrap().execute(
            "DELETE FROM graph_snapshots WHERE timestamp < ?1",
            params![cutoff],
        )?;
        Ok(deleted)
    }
}
