use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use stepgraph_core::error::{Result, StepgraphError};
use stepgraph_core::graph::{Graph, GraphDefinition};
use stepgraph_core::run::RunResult;
use stepgraph_core::traits::{GraphStore, RunStore};

/// SQLite-backed graph and run store.
///
/// Graph definitions and run results are kept as JSON documents keyed by id.
/// One connection is shared behind a mutex.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

fn db_err(e: rusqlite::Error) -> StepgraphError {
    StepgraphError::Database(e.to_string())
}

impl SqliteStore {
    /// Open or create a SQLite database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path).map_err(db_err)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(db_err)?;
        Self::init(conn, path.display().to_string())
    }

    /// Open an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::init(conn, ":memory:".to_string())
    }

    fn init(conn: Connection, label: String) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS graphs (
                graph_id TEXT PRIMARY KEY,
                definition TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS runs (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                run_id TEXT NOT NULL UNIQUE,
                graph_id TEXT NOT NULL,
                result TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_runs_graph ON runs(graph_id, seq);",
        )
        .map_err(db_err)?;

        debug!(db = %label, "SQLite store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StepgraphError::Database(format!("connection lock poisoned: {}", e)))
    }
}

impl GraphStore for SqliteStore {
    fn put(&self, graph: Graph) -> Result<()> {
        let definition = serde_json::to_string(graph.definition())?;
        let conn = self.conn()?;
        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO graphs (graph_id, definition, created_at) VALUES (?1, ?2, ?3)",
                params![graph.id(), definition, Utc::now().to_rfc3339()],
            )
            .map_err(db_err)?;

        if inserted == 0 {
            return Err(StepgraphError::AlreadyExists(graph.id().to_string()));
        }
        Ok(())
    }

    fn get(&self, graph_id: &str) -> Result<Option<Arc<Graph>>> {
        let raw: Option<String> = self
            .conn()?
            .query_row(
                "SELECT definition FROM graphs WHERE graph_id = ?1",
                params![graph_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)?;

        match raw {
            Some(json) => {
                let definition: GraphDefinition = serde_json::from_str(&json)?;
                Ok(Some(Arc::new(Graph::new(definition)?)))
            }
            None => Ok(None),
        }
    }

    fn exists(&self, graph_id: &str) -> Result<bool> {
        let count: i64 = self
            .conn()?
            .query_row(
                "SELECT COUNT(*) FROM graphs WHERE graph_id = ?1",
                params![graph_id],
                |row| row.get(0),
            )
            .map_err(db_err)?;
        Ok(count > 0)
    }

    fn list_ids(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT graph_id FROM graphs ORDER BY graph_id")
            .map_err(db_err)?;
        let ids = stmt
            .query_map([], |row| row.get(0))
            .map_err(db_err)?
            .collect::<std::result::Result<Vec<String>, _>>()
            .map_err(db_err)?;
        Ok(ids)
    }
}

impl RunStore for SqliteStore {
    fn put(&self, result: RunResult) -> Result<()> {
        let json = serde_json::to_string(&result)?;
        self.conn()?
            .execute(
                "INSERT INTO runs (run_id, graph_id, result, created_at) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(run_id) DO UPDATE SET result = excluded.result",
                params![result.run_id.as_str(), result.graph_id, json, Utc::now().to_rfc3339()],
            )
            .map_err(db_err)?;
        Ok(())
    }

    fn get(&self, run_id: &str) -> Result<Option<RunResult>> {
        let raw: Option<String> = self
            .conn()?
            .query_row(
                "SELECT result FROM runs WHERE run_id = ?1",
                params![run_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)?;

        raw.map(|json| serde_json::from_str(&json).map_err(StepgraphError::from))
            .transpose()
    }

    fn list_for_graph(&self, graph_id: &str) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT run_id FROM runs WHERE graph_id = ?1 ORDER BY seq")
            .map_err(db_err)?;
        let ids = stmt
            .query_map(params![graph_id], |row| row.get(0))
            .map_err(db_err)?
            .collect::<std::result::Result<Vec<String>, _>>()
            .map_err(db_err)?;
        Ok(ids)
    }
}
