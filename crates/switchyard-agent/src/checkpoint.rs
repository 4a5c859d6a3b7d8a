use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use lru::LruCache;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use switchyard_core::config::{AppConfig, CheckpointBackend};
use switchyard_core::error::{Result, SwitchyardError};
use switchyard_core::types::TaskId;

use crate::graph::NodeId;
use crate::state::TaskState;

/// A snapshot of one task's progress through the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub state: TaskState,
    /// Next node to run. `None` once the run has finished.
    pub next: Option<NodeId>,
    /// Nodes already executed, in order.
    pub visited: Vec<NodeId>,
    pub timestamp: DateTime<Utc>,
}

impl Checkpoint {
    /// Checkpoint for a run that has not started yet.
    pub fn start(state: TaskState) -> Self {
        Self {
            state,
            next: Some(NodeId::ENTRY),
            visited: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn task_id(&self) -> &TaskId {
        &self.state.task_id
    }

    pub fn is_finished(&self) -> bool {
        self.next.is_none()
    }
}

/// Storage for per-task checkpoints, keyed by task id.
pub trait Checkpointer: Send + Sync + 'static {
    /// Replace the checkpoint for the task.
    fn save(&self, checkpoint: &Checkpoint) -> Result<()>;

    fn load(&self, task_id: &TaskId) -> Result<Option<Checkpoint>>;

    /// Returns whether a checkpoint was removed.
    fn delete(&self, task_id: &TaskId) -> Result<bool>;
}

fn cp_err(e: impl std::fmt::Display) -> SwitchyardError {
    SwitchyardError::Checkpoint(e.to_string())
}

/// Process-local checkpoints with LRU eviction once `max_entries` is reached.
pub struct MemoryCheckpointer {
    entries: Mutex<LruCache<TaskId, Checkpoint>>,
}

impl MemoryCheckpointer {
    pub fn new(max_entries: usize) -> Self {
        let cap = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(cap)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Checkpointer for MemoryCheckpointer {
    fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        let mut entries = self.entries.lock().map_err(cp_err)?;
        entries.put(checkpoint.task_id().clone(), checkpoint.clone());
        Ok(())
    }

    fn load(&self, task_id: &TaskId) -> Result<Option<Checkpoint>> {
        let mut entries = self.entries.lock().map_err(cp_err)?;
        Ok(entries.get(task_id).cloned())
    }

    fn delete(&self, task_id: &TaskId) -> Result<bool> {
        let mut entries = self.entries.lock().map_err(cp_err)?;
        Ok(entries.pop(task_id).is_some())
    }
}

/// Persistent checkpoints backed by SQLite, one row per task.
pub struct SqliteCheckpointer {
    conn: Mutex<Connection>,
    max_entries: usize,
}

const CHECKPOINT_SCHEMA: &str = "CREATE TABLE IF NOT EXISTS checkpoints (
        task_id TEXT PRIMARY KEY,
        state_json TEXT NOT NULL,
        next_node TEXT,
        visited_json TEXT NOT NULL,
        timestamp TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_cp_timestamp ON checkpoints(timestamp);";

impl SqliteCheckpointer {
    /// Open or create the checkpoint database.
    pub fn open(path: &Path, max_entries: usize) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                SwitchyardError::Checkpoint(format!(
                    "Failed to create checkpoint directory: {}",
                    e
                ))
            })?;
        }

        let conn = Connection::open(path).map_err(|e| {
            SwitchyardError::Checkpoint(format!("Failed to open checkpoint store: {}", e))
        })?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(cp_err)?;
        Self::init(conn, max_entries)
    }

    pub fn in_memory(max_entries: usize) -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(cp_err)?;
        Self::init(conn, max_entries)
    }

    fn init(conn: Connection, max_entries: usize) -> Result<Self> {
        conn.execute_batch(CHECKPOINT_SCHEMA).map_err(|e| {
            SwitchyardError::Checkpoint(format!("Failed to initialize checkpoint schema: {}", e))
        })?;
        Ok(Self {
            conn: Mutex::new(conn),
            max_entries: max_entries.max(1),
        })
    }
}

impl Checkpointer for SqliteCheckpointer {
    fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        let conn = self.conn.lock().map_err(cp_err)?;
        let state_json = serde_json::to_string(&checkpoint.state)?;
        let visited_json = serde_json::to_string(&checkpoint.visited)?;

        conn.execute(
            "INSERT INTO checkpoints (task_id, state_json, next_node, visited_json, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(task_id) DO UPDATE SET
                state_json = excluded.state_json,
                next_node = excluded.next_node,
                visited_json = excluded.visited_json,
                timestamp = excluded.timestamp",
            params![
                checkpoint.task_id().as_str(),
                state_json,
                checkpoint.next.map(|n| n.name()),
                visited_json,
                checkpoint.timestamp.to_rfc3339(),
            ],
        )
        .map_err(|e| SwitchyardError::Checkpoint(format!("Failed to save checkpoint: {}", e)))?;

        // Keep only the most recent rows
        conn.execute(
            "DELETE FROM checkpoints WHERE task_id NOT IN (
                SELECT task_id FROM checkpoints ORDER BY timestamp DESC LIMIT ?1
             )",
            params![self.max_entries as i64],
        )
        .map_err(|e| SwitchyardError::Checkpoint(format!("Failed to prune checkpoints: {}", e)))?;

        Ok(())
    }

    fn load(&self, task_id: &TaskId) -> Result<Option<Checkpoint>> {
        let conn = self.conn.lock().map_err(cp_err)?;
        let row = conn
            .query_row(
                "SELECT state_json, next_node, visited_json, timestamp
                 FROM checkpoints WHERE task_id = ?1",
                params![task_id.as_str()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()
            .map_err(cp_err)?;

        let Some((state_json, next_node, visited_json, ts_str)) = row else {
            return Ok(None);
        };

        let next: Option<NodeId> = next_node
            .map(|name| serde_json::from_value(serde_json::Value::String(name)))
            .transpose()?;

        Ok(Some(Checkpoint {
            state: serde_json::from_str(&state_json)?,
            next,
            visited: serde_json::from_str(&visited_json)?,
            timestamp: DateTime::parse_from_rfc3339(&ts_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        }))
    }

    fn delete(&self, task_id: &TaskId) -> Result<bool> {
        let conn = self.conn.lock().map_err(cp_err)?;
        let deleted = conn
            .execute(
                "DELETE FROM checkpoints WHERE task_id = ?1",
                params![task_id.as_str()],
            )
            .map_err(|e| {
                SwitchyardError::Checkpoint(format!("Failed to delete checkpoint: {}", e))
            })?;
        Ok(deleted > 0)
    }
}

/// Build the checkpointer selected by `[checkpoint]`.
pub fn create_checkpointer(config: &AppConfig) -> Result<Arc<dyn Checkpointer>> {
    let max_entries = config.checkpoint.max_entries;
    match config.checkpoint.backend {
        CheckpointBackend::Memory => Ok(Arc::new(MemoryCheckpointer::new(max_entries))),
        CheckpointBackend::Sqlite => Ok(Arc::new(SqliteCheckpointer::open(
            &config.checkpoint_path(),
            max_entries,
        )?)),
    }
}
