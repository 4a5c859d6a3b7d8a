use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, warn};

use switchyard_core::error::{Result, SwitchyardError};
use switchyard_core::traits::TrajectoryStore;
use switchyard_core::types::{
    LifecycleEvent, SearchHit, TaskId, TaskOutcome, TaskStatus, TrajectoryRecord, TrajectoryStep,
};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS tasks (
        task_id TEXT PRIMARY KEY,
        prompt TEXT NOT NULL DEFAULT '',
        status TEXT,
        current_event TEXT,
        final_response TEXT,
        task TEXT,
        task_choice_summary TEXT,
        search_query TEXT,
        search_results TEXT,
        search_error TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS trajectory_steps (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        task_id TEXT NOT NULL,
        node TEXT NOT NULL,
        timestamp TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_steps_task
        ON trajectory_steps(task_id, id);";

/// SQLite-backed trajectory log. One `tasks` row per task id, steps kept in
/// insertion order in `trajectory_steps`.
pub struct SqliteTrajectoryStore {
    conn: Mutex<Connection>,
}

fn db_err(e: impl std::fmt::Display) -> SwitchyardError {
    SwitchyardError::Database(e.to_string())
}

impl SqliteTrajectoryStore {
    /// Open or create a SQLite database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        // Create parent directories
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                SwitchyardError::Database(format!("Failed to create db directory: {}", e))
            })?;
        }

        let conn = Connection::open(path).map_err(db_err)?;

        // WAL lets the gateway read while workers write
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;

        debug!(path = %path.display(), "Trajectory store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn insert_start(&self, task_id: &str, prompt: &str) -> Result<()> {
        let conn = self.conn.lock().map_err(db_err)?;
        let now = Utc::now().to_rfc3339();
        // Insert-if-absent; a bare row left by an early step append gets filled in.
        conn.execute(
            "INSERT INTO tasks
                (task_id, prompt, status, current_event, search_results, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, '[]', ?5, ?5)
             ON CONFLICT(task_id) DO UPDATE SET
                prompt = excluded.prompt,
                status = excluded.status,
                current_event = excluded.current_event,
                updated_at = excluded.updated_at
             WHERE tasks.status IS NULL",
            params![
                task_id,
                prompt,
                TaskStatus::InProgress.as_str(),
                LifecycleEvent::Start.as_str(),
                now
            ],
        )
        .map_err(db_err)?;
        Ok(())
    }

    fn append_step(&self, task_id: &str, node: &str) -> Result<()> {
        let mut conn = self.conn.lock().map_err(db_err)?;
        let now = Utc::now().to_rfc3339();
        let tx = conn.transaction().map_err(db_err)?;
        tx.execute(
            "INSERT INTO tasks (task_id, created_at, updated_at) VALUES (?1, ?2, ?2)
             ON CONFLICT(task_id) DO UPDATE SET updated_at = excluded.updated_at",
            params![task_id, now],
        )
        .map_err(db_err)?;
        tx.execute(
            "INSERT INTO trajectory_steps (task_id, node, timestamp) VALUES (?1, ?2, ?3)",
            params![task_id, node, now],
        )
        .map_err(db_err)?;
        tx.commit().map_err(db_err)?;
        Ok(())
    }

    fn upsert_end(&self, task_id: &str, outcome: &TaskOutcome) -> Result<()> {
        let conn = self.conn.lock().map_err(db_err)?;
        let now = Utc::now().to_rfc3339();
        let results = serde_json::to_string(&outcome.search_results)?;
        conn.execute(
            "INSERT INTO tasks (task_id, status, current_event, final_response, task,
                                task_choice_summary, search_query, search_results, search_error,
                                created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)
             ON CONFLICT(task_id) DO UPDATE SET
                status = excluded.status,
                current_event = excluded.current_event,
                final_response = excluded.final_response,
                task = excluded.task,
                task_choice_summary = excluded.task_choice_summary,
                search_query = excluded.search_query,
                search_results = excluded.search_results,
                search_error = excluded.search_error,
                updated_at = excluded.updated_at",
            params![
                task_id,
                outcome.status.as_str(),
                LifecycleEvent::End.as_str(),
                outcome.final_response,
                outcome.task,
                outcome.task_choice_summary,
                outcome.search_query,
                results,
                outcome.search_error,
                now
            ],
        )
        .map_err(db_err)?;
        Ok(())
    }

    fn load(&self, task_id: &str) -> Result<Option<TrajectoryRecord>> {
        let conn = self.conn.lock().map_err(db_err)?;

        let row = conn
            .query_row(
                "SELECT prompt, status, current_event, final_response, task,
                        task_choice_summary, search_query, search_results, search_error
                 FROM tasks WHERE task_id = ?1",
                params![task_id],
                |row| {
                    Ok((
                        row.get::<_, Option<String>>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, Option<String>>(4)?,
                        row.get::<_, Option<String>>(5)?,
                        row.get::<_, Option<String>>(6)?,
                        row.get::<_, Option<String>>(7)?,
                        row.get::<_, Option<String>>(8)?,
                    ))
                },
            )
            .optional()
            .map_err(db_err)?;

        let Some((
            prompt,
            status,
            current_event,
            final_response,
            task,
            task_choice_summary,
            search_query,
            search_results,
            search_error,
        )) = row
        else {
            return Ok(None);
        };

        let mut stmt = conn
            .prepare(
                "SELECT node, timestamp FROM trajectory_steps
                 WHERE task_id = ?1
                 ORDER BY id ASC",
            )
            .map_err(db_err)?;

        let rows = stmt
            .query_map(params![task_id], |row| {
                let node: String = row.get(0)?;
                let ts_str: String = row.get(1)?;
                Ok((node, ts_str))
            })
            .map_err(db_err)?;

        let mut trajectory = Vec::new();
        for row in rows {
            let (node, ts_str) = row.map_err(db_err)?;
            let timestamp = DateTime::parse_from_rfc3339(&ts_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now());
            trajectory.push(TrajectoryStep { node, timestamp });
        }

        Ok(Some(TrajectoryRecord {
            task_id: TaskId::from_string(task_id),
            prompt: prompt.unwrap_or_default(),
            status: TaskStatus::from_stored(status.as_deref()),
            current_event: LifecycleEvent::from_stored(current_event.as_deref()),
            trajectory,
            final_response,
            task,
            task_choice_summary,
            search_query,
            search_results: decode_results(task_id, search_results.as_deref()),
            search_error,
        }))
    }
}

/// Decode stored search results, treating anything unreadable as empty.
fn decode_results(task_id: &str, raw: Option<&str>) -> Vec<SearchHit> {
    match raw {
        None => Vec::new(),
        Some(raw) => serde_json::from_str(raw).unwrap_or_else(|e| {
            warn!(task_id = %task_id, error = %e, "Malformed stored search results, ignoring");
            Vec::new()
        }),
    }
}

impl TrajectoryStore for SqliteTrajectoryStore {
    fn log_task_start(&self, task_id: &TaskId, prompt: &str) -> BoxFuture<'_, Result<()>> {
        let task_id = task_id.0.clone();
        let prompt = prompt.to_string();
        Box::pin(async move { self.insert_start(&task_id, &prompt) })
    }

    fn log_step(&self, task_id: &TaskId, node: &str) -> BoxFuture<'_, Result<()>> {
        let task_id = task_id.0.clone();
        let node = node.to_string();
        Box::pin(async move { self.append_step(&task_id, &node) })
    }

    fn log_task_end(&self, task_id: &TaskId, outcome: &TaskOutcome) -> BoxFuture<'_, Result<()>> {
        let task_id = task_id.0.clone();
        let outcome = outcome.clone();
        Box::pin(async move { self.upsert_end(&task_id, &outcome) })
    }

    fn get_task(&self, task_id: &TaskId) -> BoxFuture<'_, Result<Option<TrajectoryRecord>>> {
        let task_id = task_id.0.clone();
        Box::pin(async move { self.load(&task_id) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completed(response: &str) -> TaskOutcome {
        TaskOutcome {
            status: TaskStatus::Completed,
            final_response: response.to_string(),
            task: "content".to_string(),
            task_choice_summary: "wants a blog post".to_string(),
            search_query: Some("rome history".to_string()),
            search_results: vec![SearchHit {
                title: "Rome".into(),
                link: "https://example.org/rome".into(),
                snippet: "Founded 753 BC".into(),
            }],
            search_error: None,
        }
    }

    #[tokio::test]
    async fn test_start_creates_in_progress_record() {
        let store = SqliteTrajectoryStore::in_memory().unwrap();
        let id = TaskId::new();
        store.log_task_start(&id, "hello").await.unwrap();

        let record = store.get_task(&id).await.unwrap().unwrap();
        assert_eq!(record.prompt, "hello");
        assert_eq!(record.status, TaskStatus::InProgress);
        assert_eq!(record.current_event, Some(LifecycleEvent::Start));
        assert!(record.trajectory.is_empty());
        assert!(record.final_response.is_none());
    }

    #[tokio::test]
    async fn test_start_is_insert_if_absent() {
        let store = SqliteTrajectoryStore::in_memory().unwrap();
        let id = TaskId::new();
        store.log_task_start(&id, "first").await.unwrap();
        store.log_step(&id, "task_classification").await.unwrap();
        store.log_task_end(&id, &completed("done")).await.unwrap();

        // A late duplicate start must not reset a finished record
        store.log_task_start(&id, "second").await.unwrap();
        let record = store.get_task(&id).await.unwrap().unwrap();
        assert_eq!(record.prompt, "first");
        assert_eq!(record.status, TaskStatus::Completed);
        assert_eq!(record.trajectory.len(), 1);
    }

    #[tokio::test]
    async fn test_steps_keep_append_order() {
        let store = SqliteTrajectoryStore::in_memory().unwrap();
        let id = TaskId::new();
        store.log_task_start(&id, "blog about rome").await.unwrap();
        for node in ["task_classification", "content", "content_post_web_search"] {
            store.log_step(&id, node).await.unwrap();
        }

        let record = store.get_task(&id).await.unwrap().unwrap();
        assert_eq!(
            record.node_names(),
            vec!["task_classification", "content", "content_post_web_search"]
        );
    }

    #[tokio::test]
    async fn test_end_sets_final_fields() {
        let store = SqliteTrajectoryStore::in_memory().unwrap();
        let id = TaskId::new();
        store.log_task_start(&id, "blog about rome").await.unwrap();
        store.log_task_end(&id, &completed("Rome was founded [Source 1]")).await.unwrap();

        let record = store.get_task(&id).await.unwrap().unwrap();
        assert_eq!(record.status, TaskStatus::Completed);
        assert_eq!(record.current_event, Some(LifecycleEvent::End));
        assert_eq!(record.final_response.as_deref(), Some("Rome was founded [Source 1]"));
        assert_eq!(record.task.as_deref(), Some("content"));
        assert_eq!(record.search_results.len(), 1);
        assert_eq!(record.search_results[0].link, "https://example.org/rome");
    }

    #[tokio::test]
    async fn test_end_without_start_upserts() {
        let store = SqliteTrajectoryStore::in_memory().unwrap();
        let id = TaskId::new();
        store
            .log_task_end(&id, &TaskOutcome::failed("model unreachable"))
            .await
            .unwrap();

        let record = store.get_task(&id).await.unwrap().unwrap();
        assert_eq!(record.status, TaskStatus::Failed);
        assert_eq!(record.task.as_deref(), Some("error"));
        assert!(record.prompt.is_empty());
    }

    #[tokio::test]
    async fn test_step_before_start_reads_unknown_then_fills() {
        let store = SqliteTrajectoryStore::in_memory().unwrap();
        let id = TaskId::new();
        store.log_step(&id, "task_classification").await.unwrap();

        let record = store.get_task(&id).await.unwrap().unwrap();
        assert_eq!(record.status, TaskStatus::Unknown);

        store.log_task_start(&id, "late start").await.unwrap();
        let record = store.get_task(&id).await.unwrap().unwrap();
        assert_eq!(record.status, TaskStatus::InProgress);
        assert_eq!(record.prompt, "late start");
        assert_eq!(record.trajectory.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_task_is_none() {
        let store = SqliteTrajectoryStore::in_memory().unwrap();
        let found = store.get_task(&TaskId::from_string("nope")).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_malformed_row_defaults() {
        let store = SqliteTrajectoryStore::in_memory().unwrap();
        {
            let conn = store.conn.lock().unwrap();
            conn.execute(
                "INSERT INTO tasks (task_id, status, search_results, created_at, updated_at)
                 VALUES ('bad', 'Exploded', 'not json', 'x', 'x')",
                [],
            )
            .unwrap();
        }
        let record = store
            .get_task(&TaskId::from_string("bad"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, TaskStatus::Unknown);
        assert!(record.search_results.is_empty());
    }

    #[tokio::test]
    async fn test_open_on_disk_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("trajectories.db");
        let id = TaskId::new();
        {
            let store = SqliteTrajectoryStore::open(&path).unwrap();
            store.log_task_start(&id, "persist me").await.unwrap();
        }
        let reopened = SqliteTrajectoryStore::open(&path).unwrap();
        let record = reopened.get_task(&id).await.unwrap().unwrap();
        assert_eq!(record.prompt, "persist me");
    }
}
