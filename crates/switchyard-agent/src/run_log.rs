use std::path::PathBuf;

use chrono::Utc;
use serde::Serialize;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use switchyard_core::types::TaskEvent;

/// JSONL task lifecycle logger.
///
/// Reads an EventBus subscription and appends one JSON object per event to
/// `{log_dir}/{timestamp}.jsonl`. Lines are flushed as they are written, so
/// a crash never loses earlier entries.
pub struct RunLogger {
    log_dir: PathBuf,
    level: u8,
}

#[derive(Serialize)]
struct LogEntry {
    timestamp: String,
    task_id: String,
    event_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<serde_json::Value>,
}

impl RunLogger {
    /// `level` controls verbosity: 1 = task start/end, 2 = also nodes and
    /// degraded searches.
    pub fn new(log_dir: PathBuf, level: u8) -> Self {
        Self { log_dir, level }
    }

    /// Run the logger until cancelled or the bus closes.
    ///
    /// Takes a receiver rather than the bus so the caller can subscribe
    /// before any events are published. Events already buffered when the
    /// token fires are still written.
    pub async fn run(self, mut rx: broadcast::Receiver<TaskEvent>, cancel: CancellationToken) {
        if let Err(e) = tokio::fs::create_dir_all(&self.log_dir).await {
            error!(error = %e, "Failed to create log directory");
            return;
        }

        let timestamp = Utc::now().format("%Y%m%d_%H%M%S").to_string();
        let log_path = self.log_dir.join(format!("{}.jsonl", timestamp));

        let file = match tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .await
        {
            Ok(f) => f,
            Err(e) => {
                error!(error = %e, path = %log_path.display(), "Failed to open log file");
                return;
            }
        };

        info!(path = %log_path.display(), "RunLogger started");

        let mut writer = tokio::io::BufWriter::new(file);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    loop {
                        match rx.try_recv() {
                            Ok(event) => {
                                if !self.write_event(&mut writer, &event).await {
                                    break;
                                }
                            }
                            Err(TryRecvError::Lagged(n)) => {
                                debug!(skipped = n, "RunLogger lagged, skipped events");
                            }
                            Err(_) => break,
                        }
                    }
                    debug!("RunLogger cancelled");
                    break;
                }
                result = rx.recv() => {
                    match result {
                        Ok(event) => {
                            if !self.write_event(&mut writer, &event).await {
                                break;
                            }
                        }
                        Err(RecvError::Lagged(n)) => {
                            debug!(skipped = n, "RunLogger lagged, skipped events");
                        }
                        Err(RecvError::Closed) => {
                            debug!("EventBus closed, RunLogger stopping");
                            break;
                        }
                    }
                }
            }
        }

        writer.flush().await.ok();
        debug!(path = %log_path.display(), "RunLogger finished");
    }

    /// Append one event as a JSON line. Returns `false` if the file is no
    /// longer writable.
    async fn write_event(&self, writer: &mut BufWriter<File>, event: &TaskEvent) -> bool {
        let Some(entry) = self.event_to_entry(event) else {
            return true;
        };
        let Ok(json) = serde_json::to_string(&entry) else {
            return true;
        };
        let line = format!("{}\n", json);
        if let Err(e) = writer.write_all(line.as_bytes()).await {
            error!(error = %e, "Failed to write log entry");
            return false;
        }
        if let Err(e) = writer.flush().await {
            error!(error = %e, "Failed to flush log");
        }
        true
    }

    /// Convert an event to a log entry, or `None` if the level filters it out.
    fn event_to_entry(&self, event: &TaskEvent) -> Option<LogEntry> {
        let (event_type, detail, min_level) = match event {
            TaskEvent::TaskStarted { .. } => ("task_started", None, 1),
            TaskEvent::TaskCompleted { strategy, .. } => (
                "task_completed",
                Some(serde_json::json!({ "strategy": strategy })),
                1,
            ),
            TaskEvent::TaskFailed { error, .. } => (
                "task_failed",
                Some(serde_json::json!({ "error": error })),
                1,
            ),
            TaskEvent::NodeEntered { node, .. } => (
                "node_entered",
                Some(serde_json::json!({ "node": node })),
                2,
            ),
            TaskEvent::SearchDegraded { error, .. } => (
                "search_degraded",
                Some(serde_json::json!({ "error": error })),
                2,
            ),
        };

        if self.level < min_level {
            return None;
        }

        Some(LogEntry {
            timestamp: Utc::now().to_rfc3339(),
            task_id: event.task_id().to_string(),
            event_type,
            detail,
        })
    }
}
