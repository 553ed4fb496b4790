use chrono::{DateTime, Utc};
use maestro_core::{ExecutorId, SubtaskId};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub task_id: Uuid,
    pub subtask_id: SubtaskId,
    pub executor_id: ExecutorId,
    pub action: String,
    pub details: serde_json::Value,
    pub outcome: AuditOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditOutcome {
    Allowed,
    Denied,
}

/// Entries kept in memory unless [`AuditLog::retain`] says otherwise.
pub const DEFAULT_RETAINED_ENTRIES: usize = 10_000;

#[derive(Default)]
struct Recent {
    entries: VecDeque<AuditEntry>,
    allowed: usize,
    denied: usize,
}

/// Append-only audit log of authorization decisions.
///
/// The most recent entries are kept in memory, older ones are evicted while
/// the per-outcome counts keep growing. When created with
/// [`AuditLog::with_file`] every entry is also appended to `audit.jsonl` by
/// a background writer task.
pub struct AuditLog {
    recent: Mutex<Recent>,
    capacity: usize,
    tx: Option<mpsc::UnboundedSender<AuditEntry>>,
}

impl AuditLog {
    /// Audit log kept only in memory.
    pub fn in_memory() -> Self {
        Self {
            recent: Mutex::new(Recent::default()),
            capacity: DEFAULT_RETAINED_ENTRIES,
            tx: None,
        }
    }

    /// Keep at most `capacity` entries in memory.
    pub fn retain(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Audit log mirrored to `<log_dir>/audit.jsonl`. Must be called inside a
    /// tokio runtime; spawns the writer task.
    pub fn with_file(log_dir: PathBuf) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<AuditEntry>();

        tokio::spawn(async move {
            if let Err(e) = tokio::fs::create_dir_all(&log_dir).await {
                warn!(error = %e, dir = %log_dir.display(), "audit: cannot create log dir");
                return;
            }
            let log_file = log_dir.join("audit.jsonl");
            let mut file = match tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_file)
                .await
            {
                Ok(f) => f,
                Err(e) => {
                    warn!(error = %e, file = %log_file.display(), "audit: cannot open log file");
                    return;
                }
            };

            while let Some(entry) = rx.recv().await {
                if let Ok(line) = serde_json::to_string(&entry) {
                    let line = format!("{line}\n");
                    if file.write_all(line.as_bytes()).await.is_err() {
                        warn!("audit: write failed");
                    }
                    let _ = file.flush().await;
                }
            }
        });

        Self {
            recent: Mutex::new(Recent::default()),
            capacity: DEFAULT_RETAINED_ENTRIES,
            tx: Some(tx),
        }
    }

    pub fn log(&self, entry: AuditEntry) {
        info!(
            task_id = %entry.task_id,
            subtask = %entry.subtask_id,
            executor = %entry.executor_id,
            action = %entry.action,
            outcome = ?entry.outcome,
            "audit"
        );
        if let Some(tx) = &self.tx {
            let _ = tx.send(entry.clone());
        }
        let mut recent = self.recent.lock();
        match entry.outcome {
            AuditOutcome::Allowed => recent.allowed += 1,
            AuditOutcome::Denied => recent.denied += 1,
        }
        if self.capacity == 0 {
            return;
        }
        while recent.entries.len() >= self.capacity {
            recent.entries.pop_front();
        }
        recent.entries.push_back(entry);
    }

    pub fn log_decision(
        &self,
        task_id: Uuid,
        subtask_id: SubtaskId,
        executor_id: ExecutorId,
        details: serde_json::Value,
        outcome: AuditOutcome,
    ) {
        self.log(AuditEntry {
            timestamp: Utc::now(),
            task_id,
            subtask_id,
            executor_id,
            action: "authorize".to_string(),
            details,
            outcome,
        });
    }

    /// Copy of the retained entries, oldest first.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.recent.lock().entries.iter().cloned().collect()
    }

    /// Decisions with `outcome` since the log was created, evicted ones included.
    pub fn count(&self, outcome: AuditOutcome) -> usize {
        let recent = self.recent.lock();
        match outcome {
            AuditOutcome::Allowed => recent.allowed,
            AuditOutcome::Denied => recent.denied,
        }
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::in_memory()
    }
}
