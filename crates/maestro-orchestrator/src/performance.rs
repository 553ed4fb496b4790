use chrono::{DateTime, Utc};
use maestro_core::{ExecutorId, MaestroError, MaestroResult};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Score assumed for (task type, executor) pairs with no history.
pub const NEUTRAL_PRIOR: f64 = 0.5;

/// Learned suitability of an executor for a task type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    pub score: f64,
    pub samples: u64,
    pub updated_at: DateTime<Utc>,
}

/// One exported record, keyed by task type and executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceEntry {
    pub task_type: String,
    pub executor: ExecutorId,
    #[serde(flatten)]
    pub record: PerformanceRecord,
}

/// Exponential moving average step: `old·(1−α) + observed·α`.
///
/// The result is clamped to the interval spanned by `old` and `observed`
/// so that rounding never leaves it.
pub fn ema(old: f64, observed: f64, alpha: f64) -> f64 {
    let next = old * (1.0 - alpha) + observed * alpha;
    next.clamp(old.min(observed), old.max(observed))
}

fn check_quality(observed: f64) -> MaestroResult<()> {
    if observed.is_finite() && (0.0..=1.0).contains(&observed) {
        Ok(())
    } else {
        Err(MaestroError::InvalidFeedback(observed))
    }
}

type Key = (String, ExecutorId);

/// Shared (task type, executor) → score table.
pub struct PerformanceStore {
    alpha: f64,
    records: RwLock<HashMap<Key, PerformanceRecord>>,
}

impl PerformanceStore {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Rebuild a store from previously exported records.
    pub fn with_records(alpha: f64, entries: Vec<PerformanceEntry>) -> Self {
        let records = entries
            .into_iter()
            .map(|e| ((e.task_type, e.executor), e.record))
            .collect();
        Self {
            alpha,
            records: RwLock::new(records),
        }
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn record(&self, task_type: &str, executor: &ExecutorId) -> Option<PerformanceRecord> {
        self.records
            .read()
            .get(&(task_type.to_string(), executor.clone()))
            .cloned()
    }

    /// Score with the neutral prior for missing records.
    pub fn score(&self, task_type: &str, executor: &ExecutorId) -> f64 {
        self.record(task_type, executor)
            .map_or(NEUTRAL_PRIOR, |r| r.score)
    }

    /// Recorded scores of several executors, read under one lock.
    /// `None` marks executors without a record.
    pub fn snapshot<'a>(
        &self,
        task_type: &str,
        executors: impl IntoIterator<Item = &'a ExecutorId>,
    ) -> Vec<(ExecutorId, Option<f64>)> {
        let records = self.records.read();
        executors
            .into_iter()
            .map(|id| {
                let score = records
                    .get(&(task_type.to_string(), id.clone()))
                    .map(|r| r.score);
                (id.clone(), score)
            })
            .collect()
    }

    /// Apply one quality observation and return the new score.
    pub fn update(
        &self,
        task_type: &str,
        executor: &ExecutorId,
        observed: f64,
    ) -> MaestroResult<f64> {
        check_quality(observed)?;
        let mut records = self.records.write();
        let record = records
            .entry((task_type.to_string(), executor.clone()))
            .or_insert_with(|| PerformanceRecord {
                score: NEUTRAL_PRIOR,
                samples: 0,
                updated_at: Utc::now(),
            });
        let old = record.score;
        record.score = ema(old, observed, self.alpha);
        record.samples += 1;
        record.updated_at = Utc::now();
        debug!(
            task_type,
            executor = %executor,
            old,
            new = record.score,
            "performance updated"
        );
        Ok(record.score)
    }

    /// All records, sorted by task type then executor.
    pub fn records(&self) -> Vec<PerformanceEntry> {
        let mut entries: Vec<PerformanceEntry> = self
            .records
            .read()
            .iter()
            .map(|((task_type, executor), record)| PerformanceEntry {
                task_type: task_type.clone(),
                executor: executor.clone(),
                record: record.clone(),
            })
            .collect();
        entries.sort_by(|a, b| (&a.task_type, &a.executor).cmp(&(&b.task_type, &b.executor)));
        entries
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}
