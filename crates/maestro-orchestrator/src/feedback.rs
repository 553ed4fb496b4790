use crate::performance::PerformanceStore;
use crate::types::TaskOutcome;
use maestro_core::{ExecutorId, MaestroError, MaestroResult};
use std::collections::BTreeMap;
use tracing::info;

/// Apply an observed quality score to every executor that contributed a
/// succeeded subtask to `outcome`, once per executor.
///
/// Returns the updated score of each contributor.
pub fn apply_feedback(
    performance: &PerformanceStore,
    outcome: &TaskOutcome,
    quality: f64,
) -> MaestroResult<BTreeMap<ExecutorId, f64>> {
    if !quality.is_finite() || !(0.0..=1.0).contains(&quality) {
        return Err(MaestroError::InvalidFeedback(quality));
    }

    let task_type = &outcome.task.task_type;
    let mut updated = BTreeMap::new();
    for executor in outcome.contributors() {
        let score = performance.update(task_type, &executor, quality)?;
        updated.insert(executor, score);
    }
    info!(
        task_id = %outcome.task.id,
        quality,
        executors = updated.len(),
        "feedback applied"
    );
    Ok(updated)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use maestro_core::{CapabilitySet, ErrorKind, Subtask, Task, TaskStatus};

    fn outcome() -> TaskOutcome {
        let mut task = Task::new("t", "report");
        task.transition(TaskStatus::Completed);
        let mut subtasks = Vec::new();
        for (id, executor, ok) in [("a", "e1", true), ("b", "e1", true), ("c", "e2", false)] {
            let mut s = Subtask::new(task.id, id, "", CapabilitySet::new());
            s.assigned_to = Some(executor.into());
            if ok {
                s.succeed("out".into());
            } else {
                s.fail(ErrorKind::SubtaskTimeout, "slow");
            }
            subtasks.push(s);
        }
        TaskOutcome {
            task,
            subtasks,
            result: None,
            failure: None,
        }
    }

    #[test]
    fn test_only_contributors_updated_once() {
        let store = PerformanceStore::new(0.1);
        let updated = apply_feedback(&store, &outcome(), 1.0).unwrap();
        assert_eq!(updated.len(), 1);
        let record = store.record("report", &"e1".into()).unwrap();
        assert_eq!(record.samples, 1);
        assert!((record.score - 0.55).abs() < 1e-12);
        assert!(store.record("report", &"e2".into()).is_none());
    }

    #[test]
    fn test_out_of_range_rejected() {
        let store = PerformanceStore::new(0.1);
        for bad in [1.5, -1.0, f64::NAN] {
            assert!(apply_feedback(&store, &outcome(), bad).is_err());
        }
        assert!(store.is_empty());
    }
}
