use async_trait::async_trait;
use maestro_core::{
    Gap, MaestroError, MaestroResult, MergedResult, ReasoningProvider, RevisionRequest, Subtask,
    SubtaskStatus, Task,
};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::info;

/// Turns terminal subtasks (in decomposition order) into merged content.
#[async_trait]
pub trait MergeStrategy: Send + Sync {
    async fn merge(
        &self,
        task: &Task,
        ordered: &[Subtask],
        revision: Option<&RevisionRequest>,
    ) -> MaestroResult<String>;
}

/// Concatenates outputs under per-subtask headings, with a gap marker for
/// every subtask that produced nothing. Revision reasons are appended as
/// notes.
#[derive(Debug, Default, Clone, Copy)]
pub struct OrderedConcatenation;

fn gap_reason(subtask: &Subtask) -> String {
    match &subtask.error {
        Some(err) => format!("{}: {}", err.kind, err.message),
        None => "no output".to_string(),
    }
}

fn revision_notes(out: &mut String, revision: Option<&RevisionRequest>) {
    let Some(req) = revision else {
        return;
    };
    out.push_str("## Revision notes\n");
    for (i, reason) in req.prior.feedback.iter().enumerate() {
        let _ = writeln!(out, "- revision {}: {reason}", i + 1);
    }
    let _ = writeln!(out, "- revision {}: {}", req.revision, req.reason);
}

#[async_trait]
impl MergeStrategy for OrderedConcatenation {
    async fn merge(
        &self,
        _task: &Task,
        ordered: &[Subtask],
        revision: Option<&RevisionRequest>,
    ) -> MaestroResult<String> {
        let mut out = String::new();
        for subtask in ordered {
            let _ = writeln!(out, "## {}", subtask.id);
            match (&subtask.status, &subtask.output) {
                (SubtaskStatus::Succeeded, Some(output)) => {
                    out.push_str(output);
                    out.push('\n');
                }
                (status, _) => {
                    let _ = writeln!(out, "[gap: {status:?} ({})]", gap_reason(subtask));
                }
            }
            out.push('\n');
        }
        revision_notes(&mut out, revision);
        Ok(out)
    }
}

/// Hands content generation to the external reasoning capability.
pub struct ReasoningMerge {
    provider: Arc<dyn ReasoningProvider>,
}

impl ReasoningMerge {
    pub fn new(provider: Arc<dyn ReasoningProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl MergeStrategy for ReasoningMerge {
    async fn merge(
        &self,
        _task: &Task,
        ordered: &[Subtask],
        revision: Option<&RevisionRequest>,
    ) -> MaestroResult<String> {
        let mut out = self.provider.synthesize_content(ordered).await?;
        if revision.is_some() {
            if !out.ends_with('\n') {
                out.push('\n');
            }
            revision_notes(&mut out, revision);
        }
        Ok(out)
    }
}

/// Deterministic merge of a task's subtask outcomes.
#[derive(Clone)]
pub struct ResultSynthesizer {
    strategy: Arc<dyn MergeStrategy>,
}

impl Default for ResultSynthesizer {
    fn default() -> Self {
        Self::new(Arc::new(OrderedConcatenation))
    }
}

impl ResultSynthesizer {
    pub fn new(strategy: Arc<dyn MergeStrategy>) -> Self {
        Self { strategy }
    }

    /// Merge `subtasks` (decomposition order). Every subtask must be terminal.
    pub async fn synthesize(
        &self,
        task: &Task,
        subtasks: &[Subtask],
        revision: Option<&RevisionRequest>,
    ) -> MaestroResult<MergedResult> {
        if let Some(pending) = subtasks.iter().find(|s| !s.is_terminal()) {
            return Err(MaestroError::Synthesis(format!(
                "subtask {} is not terminal ({:?})",
                pending.id, pending.status
            )));
        }

        let contributors = subtasks
            .iter()
            .filter(|s| s.status == SubtaskStatus::Succeeded)
            .map(|s| s.id.clone())
            .collect();
        let gaps = subtasks
            .iter()
            .filter(|s| s.status != SubtaskStatus::Succeeded)
            .map(|s| Gap {
                subtask_id: s.id.clone(),
                status: s.status,
                reason: gap_reason(s),
            })
            .collect();

        let content = self.strategy.merge(task, subtasks, revision).await?;
        let (number, feedback) = match revision {
            Some(req) => {
                let mut feedback = req.prior.feedback.clone();
                feedback.push(req.reason.clone());
                (req.revision, feedback)
            }
            None => (0, Vec::new()),
        };

        let result = MergedResult {
            task_id: task.id,
            content,
            contributors,
            gaps,
            revision: number,
            feedback,
        };
        info!(
            task_id = %task.id,
            revision = result.revision,
            contributors = result.contributors.len(),
            gaps = result.gaps.len(),
            "result synthesized"
        );
        Ok(result)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use maestro_core::{CapabilitySet, Decomposition, ErrorKind};

    fn finished(task: &Task) -> Vec<Subtask> {
        let mut a = Subtask::new(task.id, "a", "", CapabilitySet::new());
        a.succeed("alpha".into());
        let mut z = Subtask::new(task.id, "z", "", CapabilitySet::new());
        z.fail(ErrorKind::NoEligibleExecutor, "nobody has z");
        let mut c = Subtask::new(task.id, "c", "", CapabilitySet::new());
        c.succeed("gamma".into());
        vec![a, z, c]
    }

    #[tokio::test]
    async fn test_concatenation_keeps_order_and_marks_gaps() {
        let task = Task::new("t", "report");
        let result = ResultSynthesizer::default()
            .synthesize(&task, &finished(&task), None)
            .await
            .unwrap();
        assert_eq!(result.contributors, vec!["a".into(), "c".into()]);
        assert_eq!(result.gaps.len(), 1);
        assert_eq!(result.gaps[0].reason, "no_eligible_executor: nobody has z");
        let a = result.content.find("alpha").unwrap();
        let gap = result.content.find("[gap: Failed").unwrap();
        let c = result.content.find("gamma").unwrap();
        assert!(a < gap && gap < c);
        assert_eq!(result.revision, 0);
    }

    #[tokio::test]
    async fn test_deterministic() {
        let task = Task::new("t", "report");
        let subtasks = finished(&task);
        let synth = ResultSynthesizer::default();
        let one = synth.synthesize(&task, &subtasks, None).await.unwrap();
        let two = synth.synthesize(&task, &subtasks, None).await.unwrap();
        assert_eq!(one.content, two.content);
    }

    #[tokio::test]
    async fn test_revision_feedback_accumulates() {
        let task = Task::new("t", "report");
        let subtasks = finished(&task);
        let synth = ResultSynthesizer::default();
        let first = synth.synthesize(&task, &subtasks, None).await.unwrap();
        let second = synth
            .synthesize(
                &task,
                &subtasks,
                Some(&RevisionRequest {
                    revision: 1,
                    reason: "too short".into(),
                    prior: first,
                }),
            )
            .await
            .unwrap();
        let third = synth
            .synthesize(
                &task,
                &subtasks,
                Some(&RevisionRequest {
                    revision: 2,
                    reason: "cite sources".into(),
                    prior: second,
                }),
            )
            .await
            .unwrap();
        assert_eq!(third.revision, 2);
        assert_eq!(third.feedback, vec!["too short", "cite sources"]);
        assert!(third.content.contains("- revision 1: too short"));
        assert!(third.content.contains("- revision 2: cite sources"));
    }

    #[tokio::test]
    async fn test_refuses_non_terminal_subtasks() {
        let task = Task::new("t", "report");
        let pending = vec![Subtask::new(task.id, "a", "", CapabilitySet::new())];
        let err = ResultSynthesizer::default()
            .synthesize(&task, &pending, None)
            .await
            .unwrap_err();
        assert!(matches!(err, MaestroError::Synthesis(_)));
    }

    struct Summarizer;

    #[async_trait]
    impl ReasoningProvider for Summarizer {
        async fn decompose(&self, _description: &str) -> MaestroResult<Decomposition> {
            Ok(Decomposition::default())
        }

        async fn synthesize_content(&self, ordered: &[Subtask]) -> MaestroResult<String> {
            Ok(ordered
                .iter()
                .filter_map(|s| s.output.as_deref())
                .collect::<Vec<_>>()
                .join(" + "))
        }
    }

    #[tokio::test]
    async fn test_reasoning_merge_delegates() {
        let task = Task::new("t", "report");
        let synth = ResultSynthesizer::new(Arc::new(ReasoningMerge::new(Arc::new(Summarizer))));
        let result = synth.synthesize(&task, &finished(&task), None).await.unwrap();
        assert_eq!(result.content, "alpha + gamma");
        assert!(result.is_degraded());
    }
}
