//! Critique Loop
//!
//! Validates artifacts against their knowledge and re-runs the stage with
//! the critique's feedback until accepted or the budget is spent. Error
//! artifacts are rejected locally with their diagnostic as feedback.

use std::sync::Arc;
use tracing::{info, warn};

use super::artifact::{StageArtifact, ValidationRecord, ValidationState};
use super::executor::StageRunner;
use super::task::AnalysisTask;
use crate::error::AnalysisError;
use crate::oracle::{prompts, SynthesisClient, Verdict};

#[derive(Debug)]
pub enum CritiqueOutcome {
    Validated(StageArtifact),
    /// Budget spent; carries the last artifact unchanged
    Exhausted(StageArtifact),
    /// The oracle failed; carries the most recent artifact, if any
    Interrupted {
        artifact: Option<StageArtifact>,
        error: AnalysisError,
    },
}

#[derive(Debug)]
pub struct CritiqueReport {
    pub outcome: CritiqueOutcome,
    /// Stage executor invocations made in this session
    pub invocations: usize,
}

impl CritiqueReport {
    /// The artifact to keep, stamped with its validation record.
    ///
    /// `Err` only for a session interrupted before any artifact existed.
    pub fn into_artifact(self) -> Result<StageArtifact, AnalysisError> {
        let attempts = self.invocations;
        let (artifact, state, reason) = match self.outcome {
            CritiqueOutcome::Validated(a) => (a, ValidationState::Validated, None),
            CritiqueOutcome::Exhausted(a) => (a, ValidationState::Exhausted, None),
            CritiqueOutcome::Interrupted { artifact: Some(a), error } => {
                (a, ValidationState::Interrupted, Some(error.to_string()))
            }
            CritiqueOutcome::Interrupted { artifact: None, error } => return Err(error),
        };
        let mut artifact = artifact;
        artifact.validation = Some(ValidationRecord { state, attempts, reason });
        Ok(artifact)
    }

    pub fn is_validated(&self) -> bool {
        matches!(self.outcome, CritiqueOutcome::Validated(_))
    }
}

pub struct CritiqueLoop {
    runner: Arc<dyn StageRunner>,
    client: Arc<SynthesisClient>,
    budget: usize,
}

impl CritiqueLoop {
    pub fn new(runner: Arc<dyn StageRunner>, client: Arc<SynthesisClient>, budget: usize) -> Self {
        Self { runner, client, budget: budget.max(1) }
    }

    async fn judge(&self, task: &AnalysisTask, artifact: &StageArtifact) -> Result<Verdict, AnalysisError> {
        if let Some(diagnostic) = artifact.diagnostic.as_ref().filter(|_| !artifact.is_ok()) {
            return Ok(Verdict::Rejected(format!("The code failed to execute: {}", diagnostic)));
        }
        let prompt = prompts::critique(
            task.stage.as_str(),
            &task.knowledge,
            &artifact.to_json(),
            &task.description,
        );
        self.client.synthesize_verdict(&prompt).await
    }

    pub async fn run(&self, task: AnalysisTask) -> CritiqueReport {
        let mut task = task;
        let mut invocations = 0;
        let mut previous: Option<StageArtifact> = None;

        loop {
            invocations += 1;
            let artifact = match self.runner.run(&task).await {
                Ok(artifact) => artifact,
                Err(error) => {
                    warn!("{} for '{}' interrupted: {}", task.stage, task.subject, error);
                    return CritiqueReport {
                        outcome: CritiqueOutcome::Interrupted { artifact: previous, error },
                        invocations,
                    };
                }
            };

            let verdict = match self.judge(&task, &artifact).await {
                Ok(verdict) => verdict,
                Err(error) => {
                    warn!("Critique of {} for '{}' interrupted: {}", task.stage, task.subject, error);
                    return CritiqueReport {
                        outcome: CritiqueOutcome::Interrupted { artifact: Some(artifact), error },
                        invocations,
                    };
                }
            };

            match verdict {
                Verdict::Accepted => {
                    info!("{} for '{}' validated after {} attempt(s)", task.stage, task.subject, invocations);
                    return CritiqueReport { outcome: CritiqueOutcome::Validated(artifact), invocations };
                }
                Verdict::Rejected(reason) if invocations >= self.budget => {
                    warn!(
                        "{} for '{}' not validated within {} attempt(s), keeping last result: {}",
                        task.stage, task.subject, self.budget, reason
                    );
                    return CritiqueReport { outcome: CritiqueOutcome::Exhausted(artifact), invocations };
                }
                Verdict::Rejected(reason) => {
                    info!("{} for '{}' rejected: {}", task.stage, task.subject, reason);
                    task = task.with_feedback(reason);
                    previous = Some(artifact);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OracleConfig;
    use crate::error::AnalysisResult;
    use crate::oracle::LLMProvider;
    use crate::pipeline::task::{StageKind, Subject};
    use crate::sandbox::Bindings;
    use crate::table::Column;
    use crate::types::{TypeSignature, VariableType};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Fails on the first `failures` calls, then succeeds
    struct Flaky {
        failures: usize,
        calls: AtomicUsize,
        feedback: Mutex<Vec<Option<String>>>,
    }

    impl Flaky {
        fn new(failures: usize) -> Self {
            Self { failures, calls: AtomicUsize::new(0), feedback: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl StageRunner for Flaky {
        async fn run(&self, task: &AnalysisTask) -> AnalysisResult<StageArtifact> {
            self.feedback.lock().unwrap().push(task.feedback.clone());
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Ok(StageArtifact::error(task, "unknown variable"))
            } else {
                Ok(StageArtifact::ok(task, json!({ "mean": 2.0, "attempt": task.attempt })))
            }
        }
    }

    struct Verdicts(Mutex<Vec<&'static str>>);

    #[async_trait]
    impl LLMProvider for Verdicts {
        async fn generate(&self, _model: &str, _prompt: String, _system: Option<String>) -> anyhow::Result<String> {
            let mut replies = self.0.lock().unwrap();
            if replies.is_empty() {
                return Ok("{\"valid\": true, \"reason\": \"ok\"}".to_string());
            }
            Ok(replies.remove(0).to_string())
        }
    }

    fn client(replies: Vec<&'static str>) -> Arc<SynthesisClient> {
        let config = OracleConfig { requests_per_minute: 0, oracle_retries: 0, ..OracleConfig::default() };
        Arc::new(SynthesisClient::new(Arc::new(Verdicts(Mutex::new(replies))), config))
    }

    fn task() -> AnalysisTask {
        let column = Column::from_numbers("x", &[1.0, 2.0, 3.0]);
        AnalysisTask::new(
            StageKind::Descriptive,
            Subject::Column("x".to_string()),
            TypeSignature::Single(VariableType::NumericalContinuous),
            Bindings::single(&column),
            json!({}),
            json!({}),
        )
    }

    #[tokio::test]
    async fn test_error_then_success_takes_two_calls() {
        let runner = Arc::new(Flaky::new(1));
        let report = CritiqueLoop::new(runner.clone(), client(vec![]), 3).run(task()).await;

        assert!(report.is_validated());
        assert_eq!(report.invocations, 2);
        assert_eq!(runner.calls.load(Ordering::SeqCst), 2);
        let artifact = report.into_artifact().unwrap();
        assert_eq!(artifact.findings["attempt"], 2);
        assert_eq!(artifact.validation.unwrap().attempts, 2);
    }

    #[tokio::test]
    async fn test_budget_is_never_exceeded() {
        let runner = Arc::new(Flaky::new(usize::MAX));
        let report = CritiqueLoop::new(runner.clone(), client(vec![]), 3).run(task()).await;

        assert!(matches!(report.outcome, CritiqueOutcome::Exhausted(_)));
        assert_eq!(report.invocations, 3);
        assert_eq!(runner.calls.load(Ordering::SeqCst), 3);
        let artifact = report.into_artifact().unwrap();
        assert!(!artifact.is_ok());
        assert_eq!(artifact.validation_state(), Some(ValidationState::Exhausted));
    }

    #[tokio::test]
    async fn test_rejection_feedback_accumulates_across_attempts() {
        let runner = Arc::new(Flaky::new(0));
        let verdicts = vec![
            "{\"valid\": false, \"reason\": \"median missing\"}",
            "{\"valid\": false, \"reason\": \"sd missing\"}",
            "{\"valid\": true, \"reason\": \"complete\"}",
        ];
        let report = CritiqueLoop::new(runner.clone(), client(verdicts), 3).run(task()).await;
        assert!(report.is_validated());
        assert_eq!(report.invocations, 3);

        let seen = runner.feedback.lock().unwrap().clone();
        assert_eq!(seen[0], None);
        assert_eq!(seen[1].as_deref(), Some("median missing"));
        // The third attempt still sees the first defect.
        assert_eq!(seen[2].as_deref(), Some("median missing\nsd missing"));
    }

    #[tokio::test]
    async fn test_malformed_verdict_interrupts() {
        let runner = Arc::new(Flaky::new(0));
        let report = CritiqueLoop::new(runner, client(vec!["{\"valid\": \"maybe\"}"]), 3)
            .run(task())
            .await;
        assert!(matches!(report.outcome, CritiqueOutcome::Interrupted { artifact: Some(_), .. }));
        let artifact = report.into_artifact().unwrap();
        assert_eq!(artifact.validation_state(), Some(ValidationState::Interrupted));
    }

    /// Always fails before producing anything
    struct Offline;

    #[async_trait]
    impl StageRunner for Offline {
        async fn run(&self, _task: &AnalysisTask) -> AnalysisResult<StageArtifact> {
            Err(AnalysisError::malformed("no code block in reply"))
        }
    }

    #[tokio::test]
    async fn test_interruption_without_artifact_keeps_error() {
        let report = CritiqueLoop::new(Arc::new(Offline), client(vec![]), 3).run(task()).await;
        assert_eq!(report.invocations, 1);
        let error = report.into_artifact().unwrap_err();
        assert!(error.to_string().contains("no code block in reply"));
    }
}
