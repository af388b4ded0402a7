//! Stage Executor
//!
//! Drives one task through synthesis, execution and normalization:
//! `Pending -> Synthesized -> Executed -> Normalized | Failed`.
//! Code that fails to run yields an error artifact carrying the diagnostic;
//! oracle failures propagate as `Err` once the client's retries are spent.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::artifact::StageArtifact;
use super::normalize::{results_to_object, to_datum, to_json};
use super::task::{AnalysisTask, StageKind};
use crate::error::{AnalysisError, AnalysisResult};
use crate::oracle::prompts::{self, CodeRequest};
use crate::oracle::SynthesisClient;
use crate::sandbox::{Capability, ExecutionOutcome, Interpreter, SINGLE_BINDING};
use crate::table::Column;

const MAX_VISUALIZATIONS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorState {
    Pending,
    Synthesized,
    Executed,
    Normalized,
    Failed,
}

impl fmt::Display for ExecutorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExecutorState::Pending => "pending",
            ExecutorState::Synthesized => "synthesized",
            ExecutorState::Executed => "executed",
            ExecutorState::Normalized => "normalized",
            ExecutorState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Produces one artifact per task
#[async_trait]
pub trait StageRunner: Send + Sync {
    async fn run(&self, task: &AnalysisTask) -> AnalysisResult<StageArtifact>;
}

#[derive(Deserialize)]
struct VisualizationPick {
    name: String,
    #[serde(alias = "python_code")]
    code: String,
    #[serde(default)]
    reason: String,
}

#[derive(Deserialize)]
struct VisualizationReply {
    visualizations: Vec<VisualizationPick>,
}

#[derive(Deserialize)]
struct TestPick {
    name: String,
    #[serde(default)]
    hypothesis: String,
    #[serde(alias = "python_code")]
    code: String,
    #[serde(default)]
    reason: String,
}

#[derive(Deserialize)]
struct InferentialReply {
    tests: Vec<TestPick>,
}

#[derive(Deserialize)]
struct MethodPick {
    #[serde(alias = "method")]
    selected_method: String,
    #[serde(default, alias = "reason")]
    reasoning: String,
    #[serde(alias = "python_code")]
    code: String,
}

fn parse_reply<T: for<'de> Deserialize<'de>>(stage: StageKind, value: Value) -> AnalysisResult<T> {
    serde_json::from_value(value)
        .map_err(|e| AnalysisError::malformed(format!("unexpected {} reply: {}", stage, e)))
}

/// The single executor used for every stage and for both columns and pairs
pub struct StageExecutor {
    client: Arc<SynthesisClient>,
    interpreter: Arc<dyn Interpreter>,
}

impl StageExecutor {
    pub fn new(client: Arc<SynthesisClient>, interpreter: Arc<dyn Interpreter>) -> Self {
        Self { client, interpreter }
    }

    fn transition(&self, task: &AnalysisTask, state: ExecutorState) {
        debug!(stage = %task.stage, subject = %task.subject, attempt = task.attempt, "executor {}", state);
    }

    fn failed(&self, task: &AnalysisTask, diagnostic: String) -> StageArtifact {
        self.transition(task, ExecutorState::Failed);
        warn!("{} for '{}' failed to execute: {}", task.stage, task.subject, diagnostic);
        StageArtifact::error(task, diagnostic)
    }

    async fn execute(&self, task: &AnalysisTask, code: &str, capability: Capability) -> AnalysisResult<ExecutionOutcome> {
        let outcome = self.interpreter.execute(code, &task.bindings, capability).await?;
        if outcome.is_success() {
            self.transition(task, ExecutorState::Executed);
        }
        Ok(outcome)
    }

    fn code_request(&self, task: &AnalysisTask, heading: &'static str, knowledge: Value, contract: &str) -> CodeRequest {
        CodeRequest::new(heading, knowledge, task.description.clone(), task.bindings.names())
            .with_contract(contract)
            .with_feedback(task.feedback.clone())
            .with_context(task.context.clone())
    }

    async fn descriptive(&self, task: &AnalysisTask) -> AnalysisResult<StageArtifact> {
        let request = self.code_request(task, prompts::DESCRIPTIVE_CODE, task.knowledge.clone(), prompts::DESCRIPTIVE_CONTRACT);
        let code = self.client.synthesize_code(&request).await?;
        self.transition(task, ExecutorState::Synthesized);

        let outcome = self.execute(task, &code, Capability::Compute).await?;
        if let Some(diagnostic) = outcome.diagnostics {
            return Ok(self.failed(task, diagnostic));
        }
        let findings = results_to_object(&outcome.results);
        self.transition(task, ExecutorState::Normalized);

        let reasoning = self
            .client
            .synthesize_structured(&prompts::descriptive_reasoning(&findings, &task.knowledge, &task.description))
            .await?;
        let justification = match reasoning.get("statistics_results") {
            Some(results) => results.clone(),
            None => reasoning,
        };
        Ok(StageArtifact::ok(task, findings).with_justification(justification))
    }

    async fn visualization(&self, task: &AnalysisTask) -> AnalysisResult<StageArtifact> {
        let file_names: Vec<String> = (1..=MAX_VISUALIZATIONS)
            .map(|k| format!("{}_{}_vis{}", task.subject.file_stem(), task.subject.arity().file_tag(), k))
            .collect();
        let upstream = task.context.clone().unwrap_or(Value::Null);
        let prompt = prompts::visualization_selection(
            &task.knowledge,
            &upstream,
            &task.description,
            &task.bindings.names(),
            &file_names,
            task.feedback.as_deref(),
        );
        let reply: VisualizationReply = parse_reply(task.stage, self.client.synthesize_structured(&prompt).await?)?;
        if reply.visualizations.is_empty() {
            return Err(AnalysisError::malformed("no visualization selected"));
        }
        self.transition(task, ExecutorState::Synthesized);

        let mut entries = Vec::new();
        let mut diagnostics = Vec::new();
        // Figures are located by their file names; no paths go into the artifact.
        for pick in reply.visualizations.into_iter().take(MAX_VISUALIZATIONS) {
            let outcome = self.execute(task, &pick.code, Capability::Plotting).await?;
            let mut entry = json!({ "name": pick.name, "reason": pick.reason });
            match outcome.diagnostics {
                Some(diagnostic) => {
                    warn!("Visualization '{}' for '{}' failed: {}", pick.name, task.subject, diagnostic);
                    entry["status"] = json!("error");
                    entry["diagnostic"] = json!(diagnostic);
                    diagnostics.push(format!("{}: {}", pick.name, diagnostic));
                }
                None => {
                    entry["status"] = json!("ok");
                }
            }
            entries.push(entry);
        }

        if diagnostics.len() == entries.len() {
            return Ok(self.failed(task, diagnostics.join("\n")));
        }
        self.transition(task, ExecutorState::Normalized);
        Ok(StageArtifact::ok(task, json!({ "visualizations": entries })))
    }

    async fn inferential(&self, task: &AnalysisTask) -> AnalysisResult<StageArtifact> {
        let upstream = task.context.clone().unwrap_or(Value::Null);
        let prompt = prompts::inferential_selection(
            &task.knowledge,
            &upstream,
            &task.description,
            &task.bindings.names(),
            task.feedback.as_deref(),
        );
        let reply: InferentialReply = parse_reply(task.stage, self.client.synthesize_structured(&prompt).await?)?;
        if reply.tests.is_empty() {
            return Err(AnalysisError::malformed("no inferential test selected"));
        }
        self.transition(task, ExecutorState::Synthesized);

        let mut tests = Map::new();
        let mut diagnostics = Vec::new();
        for pick in reply.tests {
            let outcome = self.execute(task, &pick.code, Capability::Compute).await?;
            let mut entry = json!({ "hypothesis": pick.hypothesis, "reason": pick.reason });
            match outcome.diagnostics {
                Some(diagnostic) => {
                    entry["status"] = json!("error");
                    entry["diagnostic"] = json!(diagnostic);
                    diagnostics.push(format!("{}: {}", pick.name, diagnostic));
                }
                None => {
                    entry["status"] = json!("ok");
                    entry["result"] = results_to_object(&outcome.results);
                }
            }
            // Code is dropped here; only hypothesis, reason and result are kept.
            tests.insert(pick.name, entry);
        }

        if diagnostics.len() == tests.len() {
            return Ok(self.failed(task, diagnostics.join("\n")));
        }
        self.transition(task, ExecutorState::Normalized);

        let conclusions = self
            .client
            .synthesize_structured(&prompts::inferential_conclusions(&Value::Object(tests.clone())))
            .await?;
        for (name, entry) in tests.iter_mut() {
            if let Some(conclusion) = conclusions.get(name) {
                entry["conclusion"] = match conclusion {
                    Value::String(_) => conclusion.clone(),
                    Value::Object(o) => o.get("conclusion").cloned().unwrap_or_else(|| conclusion.clone()),
                    other => json!(other.to_string()),
                };
            }
        }
        Ok(StageArtifact::ok(task, json!({ "tests": tests })).with_justification(conclusions))
    }

    async fn outlier_detection(&self, task: &AnalysisTask) -> AnalysisResult<StageArtifact> {
        let prior_knowledge = json!({ "prior_tests": task.knowledge.get("prior_tests").cloned().unwrap_or(Value::Null) });
        let request = self.code_request(task, prompts::PRIOR_TEST_CODE, prior_knowledge, prompts::PRIOR_TEST_CONTRACT);
        let prior_code = self.client.synthesize_code(&request).await?;
        let prior = self.execute(task, &prior_code, Capability::Compute).await?;
        if let Some(diagnostic) = prior.diagnostics {
            return Ok(self.failed(task, format!("prior tests failed: {}", diagnostic)));
        }
        let prior_results = results_to_object(&prior.results);

        let methods = task.knowledge.get("outlier_detection").cloned().unwrap_or(Value::Null);
        let prompt = prompts::outlier_selection(
            &methods,
            &task.signature.to_string(),
            &task.description,
            &prior_results,
            task.feedback.as_deref(),
        );
        let pick: MethodPick = parse_reply(task.stage, self.client.synthesize_structured(&prompt).await?)?;
        self.transition(task, ExecutorState::Synthesized);

        let outcome = self.execute(task, &pick.code, Capability::Compute).await?;
        if let Some(diagnostic) = &outcome.diagnostics {
            return Ok(self.failed(task, diagnostic.clone()));
        }
        let Some(indexes) = outcome.get("outlier_indexes").map(to_json) else {
            return Ok(self.failed(task, "code did not assign results.outlier_indexes".to_string()));
        };
        let count = indexes.as_array().map(Vec::len).unwrap_or(0);
        self.transition(task, ExecutorState::Normalized);

        Ok(StageArtifact::ok(
            task,
            json!({
                "prior_tests": prior_results,
                "selected_method": pick.selected_method,
                "outlier_indexes": indexes,
                "outlier_count": count,
            }),
        )
        .with_justification(json!({ "reasoning": pick.reasoning })))
    }

    async fn imputation(&self, task: &AnalysisTask) -> AnalysisResult<StageArtifact> {
        let Some(original) = task.bindings.get(SINGLE_BINDING) else {
            return Err(AnalysisError::Execution("imputation needs a single-column binding".to_string()));
        };
        let methods = task
            .knowledge
            .get("missing_value_imputation")
            .cloned()
            .unwrap_or(Value::Null);
        let outliers = task.context.clone().unwrap_or(Value::Null);
        let prompt = prompts::imputation_selection(
            &methods,
            &task.signature.to_string(),
            &task.description,
            &outliers,
            task.feedback.as_deref(),
        );
        let pick: MethodPick = parse_reply(task.stage, self.client.synthesize_structured(&prompt).await?)?;
        self.transition(task, ExecutorState::Synthesized);

        let outcome = self.execute(task, &pick.code, Capability::Compute).await?;
        if let Some(diagnostic) = &outcome.diagnostics {
            return Ok(self.failed(task, diagnostic.clone()));
        }
        let imputed: Vec<_> = match outcome.get("imputed") {
            Some(evalexpr::Value::Tuple(values)) => values.iter().map(to_datum).collect(),
            _ => return Ok(self.failed(task, "code did not assign a sequence to results.imputed".to_string())),
        };
        if imputed.len() != original.len() {
            return Ok(self.failed(
                task,
                format!("results.imputed has {} values, the column has {}", imputed.len(), original.len()),
            ));
        }
        let remaining = imputed.iter().filter(|d| d.is_missing()).count();
        if remaining > 0 {
            return Ok(self.failed(task, format!("results.imputed still has {} missing values", remaining)));
        }
        let filled = original.iter().filter(|d| d.is_missing()).count();
        self.transition(task, ExecutorState::Normalized);

        Ok(StageArtifact::ok(
            task,
            json!({ "selected_method": pick.selected_method, "imputed_count": filled }),
        )
        .with_justification(json!({ "reasoning": pick.reasoning }))
        .with_derived(Column::new(task.subject.key(), imputed)))
    }
}

#[async_trait]
impl StageRunner for StageExecutor {
    async fn run(&self, task: &AnalysisTask) -> AnalysisResult<StageArtifact> {
        self.transition(task, ExecutorState::Pending);
        info!("Running {} for '{}' (attempt {})", task.stage, task.subject, task.attempt);
        match task.stage {
            StageKind::Descriptive => self.descriptive(task).await,
            StageKind::Visualization => self.visualization(task).await,
            StageKind::Inferential => self.inferential(task).await,
            StageKind::OutlierDetection => self.outlier_detection(task).await,
            StageKind::Imputation => self.imputation(task).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OracleConfig;
    use crate::oracle::LLMProvider;
    use crate::pipeline::task::Subject;
    use crate::sandbox::{Bindings, ExprSandbox};
    use crate::types::{TypeSignature, VariableType};
    use std::time::Duration;

    /// Replies with the same visualization picks to every prompt
    struct Picks(Value);

    #[async_trait]
    impl LLMProvider for Picks {
        async fn generate(&self, _model: &str, _prompt: String, _system: Option<String>) -> anyhow::Result<String> {
            Ok(self.0.to_string())
        }
    }

    fn executor(picks: Value, dir: &std::path::Path) -> StageExecutor {
        let config = OracleConfig { requests_per_minute: 0, oracle_retries: 0, ..OracleConfig::default() };
        let client = Arc::new(SynthesisClient::new(Arc::new(Picks(picks)), config));
        StageExecutor::new(client, Arc::new(ExprSandbox::new(Duration::from_secs(5), dir)))
    }

    fn visualization_task() -> AnalysisTask {
        let column = Column::from_numbers("x", &[1.0, 2.0, 3.0, 4.0, 10.0]);
        AnalysisTask::new(
            StageKind::Visualization,
            Subject::Column("x".to_string()),
            TypeSignature::Single(VariableType::NumericalContinuous),
            Bindings::single(&column),
            json!({"options": ["Box plot"]}),
            json!({"column": "x"}),
        )
    }

    #[tokio::test]
    async fn test_failed_visualization_keeps_the_other() {
        let dir = tempfile::tempdir().unwrap();
        let picks = json!({"visualizations": [
            {"name": "Box plot", "code": "boxplot(data_column); save_plot(\"x_uni_vis1\")", "reason": "spread"},
            {"name": "Violin", "code": "nosuchfn(data_column)", "reason": "shape"}
        ]});
        let artifact = executor(picks, dir.path()).run(&visualization_task()).await.unwrap();

        assert!(artifact.is_ok());
        let entries = artifact.findings["visualizations"].as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["status"], "ok");
        assert_eq!(entries[1]["status"], "error");
        assert!(entries[1]["diagnostic"].as_str().unwrap().contains("nosuchfn"));
        assert!(entries[0].get("file").is_none());
        assert!(dir.path().join("x_uni_vis1.json").exists());
    }

    #[tokio::test]
    async fn test_all_visualizations_failing_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let picks = json!({"visualizations": [
            {"name": "Violin", "code": "nosuchfn(data_column)", "reason": "shape"}
        ]});
        let artifact = executor(picks, dir.path()).run(&visualization_task()).await.unwrap();

        assert!(!artifact.is_ok());
        assert!(artifact.diagnostic.unwrap().contains("Violin"));
    }
}
