#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use stat_agency::config::OracleConfig;
use stat_agency::knowledge::{KnowledgeDocument, KnowledgeStore, PreprocessDocument, PreprocessStore};
use stat_agency::oracle::prompts;
use stat_agency::oracle::LLMProvider;
use stat_agency::pipeline::{AnalysisTask, StageArtifact, StageRunner};
use stat_agency::{AnalysisResult, SynthesisClient};

type Script = Box<dyn Fn(&str, usize) -> String + Send + Sync>;

/// Answers each prompt through a script keyed on the task heading.
///
/// The script also receives how many prompts with that heading came before.
pub struct ScriptedProvider {
    script: Script,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new(script: impl Fn(&str, usize) -> String + Send + Sync + 'static) -> Self {
        Self { script: Box::new(script), prompts: Mutex::new(Vec::new()) }
    }

    pub fn calls_with(&self, heading: &str) -> usize {
        self.prompts.lock().unwrap().iter().filter(|p| p.starts_with(heading)).count()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

fn heading_of(prompt: &str) -> &str {
    prompt.lines().next().unwrap_or_default()
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn generate(&self, _model: &str, prompt: String, _system: Option<String>) -> Result<String> {
        let heading = heading_of(&prompt).to_string();
        let seen = {
            let mut prompts = self.prompts.lock().unwrap();
            let seen = prompts.iter().filter(|p| heading_of(p) == heading).count();
            prompts.push(prompt);
            seen
        };
        Ok((self.script)(&heading, seen))
    }
}

pub fn client(provider: Arc<ScriptedProvider>) -> Arc<SynthesisClient> {
    let config = OracleConfig { requests_per_minute: 0, oracle_retries: 0, ..OracleConfig::default() };
    Arc::new(SynthesisClient::new(provider, config))
}

/// Replies that keep a dataset moving through every stage
pub fn happy_reply(heading: &str) -> Option<String> {
    let reply = match heading {
        prompts::COLUMN_METADATA => json!({"dataset_desc": "test dataset"}),
        prompts::FEATURE_REMOVAL => json!({}),
        prompts::DESCRIPTIVE_REASONING => json!({"statistics_results": {"mean": {"preferred": true}}}),
        prompts::INFERENTIAL_CONCLUSIONS => json!({"Normality": "no evidence against normality"}),
        prompts::CRITIQUE => json!({"valid": true, "reason": "complete"}),
        _ => return None,
    };
    Some(reply.to_string())
}

pub fn numeric_knowledge() -> KnowledgeStore {
    let doc: KnowledgeDocument = serde_json::from_value(json!({
        "no_of_variable": 1,
        "var_type": "numerical continuous",
        "priority_tests": ["Shapiro-Wilk"],
        "descriptive": {"statistics": ["mean", "standard deviation"]},
        "visualization": {"options": ["Histogram", "Box plot"]},
        "inferential": {"tests": ["One-sample t-test"]}
    }))
    .unwrap();
    KnowledgeStore::from_documents(vec![doc]).unwrap()
}

pub fn numeric_preprocess() -> PreprocessStore {
    let doc: PreprocessDocument = serde_json::from_value(json!({
        "type": "numerical continuous",
        "prior_tests": ["Shapiro-Wilk"],
        "outlier_detection": ["IQR"],
        "missing_value_imputation": ["median"]
    }))
    .unwrap();
    PreprocessStore::from_documents(vec![doc]).unwrap()
}

/// Returns the same successful artifact on every call and counts them
pub struct CountingRunner {
    pub calls: AtomicUsize,
}

impl CountingRunner {
    pub fn new() -> Self {
        Self { calls: AtomicUsize::new(0) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StageRunner for CountingRunner {
    async fn run(&self, task: &AnalysisTask) -> AnalysisResult<StageArtifact> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(StageArtifact::ok(task, json!({ "attempt": task.attempt })))
    }
}

pub fn findings(artifact: &StageArtifact, key: &str) -> Value {
    artifact.findings.get(key).cloned().unwrap_or(Value::Null)
}
