//! Dataset Analysis Pipeline
//!
//! Sequences one dataset through classification, preprocessing, univariate
//! chains, pair selection and bivariate chains, and aggregates every
//! artifact into a write-once `ResultDocument`.
//!
//! Failures local to a column, pair or stage are logged and recorded in
//! `skipped`; only table loading and persistence escape [`DatasetPipeline::run`].

pub mod artifact;
pub mod critique;
pub mod executor;
pub mod normalize;
pub mod preprocess;
pub mod result;
pub mod selector;
pub mod task;

pub use artifact::{ArtifactStatus, StageArtifact, ValidationRecord, ValidationState};
pub use critique::{CritiqueLoop, CritiqueOutcome, CritiqueReport};
pub use executor::{ExecutorState, StageExecutor, StageRunner};
pub use preprocess::{DistributionComparison, DistributionVerdict};
pub use result::{ResultDocument, ResultStore, SkipRecord};
pub use selector::{PairCandidate, PairSelector, SelectedPair};
pub use task::{AnalysisTask, StageKind, Subject};

use futures::stream::{self, StreamExt};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::classify::TypeClassifier;
use crate::config::{AnalysisConfig, AnalysisSettings};
use crate::error::AnalysisResult;
use crate::knowledge::{KnowledgeDocument, KnowledgeStore, PreprocessStore};
use crate::oracle::SynthesisClient;
use crate::sandbox::{Bindings, ExprSandbox, Interpreter};
use crate::table::{Column, Table};
use crate::types::{TypeSignature, VariableType};

/// Artifacts of one descriptive → visualization → inferential chain
#[derive(Debug, Default)]
struct SubjectAnalysis {
    descriptive: Option<StageArtifact>,
    visual: Option<StageArtifact>,
    inferential: Option<StageArtifact>,
    skipped: Vec<SkipRecord>,
}

impl SubjectAnalysis {
    fn merge_into(self, key: String, section: &mut result::AnalysisSection, skipped: &mut Vec<SkipRecord>) {
        if let Some(a) = self.descriptive {
            section.descriptive.insert(key.clone(), a);
        }
        if let Some(a) = self.visual {
            section.visual.insert(key.clone(), a);
        }
        if let Some(a) = self.inferential {
            section.inferential.insert(key, a);
        }
        skipped.extend(self.skipped);
    }
}

pub struct DatasetPipeline {
    knowledge: Arc<KnowledgeStore>,
    preprocess: Arc<PreprocessStore>,
    client: Arc<SynthesisClient>,
    critique: CritiqueLoop,
    selector: PairSelector,
    classifier: TypeClassifier,
    settings: AnalysisSettings,
    store: ResultStore,
}

impl DatasetPipeline {
    pub fn new(
        knowledge: Arc<KnowledgeStore>,
        preprocess: Arc<PreprocessStore>,
        client: Arc<SynthesisClient>,
        runner: Arc<dyn StageRunner>,
        settings: AnalysisSettings,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            critique: CritiqueLoop::new(runner, client.clone(), settings.critique_budget),
            selector: PairSelector::new(client.clone(), settings.max_pairs),
            classifier: TypeClassifier::new(client.clone()),
            store: ResultStore::new(output_dir),
            knowledge,
            preprocess,
            client,
            settings,
        }
    }

    /// Uses the stock [`StageExecutor`] over `interpreter`.
    pub fn with_interpreter(
        knowledge: Arc<KnowledgeStore>,
        preprocess: Arc<PreprocessStore>,
        client: Arc<SynthesisClient>,
        interpreter: Arc<dyn Interpreter>,
        settings: AnalysisSettings,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        let executor = Arc::new(StageExecutor::new(client.clone(), interpreter));
        Self::new(knowledge, preprocess, client, executor, settings, output_dir)
    }

    /// Loads both knowledge files and wires the oracle and sandbox from `config`.
    pub async fn from_config(config: &AnalysisConfig) -> AnalysisResult<Self> {
        let knowledge = KnowledgeStore::load_file(&config.paths.statistical_kb).await?;
        let preprocess = PreprocessStore::load_file(&config.paths.preprocess_kb).await?;
        let client = SynthesisClient::from_config(config.oracle.clone())?;
        let sandbox = ExprSandbox::new(
            Duration::from_secs(config.analysis.execution_timeout_secs),
            config.paths.output_dir.clone(),
        );
        Ok(Self::with_interpreter(
            Arc::new(knowledge),
            Arc::new(preprocess),
            Arc::new(client),
            Arc::new(sandbox),
            config.analysis.clone(),
            config.paths.output_dir.clone(),
        ))
    }

    pub fn settings(&self) -> &AnalysisSettings {
        &self.settings
    }

    /// Loads the CSV at `path`, analyzes it and persists the result document.
    #[tracing::instrument(skip(self, context), fields(dataset = %path.display()))]
    pub async fn run(&self, path: &Path, context: &str) -> AnalysisResult<PathBuf> {
        let dataset = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("dataset")
            .to_string();
        self.store.ensure_vacant(&dataset).await?;
        let table = Table::from_csv_path(path)?;
        info!("Loaded {} rows x {} columns from {}", table.row_count(), table.columns().len(), path.display());

        let (document, cleaned) = self.analyze_table(&dataset, table, context).await;
        self.write_cleaned(&dataset, &cleaned).await;
        self.store.persist(&document).await
    }

    /// Runs every stage on an in-memory table; never fails as a whole.
    #[tracing::instrument(skip(self, table, context))]
    pub async fn analyze(&self, dataset: &str, table: Table, context: &str) -> ResultDocument {
        self.analyze_table(dataset, table, context).await.0
    }

    async fn write_cleaned(&self, dataset: &str, cleaned: &Table) {
        let path = self
            .store
            .output_dir()
            .join(format!("{}_pre.csv", result::sanitize_name(dataset)));
        if let Err(e) = tokio::fs::create_dir_all(self.store.output_dir()).await {
            warn!("Cannot create {}: {}", self.store.output_dir().display(), e);
            return;
        }
        match cleaned.write_csv(&path) {
            Ok(()) => info!("Cleaned table written to {}", path.display()),
            Err(e) => warn!("Failed to write cleaned table {}: {}", path.display(), e),
        }
    }

    async fn analyze_table(&self, dataset: &str, table: Table, context: &str) -> (ResultDocument, Table) {
        let mut document = ResultDocument::new(dataset);

        let types = self.classifier.classify(&table).await;
        let metadata = preprocess::generate_metadata(&self.client, &types, context).await;
        let retained = preprocess::remove_features(&self.client, &types, &metadata, context).await;
        let (column_types, skipped) =
            preprocess::filter_missing(&table, retained, self.settings.missing_threshold);
        document.skipped.extend(skipped);
        document.metadata = metadata;
        document.column_types = column_types;

        let names: Vec<String> = table
            .column_names()
            .into_iter()
            .filter(|n| document.column_types.contains_key(n))
            .collect();
        let raw = table.select(&names);
        info!("Analyzing {} of {} column(s)", names.len(), table.columns().len());

        let cleaned = self.preprocess_columns(&raw, &mut document).await;
        self.univariate(&cleaned, &mut document).await;
        self.bivariate(&cleaned, context, &mut document).await;

        info!(
            univariate = document.univariate.artifact_count(),
            bivariate = document.bivariate.artifact_count(),
            skipped = document.skipped.len(),
            "Analysis of '{}' complete",
            dataset
        );
        (document, cleaned)
    }

    fn column_description(&self, column: &Column, vtype: VariableType, metadata: &BTreeMap<String, String>) -> Value {
        json!({
            "column": column.name,
            "type": vtype,
            "description": metadata.get(&column.name),
            "dataset_description": metadata.get(preprocess::DATASET_DESCRIPTION),
            "summary": column.describe(),
        })
    }

    async fn preprocess_columns(&self, raw: &Table, document: &mut ResultDocument) -> Table {
        let jobs: Vec<(&Column, VariableType, Value)> = raw
            .columns()
            .iter()
            .filter_map(|c| {
                let vtype = *document.column_types.get(&c.name)?;
                Some((c, vtype, self.column_description(c, vtype, &document.metadata)))
            })
            .collect();

        let cleanings: Vec<(&Column, VariableType, preprocess::ColumnCleaning)> = stream::iter(jobs)
            .map(|(column, vtype, description)| async move {
                let cleaning =
                    preprocess::clean_column(&self.critique, &self.preprocess, column, vtype, description).await;
                (column, vtype, cleaning)
            })
            .buffered(self.settings.concurrency.max(1))
            .collect()
            .await;

        let mut cleaned = raw.clone();
        for (column, vtype, cleaning) in cleanings {
            let section = &mut document.preprocessing;
            if let Some(a) = cleaning.outliers {
                section.outliers.insert(column.name.clone(), a);
            }
            if let Some(a) = cleaning.imputation {
                section.imputation.insert(column.name.clone(), a);
            }
            document.skipped.extend(cleaning.skipped);

            section.distribution.insert(
                column.name.clone(),
                preprocess::compare_distribution(
                    column,
                    &cleaning.column,
                    vtype,
                    self.settings.alpha,
                    self.settings.min_comparison_samples,
                ),
            );
            if &cleaning.column != column {
                if let Err(e) = cleaned.replace_column(cleaning.column) {
                    warn!("Keeping raw values for '{}': {}", column.name, e);
                }
            }
        }
        cleaned
    }

    /// Descriptive first; its accepted findings feed visualization and inference.
    async fn analyze_subject(
        &self,
        subject: Subject,
        signature: TypeSignature,
        bindings: Bindings,
        description: Value,
    ) -> SubjectAnalysis {
        let mut analysis = SubjectAnalysis::default();
        let Some(document) = self.knowledge.lookup(subject.arity(), &signature) else {
            warn!("No {} knowledge for '{}' ({}), skipping its analysis", subject.arity(), subject, signature);
            for stage in [StageKind::Descriptive, StageKind::Visualization, StageKind::Inferential] {
                analysis.skipped.push(SkipRecord::new(
                    &subject.key(),
                    stage.as_str(),
                    format!("no {} knowledge for '{}'", subject.arity(), signature),
                ));
            }
            return analysis;
        };

        let task = |stage: StageKind, knowledge: Value| {
            AnalysisTask::new(stage, subject.clone(), signature, bindings.clone(), knowledge, description.clone())
        };

        analysis.descriptive = self.stage(task(StageKind::Descriptive, document.descriptive_subsection()), &mut analysis.skipped).await;
        let upstream = analysis
            .descriptive
            .as_ref()
            .filter(|a| a.is_ok())
            .map(|a| a.findings.clone());

        analysis.visual = self
            .stage(
                task(StageKind::Visualization, visualization_knowledge(&document)).with_context(upstream.clone()),
                &mut analysis.skipped,
            )
            .await;
        analysis.inferential = self
            .stage(
                task(StageKind::Inferential, document.inferential_subsection()).with_context(upstream),
                &mut analysis.skipped,
            )
            .await;
        analysis
    }

    async fn stage(&self, task: AnalysisTask, skipped: &mut Vec<SkipRecord>) -> Option<StageArtifact> {
        let (subject, stage) = (task.subject.key(), task.stage);
        match self.critique.run(task).await.into_artifact() {
            Ok(artifact) => Some(artifact),
            Err(e) => {
                skipped.push(SkipRecord::new(&subject, stage.as_str(), e.to_string()));
                None
            }
        }
    }

    async fn univariate(&self, cleaned: &Table, document: &mut ResultDocument) {
        let jobs: Vec<(Subject, TypeSignature, Bindings, Value)> = cleaned
            .columns()
            .iter()
            .filter_map(|c| {
                let vtype = *document.column_types.get(&c.name)?;
                Some((
                    Subject::Column(c.name.clone()),
                    TypeSignature::Single(vtype),
                    Bindings::single(c),
                    self.column_description(c, vtype, &document.metadata),
                ))
            })
            .collect();

        let analyses: Vec<(String, SubjectAnalysis)> = stream::iter(jobs)
            .map(|(subject, signature, bindings, description)| async move {
                let key = subject.key();
                (key, self.analyze_subject(subject, signature, bindings, description).await)
            })
            .buffered(self.settings.concurrency.max(1))
            .collect()
            .await;

        for (key, analysis) in analyses {
            analysis.merge_into(key, &mut document.univariate, &mut document.skipped);
        }
    }

    async fn bivariate(&self, cleaned: &Table, context: &str, document: &mut ResultDocument) {
        let candidates = selector::prefilter(cleaned, &document.column_types);
        info!("{} candidate pair(s) after pre-filter", candidates.len());
        document.selected_pairs = self.selector.select(&candidates, &document.column_types, context).await;

        let mut jobs = Vec::new();
        for selected in &document.selected_pairs {
            let (a, b) = &selected.pair;
            let (Some(first), Some(second)) = (cleaned.column(a), cleaned.column(b)) else {
                warn!("Selected pair ('{}', '{}') is not in the cleaned table", a, b);
                continue;
            };
            let (Some(ta), Some(tb)) = (document.column_types.get(a), document.column_types.get(b)) else {
                continue;
            };
            let description = json!({
                "pair": [a, b],
                "reason": selected.reason,
                "columns": [
                    self.column_description(first, *ta, &document.metadata),
                    self.column_description(second, *tb, &document.metadata),
                ],
            });
            jobs.push((
                Subject::Pair(a.clone(), b.clone()),
                TypeSignature::Pair(*ta, *tb),
                Bindings::pair(first, second),
                description,
            ));
        }

        let analyses: Vec<(String, SubjectAnalysis)> = stream::iter(jobs)
            .map(|(subject, signature, bindings, description)| async move {
                let key = subject.key();
                (key, self.analyze_subject(subject, signature, bindings, description).await)
            })
            .buffered(self.settings.concurrency.max(1))
            .collect()
            .await;

        for (key, analysis) in analyses {
            analysis.merge_into(key, &mut document.bivariate, &mut document.skipped);
        }
    }
}

/// The visualization prompt also sees the descriptive statistics on offer.
fn visualization_knowledge(document: &KnowledgeDocument) -> Value {
    let mut knowledge = document.visualization_subsection();
    knowledge["descriptive_statistics"] = json!(document.descriptive.statistics);
    knowledge
}
