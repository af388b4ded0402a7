//! Result document and its write-once persistence.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::info;
use uuid::Uuid;

use super::artifact::StageArtifact;
use super::preprocess::DistributionComparison;
use super::selector::SelectedPair;
use crate::error::{AnalysisError, AnalysisResult};
use crate::types::VariableType;

/// A subject excluded from a stage, and why
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkipRecord {
    pub subject: String,
    pub stage: String,
    pub reason: String,
}

impl SkipRecord {
    pub fn new(subject: &str, stage: &str, reason: impl Into<String>) -> Self {
        Self { subject: subject.to_string(), stage: stage.to_string(), reason: reason.into() }
    }
}

#[derive(Debug, Default, Serialize)]
pub struct PreprocessingSection {
    pub outliers: BTreeMap<String, StageArtifact>,
    pub imputation: BTreeMap<String, StageArtifact>,
    pub distribution: BTreeMap<String, DistributionComparison>,
}

/// Descriptive, visual and inferential artifacts keyed by subject
#[derive(Debug, Default, Serialize)]
pub struct AnalysisSection {
    pub descriptive: BTreeMap<String, StageArtifact>,
    pub visual: BTreeMap<String, StageArtifact>,
    pub inferential: BTreeMap<String, StageArtifact>,
}

impl AnalysisSection {
    pub fn is_empty(&self) -> bool {
        self.descriptive.is_empty() && self.visual.is_empty() && self.inferential.is_empty()
    }

    pub fn artifact_count(&self) -> usize {
        self.descriptive.len() + self.visual.len() + self.inferential.len()
    }
}

#[derive(Debug, Serialize)]
pub struct ResultDocument {
    pub run_id: Uuid,
    pub dataset: String,
    pub created_at: DateTime<Utc>,
    pub metadata: BTreeMap<String, String>,
    pub column_types: BTreeMap<String, VariableType>,
    pub preprocessing: PreprocessingSection,
    pub univariate: AnalysisSection,
    pub bivariate: AnalysisSection,
    pub selected_pairs: Vec<SelectedPair>,
    pub skipped: Vec<SkipRecord>,
}

impl ResultDocument {
    pub fn new(dataset: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            dataset: dataset.into(),
            created_at: Utc::now(),
            metadata: BTreeMap::new(),
            column_types: BTreeMap::new(),
            preprocessing: PreprocessingSection::default(),
            univariate: AnalysisSection::default(),
            bivariate: AnalysisSection::default(),
            selected_pairs: Vec::new(),
            skipped: Vec::new(),
        }
    }

    pub fn to_json(&self) -> AnalysisResult<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Keeps `[A-Za-z0-9_-]`, replaces everything else with `_`.
pub fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "dataset".to_string()
    } else {
        cleaned
    }
}

/// Writes result documents into the output directory, never overwriting.
pub struct ResultStore {
    output_dir: PathBuf,
}

impl ResultStore {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self { output_dir: output_dir.into() }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn path_for(&self, dataset: &str) -> PathBuf {
        self.output_dir.join(format!("{}_result.json", sanitize_name(dataset)))
    }

    /// Fails with `Persist` when the dataset already has a result document.
    pub async fn ensure_vacant(&self, dataset: &str) -> AnalysisResult<()> {
        let path = self.path_for(dataset);
        match tokio::fs::try_exists(&path).await {
            Ok(false) => Ok(()),
            Ok(true) => Err(AnalysisError::Persist(format!("{} already exists", path.display()))),
            Err(e) => Err(AnalysisError::Persist(format!("{}: {}", path.display(), e))),
        }
    }

    pub async fn persist(&self, document: &ResultDocument) -> AnalysisResult<PathBuf> {
        let path = self.path_for(&document.dataset);
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| AnalysisError::Persist(format!("{}: {}", self.output_dir.display(), e)))?;
        let body = serde_json::to_vec_pretty(document)?;

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| AnalysisError::Persist(format!("{}: {}", path.display(), e)))?;
        file.write_all(&body)
            .await
            .map_err(|e| AnalysisError::Persist(format!("{}: {}", path.display(), e)))?;
        file.flush()
            .await
            .map_err(|e| AnalysisError::Persist(format!("{}: {}", path.display(), e)))?;

        info!("Result document written to {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("sales 2024.csv"), "sales_2024_csv");
        assert_eq!(sanitize_name("ok-name_1"), "ok-name_1");
        assert_eq!(sanitize_name(""), "dataset");
    }

    #[test]
    fn test_document_shape() {
        let mut doc = ResultDocument::new("iris");
        doc.column_types.insert("petal".to_string(), VariableType::NumericalContinuous);
        doc.skipped.push(SkipRecord::new("species", "descriptive", "no knowledge"));
        let value = doc.to_json().unwrap();

        for key in ["run_id", "dataset", "created_at", "metadata", "column_types", "preprocessing", "univariate", "bivariate", "selected_pairs", "skipped"] {
            assert!(value.get(key).is_some(), "missing {}", key);
        }
        assert_eq!(value["column_types"]["petal"], "numerical continuous");
        assert!(value["univariate"]["visual"].is_object());
        assert!(value["preprocessing"]["distribution"].is_object());
    }

    #[tokio::test]
    async fn test_persist_is_write_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path());
        let doc = ResultDocument::new("sales");

        assert!(store.ensure_vacant("sales").await.is_ok());
        let path = store.persist(&doc).await.unwrap();
        assert_eq!(path, dir.path().join("sales_result.json"));
        assert!(matches!(store.ensure_vacant("sales").await, Err(AnalysisError::Persist(_))));
        let written: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["dataset"], "sales");

        let second = store.persist(&ResultDocument::new("sales")).await;
        assert!(matches!(second, Err(AnalysisError::Persist(_))));
    }
}
