//! Knowledge Store
//!
//! Exact-match lookup of statistical procedures by (arity, type signature),
//! plus the preprocessing store keyed by variable type. Both are loaded in
//! bulk once per process and are read-only afterwards.

pub mod document;
pub mod preprocess;

pub use document::{KnowledgeDocument, Procedure};
pub use preprocess::PreprocessDocument;

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info};

use crate::error::{AnalysisError, AnalysisResult};
use crate::types::{Arity, TypeSignature, VariableType};

/// Reads a JSON or YAML knowledge file into its entries. The entries may be
/// a bare array or an array under `wrapper_key`.
async fn read_entries<T: DeserializeOwned>(path: &Path, wrapper_key: &str) -> AnalysisResult<Vec<T>> {
    let content = fs::read_to_string(path).await?;
    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    let raw: Value = if is_yaml {
        serde_yaml::from_str(&content)?
    } else {
        serde_json::from_str(&content)?
    };
    parse_entries(raw, wrapper_key)
}

fn parse_entries<T: DeserializeOwned>(raw: Value, wrapper_key: &str) -> AnalysisResult<Vec<T>> {
    let entries = match raw {
        Value::Array(entries) => entries,
        Value::Object(mut map) => match map.remove(wrapper_key) {
            Some(Value::Array(entries)) => entries,
            _ => {
                return Err(AnalysisError::InvalidKnowledge(format!(
                    "expected an array or an object with a '{}' array",
                    wrapper_key
                )))
            }
        },
        _ => return Err(AnalysisError::InvalidKnowledge("expected an array of entries".to_string())),
    };

    entries
        .into_iter()
        .enumerate()
        .map(|(idx, entry)| {
            serde_json::from_value(entry)
                .map_err(|e| AnalysisError::InvalidKnowledge(format!("entry {}: {}", idx, e)))
        })
        .collect()
}

/// Statistical knowledge keyed by (arity, type signature)
#[derive(Debug, Default)]
pub struct KnowledgeStore {
    documents: HashMap<(Arity, TypeSignature), Arc<KnowledgeDocument>>,
}

impl KnowledgeStore {
    pub fn from_documents(documents: Vec<KnowledgeDocument>) -> AnalysisResult<Self> {
        let mut store = Self::default();
        for doc in documents {
            if doc.var_type.arity() != doc.no_of_variable {
                return Err(AnalysisError::InvalidKnowledge(format!(
                    "'{}' is not a {} signature",
                    doc.var_type, doc.no_of_variable
                )));
            }
            let key = doc.key();
            if store.documents.contains_key(&key) {
                return Err(AnalysisError::DuplicateKnowledge(format!("{}: {}", key.0, key.1)));
            }
            store.documents.insert(key, Arc::new(doc));
        }
        Ok(store)
    }

    pub async fn load_file(path: impl AsRef<Path>) -> AnalysisResult<Self> {
        let path = path.as_ref();
        let documents = read_entries(path, "statistical_tests").await?;
        let store = Self::from_documents(documents)?;
        info!("Loaded {} statistical knowledge entries from {}", store.len(), path.display());
        Ok(store)
    }

    pub fn lookup(&self, arity: Arity, signature: &TypeSignature) -> Option<Arc<KnowledgeDocument>> {
        let found = self.documents.get(&(arity, *signature)).cloned();
        if found.is_none() {
            debug!("Knowledge miss for {} '{}'", arity, signature);
        }
        found
    }

    /// Like `lookup`, with a miss reported as `KnowledgeNotFound`.
    pub fn fetch(&self, signature: &TypeSignature) -> AnalysisResult<Arc<KnowledgeDocument>> {
        self.lookup(signature.arity(), signature)
            .ok_or_else(|| AnalysisError::knowledge_not_found(signature))
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Preprocessing knowledge keyed by variable type
#[derive(Debug, Default)]
pub struct PreprocessStore {
    documents: HashMap<VariableType, Arc<PreprocessDocument>>,
}

impl PreprocessStore {
    pub fn from_documents(documents: Vec<PreprocessDocument>) -> AnalysisResult<Self> {
        let mut store = Self::default();
        for doc in documents {
            if store.documents.contains_key(&doc.var_type) {
                return Err(AnalysisError::DuplicateKnowledge(doc.var_type.to_string()));
            }
            store.documents.insert(doc.var_type, Arc::new(doc));
        }
        Ok(store)
    }

    pub async fn load_file(path: impl AsRef<Path>) -> AnalysisResult<Self> {
        let path = path.as_ref();
        let documents = read_entries(path, "preprocessing").await?;
        let store = Self::from_documents(documents)?;
        info!("Loaded {} preprocessing knowledge entries from {}", store.len(), path.display());
        Ok(store)
    }

    pub fn lookup(&self, var_type: VariableType) -> Option<Arc<PreprocessDocument>> {
        self.documents.get(&var_type).cloned()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn knowledge_json() -> Value {
        json!({
            "statistical_tests": [
                {
                    "no_of_variable": "univariate",
                    "var_type": "numerical continuous",
                    "priority_tests": ["Shapiro-Wilk"],
                    "descriptive": {"statistics": ["mean", "median"]}
                },
                {
                    "no_of_variable": "bivariate",
                    "var_type": "numerical continuous + numerical continuous",
                    "inferential": {"tests": ["Pearson correlation"]}
                }
            ]
        })
    }

    #[test]
    fn test_lookup_is_exact() {
        let docs = parse_entries(knowledge_json(), "statistical_tests").unwrap();
        let store = KnowledgeStore::from_documents(docs).unwrap();
        assert_eq!(store.len(), 2);

        let sig = TypeSignature::Single(VariableType::NumericalContinuous);
        let doc = store.lookup(Arity::Univariate, &sig).unwrap();
        assert_eq!(doc.priority_tests[0].name(), "Shapiro-Wilk");

        // Same signature under the other arity is a different key
        assert!(store.lookup(Arity::Bivariate, &sig).is_none());

        let missing = TypeSignature::Single(VariableType::CategoricalNominal);
        assert!(matches!(
            store.fetch(&missing),
            Err(AnalysisError::KnowledgeNotFound { .. })
        ));
        assert!(matches!(
            store.fetch(&missing),
            Err(AnalysisError::KnowledgeNotFound { .. })
        ));
    }

    #[test]
    fn test_duplicate_keys_are_rejected() {
        let mut raw = knowledge_json();
        let first = raw["statistical_tests"][0].clone();
        raw["statistical_tests"].as_array_mut().unwrap().push(first);

        let docs = parse_entries(raw, "statistical_tests").unwrap();
        assert!(matches!(
            KnowledgeStore::from_documents(docs),
            Err(AnalysisError::DuplicateKnowledge(_))
        ));
    }

    #[test]
    fn test_arity_mismatch_is_invalid() {
        let raw = json!([{"no_of_variable": 1, "var_type": "binary + nominal"}]);
        let docs = parse_entries(raw, "statistical_tests").unwrap();
        assert!(matches!(
            KnowledgeStore::from_documents(docs),
            Err(AnalysisError::InvalidKnowledge(_))
        ));
    }

    #[tokio::test]
    async fn test_load_yaml_preprocess_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "- type: numerical continuous\n  prior_tests: [Shapiro-Wilk]\n  outlier_detection: [IQR, Z-score]\n  missing_value_imputation: [mean, median]\n- type: categorical nominal\n  missing_value_imputation: [mode]"
        )
        .unwrap();

        let store = PreprocessStore::load_file(file.path()).await.unwrap();
        assert_eq!(store.len(), 2);
        let doc = store.lookup(VariableType::NumericalContinuous).unwrap();
        assert_eq!(doc.outlier_detection.len(), 2);
        assert!(store.lookup(VariableType::Binary).is_none());
    }

    #[tokio::test]
    async fn test_load_json_knowledge_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, "{}", knowledge_json()).unwrap();
        let store = KnowledgeStore::load_file(file.path()).await.unwrap();
        assert!(!store.is_empty());
    }
}
